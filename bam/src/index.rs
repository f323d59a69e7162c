//! The index collaborator (spec §6.6), plus a concrete bin/linear
//! implementation so the crate is runnable without a second library
//! (§6.3 calls the on-disk payload opaque to this spec, so the format
//! here is private — not bit-compatible with htslib's `.bai`).

use crate::cigar::{reg2bin, reg2bins};
use crate::error::BamError;
use crate::iter::Chunk;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use fxhash::FxHashMap;
use std::io::{Read, Write};

/// Window size for the linear index (spec §9 glossary "Linear index").
const LINEAR_WINDOW_SHIFT: u32 = 14;

/// `init/push/finish/save/load/query` exactly as named in spec §6.6.
pub trait AlignmentIndex {
    fn init(&mut self, n_targets: usize, initial_vaddr: u64);
    fn push(&mut self, tid: i32, begin: i32, end: i32, vaddr: u64, bin: u16, mapped: bool);
    fn finish(&mut self, final_vaddr: u64);
    fn save<W: Write>(&self, w: &mut W) -> Result<(), BamError>;
    fn load<R: Read>(r: &mut R) -> Result<Self, BamError>
    where
        Self: Sized;
    fn query(&self, tid: i32, begin: i32, end: i32) -> Vec<Chunk>;
}

#[derive(Debug, Default, Clone)]
struct RefIndex {
    /// bin id -> chunk list, unmerged (one push = one chunk).
    bins: FxHashMap<u16, Vec<Chunk>>,
    /// 16 KiB window index -> smallest vaddr of any record overlapping
    /// that window, for chunk-list pruning.
    linear: Vec<u64>,
}

/// A standard hierarchical-bin index over `n_targets` references.
#[derive(Debug, Default)]
pub struct BinningIndex {
    refs: Vec<RefIndex>,
    last_vaddr: u64,
}

impl AlignmentIndex for BinningIndex {
    fn init(&mut self, n_targets: usize, initial_vaddr: u64) {
        self.refs = vec![RefIndex::default(); n_targets];
        self.last_vaddr = initial_vaddr;
    }

    fn push(&mut self, tid: i32, begin: i32, end: i32, vaddr: u64, bin: u16, mapped: bool) {
        if tid < 0 || !mapped {
            return;
        }
        let r = &mut self.refs[tid as usize];
        r.bins.entry(bin).or_default().push(Chunk {
            begin: vaddr,
            end: vaddr,
        });

        let win_begin = (begin >> LINEAR_WINDOW_SHIFT) as usize;
        let win_end = ((end.max(begin + 1) - 1) >> LINEAR_WINDOW_SHIFT) as usize;
        if r.linear.len() <= win_end {
            r.linear.resize(win_end + 1, u64::MAX);
        }
        for w in r.linear.iter_mut().take(win_end + 1).skip(win_begin) {
            *w = (*w).min(vaddr);
        }
    }

    fn finish(&mut self, final_vaddr: u64) {
        self.last_vaddr = final_vaddr;
        for r in &mut self.refs {
            let mut bin_ids: Vec<u16> = r.bins.keys().copied().collect();
            bin_ids.sort_unstable();
            for bin in bin_ids {
                let chunks = r.bins.get_mut(&bin).unwrap();
                for i in 0..chunks.len().saturating_sub(1) {
                    chunks[i].end = chunks[i + 1].begin;
                }
                if let Some(last) = chunks.last_mut() {
                    last.end = self.last_vaddr;
                }
            }
        }
    }

    fn save<W: Write>(&self, w: &mut W) -> Result<(), BamError> {
        w.write_u32::<LittleEndian>(self.refs.len() as u32)?;
        w.write_u64::<LittleEndian>(self.last_vaddr)?;
        for r in &self.refs {
            w.write_u32::<LittleEndian>(r.bins.len() as u32)?;
            let mut bin_ids: Vec<&u16> = r.bins.keys().collect();
            bin_ids.sort_unstable();
            for bin in bin_ids {
                let chunks = &r.bins[bin];
                w.write_u16::<LittleEndian>(*bin)?;
                w.write_u32::<LittleEndian>(chunks.len() as u32)?;
                for c in chunks {
                    w.write_u64::<LittleEndian>(c.begin)?;
                    w.write_u64::<LittleEndian>(c.end)?;
                }
            }
            w.write_u32::<LittleEndian>(r.linear.len() as u32)?;
            for v in &r.linear {
                w.write_u64::<LittleEndian>(*v)?;
            }
        }
        Ok(())
    }

    fn load<R: Read>(r: &mut R) -> Result<Self, BamError> {
        let n_refs = r.read_u32::<LittleEndian>()? as usize;
        let last_vaddr = r.read_u64::<LittleEndian>()?;
        let mut refs = Vec::with_capacity(n_refs);
        for _ in 0..n_refs {
            let n_bins = r.read_u32::<LittleEndian>()?;
            let mut bins = FxHashMap::default();
            for _ in 0..n_bins {
                let bin = r.read_u16::<LittleEndian>()?;
                let n_chunks = r.read_u32::<LittleEndian>()?;
                let mut chunks = Vec::with_capacity(n_chunks as usize);
                for _ in 0..n_chunks {
                    let begin = r.read_u64::<LittleEndian>()?;
                    let end = r.read_u64::<LittleEndian>()?;
                    chunks.push(Chunk { begin, end });
                }
                bins.insert(bin, chunks);
            }
            let n_linear = r.read_u32::<LittleEndian>()?;
            let mut linear = Vec::with_capacity(n_linear as usize);
            for _ in 0..n_linear {
                linear.push(r.read_u64::<LittleEndian>()?);
            }
            refs.push(RefIndex { bins, linear });
        }
        Ok(BinningIndex { refs, last_vaddr })
    }

    fn query(&self, tid: i32, begin: i32, end: i32) -> Vec<Chunk> {
        if tid < 0 || tid as usize >= self.refs.len() {
            return Vec::new();
        }
        let r = &self.refs[tid as usize];
        let min_vaddr = {
            let win = (begin >> LINEAR_WINDOW_SHIFT).max(0) as usize;
            r.linear.get(win).copied().unwrap_or(0)
        };
        let mut chunks: Vec<Chunk> = reg2bins(begin, end)
            .into_iter()
            .filter_map(|bin| r.bins.get(&bin))
            .flatten()
            .copied()
            .filter(|c| c.end > min_vaddr)
            .collect();
        chunks.sort_by_key(|c| c.begin);
        chunks
    }
}

/// Computed solely from `reg2bin`, so a caller without a precomputed
/// `bin` on the record can still build the index.
pub fn bin_for(pos: i32, end: i32) -> u16 {
    reg2bin(pos, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_returns_pushed_chunks_in_region() {
        let mut idx = BinningIndex::default();
        idx.init(1, 0);
        let bin = bin_for(100, 150);
        idx.push(0, 100, 150, 10, bin, true);
        idx.push(0, 1_000_000, 1_000_050, 20, bin_for(1_000_000, 1_000_050), true);
        idx.finish(30);

        let chunks = idx.query(0, 90, 160);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().any(|c| c.begin == 10));
    }

    #[test]
    fn save_load_round_trip() {
        let mut idx = BinningIndex::default();
        idx.init(2, 0);
        idx.push(0, 100, 150, 10, bin_for(100, 150), true);
        idx.finish(20);

        let mut buf = Vec::new();
        idx.save(&mut buf).unwrap();
        let loaded = BinningIndex::load(&mut std::io::Cursor::new(buf)).unwrap();
        assert_eq!(loaded.query(0, 90, 160), idx.query(0, 90, 160));
    }
}
