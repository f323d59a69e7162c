//! The alignment record model (spec §3).

use crate::aux::AuxField;
use crate::cigar::CigarOp;

pub const FLAG_UNMAPPED: u16 = 0x4;
pub const FLAG_MATE_UNMAPPED: u16 = 0x8;

/// Bit-field wrapper over the `bin<<16 | mapq<<8 | l_qname` wire word
/// (spec §9, "opaque integer used for packed fields"). Exists only so
/// the packed layout stays private to `codec::binary`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinMapqQname(pub u32);

impl BinMapqQname {
    pub fn new(bin: u16, mapq: u8, l_qname: u8) -> Self {
        BinMapqQname((bin as u32) << 16 | (mapq as u32) << 8 | l_qname as u32)
    }
    pub fn bin(self) -> u16 {
        (self.0 >> 16) as u16
    }
    pub fn mapq(self) -> u8 {
        (self.0 >> 8) as u8
    }
    pub fn l_qname(self) -> u8 {
        self.0 as u8
    }
}

/// Bit-field wrapper over the `flag<<16 | n_cigar` wire word.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagNCigar(pub u32);

impl FlagNCigar {
    pub fn new(flag: u16, n_cigar: u16) -> Self {
        FlagNCigar((flag as u32) << 16 | n_cigar as u32)
    }
    pub fn flag(self) -> u16 {
        (self.0 >> 16) as u16
    }
    pub fn n_cigar(self) -> u16 {
        self.0 as u16
    }
}

/// An alignment record. Reusable: callers read into the same `Record`
/// repeatedly; `clear()` resets the payload fields without shrinking
/// their backing allocations (spec §9, "buffer reuse").
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub tid: i32,
    pub pos: i32,
    pub mapq: u8,
    pub flag: u16,
    pub mtid: i32,
    pub mpos: i32,
    pub tlen: i32,

    /// Query name, NUL excluded. Wire `l_qname` is `qname.len() + 1`.
    pub qname: Vec<u8>,
    pub cigar: Vec<CigarOp>,
    /// One 4-bit code per base (`=ACMGRSVTWYHKDBN`, index 0..16),
    /// length `l_qseq`.
    pub seq: Vec<u8>,
    /// Phred scores, length `l_qseq`. A leading `0xFF` byte means "no
    /// qualities" (spec §3).
    pub qual: Vec<u8>,
    /// Order-preserving: the binary codec re-serializes this stream
    /// byte-for-byte, which a hash map cannot guarantee (see
    /// DESIGN.md).
    pub aux: Vec<AuxField>,
}

impl Record {
    pub fn clear(&mut self) {
        self.tid = 0;
        self.pos = 0;
        self.mapq = 0;
        self.flag = 0;
        self.mtid = 0;
        self.mpos = 0;
        self.tlen = 0;
        self.qname.clear();
        self.cigar.clear();
        self.seq.clear();
        self.qual.clear();
        self.aux.clear();
    }

    pub fn l_qname(&self) -> u8 {
        (self.qname.len() + 1) as u8
    }

    pub fn n_cigar(&self) -> u16 {
        self.cigar.len() as u16
    }

    pub fn l_qseq(&self) -> u32 {
        self.seq.len() as u32
    }

    pub fn is_unmapped(&self) -> bool {
        self.flag & FLAG_UNMAPPED != 0
    }

    pub fn has_qual(&self) -> bool {
        !(self.qual.first() == Some(&0xFF))
    }

    /// `reg2bin(pos, pos + reference_span(cigar))`, or `reg2bin(pos,
    /// pos + 1)` when no CIGAR is present (spec §3 invariant).
    pub fn bin(&self) -> u16 {
        let span = if self.cigar.is_empty() {
            1
        } else {
            crate::cigar::reference_span(&self.cigar)
        };
        crate::cigar::reg2bin(self.pos, self.pos + span as i32)
    }
}
