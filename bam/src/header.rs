//! The reference dictionary (spec §3 "Reference dictionary", §4.1/§4.2).

use crate::error::BamError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use fxhash::FxHashMap;
use std::io::{Read, Write};
use std::sync::OnceLock;

const MAGIC: &[u8; 4] = b"BAM\x01";

/// Owns the name/length arrays, the original text, and the two
/// lazily-built derived tables (§5 "serialized under a once-primitive",
/// §9 "Opcode lookup table on the header").
#[derive(Debug, Default)]
pub struct Header {
    pub names: Vec<Vec<u8>>,
    pub lengths: Vec<i32>,
    pub text: Vec<u8>,
    tid_index: OnceLock<FxHashMap<Vec<u8>, i32>>,
    opcode_table: OnceLock<[i8; 128]>,
}

impl Clone for Header {
    fn clone(&self) -> Self {
        Header {
            names: self.names.clone(),
            lengths: self.lengths.clone(),
            text: self.text.clone(),
            tid_index: OnceLock::new(),
            opcode_table: OnceLock::new(),
        }
    }
}

impl Header {
    pub fn new(names: Vec<Vec<u8>>, lengths: Vec<i32>, text: Vec<u8>) -> Self {
        Header {
            names,
            lengths,
            text,
            tid_index: OnceLock::new(),
            opcode_table: OnceLock::new(),
        }
    }

    pub fn n_targets(&self) -> usize {
        self.names.len()
    }

    /// Builds the inverse `name -> tid` index on first call, then
    /// answers in O(1). Returns `-1` for an unknown name.
    pub fn tid_of(&self, name: &[u8]) -> i32 {
        let index = self.tid_index.get_or_init(|| {
            self.names
                .iter()
                .enumerate()
                .map(|(i, n)| (n.clone(), i as i32))
                .collect()
        });
        *index.get(name).unwrap_or(&-1)
    }

    /// The 128-entry `MIDNSHP=X` ASCII opcode table, built once per
    /// header on first textual CIGAR parse.
    pub fn opcode_table(&self) -> &[i8; 128] {
        self.opcode_table.get_or_init(|| {
            let mut table = [-1i8; 128];
            for c in [b'M', b'I', b'D', b'N', b'S', b'H', b'P', b'=', b'X'] {
                let op = crate::cigar::CigarOpCode::from_char(c).unwrap();
                table[c as usize] = op.code() as i8;
            }
            table
        })
    }

    /// Reads the binary header format (§6.1): magic, `l_text`, text,
    /// `n_targets`, then per-target `name_len`/name/`length`.
    pub fn read_binary<R: Read>(r: &mut R) -> Result<Self, BamError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(BamError::BadMagic);
        }

        let l_text = r.read_i32::<LittleEndian>()?;
        let mut text = vec![0u8; l_text.max(0) as usize];
        r.read_exact(&mut text)?;

        let n_targets = r.read_i32::<LittleEndian>()?.max(0) as usize;
        let mut names = Vec::with_capacity(n_targets);
        let mut lengths = Vec::with_capacity(n_targets);
        for _ in 0..n_targets {
            let name_len = r.read_i32::<LittleEndian>()?.max(0) as usize;
            let mut name = vec![0u8; name_len];
            r.read_exact(&mut name)?;
            if name.last() == Some(&0) {
                name.pop();
            }
            let length = r.read_i32::<LittleEndian>()?;
            names.push(name);
            lengths.push(length);
        }

        Ok(Header {
            names,
            lengths,
            text,
            tid_index: OnceLock::new(),
            opcode_table: OnceLock::new(),
        })
    }

    /// Writes the binary header format, mirroring `read_binary` field
    /// for field.
    pub fn write_binary<W: Write>(&self, w: &mut W) -> Result<(), BamError> {
        w.write_all(MAGIC)?;
        w.write_i32::<LittleEndian>(self.text.len() as i32)?;
        w.write_all(&self.text)?;
        w.write_i32::<LittleEndian>(self.names.len() as i32)?;
        for (name, &length) in self.names.iter().zip(&self.lengths) {
            w.write_i32::<LittleEndian>(name.len() as i32 + 1)?;
            w.write_all(name)?;
            w.write_u8(0)?;
            w.write_i32::<LittleEndian>(length)?;
        }
        Ok(())
    }

    /// Scans `@SQ` lines out of textual header bytes (§4.2). Assigned
    /// ids reflect insertion order; a duplicate `SN:` is dropped,
    /// keeping the first occurrence.
    pub fn parse_text(text: &[u8]) -> Self {
        let mut names = Vec::new();
        let mut lengths = Vec::new();
        let mut seen: FxHashMap<Vec<u8>, ()> = FxHashMap::default();

        for line in text.split(|&b| b == b'\n') {
            if !line.starts_with(b"@SQ\t") && !line.starts_with(b"@SQ") {
                continue;
            }
            let mut sn: Option<Vec<u8>> = None;
            let mut ln: Option<i32> = None;
            for field in line.split(|&b| b == b'\t') {
                if let Some(rest) = field.strip_prefix(b"SN:") {
                    sn = Some(rest.to_vec());
                } else if let Some(rest) = field.strip_prefix(b"LN:") {
                    ln = std::str::from_utf8(rest).ok().and_then(|s| s.parse().ok());
                }
            }
            if let (Some(name), Some(length)) = (sn, ln) {
                if seen.contains_key(&name) {
                    log::warn!("duplicate SN tag for reference {:?}, keeping first", String::from_utf8_lossy(&name));
                    continue;
                }
                seen.insert(name.clone(), ());
                names.push(name);
                lengths.push(length);
            }
        }

        Header {
            names,
            lengths,
            text: text.to_vec(),
            tid_index: OnceLock::new(),
            opcode_table: OnceLock::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn empty_header_round_trip() {
        let hdr = Header::default();
        let mut buf = Vec::new();
        hdr.write_binary(&mut buf).unwrap();
        assert_eq!(
            buf,
            vec![0x42, 0x41, 0x4D, 0x01, 0, 0, 0, 0, 0, 0, 0, 0]
        );
        let read_back = Header::read_binary(&mut Cursor::new(buf)).unwrap();
        assert_eq!(read_back.n_targets(), 0);
        assert!(read_back.text.is_empty());
    }

    #[test]
    fn two_reference_header_round_trip_and_lookup() {
        let text = b"@SQ\tSN:chr1\tLN:1000\n@SQ\tSN:chrX\tLN:2000\n".to_vec();
        let hdr = Header {
            names: vec![b"chr1".to_vec(), b"chrX".to_vec()],
            lengths: vec![1000, 2000],
            text,
            tid_index: OnceLock::new(),
            opcode_table: OnceLock::new(),
        };
        let mut buf = Vec::new();
        hdr.write_binary(&mut buf).unwrap();
        let read_back = Header::read_binary(&mut Cursor::new(buf)).unwrap();
        assert_eq!(read_back.tid_of(b"chrX"), 1);
        assert_eq!(read_back.tid_of(b"chr2"), -1);
        assert_eq!(read_back.text, hdr.text);
    }

    #[test]
    fn textual_parse_drops_duplicate_sn() {
        let text = b"@SQ\tSN:chr1\tLN:100\n@SQ\tSN:chr1\tLN:999\n";
        let hdr = Header::parse_text(text);
        assert_eq!(hdr.names, vec![b"chr1".to_vec()]);
        assert_eq!(hdr.lengths, vec![100]);
    }
}
