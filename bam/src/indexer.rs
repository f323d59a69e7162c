//! The index builder facade (spec §4.7).

use crate::cigar::reference_span;
use crate::codec::binary::read_record;
use crate::error::BamError;
use crate::index::AlignmentIndex;
use crate::record::{Record, FLAG_UNMAPPED};
use crate::stream::BamRead;
use std::io::Write;

const INDEX_MAGIC: &[u8; 4] = b"BAI\x01";

/// Streams every record once, pushing `(tid, pos, pos+reflen, vaddr,
/// bin, mapped)` into `index`. The caller has already read the header
/// off `reader`; `reader.tell()` at that point is the initial vaddr.
pub fn build_index<R: BamRead, I: AlignmentIndex>(
    reader: &mut R,
    n_targets: usize,
    index: &mut I,
) -> Result<(), BamError> {
    index.init(n_targets, reader.tell()?);

    let mut rec = Record::default();
    let mut scratch = Vec::new();
    loop {
        let vaddr = reader.tell()?;
        let consumed = read_record(reader, &mut rec, &mut scratch)?;
        if consumed == 0 {
            break;
        }
        let reflen = reference_span(&rec.cigar) as i32;
        let mapped = rec.flag & FLAG_UNMAPPED == 0;
        index.push(rec.tid, rec.pos, rec.pos + reflen, vaddr, rec.bin(), mapped);
    }

    index.finish(reader.tell()?);
    Ok(())
}

/// Writes the `"BAI\1"` magic followed by the index's own save format
/// (spec §6.3: the payload after the magic is opaque to this spec).
pub fn write_index_file<W: Write, I: AlignmentIndex>(w: &mut W, index: &I) -> Result<(), BamError> {
    w.write_all(INDEX_MAGIC)?;
    index.save(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cigar::{CigarOp, CigarOpCode};
    use crate::codec::binary::write_record;
    use crate::index::BinningIndex;
    use crate::stream::plain;

    #[test]
    fn builds_one_entry_per_record() {
        let mut buf = Vec::new();
        let mut scratch = Vec::new();
        for pos in [100, 200, 400] {
            let mut rec = Record::default();
            rec.tid = 0;
            rec.pos = pos;
            rec.mtid = -1;
            rec.mpos = -1;
            rec.qname = b"r".to_vec();
            rec.cigar = vec![CigarOp {
                op: CigarOpCode::Match,
                len: 50,
            }];
            write_record(&mut buf, &rec, &mut scratch).unwrap();
        }

        let mut reader = plain::Reader(std::io::Cursor::new(buf));
        let mut index = BinningIndex::default();
        build_index(&mut reader, 1, &mut index).unwrap();

        let chunks = index.query(0, 90, 160);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn writes_bai_magic() {
        let index = BinningIndex::default();
        let mut out = Vec::new();
        write_index_file(&mut out, &index).unwrap();
        assert_eq!(&out[..4], b"BAI\x01");
    }
}
