//! The binary record codec (spec §4.3): fixed 32-byte core, variable
//! payload. Every field is read and written through explicit
//! little-endian accessors (`nom`'s `le_*` combinators, `byteorder`'s
//! `LittleEndian`, `to_le_bytes`/`from_le_bytes`), which is already
//! correct on any host byte order — `bam::endian`'s swap primitives
//! exist for hosts that need a native-order in-memory representation,
//! not for this codec's own wire access.

use crate::aux::{decode_tlv, encode_tlv};
use crate::cigar::CigarOp;
use crate::error::BamError;
use crate::record::{BinMapqQname, FlagNCigar, Record};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use nom::number::complete::{le_i32, le_u32};
use nom::sequence::tuple;
use nom::IResult;
use std::io::{Read, Write};

/// Rounds `needed` up to the next power of two and grows `buf` to that
/// capacity if it is currently smaller (spec §9 "capacity rounded up
/// to the next power of two").
fn ensure_capacity(buf: &mut Vec<u8>, needed: usize) {
    if buf.capacity() < needed {
        let target = needed.next_power_of_two();
        buf.reserve(target - buf.len().min(target));
    }
}

struct Core {
    tid: i32,
    pos: i32,
    l_qname: u8,
    mapq: u8,
    bin: u16,
    n_cigar: u16,
    flag: u16,
    l_qseq: u32,
    mtid: i32,
    mpos: i32,
    tlen: i32,
}

fn parse_core(input: &[u8]) -> IResult<&[u8], Core> {
    let (input, (tid, pos, bin_mq_nl, flag_nc, l_qseq, mtid, mpos, tlen)) = tuple((
        le_i32, le_i32, le_u32, le_u32, le_u32, le_i32, le_i32, le_i32,
    ))(input)?;
    let bin_mq_nl = BinMapqQname(bin_mq_nl);
    let flag_nc = FlagNCigar(flag_nc);
    Ok((
        input,
        Core {
            tid,
            pos,
            l_qname: bin_mq_nl.l_qname(),
            mapq: bin_mq_nl.mapq(),
            bin: bin_mq_nl.bin(),
            n_cigar: flag_nc.n_cigar(),
            flag: flag_nc.flag(),
            l_qseq,
            mtid,
            mpos,
            tlen,
        },
    ))
}

/// Reads one record. Returns the number of bytes consumed (`block_len
/// + 4`), or `Ok(0)` on a clean EOF at the `block_len` boundary.
pub fn read_record<R: Read>(
    r: &mut R,
    rec: &mut Record,
    scratch: &mut Vec<u8>,
) -> Result<usize, BamError> {
    let block_len = match r.read_i32::<LittleEndian>() {
        Ok(n) => n,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(0),
        Err(e) => return Err(BamError::IoError(e)),
    };
    let block_len = block_len as usize;
    if block_len < 32 {
        return Err(BamError::Truncated);
    }

    let mut core_buf = [0u8; 32];
    r.read_exact(&mut core_buf)
        .map_err(|_| BamError::Truncated)?;
    let (_, core) = parse_core(&core_buf).map_err(|_| BamError::Truncated)?;

    let payload_len = block_len - 32;
    ensure_capacity(scratch, payload_len);
    scratch.clear();
    scratch.resize(payload_len, 0);
    r.read_exact(scratch).map_err(|_| BamError::Truncated)?;

    rec.clear();
    rec.tid = core.tid;
    rec.pos = core.pos;
    rec.mapq = core.mapq;
    rec.flag = core.flag;
    rec.mtid = core.mtid;
    rec.mpos = core.mpos;
    rec.tlen = core.tlen;
    let _ = core.bin;

    let qname_len = core.l_qname as usize;
    if scratch.len() < qname_len {
        return Err(BamError::Truncated);
    }
    let qname = &scratch[..qname_len.saturating_sub(1)];
    rec.qname.clear();
    rec.qname.extend_from_slice(qname);

    let mut cursor = qname_len;
    let n_cigar = core.n_cigar as usize;
    let cigar_bytes = n_cigar * 4;
    if scratch.len() < cursor + cigar_bytes {
        return Err(BamError::Truncated);
    }
    rec.cigar.clear();
    for i in 0..n_cigar {
        let off = cursor + i * 4;
        let word = u32::from_le_bytes(scratch[off..off + 4].try_into().unwrap());
        rec.cigar
            .push(CigarOp::unpack(word).ok_or(BamError::BadCigar)?);
    }
    cursor += cigar_bytes;

    let l_qseq = core.l_qseq as usize;
    let seq_bytes = (l_qseq + 1) / 2;
    if scratch.len() < cursor + seq_bytes {
        return Err(BamError::Truncated);
    }
    rec.seq.clear();
    for i in 0..l_qseq {
        let byte = scratch[cursor + i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0F };
        rec.seq.push(nibble);
    }
    cursor += seq_bytes;

    if scratch.len() < cursor + l_qseq {
        return Err(BamError::Truncated);
    }
    rec.qual.clear();
    rec.qual.extend_from_slice(&scratch[cursor..cursor + l_qseq]);
    cursor += l_qseq;

    rec.aux.clear();
    let mut aux_cursor = cursor;
    while aux_cursor < scratch.len() {
        let (field, consumed) = decode_tlv(&scratch[aux_cursor..])?;
        rec.aux.push(field);
        aux_cursor += consumed;
    }

    Ok(block_len + 4)
}

/// Writes one record: the fixed core, then the variable payload.
pub fn write_record<W: Write>(
    w: &mut W,
    rec: &Record,
    scratch: &mut Vec<u8>,
) -> Result<usize, BamError> {
    scratch.clear();
    scratch.extend_from_slice(&rec.qname);
    scratch.push(0);
    for op in &rec.cigar {
        scratch.extend_from_slice(&op.pack().to_le_bytes());
    }
    for pair in rec.seq.chunks(2) {
        let hi = pair[0];
        let lo = pair.get(1).copied().unwrap_or(0);
        scratch.push((hi << 4) | lo);
    }
    scratch.extend_from_slice(&rec.qual);
    for field in &rec.aux {
        encode_tlv(field, scratch);
    }

    let l_qname = rec.l_qname();
    let n_cigar = rec.n_cigar();
    let l_qseq = rec.l_qseq();

    let bin_mq_nl = BinMapqQname::new(rec.bin(), rec.mapq, l_qname).0;
    let flag_nc = FlagNCigar::new(rec.flag, n_cigar).0;

    let block_len = 32 + scratch.len();
    write_fixed_and_payload(w, rec, block_len, bin_mq_nl, flag_nc, l_qseq, scratch)?;

    Ok(block_len + 4)
}

#[allow(clippy::too_many_arguments)]
fn write_fixed_and_payload<W: Write>(
    w: &mut W,
    rec: &Record,
    block_len: usize,
    bin_mq_nl: u32,
    flag_nc: u32,
    l_qseq: u32,
    payload: &[u8],
) -> Result<(), BamError> {
    w.write_i32::<LittleEndian>(block_len as i32)?;
    w.write_i32::<LittleEndian>(rec.tid)?;
    w.write_i32::<LittleEndian>(rec.pos)?;
    w.write_u32::<LittleEndian>(bin_mq_nl)?;
    w.write_u32::<LittleEndian>(flag_nc)?;
    w.write_u32::<LittleEndian>(l_qseq)?;
    w.write_i32::<LittleEndian>(rec.mtid)?;
    w.write_i32::<LittleEndian>(rec.mpos)?;
    w.write_i32::<LittleEndian>(rec.tlen)?;
    w.write_all(payload)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aux::{AuxField, AuxValue};
    use crate::cigar::{CigarOp, CigarOpCode};
    use std::io::Cursor;

    fn sample_record() -> Record {
        let mut rec = Record::default();
        rec.tid = 0;
        rec.pos = 99;
        rec.mapq = 60;
        rec.flag = 0;
        rec.mtid = -1;
        rec.mpos = -1;
        rec.tlen = 0;
        rec.qname = b"read1".to_vec();
        rec.cigar = vec![CigarOp {
            op: CigarOpCode::Match,
            len: 4,
        }];
        rec.seq = vec![1, 2, 3, 8]; // A C M T
        rec.qual = vec![30, 30, 30, 30];
        rec.aux = vec![AuxField {
            tag: *b"NM",
            value: AuxValue::U8(0),
        }];
        rec
    }

    #[test]
    fn round_trip_via_cursor() {
        let rec = sample_record();
        let mut scratch = Vec::new();
        let mut out = Vec::new();
        let written = write_record(&mut out, &rec, &mut scratch).unwrap();
        assert_eq!(written, out.len());

        let mut cursor = Cursor::new(out);
        let mut read_back = Record::default();
        let mut read_scratch = Vec::new();
        let consumed = read_record(&mut cursor, &mut read_back, &mut read_scratch).unwrap();
        assert_eq!(consumed, written);
        assert_eq!(read_back.qname, rec.qname);
        assert_eq!(read_back.cigar, rec.cigar);
        assert_eq!(read_back.seq, rec.seq);
        assert_eq!(read_back.qual, rec.qual);
        assert_eq!(read_back.aux, rec.aux);
        assert_eq!(read_back.pos, rec.pos);
    }

    #[test]
    fn clean_eof_returns_zero() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let mut rec = Record::default();
        let mut scratch = Vec::new();
        assert_eq!(read_record(&mut cursor, &mut rec, &mut scratch).unwrap(), 0);
    }

    #[test]
    fn short_block_is_truncated() {
        let mut cursor = Cursor::new(vec![32, 0, 0, 0, 1, 2, 3]);
        let mut rec = Record::default();
        let mut scratch = Vec::new();
        assert!(matches!(
            read_record(&mut cursor, &mut rec, &mut scratch),
            Err(BamError::Truncated)
        ));
    }
}
