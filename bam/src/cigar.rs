//! CIGAR operations: the packed wire form, textual mnemonics, and the
//! reference/query span + `reg2bin` helpers derived from them.

use std::fmt::{self, Display};

/// `MIDNSHP=X`, op code `0..8`, matching spec §3's packed-word layout
/// (`(length << 4) | opcode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOpCode {
    Match,
    Ins,
    Del,
    Skip,
    SoftClip,
    HardClip,
    Pad,
    Eq,
    Diff,
}

impl CigarOpCode {
    pub fn from_code(code: u32) -> Option<Self> {
        use CigarOpCode::*;
        Some(match code {
            0 => Match,
            1 => Ins,
            2 => Del,
            3 => Skip,
            4 => SoftClip,
            5 => HardClip,
            6 => Pad,
            7 => Eq,
            8 => Diff,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        use CigarOpCode::*;
        match self {
            Match => 0,
            Ins => 1,
            Del => 2,
            Skip => 3,
            SoftClip => 4,
            HardClip => 5,
            Pad => 6,
            Eq => 7,
            Diff => 8,
        }
    }

    pub fn from_char(c: u8) -> Option<Self> {
        use CigarOpCode::*;
        Some(match c {
            b'M' => Match,
            b'I' => Ins,
            b'D' => Del,
            b'N' => Skip,
            b'S' => SoftClip,
            b'H' => HardClip,
            b'P' => Pad,
            b'=' => Eq,
            b'X' => Diff,
            _ => return None,
        })
    }

    pub fn as_char(self) -> char {
        use CigarOpCode::*;
        match self {
            Match => 'M',
            Ins => 'I',
            Del => 'D',
            Skip => 'N',
            SoftClip => 'S',
            HardClip => 'H',
            Pad => 'P',
            Eq => '=',
            Diff => 'X',
        }
    }

    /// Glossary: "Query span of a CIGAR" — ops that consume the query.
    pub fn consumes_query(self) -> bool {
        use CigarOpCode::*;
        matches!(self, Match | Ins | SoftClip | Eq | Diff)
    }

    /// Glossary: "Reference span of a CIGAR" — ops that consume the
    /// reference.
    pub fn consumes_reference(self) -> bool {
        use CigarOpCode::*;
        matches!(self, Match | Del | Skip | Eq | Diff)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarOp {
    pub op: CigarOpCode,
    pub len: u32,
}

impl CigarOp {
    /// Unpacks a 32-bit wire word: `(length << 4) | opcode`.
    pub fn unpack(word: u32) -> Option<Self> {
        let op = CigarOpCode::from_code(word & 0xF)?;
        Some(CigarOp {
            op,
            len: word >> 4,
        })
    }

    pub fn pack(self) -> u32 {
        (self.len << 4) | self.op.code()
    }
}

impl Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len, self.op.as_char())
    }
}

/// Glossary: "Reference span of a CIGAR" — sum of reference-consuming
/// operation lengths.
pub fn reference_span(ops: &[CigarOp]) -> u32 {
    ops.iter()
        .filter(|c| c.op.consumes_reference())
        .map(|c| c.len)
        .sum()
}

/// Glossary: "Query span of a CIGAR" — sum of query-consuming
/// operation lengths.
pub fn query_span(ops: &[CigarOp]) -> u32 {
    ops.iter()
        .filter(|c| c.op.consumes_query())
        .map(|c| c.len)
        .sum()
}

/// The standard SAM/BAM hierarchical bin for `[pos, end)`, referenced
/// (as `hts_reg2bin`) but not defined in the kept `sam.c` excerpt;
/// reproduced here verbatim from the SAM spec since `bin` is core
/// per-record data (spec §3), not index-internal state.
pub fn reg2bin(pos: i32, end: i32) -> u16 {
    let end = end - 1;
    if pos >> 14 == end >> 14 {
        return (((1 << 15) - 1) / 7 + (pos >> 14)) as u16;
    }
    if pos >> 17 == end >> 17 {
        return (((1 << 12) - 1) / 7 + (pos >> 17)) as u16;
    }
    if pos >> 20 == end >> 20 {
        return (((1 << 9) - 1) / 7 + (pos >> 20)) as u16;
    }
    if pos >> 23 == end >> 23 {
        return (((1 << 6) - 1) / 7 + (pos >> 23)) as u16;
    }
    if pos >> 26 == end >> 26 {
        return (((1 << 3) - 1) / 7 + (pos >> 26)) as u16;
    }
    0
}

/// All bins that could contain a chunk overlapping `[beg, end)`, used
/// by `index::BinningIndex::query` to prune candidates before
/// consulting the linear index.
pub fn reg2bins(beg: i32, end: i32) -> Vec<u16> {
    let end = end - 1;
    let mut bins = vec![0u16];
    for k in (1 + (beg >> 26))..=(1 + (end >> 26)) {
        bins.push(k as u16);
    }
    for k in (9 + (beg >> 23))..=(9 + (end >> 23)) {
        bins.push(k as u16);
    }
    for k in (73 + (beg >> 20))..=(73 + (end >> 20)) {
        bins.push(k as u16);
    }
    for k in (585 + (beg >> 17))..=(585 + (end >> 17)) {
        bins.push(k as u16);
    }
    for k in (4681 + (beg >> 14))..=(4681 + (end >> 14)) {
        bins.push(k as u16);
    }
    bins
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trip() {
        let op = CigarOp {
            op: CigarOpCode::Match,
            len: 36,
        };
        assert_eq!(CigarOp::unpack(op.pack()), Some(op));
    }

    #[test]
    fn spans_from_mixed_cigar() {
        let ops = vec![
            CigarOp { op: CigarOpCode::SoftClip, len: 5 },
            CigarOp { op: CigarOpCode::Match, len: 40 },
            CigarOp { op: CigarOpCode::Ins, len: 2 },
            CigarOp { op: CigarOpCode::Del, len: 3 },
        ];
        assert_eq!(reference_span(&ops), 43);
        assert_eq!(query_span(&ops), 47);
    }

    #[test]
    fn display_mnemonic() {
        let op = CigarOp { op: CigarOpCode::SoftClip, len: 12 };
        assert_eq!(op.to_string(), "12S");
    }
}
