//! Region-string parsing and name-to-tid resolution (spec §4.6
//! "Region resolution").

use crate::header::Header;

/// Splits `"name:begin-end"` into a reference-name prefix and a
/// 0-based half-open `[begin, end)`. A bare name with no `:begin-end`
/// suffix spans the whole reference. Mirrors `hts_parse_reg`'s
/// contract as consumed by `bam_iter_querys`.
pub fn parse_region(region: &str) -> (&str, i32, i32) {
    if let Some(idx) = region.rfind(':') {
        let (name, rest) = region.split_at(idx);
        let coords = &rest[1..];
        if let Some((b, e)) = coords.split_once('-') {
            if let (Ok(b), Ok(e)) = (parse_coord(b), parse_coord(e)) {
                return (name, (b - 1).max(0) as i32, e as i32);
            }
        } else if let Ok(b) = parse_coord(coords) {
            return (name, (b - 1).max(0) as i32, b as i32);
        }
    }
    (region, 0, i32::MAX)
}

fn parse_coord(s: &str) -> Result<i64, std::num::ParseIntError> {
    s.replace(',', "").parse()
}

/// Resolves a region string to `(tid, begin, end)`, falling back to
/// looking up the whole original string when the `name:begin-end`
/// prefix doesn't resolve — handles reference names that themselves
/// contain `:` (`bam_iter_querys`'s two-step fallback).
pub fn resolve_tid(header: &Header, region: &str) -> (i32, i32, i32) {
    let (prefix, begin, end) = parse_region(region);
    let mut tid = header.tid_of(prefix.as_bytes());
    if tid < 0 {
        tid = header.tid_of(region.as_bytes());
    }
    (tid, begin, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_span() {
        assert_eq!(parse_region("chr1:100-200"), ("chr1", 99, 200));
        assert_eq!(parse_region("chr1"), ("chr1", 0, i32::MAX));
    }

    #[test]
    fn falls_back_to_whole_string_for_colon_in_name() {
        let header = Header::new(vec![b"chr1:alt".to_vec()], vec![500], Vec::new());
        let (tid, begin, end) = resolve_tid(&header, "chr1:alt");
        assert_eq!(tid, 0);
        assert_eq!((begin, end), (0, i32::MAX));
    }
}
