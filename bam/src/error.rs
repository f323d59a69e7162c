use thiserror::Error;

/// Everything that can go wrong decoding or encoding a record.
///
/// Binary-codec errors are fatal to the record in progress; textual
/// parsing additionally reports survivable anomalies via `log::warn!`
/// instead of this type (see `codec::text`).
#[derive(Error, Debug)]
pub enum BamError {
    #[error("truncated record")]
    Truncated,
    #[error("missing or corrupt BAM magic string")]
    BadMagic,
    #[error("unrecognized CIGAR operator")]
    BadCigar,
    #[error("unrecognized auxiliary field type")]
    BadAuxType,
    #[error("incomplete auxiliary field")]
    AuxIncomplete,
    #[error("CIGAR and query sequence are of different length")]
    CigarSeqLen,
    #[error("missing tab where required")]
    MalformedField,
    #[error("I/O error")]
    IoError(#[from] std::io::Error),
}
