//! The compressed-stream collaborator (spec §6.5): `tell`/seek over
//! virtual file offsets, and an EOF-marker probe. §6 treats the
//! concrete compression format as external; this module supplies one
//! concrete implementation (`bgzf`) plus an uncompressed one (`plain`)
//! so the crate is runnable without a second library.

use crate::error::BamError;
use std::io::{Read, Write};

/// Result of probing a stream for a trailing EOF marker block, per
/// `bam_hdr_read`'s probe in `sam.c`. A non-seekable stream legitimately
/// fails this probe and must not be treated as a warning-worthy
/// absence (`errno == ESPIPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EofProbe {
    Present,
    Absent,
    NotSeekable,
}

impl EofProbe {
    /// Whether the probe result should be logged as a warning.
    pub fn should_warn(self) -> bool {
        matches!(self, EofProbe::Absent)
    }
}

/// A readable compressed stream exposing virtual file offsets.
pub trait BamRead: Read {
    fn tell(&mut self) -> Result<u64, BamError>;
    fn check_eof(&mut self) -> Result<EofProbe, BamError>;
}

/// A writable compressed stream exposing virtual file offsets.
pub trait BamWrite: Write {
    fn tell(&mut self) -> Result<u64, BamError>;
    /// Attempts a flush without failing the caller if the underlying
    /// stream cannot honor it yet (§6.5 `flush_try`).
    fn flush_try(&mut self) -> Result<(), BamError>;
}

/// Seeking to a previously observed virtual offset, used by region
/// queries (§4.6).
pub trait BamSeek: BamRead {
    fn seek_to(&mut self, voffset: u64) -> Result<(), BamError>;
}

/// BGZF-backed streams (grounded in `lyso-bam`'s `bgzip` dependency and
/// `lyso-cli/src/main.rs`'s `BGZFReader::new` usage).
pub mod bgzf {
    use super::*;
    use bgzip::read::BGZFReader;
    use bgzip::write::BGZFWriter;
    use bgzip::Compression;
    use std::io::Seek;

    pub struct Reader<R: Read + Seek>(BGZFReader<R>);

    impl<R: Read + Seek> Reader<R> {
        pub fn new(inner: R) -> Result<Self, BamError> {
            let reader = BGZFReader::new(inner).map_err(|_| BamError::BadMagic)?;
            Ok(Reader(reader))
        }
    }

    impl<R: Read + Seek> Read for Reader<R> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl<R: Read + Seek> BamRead for Reader<R> {
        fn tell(&mut self) -> Result<u64, BamError> {
            Ok(self.0.bgzf_pos())
        }

        fn check_eof(&mut self) -> Result<EofProbe, BamError> {
            match self.0.check_eof() {
                Ok(true) => Ok(EofProbe::Present),
                Ok(false) => Ok(EofProbe::Absent),
                Err(e) if e.kind() == std::io::ErrorKind::Other => Ok(EofProbe::NotSeekable),
                Err(e) => Err(BamError::IoError(e)),
            }
        }
    }

    impl<R: Read + Seek> BamSeek for Reader<R> {
        fn seek_to(&mut self, voffset: u64) -> Result<(), BamError> {
            self.0
                .bgzf_seek(voffset)
                .map_err(|e| BamError::IoError(e.into_io_error()))
        }
    }

    pub struct Writer<W: Write>(BGZFWriter<W>);

    impl<W: Write> Writer<W> {
        pub fn new(inner: W) -> Self {
            Writer(BGZFWriter::new(inner, Compression::default()))
        }

        pub fn close(self) -> Result<(), BamError> {
            self.0.close().map_err(BamError::IoError)?;
            Ok(())
        }
    }

    impl<W: Write> Write for Writer<W> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.0.flush()
        }
    }

    impl<W: Write> BamWrite for Writer<W> {
        fn tell(&mut self) -> Result<u64, BamError> {
            Ok(self.0.bgzf_pos())
        }

        fn flush_try(&mut self) -> Result<(), BamError> {
            match self.0.flush() {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(()),
                Err(e) => Err(BamError::IoError(e)),
            }
        }
    }
}

/// Uncompressed streams over `Cursor`/`File`, where the virtual offset
/// is simply the byte offset. Used by tests and by tools that skip
/// block compression entirely.
pub mod plain {
    use super::*;
    use std::io::{Seek, SeekFrom};

    pub struct Reader<R>(pub R);

    impl<R: Read> Read for Reader<R> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl<R: Read + Seek> BamRead for Reader<R> {
        fn tell(&mut self) -> Result<u64, BamError> {
            self.0.stream_position().map_err(BamError::IoError)
        }

        fn check_eof(&mut self) -> Result<EofProbe, BamError> {
            Ok(EofProbe::NotSeekable)
        }
    }

    impl<R: Read + Seek> BamSeek for Reader<R> {
        fn seek_to(&mut self, voffset: u64) -> Result<(), BamError> {
            self.0
                .seek(SeekFrom::Start(voffset))
                .map(|_| ())
                .map_err(BamError::IoError)
        }
    }

    pub struct Writer<W>(pub W);

    impl<W: Write> Write for Writer<W> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.0.flush()
        }
    }

    impl<W: Write + Seek> BamWrite for Writer<W> {
        fn tell(&mut self) -> Result<u64, BamError> {
            self.0.stream_position().map_err(BamError::IoError)
        }

        fn flush_try(&mut self) -> Result<(), BamError> {
            self.0.flush().map_err(BamError::IoError)
        }
    }
}
