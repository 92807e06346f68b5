//! Input sources for the tokenizer.
//!
//! The tokenizer pulls bytes in fixed-size chunks rather than slurping whole
//! files, so large inputs never sit in memory twice. Anything that can hand
//! over bytes chunk by chunk can feed it.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// A chunked byte source. `Ok(0)` means end of input; reading again after
/// end of input must keep returning `Ok(0)`.
pub trait Reader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Reads from a file on disk.
pub struct FileReader {
    file: File,
}

impl FileReader {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            file: File::open(path)?,
        })
    }
}

impl Reader for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

/// Reads from an in-memory string. Used by tests and `-e`-style input.
pub struct StrReader {
    bytes: Vec<u8>,
    cursor: usize,
}

impl StrReader {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            bytes: source.into().into_bytes(),
            cursor: 0,
        }
    }
}

impl Reader for StrReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.bytes[self.cursor..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.cursor += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_reader_chunks_and_stays_eof() {
        let mut reader = StrReader::new("abcdef");
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }
}
