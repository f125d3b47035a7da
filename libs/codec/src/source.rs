//! Trace byte source
//!
//! Plain traces are read in place. XZ/LZMA traces are streamed through the
//! auto-detecting decoder into an anonymous temporary file once, so that the
//! index can seek freely afterwards without holding the trace in memory.

use crate::error::{TraceError, TraceResult};
use crate::framing::Compression;
use std::fs::File;
use std::io::{self, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use xz2::read::XzDecoder;
use xz2::stream::Stream;

/// Seekable, fully decompressed view of a trace file
#[derive(Debug)]
pub struct TraceSource {
    file: File,
    len: u64,
    path: PathBuf,
    compression: Compression,
}

impl TraceSource {
    /// Open `path`, decompressing according to its extension.
    pub fn open(path: impl AsRef<Path>) -> TraceResult<Self> {
        let path = path.as_ref();
        let compression = Compression::detect(path);
        let file = File::open(path).map_err(|e| TraceError::io(path, e))?;

        let mut file = match compression {
            Compression::None => file,
            Compression::Lzma => decompress_to_tempfile(path, file)?,
        };

        let len = file
            .seek(SeekFrom::End(0))
            .map_err(|e| TraceError::io(path, e))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| TraceError::io(path, e))?;

        debug!(
            "Opened trace {} ({} bytes, compression: {:?})",
            path.display(),
            len,
            compression
        );

        Ok(Self {
            file,
            len,
            path: path.to_path_buf(),
            compression,
        })
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    /// Decompressed length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }
}

fn decompress_to_tempfile(path: &Path, file: File) -> TraceResult<File> {
    let stream = Stream::new_auto_decoder(u64::MAX, 0).map_err(|e| TraceError::Decompression {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut decoder = XzDecoder::new_stream(BufReader::new(file), stream);
    let mut out = tempfile::tempfile().map_err(|e| TraceError::io(path, e))?;

    let written = io::copy(&mut decoder, &mut out).map_err(|e| TraceError::Decompression {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    info!("Decompressed {} into {} bytes", path.display(), written);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use xz2::write::XzEncoder;

    #[test]
    fn test_plain_source_reports_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.osi");
        std::fs::write(&path, b"0123456789").unwrap();

        let source = TraceSource::open(&path).unwrap();
        assert_eq!(source.len(), 10);
        assert_eq!(source.compression(), Compression::None);
    }

    #[test]
    fn test_xz_source_is_decompressed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.osi.xz");
        let payload = b"hello compressed trace".repeat(50);

        let mut encoder = XzEncoder::new(Vec::new(), 6);
        encoder.write_all(&payload).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let source = TraceSource::open(&path).unwrap();
        assert_eq!(source.len(), payload.len() as u64);

        let mut read_back = Vec::new();
        let mut file = source.file();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.read_to_end(&mut read_back).unwrap();
        assert_eq!(read_back, payload);
    }

    #[test]
    fn test_corrupt_xz_is_decompression_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.osi.xz");
        std::fs::write(&path, b"definitely not xz").unwrap();

        let err = TraceSource::open(&path).unwrap_err();
        assert!(matches!(err, TraceError::Decompression { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = TraceSource::open("/nonexistent/trace.osi").unwrap_err();
        assert!(matches!(err, TraceError::Io { .. }));
    }
}
