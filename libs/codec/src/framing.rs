//! # Trace Record Framing
//!
//! Two on-disk layouts are understood:
//!
//! ```text
//! Length-prefixed (default):  [u32 LE len][payload ...][u32 LE len][payload ...]
//! Separator (legacy .txt):    [payload ...]$$__$$[payload ...]$$__$$[payload ...]
//! ```
//!
//! Either layout may be wrapped in XZ/LZMA; the compression suffix is
//! stripped before the framing is detected from the remaining extension.

use crate::error::TraceError;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Legacy record separator
pub const SEPARATOR: &[u8] = b"$$__$$";

/// Size of the little-endian length prefix
pub const LENGTH_PREFIX_SIZE: u64 = 4;

/// Default read buffer for separator scanning (bytes)
pub const DEFAULT_SCAN_BUFFER: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    LengthPrefixed,
    Separator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    /// `.xz` or `.lzma`; both go through the auto-detecting decoder
    Lzma,
}

impl Compression {
    pub fn detect(path: &Path) -> Self {
        match extension(path).as_deref() {
            Some("xz") | Some("lzma") => Compression::Lzma,
            _ => Compression::None,
        }
    }
}

impl Framing {
    /// Detect framing from the file name, ignoring a compression suffix.
    ///
    /// `.txt` selects the legacy separator framing; everything else is
    /// length-prefixed.
    pub fn detect(path: &Path) -> Self {
        let inner = match Compression::detect(path) {
            Compression::Lzma => path.file_stem().map(Path::new).and_then(extension),
            Compression::None => extension(path),
        };

        match inner.as_deref() {
            Some("txt") => Framing::Separator,
            _ => Framing::LengthPrefixed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Framing::LengthPrefixed => "length",
            Framing::Separator => "separator",
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framing {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "length" | "length-prefixed" | "osi" => Ok(Framing::LengthPrefixed),
            "separator" | "txt" => Ok(Framing::Separator),
            _ => Err(TraceError::UnknownFraming(s.to_string())),
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
