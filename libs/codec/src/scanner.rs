//! # Record Boundary Scanner
//!
//! ## Purpose
//!
//! Walks a trace once and produces one [`RecordSpan`] per top-level message
//! so that messages can later be read by index without rescanning.
//!
//! ## Separator scanning
//!
//! ```text
//!            read B bytes          read B bytes
//! file:  [......$$__|$$......]  [....$$__$$....]
//!                  ↑ separator straddles the buffer boundary
//! window: tail(prev, SEP-1) ++ current  → every separator is seen exactly once
//! ```
//!
//! A `buffer_size` of zero reads the whole trace in one go.

use crate::error::{TraceError, TraceResult};
use crate::framing::{LENGTH_PREFIX_SIZE, SEPARATOR};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use tracing::debug;

/// Location of one record inside the (decompressed) trace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpan {
    /// Start of the record, including any length prefix
    pub offset: u64,
    /// First payload byte
    pub payload_start: u64,
    /// Payload length in bytes
    pub len: u64,
}

impl RecordSpan {
    pub fn payload_end(&self) -> u64 {
        self.payload_start + self.len
    }
}

/// Scan a length-prefixed trace of `total_len` bytes.
pub fn scan_length_prefixed<R: Read + Seek>(reader: R, total_len: u64) -> TraceResult<Vec<RecordSpan>> {
    let mut reader = BufReader::new(reader);
    reader
        .seek(SeekFrom::Start(0))
        .map_err(|e| TraceError::io("<trace>", e))?;

    let mut spans = Vec::new();
    let mut offset = 0u64;

    while offset < total_len {
        let remaining = total_len - offset;
        if remaining < LENGTH_PREFIX_SIZE {
            return Err(TraceError::truncated_record(offset, LENGTH_PREFIX_SIZE, 0));
        }

        let len = u64::from(
            reader
                .read_u32::<LittleEndian>()
                .map_err(|e| TraceError::io("<trace>", e))?,
        );
        let available = remaining - LENGTH_PREFIX_SIZE;
        if len > available {
            return Err(TraceError::truncated_record(offset, len, available));
        }

        spans.push(RecordSpan {
            offset,
            payload_start: offset + LENGTH_PREFIX_SIZE,
            len,
        });

        reader
            .seek_relative(len as i64)
            .map_err(|e| TraceError::io("<trace>", e))?;
        offset += LENGTH_PREFIX_SIZE + len;
    }

    debug!("Indexed {} length-prefixed records ({} bytes)", spans.len(), total_len);
    Ok(spans)
}

/// Scan a separator-delimited trace and return record start offsets plus the
/// total number of bytes consumed.
///
/// The first record implicitly starts at 0; each separator contributes the
/// offset of the byte following it. A trailing separator with no payload
/// behind it does not start a record.
pub fn scan_separator_offsets<R: Read>(mut reader: R, buffer_size: usize) -> TraceResult<(Vec<u64>, u64)> {
    let sep_len = SEPARATOR.len();
    let mut offsets = vec![0u64];
    let mut window: Vec<u8> = Vec::new();
    let mut window_start = 0u64;
    let mut next_search = 0u64;
    let mut chunk = vec![0u8; buffer_size.max(1)];

    loop {
        let read = if buffer_size == 0 {
            let before = window.len();
            reader
                .read_to_end(&mut window)
                .map_err(|e| TraceError::io("<trace>", e))?;
            window.len() - before
        } else {
            let n = read_full(&mut reader, &mut chunk).map_err(|e| TraceError::io("<trace>", e))?;
            window.extend_from_slice(&chunk[..n]);
            n
        };

        // Cut every separator visible in the current window
        let mut pos = (next_search - window_start) as usize;
        while let Some(found) = find(&window[pos..], SEPARATOR) {
            let end = window_start + (pos + found + sep_len) as u64;
            offsets.push(end);
            next_search = end;
            pos += found + sep_len;
        }

        // Keep only what could still be the head of a straddling separator
        let keep_from = window
            .len()
            .saturating_sub(sep_len - 1)
            .max((next_search - window_start) as usize)
            .min(window.len());
        window.drain(..keep_from);
        window_start += keep_from as u64;

        if read == 0 || buffer_size == 0 {
            break;
        }
    }

    let total_len = window_start + window.len() as u64;
    if offsets.last() == Some(&total_len) {
        offsets.pop();
    }

    validate_offsets(&offsets, sep_len as u64)?;
    debug!("Indexed {} separator-delimited records ({} bytes)", offsets.len(), total_len);
    Ok((offsets, total_len))
}

/// Turn separator offsets into payload spans.
pub fn separator_spans(offsets: &[u64], total_len: u64) -> Vec<RecordSpan> {
    let sep_len = SEPARATOR.len() as u64;
    offsets
        .iter()
        .enumerate()
        .map(|(i, &offset)| {
            let end = offsets
                .get(i + 1)
                .map(|next| next - sep_len)
                .unwrap_or(total_len);
            RecordSpan {
                offset,
                payload_start: offset,
                len: end - offset,
            }
        })
        .collect()
}

/// Offsets must be strictly increasing and at least one separator apart.
pub fn validate_offsets(offsets: &[u64], min_delta: u64) -> TraceResult<()> {
    for pair in offsets.windows(2) {
        if pair[1] <= pair[0] {
            return Err(TraceError::invalid_framing(
                pair[1],
                format!("offset {} does not follow {}", pair[1], pair[0]),
            ));
        }
        if pair[1] - pair[0] < min_delta {
            return Err(TraceError::invalid_framing(
                pair[1],
                format!(
                    "records at {} and {} are closer than the separator length {}",
                    pair[0], pair[1], min_delta
                ),
            ));
        }
    }
    Ok(())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Fill `buf` as far as the reader allows; returns 0 only at EOF.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
