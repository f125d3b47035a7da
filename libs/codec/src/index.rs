//! # Trace Index and Message Cache
//!
//! ## Purpose
//!
//! Locates every top-level message of a trace once, then serves messages by
//! index. Decoding is lazy and bounded: the driver asks for one "blast"
//! `[begin, end)` at a time, which is read with a single contiguous I/O and
//! decoded into the [`MessageCache`]; the previous blast is dropped first.
//!
//! ## Failure semantics
//!
//! - Framing violations are fatal and surface from [`TraceIndex::open`]
//! - A record that fails to decode is kept in the cache as an `Err` so the
//!   driver can report it at that timestamp and move on

use crate::error::{TraceError, TraceResult};
use crate::framing::{Framing, DEFAULT_SCAN_BUFFER};
use crate::scanner::{scan_length_prefixed, scan_separator_offsets, separator_spans, RecordSpan};
use crate::source::TraceSource;
use prost_reflect::{DynamicMessage, MessageDescriptor};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info, warn};

/// Decode outcome of one cached record
pub type CachedMessage = Result<DynamicMessage, prost::DecodeError>;

/// Decoded messages of the current blast
#[derive(Debug, Default)]
pub struct MessageCache {
    begin: usize,
    entries: Vec<CachedMessage>,
}

impl MessageCache {
    pub fn begin(&self) -> usize {
        self.begin
    }

    /// One past the last cached index
    pub fn end(&self) -> usize {
        self.begin + self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.begin && index < self.end()
    }

    pub fn get(&self, index: usize) -> Option<&CachedMessage> {
        if self.contains(index) {
            self.entries.get(index - self.begin)
        } else {
            None
        }
    }

    /// `(trace index, decode outcome)` pairs in trace order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &CachedMessage)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(move |(i, entry)| (self.begin + i, entry))
    }

    fn clear(&mut self) {
        self.begin = 0;
        self.entries.clear();
    }
}

/// Random-access index over the records of one trace
#[derive(Debug)]
pub struct TraceIndex {
    source: TraceSource,
    framing: Framing,
    descriptor: MessageDescriptor,
    spans: Vec<RecordSpan>,
    cache: MessageCache,
}

impl TraceIndex {
    /// Open and index a trace.
    ///
    /// `framing` overrides extension-based detection. `buffer_size` only
    /// affects separator scanning; zero reads the whole trace at once.
    pub fn open(
        path: impl AsRef<Path>,
        framing: Option<Framing>,
        descriptor: MessageDescriptor,
        buffer_size: usize,
    ) -> TraceResult<Self> {
        let path = path.as_ref();
        let framing = framing.unwrap_or_else(|| Framing::detect(path));
        let source = TraceSource::open(path)?;
        Self::from_source(source, framing, descriptor, buffer_size)
    }

    /// Index an already opened source.
    pub fn from_source(
        source: TraceSource,
        framing: Framing,
        descriptor: MessageDescriptor,
        buffer_size: usize,
    ) -> TraceResult<Self> {
        let mut file = source.file();
        file.seek(SeekFrom::Start(0))
            .map_err(|e| TraceError::io(source.path(), e))?;

        let spans = match framing {
            Framing::LengthPrefixed => scan_length_prefixed(file, source.len())?,
            Framing::Separator => {
                warn!(
                    "{}: separator-delimited traces are deprecated, re-record with length-prefixed framing",
                    source.path().display()
                );
                let (offsets, total_len) = scan_separator_offsets(file, buffer_size)?;
                separator_spans(&offsets, total_len)
            }
        };

        info!(
            "Indexed {} messages of type {} in {} ({} framing)",
            spans.len(),
            descriptor.full_name(),
            source.path().display(),
            framing
        );

        Ok(Self {
            source,
            framing,
            descriptor,
            spans,
            cache: MessageCache::default(),
        })
    }

    /// Index with the default scan buffer
    pub fn open_default(path: impl AsRef<Path>, descriptor: MessageDescriptor) -> TraceResult<Self> {
        Self::open(path, None, descriptor, DEFAULT_SCAN_BUFFER)
    }

    /// Number of top-level messages
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    pub fn spans(&self) -> &[RecordSpan] {
        &self.spans
    }

    /// Record start offsets
    pub fn offsets(&self) -> Vec<u64> {
        self.spans.iter().map(|s| s.offset).collect()
    }

    pub fn path(&self) -> &Path {
        self.source.path()
    }

    pub fn cache(&self) -> &MessageCache {
        &self.cache
    }

    /// Decode message `index`, served from the cache when present.
    pub fn get_message_by_index(&self, index: usize) -> TraceResult<DynamicMessage> {
        if let Some(entry) = self.cache.get(index) {
            return entry.clone().map_err(|source| TraceError::Decode { index, source });
        }

        let span = self.span(index)?;
        let mut payload = vec![0u8; span.len as usize];
        self.read_at(span.payload_start, &mut payload)?;
        DynamicMessage::decode(self.descriptor.clone(), payload.as_slice())
            .map_err(|source| TraceError::Decode { index, source })
    }

    /// Replace the cache with the decoded messages `[begin, end)`.
    ///
    /// `end` is clamped to the trace length. Records are fetched with one
    /// contiguous read.
    pub fn cache_range(&mut self, begin: usize, end: usize) -> TraceResult<()> {
        self.cache.clear();

        let end = end.min(self.spans.len());
        if begin >= end {
            self.cache.begin = begin;
            return Ok(());
        }

        let first = self.spans[begin];
        let last = self.spans[end - 1];
        let base = first.offset;
        let mut buffer = vec![0u8; (last.payload_end() - base) as usize];
        self.read_at(base, &mut buffer)?;

        let descriptor = &self.descriptor;
        let entries = self.spans[begin..end]
            .iter()
            .map(|span| {
                let start = (span.payload_start - base) as usize;
                let stop = (span.payload_end() - base) as usize;
                DynamicMessage::decode(descriptor.clone(), &buffer[start..stop])
            })
            .collect::<Vec<_>>();

        let failed = entries.iter().filter(|e| e.is_err()).count();
        debug!(
            "Cached messages [{}, {}) ({} bytes, {} decode failures)",
            begin,
            end,
            buffer.len(),
            failed
        );

        self.cache = MessageCache { begin, entries };
        Ok(())
    }

    fn span(&self, index: usize) -> TraceResult<RecordSpan> {
        self.spans.get(index).copied().ok_or(TraceError::IndexOutOfRange {
            index,
            count: self.spans.len(),
        })
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> TraceResult<()> {
        let mut file = self.source.file();
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.read_exact(buf))
            .map_err(|e| TraceError::io(self.source.path(), e))
    }
}
