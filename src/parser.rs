//! Incremental reader for the bulk artifact.
//!
//! The artifact is a single JSON array that can run to gigabytes, so it is
//! never decoded as a whole. A byte-level state machine walks the array,
//! tracking nesting depth and string/escape state, and captures the bytes of
//! one element at a time. Each captured object is decoded on its own; an
//! element that is not an object, or that fails to decode, is logged and
//! skipped without aborting the scan.
//!
//! A raw newline can never occur inside a JSON string, so one seen while the
//! scanner believes it is inside a string means a quote went missing. The
//! element is dropped and the scan resumes at the next line that starts with
//! `{`, which is where the next record begins in the one-record-per-line
//! feed. A broken string in a document written on a single line still
//! swallows everything up to the next quote that happens to rebalance it.
//!
//! At any moment the reader holds the bytes of at most one element plus the
//! batch currently being filled.

use crate::error::{IngestError, Result};
use crate::models::CardRecord;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

const READ_BUFFER: usize = 256 * 1024;

/// Where the scanner is relative to the top-level array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Before the opening `[`.
    AwaitingArray,
    /// After `[` or `,`; the next token starts an element.
    AwaitingElement,
    /// Inside an object element.
    InRecord,
    /// Inside an element that is not an object; it will be discarded.
    InFragment,
    /// After a complete element, expecting `,` or `]`.
    AfterElement,
    /// After a broken string; waiting for a line that starts with `{`.
    Resync,
    /// The closing `]` was seen, or input ended.
    Done,
}

/// What a single byte did to the scan.
enum Event {
    RecordClosed,
    FragmentClosed,
    FragmentClosedAtEnd,
    EmptyElement,
    BrokenString,
    NotAnArray(u8),
}

/// Byte-level state machine. Kept apart from the reader so both can be
/// borrowed at once while a buffer is being walked.
struct Machine {
    state: ScanState,
    depth: usize,
    in_string: bool,
    escaped: bool,
    line_start: bool,
    element: Vec<u8>,
    element_start: u64,
    offset: u64,
}

impl Machine {
    fn new() -> Self {
        Self {
            state: ScanState::AwaitingArray,
            depth: 0,
            in_string: false,
            escaped: false,
            line_start: false,
            element: Vec::new(),
            element_start: 0,
            offset: 0,
        }
    }

    fn begin(&mut self, state: ScanState, byte: u8) {
        self.element.clear();
        self.element.push(byte);
        self.element_start = self.offset;
        self.state = state;
        self.escaped = false;
        self.in_string = byte == b'"';
        self.depth = usize::from(byte == b'{' || byte == b'[');
    }

    /// Track string and escape state. Returns true when `byte` was string content.
    fn string_byte(&mut self, byte: u8) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
            }
            return true;
        }
        if byte == b'"' {
            self.in_string = true;
            return true;
        }
        false
    }

    fn step(&mut self, byte: u8) -> Option<Event> {
        let broken = byte == b'\n'
            && self.in_string
            && matches!(self.state, ScanState::InRecord | ScanState::InFragment);
        let event = match self.state {
            _ if broken => {
                self.in_string = false;
                self.escaped = false;
                self.line_start = true;
                self.state = ScanState::Resync;
                Some(Event::BrokenString)
            }
            ScanState::AwaitingArray => match byte {
                b'[' => {
                    self.state = ScanState::AwaitingElement;
                    None
                }
                // UTF-8 byte order mark
                0xEF | 0xBB | 0xBF if self.offset < 3 => None,
                b if b.is_ascii_whitespace() => None,
                b => Some(Event::NotAnArray(b)),
            },
            ScanState::AwaitingElement => match byte {
                b'{' => {
                    self.begin(ScanState::InRecord, byte);
                    None
                }
                b']' => {
                    self.state = ScanState::Done;
                    None
                }
                b',' => Some(Event::EmptyElement),
                b if b.is_ascii_whitespace() => None,
                b => {
                    self.begin(ScanState::InFragment, b);
                    None
                }
            },
            ScanState::InRecord => {
                self.element.push(byte);
                if self.string_byte(byte) {
                    None
                } else {
                    match byte {
                        b'{' | b'[' => {
                            self.depth += 1;
                            None
                        }
                        b'}' | b']' => {
                            self.depth = self.depth.saturating_sub(1);
                            if self.depth == 0 {
                                self.state = ScanState::AfterElement;
                                Some(Event::RecordClosed)
                            } else {
                                None
                            }
                        }
                        _ => None,
                    }
                }
            }
            ScanState::InFragment => {
                if self.string_byte(byte) {
                    self.element.push(byte);
                    None
                } else {
                    match byte {
                        b',' if self.depth == 0 => {
                            self.state = ScanState::AwaitingElement;
                            Some(Event::FragmentClosed)
                        }
                        b']' if self.depth == 0 => {
                            self.state = ScanState::Done;
                            Some(Event::FragmentClosedAtEnd)
                        }
                        b'{' | b'[' => {
                            self.element.push(byte);
                            self.depth += 1;
                            None
                        }
                        b'}' | b']' => {
                            self.element.push(byte);
                            self.depth = self.depth.saturating_sub(1);
                            None
                        }
                        b => {
                            self.element.push(b);
                            None
                        }
                    }
                }
            }
            ScanState::AfterElement => match byte {
                b',' => {
                    self.state = ScanState::AwaitingElement;
                    None
                }
                b']' => {
                    self.state = ScanState::Done;
                    None
                }
                // Missing comma between two objects; pick the next one up.
                b'{' => {
                    self.begin(ScanState::InRecord, byte);
                    None
                }
                b if b.is_ascii_whitespace() => None,
                b => {
                    self.begin(ScanState::InFragment, b);
                    None
                }
            },
            ScanState::Resync => match byte {
                b'\n' => {
                    self.line_start = true;
                    None
                }
                b'{' if self.line_start => {
                    self.begin(ScanState::InRecord, byte);
                    None
                }
                b']' if self.line_start => {
                    self.state = ScanState::Done;
                    None
                }
                b if b.is_ascii_whitespace() => None,
                _ => {
                    self.line_start = false;
                    None
                }
            },
            ScanState::Done => None,
        };
        self.offset += 1;
        event
    }
}

// ---------------------------------------------------------------------------
// RecordScanner
// ---------------------------------------------------------------------------

/// Pulls one decoded record at a time out of a JSON array.
pub struct RecordScanner<R> {
    reader: R,
    machine: Machine,
    skipped: usize,
}

impl<R: BufRead> RecordScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            machine: Machine::new(),
            skipped: 0,
        }
    }

    /// Number of elements discarded so far.
    pub fn skipped_fragments(&self) -> usize {
        self.skipped
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.machine.offset
    }

    /// Read until the next well-formed record, or the end of the array.
    ///
    /// Malformed elements are skipped. Only a document that is not an array at
    /// all, or a failing read, is an error.
    pub fn next_record(&mut self) -> Result<Option<CardRecord>> {
        loop {
            if self.machine.state == ScanState::Done {
                return Ok(None);
            }

            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                self.finish_input()?;
                return Ok(None);
            }

            let mut consumed = 0;
            let mut closed = None;
            for &byte in buf {
                consumed += 1;
                if let Some(event) = self.machine.step(byte) {
                    closed = Some(event);
                    break;
                }
                if self.machine.state == ScanState::Done {
                    break;
                }
            }
            self.reader.consume(consumed);

            let Some(event) = closed else {
                continue;
            };
            match event {
                Event::RecordClosed => {
                    match serde_json::from_slice::<CardRecord>(&self.machine.element) {
                        Ok(record) => {
                            self.machine.element.clear();
                            return Ok(Some(record));
                        }
                        Err(e) => self.skip(&format!("record does not decode: {}", e)),
                    }
                }
                Event::FragmentClosed | Event::FragmentClosedAtEnd => {
                    self.skip("array element is not an object");
                }
                Event::BrokenString => {
                    self.skip("string not terminated before end of line");
                }
                Event::EmptyElement => {
                    self.machine.element_start = self.machine.offset.saturating_sub(1);
                    self.machine.element.clear();
                    self.skip("empty array element");
                }
                Event::NotAnArray(byte) => {
                    self.machine.state = ScanState::Done;
                    return Err(IngestError::MalformedDocument(format!(
                        "expected '[' at byte {}, found {:?}",
                        self.machine.offset - 1,
                        char::from(byte)
                    )));
                }
            }
        }
    }

    fn skip(&mut self, reason: &str) {
        self.skipped += 1;
        warn!(
            offset = self.machine.element_start,
            len = self.machine.element.len(),
            reason,
            "skipping malformed fragment"
        );
        self.machine.element.clear();
    }

    fn finish_input(&mut self) -> Result<()> {
        let state = self.machine.state;
        self.machine.state = ScanState::Done;
        match state {
            ScanState::AwaitingArray => Err(IngestError::MalformedDocument(
                "document is empty".to_string(),
            )),
            ScanState::InRecord | ScanState::InFragment => {
                self.skip("input ended inside an element");
                Ok(())
            }
            ScanState::AwaitingElement | ScanState::AfterElement | ScanState::Resync => {
                warn!(offset = self.machine.offset, "input ended before closing ']'");
                Ok(())
            }
            ScanState::Done => Ok(()),
        }
    }
}

impl<R: BufRead> Iterator for RecordScanner<R> {
    type Item = Result<CardRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

// ---------------------------------------------------------------------------
// RecordBatches
// ---------------------------------------------------------------------------

/// Lazy sequence of record batches of at most `batch_size` records.
///
/// The final batch may be short; no batch is ever empty. After the first
/// error the sequence ends.
pub struct RecordBatches<R> {
    scanner: RecordScanner<R>,
    batch_size: usize,
    finished: bool,
    emitted: usize,
}

impl<R: BufRead> RecordBatches<R> {
    pub fn new(reader: R, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(IngestError::InvalidArgument(
                "batch size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            scanner: RecordScanner::new(reader),
            batch_size,
            finished: false,
            emitted: 0,
        })
    }

    pub fn skipped_fragments(&self) -> usize {
        self.scanner.skipped_fragments()
    }
}

impl<R: BufRead> Iterator for RecordBatches<R> {
    type Item = Result<Vec<CardRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match self.scanner.next_record() {
                Ok(Some(record)) => batch.push(record),
                Ok(None) => {
                    self.finished = true;
                    break;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }

        if batch.is_empty() {
            return None;
        }
        self.emitted += 1;
        debug!(
            batch = self.emitted,
            records = batch.len(),
            offset = self.scanner.offset(),
            "batch ready"
        );
        Some(Ok(batch))
    }
}

/// Open an artifact for batched reading. Files ending in `.gz` are
/// decompressed on the fly.
pub fn open_batches(path: &Path, batch_size: usize) -> Result<RecordBatches<Box<dyn BufRead>>> {
    let file = File::open(path)?;
    let reader: Box<dyn BufRead> = if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Box::new(BufReader::with_capacity(READ_BUFFER, GzDecoder::new(file)))
    } else {
        Box::new(BufReader::with_capacity(READ_BUFFER, file))
    };
    RecordBatches::new(reader, batch_size)
}
