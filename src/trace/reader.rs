//! Record reader for batch and follow mode.
//!
//! Records are split one physical line at a time. That keeps follow mode
//! simple: a line that is still being written (no terminating newline yet)
//! is held back until the producer finishes it, and the reader reports
//! [`Poll::Idle`] instead of blocking so the caller can refresh the display
//! and check for cancellation before waiting.
//!
//! ```text
//!   Reading ──EOF (follow)──▶ Waiting ──poll──▶ Reading
//!      │
//!      └──EOF (batch)──▶ Stopped
//! ```

use std::io::{self, BufRead};

use super::error::{RowError, RowErrorKind};

/// One physical record of the trace.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 1-based line number in the source
    pub line: u64,
    /// The record exactly as read, including its line terminator
    pub raw: String,
    pub fields: csv::StringRecord,
}

impl RawRecord {
    /// Fields as string slices.
    pub fn cells(&self) -> Vec<&str> {
        self.fields.iter().collect()
    }
}

/// Split one CSV line into a record.
pub fn split_line(line: u64, raw: String) -> Result<RawRecord, RowError> {
    let fields = split_fields(line, &raw)?;
    Ok(RawRecord { line, raw, fields })
}

fn split_fields(line: u64, raw: &str) -> Result<csv::StringRecord, RowError> {
    let mut fields = csv::StringRecord::new();
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(raw.as_bytes())
        .read_record(&mut fields)
        .map_err(|e| RowError::new(line, RowErrorKind::Csv(e.to_string())))?;
    Ok(fields)
}

/// Reader state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Reading,
    /// Caught up with the producer; next poll retries
    Waiting,
    /// End of a batch stream; never leaves this state
    Stopped,
}

/// Result of one read attempt.
#[derive(Debug)]
pub enum Poll {
    Record(RawRecord),
    /// Line that cannot be split into fields; it still counts as consumed
    Malformed { raw: Vec<u8>, error: RowError },
    /// Follow mode found no complete line; retry after a pause
    Idle,
    /// Batch mode reached end of stream
    End,
}

/// Line-oriented trace reader over any buffered source.
pub struct RecordReader<R> {
    inner: R,
    follow: bool,
    line: u64,
    partial: Vec<u8>,
    /// Drop the rest of a line that was half-written when skipping
    discard_partial: bool,
    state: ReaderState,
}

impl<R: BufRead> RecordReader<R> {
    /// Read to end of stream once.
    pub fn batch(inner: R) -> Self {
        Self::new(inner, false)
    }

    /// Tail the stream: end of data means "not yet", never "done".
    pub fn follow(inner: R) -> Self {
        Self::new(inner, true)
    }

    fn new(inner: R, follow: bool) -> Self {
        Self {
            inner,
            follow,
            line: 0,
            partial: Vec::new(),
            discard_partial: false,
            state: ReaderState::Reading,
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Number of lines consumed so far.
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Attempt to read the next non-blank record.
    pub fn poll(&mut self) -> io::Result<Poll> {
        loop {
            let Some(bytes) = self.next_line()? else {
                return Ok(match self.state {
                    ReaderState::Stopped => Poll::End,
                    _ => Poll::Idle,
                });
            };

            if bytes.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let raw = match String::from_utf8(bytes) {
                Ok(raw) => raw,
                Err(e) => {
                    let error = RowError::new(self.line, RowErrorKind::Encoding);
                    return Ok(Poll::Malformed {
                        raw: e.into_bytes(),
                        error,
                    });
                }
            };

            return Ok(match split_fields(self.line, &raw) {
                Ok(fields) => Poll::Record(RawRecord {
                    line: self.line,
                    raw,
                    fields,
                }),
                Err(error) => Poll::Malformed {
                    raw: raw.into_bytes(),
                    error,
                },
            });
        }
    }

    /// Consume everything currently in the stream without yielding it.
    ///
    /// Follow mode starts at the end of existing data. Lines are counted
    /// rather than seeked past so later records keep true line numbers.
    pub fn skip_existing(&mut self) -> io::Result<u64> {
        let before = self.line;
        while self.next_line()?.is_some() {}
        self.discard_partial = !self.partial.is_empty();
        if self.state == ReaderState::Waiting {
            self.state = ReaderState::Reading;
        }
        Ok(self.line - before)
    }

    /// Next complete line, `None` when the source has nothing more right now.
    fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.state == ReaderState::Stopped {
            return Ok(None);
        }

        loop {
            let read = self.inner.read_until(b'\n', &mut self.partial)?;

            if read == 0 {
                if self.follow {
                    self.state = ReaderState::Waiting;
                    return Ok(None);
                }
                self.state = ReaderState::Stopped;
                // A final line without terminator still counts in batch mode
                if self.partial.is_empty() {
                    return Ok(None);
                }
                self.line += 1;
                return Ok(Some(std::mem::take(&mut self.partial)));
            }

            self.state = ReaderState::Reading;
            // read_until stops short of '\n' only at end of data; in follow
            // mode the producer has not finished the line yet
            if self.partial.last() != Some(&b'\n') {
                continue;
            }

            self.line += 1;
            let line = std::mem::take(&mut self.partial);
            if std::mem::take(&mut self.discard_partial) {
                continue;
            }
            return Ok(Some(line));
        }
    }
}
