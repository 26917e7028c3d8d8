//! Verbatim copy of consumed records.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Best-effort mirror of every consumed record.
///
/// The first write failure is logged once and disables the tee; correlation
/// carries on regardless.
pub struct Tee<W: Write> {
    sink: Option<W>,
    target: String,
}

impl Tee<BufWriter<File>> {
    /// Create (truncating) `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file), path.display().to_string()))
    }
}

impl<W: Write> Tee<W> {
    pub fn new(sink: W, target: impl Into<String>) -> Self {
        Self {
            sink: Some(sink),
            target: target.into(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.sink.is_some()
    }

    /// Append raw bytes exactly as read.
    pub fn write(&mut self, raw: &[u8]) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if let Err(e) = sink.write_all(raw) {
            self.disable(&e);
        }
    }

    pub fn flush(&mut self) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if let Err(e) = sink.flush() {
            self.disable(&e);
        }
    }

    /// The sink, if still active.
    pub fn into_inner(self) -> Option<W> {
        self.sink
    }

    fn disable(&mut self, error: &io::Error) {
        log::warn!("Stopped writing {}: {error}", self.target);
        self.sink = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts `budget` bytes, then fails every write.
    struct Flaky {
        written: Vec<u8>,
        budget: usize,
    }

    impl Write for Flaky {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written.len() + buf.len() > self.budget {
                return Err(io::Error::other("disk full"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writes_verbatim() {
        let mut tee = Tee::new(Vec::new(), "memory");
        tee.write(b"a,b\r\n");
        tee.write(b"c,\"d\"\n");
        tee.flush();
        assert_eq!(tee.into_inner().unwrap(), b"a,b\r\nc,\"d\"\n");
    }

    #[test]
    fn test_failure_disables_without_panicking() {
        let mut tee = Tee::new(
            Flaky {
                written: Vec::new(),
                budget: 4,
            },
            "flaky",
        );
        tee.write(b"abc\n");
        assert!(tee.is_active());

        tee.write(b"def\n");
        assert!(!tee.is_active());
        // Further writes are dropped silently
        tee.write(b"ghi\n");
        tee.flush();
        assert!(tee.into_inner().is_none());
    }

    #[test]
    fn test_create_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copy.csv");

        let mut tee = Tee::create(&path).unwrap();
        tee.write(b"start,1\n");
        tee.flush();
        drop(tee);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "start,1\n");
    }
}
