/// Default line buffer size in bytes.
pub const DEFAULT_CAPACITY: usize = 512;

/// Splits a byte stream into text lines.
///
/// `\r` and `\n` both terminate a line and runs of them collapse, so
/// empty lines never come out. A line longer than the capacity is thrown
/// away whole: the buffered prefix is discarded and everything up to the
/// next separator is skipped, after which framing resumes normally.
#[derive(Debug)]
pub struct LineAssembler {
    buf: Vec<u8>,
    capacity: usize,
    skipping: bool,
    dropped: u64,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            skipping: false,
            dropped: 0,
        }
    }

    /// Consume `bytes`, returning every line completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\n' || byte == b'\r' {
                if self.skipping {
                    self.skipping = false;
                } else if !self.buf.is_empty() {
                    lines.push(self.take());
                }
                continue;
            }
            if self.skipping {
                continue;
            }
            if self.buf.len() >= self.capacity {
                self.buf.clear();
                self.skipping = true;
                self.dropped += 1;
                continue;
            }
            self.buf.push(byte);
        }
        lines
    }

    /// Emit whatever is buffered as a final line (used when the stream
    /// goes quiet without a trailing separator).
    pub fn finish(&mut self) -> Option<String> {
        self.skipping = false;
        (!self.buf.is_empty()).then(|| self.take())
    }

    /// Forget any partial line, e.g. after the input was flushed.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.skipping = false;
    }

    /// Overlong lines discarded so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn take(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        line
    }
}
