//! Newline framing for the relay's line protocol.
//!
//! TCP hands us arbitrary chunks: several messages in one read, or one message
//! spread over many reads. [`LineFramer`] carries the unterminated tail from one
//! read to the next so callers only ever see whole lines.

pub const DELIMITER: u8 = b'\n';

/// Longest line accepted, in bytes, excluding the delimiter.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Accumulates raw bytes and yields complete lines.
///
/// Bytes are buffered rather than decoded eagerly, so a multi-byte UTF-8
/// character split across two reads is reassembled before decoding.
///
/// A line longer than the limit is discarded up to its delimiter and counted;
/// see [`LineFramer::take_dropped`].
#[derive(Debug, Clone)]
pub struct LineFramer {
    carry: Vec<u8>,
    max_line: usize,
    // Skipping the rest of an oversized line
    discarding: bool,
    dropped: usize,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            carry: Vec::new(),
            max_line,
            discarding: false,
            dropped: 0,
        }
    }

    /// Appends `bytes` and returns every line completed by them.
    ///
    /// Lines come back exactly as received minus the `\n`; lines that are
    /// blank are skipped. A zero-length slice is simply "nothing new" and
    /// returns no lines.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = bytes;

        while let Some(offset) = rest.iter().position(|&b| b == DELIMITER) {
            let segment = &rest[..offset];
            rest = &rest[offset + 1..];

            if self.discarding {
                self.discarding = false;
            } else if self.carry.len() + segment.len() > self.max_line {
                self.carry.clear();
                self.dropped += 1;
            } else {
                self.carry.extend_from_slice(segment);
                let line = String::from_utf8_lossy(&self.carry);
                if !line.trim().is_empty() {
                    lines.push(line.into_owned());
                }
                self.carry.clear();
            }
        }

        if !self.discarding {
            if self.carry.len() + rest.len() > self.max_line {
                self.carry.clear();
                self.discarding = true;
                self.dropped += 1;
            } else {
                self.carry.extend_from_slice(rest);
            }
        }

        lines
    }

    /// Bytes received after the last delimiter.
    pub fn pending(&self) -> &[u8] {
        &self.carry
    }

    pub fn is_empty(&self) -> bool {
        self.carry.is_empty()
    }

    /// Number of oversized lines discarded since the last call.
    pub fn take_dropped(&mut self) -> usize {
        std::mem::take(&mut self.dropped)
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Stateless form of [`LineFramer::feed`]: returns the completed lines and the
/// new carryover.
pub fn feed(raw: &[u8], carryover: &[u8]) -> (Vec<String>, Vec<u8>) {
    let mut framer = LineFramer::new();
    framer.carry = carryover.to_vec();
    let lines = framer.feed(raw);
    (lines, framer.carry)
}
