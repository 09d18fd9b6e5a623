//! Per-client line assembly.
//!
//! Each connection gets one fixed 64-byte receive buffer holding at most a
//! single line-in-progress. Bytes are scanned as they arrive; a newline
//! completes a line, and a line that outgrows the buffer is discarded
//! wholesale rather than truncated.

/// Capacity of a connection's receive buffer. A command line and its
/// trailing newline must fit inside it.
pub const LINE_BUF_SIZE: usize = 64;

/// What [`LineBuffer::feed`] extracted from a chunk of received bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// One complete line, newline stripped.
    Line(String),
    /// The buffer filled without a newline; the pending line was discarded.
    Overflow,
}

/// Copy-compacting line assembler over a fixed buffer.
pub struct LineBuffer {
    buf: [u8; LINE_BUF_SIZE],
    pos: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            buf: [0; LINE_BUF_SIZE],
            pos: 0,
        }
    }

    /// Feed newly received bytes, returning completed lines and overflow
    /// notices in arrival order. An overflow squashes the pending line and
    /// stops the scan; whatever remained of that read is discarded, and
    /// only bytes from the next read start a fresh line.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<LineEvent> {
        let mut out = Vec::new();
        for &b in bytes {
            if b == b'\n' {
                let line = String::from_utf8_lossy(&self.buf[..self.pos]).into_owned();
                self.reset();
                out.push(LineEvent::Line(line));
            } else if self.pos >= LINE_BUF_SIZE - 1 {
                // On the last slot and it is not a newline; squash and
                // drop the rest of this read.
                self.reset();
                out.push(LineEvent::Overflow);
                break;
            } else {
                self.buf[self.pos] = b;
                self.pos += 1;
            }
        }
        out
    }

    fn reset(&mut self) {
        self.buf[..self.pos].fill(0);
        self.pos = 0;
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line() {
        let mut lines = LineBuffer::new();
        assert_eq!(
            lines.feed(b"power on\n"),
            [LineEvent::Line("power on".into())]
        );
    }

    #[test]
    fn line_split_across_reads() {
        let mut lines = LineBuffer::new();
        assert_eq!(lines.feed(b"vol"), []);
        assert_eq!(lines.feed(b"ume 42"), []);
        assert_eq!(
            lines.feed(b"\n"),
            [LineEvent::Line("volume 42".into())]
        );
    }

    #[test]
    fn several_lines_in_one_read() {
        let mut lines = LineBuffer::new();
        assert_eq!(
            lines.feed(b"volume 42\nvolume 43\nmu"),
            [
                LineEvent::Line("volume 42".into()),
                LineEvent::Line("volume 43".into()),
            ]
        );
        assert_eq!(lines.feed(b"te on\n"), [LineEvent::Line("mute on".into())]);
    }

    #[test]
    fn max_length_line_fits() {
        let mut lines = LineBuffer::new();
        let line = "x".repeat(LINE_BUF_SIZE - 1);
        let mut bytes = line.clone().into_bytes();
        bytes.push(b'\n');
        assert_eq!(lines.feed(&bytes), [LineEvent::Line(line)]);
    }

    #[test]
    fn oversized_line_is_discarded() {
        let mut lines = LineBuffer::new();
        let bytes = vec![b'x'; LINE_BUF_SIZE];
        assert_eq!(lines.feed(&bytes), [LineEvent::Overflow]);
        // Bytes from the next read start a fresh line.
        assert_eq!(lines.feed(b"tail\n"), [LineEvent::Line("tail".into())]);
    }

    #[test]
    fn overflow_drops_the_rest_of_the_read() {
        let mut lines = LineBuffer::new();
        let mut bytes = vec![b'x'; LINE_BUF_SIZE];
        bytes.extend_from_slice(b"mute on\n");
        // The trailing fragment arrived in the same read as the overflow,
        // so it is gone; it must not surface as a command.
        assert_eq!(lines.feed(&bytes), [LineEvent::Overflow]);
        assert_eq!(
            lines.feed(b"power on\n"),
            [LineEvent::Line("power on".into())]
        );
    }

    #[test]
    fn empty_line_is_still_a_line() {
        let mut lines = LineBuffer::new();
        assert_eq!(lines.feed(b"\n"), [LineEvent::Line(String::new())]);
    }
}
