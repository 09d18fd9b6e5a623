//! ISCP wire framing.
//!
//! Commands go out as `"!1" <code> "\r\n"`. Replies come back as a line of
//! arbitrary leading noise (NUL bytes included), the `"!1"` start marker,
//! the ASCII payload, and a terminator byte. The codec extracts the payload
//! between marker and terminator; a terminated chunk with content but no
//! marker anywhere in it surfaces as [`Frame::Garbage`] so the daemon can
//! report a receiver error.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Start-of-frame marker, both directions.
pub const START: &[u8] = b"!1";

/// Terminator appended to every outgoing command.
pub const END_SEND: &[u8] = b"\r\n";

/// Bytes the receiver uses to terminate a status message. The EOF character
/// (0x1a) is what the hardware actually sends; CR and LF show up from
/// emulators and test rigs.
const END_RECV: [u8; 3] = [0x1a, b'\r', b'\n'];

/// Size of the receiver's own line buffers; frames never legitimately
/// exceed this.
pub const BUF_SIZE: usize = 256;

/// Longest command code that still fits the envelope.
pub const MAX_CODE: usize = BUF_SIZE - START.len() - END_SEND.len() - 1;

/// One parsed unit from the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Payload found between the start marker and the terminator,
    /// e.g. `PWR01`.
    Status(String),
    /// A terminated chunk with no start marker in it.
    Garbage,
}

/// Codec for the receiver side of the wire.
#[derive(Debug, Default)]
pub struct IscpCodec;

impl Decoder for IscpCodec {
    type Item = Frame;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> std::io::Result<Option<Frame>> {
        loop {
            let Some(end) = src.iter().position(|b| END_RECV.contains(b)) else {
                if src.len() > BUF_SIZE {
                    // Runaway unterminated input; drop it rather than grow.
                    src.clear();
                    return Ok(Some(Frame::Garbage));
                }
                return Ok(None);
            };
            let chunk = src.split_to(end + 1);
            let body = &chunk[..end];
            if body.iter().all(|&b| b == 0) {
                // Blank line or inter-frame noise, keep scanning.
                continue;
            }
            let Some(at) = find_start(body) else {
                return Ok(Some(Frame::Garbage));
            };
            let payload = &body[at + START.len()..];
            // The payload is NUL-terminated on the receiver side of the
            // protocol; cut at the first NUL.
            let payload = match payload.iter().position(|&b| b == 0) {
                Some(nul) => &payload[..nul],
                None => payload,
            };
            return Ok(Some(Frame::Status(
                String::from_utf8_lossy(payload).into_owned(),
            )));
        }
    }
}

impl Encoder<&str> for IscpCodec {
    type Error = std::io::Error;

    fn encode(&mut self, code: &str, dst: &mut BytesMut) -> std::io::Result<()> {
        dst.reserve(START.len() + code.len() + END_SEND.len());
        dst.put_slice(START);
        dst.put_slice(code.as_bytes());
        dst.put_slice(END_SEND);
        Ok(())
    }
}

fn find_start(buf: &[u8]) -> Option<usize> {
    buf.windows(START.len()).position(|w| w == START)
}
