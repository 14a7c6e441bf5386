//! Newline framing for the relay protocol
//!
//! Inbound payloads are raw bytes: each `\n`-terminated chunk is decoded
//! lossily, so text in a legacy encoding still arrives as a line instead of
//! failing the stream. Lines longer than the limit are skipped and reported
//! as `Inbound::Oversized`. Decoding only fails on I/O errors.

use std::cmp;
use std::io;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// One decoded inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A line with its `\n` (and any trailing `\r`) stripped
    Line(String),
    /// A line over the length limit was discarded
    Oversized,
}

#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    /// Where to resume scanning for `\n` in the buffer
    next_index: usize,
    /// Dropping bytes until the end of an oversized line
    discarding: bool,
}

impl LineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }
}

fn to_text(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

impl Decoder for LineCodec {
    type Item = Inbound;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Inbound>, io::Error> {
        loop {
            let read_to = cmp::min(self.max_length.saturating_add(1), buf.len());
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    buf.advance(self.next_index + offset + 1);
                    self.next_index = 0;
                    self.discarding = false;
                    return Ok(Some(Inbound::Oversized));
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = buf.split_to(end + 1);
                    return Ok(Some(Inbound::Line(to_text(&line[..end]))));
                }
                (false, None) if buf.len() > self.max_length => {
                    self.next_index = 0;
                    self.discarding = true;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Inbound>, io::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        self.next_index = 0;
        if self.discarding {
            self.discarding = false;
            buf.clear();
            return Ok(Some(Inbound::Oversized));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        // Unterminated last line
        let line = buf.split_to(buf.len());
        Ok(Some(Inbound::Line(to_text(&line))))
    }
}

impl Encoder<String> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: String, buf: &mut BytesMut) -> Result<(), io::Error> {
        buf.reserve(line.len() + 1);
        buf.put_slice(line.as_bytes());
        buf.put_u8(b'\n');
        Ok(())
    }
}
