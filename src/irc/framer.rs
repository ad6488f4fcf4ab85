//! Turns an arbitrarily chunked byte stream into protocol lines.
//!
//! A line ends at the first `\n`; a `\r` directly before it is stripped.
//! Lines that are not valid UTF-8, and empty lines, are dropped without
//! disturbing the lines around them.
//!
//! [`Framer`] is a `tokio_util` codec: the transport drives it through
//! `FramedRead`/`FramedWrite`, and [`Framer::feed`] offers the same decoding
//! over a private buffer for callers that hold raw chunks.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, warn};

/// Default cap on a single line, including the terminator.
/// RFC 2812 says 512 bytes; IRCv3 message tags push this to 8191.
pub const MAX_LINE_LENGTH: usize = 8191;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("line exceeds maximum length ({limit} bytes)")]
    LineTooLong { limit: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Stateful line codec. One per connection direction.
#[derive(Debug)]
pub struct Framer {
    /// Backing store for [`Framer::feed`]; unused when driven by `Framed*`.
    buf: BytesMut,
    max_len: usize,
    /// Bytes already scanned for a newline.
    scanned: usize,
    /// Overflow found behind lines that `feed` already returned.
    deferred: Option<FrameError>,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(MAX_LINE_LENGTH)
    }
}

impl Framer {
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_len,
            scanned: 0,
            deferred: None,
        }
    }

    /// Number of buffered bytes still waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Append one receive chunk and return every line it completes.
    ///
    /// An unterminated tail stays buffered for the next call. Exceeding the
    /// line cap is fatal for the connection and discards the buffer; lines
    /// completed before the overflow are returned first and the error is
    /// reported by the following call.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>, FrameError> {
        if let Some(e) = self.deferred.take() {
            return Err(e);
        }

        let mut buf = std::mem::take(&mut self.buf);
        buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        let result = loop {
            match self.decode(&mut buf) {
                Ok(Some(line)) => lines.push(line),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.buf = buf;

        match result {
            Ok(()) => Ok(lines),
            Err(e) if lines.is_empty() => Err(e),
            Err(e) => {
                self.deferred = Some(e);
                Ok(lines)
            }
        }
    }

    fn overflow(&mut self, src: &mut BytesMut) -> FrameError {
        src.clear();
        self.scanned = 0;
        FrameError::LineTooLong { limit: self.max_len }
    }
}

impl Decoder for Framer {
    type Item = String;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, FrameError> {
        while let Some(offset) = src[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            self.scanned = 0;

            if end + 1 > self.max_len {
                return Err(self.overflow(src));
            }

            let mut line = src.split_to(end);
            src.advance(1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }

            match String::from_utf8(line.to_vec()) {
                Ok(text) if !text.is_empty() => return Ok(Some(text)),
                Ok(_) => {}
                Err(e) => warn!("dropping undecodable line ({} bytes): {}", line.len(), e),
            }
        }

        self.scanned = src.len();
        if src.len() > self.max_len {
            return Err(self.overflow(src));
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, FrameError> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if !src.is_empty() {
            debug!("discarding {} bytes of unterminated input", src.len());
            src.clear();
            self.scanned = 0;
        }
        Ok(None)
    }
}

impl Encoder<String> for Framer {
    type Error = FrameError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), FrameError> {
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lines_split_across_reads() {
        let mut framer = Framer::default();
        assert_eq!(framer.feed(b"A").unwrap(), Vec::<String>::new());
        assert_eq!(framer.feed(b"BC\r\n").unwrap(), vec!["ABC"]);
        assert_eq!(framer.feed(b"D\r\n").unwrap(), vec!["D"]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn partial_line_is_retained() {
        let mut framer = Framer::default();
        assert!(framer.feed(b"PING :irc.exa").unwrap().is_empty());
        assert_eq!(framer.pending(), 13);
        assert_eq!(framer.feed(b"mple.net\r\n").unwrap(), vec!["PING :irc.example.net"]);
    }

    #[test]
    fn many_lines_in_one_read() {
        let mut framer = Framer::default();
        let lines = framer.feed(b"NICK a\r\nUSER a 0 * :A\nJOIN #x\r\nPART").unwrap();
        assert_eq!(lines, vec!["NICK a", "USER a 0 * :A", "JOIN #x"]);
        assert_eq!(framer.feed(b" #x\r\n").unwrap(), vec!["PART #x"]);
    }

    #[test]
    fn bare_cr_inside_line_is_kept() {
        let mut framer = Framer::default();
        assert_eq!(framer.feed(b"a\rb\r\n").unwrap(), vec!["a\rb"]);
    }

    #[test]
    fn empty_lines_are_dropped() {
        let mut framer = Framer::default();
        assert_eq!(framer.feed(b"\r\n\nX\r\n\r\n").unwrap(), vec!["X"]);
    }

    #[test]
    fn invalid_utf8_is_dropped_without_losing_neighbours() {
        let mut framer = Framer::default();
        let lines = framer.feed(b"one\r\n\xff\xfe bad\r\ntwo\r\n").unwrap();
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[test]
    fn multibyte_char_split_across_reads() {
        let mut framer = Framer::default();
        let text = "héllo\r\n".as_bytes();
        assert!(framer.feed(&text[..2]).unwrap().is_empty());
        assert_eq!(framer.feed(&text[2..]).unwrap(), vec!["héllo"]);
    }

    #[test]
    fn unterminated_overflow_is_an_error() {
        let mut framer = Framer::new(16);
        assert!(framer.feed(b"0123456789").unwrap().is_empty());
        assert!(matches!(
            framer.feed(b"0123456789"),
            Err(FrameError::LineTooLong { limit: 16 })
        ));
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn terminated_overlong_line_is_an_error() {
        let mut framer = Framer::new(8);
        assert!(matches!(
            framer.feed(b"0123456789\r\n"),
            Err(FrameError::LineTooLong { limit: 8 })
        ));
    }

    #[test]
    fn lines_before_an_overflow_are_delivered_first() {
        let mut framer = Framer::new(16);
        let mut chunk = b"ERROR :bye\r\n".to_vec();
        chunk.extend_from_slice(&[b'x'; 40]);
        assert_eq!(framer.feed(&chunk).unwrap(), vec!["ERROR :bye"]);
        assert!(matches!(
            framer.feed(b""),
            Err(FrameError::LineTooLong { limit: 16 })
        ));
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn decoder_yields_one_line_per_call() {
        let mut framer = Framer::default();
        let mut src = BytesMut::from(&b"\r\nA\r\nB\nC"[..]);
        assert_eq!(framer.decode(&mut src).unwrap(), Some("A".to_string()));
        assert_eq!(framer.decode(&mut src).unwrap(), Some("B".to_string()));
        assert_eq!(framer.decode(&mut src).unwrap(), None);
        assert_eq!(&src[..], b"C");
        assert_eq!(framer.decode_eof(&mut src).unwrap(), None);
        assert!(src.is_empty());
    }

    #[test]
    fn encoder_terminates_lines() {
        let mut framer = Framer::default();
        let mut dst = BytesMut::new();
        framer.encode("NICK ferris".to_string(), &mut dst).unwrap();
        framer.encode("USER ferris 0 * :Ferris".to_string(), &mut dst).unwrap();
        assert_eq!(&dst[..], b"NICK ferris\r\nUSER ferris 0 * :Ferris\r\n");
    }
}
