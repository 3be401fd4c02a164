//! Length-prefixed text frames over a byte stream.
//!
//! Each frame is a 2-byte big-endian length followed by that many bytes of
//! UTF-8. The length prefix caps a frame at [`MAX_FRAME_LEN`] bytes; longer
//! writes are refused before anything reaches the stream.

use std::io::{self, Read, Write};

use crate::{MAX_FRAME_LEN, TransportError};

/// Writes one frame and flushes.
pub fn write_frame<W: Write>(writer: &mut W, line: &str) -> Result<(), TransportError> {
    let len = u16::try_from(line.len()).map_err(|_| TransportError::FrameTooLarge(line.len()))?;
    writer
        .write_all(&len.to_be_bytes())
        .and_then(|()| writer.write_all(line.as_bytes()))
        .and_then(|()| writer.flush())
        .map_err(TransportError::SendFailed)
}

/// Reads one frame.
///
/// Returns `Ok(None)` if the stream ends cleanly between frames. A stream
/// that ends inside a frame is a receive error.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<String>, TransportError> {
    let mut len_buf = [0u8; 2];
    let mut filled = 0;
    while filled < len_buf.len() {
        match reader.read(&mut len_buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(TransportError::ReceiveFailed(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended inside a frame header",
                )));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransportError::ReceiveFailed(e)),
        }
    }
    let len = usize::from(u16::from_be_bytes(len_buf));
    debug_assert!(len <= MAX_FRAME_LEN);
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .map_err(TransportError::ReceiveFailed)?;
    String::from_utf8(buf).map(Some).map_err(|_| TransportError::InvalidUtf8)
}
