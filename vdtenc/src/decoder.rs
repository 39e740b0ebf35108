//! Parsing of an encoded stream back into its segments.
//!
//! The receiver side of the framing: used by the tests to prove the
//! round-trip properties, and usable by consumers that want to inspect a
//! `.vdt` artifact instead of replaying it blind.

use crate::frame::{untranslate, Frame, FrameKind, ESC, INSTRUCTION_MARKER, PAGE_MARKER};
use crate::primitives::decode_length;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated frame at byte {0}")]
    Truncated(usize),

    #[error("bad frame preamble at byte {0}")]
    BadPreamble(usize),

    #[error("bad frame length field at byte {0}")]
    BadLength(usize),

    #[error("unknown frame opcode {0:#04x}")]
    UnknownOpcode(u8),
}

/// Reads one frame from the front of `data`, returning it and the number of
/// bytes consumed.
pub fn parse_frame(data: &[u8]) -> Result<(Frame, usize), DecodeError> {
    if data.len() < 6 {
        return Err(DecodeError::Truncated(0));
    }
    if data[0..4] != [ESC, b'p', PAGE_MARKER, INSTRUCTION_MARKER] {
        return Err(DecodeError::BadPreamble(0));
    }
    let (length, used) = decode_length(&data[4..]).ok_or(DecodeError::BadLength(4))?;
    if length == 0 {
        return Err(DecodeError::BadLength(4));
    }
    let start = 4 + used;
    let end = start + length as usize;
    if data.len() < end {
        return Err(DecodeError::Truncated(start));
    }
    let kind = FrameKind::from_opcode(data[start]).ok_or(DecodeError::UnknownOpcode(data[start]))?;
    Ok((
        Frame {
            kind,
            data: data[start + 1..end].to_vec(),
        },
        end,
    ))
}

/// Parses a whole concatenated stream into frames.
pub fn parse_stream(data: &[u8]) -> Result<Vec<Frame>, DecodeError> {
    let mut frames = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let (frame, used) = parse_frame(&data[pos..]).map_err(|e| match e {
            DecodeError::Truncated(at) => DecodeError::Truncated(pos + at),
            DecodeError::BadPreamble(at) => DecodeError::BadPreamble(pos + at),
            DecodeError::BadLength(at) => DecodeError::BadLength(pos + at),
            other => other,
        })?;
        frames.push(frame);
        pos += used;
    }
    Ok(frames)
}

/// Header and image bytes recovered from a frame sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segments {
    pub header: Vec<u8>,
    pub image: Vec<u8>,
}

/// Concatenates frame payloads back into segments, undoing the 6-bit-safe
/// transform per image frame when `translated` is set.
pub fn reassemble(frames: &[Frame], translated: bool) -> Segments {
    let mut segments = Segments::default();
    for frame in frames {
        if frame.kind.is_header() {
            segments.header.extend_from_slice(&frame.data);
        } else if translated {
            segments.image.extend(untranslate(&frame.data));
        } else {
            segments.image.extend_from_slice(&frame.data);
        }
    }
    segments
}
