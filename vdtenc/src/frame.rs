//! Escape-sequence framing of header and image bytes.

use bytes::{BufMut, Bytes, BytesMut};

use crate::primitives::encode_length;

pub const ESC: u8 = 0x1B;
/// page marker byte of the frame preamble
pub const PAGE_MARKER: u8 = 0x23;
/// instruction marker byte of the frame preamble
pub const INSTRUCTION_MARKER: u8 = 0x40;
/// protocol default frame chunk size
pub const DEFAULT_CHUNK_SIZE: usize = 0x100;

/// Which segment a frame belongs to and whether it closes that segment.
///
/// Distinct opcode pairs for header and image chunks let the receiver find
/// segment boundaries without any outer framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FrameKind {
    HeaderContinue,
    HeaderFinal,
    ImageContinue,
    ImageFinal,
}

impl FrameKind {
    pub fn opcode(self) -> u8 {
        match self {
            Self::HeaderContinue => 0x50,
            Self::HeaderFinal => 0x51,
            Self::ImageContinue => 0x52,
            Self::ImageFinal => 0x53,
        }
    }

    pub fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            0x50 => Some(Self::HeaderContinue),
            0x51 => Some(Self::HeaderFinal),
            0x52 => Some(Self::ImageContinue),
            0x53 => Some(Self::ImageFinal),
            _ => None,
        }
    }

    pub fn is_header(self) -> bool {
        matches!(self, Self::HeaderContinue | Self::HeaderFinal)
    }

    pub fn is_final(self) -> bool {
        matches!(self, Self::HeaderFinal | Self::ImageFinal)
    }

    fn header(is_final: bool) -> Self {
        if is_final {
            Self::HeaderFinal
        } else {
            Self::HeaderContinue
        }
    }

    fn image(is_final: bool) -> Self {
        if is_final {
            Self::ImageFinal
        } else {
            Self::ImageContinue
        }
    }
}

/// One opcode-tagged, length-prefixed chunk of the stream.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Frame {
    pub kind: FrameKind,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Appends the wire form: `ESC 'p' PM PI Length(len + 1) opcode data`.
    pub fn write_to(&self, out: &mut BytesMut) {
        out.put_u8(ESC);
        out.put_u8(b'p');
        out.put_u8(PAGE_MARKER);
        out.put_u8(INSTRUCTION_MARKER);
        out.put_slice(&encode_length(self.data.len() as u64 + 1));
        out.put_u8(self.kind.opcode());
        out.put_slice(&self.data);
    }
}

/// Splits `data` into `(chunk, is_final)` pieces of at most `chunk_size`
/// bytes. A chunk size of zero or empty input yields the whole input as a
/// single final chunk.
pub fn split_chunks(data: &[u8], chunk_size: usize) -> Vec<(&[u8], bool)> {
    if chunk_size == 0 || data.is_empty() {
        return vec![(data, true)];
    }
    let mut out = Vec::with_capacity(data.len() / chunk_size + 1);
    let mut pos = 0;
    while pos < data.len() {
        let end = usize::min(pos + chunk_size, data.len());
        out.push((&data[pos..end], end == data.len()));
        pos = end;
    }
    out
}

/// Repacks bytes for 6-bit-safe transports.
///
/// Every 3 source bytes become 4: one escape byte holding the top 2 bits of
/// each source byte (at bit offsets 4, 2, 0), then the low 6 bits of each
/// source byte, all tagged with `0x40`. A short trailing group of k bytes
/// emits the escape byte with only k fields populated followed by k data
/// bytes; nothing is padded.
pub fn translate(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 3 * 4 + 4);
    for group in data.chunks(3) {
        let mut escape = 0x40u8;
        for (i, &byte) in group.iter().enumerate() {
            escape |= (byte >> 6) << (4 - 2 * i);
        }
        out.push(escape);
        out.extend(group.iter().map(|&byte| 0x40 | (byte & 0x3F)));
    }
    out
}

/// Exact inverse of [`translate`], including short trailing groups.
pub fn untranslate(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 4 * 3 + 3);
    for group in data.chunks(4) {
        let escape = group[0];
        for (i, &byte) in group[1..].iter().enumerate() {
            out.push((escape >> (4 - 2 * i) & 0x03) << 6 | (byte & 0x3F));
        }
    }
    out
}

/// Wraps header and image bytes into the wire framing.
///
/// Header chunks reserve one byte for the opcode; with translation active
/// the image chunk size shrinks by 3/4 so translated chunks still fit the
/// frame budget. All header frames precede all image frames.
pub fn encode_frames(
    header: &[u8],
    image: &[u8],
    chunk_size: usize,
    translation: bool,
) -> Vec<Frame> {
    let mut frames = Vec::new();
    for (chunk, is_final) in split_chunks(header, chunk_size.saturating_sub(1)) {
        frames.push(Frame {
            kind: FrameKind::header(is_final),
            data: chunk.to_vec(),
        });
    }
    let image_chunk_size = if translation && chunk_size > 0 {
        (chunk_size - 1) * 3 / 4 + 1
    } else {
        chunk_size
    };
    for (chunk, is_final) in split_chunks(image, image_chunk_size) {
        let data = if translation {
            translate(chunk)
        } else {
            chunk.to_vec()
        };
        frames.push(Frame {
            kind: FrameKind::image(is_final),
            data,
        });
    }
    frames
}

/// Concatenates frames into the final self-describing byte stream.
pub fn stream_to_bytes(frames: &[Frame]) -> Bytes {
    let mut out = BytesMut::new();
    for frame in frames {
        frame.write_to(&mut out);
    }
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_wire_layout() {
        let frame = Frame {
            kind: FrameKind::HeaderFinal,
            data: vec![0xAA],
        };
        let mut out = BytesMut::new();
        frame.write_to(&mut out);
        assert_eq!(&out[..], &[0x1B, 0x70, 0x23, 0x40, 0xFF, 0x42, 0x51, 0xAA]);
    }

    #[test]
    fn chunk_roundtrip_any_size() {
        let data: Vec<u8> = (0u16..500).map(|i| (i % 251) as u8).collect();
        for chunk_size in [1usize, 2, 3, 7, 255, 256, 499, 500, 1000] {
            let chunks = split_chunks(&data, chunk_size);
            let mut finals = 0;
            let mut rebuilt = Vec::new();
            for (chunk, is_final) in &chunks {
                assert!(chunk.len() <= chunk_size);
                rebuilt.extend_from_slice(chunk);
                finals += usize::from(*is_final);
            }
            assert_eq!(finals, 1, "exactly the last chunk is final");
            assert!(chunks.last().unwrap().1);
            assert_eq!(rebuilt, data, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn empty_input_yields_one_final_chunk() {
        assert_eq!(split_chunks(&[], 16), vec![(&[][..], true)]);
        assert_eq!(split_chunks(&[1, 2], 0), vec![(&[1u8, 2][..], true)]);
    }

    #[test]
    fn translate_known_group() {
        // 0xC1 0x81 0x41: top bits 11 10 01, low bits 0x01 each
        assert_eq!(
            translate(&[0xC1, 0x81, 0x41]),
            vec![0x40 | 0b11_10_01, 0x41, 0x41, 0x41]
        );
    }

    #[test]
    fn translated_bytes_are_six_bit_safe() {
        let data: Vec<u8> = (0..=255).collect();
        for byte in translate(&data) {
            assert_eq!(byte & 0x80, 0);
            assert_eq!(byte & 0x40, 0x40);
        }
    }

    #[test]
    fn translate_roundtrip() {
        let data: Vec<u8> = (0..=255).cycle().take(600).collect();
        assert_eq!(untranslate(&translate(&data)), data);
        // short trailing groups keep their shared escape byte intact
        for len in [0usize, 1, 2, 4, 5, 7] {
            let short = &data[..len];
            assert_eq!(untranslate(&translate(short)), short, "length {len}");
        }
    }

    #[test]
    fn frames_split_header_and_image() {
        let header = vec![0x11u8; 300];
        let image = vec![0x22u8; 600];
        let frames = encode_frames(&header, &image, 0x100, false);
        // header at 255 -> 2 frames, image at 256 -> 3 frames
        let kinds: Vec<FrameKind> = frames.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FrameKind::HeaderContinue,
                FrameKind::HeaderFinal,
                FrameKind::ImageContinue,
                FrameKind::ImageContinue,
                FrameKind::ImageFinal,
            ]
        );
        assert_eq!(frames[0].len(), 255);
        assert_eq!(frames[1].len(), 45);
        assert_eq!(frames[2].len(), 256);

        let rebuilt_header: Vec<u8> = frames
            .iter()
            .filter(|f| f.kind.is_header())
            .flat_map(|f| f.data.iter().copied())
            .collect();
        let rebuilt_image: Vec<u8> = frames
            .iter()
            .filter(|f| !f.kind.is_header())
            .flat_map(|f| f.data.iter().copied())
            .collect();
        assert_eq!(rebuilt_header, header);
        assert_eq!(rebuilt_image, image);
    }

    #[test]
    fn translated_frames_fit_the_chunk_budget() {
        let image = vec![0xFFu8; 1000];
        let frames = encode_frames(&[], &image, 0x100, true);
        // effective image chunk is (255 * 3) / 4 + 1 = 192 raw bytes -> 256 encoded
        for frame in frames.iter().filter(|f| !f.kind.is_header()) {
            assert!(frame.len() <= 256, "translated frame of {}", frame.len());
        }
        let rebuilt: Vec<u8> = frames
            .iter()
            .filter(|f| !f.kind.is_header())
            .flat_map(|f| untranslate(&f.data))
            .collect();
        assert_eq!(rebuilt, image);
    }
}
