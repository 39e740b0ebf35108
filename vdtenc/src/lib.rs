//! Encoder for videotex-class terminal displays.
//!
//! Turns a raster image into a self-describing `.vdt` byte stream: the
//! image is resized onto the display's 8x10 block-cell grid, re-encoded as
//! a trimmed baseline JPEG, preceded by positioning/sizing directives and
//! split into opcode-tagged escape-sequence frames.

mod decoder;
mod error;
mod frame;
mod header;
mod jpeg;
mod normalize;
mod primitives;

use bytes::Bytes;
use image::DynamicImage;

pub use decoder::{parse_frame, parse_stream, reassemble, DecodeError, Segments};
pub use error::EncodeError;
pub use frame::{
    encode_frames, split_chunks, stream_to_bytes, translate, untranslate, Frame, FrameKind,
    DEFAULT_CHUNK_SIZE,
};
pub use header::{encode_header, HeaderDescriptor, HeaderFlags, Placement};
pub use jpeg::{compress, has_quant_tables, trim, CompressedPayload, QuantPolicy};
pub use normalize::{fit_dimensions, normalize, NormalizedImage};

/// addressable pixel width of the target display
pub const SCREEN_WIDTH: u32 = 320;
/// addressable pixel height of the target display
pub const SCREEN_HEIGHT: u32 = 240;

/// One-image conversion pipeline: normalize, compress, build the header,
/// frame everything.
///
/// Runs are independent, an `Encoder` holds configuration only and can be
/// shared freely across images.
#[derive(Debug, Clone)]
pub struct Encoder {
    /// frame chunk size, protocol default 256
    pub chunk_size: usize,
    /// scalar jpeg quality; `None` selects the fixed quantization tables
    pub quality: Option<u8>,
    /// top-left placement origin on the canvas
    pub origin: (u32, u32),
    /// displayed box size, defaults to the normalized image dimensions
    pub size: Option<(u32, u32)>,
    pub clear: bool,
    pub reset: bool,
    /// 6-bit-safe transport repacking
    pub translation: bool,
}

impl Default for Encoder {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            quality: Some(78),
            origin: (0, 0),
            size: None,
            clear: true,
            reset: true,
            translation: false,
        }
    }
}

impl Encoder {
    /// Encodes one image into its frame sequence.
    pub fn encode_to_frames(&self, image: DynamicImage) -> Result<Vec<Frame>, EncodeError> {
        let normalized = normalize(image)?;
        let policy = match self.quality {
            Some(quality) => QuantPolicy::Quality(quality),
            None => QuantPolicy::Tables,
        };
        let payload = compress(&normalized, policy)?;

        let (width, height) = self
            .size
            .unwrap_or((normalized.width(), normalized.height()));
        let placement = Placement {
            x: self.origin.0,
            y: self.origin.1,
            width,
            height,
        };
        let flags = HeaderFlags {
            clear: self.clear,
            translation: self.translation,
            reset: self.reset,
            quantization: payload.custom_quantization(),
        };
        let header = encode_header(&placement, &flags)?;

        let frames = encode_frames(
            header.as_bytes(),
            payload.as_bytes(),
            self.chunk_size,
            self.translation,
        );
        log::debug!(
            "encoded {}x{} image into {} frames ({} header bytes, {} payload bytes)",
            normalized.width(),
            normalized.height(),
            frames.len(),
            header.len(),
            payload.as_bytes().len(),
        );
        Ok(frames)
    }

    /// Encodes one image into the final concatenated `.vdt` byte stream.
    pub fn encode(&self, image: DynamicImage) -> Result<Bytes, EncodeError> {
        Ok(stream_to_bytes(&self.encode_to_frames(image)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn black_cell() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 10, Rgb([0, 0, 0])))
    }

    #[test]
    fn black_cell_stream_layout() {
        let stream = Encoder::default().encode(black_cell()).unwrap();
        let frames = parse_stream(&stream).unwrap();

        // one header frame, at least one image frame, everything final
        // because both segments fit a single chunk
        assert_eq!(frames[0].kind, FrameKind::HeaderFinal);
        assert!(frames.len() >= 2);
        assert!(frames[1..].iter().all(|f| !f.kind.is_header()));
        assert_eq!(frames.last().unwrap().kind, FrameKind::ImageFinal);

        let segments = reassemble(&frames, false);
        // the header is the directive sequence built for the cell; the
        // encoder always emits quantization tables, so the announcement is on
        let expected = encode_header(
            &Placement {
                x: 0,
                y: 0,
                width: 8,
                height: 10,
            },
            &HeaderFlags {
                quantization: true,
                ..HeaderFlags::default()
            },
        )
        .unwrap();
        assert_eq!(segments.header, expected.as_bytes());
        assert_eq!(&segments.image[0..2], &[0xFF, 0xD8]);
        assert_eq!(&segments.image[segments.image.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn translated_stream_roundtrips() {
        let encoder = Encoder {
            translation: true,
            quality: None,
            ..Encoder::default()
        };
        let plain = Encoder {
            quality: None,
            ..Encoder::default()
        };
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(64, 40, |x, y| {
            Rgb([(x * 4) as u8, (y * 6) as u8, 128])
        }));
        let translated = parse_stream(&encoder.encode(img.clone()).unwrap()).unwrap();
        let reference = parse_stream(&plain.encode(img).unwrap()).unwrap();
        assert_eq!(
            reassemble(&translated, true).image,
            reassemble(&reference, false).image
        );
    }

    #[test]
    fn size_override_lands_in_header() {
        let encoder = Encoder {
            size: Some((320, 240)),
            ..Encoder::default()
        };
        let frames = encoder.encode_to_frames(black_cell()).unwrap();
        let segments = reassemble(&frames, false);
        let expected = encode_header(
            &Placement {
                x: 0,
                y: 0,
                width: 320,
                height: 240,
            },
            &HeaderFlags {
                quantization: true,
                ..HeaderFlags::default()
            },
        )
        .unwrap();
        assert_eq!(segments.header, expected.as_bytes());
    }

    #[test]
    fn oversized_image_is_normalized_first() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 480, Rgb([9, 9, 9])));
        let frames = Encoder::default().encode_to_frames(img).unwrap();
        let segments = reassemble(&frames, false);
        let expected = encode_header(
            &Placement {
                x: 0,
                y: 0,
                width: 320,
                height: 240,
            },
            &HeaderFlags {
                quantization: true,
                ..HeaderFlags::default()
            },
        )
        .unwrap();
        assert_eq!(segments.header, expected.as_bytes());
    }
}
