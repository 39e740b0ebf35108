//! Baseline-JPEG payload shaping.
//!
//! The terminal consumes a minimized stream: everything except SOI, the
//! quantization tables, the frame header and the scan itself is dead
//! weight on a slow link and gets trimmed before framing.

use image::DynamicImage;
use jpeg_encoder::{ColorType, Encoder as JpegEncoder, QuantizationTableType, SamplingFactor};

use crate::error::EncodeError;
use crate::normalize::NormalizedImage;

/// Luminance quantization table transmitted in fixed-table mode.
pub const QUANT_LUMA: [u16; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61, //
    12, 12, 14, 19, 26, 58, 60, 55, //
    14, 13, 16, 24, 40, 57, 69, 56, //
    14, 17, 22, 29, 51, 87, 80, 62, //
    18, 22, 37, 56, 68, 109, 103, 77, //
    24, 35, 55, 64, 81, 104, 113, 92, //
    49, 64, 78, 87, 103, 121, 120, 101, //
    72, 92, 95, 98, 112, 100, 103, 99,
];

/// Chrominance quantization table transmitted in fixed-table mode.
pub const QUANT_CHROMA: [u16; 64] = [
    17, 18, 24, 47, 99, 99, 99, 99, //
    18, 21, 26, 66, 99, 99, 99, 99, //
    24, 26, 56, 99, 99, 99, 99, 99, //
    47, 66, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99,
];

/// How the re-encoder picks its quantization tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantPolicy {
    /// the fixed luma/chroma tables above, transmitted explicitly
    Tables,
    /// scalar quality factor with the encoder's default tables
    Quality(u8),
}

/// A trimmed baseline-JPEG byte stream ready for framing.
#[derive(Debug, Clone)]
pub struct CompressedPayload {
    data: Vec<u8>,
    custom_quantization: bool,
}

impl CompressedPayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// whether the stream carries quantization-table markers, drives the
    /// header's quantization announcement
    pub fn custom_quantization(&self) -> bool {
        self.custom_quantization
    }
}

/// Walks the marker sections of a baseline JPEG.
///
/// Yields `(start, end)` byte spans for every section between SOI and SOS,
/// then one final span covering the scan data through EOI.
fn sections(data: &[u8]) -> Result<Vec<(usize, usize)>, EncodeError> {
    if data.len() < 4 || data[0..2] != [0xFF, 0xD8] {
        return Err(EncodeError::Format("missing start-of-image marker"));
    }
    let mut spans = Vec::new();
    let mut pos = 2;
    loop {
        if pos + 4 > data.len() {
            return Err(EncodeError::Format("truncated marker section"));
        }
        if data[pos] != 0xFF {
            return Err(EncodeError::Format("expected marker before scan data"));
        }
        if data[pos + 1] == 0xDA {
            break;
        }
        let length = usize::from(data[pos + 2]) << 8 | usize::from(data[pos + 3]);
        let end = pos + length + 2;
        if end > data.len() {
            return Err(EncodeError::Format("section length exceeds stream"));
        }
        spans.push((pos, end));
        pos = end;
    }
    if data[data.len() - 2..] != [0xFF, 0xD9] {
        return Err(EncodeError::Format("missing end-of-image marker"));
    }
    spans.push((pos, data.len()));
    Ok(spans)
}

/// Strips a baseline JPEG down to SOI, quantization tables, the frame
/// header and the scan-through-EOI span.
pub fn trim(data: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let mut out = vec![0xFF, 0xD8];
    for (start, end) in sections(data)? {
        if matches!(data[start + 1], 0xDA | 0xC0 | 0xDB) {
            out.extend_from_slice(&data[start..end]);
        }
    }
    Ok(out)
}

/// Reports whether the stream defines quantization tables.
pub fn has_quant_tables(data: &[u8]) -> Result<bool, EncodeError> {
    Ok(sections(data)?.iter().any(|&(start, _)| data[start + 1] == 0xDB))
}

/// Re-encodes a normalized image as a trimmed baseline JPEG with 4:2:2
/// chroma subsampling.
///
/// Grayscale sources stay single-channel; everything else goes through RGB
/// (the JPEG encoder performs the YCbCr conversion itself).
pub fn compress(
    image: &NormalizedImage,
    policy: QuantPolicy,
) -> Result<CompressedPayload, EncodeError> {
    let (pixels, color) = match image.as_dynamic() {
        DynamicImage::ImageLuma8(gray) => (gray.as_raw().clone(), ColorType::Luma),
        other => (other.to_rgb8().into_raw(), ColorType::Rgb),
    };

    let quality = match policy {
        QuantPolicy::Tables => 100,
        QuantPolicy::Quality(q) => q,
    };
    let mut raw = Vec::new();
    let mut encoder = JpegEncoder::new(&mut raw, quality);
    encoder.set_sampling_factor(SamplingFactor::F_2_1);
    if policy == QuantPolicy::Tables {
        encoder.set_quantization_tables(
            QuantizationTableType::Custom(Box::new(QUANT_LUMA)),
            QuantizationTableType::Custom(Box::new(QUANT_CHROMA)),
        );
    }
    encoder.encode(
        &pixels,
        image.width() as u16,
        image.height() as u16,
        color,
    )?;

    let data = trim(&raw)?;
    let custom_quantization = has_quant_tables(&data)?;
    Ok(CompressedPayload {
        data,
        custom_quantization,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use image::DynamicImage;

    // SOI + APP0 + DQT + SOF0 + DHT + SOS..EOI with dummy bodies
    fn synthetic_jpeg() -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x4A, 0x46]); // APP0
        data.extend_from_slice(&[0xFF, 0xDB, 0x00, 0x05, 0x00, 0x01, 0x02]); // DQT
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x04, 0x08, 0x08]); // SOF0
        data.extend_from_slice(&[0xFF, 0xC4, 0x00, 0x03, 0x00]); // DHT
        data.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x11, 0x22, 0x33]); // SOS + scan
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }

    #[test]
    fn trim_keeps_only_required_sections() {
        let trimmed = trim(&synthetic_jpeg()).unwrap();
        let mut expected = vec![0xFF, 0xD8];
        expected.extend_from_slice(&[0xFF, 0xDB, 0x00, 0x05, 0x00, 0x01, 0x02]);
        expected.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x04, 0x08, 0x08]);
        expected.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x11, 0x22, 0x33]);
        expected.extend_from_slice(&[0xFF, 0xD9]);
        assert_eq!(trimmed, expected);
    }

    #[test]
    fn trim_is_idempotent() {
        let once = trim(&synthetic_jpeg()).unwrap();
        assert_eq!(trim(&once).unwrap(), once);
    }

    #[test]
    fn qtable_detection() {
        assert!(has_quant_tables(&synthetic_jpeg()).unwrap());
        let mut without = vec![0xFF, 0xD8];
        without.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x11]);
        without.extend_from_slice(&[0xFF, 0xD9]);
        assert!(!has_quant_tables(&without).unwrap());
    }

    #[test]
    fn malformed_streams_are_format_errors() {
        assert!(matches!(trim(&[0x00, 0x01]), Err(EncodeError::Format(_))));
        assert!(matches!(
            trim(&[0xFF, 0xD8, 0xFF, 0xE0, 0xFF, 0xFF]),
            Err(EncodeError::Format(_))
        ));
        // scan present but no trailing EOI
        assert!(matches!(
            trim(&[0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02, 0x11, 0x22]),
            Err(EncodeError::Format(_))
        ));
    }

    #[test]
    fn compress_produces_trimmed_baseline_stream() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            16,
            10,
            image::Rgb([200, 30, 90]),
        ));
        let norm = normalize(img).unwrap();
        for policy in [QuantPolicy::Tables, QuantPolicy::Quality(78)] {
            let payload = compress(&norm, policy).unwrap();
            let data = payload.as_bytes();
            assert_eq!(&data[0..2], &[0xFF, 0xD8]);
            assert_eq!(&data[data.len() - 2..], &[0xFF, 0xD9]);
            // baseline frame header survives, auxiliary sections do not
            let spans = sections(data).unwrap();
            assert!(spans.iter().any(|&(s, _)| data[s + 1] == 0xC0));
            assert!(spans.iter().all(|&(s, _)| {
                matches!(data[s + 1], 0xDA | 0xC0 | 0xDB)
            }));
            assert!(payload.custom_quantization());
        }
    }

    #[test]
    fn compress_grayscale_input() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
            8,
            10,
            image::Luma([120]),
        ));
        let norm = normalize(img).unwrap();
        let payload = compress(&norm, QuantPolicy::Quality(60)).unwrap();
        assert_eq!(&payload.as_bytes()[0..2], &[0xFF, 0xD8]);
    }
}
