//! Header directives preceding the image payload.
//!
//! The directive order and every encoded value are frozen by the terminal's
//! protocol, the builder only decides which optional directives appear.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::EncodeError;
use crate::primitives::{encode_boolean, encode_integer, encode_normalized};
use crate::{SCREEN_HEIGHT, SCREEN_WIDTH};

// attribute groups
const PSA: u8 = 0x20;
const PDA: u8 = 0x21;
const SCA: u8 = 0x24;
const TCA: u8 = 0x25;

const RESET_DISPLAY: [u8; 2] = [PSA, 0x30];
const LOCATION: [u8; 2] = [PDA, 0x32];
const AREA_SIZE: [u8; 2] = [PDA, 0x33];
// required by the protocol, parameters always zero/placeholder in this
// encoder's usage; the true semantics are not recoverable from behavior
const PLANE: [u8; 2] = [PDA, 0x34];
const CLEAR_AREA: [u8; 2] = [PDA, 0x35];
const QUANTIZATION_MODE: [u8; 2] = [SCA, 0x31];
const TRANSLATION_MODE: [u8; 2] = [TCA, 0x30];

/// The vertical device unit is 3/4 of the horizontal one.
const ASPECT: f64 = 0.75;

/// Where the image lands on the canvas, in top-left pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Optional directives of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderFlags {
    pub clear: bool,
    pub translation: bool,
    pub reset: bool,
    pub quantization: bool,
}

impl Default for HeaderFlags {
    fn default() -> Self {
        Self {
            clear: true,
            translation: false,
            reset: true,
            quantization: false,
        }
    }
}

/// The finished directive sequence for one image, immutable once built.
#[derive(Debug, Clone)]
pub struct HeaderDescriptor {
    bytes: Bytes,
}

impl HeaderDescriptor {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Builds the directive sequence for an image placed at `placement`.
///
/// The y origin flips from top-left image space to the device's bottom-left
/// space, and vertical fractions compress by [`ASPECT`].
pub fn encode_header(
    placement: &Placement,
    flags: &HeaderFlags,
) -> Result<HeaderDescriptor, EncodeError> {
    let canvas_w = f64::from(SCREEN_WIDTH);
    let canvas_h = f64::from(SCREEN_HEIGHT);
    let height_fraction = f64::from(placement.height) / canvas_h * ASPECT;

    let mut out = BytesMut::new();
    if flags.reset {
        out.put_slice(&RESET_DISPLAY);
        out.put_slice(&encode_boolean(true));
    }

    out.put_slice(&LOCATION);
    out.put_slice(&encode_normalized(f64::from(placement.x) / canvas_w)?);
    out.put_slice(&encode_normalized(
        (canvas_h - f64::from(placement.height) - f64::from(placement.y)) / canvas_h * ASPECT,
    )?);

    out.put_slice(&AREA_SIZE);
    out.put_slice(&encode_normalized(f64::from(placement.width) / canvas_w)?);
    out.put_slice(&encode_normalized(height_fraction)?);

    out.put_slice(&PLANE);
    out.put_slice(&encode_integer(0, false));
    out.put_slice(&encode_integer(0, false));
    out.put_slice(&encode_normalized(0.0)?);
    out.put_slice(&encode_normalized(height_fraction)?);

    if flags.clear {
        out.put_slice(&CLEAR_AREA);
        out.put_slice(&encode_boolean(flags.clear));
    }
    if flags.quantization {
        out.put_slice(&QUANTIZATION_MODE);
        out.put_slice(&[0x44, 0x01, 0x01]);
        out.put_slice(&encode_integer(0x7F, false));
        out.put_slice(&[0x44, 0x01, 0x03]);
    }
    if flags.translation {
        out.put_slice(&TRANSLATION_MODE);
        out.put_slice(&[0x44, 0x01, 0x02]);
    }

    Ok(HeaderDescriptor {
        bytes: out.freeze(),
    })
}
