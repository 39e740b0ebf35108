use image::{imageops::FilterType, DynamicImage, GenericImageView};

use crate::error::EncodeError;
use crate::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// horizontal / vertical size of one block cell of the target display
pub const CELL_WIDTH: u32 = 8;
pub const CELL_HEIGHT: u32 = 10;

/// Computes the on-screen dimensions for a source image: scale to fit the
/// canvas (never upscale), then round each dimension up to the block-cell
/// grid.
pub fn fit_dimensions(width: u32, height: u32) -> (u32, u32) {
    let ratio = (f64::from(SCREEN_WIDTH) / f64::from(width))
        .min(f64::from(SCREEN_HEIGHT) / f64::from(height))
        .min(1.0);
    let w = (f64::from(width) * ratio).round() as u32;
    let h = (f64::from(height) * ratio).round() as u32;
    (
        (w + CELL_WIDTH - 1) / CELL_WIDTH * CELL_WIDTH,
        (h + CELL_HEIGHT - 1) / CELL_HEIGHT * CELL_HEIGHT,
    )
}

/// An image resized onto the display's block-cell grid.
///
/// Dimensions are always grid-aligned; width never exceeds 320 and height
/// never exceeds 240.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    image: DynamicImage,
}

impl NormalizedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }
}

/// Resizes `image` to fit the canvas on the block-cell grid.
///
/// Resampling (Lanczos3) is skipped entirely when the fitted dimensions
/// already match the source.
pub fn normalize(image: DynamicImage) -> Result<NormalizedImage, EncodeError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(EncodeError::Unsupported(format!(
            "empty image ({width}x{height})"
        )));
    }
    let (w, h) = fit_dimensions(width, height);
    let image = if (w, h) == (width, height) {
        image
    } else {
        image.resize_exact(w, h, FilterType::Lanczos3)
    };
    Ok(NormalizedImage { image })
}

#[test]
fn test_fit_dimensions() {
    // 2:1 downscale lands exactly on the grid
    assert_eq!(fit_dimensions(640, 480), (320, 240));
    // already fitting images are untouched
    assert_eq!(fit_dimensions(320, 240), (320, 240));
    assert_eq!(fit_dimensions(8, 10), (8, 10));
    // never upscaled, only grid-rounded
    assert_eq!(fit_dimensions(100, 100), (104, 100));
    assert_eq!(fit_dimensions(3, 3), (8, 10));
    // width-bound scale: 1000x100 -> 320x32 -> grid
    assert_eq!(fit_dimensions(1000, 100), (320, 40));
}

#[test]
fn test_fit_dimensions_stay_on_grid() {
    for (w, h) in [(1, 1), (17, 923), (641, 481), (320, 240), (4000, 3000)] {
        let (fw, fh) = fit_dimensions(w, h);
        assert_eq!(fw % CELL_WIDTH, 0);
        assert_eq!(fh % CELL_HEIGHT, 0);
        assert!(fw <= SCREEN_WIDTH && fh <= SCREEN_HEIGHT, "{w}x{h} -> {fw}x{fh}");
    }
}

#[test]
fn test_normalize_resizes_oversized_image() {
    let img = DynamicImage::ImageRgb8(image::RgbImage::new(640, 480));
    let norm = normalize(img).unwrap();
    assert_eq!((norm.width(), norm.height()), (320, 240));
}

#[test]
fn test_normalize_keeps_aligned_image() {
    let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        8,
        10,
        image::Rgb([1, 2, 3]),
    ));
    let norm = normalize(img).unwrap();
    assert_eq!((norm.width(), norm.height()), (8, 10));
    // no resampling happened, pixels are untouched
    assert_eq!(norm.as_dynamic().to_rgb8().get_pixel(4, 5).0, [1, 2, 3]);
}

#[test]
fn test_normalize_rejects_empty_image() {
    let img = DynamicImage::ImageRgb8(image::RgbImage::new(0, 0));
    assert!(matches!(
        normalize(img),
        Err(EncodeError::Unsupported(_))
    ));
}
