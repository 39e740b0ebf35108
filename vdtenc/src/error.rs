/// Errors produced while turning a source image into a `.vdt` stream.
///
/// Domain and format errors are not retryable, they indicate bad input or
/// a corrupt compressed stream and propagate to the caller of that image's
/// pipeline run.
#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error("normalized value {0} outside of [-1, 1]")]
    Domain(f64),

    #[error("malformed jpeg stream: {0}")]
    Format(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported input: {0}")]
    Unsupported(String),

    #[error("could not decode source image: {0}")]
    Image(#[from] image::ImageError),

    #[error("jpeg encoder failed: {0}")]
    Jpeg(#[from] jpeg_encoder::EncodingError),
}
