use thiserror::Error;

/// Everything that can go wrong while pixelating a buffer.
///
/// Validation errors are raised before any pixel work starts.
#[derive(Debug, Error)]
pub enum PixelateError {
    #[error("block size must be a positive integer, got {0}")]
    InvalidBlockSize(usize),

    #[error("max colors must be a positive integer, got {0}")]
    InvalidMaxColors(usize),

    #[error("channel count must be a positive integer, got {0}")]
    InvalidChannels(usize),

    #[error(
        "pixel buffer length {len} does not match dimensions {width}x{height} with {channels} channels"
    )]
    DimensionMismatch {
        len: usize,
        width: usize,
        height: usize,
        channels: usize,
    },

    #[error("dimensions {width}x{height} with {channels} channels overflow the address space")]
    DimensionOverflow {
        width: usize,
        height: usize,
        channels: usize,
    },

    #[error("unable to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("PNG encode error: {0}")]
    Encode(#[source] image::ImageError),

    #[error("unable to seed the color clustering generator: {0}")]
    Entropy(getrandom::Error),

    #[error("failed to rebuild a {width}x{height} image from the pixel buffer")]
    RebuildImage { width: u32, height: u32 },
}
