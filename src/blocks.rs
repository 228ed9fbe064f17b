use crate::raster::{ChannelSums, Layout};
use crate::PixelateError;

#[cfg(feature = "threads")]
use rayon::prelude::*;

/// Replace every `block_size × block_size` tile of the image with its mean
/// color.
///
/// Tiles start at multiples of `block_size`; the last column and row of tiles
/// are clipped to the image and may be smaller. Each channel is averaged
/// independently and rounded half up. The input is left untouched.
///
/// `block_size == 1` is the identity, and re-applying the same block size to
/// the output changes nothing.
pub fn average_blocks(
    pixels: &[u8],
    layout: Layout,
    block_size: usize,
) -> Result<Vec<u8>, PixelateError> {
    if block_size == 0 {
        return Err(PixelateError::InvalidBlockSize(block_size));
    }
    layout.check(pixels)?;

    let mut out = vec![0u8; pixels.len()];
    if layout.is_empty() {
        return Ok(out);
    }

    // A block larger than the image covers all of it.
    let block_size = block_size.min(layout.width.max(layout.height));

    // One band = one row of blocks; bands never share output rows.
    let band_len = layout.width * layout.channels * block_size.min(layout.height);

    #[cfg(feature = "threads")]
    out.par_chunks_mut(band_len)
        .enumerate()
        .for_each(|(band, out_band)| {
            average_band(pixels, layout, block_size, band * block_size, out_band)
        });

    #[cfg(not(feature = "threads"))]
    out.chunks_mut(band_len)
        .enumerate()
        .for_each(|(band, out_band)| {
            average_band(pixels, layout, block_size, band * block_size, out_band)
        });

    log::debug!(
        "averaged {}x{} image into {}px blocks",
        layout.width,
        layout.height,
        block_size
    );

    Ok(out)
}

/// Averages one row of blocks whose top edge is at `y0`. `out_band` holds the
/// output rows `y0..y0 + out_band.len() / row_len`.
fn average_band(pixels: &[u8], layout: Layout, block_size: usize, y0: usize, out_band: &mut [u8]) {
    let channels = layout.channels;
    let row_len = layout.width * channels;
    let y1 = (y0 + block_size).min(layout.height);

    let mut color = vec![0u8; channels];
    for x0 in (0..layout.width).step_by(block_size) {
        let x1 = (x0 + block_size).min(layout.width);

        let sums = (y0..y1)
            .flat_map(|y| pixels[layout.offset(x0, y)..layout.offset(x1, y)].chunks_exact(channels))
            .fold(ChannelSums::new(channels), ChannelSums::add);
        sums.write_mean(&mut color);

        for row in out_band.chunks_exact_mut(row_len) {
            for dst in row[x0 * channels..x1 * channels].chunks_exact_mut(channels) {
                dst.copy_from_slice(&color);
            }
        }
    }
}
