//! Color swatches for presenting the palette of a pixelated image.

use std::collections::BTreeSet;

use palette::Srgb;

use crate::raster::Layout;
use crate::PixelateError;

/// The distinct visible colors of `pixels`, sorted by red, green, blue.
///
/// Buffers with 2 or 4 channels are read as gray+alpha or RGBA, and fully
/// transparent pixels are skipped. With 1 or 2 channels the gray sample is
/// used for all three components; with more than 4 only the first three
/// channels count.
pub fn palette_colors(pixels: &[u8], layout: Layout) -> Result<Vec<Srgb<u8>>, PixelateError> {
    layout.check(pixels)?;

    let channels = layout.channels;
    let alpha = match channels {
        2 => Some(1),
        4 => Some(3),
        _ => None,
    };

    let colors: BTreeSet<[u8; 3]> = pixels
        .chunks_exact(channels)
        .filter(|px| alpha.is_none_or(|a| px[a] > 0))
        .map(|px| match channels {
            1 | 2 => [px[0]; 3],
            _ => [px[0], px[1], px[2]],
        })
        .collect();

    Ok(colors
        .into_iter()
        .map(|[r, g, b]| Srgb::new(r, g, b))
        .collect())
}

/// `RRGGBB` hex strings for [`palette_colors`].
pub fn palette_hex(pixels: &[u8], layout: Layout) -> Result<Vec<String>, PixelateError> {
    Ok(palette_colors(pixels, layout)?
        .iter()
        .map(to_hex)
        .collect())
}

pub(crate) fn to_hex(c: &Srgb<u8>) -> String {
    format!("{:02X}{:02X}{:02X}", c.red, c.green, c.blue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transparent_pixels_are_skipped() {
        let pixels = [
            255, 0, 0, 255, //
            0, 0, 255, 0, //
            255, 0, 0, 128, //
            0, 16, 0, 1,
        ];
        let layout = Layout::new(2, 2, 4).unwrap();
        assert_eq!(palette_hex(&pixels, layout).unwrap(), vec!["001000", "FF0000"]);
    }

    #[test]
    fn gray_is_expanded() {
        let layout = Layout::new(3, 1, 1).unwrap();
        let colors = palette_colors(&[7, 200, 7], layout).unwrap();
        assert_eq!(colors, vec![Srgb::new(7, 7, 7), Srgb::new(200, 200, 200)]);
    }

    #[test]
    fn empty_image_has_no_colors() {
        let layout = Layout::new(0, 0, 3).unwrap();
        assert!(palette_hex(&[], layout).unwrap().is_empty());
    }
}
