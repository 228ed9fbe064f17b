use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoroshiro128PlusPlus;

use crate::blocks::average_blocks;
use crate::raster::Layout;
use crate::reduce::reduce_palette;
use crate::PixelateError;

pub const DEFAULT_BLOCK_SIZE: usize = 5;
pub const DEFAULT_MAX_COLORS: usize = 32;

/// Options controlling a pixelation run.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct PixelateConfig {
    /// Side length of the averaging blocks, in pixels.
    pub block_size: usize,
    /// Run palette reduction after block averaging.
    pub smart_mode: bool,
    /// Palette size bound used when `smart_mode` is on.
    pub max_colors: usize,
    /// Seed for palette clustering. `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for PixelateConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            smart_mode: false,
            max_colors: DEFAULT_MAX_COLORS,
            seed: None,
        }
    }
}

impl PixelateConfig {
    /// Rejects non-positive block sizes, and non-positive palette bounds when
    /// palette reduction is enabled.
    pub fn validate(&self) -> Result<(), PixelateError> {
        if self.block_size == 0 {
            return Err(PixelateError::InvalidBlockSize(self.block_size));
        }
        if self.smart_mode && self.max_colors == 0 {
            return Err(PixelateError::InvalidMaxColors(self.max_colors));
        }
        Ok(())
    }

    /// The clustering generator for this configuration.
    pub fn rng(&self) -> Result<Xoroshiro128PlusPlus, PixelateError> {
        let seed = match self.seed {
            Some(seed) => seed,
            None => {
                let mut bytes = [0u8; 8];
                getrandom::fill(&mut bytes).map_err(PixelateError::Entropy)?;
                u64::from_le_bytes(bytes)
            }
        };
        Ok(Xoroshiro128PlusPlus::seed_from_u64(seed))
    }
}

/// Block-average `pixels` and, in smart mode, reduce the result's palette.
///
/// The clustering generator comes from [`PixelateConfig::rng`]; use
/// [`pixelate_raw_with`] to supply one directly.
pub fn pixelate_raw(
    pixels: &[u8],
    layout: Layout,
    config: &PixelateConfig,
) -> Result<Vec<u8>, PixelateError> {
    config.validate()?;
    layout.check(pixels)?;

    if config.smart_mode {
        let mut rng = config.rng()?;
        pixelate_raw_with(pixels, layout, config, &mut rng)
    } else {
        average_blocks(pixels, layout, config.block_size)
    }
}

/// [`pixelate_raw`] with a caller-provided clustering generator.
/// `config.seed` is ignored.
pub fn pixelate_raw_with<R>(
    pixels: &[u8],
    layout: Layout,
    config: &PixelateConfig,
    rng: &mut R,
) -> Result<Vec<u8>, PixelateError>
where
    R: Rng + ?Sized,
{
    config.validate()?;
    layout.check(pixels)?;

    let averaged = average_blocks(pixels, layout, config.block_size)?;
    if !config.smart_mode {
        return Ok(averaged);
    }

    reduce_palette(&averaged, layout, config.max_colors, rng)
}
