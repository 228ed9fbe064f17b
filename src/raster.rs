use std::collections::HashMap;

use crate::PixelateError;

/// Shape of a raw, row-major pixel buffer.
///
/// A buffer matching this layout holds `width * height * channels` samples,
/// one byte per channel. The channel count is fixed for the whole buffer but
/// otherwise arbitrary (3 for RGB, 4 for RGBA, 1 for gray, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

impl Layout {
    pub fn new(width: usize, height: usize, channels: usize) -> Result<Self, PixelateError> {
        if channels == 0 {
            return Err(PixelateError::InvalidChannels(channels));
        }
        let layout = Self {
            width,
            height,
            channels,
        };
        layout.len()?;
        Ok(layout)
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Number of samples a buffer with this layout must hold.
    pub fn len(&self) -> Result<usize, PixelateError> {
        self.width
            .checked_mul(self.height)
            .and_then(|n| n.checked_mul(self.channels))
            .ok_or(PixelateError::DimensionOverflow {
                width: self.width,
                height: self.height,
                channels: self.channels,
            })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Fails unless `pixels` is exactly as long as this layout requires.
    pub fn check(&self, pixels: &[u8]) -> Result<(), PixelateError> {
        if self.channels == 0 {
            return Err(PixelateError::InvalidChannels(self.channels));
        }
        if pixels.len() != self.len()? {
            return Err(PixelateError::DimensionMismatch {
                len: pixels.len(),
                width: self.width,
                height: self.height,
                channels: self.channels,
            });
        }
        Ok(())
    }

    /// Offset of the first sample of pixel `(x, y)`.
    #[inline(always)]
    pub(crate) fn offset(&self, x: usize, y: usize) -> usize {
        (y * self.width + x) * self.channels
    }
}

// ------------------------------------------------------------
// Per-channel color arithmetic
// ------------------------------------------------------------

/// Running per-channel sums over a set of colors.
#[derive(Clone, Debug)]
pub(crate) struct ChannelSums {
    sums: Vec<u64>,
    count: u64,
}

impl ChannelSums {
    pub(crate) fn new(channels: usize) -> Self {
        Self {
            sums: vec![0; channels],
            count: 0,
        }
    }

    #[inline]
    pub(crate) fn push(&mut self, color: &[u8]) {
        for (sum, &sample) in self.sums.iter_mut().zip(color) {
            *sum += u64::from(sample);
        }
        self.count += 1;
    }

    #[inline]
    pub(crate) fn add(mut self, color: &[u8]) -> Self {
        self.push(color);
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Writes the rounded mean into `out`. An empty accumulator yields the
    /// zero color.
    pub(crate) fn write_mean(&self, out: &mut [u8]) {
        for (dst, &sum) in out.iter_mut().zip(&self.sums) {
            *dst = rounded_mean(sum, self.count);
        }
    }
}

/// Arithmetic mean of `count` samples adding up to `sum`, rounded to the
/// nearest integer with ties rounding up. Zero samples average to zero.
#[inline]
pub fn rounded_mean(sum: u64, count: u64) -> u8 {
    if count == 0 {
        return 0;
    }
    // floor(sum / count + 1/2)
    let mean = (2 * sum + count) / (2 * count);
    mean.min(u64::from(u8::MAX)) as u8
}

/// Sum over channels of squared sample differences.
#[inline(always)]
pub fn squared_distance(a: &[u8], b: &[u8]) -> u64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = u64::from(x.abs_diff(y));
            d * d
        })
        .sum()
}

/// Euclidean distance between two colors of the same channel count.
pub fn distance(a: &[u8], b: &[u8]) -> f64 {
    (squared_distance(a, b) as f64).sqrt()
}

/// Index of the color in `centroids` (stored flat, `channels` samples each)
/// closest to `color`. Ties go to the lowest index.
#[inline]
pub(crate) fn nearest(color: &[u8], centroids: &[u8], channels: usize) -> usize {
    let mut best_idx = 0;
    let mut best_dist = u64::MAX;
    for (idx, centroid) in centroids.chunks_exact(channels).enumerate() {
        let dist = squared_distance(color, centroid);
        if dist < best_dist {
            best_dist = dist;
            best_idx = idx;
        }
    }
    best_idx
}

// ------------------------------------------------------------
// Distinct colors
// ------------------------------------------------------------

/// The set of distinct colors present in a buffer.
///
/// Colors are kept in the order they first appear so that seeded clustering
/// runs are reproducible; no other meaning is attached to the order.
#[derive(Clone, Debug)]
pub struct DistinctColors {
    channels: usize,
    colors: Vec<u8>,
    index: HashMap<Box<[u8]>, usize>,
}

impl DistinctColors {
    pub fn from_pixels(pixels: &[u8], layout: Layout) -> Result<Self, PixelateError> {
        layout.check(pixels)?;
        Ok(Self::collect(layout.channels, pixels.chunks_exact(layout.channels)))
    }

    pub(crate) fn collect<'a>(channels: usize, iter: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let mut colors = Vec::new();
        let mut index: HashMap<Box<[u8]>, usize> = HashMap::new();
        for color in iter {
            if !index.contains_key(color) {
                index.insert(Box::from(color), index.len());
                colors.extend_from_slice(color);
            }
        }

        Self {
            channels,
            colors,
            index,
        }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The `i`-th distinct color.
    ///
    /// # Panics
    /// If `i >= self.len()`.
    #[inline]
    pub fn get(&self, i: usize) -> &[u8] {
        &self.colors[i * self.channels..(i + 1) * self.channels]
    }

    pub fn index_of(&self, color: &[u8]) -> Option<usize> {
        self.index.get(color).copied()
    }

    pub fn iter(&self) -> std::slice::ChunksExact<'_, u8> {
        self.colors.chunks_exact(self.channels)
    }

    /// All colors, stored flat.
    pub fn as_flat(&self) -> &[u8] {
        &self.colors
    }
}
