use rand::Rng;

use crate::raster::{nearest, ChannelSums, DistinctColors, Layout};
use crate::PixelateError;

#[cfg(feature = "threads")]
use rayon::prelude::*;

/// Upper bound on assignment/update rounds of a single clustering run.
pub const MAX_ITERATIONS: usize = 10;

/// Result of running k-means over a set of distinct colors.
#[derive(Clone, Debug)]
pub struct Clusters {
    channels: usize,
    centroids: Vec<u8>,
    iterations: usize,
    converged: bool,
}

impl Clusters {
    #[inline]
    pub fn len(&self) -> usize {
        self.centroids.len() / self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    pub fn centroid(&self, i: usize) -> &[u8] {
        &self.centroids[i * self.channels..(i + 1) * self.channels]
    }

    /// Centroids stored flat, `channels` samples each.
    pub fn centroids(&self) -> &[u8] {
        &self.centroids
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// `false` when the run stopped at [`MAX_ITERATIONS`] with assignments
    /// still moving.
    pub fn converged(&self) -> bool {
        self.converged
    }
}

/// Cluster `colors` into (at most) `k` groups with k-means in the sample
/// space of the buffer.
///
/// Centroids are seeded by drawing `k` colors uniformly, with replacement,
/// from `colors` using `rng`. Each round assigns every color to its nearest
/// centroid (squared Euclidean distance, ties to the lowest index) and moves
/// every non-empty cluster to the rounded mean of its members. Empty clusters
/// keep their centroid. Stops after a round with no reassignment or after
/// [`MAX_ITERATIONS`] rounds.
pub fn cluster_colors<R>(
    colors: &DistinctColors,
    k: usize,
    rng: &mut R,
) -> Result<Clusters, PixelateError>
where
    R: Rng + ?Sized,
{
    if k == 0 {
        return Err(PixelateError::InvalidMaxColors(k));
    }

    let channels = colors.channels();
    if colors.is_empty() {
        return Ok(Clusters {
            channels,
            centroids: Vec::new(),
            iterations: 0,
            converged: true,
        });
    }

    let mut centroids = Vec::with_capacity(k * channels);
    for _ in 0..k {
        centroids.extend_from_slice(colors.get(rng.gen_range(0..colors.len())));
    }

    let mut assignments = vec![0usize; colors.len()];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < MAX_ITERATIONS {
        let next = assign(colors, &centroids);
        let moved = next
            .iter()
            .zip(&assignments)
            .filter(|(a, b)| a != b)
            .count();
        assignments = next;

        let sums = assignments.iter().zip(colors.iter()).fold(
            vec![ChannelSums::new(channels); k],
            |mut sums, (&cluster, color)| {
                sums[cluster].push(color);
                sums
            },
        );
        for (sum, centroid) in sums.iter().zip(centroids.chunks_exact_mut(channels)) {
            if !sum.is_empty() {
                sum.write_mean(centroid);
            }
        }

        iterations += 1;
        log::trace!("k-means round {iterations}: {moved} colors reassigned");

        if moved == 0 {
            converged = true;
            break;
        }
    }

    log::debug!(
        "clustered {} colors into {k} centroids in {iterations} rounds (converged: {converged})",
        colors.len()
    );

    Ok(Clusters {
        channels,
        centroids,
        iterations,
        converged,
    })
}

#[cfg(feature = "threads")]
fn assign(colors: &DistinctColors, centroids: &[u8]) -> Vec<usize> {
    let channels = colors.channels();
    colors
        .as_flat()
        .par_chunks_exact(channels)
        .map(|color| nearest(color, centroids, channels))
        .collect()
}

#[cfg(not(feature = "threads"))]
fn assign(colors: &DistinctColors, centroids: &[u8]) -> Vec<usize> {
    let channels = colors.channels();
    colors
        .iter()
        .map(|color| nearest(color, centroids, channels))
        .collect()
}

// ------------------------------------------------------------
// Color mapping
// ------------------------------------------------------------

/// Replacement color for every distinct color of a buffer.
#[derive(Clone, Debug)]
pub struct ColorMapping {
    sources: DistinctColors,
    targets: Vec<u8>,
}

impl ColorMapping {
    /// Maps every color to itself.
    pub fn identity(sources: DistinctColors) -> Self {
        let targets = sources.as_flat().to_vec();
        Self { sources, targets }
    }

    /// Maps every color to its nearest centroid, ties to the lowest index.
    pub fn nearest(sources: DistinctColors, centroids: &[u8]) -> Self {
        let channels = sources.channels();
        if centroids.is_empty() {
            return Self::identity(sources);
        }
        let mut targets = Vec::with_capacity(sources.as_flat().len());
        for idx in assign(&sources, centroids) {
            targets.extend_from_slice(&centroids[idx * channels..(idx + 1) * channels]);
        }
        Self { sources, targets }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Replacement for `color`, or `None` if it was not in the source buffer.
    pub fn get(&self, color: &[u8]) -> Option<&[u8]> {
        let channels = self.sources.channels();
        self.sources
            .index_of(color)
            .map(|i| &self.targets[i * channels..(i + 1) * channels])
    }

    /// Recolors `pixels`. Colors unknown to the mapping are copied through.
    pub fn apply(&self, pixels: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(pixels.len());
        for color in pixels.chunks_exact(self.sources.channels()) {
            out.extend_from_slice(self.get(color).unwrap_or(color));
        }
        out
    }

    /// The distinct replacement colors.
    pub fn palette(&self) -> DistinctColors {
        let channels = self.sources.channels();
        DistinctColors::collect(channels, self.targets.chunks_exact(channels))
    }
}

// ------------------------------------------------------------
// Palette reduction
// ------------------------------------------------------------

/// Reduce `pixels` to at most `max_colors` distinct colors.
///
/// Buffers that already fit are returned unchanged. Otherwise the distinct
/// colors are clustered with [`cluster_colors`] and every pixel is replaced by
/// the centroid nearest to its color.
///
/// Clustering is seeded from `rng`, so different generators may produce
/// different (equally valid) palettes for the same input.
pub fn reduce_palette<R>(
    pixels: &[u8],
    layout: Layout,
    max_colors: usize,
    rng: &mut R,
) -> Result<Vec<u8>, PixelateError>
where
    R: Rng + ?Sized,
{
    reduce_palette_with_mapping(pixels, layout, max_colors, rng).map(|(out, _)| out)
}

/// Like [`reduce_palette`], also returning the mapping that was applied.
pub fn reduce_palette_with_mapping<R>(
    pixels: &[u8],
    layout: Layout,
    max_colors: usize,
    rng: &mut R,
) -> Result<(Vec<u8>, ColorMapping), PixelateError>
where
    R: Rng + ?Sized,
{
    if max_colors == 0 {
        return Err(PixelateError::InvalidMaxColors(max_colors));
    }

    let distinct = DistinctColors::from_pixels(pixels, layout)?;
    if distinct.len() <= max_colors {
        log::debug!(
            "{} distinct colors fit within {max_colors}, skipping reduction",
            distinct.len()
        );
        return Ok((pixels.to_vec(), ColorMapping::identity(distinct)));
    }

    let clusters = cluster_colors(&distinct, max_colors, rng)?;
    let mapping = ColorMapping::nearest(distinct, clusters.centroids());
    let out = mapping.apply(pixels);

    Ok((out, mapping))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use rand::SeedableRng;
    use rand_xoshiro::Xoroshiro128PlusPlus;

    fn rng() -> Xoroshiro128PlusPlus {
        Xoroshiro128PlusPlus::seed_from_u64(0x5eed)
    }

    fn distinct(pixels: &[u8], channels: usize) -> DistinctColors {
        let layout = Layout::new(pixels.len() / channels, 1, channels).unwrap();
        DistinctColors::from_pixels(pixels, layout).unwrap()
    }

    #[test]
    fn zero_clusters_is_rejected() {
        let colors = distinct(&[1, 2, 3], 3);
        assert!(matches!(
            cluster_colors(&colors, 0, &mut rng()),
            Err(PixelateError::InvalidMaxColors(0))
        ));
    }

    #[test]
    fn single_cluster_lands_on_the_mean() {
        let colors = distinct(&[0, 0, 0, 10, 20, 30, 20, 40, 60], 3);
        let clusters = cluster_colors(&colors, 1, &mut rng()).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters.centroid(0), &[10, 20, 30]);
        assert!(clusters.converged());
        // Every color stays on cluster 0, so the first round settles it.
        assert_eq!(clusters.iterations(), 1);
    }

    #[test]
    fn empty_clusters_keep_their_seed() {
        // Every draw picks the first distinct color, so all seeds coincide.
        let mut rng = StepRng::new(0, 0);
        let colors = distinct(&[0, 0, 0, 10, 10, 10, 200, 200, 200], 3);
        let clusters = cluster_colors(&colors, 3, &mut rng).unwrap();

        assert_eq!(clusters.len(), 3);
        // Ties go to centroid 0, nothing moves and the run stops at once.
        assert_eq!(clusters.iterations(), 1);
        assert!(clusters.converged());
        assert_eq!(clusters.centroid(0), &[70, 70, 70]);
        assert_eq!(clusters.centroid(1), &[0, 0, 0]);
        assert_eq!(clusters.centroid(2), &[0, 0, 0]);

        let mapping = ColorMapping::nearest(colors, clusters.centroids());
        assert_eq!(mapping.get(&[0, 0, 0]), Some(&[0u8, 0, 0][..]));
        assert_eq!(mapping.get(&[10, 10, 10]), Some(&[0u8, 0, 0][..]));
        assert_eq!(mapping.get(&[200, 200, 200]), Some(&[70u8, 70, 70][..]));
        assert_eq!(mapping.palette().len(), 2);
    }

    #[test]
    fn separated_groups_converge() {
        let mut pixels = Vec::new();
        for v in [0u8, 2, 4] {
            pixels.extend_from_slice(&[v, v, v]);
        }
        for v in [250u8, 252, 254] {
            pixels.extend_from_slice(&[v, v, v]);
        }
        let colors = distinct(&pixels, 3);
        let clusters = cluster_colors(&colors, 2, &mut rng()).unwrap();
        let mapping = ColorMapping::nearest(colors, clusters.centroids());

        // Colors from the same group share a target.
        assert_eq!(mapping.get(&[0, 0, 0]), mapping.get(&[4, 4, 4]));
        assert_eq!(mapping.get(&[250, 250, 250]), mapping.get(&[254, 254, 254]));
        assert!(mapping.palette().len() <= 2);
    }

    #[test]
    fn mapping_copies_unknown_colors() {
        let colors = distinct(&[1, 1, 1, 9, 9, 9], 3);
        let mapping = ColorMapping::nearest(colors, &[0, 0, 0]);
        assert_eq!(mapping.get(&[9, 9, 9]), Some(&[0u8, 0, 0][..]));
        assert_eq!(mapping.get(&[5, 5, 5]), None);
        assert_eq!(
            mapping.apply(&[9, 9, 9, 5, 5, 5]),
            vec![0, 0, 0, 5, 5, 5]
        );
    }

    #[test]
    fn fitting_palette_is_untouched() {
        let pixels = [1, 2, 3, 4, 5, 6, 1, 2, 3];
        let layout = Layout::new(3, 1, 3).unwrap();
        let (out, mapping) = reduce_palette_with_mapping(&pixels, layout, 2, &mut rng()).unwrap();
        assert_eq!(out, pixels);
        assert_eq!(mapping.get(&[4, 5, 6]), Some(&[4u8, 5, 6][..]));
    }

    #[test]
    fn reduction_respects_the_bound() {
        let pixels: Vec<u8> = (0..=255u8).flat_map(|v| [v, 255 - v, v / 2]).collect();
        let layout = Layout::new(16, 16, 3).unwrap();
        for k in [1, 2, 5, 17] {
            let out = reduce_palette(&pixels, layout, k, &mut rng()).unwrap();
            assert_eq!(out.len(), pixels.len());
            assert!(distinct(&out, 3).len() <= k, "k = {k}");
        }
    }

    #[test]
    fn same_seed_same_result() {
        let pixels: Vec<u8> = (0..64u8).flat_map(|v| [v * 4, v, 255 - v]).collect();
        let layout = Layout::new(8, 8, 3).unwrap();
        let a = reduce_palette(&pixels, layout, 4, &mut rng()).unwrap();
        let b = reduce_palette(&pixels, layout, 4, &mut rng()).unwrap();
        assert_eq!(a, b);
    }
}
