//! Standalone k-means palette extraction over a pixel sample.
//!
//! This is an optional utility for deriving a small anchor palette from an
//! image; the per-cell dominant-color path does not go through it.

use rand::Rng;

use super::{euclidean_distance, hsl_to_rgb};

/// Centroid movement below this aborts iteration early.
const CONVERGENCE_EPSILON: f32 = 1.0;

#[derive(Clone, Copy, Debug)]
pub struct KMeansOptions {
    /// Cluster count K.
    pub clusters: usize,
    /// Upper bound on Lloyd's-algorithm iterations.
    pub max_iterations: usize,
}

impl Default for KMeansOptions {
    fn default() -> Self {
        Self { clusters: 3, max_iterations: 10 }
    }
}

/// Runs Lloyd's algorithm over `pixels` (RGB vectors in [0, 255]) and
/// returns the final centroids. Centroids are seeded from random saturated
/// mid-lightness colors so the initial guesses avoid near-black and
/// near-white regions.
pub fn cluster_palette(pixels: &[[f32; 3]], options: KMeansOptions, rng: &mut impl Rng) -> Vec<[f32; 3]> {
    if options.clusters == 0 {
        return Vec::new();
    }

    let mut centroids: Vec<[f32; 3]> = (0..options.clusters)
        .map(|_| {
            let h = rng.gen_range(0.0..360.0);
            let s = 70.0 + rng.gen_range(0.0..30.0);
            let l = 30.0 + rng.gen_range(0.0..40.0);
            let rgb = hsl_to_rgb(h, s, l);
            [rgb[0] as f32, rgb[1] as f32, rgb[2] as f32]
        })
        .collect();

    if pixels.is_empty() {
        return centroids;
    }

    for _ in 0..options.max_iterations {
        let mut sums = vec![[0.0f64; 3]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];

        for pixel in pixels {
            let mut nearest = 0;
            let mut best = f32::INFINITY;
            for (index, centroid) in centroids.iter().enumerate() {
                let distance = euclidean_distance(*pixel, *centroid);
                if distance < best {
                    best = distance;
                    nearest = index;
                }
            }
            for channel in 0..3 {
                sums[nearest][channel] += pixel[channel] as f64;
            }
            counts[nearest] += 1;
        }

        let next: Vec<[f32; 3]> = sums
            .iter()
            .zip(&counts)
            .map(|(sum, &count)| {
                if count == 0 {
                    [0.0, 0.0, 0.0]
                } else {
                    [
                        (sum[0] / count as f64) as f32,
                        (sum[1] / count as f64) as f32,
                        (sum[2] / count as f64) as f32,
                    ]
                }
            })
            .collect();

        let converged = centroids
            .iter()
            .zip(&next)
            .all(|(old, new)| euclidean_distance(*old, *new) < CONVERGENCE_EPSILON);

        centroids = next;
        if converged {
            break;
        }
    }

    centroids
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn separates_two_tight_clusters() {
        let mut pixels = Vec::new();
        for offset in 0..20 {
            let jitter = (offset % 5) as f32;
            pixels.push([10.0 + jitter, 10.0, 10.0]);
            pixels.push([240.0 - jitter, 240.0, 240.0]);
        }

        let mut rng = StdRng::seed_from_u64(7);
        let options = KMeansOptions { clusters: 2, max_iterations: 25 };
        let centroids = cluster_palette(&pixels, options, &mut rng);
        assert_eq!(centroids.len(), 2);

        for target in [[12.0f32, 10.0, 10.0], [238.0, 240.0, 240.0]] {
            let nearest = centroids
                .iter()
                .map(|c| euclidean_distance(*c, target))
                .fold(f32::INFINITY, f32::min);
            assert!(nearest < 10.0, "no centroid near {target:?}: {centroids:?}");
        }
    }

    #[test]
    fn empty_sample_returns_seed_centroids() {
        let mut rng = StdRng::seed_from_u64(1);
        let centroids = cluster_palette(&[], KMeansOptions::default(), &mut rng);
        assert_eq!(centroids.len(), 3);
    }

    #[test]
    fn zero_clusters_is_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        let options = KMeansOptions { clusters: 0, max_iterations: 10 };
        assert!(cluster_palette(&[[1.0, 2.0, 3.0]], options, &mut rng).is_empty());
    }
}
