//! Approximate inner-product index
//!
//! Mirrors the flat inner-product index the original pipeline used: all
//! vectors are unit-normalized at build time and scored by raw dot product
//! at search time. Queries are NOT normalized here; the engine's contract
//! is "always normalize before calling build/search", and feeding
//! unnormalized queries returns dot products rather than cosines.
//!
//! Below [`FLAT_SCAN_CUTOFF`] vectors the search is exhaustive, so small
//! corpora produce rankings bit-identical to [`ExactIndex`](crate::ExactIndex)
//! for unit queries. Above the cutoff, vectors are partitioned into
//! spherical k-means buckets and only the closest `nprobe` buckets are
//! scanned.

use crate::error::MatchError;
use crate::index::{top_hits, SearchHit, SimilarityIndex};
use crate::vecmath;

/// Below this many vectors the index degenerates to an exhaustive scan.
pub const FLAT_SCAN_CUTOFF: usize = 64;

/// Lloyd iterations for the build-time clustering.
const KMEANS_ITERATIONS: usize = 4;

/// Centroid-pruned inner-product index.
pub struct ApproximateIndex {
    /// Unit-normalized copies of the build-time vectors.
    vectors: Vec<Vec<f32>>,
    /// Unit centroids; empty when the index runs in flat-scan mode.
    centroids: Vec<Vec<f32>>,
    /// Vector positions per centroid.
    buckets: Vec<Vec<usize>>,
    /// How many buckets to scan per query.
    nprobe: usize,
}

impl ApproximateIndex {
    /// Build an index over the given vectors, normalizing them first.
    ///
    /// # Errors
    ///
    /// [`MatchError::EmptyIndex`] when `vectors` is empty.
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self, MatchError> {
        if vectors.is_empty() {
            return Err(MatchError::EmptyIndex);
        }

        let vectors: Vec<Vec<f32>> = vectors.iter().map(|v| vecmath::normalize(v)).collect();

        if vectors.len() <= FLAT_SCAN_CUTOFF {
            return Ok(Self {
                vectors,
                centroids: Vec::new(),
                buckets: Vec::new(),
                nprobe: 0,
            });
        }

        let n_centroids = (vectors.len() as f64).sqrt().ceil() as usize;
        let (centroids, buckets) = cluster(&vectors, n_centroids);
        let nprobe = n_centroids.div_ceil(4).max(1);

        Ok(Self {
            vectors,
            centroids,
            buckets,
            nprobe,
        })
    }

    fn is_flat(&self) -> bool {
        self.centroids.is_empty()
    }

    fn scan(&self, query: &[f32], positions: impl Iterator<Item = usize>) -> Vec<SearchHit> {
        positions
            .map(|position| SearchHit {
                score: vecmath::dot(query, &self.vectors[position]),
                position,
            })
            .collect()
    }
}

impl SimilarityIndex for ApproximateIndex {
    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn search(&self, queries: &[Vec<f32>], k: usize) -> Vec<Vec<SearchHit>> {
        queries
            .iter()
            .map(|query| {
                let scored = if self.is_flat() {
                    self.scan(query, 0..self.vectors.len())
                } else {
                    let probed = self.nearest_buckets(query);
                    self.scan(
                        query,
                        probed.into_iter().flat_map(|b| self.buckets[b].iter().copied()),
                    )
                };
                top_hits(scored, k)
            })
            .collect()
    }
}

impl ApproximateIndex {
    /// Indices of the `nprobe` centroids closest to the query by dot
    /// product, ties broken by lowest centroid index.
    fn nearest_buckets(&self, query: &[f32]) -> Vec<usize> {
        let mut scored: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, vecmath::dot(query, c)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(self.nprobe);
        scored.into_iter().map(|(i, _)| i).collect()
    }
}

/// Deterministic spherical k-means over unit vectors.
///
/// Initial centroids are stride-sampled from the input so repeated builds
/// over the same vector list produce identical buckets.
fn cluster(vectors: &[Vec<f32>], n_centroids: usize) -> (Vec<Vec<f32>>, Vec<Vec<usize>>) {
    let n = vectors.len();
    let dim = vectors[0].len();

    let mut centroids: Vec<Vec<f32>> = (0..n_centroids)
        .map(|i| vectors[i * n / n_centroids].clone())
        .collect();
    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); n_centroids];

    for _ in 0..KMEANS_ITERATIONS {
        for bucket in &mut buckets {
            bucket.clear();
        }

        for (position, vector) in vectors.iter().enumerate() {
            let mut best = 0;
            let mut best_score = f32::NEG_INFINITY;
            for (i, centroid) in centroids.iter().enumerate() {
                let score = vecmath::dot(vector, centroid);
                if score > best_score {
                    best = i;
                    best_score = score;
                }
            }
            buckets[best].push(position);
        }

        for (i, bucket) in buckets.iter().enumerate() {
            if bucket.is_empty() {
                continue; // keep the stale centroid; its bucket stays prunable
            }
            let mut mean = vec![0.0f32; dim];
            for &position in bucket {
                for (m, x) in mean.iter_mut().zip(vectors[position].iter()) {
                    *m += x;
                }
            }
            let len = bucket.len() as f32;
            for m in &mut mean {
                *m /= len;
            }
            centroids[i] = vecmath::normalize(&mean);
        }
    }

    (centroids, buckets)
}
