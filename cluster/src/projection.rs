//! Seeded nonlinear projection of embeddings into 2D.
//!
//! The reducer follows the UMAP recipe: a fuzzy k-nearest-neighbour graph is
//! built in the input space (per-point bandwidths found by binary search so
//! each neighbourhood carries `log2(k)` total membership), then a 2D layout
//! is optimised by stochastic gradient descent with attractive updates along
//! graph edges and repulsive negative samples. The layout starts from the
//! top two principal components, scaled to `[-10, 10]`.
//!
//! Out-of-sample points are placed at the membership-weighted mean of their
//! nearest training points' positions and then refined with the training
//! layout held fixed. The fit is never updated by a transform.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::math::{dist_sq2, euclidean, Point2};
use crate::ClusterError;

/// Projection hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Neighbourhood size, counting the point itself. Default: 15.
    pub n_neighbors: usize,

    /// Minimum distance between points in the layout. Default: 0.1.
    pub min_dist: f32,

    /// Scale of the layout's distance falloff. Default: 1.0.
    pub spread: f32,

    /// Optimisation epochs for the fit; transforms use a third. Default: 200.
    pub n_epochs: usize,

    /// Initial SGD step size, decayed linearly to zero. Default: 1.0.
    pub learning_rate: f32,

    /// Repulsive samples per attractive update. Default: 5.
    pub negative_sample_rate: usize,

    /// Seed for every random draw in fit and transform. Default: 42.
    pub seed: u64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            min_dist: 0.1,
            spread: 1.0,
            n_epochs: 200,
            learning_rate: 1.0,
            negative_sample_rate: 5,
            seed: 42,
        }
    }
}

/// A fitted projection. Keeps its training set so new points can be placed
/// relative to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    config: ProjectionConfig,
    a: f32,
    b: f32,
    data: Vec<Vec<f32>>,
    embedding: Vec<Point2>,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    head: usize,
    tail: usize,
    weight: f32,
}

impl Projection {
    /// Fits the projection on exactly `data`. Deterministic for a given
    /// config and input order.
    pub fn fit(data: &[Vec<f32>], config: &ProjectionConfig) -> Result<Self, ClusterError> {
        let first = data.first().ok_or(ClusterError::EmptyInput)?;
        let dim = first.len();
        for v in data {
            if v.len() != dim {
                return Err(ClusterError::DimensionMismatch {
                    expected: dim,
                    got: v.len(),
                });
            }
        }

        let n = data.len();
        let (a, b) = fit_ab(config.spread, config.min_dist);
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut embedding = pca_init(data, &mut rng);

        let k = config.n_neighbors.max(2).min(n);
        if k >= 2 {
            let mut directed = vec![Vec::new(); n];
            for (i, x) in data.iter().enumerate() {
                let neighbors = nearest(data, x, k - 1, Some(i));
                let dists: Vec<f64> = neighbors.iter().map(|&(_, d)| d).collect();
                let weights = memberships(&dists, k, true);
                directed[i] = neighbors
                    .iter()
                    .zip(weights)
                    .map(|(&(j, _), w)| (j, w))
                    .collect::<Vec<_>>();
            }

            let edges = symmetrize(&directed, config.n_epochs);
            optimize(
                &mut embedding,
                None,
                &edges,
                config.n_epochs,
                a,
                b,
                config,
                &mut rng,
            );
        }

        Ok(Self {
            config: config.clone(),
            a,
            b,
            data: data.to_vec(),
            embedding,
        })
    }

    /// Places a new point in the fitted layout.
    pub fn transform(&self, x: &[f32]) -> Result<Point2, ClusterError> {
        if x.len() != self.dimension() {
            return Err(ClusterError::DimensionMismatch {
                expected: self.dimension(),
                got: x.len(),
            });
        }
        let n = self.data.len();
        if n == 0 {
            return Err(ClusterError::EmptyInput);
        }

        let k = self.config.n_neighbors.max(1).min(n);
        let neighbors = nearest(&self.data, x, k, None);
        let dists: Vec<f64> = neighbors.iter().map(|&(_, d)| d).collect();
        // The new point is not among its own neighbours, so no local
        // connectivity offset applies.
        let weights = memberships(&dists, k, false);

        let total: f32 = weights.iter().sum();
        let mut init = [0.0f32; 2];
        for (&(j, _), &w) in neighbors.iter().zip(&weights) {
            let share = if total > 0.0 { w / total } else { 1.0 / k as f32 };
            init[0] += share * self.embedding[j][0];
            init[1] += share * self.embedding[j][1];
        }

        let n_epochs = self.config.n_epochs / 3;
        if n_epochs == 0 {
            return Ok(init);
        }

        let max_w = weights.iter().copied().fold(0.0f32, f32::max);
        let edges: Vec<Edge> = neighbors
            .iter()
            .zip(&weights)
            .filter(|&(_, &w)| w > 0.0 && w >= max_w / n_epochs as f32)
            .map(|(&(j, _), &w)| Edge {
                head: 0,
                tail: j,
                weight: w,
            })
            .collect();

        let mut head = vec![init];
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        optimize(
            &mut head,
            Some(&self.embedding),
            &edges,
            n_epochs,
            self.a,
            self.b,
            &self.config,
            &mut rng,
        );
        Ok(head[0])
    }

    /// Dimensionality of the input space.
    pub fn dimension(&self) -> usize {
        self.data.first().map(|v| v.len()).unwrap_or(0)
    }

    /// Number of training points.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the projection was fitted on no points.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Layout positions of the training points, in input order.
    pub fn embedding(&self) -> &[Point2] {
        &self.embedding
    }

    /// Hyperparameters the projection was fitted with.
    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Checks internal consistency after deserialization.
    pub(crate) fn validate(&self) -> Result<(), ClusterError> {
        if self.data.len() != self.embedding.len() {
            return Err(ClusterError::InvalidFormat(format!(
                "projection has {} points but {} layout positions",
                self.data.len(),
                self.embedding.len()
            )));
        }
        let dim = self.dimension();
        if let Some(v) = self.data.iter().find(|v| v.len() != dim) {
            return Err(ClusterError::InvalidFormat(format!(
                "ragged projection data: {} vs {}",
                v.len(),
                dim
            )));
        }
        Ok(())
    }
}

/// Returns the `k` nearest points of `data` to `x` as (index, distance),
/// closest first, ties broken by index.
fn nearest(data: &[Vec<f32>], x: &[f32], k: usize, skip: Option<usize>) -> Vec<(usize, f64)> {
    let mut all: Vec<(usize, f64)> = data
        .iter()
        .enumerate()
        .filter(|&(i, _)| Some(i) != skip)
        .map(|(i, v)| (i, euclidean(x, v)))
        .collect();
    all.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    all.truncate(k);
    all
}

/// Converts sorted neighbour distances to fuzzy memberships.
///
/// The bandwidth is found by binary search so memberships sum to
/// `log2(k)`. With `local_connectivity` the nearest non-zero distance is
/// subtracted first, so every point is fully connected to its closest
/// neighbour.
fn memberships(dists: &[f64], k: usize, local_connectivity: bool) -> Vec<f32> {
    const TOLERANCE: f64 = 1e-5;
    const MIN_K_DIST_SCALE: f64 = 1e-3;

    if dists.is_empty() {
        return Vec::new();
    }

    let rho = if local_connectivity {
        dists.iter().copied().find(|&d| d > 0.0).unwrap_or(0.0)
    } else {
        0.0
    };
    let target = (k as f64).log2();

    let mut lo = 0.0f64;
    let mut hi = f64::INFINITY;
    let mut sigma = 1.0f64;
    for _ in 0..64 {
        let psum: f64 = dists
            .iter()
            .map(|&d| {
                let d = d - rho;
                if d > 0.0 { (-d / sigma).exp() } else { 1.0 }
            })
            .sum();
        if (psum - target).abs() < TOLERANCE {
            break;
        }
        if psum > target {
            hi = sigma;
            sigma = (lo + hi) / 2.0;
        } else {
            lo = sigma;
            sigma = if hi.is_infinite() { sigma * 2.0 } else { (lo + hi) / 2.0 };
        }
    }

    let mean = dists.iter().sum::<f64>() / dists.len() as f64;
    sigma = sigma.max(MIN_K_DIST_SCALE * mean);

    dists
        .iter()
        .map(|&d| {
            let d = d - rho;
            if d <= 0.0 {
                1.0
            } else if sigma > 0.0 {
                (-d / sigma).exp() as f32
            } else {
                0.0
            }
        })
        .collect()
}

/// Combines directed memberships with the fuzzy union
/// `w_ij + w_ji - w_ij * w_ji` and drops edges too weak to be sampled
/// within `n_epochs`. Both directions of each pair are kept.
fn symmetrize(directed: &[Vec<(usize, f32)>], n_epochs: usize) -> Vec<Edge> {
    let n = directed.len();
    let mut dense: Vec<std::collections::BTreeMap<usize, f32>> = vec![Default::default(); n];
    for (i, row) in directed.iter().enumerate() {
        for &(j, w) in row {
            dense[i].insert(j, w);
        }
    }

    let mut edges = Vec::new();
    for i in 0..n {
        let mut cols: Vec<usize> = dense[i].keys().copied().collect();
        for (j, row) in dense.iter().enumerate() {
            if row.contains_key(&i) && !dense[i].contains_key(&j) {
                cols.push(j);
            }
        }
        cols.sort_unstable();
        for j in cols {
            let wij = dense[i].get(&j).copied().unwrap_or(0.0);
            let wji = dense[j].get(&i).copied().unwrap_or(0.0);
            let w = wij + wji - wij * wji;
            if w > 0.0 {
                edges.push(Edge {
                    head: i,
                    tail: j,
                    weight: w,
                });
            }
        }
    }

    let max_w = edges.iter().map(|e| e.weight).fold(0.0f32, f32::max);
    let floor = if n_epochs > 0 { max_w / n_epochs as f32 } else { 0.0 };
    edges.retain(|e| e.weight >= floor);
    edges
}

/// Stochastic gradient descent over the layout.
///
/// When `tail` is `None` the edges connect points of `head` and both ends
/// move. Otherwise only `head` moves and `tail` is a fixed reference layout.
#[allow(clippy::too_many_arguments)]
fn optimize(
    head: &mut [Point2],
    tail: Option<&[Point2]>,
    edges: &[Edge],
    n_epochs: usize,
    a: f32,
    b: f32,
    config: &ProjectionConfig,
    rng: &mut StdRng,
) {
    if edges.is_empty() || n_epochs == 0 {
        return;
    }
    let move_other = tail.is_none();
    let n_tail = tail.map(|t| t.len()).unwrap_or(head.len());
    let neg_rate = config.negative_sample_rate.max(1) as f32;

    let max_w = edges.iter().map(|e| e.weight).fold(0.0f32, f32::max);
    let epochs_per_sample: Vec<f32> = edges.iter().map(|e| max_w / e.weight).collect();
    let epochs_per_negative: Vec<f32> = epochs_per_sample.iter().map(|&e| e / neg_rate).collect();
    let mut next_sample = epochs_per_sample.clone();
    let mut next_negative = epochs_per_negative.clone();

    let clip = |g: f32| g.clamp(-4.0, 4.0);

    for epoch in 0..n_epochs {
        let alpha = config.learning_rate * (1.0 - epoch as f32 / n_epochs as f32);
        let epoch_f = epoch as f32;

        for (e, edge) in edges.iter().enumerate() {
            if next_sample[e] > epoch_f {
                continue;
            }

            let j = edge.head;
            let k = edge.tail;
            let mut current = head[j];
            let other = match tail {
                Some(t) => t[k],
                None => head[k],
            };

            let d2 = dist_sq2(current, other);
            let coeff = if d2 > 0.0 {
                -2.0 * a * b * d2.powf(b - 1.0) / (a * d2.powf(b) + 1.0)
            } else {
                0.0
            };
            let mut moved_other = other;
            for d in 0..2 {
                let g = clip(coeff * (current[d] - other[d]));
                current[d] += g * alpha;
                moved_other[d] -= g * alpha;
            }
            head[j] = current;
            if move_other {
                head[k] = moved_other;
            }
            next_sample[e] += epochs_per_sample[e];

            let n_neg = ((epoch_f - next_negative[e]) / epochs_per_negative[e]).floor();
            let n_neg = if n_neg > 0.0 { n_neg as usize } else { 0 };
            for _ in 0..n_neg {
                let s = rng.gen_range(0..n_tail);
                if move_other && s == j {
                    continue;
                }
                let other = match tail {
                    Some(t) => t[s],
                    None => head[s],
                };
                let d2 = dist_sq2(current, other);
                let coeff = if d2 > 0.0 {
                    2.0 * b / ((0.001 + d2) * (a * d2.powf(b) + 1.0))
                } else {
                    0.0
                };
                for d in 0..2 {
                    let g = if coeff > 0.0 {
                        clip(coeff * (current[d] - other[d]))
                    } else {
                        4.0
                    };
                    current[d] += g * alpha;
                }
            }
            head[j] = current;
            next_negative[e] += n_neg as f32 * epochs_per_negative[e];
        }
    }
}

/// Initial layout from the top two principal components, found by power
/// iteration and scaled so the largest coordinate magnitude is 10.
fn pca_init(data: &[Vec<f32>], rng: &mut StdRng) -> Vec<Point2> {
    let n = data.len();
    let dim = data[0].len();

    let mut mean = vec![0.0f64; dim];
    for x in data {
        for (m, &v) in mean.iter_mut().zip(x) {
            *m += v as f64;
        }
    }
    for m in &mut mean {
        *m /= n as f64;
    }
    let centered: Vec<Vec<f64>> = data
        .iter()
        .map(|x| x.iter().zip(&mean).map(|(&v, m)| v as f64 - m).collect())
        .collect();

    fn dot(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    let mut components: Vec<Vec<f64>> = Vec::with_capacity(2);
    for _ in 0..2 {
        let mut v: Vec<f64> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
        for _ in 0..100 {
            let mut w = vec![0.0f64; dim];
            for x in &centered {
                let s = dot(x, &v);
                for (wi, xi) in w.iter_mut().zip(x) {
                    *wi += s * xi;
                }
            }
            for c in &components {
                let s = dot(&w, c);
                for (wi, ci) in w.iter_mut().zip(c) {
                    *wi -= s * ci;
                }
            }
            let norm = dot(&w, &w).sqrt();
            if norm < 1e-12 {
                v = vec![0.0; dim];
                break;
            }
            v = w.into_iter().map(|x| x / norm).collect();
        }
        components.push(v);
    }

    let mut coords: Vec<Point2> = centered
        .iter()
        .map(|x| [dot(x, &components[0]) as f32, dot(x, &components[1]) as f32])
        .collect();

    let max_abs = coords
        .iter()
        .flat_map(|p| p.iter())
        .fold(0.0f32, |m, &v| m.max(v.abs()));
    let scale = if max_abs > 0.0 { 10.0 / max_abs } else { 1.0 };
    for p in &mut coords {
        for v in p.iter_mut() {
            *v = *v * scale + rng.gen_range(-1e-4..1e-4);
        }
    }
    coords
}

/// Finds `a`, `b` so that `1 / (1 + a x^(2b))` best fits the target
/// falloff curve: 1 below `min_dist`, `exp(-(x - min_dist) / spread)` above.
/// Least squares over 300 samples in `[0, 3 * spread]`, solved by an
/// iteratively narrowed grid search.
pub(crate) fn fit_ab(spread: f32, min_dist: f32) -> (f32, f32) {
    let spread = spread as f64;
    let min_dist = min_dist as f64;
    let xs: Vec<f64> = (0..300).map(|i| 3.0 * spread * i as f64 / 299.0).collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| if x < min_dist { 1.0 } else { (-(x - min_dist) / spread).exp() })
        .collect();

    let sse = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| {
                let f = 1.0 / (1.0 + a * x.powf(2.0 * b));
                (f - y) * (f - y)
            })
            .sum()
    };

    const STEPS: usize = 40;
    let (mut la_lo, mut la_hi) = (0.01f64.ln(), 100.0f64.ln());
    let (mut b_lo, mut b_hi) = (0.05f64, 3.0f64);
    let mut best = (1.0f64, 1.0f64, f64::INFINITY);

    for _ in 0..6 {
        let la_step = (la_hi - la_lo) / STEPS as f64;
        let b_step = (b_hi - b_lo) / STEPS as f64;
        for ia in 0..=STEPS {
            let a = (la_lo + la_step * ia as f64).exp();
            for ib in 0..=STEPS {
                let b = b_lo + b_step * ib as f64;
                let err = sse(a, b);
                if err < best.2 {
                    best = (a, b, err);
                }
            }
        }
        let la = best.0.ln();
        la_lo = la - 2.0 * la_step;
        la_hi = la + 2.0 * la_step;
        b_lo = (best.1 - 2.0 * b_step).max(1e-3);
        b_hi = best.1 + 2.0 * b_step;
    }

    (best.0 as f32, best.1 as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic jittered copies of `center`.
    fn blob(center: &[f32], n: usize, jitter: f32, seed: u64) -> Vec<Vec<f32>> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                center
                    .iter()
                    .map(|&c| {
                        state = state
                            .wrapping_mul(6364136223846793005)
                            .wrapping_add(1442695040888963407);
                        let r = ((state >> 33) as f32) / (u32::MAX >> 1) as f32 - 0.5;
                        c + r * jitter
                    })
                    .collect()
            })
            .collect()
    }

    fn centroid(points: &[Point2]) -> Point2 {
        let n = points.len() as f32;
        let sx: f32 = points.iter().map(|p| p[0]).sum();
        let sy: f32 = points.iter().map(|p| p[1]).sum();
        [sx / n, sy / n]
    }

    fn two_blobs() -> Vec<Vec<f32>> {
        let mut a = vec![0.0f32; 8];
        a[0] = 5.0;
        let mut b = vec![0.0f32; 8];
        b[1] = 5.0;
        let mut data = blob(&a, 12, 0.2, 1);
        data.extend(blob(&b, 12, 0.2, 2));
        data
    }

    fn small_config() -> ProjectionConfig {
        ProjectionConfig {
            n_neighbors: 5,
            ..Default::default()
        }
    }

    #[test]
    fn ab_for_default_min_dist() {
        let (a, b) = fit_ab(1.0, 0.1);
        assert!((a - 1.577).abs() < 0.1, "a = {a}");
        assert!((b - 0.895).abs() < 0.05, "b = {b}");
    }

    #[test]
    fn memberships_sum_to_log2_k() {
        let dists = [0.5, 0.7, 0.9, 1.4, 2.0];
        let w = memberships(&dists, 6, true);
        assert_eq!(w[0], 1.0, "nearest neighbour is fully connected");
        let sum: f32 = w.iter().sum();
        assert!((sum - 6f32.log2()).abs() < 1e-3, "sum = {sum}");
        assert!(w.windows(2).all(|p| p[0] >= p[1]));
    }

    #[test]
    fn memberships_identical_points() {
        let w = memberships(&[0.0, 0.0, 0.0], 4, true);
        assert_eq!(w, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn fit_is_deterministic() {
        let data = two_blobs();
        let p1 = Projection::fit(&data, &small_config()).unwrap();
        let p2 = Projection::fit(&data, &small_config()).unwrap();
        assert_eq!(p1.embedding(), p2.embedding());
        assert_eq!(p1.len(), 24);
        assert_eq!(p1.dimension(), 8);
        assert!(p1.embedding().iter().all(|p| p[0].is_finite() && p[1].is_finite()));
    }

    #[test]
    fn fit_separates_blobs() {
        let data = two_blobs();
        let p = Projection::fit(&data, &small_config()).unwrap();
        let (ea, eb) = p.embedding().split_at(12);
        let ca = centroid(ea);
        let cb = centroid(eb);
        for pt in ea {
            assert!(dist_sq2(*pt, ca) < dist_sq2(*pt, cb));
        }
        for pt in eb {
            assert!(dist_sq2(*pt, cb) < dist_sq2(*pt, ca));
        }
    }

    #[test]
    fn transform_lands_near_its_blob() {
        let data = two_blobs();
        let p = Projection::fit(&data, &small_config()).unwrap();
        let (ea, eb) = p.embedding().split_at(12);
        let ca = centroid(ea);
        let cb = centroid(eb);

        let mut query = vec![0.0f32; 8];
        query[0] = 5.05;
        let t = p.transform(&query).unwrap();
        assert!(dist_sq2(t, ca) < dist_sq2(t, cb), "{t:?} vs {ca:?} / {cb:?}");

        // Same input, same output; the fit is untouched.
        assert_eq!(p.transform(&query).unwrap(), t);
        assert_eq!(p, Projection::fit(&data, &small_config()).unwrap());
    }

    #[test]
    fn single_point() {
        let p = Projection::fit(&[vec![1.0, 2.0, 3.0]], &ProjectionConfig::default()).unwrap();
        assert_eq!(p.len(), 1);
        let t = p.transform(&[1.0, 2.0, 3.0]).unwrap();
        assert!(t[0].is_finite() && t[1].is_finite());
    }

    #[test]
    fn identical_points_stay_finite() {
        let data = vec![vec![1.0f32; 6]; 20];
        let p = Projection::fit(&data, &ProjectionConfig::default()).unwrap();
        assert!(p.embedding().iter().all(|q| q[0].is_finite() && q[1].is_finite()));
    }

    #[test]
    fn errors() {
        assert!(matches!(
            Projection::fit(&[], &ProjectionConfig::default()),
            Err(ClusterError::EmptyInput)
        ));
        assert!(matches!(
            Projection::fit(&[vec![1.0, 2.0], vec![1.0]], &ProjectionConfig::default()),
            Err(ClusterError::DimensionMismatch { expected: 2, got: 1 })
        ));

        let p = Projection::fit(&two_blobs(), &small_config()).unwrap();
        assert!(matches!(
            p.transform(&[1.0, 2.0]),
            Err(ClusterError::DimensionMismatch { expected: 8, got: 2 })
        ));
    }
}
