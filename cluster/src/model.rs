use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hdbscan::{hdbscan, NOISE};
use crate::math::{cosine_sim, Point2};
use crate::projection::{Projection, ProjectionConfig};
use crate::ClusterError;

/// Cluster model hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Smallest group HDBSCAN reports as a cluster. Default: 5.
    pub min_cluster_size: usize,

    /// Neighbourhood size for core distances. Default: 5.
    pub min_samples: usize,

    /// 2D projection settings.
    pub projection: ProjectionConfig,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: 5,
            min_samples: 5,
            projection: ProjectionConfig::default(),
        }
    }
}

/// Mean position of a cluster's member points in the 2D projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub label: i32,
    pub point: Point2,
    /// Number of training points carrying this label.
    pub count: usize,
}

/// Cluster centroids plus the speaker → majority cluster mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterTable {
    centroids: Vec<Centroid>,
    speakers: BTreeMap<String, i32>,
}

impl ClusterTable {
    /// Builds the table from projected points, their HDBSCAN labels, and the
    /// speaker each point belongs to. All three slices are parallel.
    ///
    /// A speaker maps to its most frequent non-noise label, ties going to
    /// the label seen first. Speakers with only noise points are omitted.
    pub fn build(points: &[Point2], labels: &[i32], ids: &[String]) -> Self {
        // label -> (sum x, sum y, count)
        let mut sums: BTreeMap<i32, (f64, f64, usize)> = BTreeMap::new();
        // speaker -> labels in input order
        let mut per_speaker: BTreeMap<&str, Vec<i32>> = BTreeMap::new();

        for ((p, &label), id) in points.iter().zip(labels).zip(ids) {
            if label == NOISE {
                continue;
            }
            let e = sums.entry(label).or_insert((0.0, 0.0, 0));
            e.0 += p[0] as f64;
            e.1 += p[1] as f64;
            e.2 += 1;
            per_speaker.entry(id.as_str()).or_default().push(label);
        }

        let centroids = sums
            .into_iter()
            .map(|(label, (sx, sy, count))| Centroid {
                label,
                point: [(sx / count as f64) as f32, (sy / count as f64) as f32],
                count,
            })
            .collect();

        let speakers = per_speaker
            .into_iter()
            .filter_map(|(id, seen)| majority(&seen).map(|l| (id.to_string(), l)))
            .collect();

        Self { centroids, speakers }
    }

    /// Label of the centroid with the highest cosine similarity to `point`.
    /// Centroids are scanned in ascending label order and the first maximum
    /// wins.
    pub fn nearest(&self, point: Point2) -> Result<i32, ClusterError> {
        let mut best: Option<(i32, f32)> = None;
        for c in &self.centroids {
            let sim = cosine_sim(&point, &c.point);
            match best {
                Some((_, s)) if sim <= s => {}
                _ => best = Some((c.label, sim)),
            }
        }
        best.map(|(label, _)| label).ok_or(ClusterError::NoClusters)
    }

    /// Majority cluster of a speaker, if it has one.
    pub fn speaker_cluster(&self, entity_id: &str) -> Option<i32> {
        self.speakers.get(entity_id).copied()
    }

    /// Centroids in ascending label order.
    pub fn centroids(&self) -> &[Centroid] {
        &self.centroids
    }

    /// Speaker → majority cluster, sorted by speaker.
    pub fn speakers(&self) -> &BTreeMap<String, i32> {
        &self.speakers
    }

    /// Returns true if no cluster was found.
    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }
}

/// Most frequent label; ties go to the one encountered first.
fn majority(labels: &[i32]) -> Option<i32> {
    let mut counts: Vec<(i32, usize)> = Vec::new();
    for &l in labels {
        match counts.iter_mut().find(|(x, _)| *x == l) {
            Some((_, c)) => *c += 1,
            None => counts.push((l, 1)),
        }
    }
    let mut best: Option<(i32, usize)> = None;
    for (l, c) in counts {
        if best.is_none_or(|(_, bc)| c > bc) {
            best = Some((l, c));
        }
    }
    best.map(|(l, _)| l)
}

/// The fitted cluster artifact: projection, cluster table, and a version
/// counter bumped on every refit.
///
/// A `ClusterModel` is never modified after fitting. Refits build a new value
/// that replaces the old one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterModel {
    version: u64,
    projection: Projection,
    table: ClusterTable,
}

impl ClusterModel {
    /// Fits a model over per-utterance voiceprints and the speaker id of
    /// each. The result has version 1.
    pub fn fit(
        vectors: &[Vec<f32>],
        labels: &[String],
        config: &ClusterConfig,
    ) -> Result<Self, ClusterError> {
        if vectors.len() != labels.len() {
            return Err(ClusterError::LabelCountMismatch {
                vectors: vectors.len(),
                labels: labels.len(),
            });
        }
        let projection = Projection::fit(vectors, &config.projection)?;
        let points = projection.embedding();
        let assigned = hdbscan(points, config.min_cluster_size, config.min_samples);
        let table = ClusterTable::build(points, &assigned, labels);

        let noise = assigned.iter().filter(|&&l| l == NOISE).count();
        debug!(
            points = points.len(),
            clusters = table.centroids().len(),
            noise,
            speakers = table.speakers().len(),
            "fitted cluster model"
        );

        Ok(Self {
            version: 1,
            projection,
            table,
        })
    }

    /// Returns the model with its version replaced.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn table(&self) -> &ClusterTable {
        &self.table
    }

    /// Dimensionality of the voiceprints the model was fitted on.
    pub fn dimension(&self) -> usize {
        self.projection.dimension()
    }

    /// Projects a trial voiceprint and returns the label of the most similar
    /// centroid.
    pub fn assign_trial(&self, vector: &[f32]) -> Result<i32, ClusterError> {
        if self.table.is_empty() {
            return Err(ClusterError::NoClusters);
        }
        let point = self.projection.transform(vector)?;
        self.table.nearest(point)
    }

    /// Whether a trial voiceprint lands in the speaker's majority cluster.
    ///
    /// Unknown speakers and an empty table yield `false`. A voiceprint of the
    /// wrong dimension is an error.
    pub fn cluster_match(&self, entity_id: &str, vector: &[f32]) -> Result<bool, ClusterError> {
        if vector.len() != self.dimension() {
            return Err(ClusterError::DimensionMismatch {
                expected: self.dimension(),
                got: vector.len(),
            });
        }
        let Some(expected) = self.table.speaker_cluster(entity_id) else {
            return Ok(false);
        };
        match self.assign_trial(vector) {
            Ok(label) => Ok(label == expected),
            Err(ClusterError::NoClusters) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ClusterError> {
        self.projection.validate()?;
        if self.table.centroids.windows(2).any(|w| w[0].label >= w[1].label) {
            return Err(ClusterError::InvalidFormat(
                "centroids not in ascending label order".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn majority_tie_goes_to_first_seen() {
        assert_eq!(majority(&[2, 1, 1, 2]), Some(2));
        assert_eq!(majority(&[1, 2, 2]), Some(2));
        assert_eq!(majority(&[]), None);
    }

    #[test]
    fn table_build() {
        let points = [[1.0, 0.0], [3.0, 0.0], [0.0, 2.0], [0.0, 4.0], [9.0, 9.0]];
        let labels = [0, 0, 1, 1, NOISE];
        let table = ClusterTable::build(&points, &labels, &ids(&["a", "a", "b", "a", "c"]));

        assert_eq!(table.centroids().len(), 2);
        assert_eq!(table.centroids()[0].label, 0);
        assert_eq!(table.centroids()[0].point, [2.0, 0.0]);
        assert_eq!(table.centroids()[0].count, 2);
        assert_eq!(table.centroids()[1].point, [0.0, 3.0]);

        assert_eq!(table.speaker_cluster("a"), Some(0));
        assert_eq!(table.speaker_cluster("b"), Some(1));
        assert_eq!(table.speaker_cluster("c"), None, "all-noise speakers are omitted");
    }

    #[test]
    fn nearest_by_cosine() {
        let points = [[1.0, 0.0], [0.0, 1.0]];
        let table = ClusterTable::build(&points, &[0, 1], &ids(&["a", "b"]));
        assert_eq!(table.nearest([5.0, 1.0]).unwrap(), 0);
        assert_eq!(table.nearest([1.0, 5.0]).unwrap(), 1);
        // Equidistant: lowest label wins.
        assert_eq!(table.nearest([1.0, 1.0]).unwrap(), 0);

        let empty = ClusterTable::default();
        assert!(matches!(empty.nearest([1.0, 0.0]), Err(ClusterError::NoClusters)));
    }

    #[test]
    fn label_count_mismatch() {
        let err = ClusterModel::fit(&[vec![1.0]], &[], &ClusterConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ClusterError::LabelCountMismatch { vectors: 1, labels: 0 }
        ));
    }

    #[test]
    fn empty_input() {
        let err = ClusterModel::fit(&[], &[], &ClusterConfig::default()).unwrap_err();
        assert!(matches!(err, ClusterError::EmptyInput));
    }

    #[test]
    fn too_few_points_yield_no_clusters() {
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]];
        let model = ClusterModel::fit(&vectors, &ids(&["a", "b", "c"]), &ClusterConfig::default())
            .unwrap();
        assert!(model.table().is_empty());
        assert_eq!(model.version(), 1);
        assert!(matches!(model.assign_trial(&[1.0, 0.0]), Err(ClusterError::NoClusters)));
        assert!(!model.cluster_match("a", &[1.0, 0.0]).unwrap());
        assert!(matches!(
            model.cluster_match("a", &[1.0, 0.0, 0.0]),
            Err(ClusterError::DimensionMismatch { expected: 2, got: 3 })
        ));
    }
}
