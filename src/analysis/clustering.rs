// src/analysis/clustering.rs
//
// Self-contained numeric routines used by the group detector and the
// identity gallery: density clustering, cosine similarity, Jaccard overlap.

use crate::types::Point;
use std::collections::{BTreeSet, VecDeque};
use std::hash::Hash;

/// Spatial clustering over one frame of positions. Returns clusters as
/// index lists into the input; noise points belong to no cluster.
pub trait SpatialClustering: Send {
    fn cluster(&self, points: &[Point]) -> Vec<Vec<usize>>;
}

/// DBSCAN with Euclidean distance. A point's neighbourhood includes itself,
/// so `min_samples = 2` means "at least one other point within eps".
#[derive(Debug, Clone, Copy)]
pub struct Dbscan {
    pub eps: f32,
    pub min_samples: usize,
}

impl Dbscan {
    pub fn new(eps: f32, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    fn neighbours(&self, points: &[Point], i: usize) -> Vec<usize> {
        points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.distance(&points[i]) <= self.eps)
            .map(|(j, _)| j)
            .collect()
    }
}

impl SpatialClustering for Dbscan {
    fn cluster(&self, points: &[Point]) -> Vec<Vec<usize>> {
        const UNVISITED: i64 = -2;
        const NOISE: i64 = -1;

        let mut labels = vec![UNVISITED; points.len()];
        let mut next_label: i64 = 0;

        for i in 0..points.len() {
            if labels[i] != UNVISITED {
                continue;
            }
            let seeds = self.neighbours(points, i);
            if seeds.len() < self.min_samples {
                labels[i] = NOISE;
                continue;
            }

            let label = next_label;
            next_label += 1;
            labels[i] = label;

            let mut queue: VecDeque<usize> = seeds.into_iter().filter(|&j| j != i).collect();
            while let Some(j) = queue.pop_front() {
                if labels[j] == NOISE {
                    // Border point
                    labels[j] = label;
                }
                if labels[j] != UNVISITED {
                    continue;
                }
                labels[j] = label;
                let reach = self.neighbours(points, j);
                if reach.len() >= self.min_samples {
                    queue.extend(reach.into_iter().filter(|&k| labels[k] < 0));
                }
            }
        }

        let mut clusters: Vec<Vec<usize>> = vec![Vec::new(); next_label as usize];
        for (i, label) in labels.iter().enumerate() {
            if *label >= 0 {
                clusters[*label as usize].push(i);
            }
        }
        clusters.retain(|c| c.len() >= self.min_samples);
        clusters
    }
}

/// Cosine similarity in [-1, 1]; `None` on length mismatch or zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    let denom = na * nb;
    if denom <= f32::EPSILON || !denom.is_finite() {
        None
    } else {
        Some((dot / denom).clamp(-1.0, 1.0))
    }
}

/// |A ∩ B| / |A ∪ B|; two empty sets are defined as 0.
pub fn jaccard<T: Ord + Hash>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_close_points_form_one_cluster() {
        let db = Dbscan::new(100.0, 2);
        let clusters = db.cluster(&[Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
        assert_eq!(clusters, vec![vec![0, 1]]);
    }

    #[test]
    fn test_far_points_are_noise() {
        let db = Dbscan::new(100.0, 2);
        let clusters = db.cluster(&[Point::new(0.0, 0.0), Point::new(500.0, 0.0)]);
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_chain_is_density_connected() {
        let db = Dbscan::new(50.0, 2);
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(40.0, 0.0),
            Point::new(80.0, 0.0),
            Point::new(120.0, 0.0),
            Point::new(600.0, 600.0),
        ];
        let clusters = db.cluster(&pts);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0], vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_two_separate_clusters() {
        let db = Dbscan::new(30.0, 2);
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(300.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(310.0, 0.0),
        ];
        let clusters = db.cluster(&pts);
        assert_eq!(clusters, vec![vec![0, 2], vec![1, 3]]);
    }

    #[test]
    fn test_empty_input() {
        assert!(Dbscan::new(10.0, 2).cluster(&[]).is_empty());
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]).unwrap() - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap().abs() < 1e-6);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).is_none());
        assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).is_none());
    }

    #[test]
    fn test_jaccard() {
        let a: BTreeSet<u32> = [1, 2, 3].into_iter().collect();
        let b: BTreeSet<u32> = [2, 3, 4].into_iter().collect();
        assert!((jaccard(&a, &b) - 0.5).abs() < 1e-6);
        assert_eq!(jaccard::<u32>(&BTreeSet::new(), &BTreeSet::new()), 0.0);
    }
}
