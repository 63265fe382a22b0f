use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ClusterConfig;
use crate::error::{Error, Result};
use crate::models::{ClusterAssignment, ClusterMember, RepositoryRecord};

type Point = [f64; 3];

/// K-means over z-scored `(stars, forks, size)` with seeded k-means++
/// initialisation, so the same input always gives the same labels.
pub struct RepositoryClusterer {
    config: ClusterConfig,
}

impl RepositoryClusterer {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    pub fn cluster<'a, I>(&self, records: I, k: usize) -> Result<ClusterAssignment>
    where
        I: IntoIterator<Item = &'a RepositoryRecord>,
    {
        if k == 0 {
            return Err(Error::InvalidArgument("cluster count must be at least 1".to_string()));
        }

        let mut rows: Vec<(String, Point)> = records
            .into_iter()
            .filter_map(|r| r.feature_vector().map(|f| (r.id.clone(), f)))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        if rows.len() < k {
            return Err(Error::InsufficientData {
                what: "clustering",
                needed: k,
                found: rows.len(),
            });
        }

        let raw: Vec<Point> = rows.iter().map(|(_, f)| *f).collect();
        let points = standardize(&raw);

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut centroids = init_centroids(&points, k, &mut rng);
        let mut labels = vec![usize::MAX; points.len()];
        let mut iterations = 0;

        while iterations < self.config.max_iterations.max(1) {
            iterations += 1;
            let mut next: Vec<usize> = points.iter().map(|p| nearest(p, &centroids).0).collect();
            fill_empty_clusters(&points, &centroids, &mut next, k);

            let changed = next != labels;
            labels = next;
            centroids = recompute_centroids(&points, &labels, k);
            if !changed {
                break;
            }
        }

        let (labels, centroids) = canonical_order(labels, centroids);
        tracing::debug!("k-means converged after {} iteration(s) for k={}", iterations, k);

        let members = rows
            .into_iter()
            .zip(labels)
            .map(|((repository, features), label)| ClusterMember {
                repository,
                label,
                features,
            })
            .collect();

        Ok(ClusterAssignment {
            k,
            members,
            centroids,
            iterations,
        })
    }
}

/// Z-score per column. A constant column maps to zero.
fn standardize(raw: &[Point]) -> Vec<Point> {
    let n = raw.len() as f64;
    let mut mean = [0.0; 3];
    let mut std = [0.0; 3];

    for dim in 0..3 {
        mean[dim] = raw.iter().map(|p| p[dim]).sum::<f64>() / n;
        let var = raw.iter().map(|p| (p[dim] - mean[dim]).powi(2)).sum::<f64>() / n;
        std[dim] = var.sqrt();
    }

    raw.iter()
        .map(|p| {
            let mut z = [0.0; 3];
            for dim in 0..3 {
                if std[dim] > f64::EPSILON {
                    z[dim] = (p[dim] - mean[dim]) / std[dim];
                }
            }
            z
        })
        .collect()
}

fn distance_sq(a: &Point, b: &Point) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(point: &Point, centroids: &[Point]) -> (usize, f64) {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, distance_sq(point, c)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

fn init_centroids(points: &[Point], k: usize, rng: &mut StdRng) -> Vec<Point> {
    let mut chosen = vec![rng.gen_range(0..points.len())];

    while chosen.len() < k {
        let centroids: Vec<Point> = chosen.iter().map(|&i| points[i]).collect();
        let weights: Vec<f64> = points.iter().map(|p| nearest(p, &centroids).1).collect();
        let total: f64 = weights.iter().sum();

        let next = if total <= f64::EPSILON {
            // All remaining points coincide with a centroid.
            (0..points.len()).find(|i| !chosen.contains(i)).unwrap_or(0)
        } else {
            let mut target = rng.gen::<f64>() * total;
            let mut pick = points.len() - 1;
            for (i, w) in weights.iter().enumerate() {
                if target < *w {
                    pick = i;
                    break;
                }
                target -= w;
            }
            pick
        };
        chosen.push(next);
    }

    chosen.into_iter().map(|i| points[i]).collect()
}

/// Moves the worst-fitting point of a multi-member cluster into each empty
/// cluster. With at least `k` points this always terminates.
fn fill_empty_clusters(points: &[Point], centroids: &[Point], labels: &mut [usize], k: usize) {
    loop {
        let mut sizes = vec![0usize; k];
        for &l in labels.iter() {
            sizes[l] += 1;
        }
        let Some(empty) = sizes.iter().position(|&s| s == 0) else {
            return;
        };

        let donor = (0..points.len())
            .filter(|&i| sizes[labels[i]] > 1)
            .max_by(|&a, &b| {
                let da = distance_sq(&points[a], &centroids[labels[a]]);
                let db = distance_sq(&points[b], &centroids[labels[b]]);
                da.total_cmp(&db).then(b.cmp(&a))
            });

        match donor {
            Some(i) => labels[i] = empty,
            None => return,
        }
    }
}

fn recompute_centroids(points: &[Point], labels: &[usize], k: usize) -> Vec<Point> {
    let mut sums = vec![[0.0; 3]; k];
    let mut counts = vec![0usize; k];

    for (p, &l) in points.iter().zip(labels) {
        for dim in 0..3 {
            sums[l][dim] += p[dim];
        }
        counts[l] += 1;
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| {
            let c = count.max(1) as f64;
            [sum[0] / c, sum[1] / c, sum[2] / c]
        })
        .collect()
}

/// Renumbers clusters by first appearance so label 0 holds the first repository.
fn canonical_order(labels: Vec<usize>, centroids: Vec<Point>) -> (Vec<usize>, Vec<Point>) {
    let k = centroids.len();
    let mut mapping = vec![usize::MAX; k];
    let mut next = 0;

    for &l in &labels {
        if mapping[l] == usize::MAX {
            mapping[l] = next;
            next += 1;
        }
    }
    for slot in mapping.iter_mut() {
        if *slot == usize::MAX {
            *slot = next;
            next += 1;
        }
    }

    let mut reordered = vec![[0.0; 3]; k];
    for (old, centroid) in centroids.into_iter().enumerate() {
        reordered[mapping[old]] = centroid;
    }
    (labels.into_iter().map(|l| mapping[l]).collect(), reordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    fn record(id: &str, stars: u32, forks: u32, size: Option<u64>) -> RepositoryRecord {
        RepositoryRecord {
            id: id.to_string(),
            name: id.rsplit('/').next().unwrap().to_string(),
            description: None,
            stars,
            forks,
            size,
            language: None,
            created_at: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            readme: String::new(),
        }
    }

    fn clusterer() -> RepositoryClusterer {
        RepositoryClusterer::new(ClusterConfig {
            k: 2,
            max_iterations: 100,
            seed: 7,
        })
    }

    #[test]
    fn test_every_repository_gets_one_label_in_range() {
        let records: Vec<_> = (0..12)
            .map(|i| record(&format!("octo/r{:02}", i), i * 3, i % 4, Some(100 + i as u64 * 50)))
            .collect();

        let assignment = clusterer().cluster(&records, 3).unwrap();
        assert_eq!(assignment.members.len(), 12);

        let ids: HashSet<_> = assignment.members.iter().map(|m| m.repository.as_str()).collect();
        assert_eq!(ids.len(), 12);
        assert!(assignment.members.iter().all(|m| m.label < 3));
    }

    #[test]
    fn test_separated_groups_are_split() {
        let records = vec![
            record("octo/big-a", 900, 200, Some(50_000)),
            record("octo/big-b", 950, 210, Some(52_000)),
            record("octo/small-a", 1, 0, Some(20)),
            record("octo/small-b", 0, 0, Some(25)),
            record("octo/small-c", 2, 1, Some(30)),
        ];

        let assignment = clusterer().cluster(&records, 2).unwrap();
        let big = assignment.label_of("octo/big-a").unwrap();
        assert_eq!(assignment.label_of("octo/big-b"), Some(big));
        for id in ["octo/small-a", "octo/small-b", "octo/small-c"] {
            assert_ne!(assignment.label_of(id), Some(big));
        }
        // first repository by id gets label 0
        assert_eq!(big, 0);
    }

    #[test]
    fn test_fewer_repositories_than_k_is_insufficient() {
        let records = vec![
            record("octo/a", 1, 1, Some(10)),
            record("octo/b", 2, 1, Some(10)),
            record("octo/c", 3, 1, None),
        ];

        let err = clusterer().cluster(&records, 3).unwrap_err();
        match err {
            Error::InsufficientData { needed, found, .. } => {
                assert_eq!(needed, 3);
                assert_eq!(found, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_identical_points_still_fill_every_cluster() {
        let records: Vec<_> = (0..4)
            .map(|i| record(&format!("octo/same{}", i), 5, 5, Some(5)))
            .collect();

        let assignment = clusterer().cluster(&records, 3).unwrap();
        let labels: HashSet<_> = assignment.members.iter().map(|m| m.label).collect();
        assert_eq!(labels.len(), 3);
    }

    #[test]
    fn test_zero_k_is_rejected() {
        let records = vec![record("octo/a", 1, 1, Some(10))];
        assert!(matches!(
            clusterer().cluster(&records, 0),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_same_input_same_labels() {
        let records: Vec<_> = (0..9)
            .map(|i| record(&format!("octo/r{}", i), i * i, i, Some(i as u64 * 10)))
            .collect();
        let a = clusterer().cluster(&records, 3).unwrap();
        let b = clusterer().cluster(&records, 3).unwrap();
        assert_eq!(a, b);
    }
}
