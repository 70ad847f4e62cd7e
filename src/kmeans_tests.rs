#[cfg(test)]
mod tests {
    use crate::cluster::seeding::seed_centers;
    use crate::{
        seed_weights, AnomalyScorer, Clustering, CovarianceSource, Dataset, Error,
        MahalanobisKmeans, MahalanobisMetric, Result, SeedWeighting,
    };
    use ndarray::{Array2, Axis};
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn two_clusters() -> Dataset {
        Dataset::from_rows(&[
            vec![0.0, 0.0],
            vec![0.3, 0.1],
            vec![0.1, 0.4],
            vec![10.0, 10.0],
            vec![10.2, 9.8],
            vec![9.9, 10.3],
        ])
        .unwrap()
    }

    /// Two parallel elongated clusters: long along x, separated along y.
    fn elongated(n_per: usize, seed: u64) -> (Dataset, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let long = Normal::new(0.0, 10.0).unwrap();
        let short = Normal::new(0.0, 0.5).unwrap();

        let mut rows = Vec::with_capacity(2 * n_per);
        let mut truth = Vec::with_capacity(2 * n_per);
        for (label, offset) in [(0usize, 0.0), (1usize, 4.0)] {
            for _ in 0..n_per {
                rows.push(vec![long.sample(&mut rng), offset + short.sample(&mut rng)]);
                truth.push(label);
            }
        }
        (Dataset::from_rows(&rows).unwrap(), truth)
    }

    /// Fraction of points whose label matches `truth` under the best of the
    /// two possible label permutations.
    fn agreement(labels: &[usize], truth: &[usize]) -> f64 {
        let same = labels.iter().zip(truth).filter(|(a, b)| a == b).count();
        let best = same.max(labels.len() - same);
        best as f64 / labels.len() as f64
    }

    #[test]
    fn test_well_separated_clusters_every_restart() -> Result<()> {
        let data = two_clusters();
        let model = MahalanobisKmeans::new(2)
            .with_covariance(Array2::eye(2))
            .with_n_repeats(5)
            .with_seed(2024)
            .fit(&data, &[0.0; 6])?;

        let groups = model.result.groups();
        assert_eq!(groups[0], groups[1]);
        assert_eq!(groups[0], groups[2]);
        assert_eq!(groups[3], groups[4]);
        assert_eq!(groups[3], groups[5]);
        assert_ne!(groups[0], groups[3]);

        // Inter-cluster squared distance is ~200; every restart lands far below it.
        assert_eq!(model.result.restarts_completed(), 5);
        for d in model.result.restart_dispersions.iter().flatten() {
            assert!(*d < 1.0, "restart dispersion {d}");
        }
        assert_eq!(model.covariance.source, CovarianceSource::Supplied);
        Ok(())
    }

    #[test]
    fn test_single_cluster_is_mean_with_total_variance() -> Result<()> {
        let data = two_clusters();
        let model = MahalanobisKmeans::new(1)
            .with_n_repeats(3)
            .with_seed(1)
            .fit(&data, &[0.0; 6])?;

        let mean = data.view().mean_axis(Axis(0)).unwrap();
        for (a, b) in model.result.centers.row(0).iter().zip(mean.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
        assert!(model.result.groups().iter().all(|&g| g == 1));

        let total: f64 = data
            .view()
            .outer_iter()
            .map(|p| model.metric.squared_distance(&p, &mean.view()))
            .sum();
        assert!((model.result.dispersion - total).abs() < 1e-9);

        // With the sample covariance, Σ d² around the mean is (n - 1) p.
        assert!((total - 5.0 * 2.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_mahalanobis_recovers_elongated_clusters() -> Result<()> {
        let (data, truth) = elongated(100, 17);
        let model = MahalanobisKmeans::new(2)
            .with_n_repeats(20)
            .with_seed(5)
            .fit(&data, &vec![0.0; 200])?;

        let score = agreement(model.result.labels(), &truth);
        assert!(score > 0.95, "agreement {score}");
        Ok(())
    }

    #[test]
    fn test_uniform_scores_make_first_seed_uniform() {
        let data = two_clusters();
        let metric = MahalanobisMetric::identity(2);
        let weights = seed_weights(&[3.5; 6], SeedWeighting::Exponential).unwrap();
        let mut rng = StdRng::seed_from_u64(99);

        let mut counts = [0usize; 6];
        for _ in 0..6000 {
            let s = seed_centers(data.view(), 1, &metric, &weights, &mut rng).unwrap();
            counts[s.indices[0]] += 1;
        }
        for &c in &counts {
            assert!((850..1150).contains(&c), "counts {counts:?}");
        }
    }

    #[test]
    fn test_affine_rescaling_keeps_partition() -> Result<()> {
        // Mild enough that both sample covariances stay under the shrinkage
        // threshold; the fallback estimate is not scale-equivariant.
        let data = two_clusters();
        let scaled = Dataset::new(data.view().to_owned() * &ndarray::arr1(&[10.0, 0.5]))?;

        let a = MahalanobisKmeans::new(2)
            .with_n_repeats(10)
            .with_seed(8)
            .fit(&data, &[0.0; 6])?;
        let b = MahalanobisKmeans::new(2)
            .with_n_repeats(10)
            .with_seed(8)
            .fit(&scaled, &[0.0; 6])?;

        assert_eq!(a.covariance.source, CovarianceSource::Sample);
        assert_eq!(b.covariance.source, CovarianceSource::Sample);
        assert_eq!(agreement(a.result.labels(), b.result.labels()), 1.0);
        assert!((a.result.dispersion - b.result.dispersion).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_collinear_features_use_shrinkage() -> Result<()> {
        // Third feature duplicates the first.
        let rows: Vec<Vec<f64>> = two_clusters()
            .view()
            .outer_iter()
            .map(|r| vec![r[0], r[1], r[0]])
            .collect();
        let data = Dataset::from_rows(&rows)?;

        let model = MahalanobisKmeans::new(2)
            .with_n_repeats(10)
            .with_seed(4)
            .fit(&data, &[0.0; 6])?;
        assert_eq!(model.covariance.source, CovarianceSource::Shrunk);
        assert_eq!(model.result.k(), 2);
        Ok(())
    }

    struct FixedScorer(Vec<f64>);

    impl AnomalyScorer for FixedScorer {
        fn score(&self, _data: &Dataset) -> Result<Vec<f64>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_scorer_entry_point() -> Result<()> {
        let data = two_clusters();
        let model = MahalanobisKmeans::new(2)
            .with_weighting(SeedWeighting::Linear)
            .with_n_repeats(5)
            .with_seed(3)
            .fit_with_scorer(&data, &FixedScorer(vec![0.0, 0.0, 0.0, 1.0, 1.0, 9.0]))?;
        assert_eq!(model.result.groups().len(), 6);

        let err = MahalanobisKmeans::new(2)
            .fit_with_scorer(&data, &FixedScorer(vec![0.0; 3]))
            .unwrap_err();
        assert_eq!(
            err,
            Error::ScoreCountMismatch {
                expected: 6,
                found: 3
            }
        );
        Ok(())
    }

    #[test]
    fn test_fit_predict_trait() {
        let data: Vec<Vec<f64>> = two_clusters()
            .view()
            .outer_iter()
            .map(|r| r.to_vec())
            .collect();
        let km = MahalanobisKmeans::new(2).with_n_repeats(20).with_seed(12);
        let labels = km.fit_predict(&data).unwrap();
        assert_eq!(labels.len(), 6);
        assert!(labels.iter().all(|&l| l < km.n_clusters()));
    }

    fn points() -> impl Strategy<Value = Vec<Vec<f64>>> {
        proptest::collection::vec(proptest::collection::vec(-50.0f64..50.0, 2), 8..30)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_groups_in_range_and_best_is_minimum(
            rows in points(),
            k in 1usize..4,
            seed in any::<u64>(),
        ) {
            let data = Dataset::from_rows(&rows).unwrap();
            let scores: Vec<f64> = (0..rows.len()).map(|i| (i % 3) as f64).collect();
            let outcome = MahalanobisKmeans::new(k)
                .with_covariance(Array2::eye(2))
                .with_n_repeats(4)
                .with_seed(seed)
                .fit(&data, &scores);

            // Degenerate draws may abort restarts; everything else must succeed.
            let model = match outcome {
                Ok(model) => model,
                Err(e) => {
                    prop_assert!(e.is_invariant_violation(), "{e}");
                    return Ok(());
                }
            };

            prop_assert_eq!(model.result.centers.nrows(), k);
            for g in model.result.groups() {
                prop_assert!((1..=k).contains(&g));
            }
            for d in model.result.restart_dispersions.iter().flatten() {
                prop_assert!(model.result.dispersion <= *d);
            }
            prop_assert!(model.result.dispersion >= 0.0);
        }
    }
}
