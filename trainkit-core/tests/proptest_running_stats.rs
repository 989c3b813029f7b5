//! Property-based tests for the running aggregator using proptest.

use proptest::prelude::*;

use trainkit_core::RunningStats;

/// Weighted mean and Bessel-corrected std computed directly, shifted by the
/// first value to keep the reference itself well conditioned.
fn direct(pairs: &[(f64, u64)]) -> (f64, f64) {
    let shift = pairs[0].0;
    let total: f64 = pairs.iter().map(|(_, w)| *w as f64).sum();
    let mean = shift + pairs.iter().map(|(v, w)| (v - shift) * *w as f64).sum::<f64>() / total;
    let ss: f64 = pairs
        .iter()
        .map(|(v, w)| (v - mean).powi(2) * *w as f64)
        .sum();
    let std = if pairs.len() == 1 {
        0.0
    } else {
        (ss / (total - 1.0)).sqrt()
    };
    (mean, std)
}

fn fold(pairs: &[(f64, u64)]) -> RunningStats {
    let mut stats = RunningStats::new();
    for (value, weight) in pairs {
        stats.update(*value, *weight).unwrap();
    }
    stats
}

fn close(actual: f64, expected: f64, rel: f64) -> bool {
    (actual - expected).abs() <= rel * expected.abs().max(1.0)
}

proptest! {
    #[test]
    fn weighted_mean_matches_direct_formula(
        pairs in prop::collection::vec((-1.0e3f64..1.0e3, 1u64..256), 1..300)
    ) {
        let stats = fold(&pairs);
        let (mean, std) = direct(&pairs);
        prop_assert!(close(stats.mean(), mean, 1e-9), "{} vs {}", stats.mean(), mean);
        prop_assert!(close(stats.std(), std, 1e-6), "{} vs {}", stats.std(), std);
    }

    #[test]
    fn ill_conditioned_inputs_stay_accurate(
        spread in prop::collection::vec((0.0f64..1.0, 1u64..64), 2..300)
    ) {
        let pairs: Vec<(f64, u64)> = spread.iter().map(|(d, w)| (1.0e8 + d, *w)).collect();
        let stats = fold(&pairs);
        let (mean, std) = direct(&pairs);
        prop_assert!(close(stats.mean(), mean, 1e-9), "{} vs {}", stats.mean(), mean);
        prop_assert!((stats.std() - std).abs() <= 1e-5 * std + 1e-6, "{} vs {}", stats.std(), std);
    }

    #[test]
    fn num_samples_is_total_weight(
        pairs in prop::collection::vec((-10.0f64..10.0, 1u64..1000), 1..100)
    ) {
        let stats = fold(&pairs);
        prop_assert_eq!(stats.n(), pairs.len() as u64);
        prop_assert_eq!(stats.num_samples(), pairs.iter().map(|(_, w)| w).sum::<u64>());
    }

    #[test]
    fn reset_is_indistinguishable_from_new(
        pairs in prop::collection::vec((-10.0f64..10.0, 1u64..1000), 1..50)
    ) {
        let mut stats = fold(&pairs);
        stats.reset();
        prop_assert_eq!(stats.n(), 0);
        prop_assert_eq!(stats.num_samples(), 0);
        prop_assert!(stats.mean().is_nan());
        prop_assert!(stats.std().is_nan());
    }
}

#[test]
fn long_stream_near_1e8_matches_direct_formula() {
    let pairs: Vec<(f64, u64)> = (0..10_000u64)
        .map(|i| (1.0e8 + ((i * 7919) % 1000) as f64 / 1000.0, 1 + i % 32))
        .collect();
    let stats = fold(&pairs);
    let (mean, std) = direct(&pairs);

    assert!(close(stats.mean(), mean, 1e-9), "{} vs {}", stats.mean(), mean);
    assert!((stats.std() - std).abs() <= 1e-5 * std + 1e-6, "{} vs {}", stats.std(), std);
    assert_eq!(stats.n(), 10_000);
}
