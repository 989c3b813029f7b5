//! Binary sign-agreement accuracy over a batch.

use crate::error::MetricError;

/// Fraction of positions where prediction and target fall on the same side
/// of zero (positive vs non-positive), together with the batch size.
pub fn binary_accuracy(predictions: &[f64], targets: &[f64]) -> Result<(f64, u64), MetricError> {
    if predictions.len() != targets.len() {
        return Err(MetricError::LengthMismatch {
            predictions: predictions.len(),
            targets: targets.len(),
        });
    }
    if predictions.is_empty() {
        return Err(MetricError::EmptyBatch);
    }

    let agreeing = predictions
        .iter()
        .zip(targets)
        .fold(0u64, |acc, (p, t)| acc + u64::from((*p > 0.0) == (*t > 0.0)));
    let total = predictions.len() as u64;
    Ok((agreeing as f64 / total as f64, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_of_three() {
        let (value, weight) = binary_accuracy(&[1.0, -1.0, 1.0], &[1.0, 1.0, -1.0]).unwrap();
        assert!((value - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(weight, 3);
    }

    #[test]
    fn test_zero_counts_as_negative() {
        let (value, _) = binary_accuracy(&[0.0, 0.0], &[-2.0, 3.0]).unwrap();
        assert_eq!(value, 0.5);
    }

    #[test]
    fn test_length_mismatch() {
        assert_eq!(
            binary_accuracy(&[1.0, 2.0], &[1.0]),
            Err(MetricError::LengthMismatch {
                predictions: 2,
                targets: 1
            })
        );
    }

    #[test]
    fn test_empty_batch() {
        assert_eq!(binary_accuracy(&[], &[]), Err(MetricError::EmptyBatch));
    }
}
