//! Folding leading batch dimensions (e.g. batch and time) into one.
use crate::error::ModelError;
use smallvec::SmallVec;
use tch::Tensor;

/// The leading (batch) shape removed by [`f_fold_leading`].
pub type LeadingShape = SmallVec<[i64; 4]>;

/// Fold all but the trailing `feature_rank` dimensions into a single batch dimension.
///
/// An input of shape `[B, T, *FEATURES]` becomes `[B * T, *FEATURES]`.
/// An input with no leading dimensions gets a batch dimension of size 1.
///
/// # Returns
/// The folded tensor and the leading shape to pass to [`f_unfold_leading`].
pub fn f_fold_leading(
    input: &Tensor,
    feature_rank: usize,
) -> Result<(Tensor, LeadingShape), ModelError> {
    let shape = input.size();
    let num_leading = shape
        .len()
        .checked_sub(feature_rank)
        .ok_or_else(|| ModelError::InvalidRank {
            expected: vec![feature_rank],
            actual: shape.clone(),
        })?;
    let (leading, features) = shape.split_at(num_leading);
    let folded_shape: SmallVec<[i64; 8]> = std::iter::once(leading.iter().product::<i64>())
        .chain(features.iter().copied())
        .collect();
    Ok((input.f_reshape(&folded_shape[..])?, leading.into()))
}

/// Restore the leading shape removed by [`f_fold_leading`].
///
/// An output of shape `[B * T, *FEATURES]` becomes `[B, T, *FEATURES]`.
pub fn f_unfold_leading(output: &Tensor, leading: &[i64]) -> Result<Tensor, ModelError> {
    let shape = output.size();
    let features = shape.get(1..).ok_or_else(|| ModelError::InvalidRank {
        expected: vec![1],
        actual: shape.clone(),
    })?;
    let unfolded_shape: SmallVec<[i64; 8]> =
        leading.iter().chain(features.iter()).copied().collect();
    Ok(output.f_reshape(&unfolded_shape[..])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tch::{Device, Kind};

    #[rstest]
    #[case(&[2, 5, 3], 1, &[10, 3])]
    #[case(&[4, 3], 1, &[4, 3])]
    #[case(&[3], 1, &[1, 3])]
    #[case(&[2, 5, 3, 8, 8], 3, &[10, 3, 8, 8])]
    #[case(&[0, 5, 3], 1, &[0, 3])]
    fn fold_shape(#[case] shape: &[i64], #[case] feature_rank: usize, #[case] expected: &[i64]) {
        let input = Tensor::zeros(shape, (Kind::Float, Device::Cpu));
        let (folded, leading) = f_fold_leading(&input, feature_rank).unwrap();
        assert_eq!(folded.size(), expected);
        assert_eq!(&leading[..], &shape[..shape.len() - feature_rank]);
    }

    #[test]
    fn fold_unfold_preserves_batch_and_time() {
        let input = Tensor::rand(&[2, 5, 3], (Kind::Float, Device::Cpu));
        let (folded, leading) = f_fold_leading(&input, 1).unwrap();
        // Change the feature dimension as a model would
        let output = folded.narrow(-1, 0, 2);
        let unfolded = f_unfold_leading(&output, &leading).unwrap();
        assert_eq!(unfolded.size(), vec![2, 5, 2]);
        assert_eq!(unfolded, input.narrow(-1, 0, 2));
    }

    #[test]
    fn fold_too_few_dims() {
        let input = Tensor::zeros(&[3, 4], (Kind::Float, Device::Cpu));
        assert!(matches!(
            f_fold_leading(&input, 3),
            Err(ModelError::InvalidRank { .. })
        ));
    }

    #[test]
    fn unfold_mismatched_leading() {
        let output = Tensor::zeros(&[10, 2], (Kind::Float, Device::Cpu));
        assert!(f_unfold_leading(&output, &[3, 4]).is_err());
    }
}
