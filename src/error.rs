//! Error type
use std::io;
use tch::TchError;
use thiserror::Error;

/// Error building or evaluating a network.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("expected an input with rank in {expected:?}, got shape {actual:?}")]
    InvalidRank {
        expected: Vec<usize>,
        actual: Vec<i64>,
    },
    #[error("expected trailing feature shape {expected:?}, got {actual:?}")]
    FeatureDim { expected: Vec<i64>, actual: Vec<i64> },
    #[error("expected {expected} input tensors, got {actual}")]
    InputCount { expected: usize, actual: usize },
    #[error("mismatched batch shapes {left:?} and {right:?}")]
    BatchMismatch { left: Vec<i64>, right: Vec<i64> },
    #[error("input of size {height}x{width} is too small for a {kernel_size}x{kernel_size} kernel with padding {padding}")]
    InputTooSmall {
        height: usize,
        width: usize,
        kernel_size: usize,
        padding: usize,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("error reading configuration")]
    Io(#[from] io::Error),
    #[error("error parsing configuration")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Torch(#[from] TchError),
}

/// Check that `input` has one of the given ranks and return the rank.
pub(crate) fn check_rank(input: &[i64], ranks: &[usize]) -> Result<usize, ModelError> {
    if ranks.contains(&input.len()) {
        Ok(input.len())
    } else {
        Err(ModelError::InvalidRank {
            expected: ranks.to_vec(),
            actual: input.to_vec(),
        })
    }
}

/// Check that the trailing dimensions of `input` equal `features`.
pub(crate) fn check_features(input: &[i64], features: &[i64]) -> Result<(), ModelError> {
    let tail = input.len().checked_sub(features.len()).map(|i| &input[i..]);
    if tail == Some(features) {
        Ok(())
    } else {
        Err(ModelError::FeatureDim {
            expected: features.to_vec(),
            actual: tail.unwrap_or(input).to_vec(),
        })
    }
}
