//! Mean absolute error between two tensors.

use burn::tensor::{backend::Backend, Tensor};

/// Mean absolute error, `mean(|input - target|)`.
///
/// # Shapes
///
/// - input: `[...dims]`
/// - target: `[...dims]`
/// - output: `[1]`
pub fn mae<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    target: Tensor<B, D>,
) -> Tensor<B, 1> {
    assert_eq!(
        input.dims(),
        target.dims(),
        "Shape of input ({:?}) must match target ({:?})",
        input.dims(),
        target.dims()
    );

    (input - target).abs().mean()
}
