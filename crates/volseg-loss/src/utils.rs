//! Tensor reshaping helpers shared by the channel-wise losses.

use burn::tensor::{backend::Backend, Tensor};

/// Flattens a tensor so that the channel axis comes first.
///
/// Shapes are transformed as `(N, C, D, H, W) -> (C, N * D * H * W)`. The
/// enumeration along the second axis is row-major over `(batch, spatial...)`
/// and therefore identical for any two tensors of the same shape, which is
/// what the Dice statistics rely on when pairing input and target elements.
/// Works for any rank >= 2, so 2D images and 3D volumes go through the same
/// code path.
pub fn flatten_channels<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Tensor<B, 2> {
    let channels = tensor.dims()[1];
    tensor.swap_dims(0, 1).reshape([channels as i32, -1])
}
