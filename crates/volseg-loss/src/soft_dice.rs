//! Soft Dice loss computed per batch sample.
//!
//! Unlike [`DiceLoss`](crate::dice::DiceLoss), which scores every channel
//! over the whole batch, this variant flattens each sample to a single vector
//! and smooths both sides of the ratio, so an empty sample scores a perfect
//! 1.0 instead of being undefined.

use burn::{
    config::Config,
    module::Module,
    tensor::{backend::Backend, Tensor},
};

use crate::criterion::{Criterion, LossTarget};

/// Configuration for creating a [soft Dice loss](SoftDiceLoss).
#[derive(Config, Debug)]
pub struct SoftDiceLossConfig {
    /// Additive smoothing applied to numerator and denominator. Default: 1e-6
    #[config(default = 1e-6)]
    pub smooth: f64,
}

impl SoftDiceLossConfig {
    /// Initialize [soft Dice loss](SoftDiceLoss).
    pub fn init(&self) -> SoftDiceLoss {
        SoftDiceLoss {
            smooth: self.smooth,
        }
    }
}

/// Per-sample soft Dice loss over probabilities.
///
/// ```text
/// dice[n] = (2 * Σ input[n]*target[n] + s) / (Σ input[n] + Σ target[n] + s)
/// ```
#[derive(Module, Clone, Debug)]
pub struct SoftDiceLoss {
    /// Additive smoothing applied to numerator and denominator.
    pub smooth: f64,
}

impl Default for SoftDiceLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftDiceLoss {
    /// Create a new soft Dice loss with default smoothing.
    pub fn new() -> Self {
        SoftDiceLossConfig::new().init()
    }

    /// Compute the criterion on the input tensor.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, ...]` probabilities in `[0, 1]`
    /// - target: `[batch_size, ...]` values in `[0, 1]`
    /// - output: `[1]`
    pub fn forward<B: Backend, const D: usize>(
        &self,
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

        let batch_size = input.dims()[0];
        let input: Tensor<B, 2> = input.reshape([batch_size as i32, -1]);
        let target: Tensor<B, 2> = target.reshape([batch_size as i32, -1]);

        let intersection: Tensor<B, 1> = (input.clone() * target.clone()).sum_dim(1).squeeze(1);
        let sums: Tensor<B, 1> =
            input.sum_dim(1).squeeze(1) + target.sum_dim(1).squeeze(1);

        let dice = (intersection.mul_scalar(2.0).add_scalar(self.smooth))
            / sums.add_scalar(self.smooth);

        let mean = dice.mean();
        Tensor::ones_like(&mean) - mean
    }
}

impl<B: Backend> Criterion<B> for SoftDiceLoss {
    fn forward(
        &self,
        input: Tensor<B, 5>,
        target: LossTarget<B>,
        _pixel_weights: Option<Tensor<B, 4>>,
    ) -> Tensor<B, 1> {
        SoftDiceLoss::forward(self, input, target.into_one_hot("SoftDiceLoss"))
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::cast::ToElement;

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn perfect_binary_match_scores_zero() {
        let device = Default::default();
        let loss = SoftDiceLoss::new();

        let input = Tensor::<TestBackend, 5>::ones([2, 1, 4, 4, 4], &device);
        let target = input.clone();

        let result = loss.forward(input, target).into_scalar().to_f64();

        assert!(result.abs() < 1e-5, "got {result}");
    }

    #[test]
    fn empty_sample_is_perfect_thanks_to_smoothing() {
        let device = Default::default();
        let loss = SoftDiceLoss::new();

        let input = Tensor::<TestBackend, 5>::zeros([1, 1, 4, 4, 4], &device);
        let target = input.clone();

        let result = loss.forward(input, target).into_scalar().to_f64();

        assert!(result.abs() < 1e-5, "got {result}");
    }

    #[test]
    fn disjoint_prediction_scores_close_to_one() {
        let device = Default::default();
        let loss = SoftDiceLoss::new();

        let input = Tensor::<TestBackend, 5>::ones([1, 1, 4, 4, 4], &device);
        let target = Tensor::<TestBackend, 5>::zeros([1, 1, 4, 4, 4], &device);

        let result = loss.forward(input, target).into_scalar().to_f64();

        assert!((result - 1.0).abs() < 1e-4, "got {result}");
    }
}
