//! Linear combination of binary cross-entropy and Dice loss.

use burn::{
    config::Config,
    module::Module,
    tensor::{backend::Backend, Tensor},
};

use crate::{
    bce::BceWithLogitsLoss,
    criterion::{Criterion, LossTarget},
    dice::{DiceLoss, DiceLossConfig},
};

/// Configuration for creating a [BCE + Dice loss](BceDiceLoss).
#[derive(Config, Debug)]
pub struct BceDiceLossConfig {
    /// Weight of the binary cross-entropy term. Default: 1.0
    #[config(default = 1.0)]
    pub alpha: f64,

    /// Weight of the Dice term. Default: 1.0
    #[config(default = 1.0)]
    pub beta: f64,
}

impl BceDiceLossConfig {
    /// Initialize [BCE + Dice loss](BceDiceLoss).
    pub fn init<B: Backend>(&self, device: &B::Device) -> BceDiceLoss<B> {
        BceDiceLoss {
            alpha: self.alpha,
            beta: self.beta,
            bce: BceWithLogitsLoss::new(),
            dice: DiceLossConfig::new().init(device),
        }
    }
}

/// `alpha * BCE + beta * Dice`, both terms consuming the same raw logits.
///
/// BCE drives per-voxel calibration while Dice optimizes region overlap
/// directly, a combination that tends to converge faster than either alone.
#[derive(Module, Debug)]
pub struct BceDiceLoss<B: Backend> {
    /// Weight of the binary cross-entropy term.
    pub alpha: f64,
    /// Weight of the Dice term.
    pub beta: f64,
    bce: BceWithLogitsLoss,
    dice: DiceLoss<B>,
}

impl<B: Backend> BceDiceLoss<B> {
    /// Create a new BCE + Dice loss with both weights set to one.
    pub fn new(device: &B::Device) -> Self {
        BceDiceLossConfig::new().init(device)
    }

    /// Compute the criterion on the input tensor.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, channels, ...spatial]` raw logits
    /// - target: `[batch_size, channels, ...spatial]` values in `[0, 1]`
    /// - output: `[1]`
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
        target: Tensor<B, D>,
    ) -> Tensor<B, 1> {
        let bce = self.bce.forward(input.clone(), target.clone());
        let dice = self.dice.forward(input, target);

        bce.mul_scalar(self.alpha) + dice.mul_scalar(self.beta)
    }
}

impl<B: Backend> Criterion<B> for BceDiceLoss<B> {
    fn forward(
        &self,
        input: Tensor<B, 5>,
        target: LossTarget<B>,
        _pixel_weights: Option<Tensor<B, 4>>,
    ) -> Tensor<B, 1> {
        BceDiceLoss::forward(self, input, target.into_one_hot("BCEDiceLoss"))
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::cast::ToElement;

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn combination_is_the_weighted_sum_of_both_terms() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 5>::random(
            [1, 2, 2, 2, 2],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let target = Tensor::<TestBackend, 5>::random(
            [1, 2, 2, 2, 2],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let combined = BceDiceLossConfig::new()
            .with_alpha(2.0)
            .with_beta(0.5)
            .init::<TestBackend>(&device);
        let bce = BceWithLogitsLoss::new();
        let dice = DiceLoss::<TestBackend>::new(&device);

        let expected = 2.0 * bce.forward(input.clone(), target.clone()).into_scalar().to_f64()
            + 0.5 * dice.forward(input.clone(), target.clone()).into_scalar().to_f64();
        let result = combined.forward(input, target).into_scalar().to_f64();

        assert!((result - expected).abs() < 1e-5, "got {result}, expected {expected}");
    }

    #[test]
    fn strong_correct_logits_give_a_small_loss() {
        let device = Default::default();
        let loss = BceDiceLoss::<TestBackend>::new(&device);

        let target = Tensor::<TestBackend, 5>::ones([1, 1, 4, 4, 4], &device);
        let input = target.clone().mul_scalar(20.0);

        let result = loss.forward(input, target).into_scalar().to_f64();

        assert!(result < 1e-3, "got {result}");
    }
}
