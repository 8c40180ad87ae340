//! Binary cross-entropy on logits, numerically stable for large magnitudes.

use burn::{
    config::Config,
    module::Module,
    tensor::{activation, backend::Backend, Tensor},
};

use crate::criterion::{Criterion, LossTarget};

/// Configuration for creating a
/// [binary cross-entropy loss](BceWithLogitsLoss).
#[derive(Config, Debug)]
pub struct BceWithLogitsLossConfig {
    /// Optional weight applied to the positive class, useful when foreground
    /// voxels are scarce.
    pub pos_weight: Option<f64>,
}

impl BceWithLogitsLossConfig {
    /// Initialize [binary cross-entropy loss](BceWithLogitsLoss).
    pub fn init(&self) -> BceWithLogitsLoss {
        BceWithLogitsLoss {
            pos_weight: self.pos_weight,
        }
    }
}

/// Binary cross-entropy that consumes raw logits.
///
/// Uses the standard stable decomposition
/// `max(x, 0) - x*y + log(1 + exp(-|x|))` so neither `exp` nor `log`
/// overflows, with the optional positive-class weight folded into the
/// log term.
#[derive(Module, Clone, Debug, Default)]
pub struct BceWithLogitsLoss {
    /// Optional weight for the positive class.
    pub pos_weight: Option<f64>,
}

impl BceWithLogitsLoss {
    /// Create a new binary cross-entropy loss without a positive weight.
    pub fn new() -> Self {
        BceWithLogitsLossConfig::new().init()
    }

    /// Compute the criterion on the input tensor.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, channels, ...spatial]` raw logits
    /// - target: `[batch_size, channels, ...spatial]` values in `[0, 1]`
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

        let pos_weight = self.pos_weight.unwrap_or(1.0);

        // log(1 + exp(-|x|)) + relu(-x) = log(1 + exp(-x)), computed stably
        let log_term =
            input.clone().abs().neg().exp().log1p() + activation::relu(input.clone().neg());
        let scale = target.clone().mul_scalar(pos_weight - 1.0).add_scalar(1.0);

        (((target.ones_like() - target) * input) + scale * log_term).mean()
    }
}

impl<B: Backend> Criterion<B> for BceWithLogitsLoss {
    fn forward(
        &self,
        input: Tensor<B, 5>,
        target: LossTarget<B>,
        _pixel_weights: Option<Tensor<B, 4>>,
    ) -> Tensor<B, 1> {
        BceWithLogitsLoss::forward(self, input, target.into_one_hot("BCEWithLogitsLoss"))
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::cast::ToElement;

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn bce_matches_closed_form() {
        let device = Default::default();
        let loss = BceWithLogitsLoss::new();

        let input = Tensor::<TestBackend, 2>::from_data(
            burn::tensor::TensorData::from([[2.0, -1.0]]),
            &device,
        );
        let target = Tensor::<TestBackend, 2>::from_data(
            burn::tensor::TensorData::from([[1.0, 0.0]]),
            &device,
        );

        let result = loss.forward(input, target).into_scalar().to_f64();

        // -log(sigmoid(2)) and -log(1 - sigmoid(-1))
        let expected = ((1.0 + (-2.0_f64).exp()).ln() + (1.0 + (-1.0_f64).exp()).ln()) / 2.0;
        assert!((result - expected).abs() < 1e-5, "got {result}, expected {expected}");
    }

    #[test]
    fn bce_is_stable_for_extreme_logits() {
        let device = Default::default();
        let loss = BceWithLogitsLoss::new();

        let input = Tensor::<TestBackend, 2>::from_data(
            burn::tensor::TensorData::from([[500.0, -500.0]]),
            &device,
        );
        let target = Tensor::<TestBackend, 2>::from_data(
            burn::tensor::TensorData::from([[1.0, 0.0]]),
            &device,
        );

        let result = loss.forward(input, target).into_scalar().to_f64();

        assert!(result.is_finite());
        assert!(result.abs() < 1e-5, "confident correct logits cost ~0, got {result}");
    }

    #[test]
    fn pos_weight_scales_only_the_positive_term() {
        let device = Default::default();
        let plain = BceWithLogitsLoss::new();
        let weighted = BceWithLogitsLossConfig::new()
            .with_pos_weight(Some(3.0))
            .init();

        let input = Tensor::<TestBackend, 2>::from_data(
            burn::tensor::TensorData::from([[-2.0]]),
            &device,
        );
        let target = Tensor::<TestBackend, 2>::ones([1, 1], &device);

        let base = plain
            .forward(input.clone(), target.clone())
            .into_scalar()
            .to_f64();
        let scaled = weighted.forward(input, target).into_scalar().to_f64();

        assert!((scaled - 3.0 * base).abs() < 1e-5, "got {scaled}, base {base}");
    }
}
