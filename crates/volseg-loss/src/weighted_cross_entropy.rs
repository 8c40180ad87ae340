//! Cross-entropy with class weights derived from the current prediction.
//!
//! Described in <https://arxiv.org/pdf/1707.03237.pdf>: instead of fixed
//! per-class weights, each forward pass rebalances the classes by the inverse
//! of their predicted frequency, so rare classes are boosted exactly when the
//! network under-predicts them.

use burn::{
    config::Config,
    module::Module,
    tensor::{activation, backend::Backend, Int, Tensor},
};

use crate::{
    criterion::{Criterion, LossTarget},
    cross_entropy::cross_entropy,
    utils::flatten_channels,
};

/// Configuration for creating a
/// [weighted cross-entropy loss](WeightedCrossEntropyLoss).
#[derive(Config, Debug)]
pub struct WeightedCrossEntropyLossConfig {
    /// Label value excluded from the loss and its normalizer. Default: -100
    #[config(default = -100)]
    pub ignore_index: i64,
}

impl WeightedCrossEntropyLossConfig {
    /// Initialize [weighted cross-entropy loss](WeightedCrossEntropyLoss).
    pub fn init(&self) -> WeightedCrossEntropyLoss {
        WeightedCrossEntropyLoss {
            ignore_index: self.ignore_index,
        }
    }
}

/// Cross-entropy whose class weights are recomputed from every prediction.
///
/// The weights are treated as constants of the optimization: they are
/// detached so the rebalancing itself does not receive gradients.
#[derive(Module, Clone, Debug)]
pub struct WeightedCrossEntropyLoss {
    /// Label value excluded from the loss.
    pub ignore_index: i64,
}

impl Default for WeightedCrossEntropyLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightedCrossEntropyLoss {
    /// Create a new weighted cross-entropy loss with default configuration.
    pub fn new() -> Self {
        WeightedCrossEntropyLossConfig::new().init()
    }

    /// Compute the criterion on the input tensor.
    ///
    /// # Shapes
    ///
    /// - logits: `[batch_size, classes, ...spatial]`
    /// - targets: `[batch_size, ...spatial]` integer class indices
    /// - output: `[1]`
    pub fn forward<B: Backend, const D: usize, const DT: usize>(
        &self,
        logits: Tensor<B, D>,
        targets: Tensor<B, DT, Int>,
    ) -> Tensor<B, 1> {
        let weights = Self::class_weights(logits.clone());
        cross_entropy(logits, targets, Some(weights), self.ignore_index)
    }

    /// Inverse-frequency class weights, `w[c] = Σ(1 - p[c]) / Σ p[c]`, taken
    /// over the softmaxed prediction.
    fn class_weights<B: Backend, const D: usize>(logits: Tensor<B, D>) -> Tensor<B, 1> {
        let probabilities = flatten_channels(activation::softmax(logits, 1));

        let nominator: Tensor<B, 1> = (probabilities.ones_like() - probabilities.clone())
            .sum_dim(1)
            .squeeze(1);
        let denominator: Tensor<B, 1> = probabilities.sum_dim(1).squeeze(1);

        (nominator / denominator).detach()
    }
}

impl<B: Backend> Criterion<B> for WeightedCrossEntropyLoss {
    fn forward(
        &self,
        input: Tensor<B, 5>,
        target: LossTarget<B>,
        _pixel_weights: Option<Tensor<B, 4>>,
    ) -> Tensor<B, 1> {
        WeightedCrossEntropyLoss::forward(
            self,
            input,
            target.into_labels("WeightedCrossEntropyLoss"),
        )
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::cast::ToElement;

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn class_weights_boost_under_predicted_classes() {
        let device = Default::default();

        // class 0 dominates the prediction, class 1 is rare
        let logits = Tensor::<TestBackend, 5>::from_data(
            burn::tensor::TensorData::from([[[[[3.0, 3.0]]], [[[-3.0, -3.0]]]]]),
            &device,
        );

        let weights = WeightedCrossEntropyLoss::class_weights(logits).into_data();
        let weights = weights.as_slice::<f32>().unwrap();

        assert!(
            weights[1] > weights[0],
            "rare class should get the larger weight: {weights:?}"
        );
    }

    #[test]
    fn weighted_cross_entropy_is_finite_on_random_input() {
        let device = Default::default();
        let loss = WeightedCrossEntropyLoss::new();

        let logits = Tensor::<TestBackend, 5>::random(
            [2, 3, 4, 4, 4],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let targets = Tensor::<TestBackend, 4, Int>::ones([2, 4, 4, 4], &device);

        let result = loss.forward(logits, targets).into_scalar().to_f64();

        assert!(result.is_finite());
        assert!(result >= 0.0);
    }

    #[test]
    fn weighted_cross_entropy_respects_ignore_index() {
        let device = Default::default();
        let loss = WeightedCrossEntropyLossConfig::new()
            .with_ignore_index(0)
            .init();

        let logits = Tensor::<TestBackend, 5>::random(
            [1, 2, 2, 2, 2],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        // every label ignored: nothing contributes
        let targets = Tensor::<TestBackend, 4, Int>::zeros([1, 2, 2, 2], &device);

        let result = loss.forward(logits, targets).into_scalar().to_f64();

        assert!(result.abs() < 1e-6);
    }
}
