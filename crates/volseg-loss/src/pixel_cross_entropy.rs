//! Cross-entropy with a caller-supplied weight for every pixel.
//!
//! Useful when the importance of a voxel depends on its position, e.g. to
//! emphasize boundary regions. The target arrives as a class-label map and is
//! expanded to one-hot internally via `scatter`.

use burn::{
    config::Config,
    module::Module,
    tensor::{activation, backend::Backend, Int, Tensor},
};

use crate::{
    criterion::{Criterion, LossTarget},
    utils::flatten_channels,
};

/// Configuration for creating a
/// [pixel-wise cross-entropy loss](PixelWiseCrossEntropyLoss).
#[derive(Config, Debug)]
pub struct PixelWiseCrossEntropyLossConfig {
    /// Optional label value excluded from the loss.
    pub ignore_index: Option<i64>,
}

impl PixelWiseCrossEntropyLossConfig {
    /// Initialize [pixel-wise cross-entropy loss](PixelWiseCrossEntropyLoss).
    pub fn init(&self) -> PixelWiseCrossEntropyLoss {
        PixelWiseCrossEntropyLoss {
            ignore_index: self.ignore_index,
        }
    }
}

/// Cross-entropy where every spatial position carries its own weight.
#[derive(Module, Clone, Debug, Default)]
pub struct PixelWiseCrossEntropyLoss {
    /// Optional label value excluded from the loss.
    pub ignore_index: Option<i64>,
}

impl PixelWiseCrossEntropyLoss {
    /// Create a new pixel-wise cross-entropy loss without an ignore index.
    pub fn new() -> Self {
        PixelWiseCrossEntropyLossConfig::new().init()
    }

    /// Compute the criterion on the input tensor.
    ///
    /// # Shapes
    ///
    /// - logits: `[batch_size, classes, ...spatial]`
    /// - targets: `[batch_size, ...spatial]` integer class indices
    /// - weights: `[batch_size, ...spatial]` per-position weights
    /// - output: `[1]`
    pub fn forward<B: Backend, const D: usize, const DT: usize>(
        &self,
        logits: Tensor<B, D>,
        targets: Tensor<B, DT, Int>,
        weights: Tensor<B, DT>,
    ) -> Tensor<B, 1> {
        let logit_dims = logits.dims();
        let target_dims = targets.dims();
        assert_eq!(
            DT + 1,
            D,
            "Targets must have one dimension fewer than the logits (no channel axis)"
        );
        assert_eq!(
            weights.dims(),
            target_dims,
            "Shape of weights ({:?}) must match targets ({:?})",
            weights.dims(),
            target_dims
        );
        assert_eq!(
            &logit_dims[..1],
            &target_dims[..1],
            "Batch size of logits ({:?}) must match targets ({:?})",
            logit_dims,
            target_dims
        );
        assert_eq!(
            &logit_dims[2..],
            &target_dims[1..],
            "Spatial shape of logits ({:?}) must match targets ({:?})",
            logit_dims,
            target_dims
        );

        let classes = logit_dims[1];
        let log_probs = flatten_channels(activation::log_softmax(logits, 1));
        let [_, elements] = log_probs.dims();

        let targets: Tensor<B, 1, Int> = targets.flatten(0, DT - 1);
        let mut weights: Tensor<B, 1> = weights.flatten(0, DT - 1);

        let targets = match self.ignore_index {
            Some(ignore_index) => {
                // the ignored positions keep a zero weight; their labels are
                // remapped so the scatter index stays valid
                let ignored = targets.clone().equal_elem(ignore_index);
                weights = weights.mask_fill(ignored.clone(), 0.0);
                targets.mask_fill(ignored, 0)
            }
            None => targets,
        };

        let one_hot = Tensor::<B, 2>::zeros([classes, elements], &log_probs.device()).scatter(
            0,
            targets.reshape([1, elements as i32]),
            Tensor::ones([1, elements], &log_probs.device()),
        );

        let weights = weights.reshape([1, elements as i32]);
        (log_probs * one_hot * weights).mean().neg()
    }
}

impl<B: Backend> Criterion<B> for PixelWiseCrossEntropyLoss {
    fn forward(
        &self,
        input: Tensor<B, 5>,
        target: LossTarget<B>,
        pixel_weights: Option<Tensor<B, 4>>,
    ) -> Tensor<B, 1> {
        let Some(weights) = pixel_weights else {
            panic!("PixelWiseCrossEntropyLoss requires per-pixel weights")
        };
        PixelWiseCrossEntropyLoss::forward(
            self,
            input,
            target.into_labels("PixelWiseCrossEntropyLoss"),
            weights,
        )
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::cast::ToElement;

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn uniform_weights_match_unweighted_mean() {
        let device = Default::default();
        let loss = PixelWiseCrossEntropyLoss::new();

        let logits = Tensor::<TestBackend, 5>::from_data(
            burn::tensor::TensorData::from([[[[[2.0, 0.5]]], [[[0.0, 1.0]]]]]),
            &device,
        );
        let targets = Tensor::<TestBackend, 4, Int>::from_ints([[[[0, 1]]]], &device);
        let weights = Tensor::<TestBackend, 4>::ones([1, 1, 1, 2], &device);

        let result = loss
            .forward(logits.clone(), targets, weights)
            .into_scalar()
            .to_f64();

        // mean over the [classes, elements] grid, so the per-position
        // log-likelihoods are divided by classes * elements = 4
        let nll_0 = (1.0 + (-2.0_f64).exp()).ln();
        let nll_1 = (1.0 + (-0.5_f64).exp()).ln();
        let expected = (nll_0 + nll_1) / 4.0;
        assert!((result - expected).abs() < 1e-5, "got {result}, expected {expected}");
    }

    #[test]
    fn zero_weight_silences_a_position() {
        let device = Default::default();
        let loss = PixelWiseCrossEntropyLoss::new();

        let logits = Tensor::<TestBackend, 5>::from_data(
            burn::tensor::TensorData::from([[[[[2.0, 0.5]]], [[[0.0, 1.0]]]]]),
            &device,
        );
        let targets = Tensor::<TestBackend, 4, Int>::from_ints([[[[0, 1]]]], &device);
        let weights = Tensor::<TestBackend, 4>::from_data(
            burn::tensor::TensorData::from([[[[1.0, 0.0]]]]),
            &device,
        );

        let result = loss.forward(logits, targets, weights).into_scalar().to_f64();

        let expected = (1.0 + (-2.0_f64).exp()).ln() / 4.0;
        assert!((result - expected).abs() < 1e-5, "got {result}, expected {expected}");
    }

    #[test]
    fn ignore_index_removes_the_label_from_the_loss() {
        let device = Default::default();
        let loss = PixelWiseCrossEntropyLossConfig::new()
            .with_ignore_index(Some(1))
            .init();

        let logits = Tensor::<TestBackend, 5>::from_data(
            burn::tensor::TensorData::from([[[[[2.0, 0.5]]], [[[0.0, 1.0]]]]]),
            &device,
        );
        let targets = Tensor::<TestBackend, 4, Int>::from_ints([[[[0, 1]]]], &device);
        let weights = Tensor::<TestBackend, 4>::ones([1, 1, 1, 2], &device);

        let result = loss.forward(logits, targets, weights).into_scalar().to_f64();

        let expected = (1.0 + (-2.0_f64).exp()).ln() / 4.0;
        assert!((result - expected).abs() < 1e-5, "got {result}, expected {expected}");
    }

    #[test]
    #[should_panic = "Shape of weights"]
    fn mismatched_weight_shape_panics() {
        let device = Default::default();
        let loss = PixelWiseCrossEntropyLoss::new();

        let logits = Tensor::<TestBackend, 5>::ones([1, 2, 2, 2, 2], &device);
        let targets = Tensor::<TestBackend, 4, Int>::ones([1, 2, 2, 2], &device);
        let weights = Tensor::<TestBackend, 4>::ones([1, 2, 2, 4], &device);

        let _result = loss.forward(logits, targets, weights);
    }
}
