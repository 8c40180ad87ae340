//! Cross-entropy loss over spatial class-label targets.
//!
//! The logits are log-softmaxed over the channel axis, flattened to
//! `[classes, elements]` and gathered against the label map. Positions whose
//! label equals the ignore index contribute neither to the sum nor to the
//! weighted normalizer.

use burn::{
    config::Config,
    module::Module,
    tensor::{activation, backend::Backend, Int, Tensor},
};

use crate::{
    criterion::{Criterion, LossTarget},
    utils::flatten_channels,
};

/// Sentinel label excluded from the loss, matching the conventional default.
pub const DEFAULT_IGNORE_INDEX: i64 = -100;

/// Shared cross-entropy core used by the plain and the dynamically weighted
/// variants.
///
/// The normalizer follows the usual convention for weighted cross-entropy:
/// the sum of the class weights over the retained positions, so ignored
/// labels do not distort the denominator. An all-ignored batch yields zero
/// loss.
pub(crate) fn cross_entropy<B: Backend, const D: usize, const DT: usize>(
    logits: Tensor<B, D>,
    targets: Tensor<B, DT, Int>,
    class_weights: Option<Tensor<B, 1>>,
    ignore_index: i64,
) -> Tensor<B, 1> {
    let logit_dims = logits.dims();
    let target_dims = targets.dims();
    assert_eq!(
        DT + 1,
        D,
        "Targets must have one dimension fewer than the logits (no channel axis)"
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

    let log_probs = flatten_channels(activation::log_softmax(logits, 1));
    let [_, elements] = log_probs.dims();
    let targets: Tensor<B, 1, Int> = targets.flatten(0, DT - 1);

    let retained = targets.clone().not_equal_elem(ignore_index);
    // remap ignored labels to class zero so the gather stays in bounds; the
    // mask removes their contribution afterwards
    let safe_targets = targets.mask_fill(retained.clone().bool_not(), 0);

    let picked: Tensor<B, 1> = log_probs
        .gather(0, safe_targets.clone().reshape([1, elements]))
        .reshape([elements]);

    let sample_weights: Tensor<B, 1> = match class_weights {
        Some(weights) => weights.gather(0, safe_targets),
        None => picked.ones_like(),
    };

    let retained = retained.float();
    let negative_log_likelihood = (picked * sample_weights.clone() * retained.clone())
        .sum()
        .neg();
    let normalizer = (sample_weights * retained).sum().clamp_min(1e-12);

    negative_log_likelihood / normalizer
}

/// Configuration for creating a [cross-entropy loss](CrossEntropyLoss).
#[derive(Config, Debug)]
pub struct CrossEntropyLossConfig {
    /// Optional per-class rescaling weights.
    pub weights: Option<Vec<f32>>,

    /// Label value excluded from the loss and its normalizer. Default: -100
    #[config(default = -100)]
    pub ignore_index: i64,
}

impl CrossEntropyLossConfig {
    /// Initialize [cross-entropy loss](CrossEntropyLoss).
    pub fn init<B: Backend>(&self, device: &B::Device) -> CrossEntropyLoss<B> {
        self.assertions();
        CrossEntropyLoss {
            weights: self
                .weights
                .as_ref()
                .map(|weights| Tensor::from_floats(weights.as_slice(), device)),
            ignore_index: self.ignore_index,
        }
    }

    fn assertions(&self) {
        if let Some(weights) = self.weights.as_ref() {
            assert!(
                weights.iter().all(|weight| *weight >= 0.0),
                "Class weights of CrossEntropyLoss must be non-negative"
            );
        }
    }
}

/// Cross-entropy loss with static per-class weights and an ignore index.
///
/// Targets are integer class indices without a channel axis; the same code
/// path serves 2D images (rank-4 logits) and 3D volumes (rank-5 logits).
#[derive(Module, Debug)]
pub struct CrossEntropyLoss<B: Backend> {
    /// Per-class rescaling weights.
    pub weights: Option<Tensor<B, 1>>,
    /// Label value excluded from the loss.
    pub ignore_index: i64,
}

impl<B: Backend> CrossEntropyLoss<B> {
    /// Create a new cross-entropy loss with default configuration.
    pub fn new(device: &B::Device) -> Self {
        CrossEntropyLossConfig::new().init(device)
    }

    /// Compute the criterion on the input tensor.
    ///
    /// # Shapes
    ///
    /// - logits: `[batch_size, classes, ...spatial]`
    /// - targets: `[batch_size, ...spatial]` integer class indices
    /// - output: `[1]`
    pub fn forward<const D: usize, const DT: usize>(
        &self,
        logits: Tensor<B, D>,
        targets: Tensor<B, DT, Int>,
    ) -> Tensor<B, 1> {
        cross_entropy(logits, targets, self.weights.clone(), self.ignore_index)
    }
}

impl<B: Backend> Criterion<B> for CrossEntropyLoss<B> {
    fn forward(
        &self,
        input: Tensor<B, 5>,
        target: LossTarget<B>,
        _pixel_weights: Option<Tensor<B, 4>>,
    ) -> Tensor<B, 1> {
        CrossEntropyLoss::forward(self, input, target.into_labels("CrossEntropyLoss"))
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::{cast::ToElement, TensorData};

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn cross_entropy_matches_manual_log_softmax() {
        let device = Default::default();
        let loss = CrossEntropyLoss::<TestBackend>::new(&device);

        // [1, 2, 1, 1, 1]: two classes, single voxel
        let logits = Tensor::<TestBackend, 5>::from_data(
            TensorData::from([[[[[2.0]]], [[[0.0]]]]]),
            &device,
        );
        let targets = Tensor::<TestBackend, 4, Int>::from_ints([[[[0]]]], &device);

        let result = loss.forward(logits, targets).into_scalar().to_f64();

        // -log(e^2 / (e^2 + e^0)) = log(1 + e^-2)
        let expected = (1.0 + (-2.0_f64).exp()).ln();
        assert!((result - expected).abs() < 1e-5);
    }

    #[test]
    fn cross_entropy_class_weights_rescale_loss() {
        let device = Default::default();
        let unweighted = CrossEntropyLoss::<TestBackend>::new(&device);
        let weighted = CrossEntropyLossConfig::new()
            .with_weights(Some(vec![2.0, 2.0]))
            .init(&device);

        let logits = Tensor::<TestBackend, 5>::random(
            [2, 2, 2, 2, 2],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let targets = Tensor::<TestBackend, 4, Int>::ones([2, 2, 2, 2], &device);

        let plain = unweighted
            .forward(logits.clone(), targets.clone())
            .into_scalar()
            .to_f64();
        let scaled = weighted.forward(logits, targets).into_scalar().to_f64();

        // uniform weights cancel in the weighted mean
        assert!((plain - scaled).abs() < 1e-5);
    }

    #[test]
    fn cross_entropy_ignore_index_drops_positions() {
        let device = Default::default();
        let loss = CrossEntropyLossConfig::new()
            .with_ignore_index(1)
            .init::<TestBackend>(&device);

        let logits = Tensor::<TestBackend, 5>::from_data(
            TensorData::from([[[[[2.0, 1.0]]], [[[0.0, 3.0]]]]]),
            &device,
        );
        // second position carries the ignored label
        let targets = Tensor::<TestBackend, 4, Int>::from_ints([[[[0, 1]]]], &device);

        let result = loss.forward(logits, targets).into_scalar().to_f64();

        let expected = (1.0 + (-2.0_f64).exp()).ln();
        assert!((result - expected).abs() < 1e-5);
    }

    #[test]
    #[should_panic = "Spatial shape of logits"]
    fn cross_entropy_mismatched_spatial_shapes_panics() {
        let device = Default::default();
        let loss = CrossEntropyLoss::<TestBackend>::new(&device);

        let logits = Tensor::<TestBackend, 5>::ones([1, 2, 2, 2, 2], &device);
        let targets = Tensor::<TestBackend, 4, Int>::ones([1, 2, 2, 4], &device);

        let _result = loss.forward(logits, targets);
    }
}
