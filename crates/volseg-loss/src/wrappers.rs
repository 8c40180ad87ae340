//! Wrappers that adapt a target tensor before delegating to an inner loss.

use burn::tensor::{backend::Backend, Tensor};

use crate::criterion::{Criterion, LossTarget};

/// Zeroes prediction and target wherever the target equals the ignore value.
///
/// Intended for dense-target losses without native ignore support: after
/// masking, the ignored positions contribute a zero residual. Label-map
/// targets are rejected since the cross-entropy family already carries its
/// own `ignore_index`.
#[derive(Debug)]
pub struct MaskingLossWrapper<L> {
    /// The wrapped loss.
    pub loss: L,
    /// Target value marking positions to drop.
    pub ignore_index: i64,
}

impl<L> MaskingLossWrapper<L> {
    pub fn new(loss: L, ignore_index: i64) -> Self {
        Self { loss, ignore_index }
    }
}

impl<B: Backend, L: Criterion<B>> Criterion<B> for MaskingLossWrapper<L> {
    fn forward(
        &self,
        input: Tensor<B, 5>,
        target: LossTarget<B>,
        pixel_weights: Option<Tensor<B, 4>>,
    ) -> Tensor<B, 1> {
        let target = target.into_one_hot("MaskingLossWrapper");
        let mask = target
            .clone()
            .not_equal_elem(self.ignore_index as f64)
            .float();

        let input = input * mask.clone();
        let target = target * mask;

        self.loss
            .forward(input, LossTarget::OneHot(target), pixel_weights)
    }
}

/// Drops the last channel of the target before delegating.
///
/// Some datasets append an auxiliary channel (e.g. a boundary map) to the
/// ground truth that the loss must not see. With `squeeze_channel` the
/// remaining single channel is converted to an integer label map for
/// losses that expect class indices.
#[derive(Debug)]
pub struct SkipLastTargetChannelWrapper<L> {
    /// The wrapped loss.
    pub loss: L,
    /// Convert the remaining singleton channel to class labels.
    pub squeeze_channel: bool,
}

impl<L> SkipLastTargetChannelWrapper<L> {
    pub fn new(loss: L, squeeze_channel: bool) -> Self {
        Self {
            loss,
            squeeze_channel,
        }
    }
}

impl<B: Backend, L: Criterion<B>> Criterion<B> for SkipLastTargetChannelWrapper<L> {
    fn forward(
        &self,
        input: Tensor<B, 5>,
        target: LossTarget<B>,
        pixel_weights: Option<Tensor<B, 4>>,
    ) -> Tensor<B, 1> {
        let target = target.into_one_hot("SkipLastTargetChannelWrapper");
        let channels = target.dims()[1];
        assert!(
            channels > 1,
            "Target tensor has a singleton channel dimension, cannot remove channel"
        );

        let trimmed = target.narrow(1, 0, channels - 1);

        let target = if self.squeeze_channel {
            assert_eq!(
                channels - 1,
                1,
                "squeeze_channel requires exactly one remaining target channel, got {}",
                channels - 1
            );
            LossTarget::Labels(trimmed.squeeze::<4>(1).int())
        } else {
            LossTarget::OneHot(trimmed)
        };

        self.loss.forward(input, target, pixel_weights)
    }
}
