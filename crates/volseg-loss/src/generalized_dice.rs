//! Generalized Dice loss (GDL) for class-imbalanced segmentation.
//!
//! Instead of averaging per-channel Dice scores, GDL corrects the
//! contribution of each label by the inverse of its squared volume and
//! reduces to a single global ratio:
//!
//! ```text
//! w[c]  = 1 / (Σ target[c])²
//! GDL   = 1 - 2 * Σ_c w[c]·Σ input[c]*target[c] / Σ_c w[c]·Σ (input[c]+target[c])
//! ```

use burn::{
    config::Config,
    module::{Ignored, Module},
    tensor::{backend::Backend, Tensor},
};

use crate::{
    criterion::{Criterion, LossTarget},
    dice::Normalization,
    utils::flatten_channels,
};

/// Configuration for creating a [Generalized Dice loss](GeneralizedDiceLoss).
#[derive(Config, Debug)]
pub struct GeneralizedDiceLossConfig {
    /// Small constant that keeps the volume weights and the denominator away
    /// from zero. Default: 1e-6
    #[config(default = 1e-6)]
    pub epsilon: f64,

    /// Normalization applied to the raw prediction. Default: sigmoid
    #[config(default = "Normalization::Sigmoid")]
    pub normalization: Normalization,
}

impl GeneralizedDiceLossConfig {
    /// Initialize [Generalized Dice loss](GeneralizedDiceLoss).
    pub fn init(&self) -> GeneralizedDiceLoss {
        GeneralizedDiceLoss {
            epsilon: self.epsilon,
            normalization: Ignored(self.normalization),
        }
    }
}

/// Generalized Dice loss.
///
/// The inverse-volume weighting needs at least two classes to balance, so a
/// single-channel pair is expanded with a synthetic background channel
/// (`1 - x`) before the statistics are computed.
#[derive(Module, Clone, Debug)]
pub struct GeneralizedDiceLoss {
    /// Small constant that keeps the ratios away from zero.
    pub epsilon: f64,
    /// Normalization applied to the raw prediction.
    pub normalization: Ignored<Normalization>,
}

impl Default for GeneralizedDiceLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneralizedDiceLoss {
    /// Create a new generalized Dice loss with default configuration.
    pub fn new() -> Self {
        GeneralizedDiceLossConfig::new().init()
    }

    /// Compute the criterion on the input tensor.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, channels, ...spatial]` raw logits
    /// - target: `[batch_size, channels, ...spatial]` dense (one-hot) target
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

        let input = self.normalization.apply(input);
        let mut input = flatten_channels(input);
        let mut target = flatten_channels(target);

        let [channels, _] = input.dims();
        assert!(
            channels >= 1,
            "GeneralizedDiceLoss requires at least one channel, got {channels}"
        );

        if channels == 1 {
            // the inverse-volume weighting needs a foreground and a
            // background class, so split the single channel into both
            input = Tensor::cat(vec![input.clone(), input.ones_like() - input], 0);
            target = Tensor::cat(vec![target.clone(), target.ones_like() - target], 0);
        }

        let volume: Tensor<B, 2> = target.clone().sum_dim(1);
        let w_l = (volume.clone() * volume)
            .clamp_min(self.epsilon)
            .recip()
            .detach();

        let intersect = (input.clone() * target.clone()).sum_dim(1) * w_l.clone();
        let denominator = ((input + target).sum_dim(1) * w_l).clamp_min(self.epsilon);

        let dice = (intersect.sum() / denominator.sum()).mul_scalar(2.0);
        Tensor::ones_like(&dice) - dice
    }
}

impl<B: Backend> Criterion<B> for GeneralizedDiceLoss {
    fn forward(
        &self,
        input: Tensor<B, 5>,
        target: LossTarget<B>,
        _pixel_weights: Option<Tensor<B, 4>>,
    ) -> Tensor<B, 1> {
        GeneralizedDiceLoss::forward(self, input, target.into_one_hot("GeneralizedDiceLoss"))
    }
}
