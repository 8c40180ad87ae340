//! Dice loss for multi-channel segmentation.
//!
//! Computes the Dice coefficient per channel over the flattened spatial and
//! batch axes, then returns `1 - mean(dice)` as the loss:
//!
//! ```text
//! dice[c] = 2 * Σ input[c]*target[c] / (Σ input[c]² + Σ target[c]²)
//! ```

use burn::{
    config::Config,
    module::{Content, DisplaySettings, Ignored, Module, ModuleDisplay},
    tensor::{activation, backend::Backend, Tensor},
};
use serde::{Deserialize, Serialize};

use crate::{
    criterion::{Criterion, LossTarget},
    utils::flatten_channels,
};

/// Normalization applied to the raw network output before scoring.
///
/// Training-time outputs are un-normalized logits; Dice works on
/// probabilities. Sigmoid is the default because soft Dice is usually used on
/// binary or multi-label data; softmax yields a proper multi-class
/// distribution; `None` means the prediction is already normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Normalization {
    #[default]
    Sigmoid,
    Softmax,
    None,
}

impl Normalization {
    /// Applies the selected normalization over the channel axis.
    pub fn apply<B: Backend, const D: usize>(self, tensor: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Self::Sigmoid => activation::sigmoid(tensor),
            Self::Softmax => activation::softmax(tensor, 1),
            Self::None => tensor,
        }
    }
}

/// Computes the Dice coefficient for every channel of a multi-channel pair.
///
/// Assumes `input` holds normalized probabilities. The denominator is clamped
/// below by `epsilon` so a channel that is empty in both tensors produces a
/// defined value instead of NaN.
///
/// # Shapes
///
/// - input: `[batch_size, channels, ...spatial]`
/// - target: `[batch_size, channels, ...spatial]`
/// - weight: `[channels]`, optional per-channel scaling of the intersection
/// - output: `[channels]`
pub fn compute_per_channel_dice<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    target: Tensor<B, D>,
    epsilon: f64,
    weight: Option<Tensor<B, 1>>,
) -> Tensor<B, 1> {
    assert_eq!(
        input.dims(),
        target.dims(),
        "Shape of input ({:?}) must match target ({:?})",
        input.dims(),
        target.dims()
    );

    let input = flatten_channels(input);
    let target = flatten_channels(target);

    let mut intersect: Tensor<B, 1> = (input.clone() * target.clone()).sum_dim(1).squeeze(1);
    if let Some(weight) = weight {
        intersect = intersect * weight;
    }

    let denominator: Tensor<B, 1> = (input.clone() * input).sum_dim(1).squeeze(1)
        + (target.clone() * target).sum_dim(1).squeeze(1);

    (intersect / denominator.clamp_min(epsilon)).mul_scalar(2.0)
}

/// Configuration for creating a [Dice loss](DiceLoss).
#[derive(Config, Debug)]
pub struct DiceLossConfig {
    /// Small constant that keeps the denominator away from zero. Default: 1e-6
    #[config(default = 1e-6)]
    pub epsilon: f64,

    /// Optional per-class weights applied to the channel intersections.
    pub weight: Option<Vec<f32>>,

    /// Normalization applied to the raw prediction. Default: sigmoid
    #[config(default = "Normalization::Sigmoid")]
    pub normalization: Normalization,
}

impl DiceLossConfig {
    /// Initialize [Dice loss](DiceLoss).
    pub fn init<B: Backend>(&self, device: &B::Device) -> DiceLoss<B> {
        DiceLoss {
            epsilon: self.epsilon,
            weight: self
                .weight
                .as_ref()
                .map(|weight| Tensor::from_floats(weight.as_slice(), device)),
            normalization: Ignored(self.normalization),
        }
    }
}

/// Dice loss for binary and multi-class segmentation.
///
/// The input is assumed to be raw logits and is normalized according to the
/// configured [`Normalization`] before the per-channel Dice statistics are
/// computed. The final loss averages the Dice score over all channels.
#[derive(Module, Debug)]
#[module(custom_display)]
pub struct DiceLoss<B: Backend> {
    /// Small constant that keeps the denominator away from zero.
    pub epsilon: f64,
    /// Optional per-class weights.
    pub weight: Option<Tensor<B, 1>>,
    /// Normalization applied to the raw prediction.
    pub normalization: Ignored<Normalization>,
}

impl<B: Backend> ModuleDisplay for DiceLoss<B> {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content
            .add("epsilon", &self.epsilon)
            .add("weight", &self.weight)
            .optional()
    }
}

impl<B: Backend> DiceLoss<B> {
    /// Create a new Dice loss with default configuration.
    pub fn new(device: &B::Device) -> Self {
        DiceLossConfig::new().init(device)
    }

    /// Compute the criterion on the input tensor.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, channels, ...spatial]` raw logits
    /// - target: `[batch_size, channels, ...spatial]` dense (one-hot) target
    /// - output: `[1]`
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
        target: Tensor<B, D>,
    ) -> Tensor<B, 1> {
        let input = self.normalization.apply(input);
        let per_channel =
            compute_per_channel_dice(input, target, self.epsilon, self.weight.clone());

        let mean = per_channel.mean();
        Tensor::ones_like(&mean) - mean
    }
}

impl<B: Backend> Criterion<B> for DiceLoss<B> {
    fn forward(
        &self,
        input: Tensor<B, 5>,
        target: LossTarget<B>,
        _pixel_weights: Option<Tensor<B, 4>>,
    ) -> Tensor<B, 1> {
        DiceLoss::forward(self, input, target.into_one_hot("DiceLoss"))
    }
}
