//! Builds a boxed [`Criterion`] from a declarative description.
//!
//! Training configurations name their loss by the string used in the config
//! file; the factory resolves the name, applies the loss-specific options and
//! layers the ignore-masking and channel-skipping wrappers on top.

use std::str::FromStr;

use burn::{config::Config, tensor::backend::Backend};
use thiserror::Error;

use crate::{
    bce::BceWithLogitsLossConfig,
    bce_dice::BceDiceLossConfig,
    criterion::Criterion,
    cross_entropy::{CrossEntropyLossConfig, DEFAULT_IGNORE_INDEX},
    dice::{DiceLossConfig, Normalization},
    generalized_dice::GeneralizedDiceLossConfig,
    pixel_cross_entropy::PixelWiseCrossEntropyLossConfig,
    regression::{L1Loss, SmoothL1Loss, WeightedSmoothL1LossConfig},
    soft_dice::SoftDiceLossConfig,
    weighted_cross_entropy::WeightedCrossEntropyLossConfig,
    wrappers::{MaskingLossWrapper, SkipLastTargetChannelWrapper},
};

/// Errors raised while resolving a [`LossSpec`].
#[derive(Debug, Error)]
pub enum LossConfigError {
    #[error("unsupported loss function: '{0}'")]
    UnsupportedLoss(String),

    #[error("loss '{loss}' requires the '{option}' option")]
    MissingOption { loss: String, option: &'static str },
}

/// Every loss the factory can build, keyed by its configuration name.
///
/// `"SoftDiceLoss"` extends the conventional name set so the per-sample
/// Dice variant is reachable from configuration files as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossName {
    BceWithLogits,
    BceDice,
    CrossEntropy,
    WeightedCrossEntropy,
    PixelWiseCrossEntropy,
    GeneralizedDice,
    Dice,
    SoftDice,
    Mse,
    SmoothL1,
    L1,
    WeightedSmoothL1,
}

impl FromStr for LossName {
    type Err = LossConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "BCEWithLogitsLoss" => Ok(Self::BceWithLogits),
            "BCEDiceLoss" => Ok(Self::BceDice),
            "CrossEntropyLoss" => Ok(Self::CrossEntropy),
            "WeightedCrossEntropyLoss" => Ok(Self::WeightedCrossEntropy),
            "PixelWiseCrossEntropyLoss" => Ok(Self::PixelWiseCrossEntropy),
            "GeneralizedDiceLoss" => Ok(Self::GeneralizedDice),
            "DiceLoss" => Ok(Self::Dice),
            "SoftDiceLoss" => Ok(Self::SoftDice),
            "MSELoss" => Ok(Self::Mse),
            "SmoothL1Loss" => Ok(Self::SmoothL1),
            "L1Loss" => Ok(Self::L1),
            "WeightedSmoothL1Loss" => Ok(Self::WeightedSmoothL1),
            _ => Err(LossConfigError::UnsupportedLoss(name.to_owned())),
        }
    }
}

impl LossName {
    /// Losses that consume the ignore index themselves instead of relying on
    /// the masking wrapper.
    fn natively_ignores(self) -> bool {
        matches!(
            self,
            Self::CrossEntropy | Self::WeightedCrossEntropy | Self::PixelWiseCrossEntropy
        )
    }
}

/// Declarative description of a loss, typically deserialized from the
/// training configuration.
#[derive(Config, Debug)]
pub struct LossSpec {
    /// Configuration name of the loss, e.g. `"DiceLoss"`.
    pub name: String,

    /// Target value excluded from the loss, either natively or through the
    /// masking wrapper.
    pub ignore_index: Option<i64>,

    /// Drop the last target channel before the loss sees it. Default: false
    #[config(default = false)]
    pub skip_last_target: bool,

    /// With `skip_last_target`, convert the remaining singleton channel to
    /// class labels. Default: false
    #[config(default = false)]
    pub squeeze_channel: bool,

    /// Per-class weights for the Dice and cross-entropy families.
    pub weight: Option<Vec<f32>>,

    /// Positive-class weight for `BCEWithLogitsLoss`.
    pub pos_weight: Option<f64>,

    /// BCE term weight for `BCEDiceLoss`. Default: 1.0
    #[config(default = 1.0)]
    pub alpha: f64,

    /// Dice term weight for `BCEDiceLoss`. Default: 1.0
    #[config(default = 1.0)]
    pub beta: f64,

    /// Normalization for the Dice family. Default: sigmoid
    #[config(default = "Normalization::Sigmoid")]
    pub normalization: Normalization,

    /// Threshold for `WeightedSmoothL1Loss`.
    pub threshold: Option<f64>,

    /// Region multiplier for `WeightedSmoothL1Loss`.
    pub initial_weight: Option<f64>,

    /// Region selector for `WeightedSmoothL1Loss`. Default: true
    #[config(default = true)]
    pub apply_below_threshold: bool,
}

impl LossSpec {
    fn require(&self, option: &'static str, value: Option<f64>) -> Result<f64, LossConfigError> {
        value.ok_or_else(|| LossConfigError::MissingOption {
            loss: self.name.clone(),
            option,
        })
    }
}

/// Build the loss described by `spec` on the given device.
///
/// When `ignore_index` is set and the loss has no native support for it, the
/// loss is wrapped in a [`MaskingLossWrapper`]; `skip_last_target` adds a
/// [`SkipLastTargetChannelWrapper`] as the outermost layer.
pub fn create_loss<B: Backend>(
    spec: &LossSpec,
    device: &B::Device,
) -> Result<Box<dyn Criterion<B>>, LossConfigError> {
    let name = LossName::from_str(&spec.name)?;
    let ignore_index = spec.ignore_index;

    let mut loss: Box<dyn Criterion<B>> = match name {
        LossName::BceWithLogits => Box::new(
            BceWithLogitsLossConfig::new()
                .with_pos_weight(spec.pos_weight)
                .init(),
        ),
        LossName::BceDice => Box::new(
            BceDiceLossConfig::new()
                .with_alpha(spec.alpha)
                .with_beta(spec.beta)
                .init(device),
        ),
        LossName::CrossEntropy => Box::new(
            CrossEntropyLossConfig::new()
                .with_weights(spec.weight.clone())
                .with_ignore_index(ignore_index.unwrap_or(DEFAULT_IGNORE_INDEX))
                .init(device),
        ),
        LossName::WeightedCrossEntropy => Box::new(
            WeightedCrossEntropyLossConfig::new()
                .with_ignore_index(ignore_index.unwrap_or(DEFAULT_IGNORE_INDEX))
                .init(),
        ),
        LossName::PixelWiseCrossEntropy => Box::new(
            PixelWiseCrossEntropyLossConfig::new()
                .with_ignore_index(ignore_index)
                .init(),
        ),
        LossName::GeneralizedDice => Box::new(
            GeneralizedDiceLossConfig::new()
                .with_normalization(spec.normalization)
                .init(),
        ),
        LossName::Dice => Box::new(
            DiceLossConfig::new()
                .with_weight(spec.weight.clone())
                .with_normalization(spec.normalization)
                .init(device),
        ),
        LossName::SoftDice => Box::new(SoftDiceLossConfig::new().init()),
        LossName::Mse => Box::new(burn::nn::loss::MseLoss::new()),
        LossName::SmoothL1 => Box::new(SmoothL1Loss::new()),
        LossName::L1 => Box::new(L1Loss::new()),
        LossName::WeightedSmoothL1 => Box::new(
            WeightedSmoothL1LossConfig::new(
                spec.require("threshold", spec.threshold)?,
                spec.require("initial_weight", spec.initial_weight)?,
            )
            .with_apply_below_threshold(spec.apply_below_threshold)
            .init(),
        ),
    };

    if let Some(ignore_index) = ignore_index {
        if !name.natively_ignores() {
            loss = Box::new(MaskingLossWrapper::new(loss, ignore_index));
        }
    }

    if spec.skip_last_target {
        loss = Box::new(SkipLastTargetChannelWrapper::new(
            loss,
            spec.squeeze_channel,
        ));
    }

    Ok(loss)
}
