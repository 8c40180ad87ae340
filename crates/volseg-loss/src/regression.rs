//! Regression criteria: L1, smooth L1 and a target-thresholded variant.

use burn::{
    config::Config,
    module::Module,
    nn::loss::{MseLoss, Reduction},
    tensor::{backend::Backend, Tensor},
};

use crate::criterion::{Criterion, LossTarget};

/// Element-wise smooth L1 (Huber with delta 1): quadratic inside the unit
/// interval, linear outside.
///
/// ```text
/// l(d) = 0.5 * d²     if |d| < 1
///        |d| - 0.5    otherwise
/// ```
pub fn smooth_l1<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    target: Tensor<B, D>,
) -> Tensor<B, D> {
    let diff = input - target;
    let abs = diff.clone().abs();

    let quadratic = (diff.clone() * diff).mul_scalar(0.5);
    let linear = abs.clone().sub_scalar(0.5);

    linear.mask_where(abs.lower_elem(1.0), quadratic)
}

/// Mean smooth L1 loss.
#[derive(Module, Clone, Debug, Default)]
pub struct SmoothL1Loss {}

impl SmoothL1Loss {
    /// Create a new smooth L1 loss.
    pub fn new() -> Self {
        Self {}
    }

    /// Compute the criterion on the input tensor.
    ///
    /// # Shapes
    ///
    /// - input: `[...dims]`
    /// - target: `[...dims]`
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
        smooth_l1(input, target).mean()
    }
}

impl<B: Backend> Criterion<B> for SmoothL1Loss {
    fn forward(
        &self,
        input: Tensor<B, 5>,
        target: LossTarget<B>,
        _pixel_weights: Option<Tensor<B, 4>>,
    ) -> Tensor<B, 1> {
        SmoothL1Loss::forward(self, input, target.into_one_hot("SmoothL1Loss"))
    }
}

/// Mean absolute error.
#[derive(Module, Clone, Debug, Default)]
pub struct L1Loss {}

impl L1Loss {
    /// Create a new L1 loss.
    pub fn new() -> Self {
        Self {}
    }

    /// Compute the criterion on the input tensor.
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
        (input - target).abs().mean()
    }
}

impl<B: Backend> Criterion<B> for L1Loss {
    fn forward(
        &self,
        input: Tensor<B, 5>,
        target: LossTarget<B>,
        _pixel_weights: Option<Tensor<B, 4>>,
    ) -> Tensor<B, 1> {
        L1Loss::forward(self, input, target.into_one_hot("L1Loss"))
    }
}

impl<B: Backend> Criterion<B> for MseLoss {
    fn forward(
        &self,
        input: Tensor<B, 5>,
        target: LossTarget<B>,
        _pixel_weights: Option<Tensor<B, 4>>,
    ) -> Tensor<B, 1> {
        MseLoss::forward(
            self,
            input,
            target.into_one_hot("MSELoss"),
            Reduction::Mean,
        )
    }
}

/// Configuration for creating a
/// [weighted smooth L1 loss](WeightedSmoothL1Loss).
#[derive(Config, Debug)]
pub struct WeightedSmoothL1LossConfig {
    /// Target value separating the re-weighted region from the rest.
    pub threshold: f64,

    /// Multiplier applied to the selected region.
    pub weight: f64,

    /// When true the region below the threshold is re-weighted, otherwise
    /// the region at or above it. Default: true
    #[config(default = true)]
    pub apply_below_threshold: bool,
}

impl WeightedSmoothL1LossConfig {
    /// Initialize [weighted smooth L1 loss](WeightedSmoothL1Loss).
    pub fn init(&self) -> WeightedSmoothL1Loss {
        WeightedSmoothL1Loss {
            threshold: self.threshold,
            weight: self.weight,
            apply_below_threshold: self.apply_below_threshold,
        }
    }
}

/// Smooth L1 where one side of a target threshold is rescaled.
///
/// Typical use is regression against sparse maps where most of the target is
/// background close to some floor value: down-weighting the region below the
/// threshold keeps the scarce foreground from being drowned out.
#[derive(Module, Clone, Debug)]
pub struct WeightedSmoothL1Loss {
    /// Target value separating the re-weighted region from the rest.
    pub threshold: f64,
    /// Multiplier applied to the selected region.
    pub weight: f64,
    /// Selects which side of the threshold is re-weighted.
    pub apply_below_threshold: bool,
}

impl WeightedSmoothL1Loss {
    /// Compute the criterion on the input tensor.
    ///
    /// # Shapes
    ///
    /// - input: `[...dims]`
    /// - target: `[...dims]`
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

        let loss = smooth_l1(input, target.clone());

        let region = if self.apply_below_threshold {
            target.lower_elem(self.threshold)
        } else {
            target.greater_equal_elem(self.threshold)
        };

        loss.clone()
            .mask_where(region, loss.mul_scalar(self.weight))
            .mean()
    }
}

impl<B: Backend> Criterion<B> for WeightedSmoothL1Loss {
    fn forward(
        &self,
        input: Tensor<B, 5>,
        target: LossTarget<B>,
        _pixel_weights: Option<Tensor<B, 4>>,
    ) -> Tensor<B, 1> {
        WeightedSmoothL1Loss::forward(self, input, target.into_one_hot("WeightedSmoothL1Loss"))
    }
}
