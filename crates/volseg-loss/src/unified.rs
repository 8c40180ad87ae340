//! Combined criterion for multi-class volumetric segmentation.
//!
//! Blends three complementary terms:
//! - weighted cross-entropy over class labels for per-voxel calibration,
//! - class-weighted Dice over the softmaxed prediction for region overlap,
//! - an L1 penalty between Laplacian edge maps of prediction and ground
//!   truth, sharpening structure boundaries.

use std::collections::HashMap;

use burn::{
    config::Config,
    module::Module,
    tensor::{
        activation,
        backend::Backend,
        cast::ToElement,
        module::conv3d,
        ops::ConvOptions,
        Int, Tensor,
    },
};

use crate::{
    dice::{DiceLoss, DiceLossConfig, Normalization},
    weighted_cross_entropy::WeightedCrossEntropyLoss,
};

/// Configuration for creating a
/// [unified segmentation loss](UnifiedSegmentationLoss).
#[derive(Config, Debug)]
pub struct UnifiedSegmentationLossConfig {
    /// Weight of the cross-entropy term. Default: 2.0
    #[config(default = 2.0)]
    pub ce_weight: f64,

    /// Weight of the Dice term. Default: 1.0
    #[config(default = 1.0)]
    pub dice_weight: f64,

    /// Weight of the Laplacian edge term. Default: 5.0
    #[config(default = 5.0)]
    pub edge_weight: f64,

    /// Per-class weights for the Dice term, background suppressed and the
    /// foreground classes upweighted. The length fixes the number of classes.
    #[config(default = "vec![0.001, 10.0, 100.0]")]
    pub class_weights: Vec<f32>,
}

impl UnifiedSegmentationLossConfig {
    /// Initialize [unified segmentation loss](UnifiedSegmentationLoss).
    pub fn init<B: Backend>(&self, device: &B::Device) -> UnifiedSegmentationLoss<B> {
        assert!(
            !self.class_weights.is_empty(),
            "UnifiedSegmentationLoss requires at least one class weight"
        );

        let num_classes = self.class_weights.len();
        let class_weights = Tensor::from_floats(self.class_weights.as_slice(), device);

        let mut dice = DiceLossConfig::new()
            .with_normalization(Normalization::Softmax)
            .init(device);
        dice.weight = Some(class_weights);

        UnifiedSegmentationLoss {
            ce_weight: self.ce_weight,
            dice_weight: self.dice_weight,
            edge_weight: self.edge_weight,
            num_classes,
            cross_entropy: WeightedCrossEntropyLoss::new(),
            dice,
            laplacian_kernel: build_laplacian_kernel(num_classes, device),
        }
    }
}

/// Depthwise 3x3x3 Laplacian: every neighbor weighs -1 against a center of
/// 26, one filter per class so channels do not mix.
fn build_laplacian_kernel<B: Backend>(num_classes: usize, device: &B::Device) -> Tensor<B, 5> {
    let mut values = [-1.0f32; 27];
    values[13] = 26.0;

    Tensor::<B, 1>::from_floats(values, device)
        .reshape([1, 1, 3, 3, 3])
        .repeat(&[num_classes, 1, 1, 1, 1])
}

/// Weighted sum of cross-entropy, Dice and Laplacian edge agreement.
#[derive(Module, Debug)]
pub struct UnifiedSegmentationLoss<B: Backend> {
    /// Weight of the cross-entropy term.
    pub ce_weight: f64,
    /// Weight of the Dice term.
    pub dice_weight: f64,
    /// Weight of the Laplacian edge term.
    pub edge_weight: f64,
    /// Number of segmentation classes.
    pub num_classes: usize,
    cross_entropy: WeightedCrossEntropyLoss,
    dice: DiceLoss<B>,
    laplacian_kernel: Tensor<B, 5>,
}

impl<B: Backend> UnifiedSegmentationLoss<B> {
    /// Create a new unified loss with default term weights.
    pub fn new(device: &B::Device) -> Self {
        UnifiedSegmentationLossConfig::new().init(device)
    }

    /// Compute the total loss together with the unweighted per-term values.
    ///
    /// The diagnostics map carries the `ce`, `dice` and `edge` terms before
    /// their weights are applied, convenient for progress logging.
    ///
    /// # Shapes
    ///
    /// - prediction: `[batch_size, classes, depth, height, width]` raw logits
    /// - target: `[batch_size, depth, height, width]` integer class indices
    /// - target_one_hot: `[batch_size, classes, depth, height, width]`
    /// - output: scalar total, map of per-term scalars
    pub fn forward(
        &self,
        prediction: Tensor<B, 5>,
        target: Tensor<B, 4, Int>,
        target_one_hot: Tensor<B, 5>,
    ) -> (Tensor<B, 1>, HashMap<String, f64>) {
        assert_eq!(
            prediction.dims()[1],
            self.num_classes,
            "Prediction has {} channels, loss is configured for {} classes",
            prediction.dims()[1],
            self.num_classes
        );
        assert_eq!(
            prediction.dims(),
            target_one_hot.dims(),
            "Shape of prediction ({:?}) must match one-hot target ({:?})",
            prediction.dims(),
            target_one_hot.dims()
        );

        let ce = self.cross_entropy.forward(prediction.clone(), target);
        let dice = self.dice.forward(prediction.clone(), target_one_hot.clone());

        let probabilities = activation::softmax(prediction, 1);
        let predicted_edges = self.edge_map(probabilities);
        let target_edges = self.edge_map(target_one_hot);
        let edge = (predicted_edges - target_edges).abs().mean();

        let total = ce.clone().mul_scalar(self.ce_weight)
            + dice.clone().mul_scalar(self.dice_weight)
            + edge.clone().mul_scalar(self.edge_weight);

        let diagnostics = HashMap::from([
            ("ce".to_owned(), ce.into_scalar().to_f64()),
            ("dice".to_owned(), dice.into_scalar().to_f64()),
            ("edge".to_owned(), edge.into_scalar().to_f64()),
        ]);

        (total, diagnostics)
    }

    fn edge_map(&self, volume: Tensor<B, 5>) -> Tensor<B, 5> {
        let kernel = self.laplacian_kernel.clone().to_device(&volume.device());
        conv3d(
            volume,
            kernel,
            None,
            ConvOptions::new([1, 1, 1], [1, 1, 1], [1, 1, 1], self.num_classes),
        )
    }
}
