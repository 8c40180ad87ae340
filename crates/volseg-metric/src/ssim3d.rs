//! Structural Similarity Index over 3D volumes.

use burn::{
    config::Config,
    tensor::{backend::Backend, module::conv3d, ops::ConvOptions, Tensor},
};

use crate::{
    ssim::{C1, C2},
    window::{create_window_3d, WindowCache},
};

/// Configuration for creating a [volumetric SSIM metric](Ssim3d).
#[derive(Config, Debug)]
pub struct Ssim3dConfig {
    /// Side length of the Gaussian window. Default: 11
    #[config(default = 11)]
    pub window_size: usize,

    /// Standard deviation of the Gaussian window. Default: 1.5
    #[config(default = 1.5)]
    pub sigma: f32,

    /// Average the similarity map into one scalar; otherwise one value per
    /// batch sample is returned. Default: true
    #[config(default = true)]
    pub size_average: bool,
}

impl Ssim3dConfig {
    /// Initialize a [volumetric SSIM metric](Ssim3d).
    pub fn init<B: Backend>(&self) -> Ssim3d<B> {
        Ssim3d {
            window_size: self.window_size,
            sigma: self.sigma,
            size_average: self.size_average,
            cache: WindowCache::new(),
        }
    }
}

/// SSIM over `[batch, channel, depth, height, width]` volumes, with the same
/// window caching as the 2D metric.
#[derive(Debug)]
pub struct Ssim3d<B: Backend> {
    /// Side length of the Gaussian window.
    pub window_size: usize,
    /// Standard deviation of the Gaussian window.
    pub sigma: f32,
    /// Collapse the similarity map into one scalar.
    pub size_average: bool,
    cache: WindowCache<B, 5>,
}

impl<B: Backend> Default for Ssim3d<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Ssim3d<B> {
    /// Create a new volumetric SSIM metric with default configuration.
    pub fn new() -> Self {
        Ssim3dConfig::new().init()
    }

    /// Compute the similarity between two volume batches.
    ///
    /// # Shapes
    ///
    /// - vol1: `[batch_size, channels, depth, height, width]`
    /// - vol2: `[batch_size, channels, depth, height, width]`
    /// - output: `[1]`, or `[batch_size]` when `size_average` is off
    pub fn forward(&mut self, vol1: Tensor<B, 5>, vol2: Tensor<B, 5>) -> Tensor<B, 1> {
        assert_eq!(
            vol1.dims(),
            vol2.dims(),
            "Shape of vol1 ({:?}) must match vol2 ({:?})",
            vol1.dims(),
            vol2.dims()
        );

        let [batch_size, channels, _, _, _] = vol1.dims();
        let device = vol1.device();
        let (window_size, sigma) = (self.window_size, self.sigma);

        let window = self.cache.fetch(channels, vol1.dtype(), &device, || {
            create_window_3d(window_size, sigma, channels, &device)
        });

        let map = ssim3d_map(vol1, vol2, window, window_size, channels);

        if self.size_average {
            map.mean()
        } else {
            map.reshape([batch_size as i32, -1]).mean_dim(1).squeeze(1)
        }
    }
}

/// One-shot volumetric SSIM with a freshly built window, averaged to a
/// scalar.
pub fn ssim3d<B: Backend>(
    vol1: Tensor<B, 5>,
    vol2: Tensor<B, 5>,
    window_size: usize,
) -> Tensor<B, 1> {
    let [_, channels, _, _, _] = vol1.dims();
    let window = create_window_3d(window_size, 1.5, channels, &vol1.device());
    ssim3d_map(vol1, vol2, window, window_size, channels).mean()
}

fn ssim3d_map<B: Backend>(
    vol1: Tensor<B, 5>,
    vol2: Tensor<B, 5>,
    window: Tensor<B, 5>,
    window_size: usize,
    channels: usize,
) -> Tensor<B, 5> {
    let padding = window_size / 2;
    let options = ConvOptions::new(
        [1, 1, 1],
        [padding, padding, padding],
        [1, 1, 1],
        channels,
    );
    let filter = |x: Tensor<B, 5>| conv3d(x, window.clone(), None, options.clone());

    let mu1 = filter(vol1.clone());
    let mu2 = filter(vol2.clone());

    let mu1_sq = mu1.clone().powi_scalar(2);
    let mu2_sq = mu2.clone().powi_scalar(2);
    let mu1_mu2 = mu1 * mu2;

    let sigma1_sq = filter(vol1.clone().powi_scalar(2)) - mu1_sq.clone();
    let sigma2_sq = filter(vol2.clone().powi_scalar(2)) - mu2_sq.clone();
    let sigma12 = filter(vol1 * vol2) - mu1_mu2.clone();

    let numerator = mu1_mu2.mul_scalar(2.0).add_scalar(C1)
        * sigma12.mul_scalar(2.0).add_scalar(C2);
    let denominator = (mu1_sq + mu2_sq).add_scalar(C1)
        * (sigma1_sq + sigma2_sq).add_scalar(C2);

    numerator / denominator
}
