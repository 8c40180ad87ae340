//! Structural Similarity Index (SSIM) over 2D images.

use burn::{
    config::Config,
    tensor::{backend::Backend, module::conv2d, ops::ConvOptions, Tensor},
};

use crate::window::{create_window, WindowCache};

pub(crate) const C1: f32 = 0.01 * 0.01;
pub(crate) const C2: f32 = 0.03 * 0.03;

/// Configuration for creating an [SSIM metric](Ssim).
#[derive(Config, Debug)]
pub struct SsimConfig {
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

impl SsimConfig {
    /// Initialize an [SSIM metric](Ssim).
    pub fn init<B: Backend>(&self) -> Ssim<B> {
        Ssim {
            window_size: self.window_size,
            sigma: self.sigma,
            size_average: self.size_average,
            cache: WindowCache::new(),
        }
    }
}

/// Stateful SSIM evaluator that reuses its Gaussian window across calls.
///
/// During validation the same metric instance scores every batch of an
/// epoch; caching the filter avoids rebuilding it per image.
#[derive(Debug)]
pub struct Ssim<B: Backend> {
    /// Side length of the Gaussian window.
    pub window_size: usize,
    /// Standard deviation of the Gaussian window.
    pub sigma: f32,
    /// Collapse the similarity map into one scalar.
    pub size_average: bool,
    cache: WindowCache<B, 4>,
}

impl<B: Backend> Default for Ssim<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Ssim<B> {
    /// Create a new SSIM metric with default configuration.
    pub fn new() -> Self {
        SsimConfig::new().init()
    }

    /// Compute the similarity between two image batches.
    ///
    /// # Shapes
    ///
    /// - img1: `[batch_size, channels, height, width]`
    /// - img2: `[batch_size, channels, height, width]`
    /// - output: `[1]`, or `[batch_size]` when `size_average` is off
    pub fn forward(&mut self, img1: Tensor<B, 4>, img2: Tensor<B, 4>) -> Tensor<B, 1> {
        assert_eq!(
            img1.dims(),
            img2.dims(),
            "Shape of img1 ({:?}) must match img2 ({:?})",
            img1.dims(),
            img2.dims()
        );

        let [batch_size, channels, _, _] = img1.dims();
        let device = img1.device();
        let (window_size, sigma) = (self.window_size, self.sigma);

        let window = self.cache.fetch(channels, img1.dtype(), &device, || {
            create_window(window_size, sigma, channels, &device)
        });

        let map = ssim_map(img1, img2, window, window_size, channels);

        if self.size_average {
            map.mean()
        } else {
            map.reshape([batch_size as i32, -1]).mean_dim(1).squeeze(1)
        }
    }
}

/// One-shot SSIM with a freshly built window, averaged to a scalar.
pub fn ssim<B: Backend>(
    img1: Tensor<B, 4>,
    img2: Tensor<B, 4>,
    window_size: usize,
) -> Tensor<B, 1> {
    let [_, channels, _, _] = img1.dims();
    let window = create_window(window_size, 1.5, channels, &img1.device());
    ssim_map(img1, img2, window, window_size, channels).mean()
}

fn ssim_map<B: Backend>(
    img1: Tensor<B, 4>,
    img2: Tensor<B, 4>,
    window: Tensor<B, 4>,
    window_size: usize,
    channels: usize,
) -> Tensor<B, 4> {
    let padding = window_size / 2;
    let options = ConvOptions::new([1, 1], [padding, padding], [1, 1], channels);
    let filter = |x: Tensor<B, 4>| conv2d(x, window.clone(), None, options.clone());

    let mu1 = filter(img1.clone());
    let mu2 = filter(img2.clone());

    let mu1_sq = mu1.clone().powi_scalar(2);
    let mu2_sq = mu2.clone().powi_scalar(2);
    let mu1_mu2 = mu1 * mu2;

    let sigma1_sq = filter(img1.clone().powi_scalar(2)) - mu1_sq.clone();
    let sigma2_sq = filter(img2.clone().powi_scalar(2)) - mu2_sq.clone();
    let sigma12 = filter(img1 * img2) - mu1_mu2.clone();

    let numerator = mu1_mu2.mul_scalar(2.0).add_scalar(C1)
        * sigma12.mul_scalar(2.0).add_scalar(C2);
    let denominator = (mu1_sq + mu2_sq).add_scalar(C1)
        * (sigma1_sq + sigma2_sq).add_scalar(C2);

    numerator / denominator
}

#[cfg(test)]
mod tests {
    use burn::tensor::{cast::ToElement, Distribution};

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn identical_images_score_one() {
        let device = Default::default();
        let mut metric = Ssim::<TestBackend>::new();

        let image = Tensor::random([1, 1, 16, 16], Distribution::Uniform(0.0, 1.0), &device);

        let score = metric
            .forward(image.clone(), image)
            .into_scalar()
            .to_f64();

        assert!((score - 1.0).abs() < 1e-4, "got {score}");
    }

    #[test]
    fn unrelated_images_score_below_identical_ones() {
        let device = Default::default();
        let mut metric = Ssim::<TestBackend>::new();

        let image = Tensor::random([1, 1, 16, 16], Distribution::Uniform(0.0, 1.0), &device);
        let noise = Tensor::random([1, 1, 16, 16], Distribution::Uniform(0.0, 1.0), &device);

        let score = metric.forward(image, noise).into_scalar().to_f64();

        assert!(score < 0.99, "got {score}");
        assert!(score >= -1.0);
    }

    #[test]
    fn per_sample_scores_keep_the_batch_axis() {
        let device = Default::default();
        let mut metric = SsimConfig::new()
            .with_size_average(false)
            .init::<TestBackend>();

        let images =
            Tensor::random([3, 2, 16, 16], Distribution::Uniform(0.0, 1.0), &device);

        let scores = metric.forward(images.clone(), images);

        assert_eq!(scores.dims(), [3]);
        for score in scores.into_data().as_slice::<f32>().unwrap() {
            assert!((score - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn functional_form_agrees_with_the_stateful_metric() {
        let device = Default::default();
        let mut metric = Ssim::<TestBackend>::new();

        let a = Tensor::random([1, 1, 16, 16], Distribution::Uniform(0.0, 1.0), &device);
        let b = Tensor::random([1, 1, 16, 16], Distribution::Uniform(0.0, 1.0), &device);

        let stateful = metric.forward(a.clone(), b.clone()).into_scalar().to_f64();
        let functional = ssim(a, b, 11).into_scalar().to_f64();

        assert!((stateful - functional).abs() < 1e-6);
    }
}
