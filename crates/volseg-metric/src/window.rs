//! Gaussian windows for the structural-similarity metrics.

use burn::tensor::{backend::Backend, DType, Tensor};

/// Normalized 1D Gaussian of the given width.
pub fn gaussian(window_size: usize, sigma: f32) -> Vec<f32> {
    let mean = (window_size / 2) as i32;

    let mut values = vec![0.0; window_size];
    let mut sum = 0.0;
    for (i, value) in values.iter_mut().enumerate() {
        let x = i as i32 - mean;
        *value = (-(x * x) as f32 / (2.0 * sigma * sigma)).exp();
        sum += *value;
    }
    for value in &mut values {
        *value /= sum;
    }

    values
}

/// Builds a `[channels, 1, size, size]` depthwise Gaussian filter as the
/// outer product of the 1D window with itself.
pub fn create_window<B: Backend>(
    window_size: usize,
    sigma: f32,
    channels: usize,
    device: &B::Device,
) -> Tensor<B, 4> {
    let window_1d =
        Tensor::<B, 1>::from_floats(gaussian(window_size, sigma).as_slice(), device).unsqueeze::<2>();
    let window_2d = window_1d.clone().transpose().matmul(window_1d);

    window_2d
        .unsqueeze::<4>()
        .repeat(&[channels, 1, 1, 1])
}

/// Builds a `[channels, 1, size, size, size]` depthwise Gaussian filter by
/// extruding the 2D window along the depth axis.
pub fn create_window_3d<B: Backend>(
    window_size: usize,
    sigma: f32,
    channels: usize,
    device: &B::Device,
) -> Tensor<B, 5> {
    let size = window_size as i32;
    let window_1d =
        Tensor::<B, 1>::from_floats(gaussian(window_size, sigma).as_slice(), device).unsqueeze::<2>();
    let window_2d = window_1d.clone().transpose().matmul(window_1d.clone());

    // outer product of the 1D window with the flattened 2D window gives the
    // separable 3D kernel
    let window_3d = window_1d
        .transpose()
        .matmul(window_2d.reshape([1, size * size]))
        .reshape([size, size, size]);

    window_3d
        .unsqueeze::<5>()
        .repeat(&[channels, 1, 1, 1, 1])
}

/// Caches the most recent filter so repeated metric evaluations over a
/// stream of same-shaped batches do not rebuild it.
///
/// The cache is invalidated when the channel count or the float precision of
/// the incoming batch changes; device moves reuse the cached values.
#[derive(Debug, Default)]
pub struct WindowCache<B: Backend, const D: usize> {
    entry: Option<(usize, DType, Tensor<B, D>)>,
    generation: u64,
}

impl<B: Backend, const D: usize> WindowCache<B, D> {
    pub fn new() -> Self {
        Self {
            entry: None,
            generation: 0,
        }
    }

    /// Number of times the window has been (re)built.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the cached window for `(channels, dtype)`, building it with
    /// `build` on a miss.
    pub fn fetch(
        &mut self,
        channels: usize,
        dtype: DType,
        device: &B::Device,
        build: impl FnOnce() -> Tensor<B, D>,
    ) -> Tensor<B, D> {
        match &self.entry {
            Some((cached_channels, cached_dtype, window))
                if *cached_channels == channels && *cached_dtype == dtype =>
            {
                window.clone().to_device(device)
            }
            _ => {
                let window = build().cast(dtype);
                self.entry = Some((channels, dtype, window.clone()));
                self.generation += 1;
                window
            }
        }
    }
}
