//! Image-quality metrics for evaluating segmentation and reconstruction
//! models with the Burn deep learning framework.
//!
//! - **[`Ssim`]** / **[`Ssim3d`]**: structural similarity over image and
//!   volume batches, with Gaussian-window caching across calls
//! - **[`mae`]**: mean absolute error
//! - **[`psnr`]**: peak signal-to-noise ratio
//!
//! All metrics are backend-agnostic and return their score as a tensor, so
//! they can run on the training device without a host round-trip.

mod mae;
mod psnr;
mod ssim;
mod ssim3d;
mod window;

pub use mae::mae;
pub use psnr::psnr;
pub use ssim::{ssim, Ssim, SsimConfig};
pub use ssim3d::{ssim3d, Ssim3d, Ssim3dConfig};
pub use window::{create_window, create_window_3d, gaussian, WindowCache};
