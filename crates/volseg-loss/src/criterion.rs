//! The composition seam shared by the loss factory and the loss wrappers.

use burn::tensor::{backend::Backend, Int, Tensor};

/// Ground-truth flavor accepted by a [`Criterion`].
///
/// Each loss declares which flavor it expects and fails loudly when handed
/// the other, so dense one-hot tensors and integer label maps are never
/// silently mixed.
#[derive(Debug, Clone)]
pub enum LossTarget<B: Backend> {
    /// Dense target shaped like the prediction, `[batch, classes, depth, height, width]`.
    OneHot(Tensor<B, 5>),
    /// Integer class indices without a channel axis, `[batch, depth, height, width]`.
    Labels(Tensor<B, 4, Int>),
}

impl<B: Backend> LossTarget<B> {
    /// Unwraps a dense target, panicking with the loss name otherwise.
    pub fn into_one_hot(self, loss: &str) -> Tensor<B, 5> {
        match self {
            Self::OneHot(target) => target,
            Self::Labels(_) => {
                panic!("{loss} requires a dense (one-hot) target, got class labels")
            }
        }
    }

    /// Unwraps a class-label target, panicking with the loss name otherwise.
    pub fn into_labels(self, loss: &str) -> Tensor<B, 4, Int> {
        match self {
            Self::Labels(target) => target,
            Self::OneHot(_) => {
                panic!("{loss} requires a class-label target, got a dense tensor")
            }
        }
    }
}

/// Object-safe forward contract for factory-built volumetric losses.
///
/// `pixel_weights` is consumed only by losses that support per-pixel
/// weighting; wrappers forward it unchanged and every other loss ignores it.
pub trait Criterion<B: Backend> {
    fn forward(
        &self,
        input: Tensor<B, 5>,
        target: LossTarget<B>,
        pixel_weights: Option<Tensor<B, 4>>,
    ) -> Tensor<B, 1>;
}

impl<B: Backend, T: Criterion<B> + ?Sized> Criterion<B> for Box<T> {
    fn forward(
        &self,
        input: Tensor<B, 5>,
        target: LossTarget<B>,
        pixel_weights: Option<Tensor<B, 4>>,
    ) -> Tensor<B, 1> {
        (**self).forward(input, target, pixel_weights)
    }
}
