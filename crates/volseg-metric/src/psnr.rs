//! Peak signal-to-noise ratio.

use std::f64::consts::LN_10;

use burn::tensor::{backend::Backend, Tensor};

/// Peak signal-to-noise ratio in decibels,
/// `10 * log10(max_value² / mse)`.
///
/// Identical tensors have zero error and produce an infinite ratio, so
/// callers comparing reconstructions should expect large finite values for
/// near-matches.
///
/// # Shapes
///
/// - input: `[...dims]`
/// - target: `[...dims]`
/// - output: `[1]`
pub fn psnr<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    target: Tensor<B, D>,
    max_value: f64,
) -> Tensor<B, 1> {
    assert_eq!(
        input.dims(),
        target.dims(),
        "Shape of input ({:?}) must match target ({:?})",
        input.dims(),
        target.dims()
    );

    let diff = input - target;
    let mse = (diff.clone() * diff).mean();

    (mse.recip().mul_scalar(max_value * max_value))
        .log()
        .div_scalar(LN_10)
        .mul_scalar(10.0)
}

#[cfg(test)]
mod tests {
    use burn::tensor::cast::ToElement;

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn known_error_gives_the_closed_form_ratio() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 1>::from_floats([0.5, 0.5], &device);
        let target = Tensor::<TestBackend, 1>::from_floats([0.0, 0.0], &device);

        // mse = 0.25, max = 1.0: psnr = 10 * log10(4) ≈ 6.0206
        let result = psnr(input, target, 1.0).into_scalar().to_f64();

        assert!((result - 4.0_f64.log10() * 10.0).abs() < 1e-4, "got {result}");
    }

    #[test]
    fn larger_range_raises_the_ratio() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 1>::from_floats([0.5, 0.5], &device);
        let target = Tensor::<TestBackend, 1>::from_floats([0.0, 0.0], &device);

        let unit = psnr(input.clone(), target.clone(), 1.0).into_scalar().to_f64();
        let wide = psnr(input, target, 255.0).into_scalar().to_f64();

        assert!(wide > unit);
    }
}
