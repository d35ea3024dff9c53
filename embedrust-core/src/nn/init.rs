use crate::error::EmbedRustError;
use crate::tensor::Tensor;
use crate::types::DType;
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use rand_distr::Normal;

/// Fills the input `Tensor` with the scalar value 0.
///
/// Operates in-place.
pub fn zeros_(tensor: &mut Tensor) -> Result<(), EmbedRustError> {
    fill_with(tensor, "zeros_", || 0.0)
}

/// Fills the input `Tensor` with samples from `N(mean, std^2)`.
///
/// # Errors
/// `InvalidParameter` if `std` is negative or not finite.
pub fn normal_<R: Rng + ?Sized>(
    tensor: &mut Tensor,
    mean: f64,
    std: f64,
    rng: &mut R,
) -> Result<(), EmbedRustError> {
    let normal = Normal::new(mean, std).map_err(|e| EmbedRustError::InvalidParameter {
        operation: "normal_".to_string(),
        message: e.to_string(),
    })?;
    fill_with(tensor, "normal_", || normal.sample(rng))
}

/// Fills the input `Tensor` with samples from `U[low, high)`.
///
/// # Errors
/// `InvalidParameter` unless `low < high`.
pub fn uniform_<R: Rng + ?Sized>(
    tensor: &mut Tensor,
    low: f64,
    high: f64,
    rng: &mut R,
) -> Result<(), EmbedRustError> {
    if !(low < high) {
        return Err(EmbedRustError::InvalidParameter {
            operation: "uniform_".to_string(),
            message: format!("expected low < high, got [{}, {})", low, high),
        });
    }
    let uniform = Uniform::new(low, high);
    fill_with(tensor, "uniform_", || uniform.sample(rng))
}

/// Overwrites every element with a value drawn from `sample`.
fn fill_with<F>(tensor: &mut Tensor, operation: &str, mut sample: F) -> Result<(), EmbedRustError>
where
    F: FnMut() -> f64,
{
    let mut guard = tensor.write_data();

    // Leaf tensors that require grad are initialised before being wrapped.
    if guard.requires_grad && guard.grad_fn.is_none() {
        return Err(EmbedRustError::UnsupportedOperation(format!(
            "{}: cannot modify a leaf tensor that requires grad in place",
            operation
        )));
    }

    let dtype = guard.dtype;
    match dtype {
        DType::F32 => guard
            .data_mut::<f32>()?
            .iter_mut()
            .for_each(|x| *x = sample() as f32),
        DType::F64 => guard.data_mut::<f64>()?.iter_mut().for_each(|x| *x = sample()),
        other => {
            return Err(EmbedRustError::UnsupportedDataType {
                dtype: other,
                expected: "a floating-point type",
                operation: operation.to_string(),
            })
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "init_test.rs"]
mod tests;
