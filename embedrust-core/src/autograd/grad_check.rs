use crate::error::EmbedRustError;
use crate::tensor::Tensor;
use crate::types::DType;
use thiserror::Error;

/// Error type specifically for gradient checking failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradCheckError {
    #[error(
        "Gradient mismatch at input {input_index}, element {element_index}: \
         analytical {analytical_grad:?} != numerical {numerical_grad:?} (diff {difference:?})"
    )]
    GradientMismatch {
        input_index: usize,
        element_index: usize,
        analytical_grad: f64,
        numerical_grad: f64,
        difference: f64,
    },
    #[error("Forward function execution failed during gradient check: {0}")]
    ForwardPassError(EmbedRustError),
    #[error("Backward pass execution failed during gradient check: {0}")]
    BackwardPassError(EmbedRustError),
    #[error("Tensor error during intermediate calculation: {0}")]
    TensorError(EmbedRustError),
    #[error("Unsupported data type for gradient check: expected F32 or F64, got {0:?}")]
    UnsupportedDType(DType),
    #[error("Input tensor {input_index} requires grad but has no gradient after backward pass.")]
    MissingAnalyticalGrad { input_index: usize },
    #[error("Gradient check input {input_index} must be a leaf tensor (no grad_fn)")]
    InputNotLeaf { input_index: usize },
    #[error("Function did not propagate requires_grad correctly.")]
    RequiresGradPropagationError,
}

impl From<EmbedRustError> for GradCheckError {
    fn from(err: EmbedRustError) -> Self {
        GradCheckError::TensorError(err)
    }
}

fn to_f64_vec(tensor: &Tensor) -> Result<Vec<f64>, GradCheckError> {
    match tensor.dtype() {
        DType::F32 => Ok(tensor.get_f32_data()?.into_iter().map(f64::from).collect()),
        DType::F64 => Ok(tensor.get_f64_data()?),
        other => Err(GradCheckError::UnsupportedDType(other)),
    }
}

fn from_f64_vec(data: &[f64], shape: Vec<usize>, dtype: DType) -> Result<Tensor, GradCheckError> {
    match dtype {
        DType::F32 => Ok(Tensor::new(data.iter().map(|&x| x as f32).collect(), shape)?),
        DType::F64 => Ok(Tensor::new_f64(data.to_vec(), shape)?),
        other => Err(GradCheckError::UnsupportedDType(other)),
    }
}

/// `sum(output * output_grad)`, whose gradient w.r.t. `output` is `output_grad`.
fn calculate_loss(output: &Tensor, output_grad: &Tensor) -> Result<f64, GradCheckError> {
    let out = to_f64_vec(output)?;
    let grad = to_f64_vec(output_grad)?;
    if out.len() != grad.len() {
        let err = EmbedRustError::shape_mismatch("check_grad", output.shape(), output_grad.shape());
        return Err(err.into());
    }
    Ok(out.iter().zip(&grad).map(|(o, g)| o * g).sum())
}

/// Checks analytical gradients against central finite differences.
///
/// Only floating-point inputs that require grad are perturbed; integral inputs
/// (indices) are passed through unchanged.
pub fn check_grad<F>(
    func: F,
    inputs: &[Tensor],
    output_grad: &Tensor,
    epsilon: f64,
    tolerance: f64,
) -> Result<(), GradCheckError>
where
    F: Fn(&[Tensor]) -> Result<Tensor, EmbedRustError>,
{
    for (i, input) in inputs.iter().enumerate() {
        if input.requires_grad() && input.grad_fn().is_some() {
            return Err(GradCheckError::InputNotLeaf { input_index: i });
        }
        if input.requires_grad() {
            input.clear_grad();
        }
    }

    let output = func(inputs).map_err(GradCheckError::ForwardPassError)?;
    let any_input_requires_grad = inputs.iter().any(|t| t.requires_grad());
    if any_input_requires_grad && !output.requires_grad() {
        return Err(GradCheckError::RequiresGradPropagationError);
    }
    if output.requires_grad() {
        output
            .backward_with(output_grad)
            .map_err(GradCheckError::BackwardPassError)?;
    }

    for (i, original_input) in inputs.iter().enumerate() {
        if !original_input.requires_grad() {
            continue;
        }
        let analytical = match original_input.grad() {
            Some(grad) => to_f64_vec(&grad)?,
            None => return Err(GradCheckError::MissingAnalyticalGrad { input_index: i }),
        };
        let original = to_f64_vec(original_input)?;
        let dtype = original_input.dtype();

        let loss_at = |data: &[f64]| -> Result<f64, GradCheckError> {
            let perturbed = from_f64_vec(data, original_input.shape(), dtype)?;
            perturbed.set_requires_grad(true)?;
            let mut perturbed_inputs = inputs.to_vec();
            perturbed_inputs[i] = perturbed;
            let out = func(&perturbed_inputs).map_err(GradCheckError::ForwardPassError)?;
            calculate_loss(&out, output_grad)
        };

        for elem_idx in 0..original.len() {
            let mut data = original.clone();
            data[elem_idx] = original[elem_idx] + epsilon;
            let loss_plus = loss_at(&data)?;
            data[elem_idx] = original[elem_idx] - epsilon;
            let loss_minus = loss_at(&data)?;

            let numerical_grad = (loss_plus - loss_minus) / (2.0 * epsilon);
            let analytical_grad = analytical[elem_idx];
            let difference = (analytical_grad - numerical_grad).abs();
            let scale = analytical_grad.abs().max(numerical_grad.abs()).max(1.0);
            if !(difference <= tolerance * scale) {
                return Err(GradCheckError::GradientMismatch {
                    input_index: i,
                    element_index: elem_idx,
                    analytical_grad,
                    numerical_grad,
                    difference,
                });
            }
        }
    }
    Ok(())
}
