use crate::autograd::BackwardOp;
use crate::error::EmbedRustError;
use crate::ops::traits::EmbedFloat;
use crate::tensor::Tensor;
use crate::types::DType;
use std::sync::Arc;

impl Tensor {
    /// Checks if this tensor requires gradient computation.
    pub fn requires_grad(&self) -> bool {
        self.read_data().requires_grad
    }

    /// Sets the `requires_grad` flag for this tensor.
    ///
    /// Only floating-point tensors can require gradients; index tensors are
    /// not differentiable.
    pub fn set_requires_grad(&self, requires_grad: bool) -> Result<(), EmbedRustError> {
        let mut guard = self.write_data();
        if requires_grad && !guard.dtype.is_floating_point() {
            return Err(EmbedRustError::UnsupportedDataType {
                dtype: guard.dtype,
                expected: "a floating-point type",
                operation: "set_requires_grad".to_string(),
            });
        }
        if requires_grad && guard.grad_fn.is_some() {
            log::warn!(
                "set_requires_grad(true) on a non-leaf tensor; its gradient is forwarded"
            );
        }
        guard.requires_grad = requires_grad;
        Ok(())
    }

    /// Returns a handle to the accumulated gradient, if any.
    pub fn grad(&self) -> Option<Tensor> {
        self.read_data().grad.clone()
    }

    /// Returns the recorded adjoint of the operation that produced this tensor.
    pub fn grad_fn(&self) -> Option<Arc<dyn BackwardOp>> {
        self.read_data().grad_fn.clone()
    }

    pub(crate) fn set_grad_fn(&self, grad_fn: Arc<dyn BackwardOp>) {
        let mut guard = self.write_data();
        guard.grad_fn = Some(grad_fn);
        guard.requires_grad = true;
    }

    /// Clears the gradient tensor associated with this tensor.
    pub fn clear_grad(&self) {
        self.write_data().grad = None;
    }

    /// Accumulates `grad_to_add` into this tensor's `grad` field.
    ///
    /// The first accumulation stores a copy; later ones add element-wise in place.
    pub fn acc_grad(&self, grad_to_add: &Tensor) -> Result<(), EmbedRustError> {
        let shape = self.shape();
        let dtype = self.dtype();
        if grad_to_add.shape() != shape {
            return Err(EmbedRustError::shape_mismatch("acc_grad", &shape, grad_to_add.shape()));
        }
        if grad_to_add.dtype() != dtype {
            return Err(EmbedRustError::DataTypeMismatch {
                expected: dtype,
                actual: grad_to_add.dtype(),
                operation: "acc_grad".to_string(),
            });
        }

        let existing = self.read_data().grad.clone();
        match existing {
            Some(existing) => {
                // Reading and writing the same tensor would deadlock.
                let source = if existing.ptr_eq(grad_to_add) {
                    grad_to_add.detached_copy()
                } else {
                    grad_to_add.clone()
                };
                let source_guard = source.read_data();
                let mut target_guard = existing.write_data();
                match dtype {
                    DType::F32 => add_assign::<f32>(target_guard.data_mut()?, source_guard.data()?),
                    DType::F64 => add_assign::<f64>(target_guard.data_mut()?, source_guard.data()?),
                    other => {
                        return Err(EmbedRustError::UnsupportedDataType {
                            dtype: other,
                            expected: "a floating-point type",
                            operation: "acc_grad".to_string(),
                        })
                    }
                }
            }
            None => {
                self.write_data().grad = Some(grad_to_add.detached_copy());
            }
        }
        Ok(())
    }

    /// Propagates `grad_output` through the recorded adjoints down to the leaves.
    ///
    /// Leaf tensors that require gradients accumulate into their `grad` field;
    /// inputs that do not require gradients (index tensors) are skipped.
    pub fn backward_with(&self, grad_output: &Tensor) -> Result<(), EmbedRustError> {
        let shape = self.shape();
        if grad_output.shape() != shape {
            return Err(EmbedRustError::shape_mismatch(
                "backward_with",
                &shape,
                grad_output.shape(),
            ));
        }

        match self.grad_fn() {
            None => {
                if self.requires_grad() {
                    self.acc_grad(grad_output)
                } else {
                    log::debug!(
                        "backward_with() on a tensor that does not require grad; nothing to do"
                    );
                    Ok(())
                }
            }
            Some(grad_fn) => {
                let inputs = grad_fn.inputs();
                let grads = grad_fn.backward(grad_output)?;
                if grads.len() != inputs.len() {
                    return Err(EmbedRustError::InternalError(format!(
                        "{:?} returned {} gradients for {} inputs",
                        grad_fn,
                        grads.len(),
                        inputs.len()
                    )));
                }
                for (input, grad) in inputs.iter().zip(grads.iter()) {
                    if input.requires_grad() {
                        input.backward_with(grad)?;
                    }
                }
                Ok(())
            }
        }
    }
}

fn add_assign<T: EmbedFloat>(target: &mut [T], source: &[T]) {
    for (t, &s) in target.iter_mut().zip(source.iter()) {
        *t += s;
    }
}

#[cfg(test)]
mod tests {
    use crate::error::EmbedRustError;
    use crate::tensor::Tensor;

    #[test]
    fn test_index_tensor_cannot_require_grad() {
        let idx = Tensor::new_i64(vec![0, 1], vec![2]).unwrap();
        let err = idx.set_requires_grad(true).unwrap_err();
        assert!(matches!(err, EmbedRustError::UnsupportedDataType { .. }));
        assert!(!idx.requires_grad());
    }

    #[test]
    fn test_acc_grad_accumulates() {
        let t = Tensor::new(vec![0.0, 0.0], vec![2]).unwrap();
        t.set_requires_grad(true).unwrap();
        let g = Tensor::new(vec![1.0, 2.0], vec![2]).unwrap();
        t.acc_grad(&g).unwrap();
        t.acc_grad(&g).unwrap();
        assert_eq!(t.grad().unwrap().get_f32_data().unwrap(), vec![2.0, 4.0]);
        // The caller's gradient tensor is left untouched.
        assert_eq!(g.get_f32_data().unwrap(), vec![1.0, 2.0]);
        t.clear_grad();
        assert!(t.grad().is_none());
    }

    #[test]
    fn test_acc_grad_shape_mismatch() {
        let t = Tensor::new(vec![0.0, 0.0], vec![2]).unwrap();
        let g = Tensor::new(vec![1.0], vec![1]).unwrap();
        assert!(matches!(t.acc_grad(&g), Err(EmbedRustError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_backward_on_leaf_accumulates() {
        let t = Tensor::new_f64(vec![1.0, 1.0, 1.0], vec![3]).unwrap();
        t.set_requires_grad(true).unwrap();
        let g = Tensor::new_f64(vec![0.5, 0.25, 0.0], vec![3]).unwrap();
        t.backward_with(&g).unwrap();
        assert_eq!(t.grad().unwrap().get_f64_data().unwrap(), vec![0.5, 0.25, 0.0]);
    }
}
