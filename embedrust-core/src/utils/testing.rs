use crate::tensor::Tensor;
use crate::types::DType;

/// Checks if a floating-point tensor is approximately equal to the expected
/// shape and data. F32 data is widened to f64 before comparing.
///
/// Panics if shapes differ or data differs by more than `tolerance`.
pub fn check_tensor_near(
    actual: &Tensor,
    expected_shape: &[usize],
    expected_data: &[f64],
    tolerance: f64,
) {
    assert_eq!(actual.shape(), expected_shape, "Shape mismatch");

    let actual_data: Vec<f64> = match actual.dtype() {
        DType::F32 => actual
            .get_f32_data()
            .expect("Failed to get F32 data in check_tensor_near")
            .into_iter()
            .map(f64::from)
            .collect(),
        DType::F64 => actual
            .get_f64_data()
            .expect("Failed to get F64 data in check_tensor_near"),
        other => panic!("check_tensor_near expects a floating-point tensor, got {:?}", other),
    };

    assert_eq!(actual_data.len(), expected_data.len(), "Data length mismatch");

    for (i, (a, e)) in actual_data.iter().zip(expected_data.iter()).enumerate() {
        let diff = (a - e).abs();
        if diff > tolerance {
            panic!(
                "Data mismatch at index {}: actual={:?}, expected={:?}, diff={:?}, tolerance={:?}",
                i, a, e, diff, tolerance
            );
        }
    }
}

/// Helper to create an f32 tensor that requires gradient.
pub fn create_test_tensor_with_grad(data: Vec<f32>, shape: Vec<usize>) -> Tensor {
    let tensor = Tensor::new(data, shape).expect("Failed to create test tensor with grad");
    tensor
        .set_requires_grad(true)
        .expect("f32 tensors can require grad");
    tensor
}
