use super::*;
use crate::ops::indexing::params::EmbeddingParam;

fn unknown() -> TensorShape {
    TensorShape::unknown()
}

#[test]
fn test_take_forward_shape_from_inputs() {
    let inferred = take_infer_shape(
        &[TensorShape::known(&[4, 5]), TensorShape::known(&[10, 3])],
        &[unknown()],
    )
    .unwrap();
    assert_eq!(inferred.outputs, vec![TensorShape::known(&[4, 5, 3])]);
    assert_eq!(inferred.inputs[0], TensorShape::known(&[4, 5]));
    assert_eq!(inferred.inputs[1], TensorShape::known(&[10, 3]));
}

#[test]
fn test_take_back_propagates_from_output() {
    let inferred = take_infer_shape(
        &[unknown(), TensorShape::partial(vec![Some(10), None])],
        &[TensorShape::known(&[2, 7, 3])],
    )
    .unwrap();
    assert_eq!(inferred.inputs[0], TensorShape::known(&[2, 7]));
    assert_eq!(inferred.inputs[1], TensorShape::known(&[10, 3]));
    assert_eq!(inferred.outputs[0], TensorShape::known(&[2, 7, 3]));
}

#[test]
fn test_take_unknown_source_gets_rank_two() {
    let inferred = take_infer_shape(&[TensorShape::known(&[3]), unknown()], &[]).unwrap();
    assert_eq!(inferred.inputs[1], TensorShape::with_rank(2));
    assert_eq!(inferred.outputs[0], TensorShape::partial(vec![Some(3), None]));
}

#[test]
fn test_take_source_must_be_matrix() {
    let err = take_infer_shape(&[TensorShape::known(&[3]), TensorShape::known(&[4, 2, 2])], &[])
        .unwrap_err();
    assert_eq!(
        err,
        EmbedRustError::RankMismatch { expected: 2, actual: 3, operation: "take".to_string() }
    );
}

#[test]
fn test_take_output_conflict() {
    let err = take_infer_shape(
        &[TensorShape::known(&[4]), TensorShape::known(&[10, 3])],
        &[TensorShape::known(&[4, 2])],
    )
    .unwrap_err();
    assert!(matches!(err, EmbedRustError::ShapeMismatch { .. }));

    let err = take_infer_shape(
        &[TensorShape::known(&[4]), TensorShape::known(&[10, 3])],
        &[TensorShape::known(&[])],
    )
    .unwrap_err();
    assert!(matches!(err, EmbedRustError::RankMismatch { actual: 0, .. }));
}

#[test]
fn test_scalar_index_yields_single_row() {
    let inferred = take_infer_shape(&[TensorShape::known(&[]), TensorShape::known(&[10, 3])], &[])
        .unwrap();
    assert_eq!(inferred.outputs[0], TensorShape::known(&[3]));
}

#[test]
fn test_take_arity() {
    let err = take_infer_shape(&[unknown()], &[]).unwrap_err();
    assert!(matches!(err, EmbedRustError::ArityMismatch { expected: 2, actual: 1, .. }));
    let err = take_infer_shape(&[unknown(), unknown()], &[unknown(), unknown()]).unwrap_err();
    assert!(matches!(err, EmbedRustError::ArityMismatch { what: "outputs", .. }));
}

#[test]
fn test_embedding_weight_from_params() {
    let param = EmbeddingParam::new(10, 4).unwrap();
    let inferred =
        embedding_infer_shape(&param, &[TensorShape::known(&[2, 3]), unknown()], &[]).unwrap();
    assert_eq!(inferred.inputs[1], TensorShape::known(&[10, 4]));
    assert_eq!(inferred.outputs[0], TensorShape::known(&[2, 3, 4]));
}

#[test]
fn test_embedding_weight_conflict() {
    let param = EmbeddingParam::new(10, 4).unwrap();
    let err = embedding_infer_shape(
        &param,
        &[TensorShape::known(&[2]), TensorShape::known(&[10, 5])],
        &[],
    )
    .unwrap_err();
    assert!(matches!(err, EmbedRustError::ShapeMismatch { .. }));
}

#[test]
fn test_shape_inference_is_idempotent() {
    let param = EmbeddingParam::new(6, 2).unwrap();
    let output = TensorShape::partial(vec![Some(5), None]);
    let first = embedding_infer_shape(&param, &[unknown(), unknown()], &[output]).unwrap();
    let second = embedding_infer_shape(&param, &first.inputs, &first.outputs).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.inputs[0], TensorShape::known(&[5]));

    let first = take_infer_shape(&[TensorShape::with_rank(2), unknown()], &[]).unwrap();
    let second = take_infer_shape(&first.inputs, &first.outputs).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_backward_shape() {
    let inferred = take_backward_infer_shape(
        &[TensorShape::known(&[3, 2]), TensorShape::known(&[3])],
        &[unknown(), TensorShape::partial(vec![Some(5), None])],
    )
    .unwrap();
    assert_eq!(inferred.outputs[0], TensorShape::known(&[3]));
    assert_eq!(inferred.outputs[1], TensorShape::known(&[5, 2]));

    let err = take_backward_infer_shape(
        &[TensorShape::known(&[4, 2]), TensorShape::known(&[3])],
        &[],
    )
    .unwrap_err();
    assert!(matches!(err, EmbedRustError::ShapeMismatch { .. }));
}

#[test]
fn test_take_types() {
    let inferred = take_infer_type(&[Some(DType::I64), Some(DType::F32)], &[None]).unwrap();
    assert_eq!(inferred.outputs, vec![Some(DType::F32)]);

    let inferred = take_infer_type(&[None, None], &[Some(DType::F64)]).unwrap();
    assert_eq!(inferred.inputs, vec![None, Some(DType::F64)]);

    let err = take_infer_type(&[Some(DType::F32), Some(DType::F32)], &[]).unwrap_err();
    assert!(matches!(err, EmbedRustError::UnsupportedDataType { dtype: DType::F32, .. }));

    let err =
        take_infer_type(&[Some(DType::I32), Some(DType::F32)], &[Some(DType::F64)]).unwrap_err();
    assert!(matches!(err, EmbedRustError::DataTypeMismatch { .. }));

    let err = take_infer_type(&[Some(DType::I32), None], &[None]).unwrap_err();
    assert!(matches!(err, EmbedRustError::UnresolvedDataType { .. }));

    let err = take_infer_type(&[Some(DType::I32), Some(DType::I64)], &[]).unwrap_err();
    assert!(matches!(err, EmbedRustError::UnsupportedDataType { dtype: DType::I64, .. }));
}

#[test]
fn test_embedding_type_falls_back_to_param() {
    let param = EmbeddingParam::new(4, 2).unwrap().with_dtype(DType::F64).unwrap();
    let inferred = embedding_infer_type(&param, &[Some(DType::I32), None], &[]).unwrap();
    assert_eq!(inferred.inputs[1], Some(DType::F64));
    assert_eq!(inferred.outputs[0], Some(DType::F64));

    let err = embedding_infer_type(&param, &[Some(DType::I32), Some(DType::F32)], &[]).unwrap_err();
    assert!(matches!(err, EmbedRustError::DataTypeMismatch { .. }));

    let bare = EmbeddingParam::new(4, 2).unwrap();
    assert!(embedding_infer_type(&bare, &[Some(DType::I32), None], &[]).is_err());
}

#[test]
fn test_type_inference_is_idempotent() {
    let first = take_infer_type(&[Some(DType::I32), None], &[Some(DType::F32)]).unwrap();
    let second = take_infer_type(&first.inputs, &first.outputs).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_backward_types() {
    let inferred =
        take_backward_infer_type(&[Some(DType::F32), Some(DType::I64)], &[]).unwrap();
    assert_eq!(inferred.outputs, vec![Some(DType::I64), Some(DType::F32)]);

    let err = take_backward_infer_type(&[Some(DType::F32), Some(DType::F32)], &[]).unwrap_err();
    assert!(matches!(err, EmbedRustError::UnsupportedDataType { .. }));
}
