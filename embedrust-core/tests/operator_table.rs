use embedrust_core::{
    make_backward_node,
    ops::registry::ForwardNode,
    tensor::{zeros_with_dtype, Tensor},
    DType, EmbeddingParam, IndexMode, OpContext, OpParams, OpReq, OperatorTable, TakeParam,
    TensorShape,
};

mod common;
use common::random_tensor;

fn allocate(shape: &TensorShape, dtype: Option<DType>) -> Tensor {
    let shape = shape.to_vec().expect("shape fully inferred");
    zeros_with_dtype(&shape, dtype.expect("dtype inferred")).unwrap()
}

/// Drives `Embedding` forward and `_backward_take` the way a graph executor would.
#[test]
fn test_host_driven_embedding_round_trip() {
    let table = OperatorTable::with_indexing_ops();
    let param = EmbeddingParam::new(6, 3).unwrap().with_dtype(DType::F32).unwrap();
    let params = OpParams::Embedding(param);
    let forward_op = table.get("Embedding").unwrap();

    // Only the index shape and dtype are declared up front.
    let shapes = forward_op
        .infer_shape(&params, &[TensorShape::known(&[2, 2]), TensorShape::unknown()], &[])
        .unwrap();
    assert_eq!(shapes.inputs[1], TensorShape::known(&[6, 3]));
    assert_eq!(shapes.outputs[0], TensorShape::known(&[2, 2, 3]));
    let types = forward_op.infer_type(&params, &[Some(DType::I32), None], &[]).unwrap();
    assert_eq!(types.inputs[1], Some(DType::F32));

    let data = Tensor::new_i32(vec![5, 0, 0, 3], vec![2, 2]).unwrap();
    let weight = random_tensor(4, &[6, 3]);
    let out = allocate(&shapes.outputs[0], types.outputs[0]);
    let mut ctx = OpContext::default();
    let inputs = [data.clone(), weight.clone()];
    forward_op
        .compute(&mut ctx, &params, &inputs, &[OpReq::WriteTo], &[out.clone()])
        .unwrap();
    let w = weight.get_f32_data().unwrap();
    let o = out.get_f32_data().unwrap();
    assert_eq!(&o[..3], &w[15..18]);
    assert_eq!(&o[9..], &w[9..12]);

    // Gradient wiring: symbols are plain strings here.
    let node = ForwardNode {
        op: "Embedding".to_string(),
        params,
        inputs: vec!["data", "weight"],
    };
    let backward_node = make_backward_node(&node, &["ograd"]).unwrap();
    assert_eq!(backward_node.inputs, vec!["ograd", "data"]);
    let backward_op = table.get(backward_node.op).unwrap();
    assert_eq!(backward_op.descriptor().input_names.len(), backward_node.inputs.len());

    let bshapes = backward_op
        .infer_shape(
            &backward_node.params,
            &[TensorShape::known(&[2, 2, 3]), TensorShape::known(&[2, 2])],
            &[TensorShape::unknown(), TensorShape::known(&[6, 3])],
        )
        .unwrap();
    let btypes = backward_op
        .infer_type(&backward_node.params, &[Some(DType::F32), Some(DType::I32)], &[])
        .unwrap();
    let idx_grad = allocate(&bshapes.outputs[0], btypes.outputs[0]);
    let weight_grad = allocate(&bshapes.outputs[1], btypes.outputs[1]);
    assert_eq!(idx_grad.dtype(), DType::I32);

    let ograd = Tensor::new(vec![1.0; 12], vec![2, 2, 3]).unwrap();
    backward_op
        .compute(
            &mut ctx,
            &backward_node.params,
            &[ograd, data],
            &[OpReq::WriteTo, OpReq::WriteTo],
            &[idx_grad, weight_grad.clone()],
        )
        .unwrap();
    let g = weight_grad.get_f32_data().unwrap();
    assert_eq!(&g[..3], &[2.0, 2.0, 2.0]);
    assert_eq!(&g[3..9], &[0.0; 6]);
    assert_eq!(&g[9..12], &[1.0, 1.0, 1.0]);
    assert_eq!(&g[15..], &[1.0, 1.0, 1.0]);
    assert_eq!(ctx.workspace.request_count(), 2);
}

#[test]
fn test_take_mode_survives_gradient_wiring() {
    let node = ForwardNode {
        op: "take".to_string(),
        params: OpParams::Take(TakeParam::new(IndexMode::Wrap)),
        inputs: vec![0usize, 1],
    };
    let backward = make_backward_node(&node, &[7]).unwrap();
    assert_eq!(backward.params.mode(), IndexMode::Wrap);
    assert_eq!(backward.inputs, vec![7, 0]);
}

