//! # Embedding lookup on CPU
//!
//! Walks through the indexing operators of `embedrust-core`:
//! 1. `take_op` on a small table, with each index mode.
//! 2. An `Embedding` layer: forward, backward, gradient accumulation.
//! 3. The `OperatorTable` flow a graph executor follows: infer, allocate,
//!    compute, then wire and run the backward node.

use embedrust_core::{
    error::EmbedRustError,
    make_backward_node,
    nn::{Embedding, Module},
    ops::registry::ForwardNode,
    tensor::{ones, zeros_with_dtype, Tensor},
    take_op, DType, EmbeddingParam, IndexMode, KernelConfig, OpContext, OpParams, OpReq,
    OperatorTable, TakeParam, TensorShape,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn print_rows(label: &str, tensor: &Tensor) -> Result<(), EmbedRustError> {
    let shape = tensor.shape();
    let width = shape.last().copied().unwrap_or(1).max(1);
    println!("{} {:?}", label, shape);
    for row in tensor.get_f32_data()?.chunks(width) {
        println!("  {:?}", row);
    }
    Ok(())
}

fn take_modes() -> Result<(), EmbedRustError> {
    println!("--- take ---");
    let table = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![3, 2])?;
    let idx = Tensor::new_i64(vec![0, 2, -1, 4], vec![4])?;

    match take_op(&idx, &table, IndexMode::Raise) {
        Ok(_) => println!("raise: unexpected success"),
        Err(e) => println!("raise: {}", e),
    }
    print_rows("clip:", &take_op(&idx, &table, IndexMode::Clip)?)?;
    print_rows("wrap:", &take_op(&idx, &table, IndexMode::Wrap)?)?;
    Ok(())
}

fn embedding_layer() -> Result<(), EmbedRustError> {
    println!("--- Embedding layer ---");
    let param = EmbeddingParam::new(5, 3)?;
    let layer = Embedding::from_param(param, &mut StdRng::seed_from_u64(42))?;
    let tokens = Tensor::new_i32(vec![1, 4, 1, 0], vec![2, 2])?;

    for step in 0..2 {
        let out = layer.forward(&tokens)?;
        out.backward_with(&ones(&out.shape())?)?;
        if step == 0 {
            print_rows("output:", &out)?;
        }
    }
    if let Some(grad) = layer.weight().grad() {
        // Row 1 appears twice per pass, so it collects 4 after two passes.
        print_rows("weight grad after 2 passes:", &grad)?;
    }
    layer.zero_grad();
    println!("grad cleared: {}", layer.weight().grad().is_none());
    Ok(())
}

fn allocate(shape: &TensorShape, dtype: Option<DType>) -> Result<Tensor, EmbedRustError> {
    let dims = shape.to_vec().ok_or_else(|| EmbedRustError::InvalidParameter {
        operation: "allocate".to_string(),
        message: format!("shape {:?} is not fully inferred", shape),
    })?;
    let dtype = dtype.ok_or_else(|| EmbedRustError::UnresolvedDataType {
        operation: "allocate".to_string(),
        reason: "output dtype not inferred".to_string(),
    })?;
    zeros_with_dtype(&dims, dtype)
}

fn operator_table() -> Result<(), EmbedRustError> {
    println!("--- OperatorTable ---");
    let table = OperatorTable::with_indexing_ops();
    println!("registered: {:?}", table.names());

    let params = OpParams::Take(TakeParam::new(IndexMode::Raise));
    let take = table.get("take")?;
    let in_shapes = [TensorShape::known(&[3]), TensorShape::known(&[4, 2])];
    let shapes = take.infer_shape(&params, &in_shapes, &[])?;
    let types = take.infer_type(&params, &[Some(DType::I64), Some(DType::F32)], &[])?;

    let idx = Tensor::new_i64(vec![3, 3, 0], vec![3])?;
    let data = Tensor::new(vec![0.5, 1.5, 2.5, 3.5, 4.5, 5.5, 6.5, 7.5], vec![4, 2])?;
    let out = allocate(&shapes.outputs[0], types.outputs[0])?;

    let config = KernelConfig::default().with_num_threads(2);
    let mut ctx = OpContext::new(config);
    take.compute(&mut ctx, &params, &[idx.clone(), data], &[OpReq::WriteTo], &[out.clone()])?;
    print_rows("take output:", &out)?;

    let node = ForwardNode {
        op: "take".to_string(),
        params,
        inputs: vec!["idx", "data"],
    };
    let backward_node = make_backward_node(&node, &["out_grad"])?;
    println!("backward node: {} {:?}", backward_node.op, backward_node.inputs);

    let backward = table.get(backward_node.op)?;
    let idx_grad = zeros_with_dtype(&[3], DType::I64)?;
    let data_grad = zeros_with_dtype(&[4, 2], DType::F32)?;
    backward.compute(
        &mut ctx,
        &backward_node.params,
        &[ones(&[3, 2])?, idx],
        &[OpReq::WriteTo, OpReq::WriteTo],
        &[idx_grad, data_grad.clone()],
    )?;
    print_rows("data grad:", &data_grad)?;
    println!("scratch requests served: {}", ctx.workspace.request_count());
    Ok(())
}

fn main() -> Result<(), EmbedRustError> {
    take_modes()?;
    embedding_layer()?;
    operator_table()?;
    Ok(())
}
