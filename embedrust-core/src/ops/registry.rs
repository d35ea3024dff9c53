//! Typed operator table for host graph executors.
//!
//! A host owns an [`OperatorTable`], looks operators up by name and drives them
//! through the [`Operator`] trait: inference first, then compute with an
//! [`OpContext`]. Gradient wiring goes through [`make_backward_node`].

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::config::{KernelConfig, OpReq};
use crate::error::EmbedRustError;
use crate::ops::indexing::infer::{
    check_arity, embedding_infer_shape, embedding_infer_type, take_backward_infer_shape,
    take_backward_infer_type, take_infer_shape, take_infer_type, ShapeInference, TypeInference,
    BACKWARD_TAKE, EMBEDDING, TAKE,
};
use crate::ops::indexing::params::{OpParams, TakeParam};
use crate::ops::indexing::take::{embedding_forward_into, take_backward_into, take_forward_into};
use crate::shape::TensorShape;
use crate::tensor::Tensor;
use crate::types::DType;
use crate::workspace::{ResourceRequest, Workspace};

/// Static registration metadata of an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpDescriptor {
    pub name: &'static str,
    pub num_inputs: usize,
    pub num_outputs: usize,
    pub input_names: &'static [&'static str],
    pub resources: &'static [ResourceRequest],
    /// Name of the operator computing this one's gradient.
    pub backward: Option<&'static str>,
    pub is_backward: bool,
    pub description: &'static str,
}

/// Compute-time resources handed to [`Operator::compute`].
#[derive(Debug, Default)]
pub struct OpContext {
    pub config: KernelConfig,
    pub workspace: Workspace,
}

impl OpContext {
    /// Context with a workspace bounded by `config.scratch_limit_bytes`.
    pub fn new(config: KernelConfig) -> Self {
        OpContext {
            workspace: Workspace::for_config(&config),
            config,
        }
    }
}

/// Capability interface of a registered operator.
pub trait Operator: Debug + Send + Sync {
    fn descriptor(&self) -> &OpDescriptor;

    fn infer_shape(
        &self,
        params: &OpParams,
        in_shapes: &[TensorShape],
        out_shapes: &[TensorShape],
    ) -> Result<ShapeInference, EmbedRustError>;

    fn infer_type(
        &self,
        params: &OpParams,
        in_types: &[Option<DType>],
        out_types: &[Option<DType>],
    ) -> Result<TypeInference, EmbedRustError>;

    /// Runs the kernel on caller-allocated `outputs`, one [`OpReq`] per output.
    fn compute(
        &self,
        ctx: &mut OpContext,
        params: &OpParams,
        inputs: &[Tensor],
        req: &[OpReq],
        outputs: &[Tensor],
    ) -> Result<(), EmbedRustError>;
}

fn check_compute_arity(
    descriptor: &OpDescriptor,
    inputs: &[Tensor],
    req: &[OpReq],
    outputs: &[Tensor],
) -> Result<(), EmbedRustError> {
    check_arity(descriptor.name, "inputs", descriptor.num_inputs, inputs.len())?;
    check_arity(descriptor.name, "outputs", descriptor.num_outputs, outputs.len())?;
    check_arity(descriptor.name, "output requests", descriptor.num_outputs, req.len())
}

const TEMP_SPACE: &[ResourceRequest] = &[ResourceRequest::TempSpace];

/// `Embedding(data, weight)`: row lookup into a learnable table.
#[derive(Debug)]
pub struct EmbeddingOp {
    descriptor: OpDescriptor,
}

impl Default for EmbeddingOp {
    fn default() -> Self {
        EmbeddingOp {
            descriptor: OpDescriptor {
                name: EMBEDDING,
                num_inputs: 2,
                num_outputs: 1,
                input_names: &["data", "weight"],
                resources: TEMP_SPACE,
                backward: Some(BACKWARD_TAKE),
                is_backward: false,
                description: "Maps integer indices to rows of an (input_dim, output_dim) table.",
            },
        }
    }
}

impl Operator for EmbeddingOp {
    fn descriptor(&self) -> &OpDescriptor {
        &self.descriptor
    }

    fn infer_shape(
        &self,
        params: &OpParams,
        in_shapes: &[TensorShape],
        out_shapes: &[TensorShape],
    ) -> Result<ShapeInference, EmbedRustError> {
        embedding_infer_shape(params.as_embedding(EMBEDDING)?, in_shapes, out_shapes)
    }

    fn infer_type(
        &self,
        params: &OpParams,
        in_types: &[Option<DType>],
        out_types: &[Option<DType>],
    ) -> Result<TypeInference, EmbedRustError> {
        embedding_infer_type(params.as_embedding(EMBEDDING)?, in_types, out_types)
    }

    fn compute(
        &self,
        ctx: &mut OpContext,
        params: &OpParams,
        inputs: &[Tensor],
        req: &[OpReq],
        outputs: &[Tensor],
    ) -> Result<(), EmbedRustError> {
        check_compute_arity(&self.descriptor, inputs, req, outputs)?;
        let param = params.as_embedding(EMBEDDING)?;
        embedding_forward_into(&inputs[0], &inputs[1], &outputs[0], req[0], param, ctx)
    }
}

/// `take(idx, data)`: row gather from an arbitrary matrix operand.
#[derive(Debug)]
pub struct TakeOp {
    descriptor: OpDescriptor,
}

impl Default for TakeOp {
    fn default() -> Self {
        TakeOp {
            descriptor: OpDescriptor {
                name: TAKE,
                num_inputs: 2,
                num_outputs: 1,
                input_names: &["idx", "data"],
                resources: TEMP_SPACE,
                backward: Some(BACKWARD_TAKE),
                is_backward: false,
                description: "Gathers rows of a 2-D matrix selected by an index tensor.",
            },
        }
    }
}

impl Operator for TakeOp {
    fn descriptor(&self) -> &OpDescriptor {
        &self.descriptor
    }

    fn infer_shape(
        &self,
        params: &OpParams,
        in_shapes: &[TensorShape],
        out_shapes: &[TensorShape],
    ) -> Result<ShapeInference, EmbedRustError> {
        params.as_take(TAKE)?;
        take_infer_shape(in_shapes, out_shapes)
    }

    fn infer_type(
        &self,
        params: &OpParams,
        in_types: &[Option<DType>],
        out_types: &[Option<DType>],
    ) -> Result<TypeInference, EmbedRustError> {
        params.as_take(TAKE)?;
        take_infer_type(in_types, out_types)
    }

    fn compute(
        &self,
        ctx: &mut OpContext,
        params: &OpParams,
        inputs: &[Tensor],
        req: &[OpReq],
        outputs: &[Tensor],
    ) -> Result<(), EmbedRustError> {
        check_compute_arity(&self.descriptor, inputs, req, outputs)?;
        let param = params.as_take(TAKE)?;
        take_forward_into(&inputs[0], &inputs[1], &outputs[0], req[0], param.mode, ctx)
    }
}

/// `_backward_take(ograd, idx) -> (idx_grad, data_grad)`.
#[derive(Debug)]
pub struct TakeBackwardOp {
    descriptor: OpDescriptor,
}

impl Default for TakeBackwardOp {
    fn default() -> Self {
        TakeBackwardOp {
            descriptor: OpDescriptor {
                name: BACKWARD_TAKE,
                num_inputs: 2,
                num_outputs: 2,
                input_names: &["ograd", "idx"],
                resources: TEMP_SPACE,
                backward: None,
                is_backward: true,
                description: "Scatter-adds output gradients into the rows selected by the indices.",
            },
        }
    }
}

/// The index gradient is identically zero.
fn write_index_grad(idx: &Tensor, idx_grad: &Tensor, req: OpReq) -> Result<(), EmbedRustError> {
    if idx_grad.shape() != idx.shape() {
        return Err(EmbedRustError::shape_mismatch(BACKWARD_TAKE, idx.shape(), idx_grad.shape()));
    }
    if req != OpReq::WriteTo {
        return Ok(());
    }
    let mut guard = idx_grad.write_data();
    let dtype = guard.dtype;
    match dtype {
        DType::F32 => guard.data_mut::<f32>()?.fill(0.0),
        DType::F64 => guard.data_mut::<f64>()?.fill(0.0),
        DType::I32 => guard.data_mut::<i32>()?.fill(0),
        DType::I64 => guard.data_mut::<i64>()?.fill(0),
    }
    Ok(())
}

impl Operator for TakeBackwardOp {
    fn descriptor(&self) -> &OpDescriptor {
        &self.descriptor
    }

    fn infer_shape(
        &self,
        params: &OpParams,
        in_shapes: &[TensorShape],
        out_shapes: &[TensorShape],
    ) -> Result<ShapeInference, EmbedRustError> {
        params.as_take(BACKWARD_TAKE)?;
        take_backward_infer_shape(in_shapes, out_shapes)
    }

    fn infer_type(
        &self,
        params: &OpParams,
        in_types: &[Option<DType>],
        out_types: &[Option<DType>],
    ) -> Result<TypeInference, EmbedRustError> {
        params.as_take(BACKWARD_TAKE)?;
        take_backward_infer_type(in_types, out_types)
    }

    fn compute(
        &self,
        ctx: &mut OpContext,
        params: &OpParams,
        inputs: &[Tensor],
        req: &[OpReq],
        outputs: &[Tensor],
    ) -> Result<(), EmbedRustError> {
        check_compute_arity(&self.descriptor, inputs, req, outputs)?;
        let param = params.as_take(BACKWARD_TAKE)?;
        let (ograd, idx) = (&inputs[0], &inputs[1]);
        // Scatter first: it validates the index tensor before anything is written.
        take_backward_into(ograd, idx, &outputs[1], req[1], param.mode, ctx)?;
        write_index_grad(idx, &outputs[0], req[0])
    }
}

/// Name-keyed operator table, owned by the host.
#[derive(Debug, Default)]
pub struct OperatorTable {
    ops: HashMap<&'static str, Arc<dyn Operator>>,
}

impl OperatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding `Embedding`, `take` and `_backward_take`.
    pub fn with_indexing_ops() -> Self {
        let mut table = Self::new();
        table.register(Arc::new(EmbeddingOp::default()));
        table.register(Arc::new(TakeOp::default()));
        table.register(Arc::new(TakeBackwardOp::default()));
        table
    }

    /// Registers `op` under its descriptor name, returning any operator it replaces.
    pub fn register(&mut self, op: Arc<dyn Operator>) -> Option<Arc<dyn Operator>> {
        let name = op.descriptor().name;
        log::debug!("registering operator {}", name);
        let previous = self.ops.insert(name, op);
        if previous.is_some() {
            log::warn!("operator {} was already registered and has been replaced", name);
        }
        previous
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Operator>, EmbedRustError> {
        self.ops
            .get(name)
            .cloned()
            .ok_or_else(|| EmbedRustError::UnknownOperator(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.ops.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// A forward node as seen by the host's autodiff pass. `H` is the host's
/// symbol handle.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardNode<H> {
    pub op: String,
    pub params: OpParams,
    pub inputs: Vec<H>,
}

/// The gradient node produced by [`make_backward_node`].
#[derive(Debug, Clone, PartialEq)]
pub struct BackwardNode<H> {
    pub op: &'static str,
    pub params: OpParams,
    pub inputs: Vec<H>,
}

/// Builds the `_backward_take` node for an `Embedding` or `take` node.
///
/// Inputs are the output gradients followed by the forward's index input.
pub fn make_backward_node<H: Clone>(
    forward: &ForwardNode<H>,
    output_grads: &[H],
) -> Result<BackwardNode<H>, EmbedRustError> {
    if forward.op != EMBEDDING && forward.op != TAKE {
        return Err(EmbedRustError::UnsupportedOperation(format!(
            "no gradient is defined for operator {}",
            forward.op
        )));
    }
    check_arity(&forward.op, "inputs", 2, forward.inputs.len())?;
    check_arity(&forward.op, "output gradients", 1, output_grads.len())?;

    let mut inputs = output_grads.to_vec();
    inputs.push(forward.inputs[0].clone());
    Ok(BackwardNode {
        op: BACKWARD_TAKE,
        params: OpParams::TakeBackward(TakeParam::new(forward.params.mode())),
        inputs,
    })
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
