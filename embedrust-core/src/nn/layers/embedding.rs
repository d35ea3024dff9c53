use crate::error::EmbedRustError;
use crate::nn::init::normal_;
use crate::nn::module::Module;
use crate::nn::parameter::Parameter;
use crate::ops::indexing::{embedding_op, EmbeddingParam, IndexMode};
use crate::tensor::{zeros_with_dtype, Tensor};
use crate::types::DType;
use rand::Rng;

/// A lookup table mapping integer indices to learnable vectors.
///
/// The weight has shape `(input_dim, output_dim)`; `forward(idx)` returns a
/// tensor of shape `idx.shape ++ [output_dim]`. Weight gradients accumulate
/// across backward passes until [`Module::zero_grad`].
#[derive(Debug)]
pub struct Embedding {
    weight: Parameter,
    param: EmbeddingParam,
}

impl Embedding {
    /// Creates a layer with weights drawn from `N(0, 1)`.
    pub fn new(input_dim: usize, output_dim: usize) -> Result<Self, EmbedRustError> {
        Self::from_param(EmbeddingParam::new(input_dim, output_dim)?, &mut rand::thread_rng())
    }

    /// Creates a layer for `param`, initialising the weight from `rng`.
    ///
    /// The weight dtype is `param.dtype()`, F32 when unset.
    pub fn from_param<R: Rng + ?Sized>(
        param: EmbeddingParam,
        rng: &mut R,
    ) -> Result<Self, EmbedRustError> {
        let dtype = param.dtype().unwrap_or(DType::F32);
        let mut weight = zeros_with_dtype(&param.weight_shape(), dtype)?;
        normal_(&mut weight, 0.0, 1.0, rng)?;
        log::debug!(
            "Embedding: initialised {:?} weight of shape {:?}",
            dtype,
            param.weight_shape()
        );
        Ok(Embedding {
            weight: Parameter::new_with_name(weight, "weight")?,
            param,
        })
    }

    /// Wraps an existing `(rows, width)` matrix as the weight.
    pub fn from_pretrained(weight: Tensor, mode: IndexMode) -> Result<Self, EmbedRustError> {
        let shape = weight.shape();
        let (rows, width) = match shape.as_slice() {
            &[rows, width] => (rows, width),
            other => {
                return Err(EmbedRustError::RankMismatch {
                    expected: 2,
                    actual: other.len(),
                    operation: "Embedding::from_pretrained".to_string(),
                })
            }
        };
        let param = EmbeddingParam::new(rows, width)?
            .with_dtype(weight.dtype())?
            .with_mode(mode);
        Ok(Embedding {
            weight: Parameter::new_with_name(weight, "weight")?,
            param,
        })
    }

    pub fn weight(&self) -> &Parameter {
        &self.weight
    }

    pub fn param(&self) -> &EmbeddingParam {
        &self.param
    }
}

impl Module for Embedding {
    fn forward(&self, input: &Tensor) -> Result<Tensor, EmbedRustError> {
        embedding_op(input, &self.weight, &self.param)
    }

    fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.weight]
    }

    fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        vec![("weight".to_string(), &self.weight)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::ones;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_forward_shape_and_rows() {
        let param = EmbeddingParam::new(5, 3).unwrap().with_dtype(DType::F64).unwrap();
        let layer = Embedding::from_param(param, &mut StdRng::seed_from_u64(1)).unwrap();
        let weight = layer.weight().get_f64_data().unwrap();

        let idx = Tensor::new_i64(vec![4, 0], vec![2, 1]).unwrap();
        let out = layer.forward(&idx).unwrap();
        assert_eq!(out.shape(), vec![2, 1, 3]);
        let out_data = out.get_f64_data().unwrap();
        assert_eq!(&out_data[..3], &weight[12..15]);
        assert_eq!(&out_data[3..], &weight[..3]);
    }

    #[test]
    fn test_gradients_accumulate_until_zero_grad() {
        let weight = Tensor::new(vec![0.0; 6], vec![3, 2]).unwrap();
        let layer = Embedding::from_pretrained(weight, IndexMode::Raise).unwrap();
        let idx = Tensor::new_i32(vec![0, 2, 0], vec![3]).unwrap();

        for _ in 0..2 {
            let out = layer.forward(&idx).unwrap();
            out.backward_with(&ones(&[3, 2]).unwrap()).unwrap();
        }
        let grad = layer.weight().grad().unwrap();
        assert_eq!(grad.get_f32_data().unwrap(), vec![4.0, 4.0, 0.0, 0.0, 2.0, 2.0]);

        layer.zero_grad();
        assert!(layer.weight().grad().is_none());
    }

    #[test]
    fn test_from_pretrained_validation() {
        let cube = Tensor::new(vec![0.0; 8], vec![2, 2, 2]).unwrap();
        assert!(matches!(
            Embedding::from_pretrained(cube, IndexMode::Raise),
            Err(EmbedRustError::RankMismatch { .. })
        ));
        let ints = Tensor::new_i32(vec![0; 4], vec![2, 2]).unwrap();
        assert!(Embedding::from_pretrained(ints, IndexMode::Raise).is_err());
    }

    #[test]
    fn test_named_parameters() {
        let layer = Embedding::new(4, 2).unwrap();
        let named = layer.named_parameters();
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].0, "weight");
        assert_eq!(named[0].1.shape(), vec![4, 2]);
        assert_eq!(layer.parameters().len(), 1);
        assert!(layer.weight().requires_grad());
    }

    #[test]
    fn test_clip_mode_layer() {
        let weight = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]).unwrap();
        let layer = Embedding::from_pretrained(weight, IndexMode::Clip).unwrap();
        let out = layer.forward(&Tensor::new_i32(vec![7], vec![1]).unwrap()).unwrap();
        assert_eq!(out.get_f32_data().unwrap(), vec![3.0, 4.0]);
    }
}
