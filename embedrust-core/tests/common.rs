use embedrust_core::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Each integration test crate includes this module; not every helper is used by each.

/// The 3x2 matrix `[[1, 2], [3, 4], [5, 6]]`.
#[allow(dead_code)]
pub(crate) fn sample_table() -> Tensor {
    Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![3, 2])
        .expect("Test tensor creation failed")
}

/// Random `(rows, width)` f32 table and `positions` random indices, from a fixed seed.
#[allow(dead_code)]
pub(crate) fn random_problem(
    seed: u64,
    rows: usize,
    width: usize,
    positions: usize,
) -> (Tensor, Tensor) {
    let mut rng = StdRng::seed_from_u64(seed);
    let table: Vec<f32> = (0..rows * width).map(|_| rng.gen_range(-2.0..2.0)).collect();
    let idx: Vec<i64> = (0..positions).map(|_| rng.gen_range(0..rows as i64)).collect();
    (
        Tensor::new(table, vec![rows, width]).expect("Test tensor creation failed"),
        Tensor::new_i64(idx, vec![positions]).expect("Test tensor creation failed"),
    )
}

/// Random f32 values with the given shape.
#[allow(dead_code)]
pub(crate) fn random_tensor(seed: u64, shape: &[usize]) -> Tensor {
    let mut rng = StdRng::seed_from_u64(seed);
    let numel: usize = shape.iter().product();
    let data: Vec<f32> = (0..numel).map(|_| rng.gen_range(-1.0..1.0)).collect();
    Tensor::new(data, shape.to_vec()).expect("Test tensor creation failed")
}
