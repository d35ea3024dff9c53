use super::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn parallel(deterministic: bool, threads: usize) -> KernelConfig {
    KernelConfig::default()
        .with_parallel_threshold(0)
        .with_num_threads(threads)
        .with_deterministic(deterministic)
}

fn scatter_f32(
    indices: &[i32],
    grad_output: &[f32],
    grad_table: &mut [f32],
    shape: [usize; 2],
    req: OpReq,
    config: &KernelConfig,
) -> Result<(), EmbedRustError> {
    let mut ws = Workspace::new();
    let mode = IndexMode::Raise;
    scatter_add_rows(indices, grad_output, grad_table, shape, req, mode, config, &mut ws)
}

#[test]
fn test_duplicates_accumulate() {
    let ograd = [1.0f32; 6];
    let expected = [2.0, 2.0, 0.0, 0.0, 1.0, 1.0];
    let configs = [
        KernelConfig::default(),
        parallel(true, 2),
        parallel(false, 2),
        parallel(false, 3),
    ];
    for config in configs {
        let mut grad = [9.0f32; 6];
        scatter_f32(&[0, 2, 0], &ograd, &mut grad, [3, 2], OpReq::WriteTo, &config).unwrap();
        assert_eq!(grad, expected, "config {:?}", config);
    }
}

#[test]
fn test_add_to_keeps_existing() {
    let mut grad = [1.0f32, 1.0, 1.0, 1.0];
    let ograd = [2.0, 3.0, 4.0, 5.0];
    scatter_f32(&[1, 1], &ograd, &mut grad, [2, 2], OpReq::AddTo, &parallel(true, 2)).unwrap();
    assert_eq!(grad, [1.0, 1.0, 7.0, 9.0]);
}

#[test]
fn test_null_request_is_noop() {
    let mut grad = [5.0f32; 2];
    let config = KernelConfig::default();
    scatter_f32(&[0], &[1.0, 1.0], &mut grad, [1, 2], OpReq::Null, &config).unwrap();
    assert_eq!(grad, [5.0, 5.0]);
}

#[test]
fn test_empty_indices_zero_the_gradient() {
    let mut grad = [3.0f32; 4];
    scatter_f32(&[], &[], &mut grad, [2, 2], OpReq::WriteTo, &KernelConfig::default()).unwrap();
    assert_eq!(grad, [0.0; 4]);
}

#[test]
fn test_out_of_range_leaves_gradient() {
    let mut grad = [3.0f32; 4];
    let config = parallel(true, 2);
    let err = scatter_f32(&[1, -1], &[1.0; 4], &mut grad, [2, 2], OpReq::WriteTo, &config)
        .unwrap_err();
    assert_eq!(
        err,
        EmbedRustError::IndexOutOfRange { index: -1, position: 1, row_count: 2 }
    );
    assert_eq!(grad, [3.0; 4]);
}

#[test]
fn test_wrap_mode() {
    let mut grad = [0.0f64; 3];
    let mut ws = Workspace::new();
    scatter_add_rows(
        &[-1i64, 2, 5],
        &[1.0, 10.0, 100.0],
        &mut grad,
        [3, 1],
        OpReq::WriteTo,
        IndexMode::Wrap,
        &KernelConfig::default(),
        &mut ws,
    )
    .unwrap();
    assert_eq!(grad, [0.0, 0.0, 111.0]);
}

#[test]
fn test_bucket_by_row_is_stable() {
    let rows = [2usize, 0, 2, 1, 0];
    let mut order = [0usize; 5];
    let mut offsets = [0usize; 4];
    bucket_by_row(&rows, &mut order, &mut offsets);
    assert_eq!(offsets, [0, 2, 3, 5]);
    assert_eq!(order, [1, 4, 3, 0, 2]);
}

#[test]
fn test_sorted_is_bit_identical_across_thread_counts() {
    let mut rng = StdRng::seed_from_u64(7);
    let (rows, width, positions) = (13, 5, 400);
    let indices: Vec<i32> = (0..positions).map(|_| rng.gen_range(0..rows as i32)).collect();
    let ograd: Vec<f32> = (0..positions * width).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let mut reference = vec![0.0f32; rows * width];
    let shape = [rows, width];
    scatter_f32(&indices, &ograd, &mut reference, shape, OpReq::WriteTo, &KernelConfig::default())
        .unwrap();

    for threads in [1, 2, 3, 8] {
        let mut grad = vec![0.0f32; rows * width];
        let config = parallel(true, threads);
        scatter_f32(&indices, &ograd, &mut grad, shape, OpReq::WriteTo, &config).unwrap();
        let same = grad.iter().zip(&reference).all(|(a, b)| a.to_bits() == b.to_bits());
        assert!(same, "threads = {}", threads);
    }
}

#[test]
fn test_privatized_is_close_and_repeatable() {
    let mut rng = StdRng::seed_from_u64(11);
    let (rows, width, positions) = (7, 3, 250);
    let indices: Vec<i32> = (0..positions).map(|_| rng.gen_range(0..rows as i32)).collect();
    let ograd: Vec<f32> = (0..positions * width).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let mut reference = vec![0.0f32; rows * width];
    let shape = [rows, width];
    scatter_f32(&indices, &ograd, &mut reference, shape, OpReq::WriteTo, &KernelConfig::default())
        .unwrap();

    let config = parallel(false, 4);
    let mut first = vec![0.0f32; rows * width];
    let mut second = vec![0.0f32; rows * width];
    scatter_f32(&indices, &ograd, &mut first, [rows, width], OpReq::WriteTo, &config).unwrap();
    scatter_f32(&indices, &ograd, &mut second, [rows, width], OpReq::WriteTo, &config).unwrap();
    assert_eq!(first, second);
    for (a, b) in first.iter().zip(&reference) {
        approx::assert_abs_diff_eq!(*a, *b, epsilon = 1e-4);
    }
}

#[test]
fn test_strategy_selection_and_scratch() {
    assert_eq!(
        ScatterStrategy::select(&KernelConfig::default(), 4, 2),
        ScatterStrategy::Sequential
    );
    assert_eq!(ScatterStrategy::select(&parallel(true, 4), 4, 2), ScatterStrategy::Sorted);
    assert_eq!(
        ScatterStrategy::select(&parallel(false, 4), 2, 2),
        ScatterStrategy::Privatized { workers: 2 }
    );

    assert_eq!(ScatterStrategy::Sequential.scratch(10, 4, 3), ScratchSize { words: 10, floats: 0 });
    assert_eq!(ScatterStrategy::Sorted.scratch(10, 4, 3), ScratchSize { words: 25, floats: 0 });
    assert_eq!(
        ScatterStrategy::Privatized { workers: 2 }.scratch(10, 4, 3),
        ScratchSize { words: 10, floats: 24 }
    );
}

#[test]
fn test_scratch_limit_reported() {
    let mut grad = [0.0f32; 4];
    let mut ws = Workspace::with_limit(Some(8));
    let err = scatter_add_rows(
        &[0i32, 1, 1],
        &[1.0f32; 6],
        &mut grad,
        [2, 2],
        OpReq::WriteTo,
        IndexMode::Raise,
        &KernelConfig::default(),
        &mut ws,
    )
    .unwrap_err();
    assert!(matches!(err, EmbedRustError::ResourceError { .. }));
    assert_eq!(grad, [0.0; 4]);
}

#[test]
fn test_scratch_released_for_every_strategy() {
    for config in [KernelConfig::default(), parallel(true, 2), parallel(false, 2)] {
        let mut ws = Workspace::new();
        let mut grad = [0.0f32; 6];
        scatter_add_rows(
            &[0i32, 2, 0],
            &[1.0f32; 6],
            &mut grad,
            [3, 2],
            OpReq::WriteTo,
            IndexMode::Raise,
            &config,
            &mut ws,
        )
        .unwrap();
        assert_eq!(grad, [2.0, 2.0, 0.0, 0.0, 1.0, 1.0]);
        assert!(ws.last_request_bytes() > 0);
        assert_eq!(ws.capacity_bytes(), 0, "config {:?}", config);
    }
}
