//! Row scatter-accumulate: `grad[idx[p], :] += ograd[p, :]`.
//!
//! Duplicate indices contribute once per occurrence. Three strategies share the
//! same contract and differ only in how the additions are ordered:
//!
//! * [`ScatterStrategy::Sequential`]: one pass over positions on the calling thread.
//! * [`ScatterStrategy::Sorted`]: positions are bucketed by row with a stable
//!   counting sort, then rows are accumulated in parallel. Every row sums its
//!   contributions in position order, so the result is bit-identical to
//!   the sequential pass for any thread count.
//! * [`ScatterStrategy::Privatized`]: each worker sums a contiguous chunk of
//!   positions into a private table, and the private tables are reduced row by
//!   row in worker order. Results depend on the worker count.

use rayon::prelude::*;

use crate::config::{KernelConfig, OpReq};
use crate::error::EmbedRustError;
use crate::ops::indexing::params::IndexMode;
use crate::ops::indexing::resolve::resolve_rows;
use crate::ops::traits::{EmbedFloat, EmbedIndex};
use crate::workspace::{ScratchSize, Workspace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScatterStrategy {
    Sequential,
    Sorted,
    Privatized { workers: usize },
}

impl ScatterStrategy {
    /// Picks the strategy for `positions` rows of `row_width` under `config`.
    pub fn select(config: &KernelConfig, positions: usize, row_width: usize) -> Self {
        if !config.is_parallel(positions.saturating_mul(row_width)) {
            return ScatterStrategy::Sequential;
        }
        if config.deterministic {
            return ScatterStrategy::Sorted;
        }
        let workers = config
            .num_threads
            .unwrap_or_else(rayon::current_num_threads)
            .clamp(1, positions.max(1));
        ScatterStrategy::Privatized { workers }
    }

    /// Scratch for one call over a `[row_count, row_width]` gradient.
    pub fn scratch(&self, positions: usize, row_count: usize, row_width: usize) -> ScratchSize {
        match *self {
            ScatterStrategy::Sequential => ScratchSize {
                words: positions,
                floats: 0,
            },
            ScatterStrategy::Sorted => ScratchSize {
                words: 2 * positions + row_count + 1,
                floats: 0,
            },
            ScatterStrategy::Privatized { workers } => ScratchSize {
                words: positions,
                floats: workers * row_count * row_width,
            },
        }
    }
}

/// Accumulates rows of `grad_output` into `grad_table` at the rows named by `indices`.
///
/// `grad_output` holds `indices.len()` rows of `row_width`; `grad_table` is the
/// `[row_count, row_width]` source gradient. With `OpReq::WriteTo` the gradient
/// is zeroed first, with `OpReq::AddTo` the existing contents are kept. Indices
/// are resolved before the gradient is touched.
#[allow(clippy::too_many_arguments)]
pub fn scatter_add_rows<T: EmbedFloat, I: EmbedIndex>(
    indices: &[I],
    grad_output: &[T],
    grad_table: &mut [T],
    [row_count, row_width]: [usize; 2],
    req: OpReq,
    mode: IndexMode,
    config: &KernelConfig,
    workspace: &mut Workspace,
) -> Result<(), EmbedRustError> {
    let positions = indices.len();
    if grad_output.len() != positions * row_width {
        return Err(EmbedRustError::shape_mismatch(
            "_backward_take",
            [positions, row_width],
            grad_output.len(),
        ));
    }
    if grad_table.len() != row_count * row_width {
        return Err(EmbedRustError::shape_mismatch(
            "_backward_take",
            [row_count, row_width],
            grad_table.len(),
        ));
    }
    if req == OpReq::Null {
        return Ok(());
    }
    if positions == 0 {
        prepare_output(grad_table, req);
        return Ok(());
    }

    let strategy = ScatterStrategy::select(config, positions, row_width);
    let size = strategy.scratch(positions, row_count, row_width);
    workspace.with_scratch::<T, _, _>(size, |words, floats| {
        let (rows, rest) = words.split_at_mut(positions);
        resolve_rows(indices, row_count, mode, rows)?;
        prepare_output(grad_table, req);
        if row_width == 0 {
            return Ok(());
        }
        log::debug!(
            "scatter-add: {} rows x {} into {} rows with {:?}",
            positions,
            row_width,
            row_count,
            strategy
        );

        match strategy {
            ScatterStrategy::Sequential => {
                accumulate_sequential(rows, grad_output, grad_table, row_width);
                Ok(())
            }
            ScatterStrategy::Sorted => {
                let (order, offsets) = rest.split_at_mut(positions);
                bucket_by_row(rows, order, offsets);
                let (order, offsets): (&[usize], &[usize]) = (order, offsets);
                config.install(|| {
                    grad_table
                        .par_chunks_mut(row_width)
                        .enumerate()
                        .for_each(|(row, dst)| {
                            for &p in &order[offsets[row]..offsets[row + 1]] {
                                add_row(dst, &grad_output[p * row_width..(p + 1) * row_width]);
                            }
                        });
                })
            }
            ScatterStrategy::Privatized { workers } => {
                let rows: &[usize] = rows;
                accumulate_privatized(
                    rows,
                    grad_output,
                    grad_table,
                    floats,
                    workers,
                    row_width,
                    config,
                )
            }
        }
    })
}

fn prepare_output<T: EmbedFloat>(grad_table: &mut [T], req: OpReq) {
    if req == OpReq::WriteTo {
        grad_table.fill(T::zero());
    }
}

#[inline]
fn add_row<T: EmbedFloat>(dst: &mut [T], src: &[T]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d += s;
    }
}

fn accumulate_sequential<T: EmbedFloat>(
    rows: &[usize],
    grad_output: &[T],
    grad_table: &mut [T],
    row_width: usize,
) {
    for (src, &row) in grad_output.chunks(row_width).zip(rows) {
        add_row(&mut grad_table[row * row_width..(row + 1) * row_width], src);
    }
}

/// Stable counting sort of positions by row.
///
/// On return `order[offsets[r]..offsets[r + 1]]` lists the positions of row `r`
/// in ascending order. `offsets` must be zeroed and hold `row_count + 1` words.
fn bucket_by_row(rows: &[usize], order: &mut [usize], offsets: &mut [usize]) {
    let row_count = offsets.len() - 1;
    for &row in rows {
        offsets[row + 1] += 1;
    }
    for r in 0..row_count {
        offsets[r + 1] += offsets[r];
    }
    for (position, &row) in rows.iter().enumerate() {
        order[offsets[row]] = position;
        offsets[row] += 1;
    }
    // Each offsets[r] now points at the end of row r; shift back to starts.
    for r in (1..=row_count).rev() {
        offsets[r] = offsets[r - 1];
    }
    offsets[0] = 0;
}

fn accumulate_privatized<T: EmbedFloat>(
    rows: &[usize],
    grad_output: &[T],
    grad_table: &mut [T],
    partials: &mut [T],
    workers: usize,
    row_width: usize,
    config: &KernelConfig,
) -> Result<(), EmbedRustError> {
    let table_len = grad_table.len();
    let chunk = rows.len().div_ceil(workers);
    let used = rows.len().div_ceil(chunk);

    config.install(|| {
        partials
            .par_chunks_mut(table_len)
            .zip(rows.par_chunks(chunk))
            .enumerate()
            .for_each(|(worker, (private, rows_chunk))| {
                let base = worker * chunk;
                for (i, &row) in rows_chunk.iter().enumerate() {
                    let p = base + i;
                    add_row(
                        &mut private[row * row_width..(row + 1) * row_width],
                        &grad_output[p * row_width..(p + 1) * row_width],
                    );
                }
            });

        let partials: &[T] = &*partials;
        grad_table
            .par_chunks_mut(row_width)
            .enumerate()
            .for_each(|(row, dst)| {
                for private in partials.chunks(table_len).take(used) {
                    add_row(dst, &private[row * row_width..(row + 1) * row_width]);
                }
            });
    })
}

#[cfg(test)]
#[path = "scatter_test.rs"]
mod tests;
