//! Row gather: `out[p, :] = table[idx[p], :]`.

use rayon::prelude::*;

use crate::config::{KernelConfig, OpReq};
use crate::error::EmbedRustError;
use crate::ops::indexing::params::IndexMode;
use crate::ops::indexing::resolve::resolve_rows;
use crate::ops::traits::{EmbedFloat, EmbedIndex};
use crate::workspace::{ScratchSize, Workspace};

/// Scratch needed to gather `positions` rows: one resolved row per position.
pub fn gather_scratch(positions: usize) -> ScratchSize {
    ScratchSize {
        words: positions,
        floats: 0,
    }
}

/// Copies table rows selected by `indices` into `out`.
///
/// `table` is a row-major `[row_count, row_width]` matrix and `out` holds
/// `indices.len()` rows of `row_width`. All indices are resolved before the
/// first write, so an `IndexOutOfRange` error leaves `out` untouched.
#[allow(clippy::too_many_arguments)]
pub fn gather_rows<T: EmbedFloat, I: EmbedIndex>(
    indices: &[I],
    table: &[T],
    [row_count, row_width]: [usize; 2],
    out: &mut [T],
    req: OpReq,
    mode: IndexMode,
    config: &KernelConfig,
    workspace: &mut Workspace,
) -> Result<(), EmbedRustError> {
    let positions = indices.len();
    if table.len() != row_count * row_width {
        return Err(EmbedRustError::shape_mismatch(
            "gather",
            [row_count, row_width],
            table.len(),
        ));
    }
    if out.len() != positions * row_width {
        return Err(EmbedRustError::shape_mismatch(
            "gather",
            [positions, row_width],
            out.len(),
        ));
    }
    if req == OpReq::Null || positions == 0 {
        return Ok(());
    }

    workspace.with_scratch::<T, _, _>(gather_scratch(positions), |rows, _| {
        resolve_rows(indices, row_count, mode, rows)?;
        if row_width == 0 {
            return Ok(());
        }
        let rows: &[usize] = rows;

        let work = positions * row_width;
        if config.is_parallel(work) {
            log::trace!("gather: {} rows x {} in parallel", positions, row_width);
            config.install(|| {
                out.par_chunks_mut(row_width)
                    .zip(rows.par_iter())
                    .for_each(|(dst, &row)| {
                        write_row(dst, &table[row * row_width..(row + 1) * row_width], req)
                    });
            })
        } else {
            for (dst, &row) in out.chunks_mut(row_width).zip(rows) {
                write_row(dst, &table[row * row_width..(row + 1) * row_width], req);
            }
            Ok(())
        }
    })
}

#[inline]
fn write_row<T: EmbedFloat>(dst: &mut [T], src: &[T], req: OpReq) {
    match req {
        OpReq::Null => {}
        OpReq::WriteTo => dst.copy_from_slice(src),
        OpReq::AddTo => {
            for (d, &s) in dst.iter_mut().zip(src) {
                *d += s;
            }
        }
    }
}
