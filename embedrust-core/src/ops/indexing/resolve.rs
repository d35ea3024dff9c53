use crate::error::EmbedRustError;
use crate::ops::indexing::params::IndexMode;
use crate::ops::traits::EmbedIndex;

/// Maps one raw index onto a row of a table with `row_count` rows.
///
/// `position` is the flat position of the index in its tensor, reported on error.
pub fn resolve_row(
    index: i64,
    position: usize,
    row_count: usize,
    mode: IndexMode,
) -> Result<usize, EmbedRustError> {
    let out_of_range = || EmbedRustError::IndexOutOfRange {
        index,
        position,
        row_count,
    };
    if row_count == 0 {
        return Err(out_of_range());
    }
    let in_range = index >= 0 && (index as u64) < row_count as u64;
    if in_range {
        return Ok(index as usize);
    }
    match mode {
        IndexMode::Raise => Err(out_of_range()),
        IndexMode::Clip => Ok(if index < 0 { 0 } else { row_count - 1 }),
        IndexMode::Wrap => {
            let rows = i128::from(row_count as u64);
            Ok(i128::from(index).rem_euclid(rows) as usize)
        }
    }
}

/// Resolves every index into `rows` before any output is touched.
///
/// `rows` must have the same length as `indices`. Under `IndexMode::Raise` the
/// first offending position is reported.
pub fn resolve_rows<I: EmbedIndex>(
    indices: &[I],
    row_count: usize,
    mode: IndexMode,
    rows: &mut [usize],
) -> Result<(), EmbedRustError> {
    debug_assert_eq!(indices.len(), rows.len());
    let mut remapped = 0usize;
    for (position, (&raw, row)) in indices.iter().zip(rows.iter_mut()).enumerate() {
        let index: i64 = raw.into();
        *row = resolve_row(index, position, row_count, mode)?;
        if *row as i64 != index {
            remapped += 1;
        }
    }
    if remapped > 0 {
        log::warn!(
            "{} of {} indices remapped into [0, {}) with {:?}",
            remapped,
            indices.len(),
            row_count,
            mode
        );
    }
    Ok(())
}
