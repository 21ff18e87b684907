use crate::error::DatasetError;

/// Every run of `len` consecutive values, oldest first, as owned copies.
/// Window `i` ends at position `i + len - 1`; a series shorter than `len`
/// yields nothing.
pub fn sliding_windows<T: Clone>(series: &[T], len: usize) -> Result<Vec<Vec<T>>, DatasetError> {
    if len == 0 {
        return Err(DatasetError::InvalidWindow(len));
    }
    Ok(series.windows(len).map(<[T]>::to_vec).collect())
}

/// One window per observation: the series is left-padded with `len`
/// missing markers so early observations still get a full-length window.
/// The window ending on the last padding cell holds no observation and is
/// dropped, so output `i` ends at `values[i]`.
pub fn padded_windows(
    values: &[Option<f64>],
    len: usize,
) -> Result<Vec<Vec<Option<f64>>>, DatasetError> {
    let mut padded = vec![None; len];
    padded.extend_from_slice(values);
    let windows = sliding_windows(&padded, len)?;
    Ok(windows.into_iter().skip(1).collect())
}
