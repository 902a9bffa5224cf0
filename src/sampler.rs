//! Sample timestamp generation.

use crate::error::BifError;

/// Seconds at which thumbnails are taken.
///
/// Yields `offset, offset + interval, ...` while the value is strictly
/// less than `duration`. The result is empty when `offset >= duration`.
///
/// ```
/// use bifgen::sample_timestamps;
///
/// let samples = sample_timestamps(95, 10, 0)?;
/// assert_eq!(samples, [0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
/// assert!(sample_timestamps(5, 10, 10)?.is_empty());
/// # Ok::<(), bifgen::BifError>(())
/// ```
///
/// # Errors
///
/// [`BifError::InvalidInterval`] for an interval of zero.
pub fn sample_timestamps(duration: u64, interval: u32, offset: u32) -> Result<Vec<u64>, BifError> {
    if interval == 0 {
        return Err(BifError::InvalidInterval);
    }
    Ok((u64::from(offset)..duration)
        .step_by(interval as usize)
        .collect())
}
