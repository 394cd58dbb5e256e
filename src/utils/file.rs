use std::{
    fs::metadata,
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::errors::CovError;

/// Modification time of `path` in milliseconds since the epoch, rounded to the
/// nearest millisecond.
pub fn get_file_modification_timestamp(path: &Path) -> Result<u128, CovError> {
    let modified = metadata(path)?.modified()?.duration_since(UNIX_EPOCH)?;
    Ok((modified.as_micros() + 500) / 1000)
}

pub fn current_timestamp_ms() -> Result<u128, CovError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis())
}
