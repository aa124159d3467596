pub mod convert;
pub mod export;
pub mod info;

use std::path::PathBuf;

use anyhow::Result;

/// Expand glob patterns into a sorted file list.
///
/// Plain paths pass through untouched so that a missing file is reported as
/// a conversion failure rather than silently skipped.
pub(crate) fn expand_inputs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        if pattern.contains(['*', '?', '[']) {
            for entry in glob::glob(pattern)? {
                files.push(entry?);
            }
        } else {
            files.push(PathBuf::from(pattern));
        }
    }
    files.sort();
    Ok(files)
}
