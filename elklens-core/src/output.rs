use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::error::{PipelineError, PipelineResult};

/// Writes `value` as pretty JSON to `path`, or to stdout when no path is given.
pub fn write_json<T: Serialize>(value: &T, path: Option<&Path>) -> PipelineResult<()> {
    let json = serde_json::to_string_pretty(value)?;

    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| {
                    PipelineError::storage(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
            fs::write(path, json + "\n").map_err(|e| {
                PipelineError::storage(format!("cannot write {}: {}", path.display(), e))
            })?;
            info!("Results written to: {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", json)
                .map_err(|e| PipelineError::storage(format!("cannot write to stdout: {}", e)))?;
        }
    }
    Ok(())
}
