use std::fs::File;
use std::path::Path;

use crate::SinkError;

/// Write a complete file image next to `path`, then rename it into place.
///
/// Readers only ever see the previous snapshot or the new one. A failure
/// anywhere leaves the previous snapshot untouched and the temporary file is
/// removed when it drops.
pub(crate) fn replace_file<F>(path: &Path, write: F) -> Result<(), SinkError>
where
    F: FnOnce(&mut File) -> Result<(), SinkError>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".tagmatrix-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| SinkError::Io(e.error))?;
    Ok(())
}
