//! Local persistence of downloaded reports

use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Name is not a plain file name
    #[error("invalid output name '{0}': must be a plain file name")]
    InvalidName(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for a successfully fetched report.
///
/// Called exactly once per successful attempt.
pub trait ArtifactSink: Send + Sync {
    /// Persist `payload` under `name`, returning where it landed.
    fn save(&self, name: &str, payload: &[u8]) -> OutputResult<PathBuf>;
}

/// Writes reports into a directory.
///
/// Data goes to a hidden temporary file first and is renamed into place, so
/// the final name never refers to a partial file.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Create a sink writing into `dir` (created on first save).
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for DirectorySink {
    fn save(&self, name: &str, payload: &[u8]) -> OutputResult<PathBuf> {
        validate_file_name(name)?;
        std::fs::create_dir_all(&self.dir)?;

        let final_path = self.dir.join(name);
        let temp_path = self.dir.join(format!(".{name}.part"));
        {
            let mut file = std::fs::File::create(&temp_path)?;
            file.write_all(payload)?;
            file.sync_all()?;
        }
        if let Err(e) = std::fs::rename(&temp_path, &final_path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e.into());
        }

        debug!(path = ?final_path, bytes = payload.len(), "Report saved");
        Ok(final_path)
    }
}

/// Reject names that would escape the target directory.
pub fn validate_file_name(name: &str) -> OutputResult<()> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0');
    if plain {
        Ok(())
    } else {
        Err(OutputError::InvalidName(name.to_string()))
    }
}
