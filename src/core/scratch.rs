//! Request-scoped scratch files.
//!
//! Every temporary artifact the gateway writes (uploaded containers, the
//! canonical WAV handed to the recognizer, synthesized MP3s waiting to be
//! streamed) is created through [`ScratchDir::acquire`] and owned by a
//! [`ScratchFile`] guard. Dropping the last owner of the guard deletes the
//! file, so cleanup happens exactly once on every exit path: normal return,
//! early `?` return, a panic inside a worker, or a cancelled request future.
//!
//! Guards are usually wrapped in an `Arc` so a blocking worker can keep the
//! file alive while it reads or writes it, even if the request that created
//! it has already given up.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tracing::{debug, warn};
use uuid::Uuid;

/// What a scratch file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    /// Upload bytes exactly as the client sent them (webm, ogg, mp3, ...)
    InputContainer,
    /// 16-bit PCM mono WAV produced after noise reduction
    CanonicalWav,
    /// MP3 produced by the speech synthesizer
    SynthesizedMp3,
}

/// Errors raised while creating scratch files.
#[derive(Debug, thiserror::Error)]
pub enum ScratchError {
    #[error("Failed to create scratch directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create scratch file {path}: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Directory in which scratch files are created.
///
/// Cheap to clone; all requests share one instance. File names carry a
/// random UUID suffix and are opened with create-new semantics, so two
/// requests never share a file and no locking is needed.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Scratch directory rooted at the OS temp dir.
    pub fn system() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create an empty file named `{prefix}_{uuid}.{extension}` owned by `owner`.
    pub async fn acquire(
        &self,
        prefix: &str,
        extension: &str,
        format: ArtifactFormat,
        owner: Uuid,
    ) -> Result<ScratchFile, ScratchError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| ScratchError::CreateDir {
                path: self.root.clone(),
                source,
            })?;

        let extension = sanitize_extension(extension);
        let file_name = format!("{prefix}_{}.{extension}", Uuid::new_v4().simple());
        let path = self.root.join(file_name);

        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|source| ScratchError::CreateFile {
                path: path.clone(),
                source,
            })?;

        debug!(
            request_id = %owner,
            path = %path.display(),
            format = ?format,
            "Acquired scratch file"
        );

        Ok(ScratchFile {
            path,
            format,
            owner,
        })
    }
}

/// Delete `path` if it exists. Missing files are not an error.
pub fn release(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Guard over one scratch file; the file is deleted when the guard drops.
pub struct ScratchFile {
    path: PathBuf,
    format: ArtifactFormat,
    owner: Uuid,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ArtifactFormat {
        self.format
    }

    /// Request that created this file.
    pub fn owner(&self) -> Uuid {
        self.owner
    }
}

impl fmt::Debug for ScratchFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScratchFile")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("owner", &self.owner)
            .finish()
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match release(&self.path) {
            Ok(()) => debug!(
                request_id = %self.owner,
                path = %self.path.display(),
                "Released scratch file"
            ),
            Err(e) => warn!(
                request_id = %self.owner,
                path = %self.path.display(),
                error = %e,
                "Failed to release scratch file"
            ),
        }
    }
}

/// Keep only ASCII alphanumerics so a client-supplied extension cannot
/// escape the scratch directory.
fn sanitize_extension(extension: &str) -> String {
    let cleaned: String = extension
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_ascii_lowercase();
    if cleaned.is_empty() {
        "bin".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_acquire_creates_empty_file_with_prefix_and_extension() {
        let tmp = TempDir::new().unwrap();
        let scratch = ScratchDir::new(tmp.path());

        let file = scratch
            .acquire("audio_in", "webm", ArtifactFormat::InputContainer, Uuid::new_v4())
            .await
            .unwrap();

        assert!(file.path().exists());
        assert_eq!(std::fs::metadata(file.path()).unwrap().len(), 0);
        let name = file.path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("audio_in_"));
        assert!(name.ends_with(".webm"));
        assert_eq!(file.format(), ArtifactFormat::InputContainer);
    }

    #[tokio::test]
    async fn test_drop_releases_file() {
        let tmp = TempDir::new().unwrap();
        let scratch = ScratchDir::new(tmp.path());

        let file = scratch
            .acquire("audio_out", "wav", ArtifactFormat::CanonicalWav, Uuid::new_v4())
            .await
            .unwrap();
        let path = file.path().to_path_buf();
        drop(file);

        assert!(!path.exists());
        assert_eq!(entries(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_shared_guard_released_by_last_owner() {
        let tmp = TempDir::new().unwrap();
        let scratch = ScratchDir::new(tmp.path());

        let file = Arc::new(
            scratch
                .acquire("audio_out", "wav", ArtifactFormat::CanonicalWav, Uuid::new_v4())
                .await
                .unwrap(),
        );
        let worker_copy = Arc::clone(&file);
        let path = file.path().to_path_buf();

        drop(file);
        assert!(path.exists(), "worker still holds the file");

        drop(worker_copy);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_names_are_unique() {
        let tmp = TempDir::new().unwrap();
        let scratch = ScratchDir::new(tmp.path());
        let owner = Uuid::new_v4();

        let mut files = Vec::new();
        for _ in 0..64 {
            files.push(
                scratch
                    .acquire("audio_in", "webm", ArtifactFormat::InputContainer, owner)
                    .await
                    .unwrap(),
            );
        }
        let names: HashSet<_> = files.iter().map(|f| f.path().to_path_buf()).collect();
        assert_eq!(names.len(), 64);
    }

    #[tokio::test]
    async fn test_acquire_creates_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("nested").join("scratch");
        let scratch = ScratchDir::new(&nested);

        let file = scratch
            .acquire("tts", "mp3", ArtifactFormat::SynthesizedMp3, Uuid::new_v4())
            .await
            .unwrap();
        assert!(file.path().starts_with(&nested));
    }

    #[test]
    fn test_release_missing_path_is_noop() {
        let tmp = TempDir::new().unwrap();
        assert!(release(&tmp.path().join("never-created.wav")).is_ok());
    }

    #[test]
    fn test_release_twice_is_noop() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.wav");
        std::fs::write(&path, b"data").unwrap();
        release(&path).unwrap();
        release(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_sanitize_extension() {
        assert_eq!(sanitize_extension("WEBM"), "webm");
        assert_eq!(sanitize_extension("../../etc"), "etc");
        assert_eq!(sanitize_extension(""), "bin");
        assert_eq!(sanitize_extension("/"), "bin");
    }
}
