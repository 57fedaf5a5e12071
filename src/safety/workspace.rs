/// Run-scoped submission workspaces
///
/// Every execution gets a fresh directory named by a UUID run ID. It holds
/// the screened source, the driver program and everything the interpreter
/// produces (manifest, result array, figures), and is the rendering context
/// for that submission only. The directory is removed when the workspace is
/// dropped.
use crate::config::types::{GradeError, Result};
use crate::utils::env_hygiene::EnvHygiene;
use std::fs;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// One submission's run directory
pub struct Workspace {
    run_id: String,
    run_dir: PathBuf,
    source_file: Option<PathBuf>,
    cleaned: bool,
}

impl Workspace {
    /// Create new workspace for a run under `base_dir`
    pub fn new(base_dir: &Path) -> Result<Self> {
        let run_id = Uuid::new_v4().to_string();
        let run_dir = base_dir.join(&run_id);

        fs::create_dir_all(&run_dir).map_err(|e| {
            GradeError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create workspace directory {}: {}",
                    run_dir.display(),
                    e
                ),
            ))
        })?;
        EnvHygiene::default().set_directory_permissions(&run_dir)?;

        log::debug!("Created workspace {}", run_dir.display());
        Ok(Self {
            run_id,
            run_dir,
            source_file: None,
            cleaned: false,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Write the submission source as `source.<extension>`
    pub fn create_source_file(&mut self, extension: &str, content: &[u8]) -> Result<PathBuf> {
        let source_path = self.write_file(&format!("source.{}", extension), content)?;
        self.source_file = Some(source_path.clone());
        Ok(source_path)
    }

    /// Write a file directly inside the run directory
    pub fn write_file(&self, name: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.artifact_path(name)?;
        fs::write(&path, content).map_err(|e| {
            GradeError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write {}: {}", path.display(), e),
            ))
        })?;
        Ok(path)
    }

    /// Path of an artifact produced inside the run directory.
    ///
    /// Only plain file names are accepted so that an interpreter-written
    /// manifest cannot point outside the workspace.
    pub fn artifact_path(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.run_dir.join(name)),
            _ => Err(GradeError::Manifest(format!(
                "artifact name is not a plain file name: {:?}",
                name
            ))),
        }
    }

    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }

    /// Remove the run directory (idempotent)
    pub fn cleanup(&mut self) -> Result<()> {
        if self.cleaned {
            return Ok(());
        }
        self.cleaned = true;

        if self.run_dir.exists() {
            fs::remove_dir_all(&self.run_dir)?;
            log::debug!("Removed workspace {}", self.run_dir.display());
        }
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            log::warn!(
                "Failed to remove workspace {}: {}",
                self.run_dir.display(),
                e
            );
        }
    }
}

/// Manages the workspace root shared by all runs
pub struct WorkspaceManager {
    base_dir: PathBuf,
}

impl WorkspaceManager {
    /// Create the workspace root if it does not exist
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir).map_err(|e| {
            GradeError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create workspace base directory {}: {}",
                    base_dir.display(),
                    e
                ),
            ))
        })?;

        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn create_workspace(&self) -> Result<Workspace> {
        Workspace::new(&self.base_dir)
    }

    /// Remove run directories older than `max_age`, left behind by a grader
    /// that was killed before its workspaces were dropped
    pub fn cleanup_old_workspaces(&self, max_age: std::time::Duration) -> Result<usize> {
        let mut cleaned = 0;
        let now = std::time::SystemTime::now();

        for entry in fs::read_dir(&self.base_dir)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Failed to read directory entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            let is_run_dir = path.is_dir()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| Uuid::parse_str(n).is_ok());
            if !is_run_dir {
                continue;
            }

            let age = match fs::metadata(&path)
                .and_then(|m| m.modified())
                .map(|modified| now.duration_since(modified))
            {
                Ok(Ok(age)) => age,
                Ok(Err(_)) => continue,
                Err(e) => {
                    log::warn!("Failed to get modified time for {}: {}", path.display(), e);
                    continue;
                }
            };

            if age > max_age {
                log::info!("Cleaning up stale workspace: {}", path.display());
                match fs::remove_dir_all(&path) {
                    Ok(()) => cleaned += 1,
                    Err(e) => {
                        log::warn!("Failed to remove stale workspace {}: {}", path.display(), e)
                    }
                }
            }
        }

        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_workspace_created_and_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf()).unwrap();

        let workspace = manager.create_workspace().unwrap();
        let run_dir = workspace.run_dir().to_path_buf();
        assert!(run_dir.exists());
        assert!(run_dir.ends_with(workspace.run_id()));

        drop(workspace);
        assert!(!run_dir.exists());
    }

    #[test]
    fn test_workspace_files() {
        let root = tempfile::tempdir().unwrap();
        let mut workspace = Workspace::new(root.path()).unwrap();

        let source = workspace.create_source_file("py", b"result = 1\n").unwrap();
        assert_eq!(fs::read(&source).unwrap(), b"result = 1\n");
        assert_eq!(workspace.source_file(), Some(source.as_path()));

        workspace.cleanup().unwrap();
        assert!(!source.exists());
        // second cleanup is a no-op
        workspace.cleanup().unwrap();
    }

    #[test]
    fn test_artifact_path_rejects_escapes() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(root.path()).unwrap();

        assert!(workspace.artifact_path("figure-1.png").is_ok());
        assert!(workspace.artifact_path("../escape.png").is_err());
        assert!(workspace.artifact_path("/etc/passwd").is_err());
        assert!(workspace.artifact_path("a/b.png").is_err());
        assert!(workspace.artifact_path("").is_err());
    }

    #[test]
    fn test_cleanup_old_workspaces_only_touches_run_dirs() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().to_path_buf()).unwrap();

        let stale = root.path().join(Uuid::new_v4().to_string());
        fs::create_dir(&stale).unwrap();
        let unrelated = root.path().join("keep-me");
        fs::create_dir(&unrelated).unwrap();

        std::thread::sleep(Duration::from_millis(20));
        let cleaned = manager
            .cleanup_old_workspaces(Duration::from_millis(1))
            .unwrap();

        assert_eq!(cleaned, 1);
        assert!(!stale.exists());
        assert!(unrelated.exists());
    }
}
