//! Filesystem access for the linker.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

/// What a planned link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// A package directory.
    Directory,
    /// An executable file.
    Shim,
}

/// The filesystem operations the linker needs.
#[async_trait]
pub trait LinkFs: Send + Sync {
    /// Create `path` and any missing parents.
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Create a link at `dest` pointing to `src`, replacing whatever is at
    /// `dest`.
    async fn symlink(&self, src: &Path, dest: &Path, kind: LinkKind) -> io::Result<()>;

    /// Target of the link at `path`, or `None` if `path` is not a link.
    async fn read_link(&self, path: &Path) -> io::Result<Option<PathBuf>>;

    /// Entry names of `path`. A missing directory has no entries.
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<String>>;
}

/// [`LinkFs`] on the host filesystem.
///
/// Directory links are symlinks on Unix and junctions on Windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFs;

#[async_trait]
impl LinkFs for HostFs {
    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn symlink(&self, src: &Path, dest: &Path, kind: LinkKind) -> io::Result<()> {
        remove_existing(dest).await?;

        #[cfg(unix)]
        {
            tokio::fs::symlink(src, dest).await?;
            if kind == LinkKind::Shim {
                make_executable(src).await?;
            }
        }

        #[cfg(windows)]
        {
            let src = src.to_path_buf();
            let dest = dest.to_path_buf();
            tokio::task::spawn_blocking(move || match kind {
                LinkKind::Directory => junction::create(&src, &dest),
                LinkKind::Shim => std::os::windows::fs::symlink_file(&src, &dest),
            })
            .await
            .map_err(io::Error::other)??;
        }

        Ok(())
    }

    async fn read_link(&self, path: &Path) -> io::Result<Option<PathBuf>> {
        let metadata = tokio::fs::symlink_metadata(path).await?;
        if metadata.file_type().is_symlink() {
            tokio::fs::read_link(path).await.map(Some)
        } else {
            Ok(None)
        }
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

/// Remove a link, file or directory at `path`, if any.
async fn remove_existing(path: &Path) -> io::Result<()> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if metadata.file_type().is_symlink() {
        // Windows directory symlinks and junctions are removed as directories.
        #[cfg(windows)]
        if tokio::fs::remove_dir(path).await.is_ok() {
            return Ok(());
        }
        tokio::fs::remove_file(path).await
    } else if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = tokio::fs::metadata(path).await?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    tokio::fs::set_permissions(path, permissions).await
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_symlink_replaces_existing_directory() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dest = tmp.path().join("dest");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::create_dir_all(dest.join("stale")).unwrap();

        HostFs.symlink(&src, &dest, LinkKind::Directory).await.unwrap();

        assert_eq!(HostFs.read_link(&dest).await.unwrap(), Some(src));
    }

    #[tokio::test]
    async fn test_shim_target_becomes_executable() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("cli.js");
        std::fs::write(&target, "#!/usr/bin/env node\n").unwrap();
        std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o644)).unwrap();

        HostFs
            .symlink(&target, &tmp.path().join("cli"), LinkKind::Shim)
            .await
            .unwrap();

        let mode = std::fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[tokio::test]
    async fn test_read_link_on_regular_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("plain");
        std::fs::write(&file, "").unwrap();
        assert_eq!(HostFs.read_link(&file).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_dir_missing_is_empty() {
        let tmp = TempDir::new().unwrap();
        let names = HostFs.read_dir(&tmp.path().join("missing")).await.unwrap();
        assert!(names.is_empty());
    }
}
