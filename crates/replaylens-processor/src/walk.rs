//! Input discovery.
//!
//! [`ReplayWalker`] yields replay files under a set of roots one at a time,
//! in sorted order. The walk is lazy: a directory is listed only when the
//! walker reaches it, so the dispatcher never enumerates further than it
//! has dispatched.
//!
//! Symbolic links below a root are never followed: a linked directory would
//! yield the same replay under a second relative path (and so a second game
//! id), and a dangling link would fail the walk. A root given explicitly may
//! itself be a link.

use std::ffi::OsStr;
use std::path::PathBuf;

use crate::error::WalkError;

/// Depth-first walk over replay roots.
#[derive(Debug)]
pub struct ReplayWalker {
    // Pending paths; the next path to visit is at the end.
    pending: Vec<PathBuf>,
    suffix: String,
}

impl ReplayWalker {
    /// Walk `roots` for files whose name ends in `suffix`.
    ///
    /// A root may be a directory or a single file.
    pub fn new(roots: Vec<PathBuf>, suffix: impl Into<String>) -> Self {
        let mut pending = roots;
        pending.reverse();
        Self {
            pending,
            suffix: suffix.into(),
        }
    }

    /// The next matching file, or `None` once the walk is exhausted.
    pub async fn next_path(&mut self) -> Result<Option<PathBuf>, WalkError> {
        while let Some(path) = self.pending.pop() {
            let meta = tokio::fs::metadata(&path)
                .await
                .map_err(|source| WalkError {
                    path: path.clone(),
                    source,
                })?;

            if !meta.is_dir() {
                if self.matches(&path) {
                    return Ok(Some(path));
                }
                continue;
            }

            let mut entries = tokio::fs::read_dir(&path)
                .await
                .map_err(|source| WalkError {
                    path: path.clone(),
                    source,
                })?;
            let mut children = Vec::new();
            while let Some(entry) = entries.next_entry().await.map_err(|source| WalkError {
                path: path.clone(),
                source,
            })? {
                if is_hidden(&entry.file_name()) {
                    continue;
                }
                let file_type = entry.file_type().await.map_err(|source| WalkError {
                    path: entry.path(),
                    source,
                })?;
                if file_type.is_symlink() {
                    tracing::debug!(path = %entry.path().display(), "skipping symlink");
                    continue;
                }
                children.push(entry.path());
            }
            children.sort_unstable_by(|a, b| b.cmp(a));
            self.pending.extend(children);
        }
        Ok(None)
    }

    fn matches(&self, path: &std::path::Path) -> bool {
        path.file_name().is_some_and(|name| {
            !is_hidden(name) && name.to_string_lossy().ends_with(self.suffix.as_str())
        })
    }
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    const SUFFIX: &str = ".SC2Replay.json";

    async fn collect(mut walker: ReplayWalker) -> Vec<PathBuf> {
        let mut out = Vec::new();
        while let Some(path) = walker.next_path().await.unwrap() {
            out.push(path);
        }
        out
    }

    #[tokio::test]
    async fn yields_matching_files_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("2021/march")).unwrap();
        fs::write(root.join("b.SC2Replay.json"), "{}").unwrap();
        fs::write(root.join("a.SC2Replay.json"), "{}").unwrap();
        fs::write(root.join("2021/march/c.SC2Replay.json"), "{}").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();
        fs::write(root.join(".hidden.SC2Replay.json"), "{}").unwrap();

        let found = collect(ReplayWalker::new(vec![root.to_path_buf()], SUFFIX)).await;
        assert_eq!(
            found,
            vec![
                root.join("2021/march/c.SC2Replay.json"),
                root.join("a.SC2Replay.json"),
                root.join("b.SC2Replay.json"),
            ]
        );
    }

    #[tokio::test]
    async fn hidden_directories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join(".cache/x.SC2Replay.json"), "{}").unwrap();

        let found = collect(ReplayWalker::new(vec![dir.path().to_path_buf()], SUFFIX)).await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn a_root_may_be_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("solo.SC2Replay.json");
        fs::write(&file, "{}").unwrap();

        let found = collect(ReplayWalker::new(vec![file.clone()], SUFFIX)).await;
        assert_eq!(found, vec![file]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dangling_links_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.SC2Replay.json"), "{}").unwrap();
        std::os::unix::fs::symlink(root.join("missing"), root.join("b-stale-link")).unwrap();
        std::os::unix::fs::symlink(
            root.join("gone.SC2Replay.json"),
            root.join("c.SC2Replay.json"),
        )
        .unwrap();

        let found = collect(ReplayWalker::new(vec![root.to_path_buf()], SUFFIX)).await;
        assert_eq!(found, vec![root.join("a.SC2Replay.json")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn linked_directories_are_not_walked_twice() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("2021")).unwrap();
        fs::write(root.join("2021/g.SC2Replay.json"), "{}").unwrap();
        std::os::unix::fs::symlink(root.join("2021"), root.join("latest")).unwrap();

        let found = collect(ReplayWalker::new(vec![root.to_path_buf()], SUFFIX)).await;
        assert_eq!(found, vec![root.join("2021/g.SC2Replay.json")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn a_linked_root_is_followed() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("store")).unwrap();
        fs::write(dir.path().join("store/g.SC2Replay.json"), "{}").unwrap();
        let link = dir.path().join("replays");
        std::os::unix::fs::symlink(dir.path().join("store"), &link).unwrap();

        let found = collect(ReplayWalker::new(vec![link.clone()], SUFFIX)).await;
        assert_eq!(found, vec![link.join("g.SC2Replay.json")]);
    }

    #[tokio::test]
    async fn missing_root_is_an_error() {
        let mut walker = ReplayWalker::new(vec![PathBuf::from("/nonexistent/replays")], SUFFIX);
        let err = walker.next_path().await.unwrap_err();
        assert_eq!(err.path, PathBuf::from("/nonexistent/replays"));
    }
}
