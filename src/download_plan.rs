use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::target::Target;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("the path {0} exists, but it is not a file")]
    NotAFile(PathBuf),
    #[error("could not inspect {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Targets still to be downloaded, keyed by their local path so no two of
/// them ever write to the same file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DownloadPlan {
    targets: BTreeMap<PathBuf, Target>,
}

impl DownloadPlan {
    /// Adds a target unless another one already claims its local path.
    pub fn insert(&mut self, target: Target) -> bool {
        match self.targets.entry(target.path.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(target);
                true
            }
            Entry::Occupied(entry) => {
                tracing::warn!(
                    "Both {} and {} map to {}, keeping the first",
                    entry.get().url,
                    target.url,
                    target.path.display()
                );
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn into_targets(self) -> Vec<Target> {
        self.targets.into_values().collect()
    }
}

/// Keeps the targets that do not exist below `destination` yet.
///
/// A target whose path exists as anything but a regular file is an error and
/// no plan is returned.
pub fn filter_existing<I>(destination: &Path, targets: I) -> Result<DownloadPlan, PlanError>
where
    I: IntoIterator<Item = Target>,
{
    let mut plan = DownloadPlan::default();
    for target in targets.into_iter().collect::<BTreeSet<_>>() {
        let path = destination.join(&target.path);
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {
                tracing::debug!("Skipping {}, already downloaded", target.path.display());
            }
            Ok(_) => return Err(PlanError::NotAFile(path)),
            Err(err)
                if err.kind() == ErrorKind::NotFound || err.kind() == ErrorKind::NotADirectory =>
            {
                plan.insert(target);
            }
            Err(source) => return Err(PlanError::Io { path, source }),
        }
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn target(url: &str, path: &str) -> Target {
        Target {
            url: url.to_string(),
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn keeps_missing_and_skips_existing_files() {
        let dest = TempDir::new().unwrap();
        fs::write(dest.path().join("done.txt"), b"already here").unwrap();

        let plan = filter_existing(
            dest.path(),
            vec![
                target("http://h/d/done.txt", "done.txt"),
                target("http://h/d/new.txt", "new.txt"),
                target("http://h/d/sub/new.bin", "sub/new.bin"),
            ],
        )
        .unwrap();

        assert_eq!(
            plan.into_targets(),
            vec![
                target("http://h/d/new.txt", "new.txt"),
                target("http://h/d/sub/new.bin", "sub/new.bin"),
            ]
        );
    }

    #[test]
    fn directory_in_place_of_file_is_an_error() {
        let dest = TempDir::new().unwrap();
        fs::create_dir(dest.path().join("file.txt")).unwrap();

        let result = filter_existing(
            dest.path(),
            vec![
                target("http://h/d/a.txt", "a.txt"),
                target("http://h/d/file.txt", "file.txt"),
            ],
        );

        match result {
            Err(PlanError::NotAFile(path)) => assert_eq!(path, dest.path().join("file.txt")),
            other => assert!(false, "expected NotAFile, got {:?}", other),
        }
    }

    #[test]
    fn file_in_place_of_parent_directory_is_left_to_the_downloader() {
        let dest = TempDir::new().unwrap();
        fs::write(dest.path().join("sub"), b"not a directory").unwrap();

        let plan =
            filter_existing(dest.path(), vec![target("http://h/d/sub/a.txt", "sub/a.txt")]).unwrap();

        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn colliding_local_paths_keep_the_first_url() {
        let dest = TempDir::new().unwrap();

        let plan = filter_existing(
            dest.path(),
            vec![
                target("http://h/d/a.jpg", "a.jpg"),
                target("http://h/d/a.JPG", "a.jpg"),
            ],
        )
        .unwrap();

        assert_eq!(plan.into_targets(), vec![target("http://h/d/a.JPG", "a.jpg")]);
    }

    #[test]
    fn empty_input_gives_empty_plan() {
        let dest = TempDir::new().unwrap();
        let plan = filter_existing(dest.path(), Vec::<Target>::new()).unwrap();
        assert!(plan.is_empty());
    }
}
