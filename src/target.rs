use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathMapError {
    #[error("{url} is not below {root}")]
    OutsideRoot { root: String, url: String },
    #[error("{url} maps to an empty local path")]
    Empty { url: String },
    #[error("{url} maps to unsafe local path {path:?}")]
    Unsafe { url: String, path: String },
}

/// A remote file and the path, relative to the destination, it is stored at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target {
    pub url: String,
    pub path: PathBuf,
}

impl Target {
    /// Maps `url` to a local relative path by stripping `root`, decoding
    /// percent escapes and lowercasing the extension.
    pub fn new(root: &str, url: &str) -> Result<Self, PathMapError> {
        let relative = url
            .strip_prefix(root)
            .ok_or_else(|| PathMapError::OutsideRoot {
                root: root.to_string(),
                url: url.to_string(),
            })?;
        let decoded = urlencoding::decode_binary(relative.as_bytes());
        let local = lowercase_extension(&String::from_utf8_lossy(&decoded));

        let mut path = PathBuf::new();
        for segment in local.split('/').filter(|segment| !segment.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(PathMapError::Unsafe {
                    url: url.to_string(),
                    path: local.clone(),
                });
            }
            path.push(segment);
        }
        if path.as_os_str().is_empty() {
            return Err(PathMapError::Empty {
                url: url.to_string(),
            });
        }

        Ok(Target {
            url: url.to_string(),
            path,
        })
    }
}

/// Lowercases the extension of the last segment of a `/` separated path.
///
/// Leading dots do not start an extension, so `.bashrc` is left alone.
pub fn lowercase_extension(path: &str) -> String {
    let name_start = path.rfind('/').map_or(0, |slash| slash + 1);
    let name = &path[name_start..];
    let stem_start = name.len() - name.trim_start_matches('.').len();
    match name[stem_start..].rfind('.') {
        Some(dot) => {
            let split = name_start + stem_start + dot;
            format!("{}{}", &path[..split], path[split..].to_lowercase())
        }
        None => path.to_string(),
    }
}
