//! Sentinel file naming
//!
//! Archive installs record their source URL in a hidden file next to the
//! installation: `/usr/local/go` is tracked by `/usr/local/.go.source_url`.

use std::path::{Path, PathBuf};

use crate::install::error::StateFileError;

const STATE_FILE_SUFFIX: &str = ".source_url";

/// Derives the sentinel path for an installation directory.
///
/// This works on the raw path string rather than [`Path::file_name`], which
/// would silently skip a trailing `.` or `..`. Intermediate `.` and `..`
/// components are kept as-is.
pub fn state_file(path: &Path) -> Result<PathBuf, StateFileError> {
    let no_default = || StateFileError::NoDefault {
        path: path.to_path_buf(),
    };

    let raw = path.to_str().ok_or_else(no_default)?;
    let trimmed = raw.trim_end_matches('/');

    let (parent, name) = match trimmed.rsplit_once('/') {
        Some((parent, name)) => (Some(parent), name),
        None => (None, trimmed),
    };

    if name.is_empty() || name == "." || name == ".." {
        return Err(no_default());
    }

    let file_name = format!(".{}{}", name, STATE_FILE_SUFFIX);
    Ok(match parent {
        Some(parent) => PathBuf::from(format!("{}/{}", parent, file_name)),
        None => PathBuf::from(file_name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/usr/local/go", "/usr/local/.go.source_url")]
    #[case("/go", "/.go.source_url")]
    #[case("/./go", "/./.go.source_url")]
    #[case("/../go", "/../.go.source_url")]
    #[case("/...", "/.....source_url")]
    #[case("/opt/.go", "/opt/..go.source_url")]
    #[case("/usr/local/go/", "/usr/local/.go.source_url")]
    #[case("go", ".go.source_url")]
    fn state_file_is_sibling_of_installation(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(
            state_file(Path::new(path)).unwrap(),
            PathBuf::from(expected)
        );
    }

    #[rstest]
    #[case("/")]
    #[case("/.")]
    #[case("/..")]
    #[case("/usr/..")]
    #[case("")]
    fn state_file_fails_without_reasonable_default(#[case] path: &str) {
        let err = state_file(Path::new(path)).unwrap_err();

        assert_eq!(
            err,
            StateFileError::NoDefault {
                path: PathBuf::from(path)
            }
        );
        assert!(err.to_string().contains("No reasonable default state_file"));
    }
}
