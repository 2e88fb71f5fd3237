//! Sequential file naming
//!
//! Finds the next free path in a sequentially numbered set of files
//! (`IMAGE1.jpg`, `IMAGE2.jpg`, ...) with an exponential probe followed by a
//! binary search, so only O(log n) existence checks are needed for n
//! existing files.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Placeholder marking the integer slot in a pattern
pub const INDEX_SLOT: &str = "{}";

/// A file name template with exactly one integer slot, rooted in a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturePattern {
    dir: PathBuf,
    prefix: String,
    suffix: String,
}

impl CapturePattern {
    /// Build a pattern such as `IMAGE{}.jpg` inside `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>, template: &str) -> Result<Self> {
        let mut parts = template.split(INDEX_SLOT);
        let (prefix, suffix) = match (parts.next(), parts.next(), parts.next()) {
            (Some(prefix), Some(suffix), None) => (prefix, suffix),
            _ => {
                return Err(Error::Config(format!(
                    "capture pattern {:?} must contain exactly one {} slot",
                    template, INDEX_SLOT
                )))
            }
        };

        if prefix.contains('/') || suffix.contains('/') {
            return Err(Error::Config(format!(
                "capture pattern {:?} must be a bare file name",
                template
            )));
        }

        Ok(Self {
            dir: dir.into(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    /// Path for a given index
    pub fn path(&self, index: u64) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", self.prefix, index, self.suffix))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Next free path for `pattern`, checking the real filesystem.
pub fn next_path(pattern: &CapturePattern) -> Result<PathBuf> {
    next_path_with(pattern, |path| path.try_exists())
}

/// Next free path for `pattern` using a caller-supplied existence oracle.
///
/// The oracle is assumed monotone over the gap-free prefix of existing
/// indices. For sparse sets the result is some free index inside the
/// bracketing interval rather than necessarily the globally lowest one.
pub fn next_path_with<F>(pattern: &CapturePattern, mut exists: F) -> Result<PathBuf>
where
    F: FnMut(&Path) -> io::Result<bool>,
{
    let mut probe = |index: u64| -> Result<bool> {
        let path = pattern.path(index);
        exists(&path).map_err(|e| Error::filesystem(path, e))
    };

    // Exponential search: the answer lies in (i/2, i]
    let mut i: u64 = 1;
    while probe(i)? {
        i = i.checked_mul(2).ok_or_else(|| {
            Error::Config(format!(
                "no free index left for pattern in {:?}",
                pattern.dir()
            ))
        })?;
    }

    // Narrow (a, b] until a + 1 == b
    let (mut a, mut b) = (i / 2, i);
    while a + 1 < b {
        let c = a + (b - a) / 2;
        if probe(c)? {
            a = c;
        } else {
            b = c;
        }
    }

    Ok(pattern.path(b))
}
