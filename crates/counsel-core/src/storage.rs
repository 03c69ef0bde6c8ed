use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

fn valid_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Build the storage directory for one case:
/// `{root}/users/{user_id}/cases/{case_id}`.
///
/// Ids are rejected (not sanitized) unless they are `[A-Za-z0-9_-]+`, so
/// path separators and parent references can never reach the filesystem.
pub fn case_dir(root: &Path, user_id: &str, case_id: &str) -> Result<PathBuf> {
    if !valid_id(user_id) {
        bail!("invalid user id");
    }
    if !valid_id(case_id) {
        bail!("invalid case id");
    }
    Ok(root.join("users").join(user_id).join("cases").join(case_id))
}
