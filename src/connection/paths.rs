//! Remote path helpers
//!
//! Remote paths always use `/`, independent of the local platform.

/// Final component of a remote path
///
/// One trailing separator is ignored. `None` when no separator remains,
/// which means the server reported something that is not a path.
pub(crate) fn remote_basename(path: &str) -> Option<&str> {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    let (_, name) = trimmed.rsplit_once('/')?;
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Final component of a remote path, or the whole path when it has no
/// separator
pub(crate) fn leaf_name(path: &str) -> &str {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Parent directory of a remote path
pub(crate) fn remote_parent(path: &str) -> &str {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    match trimmed.rsplit_once('/') {
        Some(("", _)) => "/",
        Some((parent, _)) => parent,
        None => ".",
    }
}

/// Append `name` to a remote directory without doubling the separator
pub(crate) fn remote_join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}
