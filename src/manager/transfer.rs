//! Pattern-filtered upload of a local file or directory tree.
//!
//! Remote paths always use `/`, whatever the local separator is.

use std::path::{Component, Path};

use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use crate::manager::error::Result;
use crate::manager::transport::RemoteSession;

/// Join like POSIX `join`: an absolute `name` replaces `base`.
pub(crate) fn join_remote(base: &str, name: &str) -> String {
    if name.starts_with('/') || base.is_empty() {
        name.to_string()
    } else if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// Collapse `.`, `..` and repeated separators; backslashes count as `/`.
pub(crate) fn normalize_remote_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// `relative` rendered with `/`, or `.` when empty.
fn relative_remote(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Upload `source` to `target` on `session`, keeping only files whose full
/// local path matches `pattern` from its first character.
///
/// When `target` is an existing remote directory the upload lands in
/// `target/<basename of source>`. With `clean_target` that destination is
/// removed and recreated first. Directories are mirrored one level at a time;
/// a failure midway leaves already uploaded files in place.
///
/// Returns the number of files uploaded.
pub(crate) async fn conditional_upload(
    session: &dyn RemoteSession,
    source: &str,
    target: &str,
    pattern: &str,
    clean_target: bool,
) -> Result<usize> {
    let matcher = Regex::new(&format!("^(?:{})", pattern))?;

    let mut target = target.to_string();
    if session.is_dir(&target).await? {
        let basename = Path::new(source)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        target = join_remote(&target, &basename);
    }

    if clean_target {
        session.rm_rf(&target).await?;
        session.mkdir(&target).await?;
    }

    let source = shellexpand::tilde(source).into_owned();
    let source_path = Path::new(&source);

    if !source_path.is_dir() {
        if matcher.is_match(&source) {
            session.upload(source_path, &target).await?;
            debug!("File '{}' uploaded to the remote folder '{}'", source, target);
            return Ok(1);
        }
        debug!(
            "Pattern '{}' doesn't match the file '{}', uploading skipped",
            pattern, source
        );
        return Ok(0);
    }

    let mut uploaded = 0;
    for entry in WalkDir::new(source_path).sort_by_file_name() {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(source_path) else {
            continue;
        };

        if entry.file_type().is_dir() {
            let target_dir = normalize_remote_path(&join_remote(&target, &relative_remote(relative)));
            session.mkdir(&target_dir).await?;
            continue;
        }

        // Symlinked directories are listed but not descended into.
        if entry.path_is_symlink() && entry.path().is_dir() {
            continue;
        }

        let parent = relative.parent().unwrap_or_else(|| Path::new(""));
        let target_dir = normalize_remote_path(&join_remote(&target, &relative_remote(parent)));
        let remote_path = join_remote(&target_dir, &entry.file_name().to_string_lossy());
        let local_path = entry.path().to_string_lossy();

        if matcher.is_match(&local_path) {
            session.upload(entry.path(), &remote_path).await?;
            uploaded += 1;
            debug!("File '{}' uploaded to '{}'", local_path, remote_path);
        } else {
            debug!(
                "Pattern '{}' doesn't match the file '{}', uploading skipped",
                pattern, local_path
            );
        }
    }

    Ok(uploaded)
}
