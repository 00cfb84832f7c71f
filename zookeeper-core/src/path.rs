//! Znode path validation.

use crate::error::{Result, ZooKeeperError};

/// Validates a znode path.
///
/// A valid path is absolute, has no trailing `/` (except the root itself),
/// and contains no empty, `.` or `..` segments and no control characters.
pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(path, "path must be a non-empty string"));
    }

    if !path.starts_with('/') {
        return Err(invalid(path, "path must start with / character"));
    }

    if path.len() == 1 {
        return Ok(());
    }

    if path.ends_with('/') {
        return Err(invalid(path, "path must not end with / character"));
    }

    for segment in path[1..].split('/') {
        match segment {
            "" => return Err(invalid(path, "empty node name specified")),
            "." | ".." => return Err(invalid(path, "relative paths not allowed")),
            _ => {}
        }
    }

    if let Some(c) = path.chars().find(|c| is_forbidden(*c)) {
        return Err(invalid(
            path,
            &format!("invalid character \\u{{{:04x}}}", c as u32),
        ));
    }

    Ok(())
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\u{0000}'..='\u{001f}'
        | '\u{007f}'..='\u{009f}'
        | '\u{e000}'..='\u{f8ff}'
        | '\u{fff0}'..='\u{ffff}')
}

fn invalid(path: &str, reason: &str) -> ZooKeeperError {
    ZooKeeperError::InvalidArgument(format!("invalid path {:?}: {}", path, reason))
}
