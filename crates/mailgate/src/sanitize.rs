//! Helpers for sanitizing data before it enters logs, span attributes, or storage paths.
//!
//! Logs are shipped off-host for remediation, so no credentials or full
//! mailbox addresses may appear in them.

use std::path::Path;

/// Masks the local part of an address: `alice@example.com` → `a****@example.com`.
///
/// Strings without an `@` are masked entirely except for their first character.
pub fn mask_address(address: &str) -> String {
    let (local, domain) = match address.split_once('@') {
        Some((local, domain)) => (local, Some(domain)),
        None => (address, None),
    };

    let mut masked: String = local.chars().take(1).collect();
    masked.push_str("****");
    if let Some(domain) = domain {
        masked.push('@');
        masked.push_str(domain);
    }
    masked
}

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Sanitizes an attachment filename so it is usable as a flat storage name.
///
/// Path separators and control characters become `_`, leading/trailing dots
/// and spaces are trimmed, and the result is capped at 255 bytes.
pub fn sanitize_filename(filename: &str) -> String {
    let filename = filename
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();

    let filename = filename.trim_matches(|c| c == '.' || c == ' ');

    if filename.is_empty() {
        return "attachment".to_string();
    }

    if filename.len() <= 255 {
        return filename.to_string();
    }

    let ext = filename
        .rfind('.')
        .map(|pos| &filename[pos..])
        .filter(|ext| ext.len() <= 50)
        .unwrap_or("");
    let mut cut = 255 - ext.len();
    while !filename.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &filename[..cut], ext)
}
