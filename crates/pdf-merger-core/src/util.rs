//! Utility functions shared across the crate.

use std::path::PathBuf;

/// Get the user's config directory following XDG conventions.
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

/// Get the user's cache directory following XDG conventions.
///
/// Returns `$XDG_CACHE_HOME` if set, otherwise `$HOME/.cache`.
pub fn cache_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))
}

/// Default root for uploads and outputs.
pub fn storage_root() -> PathBuf {
    cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("pdf-merger")
}

/// Size in whole kilobytes, rounded to nearest.
pub const fn size_kb(bytes: u64) -> u64 {
    (bytes + 512) / 1024
}

/// Longest file name kept, in bytes, before the `.pdf` suffix.
///
/// Artifact keys prepend a 33-byte uuid prefix and must fit in 255 bytes.
pub const MAX_NAME_BYTES: usize = 200;

/// Reduce a user-supplied file name to a safe bare `.pdf` name.
///
/// Directory components, control characters and path separators are dropped.
/// Falls back to `fallback` when nothing usable remains.
pub fn sanitize_file_name(name: &str, fallback: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let mut cleaned = String::with_capacity(base.len());
    for c in base
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|'))
    {
        // Runs of dots collapse to one
        if c == '.' && cleaned.ends_with('.') {
            continue;
        }
        if cleaned.len() + c.len_utf8() > MAX_NAME_BYTES {
            break;
        }
        cleaned.push(c);
    }
    let cleaned = cleaned.trim().trim_matches('.').trim();

    if cleaned.is_empty() {
        return fallback.to_string();
    }

    let has_pdf_ext = std::path::Path::new(cleaned)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if has_pdf_ext {
        cleaned.to_string()
    } else {
        format!("{cleaned}.pdf")
    }
}
