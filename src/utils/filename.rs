// src/utils/filename.rs

use std::sync::LazyLock;

use regex::Regex;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-.]").expect("static regex"));
static UNDERSCORE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("static regex"));

/// Makes `name` safe for every filesystem.
///
/// Keeps word characters (Unicode letters included), dash, underscore and dot;
/// everything else becomes `_`. Runs of `_` collapse and edge underscores are trimmed.
/// When `ensure_extension` is given it is appended unless already present.
pub fn sanitize_filename(name: &str, ensure_extension: Option<&str>) -> String {
    let safe = UNSAFE_CHARS.replace_all(name, "_");
    let mut safe = UNDERSCORE_RUNS
        .replace_all(&safe, "_")
        .trim_matches('_')
        .to_string();

    if let Some(ext) = ensure_extension {
        if !safe.to_lowercase().ends_with(&ext.to_lowercase()) {
            safe.push_str(ext);
        }
    }
    safe
}

/// ASCII-only variant for HTTP headers. Falls back to `document`.
pub fn ascii_filename(name: &str, max_len: usize) -> String {
    let ascii: String = name
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    let mut safe = sanitize_filename(&ascii, None);
    safe.truncate(max_len);
    if safe.is_empty() {
        "document".to_string()
    } else {
        safe
    }
}
