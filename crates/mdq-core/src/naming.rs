//! Portable file names for bundles built from user-visible titles.

/// Fallback when a title sanitizes to nothing.
pub const DEFAULT_BUNDLE_STEM: &str = "playlist";

/// Leaves room for an extension within the 255-byte NAME_MAX.
const MAX_STEM_BYTES: usize = 200;

/// Sanitizes a title for use as a file name stem on Linux, macOS and Windows.
///
/// - Replaces NUL, path separators, control chars and `<>:"|?*` with `_`
/// - Collapses runs of whitespace and of underscores
/// - Trims leading/trailing spaces, dots and underscores, and leading dashes
///   so the name is never read as a command-line option
/// - Truncates to a char boundary at 200 bytes
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut prev: Option<char> = None;

    for c in title.chars() {
        let c = match c {
            '\0' | '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_whitespace() => ' ',
            c if c.is_control() => '_',
            c => c,
        };
        if (c == '_' || c == ' ') && prev == Some(c) {
            continue;
        }
        out.push(c);
        prev = Some(c);
    }

    let trimmed = out
        .trim_start_matches(|c| c == ' ' || c == '.' || c == '_' || c == '-')
        .trim_end_matches(|c| c == ' ' || c == '.' || c == '_');
    if trimmed.len() <= MAX_STEM_BYTES {
        return trimmed.to_string();
    }
    let mut take = MAX_STEM_BYTES;
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].trim_end().to_string()
}

/// `<sanitized title>.<ext>`, falling back to `playlist.<ext>`.
pub fn bundle_file_name(title: Option<&str>, ext: &str) -> String {
    let stem = title.map(sanitize_title).unwrap_or_default();
    let stem = if stem.is_empty() {
        DEFAULT_BUNDLE_STEM
    } else {
        stem.as_str()
    };
    format!("{stem}.{ext}")
}
