use std::path::{Path, PathBuf};

/// Escapes characters that are unsafe in file names.
///
/// Path separators, Windows-reserved characters and control characters become `_`,
/// double quotes become single quotes. Leading/trailing dots and whitespace are
/// stripped; an empty result becomes `unnamed`.
///
/// # Example
///
/// ```
/// use sptube::core::utils::escape_filename;
///
/// assert_eq!(escape_filename("AC/DC - Back*.ogg"), "AC_DC - Back_.ogg");
/// ```
pub fn escape_filename(filename: &str) -> String {
    let mut result = String::with_capacity(filename.len());

    for c in filename.chars() {
        match c {
            '/' | '\\' => result.push('_'),
            ':' | '*' | '?' | '<' | '>' | '|' => result.push('_'),
            '"' => result.push('\''),
            c if c.is_control() => result.push('_'),
            _ => result.push(c),
        }
    }

    let result = result.trim_matches(|c: char| c.is_whitespace() || c == '.');
    if result.is_empty() {
        "unnamed".to_string()
    } else {
        result.to_string()
    }
}

/// Returns at most `max` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Shortens `text` to `max` characters, appending `...` when something was cut.
pub fn ellipsize(text: &str, max: usize) -> String {
    let cut = truncate_chars(text, max);
    if cut.len() < text.len() {
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

/// Builds a collision-free path inside `dir` for one request's temp file.
pub fn unique_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let stem = escape_filename(stem);
    let name = if extension.is_empty() {
        format!("{}_{}", stem, uuid::Uuid::new_v4().simple())
    } else {
        format!("{}_{}.{}", stem, uuid::Uuid::new_v4().simple(), extension)
    };
    dir.join(name)
}

/// Formats seconds as `mm:ss`, or `hh:mm:ss` past the hour.
pub fn format_clock(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
