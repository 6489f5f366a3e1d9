//! Filename validation and sanitisation

use unicode_normalization::UnicodeNormalization;

const FALLBACK_NAME: &str = "upload";

/// Whether `filename` carries one of the allowed extensions (case-insensitive)
pub fn allowed_file(filename: &str, allowed_extensions: &[String]) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => {
            let ext = ext.to_lowercase();
            allowed_extensions.iter().any(|allowed| *allowed == ext)
        }
        _ => false,
    }
}

/// Reduce a client-supplied filename to a safe, flat ASCII name.
///
/// Accented letters are decomposed (NFKD) and reduced to their ASCII base.
/// Path separators become whitespace, whitespace runs collapse to `_`, and
/// only `[A-Za-z0-9_.-]` survives. Leading and trailing `.`/`_` are removed,
/// so the result can never walk out of a directory.
pub fn secure_filename(filename: &str) -> String {
    let flattened: String = filename
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");

    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}
