//! Shared key generation for storage backends.
//!
//! Key format: `{team_id}/{document_id}/{slug(base)}{ext}`, or
//! `{team_id}/{slug(base)}{ext}` for objects not tied to a document.

use uuid::Uuid;

/// Generate the storage key for an object.
///
/// The file name is split on its last dot; the base is slugified and the
/// extension (lowercased) is kept verbatim. All backends must use this
/// format so keys stay portable between them.
pub fn object_key(team_id: Uuid, document_id: Option<Uuid>, file_name: &str) -> String {
    let (base, ext) = split_extension(file_name);
    let slugged = slug(base);
    match document_id {
        Some(document_id) => format!("{}/{}/{}{}", team_id, document_id, slugged, ext),
        None => format!("{}/{}{}", team_id, slugged, ext),
    }
}

/// Slugify a file base name: lowercase, non-alphanumerics collapsed to a
/// single `-`, leading/trailing dashes trimmed. Empty input becomes `file`.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash && !out.is_empty() {
            out.push('-');
            last_dash = true;
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

fn split_extension(file_name: &str) -> (&str, String) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => (&file_name[..idx], file_name[idx..].to_ascii_lowercase()),
        _ => (file_name, String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_collapses_and_lowercases() {
        assert_eq!(slug("Quarterly Report (Final)"), "quarterly-report-final");
        assert_eq!(slug("already-slugged"), "already-slugged");
        assert_eq!(slug("__weird__name__"), "weird-name");
        assert_eq!(slug("ünïcode"), "n-code");
    }

    #[test]
    fn slug_of_empty_or_symbolic_name() {
        assert_eq!(slug(""), "file");
        assert_eq!(slug("!!!"), "file");
    }

    #[test]
    fn key_layout_with_document() {
        let team = Uuid::nil();
        let doc = Uuid::from_u128(1);
        let key = object_key(team, Some(doc), "My Deck.PDF");
        assert_eq!(key, format!("{}/{}/my-deck.pdf", team, doc));
    }

    #[test]
    fn key_layout_without_document() {
        let team = Uuid::from_u128(7);
        let key = object_key(team, None, "intro.mp4");
        assert_eq!(key, format!("{}/intro.mp4", team));
    }

    #[test]
    fn dotfile_keeps_name_as_base() {
        let team = Uuid::nil();
        // A leading dot is not an extension separator.
        let key = object_key(team, None, ".env");
        assert_eq!(key, format!("{}/env", team));
    }
}
