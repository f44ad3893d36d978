use std::path::Path;

/// Directory that receives converted Markdown documents, per mirrored folder.
pub const POSTS_DIR: &str = "posts";
/// Directory that receives migrated media, per mirrored folder.
pub const ASSETS_DIR: &str = "assets";

/// Suffix that marks a note as native Markdown.
pub const MARKDOWN_SUFFIX: &str = ".md";

/// Characters that cannot appear in a mirrored file name.
const FORBIDDEN: &[char] = &['\\', '/', '"', ':', '|', '*', '?', '#', '>'];

/// Normalizes a remote note title into a safe local file name.
///
/// Embedded newlines are removed, surrounding whitespace is trimmed, `<`
/// becomes `_` and the remaining forbidden characters are deleted outright.
pub fn normalize_note_name(name: &str) -> String {
    let flattened: String = name.chars().filter(|c| *c != '\n').collect();
    flattened
        .trim()
        .chars()
        .map(|c| if c == '<' { '_' } else { c })
        .filter(|c| !FORBIDDEN.contains(c))
        .collect()
}

/// Splits a file name into stem and suffix, keeping the dot on the suffix.
///
/// A leading dot does not start a suffix, so `.profile` has no suffix and
/// `report.note` splits into `report` and `.note`.
pub fn split_suffix(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && name[..idx].chars().any(|c| c != '.') => {
            (&name[..idx], &name[idx..])
        }
        _ => (name, ""),
    }
}

/// Root-relative path with `/` separators, the key format of the
/// synced-path set.
pub(crate) fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}
