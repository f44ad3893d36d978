//! Legacy note body converters. Each reads a pulled note from disk, writes
//! the converted Markdown as a `.md` sibling and removes the original file.

mod html;
mod json;
mod xml;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use html::html_note_to_markdown;
pub use json::json_note_to_markdown;
pub use xml::xml_note_to_markdown;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("note body is not well-formed XML: {0}")]
    XmlParse(#[from] quick_xml::Error),
    #[error("note body is not valid JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("unexpected JSON note shape: {0}")]
    JsonShape(&'static str),
    #[error("note body is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl ConvertError {
    /// True for malformed XML, the signal to retry the note as a legacy
    /// HTML-flavored body.
    pub fn is_xml_parse(&self) -> bool {
        matches!(self, ConvertError::XmlParse(_))
    }
}

/// Path of the Markdown sibling for a pulled note file.
pub(crate) fn markdown_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, _) = crate::sync::names::split_suffix(&name);
    path.with_file_name(format!("{stem}.md"))
}

/// Writes the converted body next to the original and drops the original,
/// so only the Markdown rendition stays in the mirror.
pub(crate) fn replace_with_markdown(
    original: &Path,
    markdown: String,
) -> Result<PathBuf, ConvertError> {
    let target = markdown_sibling(original);
    std::fs::write(&target, markdown)?;
    if target != original {
        std::fs::remove_file(original)?;
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_sibling_swaps_suffix() {
        assert_eq!(
            markdown_sibling(Path::new("/tmp/a/report.note")),
            PathBuf::from("/tmp/a/report.md")
        );
    }

    #[test]
    fn markdown_sibling_appends_for_suffixless_names() {
        assert_eq!(
            markdown_sibling(Path::new("/tmp/a/scratch")),
            PathBuf::from("/tmp/a/scratch.md")
        );
    }

    #[test]
    fn replace_removes_the_original() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("old.note");
        std::fs::write(&original, b"raw").unwrap();
        let target = replace_with_markdown(&original, "# converted\n".to_string()).unwrap();
        assert_eq!(target, dir.path().join("old.md"));
        assert!(!original.exists());
        assert_eq!(std::fs::read_to_string(target).unwrap(), "# converted\n");
    }
}
