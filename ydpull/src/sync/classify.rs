use crate::sync::names::MARKDOWN_SUFFIX;

/// Storage format of a remote note, decided from its suffix and, when the
/// suffix is ambiguous, the first bytes of its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    /// Anything that is not a note: copied to disk verbatim.
    Other,
    /// Native Markdown, used as-is.
    Markdown,
    /// Legacy XML note body, converted to Markdown.
    LegacyXml,
    /// Current JSON editor note body, converted to Markdown.
    LegacyJson,
}

impl NoteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NoteKind::Other => "other",
            NoteKind::Markdown => "markdown",
            NoteKind::LegacyXml => "xml note",
            NoteKind::LegacyJson => "json note",
        }
    }

    /// Whether the note ends up as a Markdown document under `posts/`.
    pub fn becomes_markdown(self) -> bool {
        !matches!(self, NoteKind::Other)
    }
}

/// Suffixes that cannot be judged without looking at the content.
pub fn needs_content_probe(suffix: &str) -> bool {
    matches!(suffix, ".note" | ".clip" | "")
}

/// Classifies a note. `head` is only consulted for ambiguous suffixes; a
/// `.md` suffix wins without any content inspection.
pub fn classify(suffix: &str, head: &[u8]) -> NoteKind {
    if suffix == MARKDOWN_SUFFIX {
        return NoteKind::Markdown;
    }
    if !needs_content_probe(suffix) {
        return NoteKind::Other;
    }
    if head.starts_with(b"<?xml") {
        NoteKind::LegacyXml
    } else if head.starts_with(b"{\"") {
        NoteKind::LegacyJson
    } else {
        NoteKind::Other
    }
}
