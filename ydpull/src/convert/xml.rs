//! Converter for the legacy XML note body (`<?xml` head, `<note>` root).
//!
//! The body is a flat sequence of block elements under `<body>`: `para`,
//! `image`, `code`, `todo`, `list-item` and `table`, each carrying its data
//! in child elements (`text`, `source`, `language`, `checked`, `content`).
//! Unknown blocks that still carry a `text` child degrade to paragraphs.

use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;

use super::{ConvertError, replace_with_markdown};

/// Cell grid carried by a `<table>` block as a JSON payload. The first row
/// is rendered as the header row.
#[derive(Debug, Deserialize)]
struct TableContent {
    cells: Vec<Vec<String>>,
}

#[derive(Debug, Default)]
struct Block {
    element: String,
    text: String,
    source: String,
    language: String,
    checked: String,
    content: String,
}

impl Block {
    fn new(element: &str) -> Self {
        Block {
            element: element.to_string(),
            ..Block::default()
        }
    }

    fn field_mut(&mut self, name: &[u8]) -> Option<&mut String> {
        match name {
            b"text" => Some(&mut self.text),
            b"source" => Some(&mut self.source),
            b"language" => Some(&mut self.language),
            b"checked" => Some(&mut self.checked),
            b"content" => Some(&mut self.content),
            _ => None,
        }
    }

    fn render(&self, out: &mut String) {
        match self.element.as_str() {
            "para" => {
                out.push_str(&self.text);
                out.push_str("\n\n");
            }
            "image" => {
                out.push_str(&format!("![]({})\n\n", self.source));
            }
            "code" => {
                out.push_str(&format!("```{}\n{}\n```\n\n", self.language, self.source));
            }
            "todo" => {
                let mark = if self.checked == "true" { "x" } else { " " };
                out.push_str(&format!("- [{mark}] {}\n", self.text));
            }
            "list-item" => {
                out.push_str(&format!("- {}\n", self.text));
            }
            "table" => render_table(&self.content, out),
            _ => {
                if !self.text.is_empty() {
                    out.push_str(&self.text);
                    out.push_str("\n\n");
                }
            }
        }
    }
}

fn render_table(content: &str, out: &mut String) {
    let Ok(table) = serde_json::from_str::<TableContent>(content) else {
        // Not the known grid payload; keep the raw content readable.
        if !content.is_empty() {
            out.push_str(content);
            out.push_str("\n\n");
        }
        return;
    };
    let mut rows = table.cells.iter();
    let Some(header) = rows.next() else { return };
    let escape = |cell: &str| cell.replace('|', "\\|");
    out.push_str(&format!(
        "| {} |\n",
        header.iter().map(|c| escape(c)).collect::<Vec<_>>().join(" | ")
    ));
    out.push_str(&format!("|{}\n", " --- |".repeat(header.len())));
    for row in rows {
        out.push_str(&format!(
            "| {} |\n",
            row.iter().map(|c| escape(c)).collect::<Vec<_>>().join(" | ")
        ));
    }
    out.push('\n');
}

fn is_block_element(name: &[u8]) -> bool {
    matches!(
        name,
        b"para" | b"image" | b"code" | b"todo" | b"list-item" | b"table"
    )
}

/// Renders the XML body to Markdown. A malformed document surfaces as
/// [`ConvertError::XmlParse`] so the caller can retry the HTML route.
pub(crate) fn xml_to_markdown(body: &str) -> Result<String, ConvertError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut out = String::new();
    let mut buf = Vec::new();
    let mut block: Option<Block> = None;
    let mut field: Option<Vec<u8>> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let name = e.local_name().as_ref().to_vec();
                if is_block_element(&name) {
                    block = Some(Block::new(&String::from_utf8_lossy(&name)));
                    field = None;
                } else if block.as_mut().is_some_and(|b| b.field_mut(&name).is_some()) {
                    field = Some(name);
                }
            }
            Event::Text(ref e) => {
                if let (Some(block), Some(field)) = (block.as_mut(), field.as_ref()) {
                    let text = e.unescape().unwrap_or_default();
                    if let Some(slot) = block.field_mut(field) {
                        slot.push_str(&text);
                    }
                }
            }
            Event::CData(ref e) => {
                if let (Some(block), Some(field)) = (block.as_mut(), field.as_ref()) {
                    if let Some(slot) = block.field_mut(field) {
                        slot.push_str(&String::from_utf8_lossy(e));
                    }
                }
            }
            Event::End(ref e) => {
                let name = e.local_name().as_ref().to_vec();
                if field.as_deref() == Some(name.as_slice()) {
                    field = None;
                } else if is_block_element(&name) {
                    if let Some(done) = block.take() {
                        done.render(&mut out);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    while out.ends_with('\n') {
        out.pop();
    }
    out.push('\n');
    Ok(out)
}

/// Converts a pulled XML note file in place, leaving a `.md` sibling.
pub fn xml_note_to_markdown(path: &Path) -> Result<PathBuf, ConvertError> {
    let raw = String::from_utf8(std::fs::read(path)?)?;
    let markdown = xml_to_markdown(&raw)?;
    replace_with_markdown(path, markdown)
}
