//! Converter for the JSON editor note body (`{"` head).
//!
//! The editor stores documents under numbered keys: `"5"` is the child
//! list, `"6"` the node type, `"7"` the node properties and `"8"` the text
//! of a leaf run. Only the block types that survive a Markdown rendering
//! are mapped; anything else degrades to its collected text.

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::{ConvertError, replace_with_markdown};

const KEY_CHILDREN: &str = "5";
const KEY_TYPE: &str = "6";
const KEY_PROPS: &str = "7";
const KEY_TEXT: &str = "8";

/// Collects the text of a node and all of its descendant runs in order.
fn collect_text(node: &Value) -> String {
    let mut out = String::new();
    if let Some(text) = node.get(KEY_TEXT).and_then(Value::as_str) {
        out.push_str(text);
    }
    if let Some(children) = node.get(KEY_CHILDREN).and_then(Value::as_array) {
        for child in children {
            out.push_str(&collect_text(child));
        }
    }
    out
}

fn prop_str<'a>(block: &'a Value, name: &str) -> Option<&'a str> {
    block.get(KEY_PROPS)?.get(name)?.as_str()
}

fn prop_bool(block: &Value, name: &str) -> bool {
    block
        .get(KEY_PROPS)
        .and_then(|p| p.get(name))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn render_block(block: &Value, out: &mut String) {
    let kind = block.get(KEY_TYPE).and_then(Value::as_str).unwrap_or("");
    let text = collect_text(block);
    match kind {
        "heading" => {
            let level = block
                .get(KEY_PROPS)
                .and_then(|p| p.get("level"))
                .and_then(Value::as_u64)
                .unwrap_or(1)
                .clamp(1, 6) as usize;
            out.push_str(&format!("{} {text}\n\n", "#".repeat(level)));
        }
        "code" => {
            let language = prop_str(block, "language").unwrap_or("");
            out.push_str(&format!("```{language}\n{text}\n```\n\n"));
        }
        "image" => {
            let source = prop_str(block, "source").unwrap_or("");
            out.push_str(&format!("![]({source})\n\n"));
        }
        "todo" => {
            let mark = if prop_bool(block, "checked") { "x" } else { " " };
            out.push_str(&format!("- [{mark}] {text}\n"));
        }
        "list-item" => {
            if prop_bool(block, "ordered") {
                out.push_str(&format!("1. {text}\n"));
            } else {
                out.push_str(&format!("- {text}\n"));
            }
        }
        "quote" => {
            out.push_str(&format!("> {text}\n\n"));
        }
        _ => {
            if !text.is_empty() {
                out.push_str(&text);
                out.push_str("\n\n");
            }
        }
    }
}

pub(crate) fn json_to_markdown(body: &str) -> Result<String, ConvertError> {
    let doc: Value = serde_json::from_str(body)?;
    let blocks = doc
        .get(KEY_CHILDREN)
        .and_then(Value::as_array)
        .ok_or(ConvertError::JsonShape("document has no block list"))?;

    let mut out = String::new();
    for block in blocks {
        render_block(block, &mut out);
    }
    while out.ends_with('\n') {
        out.pop();
    }
    out.push('\n');
    Ok(out)
}

/// Converts a pulled JSON note file in place, leaving a `.md` sibling.
pub fn json_note_to_markdown(path: &Path) -> Result<PathBuf, ConvertError> {
    let raw = String::from_utf8(std::fs::read(path)?)?;
    let markdown = json_to_markdown(&raw)?;
    replace_with_markdown(path, markdown)
}
