use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;
use tracing::{info, warn};

use crate::sync::names::{ASSETS_DIR, MARKDOWN_SUFFIX, POSTS_DIR};

/// Output directory for publish-ready copies, next to `posts/`.
pub const PLATFORM_READY_DIR: &str = "platform_ready";

const GITHUB_RAW_BASE: &str = "https://raw.githubusercontent.com";

const RED: &str = "#e74c3c";
const BLUE: &str = "#3498db";
const GREEN: &str = "#27ae60";

static ANGLE_IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[(.*?)\]\(<(.*?)>\)").unwrap());
static PLAIN_IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[(.*?)\]\((.*?)\)").unwrap());
static HTML_IMG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<img\s+[^>]*src=["']([^"']+)["'][^>]*>"#).unwrap());
static SPAN_STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<span\s+style="([^"]+)">(.+?)</span>"#).unwrap());
// Boundary keeps the text-color scan from matching inside `background-color`.
static COLOR_PROP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:^|[;\s])color:\s*([^;"'>]+)"#).unwrap());
static BG_COLOR_PROP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"background-color:\s*([^;"'>]+)"#).unwrap());
static RGB_FN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^rgb\s*\(\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*\)").unwrap());
static HEX6_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#?([0-9a-f]{6})").unwrap());
static HEX3_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#?([0-9a-f]{3})$").unwrap());

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("posts directory not found: {0}")]
    MissingPosts(PathBuf),
    #[error("no markdown documents under {0}")]
    Empty(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where rewritten image references point on the GitHub raw CDN.
#[derive(Debug, Clone)]
pub struct GithubTarget {
    pub user: String,
    pub repo: String,
    pub branch: String,
}

impl GithubTarget {
    fn raw_url(&self, path: &str) -> String {
        format!(
            "{GITHUB_RAW_BASE}/{}/{}/{}/{path}",
            self.user, self.repo, self.branch
        )
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExportReport {
    pub converted: usize,
    pub failed: usize,
}

/// Rewrites mirrored documents for paste-and-publish platforms that cannot
/// resolve repository-relative image links.
pub struct PlatformExporter {
    mirror_root: PathBuf,
    github: GithubTarget,
}

impl PlatformExporter {
    pub fn new(mirror_root: PathBuf, github: GithubTarget) -> Self {
        PlatformExporter { mirror_root, github }
    }

    /// Converts every document under `posts/` into `platform_ready/`.
    /// Per-document failures are logged and counted, not fatal.
    pub fn run(&self) -> Result<ExportReport, ExportError> {
        let posts_dir = self.mirror_root.join(POSTS_DIR);
        if !posts_dir.is_dir() {
            return Err(ExportError::MissingPosts(posts_dir));
        }
        let output_dir = self.mirror_root.join(PLATFORM_READY_DIR);
        std::fs::create_dir_all(&output_dir)?;

        let mut documents: Vec<PathBuf> = std::fs::read_dir(&posts_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.ends_with(MARKDOWN_SUFFIX))
            })
            .collect();
        documents.sort();
        if documents.is_empty() {
            return Err(ExportError::Empty(posts_dir));
        }

        let mut report = ExportReport::default();
        for document in documents {
            let output = output_dir.join(document.file_name().unwrap_or_default());
            match self.export_document(&document, &output) {
                Ok(()) => {
                    info!(path = %output.display(), "document exported");
                    report.converted += 1;
                }
                Err(err) => {
                    warn!(path = %document.display(), error = %err, "export failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    fn export_document(&self, input: &Path, output: &Path) -> std::io::Result<()> {
        let content = std::fs::read_to_string(input)?;
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let rewritten = self.rewrite_image_links(&content, &stem);
        let recolored = normalize_colors(&rewritten);
        let header = format!("<!-- source: {stem}.md -->\n<!-- images hosted on GitHub -->\n\n");
        std::fs::write(output, format!("{header}{recolored}"))
    }

    /// Points relative image references at the GitHub raw CDN. Handles the
    /// angle-bracket form the mirror writes, bare markdown paths, and inline
    /// HTML `<img>` tags. Absolute references pass through untouched.
    fn rewrite_image_links(&self, content: &str, note_name: &str) -> String {
        let content = ANGLE_IMAGE_RE.replace_all(content, |caps: &Captures| {
            let target = &caps[2];
            if is_absolute_url(target) {
                return caps[0].to_string();
            }
            let repo_path = if let Some(rest) = target.strip_prefix("../") {
                if under_assets(rest) { rest } else { return caps[0].to_string() }
            } else if under_assets(target) {
                target
            } else {
                return caps[0].to_string();
            };
            format!("![{}]({})", &caps[1], self.github.raw_url(&encode_path(repo_path)))
        });

        let content = PLAIN_IMAGE_RE.replace_all(&content, |caps: &Captures| {
            let target = &caps[2];
            if target.starts_with('<') || is_absolute_url(target) || target.starts_with('/') {
                return caps[0].to_string();
            }
            let repo_path = if under_assets(target) {
                target.to_string()
            } else {
                format!("{ASSETS_DIR}/{note_name}/{target}")
            };
            format!("![{}]({})", &caps[1], self.github.raw_url(&encode_path(&repo_path)))
        });

        HTML_IMG_RE
            .replace_all(&content, |caps: &Captures| {
                let src = &caps[1];
                if is_absolute_url(src) || !under_assets(src) {
                    return caps[0].to_string();
                }
                caps[0].replace(src, &self.github.raw_url(&encode_path(src)))
            })
            .into_owned()
    }
}

fn under_assets(target: &str) -> bool {
    target
        .strip_prefix(ASSETS_DIR)
        .is_some_and(|rest| rest.starts_with('/'))
}

fn is_absolute_url(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

/// Percent-encodes each path segment, leaving the separators alone.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Folds inline span colors onto a fixed palette so documents look the same
/// on every platform. Unrecognized colors are kept as written.
pub fn normalize_colors(content: &str) -> String {
    SPAN_STYLE_RE
        .replace_all(content, |caps: &Captures| {
            let style = &caps[1];
            let text = &caps[2];
            let mut parts = Vec::new();
            if let Some(color) = COLOR_PROP_RE.captures(style) {
                let value = color[1].trim();
                let normalized = normalize_single_color(value);
                parts.push(format!("color: {}", normalized.unwrap_or(value)));
            }
            if let Some(bg) = BG_COLOR_PROP_RE.captures(style) {
                let value = bg[1].trim();
                let normalized = normalize_single_color(value);
                parts.push(format!("background-color: {}", normalized.unwrap_or(value)));
            }
            if parts.is_empty() {
                caps[0].to_string()
            } else {
                format!("<span style=\"{}\">{text}</span>", parts.join("; "))
            }
        })
        .into_owned()
}

fn normalize_single_color(color: &str) -> Option<&'static str> {
    let color = color.trim().to_lowercase();
    match color.as_str() {
        "red" | "rgb(255, 0, 0)" | "rgb(255,0,0)" | "#ff0000" | "#e74c3c" => return Some(RED),
        "blue" | "rgb(0, 0, 255)" | "rgb(0,0,255)" | "#0000ff" | "#3498db" => return Some(BLUE),
        "green" | "rgb(0, 255, 0)" | "rgb(0,255,0)" | "#00ff00" | "#27ae60" => return Some(GREEN),
        _ => {}
    }
    if let Some(caps) = RGB_FN_RE.captures(&color) {
        let r = caps[1].parse::<i64>().ok()?;
        let g = caps[2].parse::<i64>().ok()?;
        let b = caps[3].parse::<i64>().ok()?;
        return classify_rgb(r, g, b);
    }
    if let Some(caps) = HEX6_RE.captures(&color) {
        let hex = &caps[1];
        let r = i64::from_str_radix(&hex[0..2], 16).ok()?;
        let g = i64::from_str_radix(&hex[2..4], 16).ok()?;
        let b = i64::from_str_radix(&hex[4..6], 16).ok()?;
        return classify_rgb(r, g, b);
    }
    if let Some(caps) = HEX3_RE.captures(&color) {
        let hex = caps[1].as_bytes();
        // #abc reads as #aabbcc, so each digit contributes value * 17.
        let expand = |c: u8| (c as char).to_digit(16).map(|d| d as i64 * 17);
        return classify_rgb(expand(hex[0])?, expand(hex[1])?, expand(hex[2])?);
    }
    None
}

/// Buckets an RGB triple into the palette when one channel clearly
/// dominates; returns None for everything in between.
fn classify_rgb(r: i64, g: i64, b: i64) -> Option<&'static str> {
    if (r > 200 && g < 100 && b < 100) || (r > 150 && r - g > 80 && r - b > 80) {
        return Some(RED);
    }
    if (r < 100 && g < 150 && b > 200) || (b > 150 && b - r > 80 && b - g > 50) {
        return Some(BLUE);
    }
    if (r < 100 && g > 200 && b < 100) || (g > 150 && g - r > 80 && g - b > 80) {
        return Some(GREEN);
    }
    None
}
