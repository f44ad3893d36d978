use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

/// Matches a `截图` run together with the rest of its path segment, so the
/// replacement can decide whether separators are needed around it.
static SCREENSHOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^/]*?)截图([^/]*)").unwrap());

/// Rewrites `截图` ("screenshot") in media names to ASCII.
///
/// An underscore is added on either side unless the surrounding captured
/// text is empty or is itself exactly one of the separators `_`, `-`, `.`.
pub fn sanitize_media_name(name: &str) -> String {
    SCREENSHOT_RE
        .replace_all(name, |caps: &Captures<'_>| {
            let before = &caps[1];
            let after = &caps[2];
            let prefix = if !before.is_empty() && !matches!(before, "_" | "-" | ".") {
                "_"
            } else {
                ""
            };
            let suffix = if !after.is_empty() && !matches!(after, "_" | "-" | ".") {
                "_"
            } else {
                ""
            };
            format!("{before}{prefix}screenshot{suffix}{after}")
        })
        .into_owned()
}

/// Content-hash file name for a downloaded image: the MD5 of the payload
/// plus the resolved extension. Identical bytes always map to the same
/// name, which dedupes re-downloads for free.
pub fn content_hash_name(body: &[u8], extension: &str) -> String {
    format!("{:x}{extension}", md5::compute(body))
}

/// Picks an extension for a downloaded image.
///
/// Preference order: the URL path's own extension (unless it is the generic
/// `.bin`), then payload signature sniffing, then the content-type, then
/// `.jpg` as the final fallback.
pub fn image_extension(url: &Url, content_type: Option<&str>, body: &[u8]) -> String {
    if let Some(ext) = url_extension(url) {
        if ext != ".bin" {
            return ext;
        }
    }
    if let Some(ext) = sniff_image_extension(body) {
        return ext.to_string();
    }
    if let Some(ext) = content_type.and_then(extension_for_mime) {
        return ext;
    }
    ".jpg".to_string()
}

fn url_extension(url: &Url) -> Option<String> {
    let name = url.path().rsplit('/').next().unwrap_or("");
    let (_, suffix) = crate::sync::names::split_suffix(name);
    (!suffix.is_empty()).then(|| suffix.to_ascii_lowercase())
}

fn sniff_image_extension(body: &[u8]) -> Option<&'static str> {
    if body.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some(".png")
    } else if body.starts_with(b"\xff\xd8\xff") {
        Some(".jpg")
    } else if body.starts_with(b"GIF87a") || body.starts_with(b"GIF89a") {
        Some(".gif")
    } else if body.len() >= 12 && &body[..4] == b"RIFF" && &body[8..12] == b"WEBP" {
        Some(".webp")
    } else if body.starts_with(b"BM") {
        Some(".bmp")
    } else if body.starts_with(b"II*\x00") || body.starts_with(b"MM\x00*") {
        Some(".tiff")
    } else {
        None
    }
}

fn extension_for_mime(content_type: &str) -> Option<String> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/png" => Some(".png".to_string()),
        "image/jpeg" => Some(".jpg".to_string()),
        "image/gif" => Some(".gif".to_string()),
        "image/webp" => Some(".webp".to_string()),
        "image/bmp" => Some(".bmp".to_string()),
        "image/svg+xml" => Some(".svg".to_string()),
        "image/tiff" => Some(".tiff".to_string()),
        _ => essence.strip_prefix("image/").map(|sub| format!(".{sub}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_inserts_separators_around_replacement() {
        assert_eq!(sanitize_media_name("我的截图.png"), "我的_screenshot_.png");
    }

    #[test]
    fn sanitize_skips_prefix_when_nothing_precedes() {
        // ".png" is more than the bare "." separator, so the suffix side
        // still gets an underscore.
        assert_eq!(sanitize_media_name("截图.png"), "screenshot_.png");
    }

    #[test]
    fn sanitize_respects_existing_separators() {
        assert_eq!(sanitize_media_name("_截图_"), "_screenshot_");
        assert_eq!(sanitize_media_name("截图"), "screenshot");
    }

    #[test]
    fn sanitize_leaves_other_names_alone() {
        assert_eq!(sanitize_media_name("diagram.png"), "diagram.png");
    }

    #[test]
    fn url_extension_wins_when_specific() {
        let url = Url::parse("https://note.youdao.com/yws/res/1/pic.PNG").unwrap();
        assert_eq!(image_extension(&url, Some("image/gif"), b""), ".png");
    }

    #[test]
    fn generic_bin_extension_defers_to_sniffing() {
        let url = Url::parse("https://note.youdao.com/yws/res/1/pic.bin").unwrap();
        let png = b"\x89PNG\r\n\x1a\n....";
        assert_eq!(image_extension(&url, None, png), ".png");
    }

    #[test]
    fn content_type_breaks_ties_for_unknown_payloads() {
        let url = Url::parse("https://note.youdao.com/yws/res/1/ABCDEF").unwrap();
        assert_eq!(image_extension(&url, Some("image/webp"), b"????"), ".webp");
        assert_eq!(
            image_extension(&url, Some("image/x-icon; charset=binary"), b"????"),
            ".x-icon"
        );
    }

    #[test]
    fn jpg_is_the_last_resort() {
        let url = Url::parse("https://note.youdao.com/yws/res/1/ABCDEF").unwrap();
        assert_eq!(image_extension(&url, Some("application/octet-stream"), b"??"), ".jpg");
        assert_eq!(image_extension(&url, None, b"??"), ".jpg");
    }

    #[test]
    fn hash_names_are_deterministic() {
        let a = content_hash_name(b"same bytes", ".png");
        let b = content_hash_name(b"same bytes", ".png");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32 + ".png".len());
        assert_ne!(content_hash_name(b"other bytes", ".png"), a);
    }
}
