//! Media migration for converted Markdown documents.
//!
//! Scans a document for note-store image and attachment references,
//! downloads each one and rewrites the reference to its new home: the
//! SM.MS relay when configured, otherwise `assets/<doc>/` next to the
//! document's `posts/` directory.

use std::path::{Path, PathBuf};

use regex::Regex;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;
use ydnote_core::{FetchedUrl, YdnoteClient};

use crate::media::naming;
use crate::media::smms::SmmsClient;
use crate::sync::names::ASSETS_DIR;

/// Host that marks a reference as living in the note store.
const NOTE_HOST: &str = "note.youdao.com";

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("document is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Rewrites note-store media references in pulled documents. Failures on a
/// single reference are logged and leave that reference untouched; only
/// document-level I/O aborts the migration.
pub struct MediaMigrator {
    api: YdnoteClient,
    smms: Option<SmmsClient>,
    relative_links: bool,
    image_re: Regex,
    attach_re: Regex,
}

impl MediaMigrator {
    pub fn new(api: YdnoteClient, smms: Option<SmmsClient>, relative_links: bool) -> Self {
        Self::with_note_host(api, smms, relative_links, NOTE_HOST)
    }

    /// Binds the reference scan to a different host, so tests can run the
    /// full pipeline against a local mock server.
    pub(crate) fn with_note_host(
        api: YdnoteClient,
        smms: Option<SmmsClient>,
        relative_links: bool,
        host: &str,
    ) -> Self {
        let marker = regex::escape(host);
        let image_re = Regex::new(&format!(r"!\[.*?\]\((.*?{marker}.*?)\)")).unwrap();
        let attach_re = Regex::new(&format!(r"(!?)\[(.*?)\]\((https?://{marker}.*?)\)")).unwrap();
        MediaMigrator {
            api,
            smms,
            relative_links,
            image_re,
            attach_re,
        }
    }

    /// Migrates every note-store reference in `document`, a Markdown file
    /// under `folder`'s `posts/` directory.
    pub async fn migrate_document(
        &self,
        document: &Path,
        folder: &Path,
    ) -> Result<(), MigrateError> {
        let mut content = String::from_utf8(std::fs::read(document)?)?;
        let stem = document
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let image_urls: Vec<String> = self
            .image_re
            .captures_iter(&content)
            .map(|caps| caps[1].to_string())
            .collect();
        if !image_urls.is_empty() {
            info!(
                document = %document.display(),
                count = image_urls.len(),
                "migrating image references"
            );
        }
        for url in &image_urls {
            if let Some(replacement) = self.resolve_image(url, &stem, folder).await {
                content = content.replace(url.as_str(), &replacement);
            }
        }

        // Image references were rewritten above, so anything still pointing
        // at the note store here is a plain attachment link.
        let attachments: Vec<(String, String)> = self
            .attach_re
            .captures_iter(&content)
            .filter(|caps| caps[1].is_empty())
            .map(|caps| (caps[2].to_string(), caps[3].to_string()))
            .collect();
        if !attachments.is_empty() {
            info!(
                document = %document.display(),
                count = attachments.len(),
                "migrating attachment references"
            );
        }
        for (label, url) in &attachments {
            if let Some(replacement) = self.resolve_attachment(label, url, &stem, folder).await {
                content = content.replace(url.as_str(), &replacement);
            }
        }

        std::fs::write(document, content)?;
        Ok(())
    }

    async fn resolve_image(&self, url: &str, stem: &str, folder: &Path) -> Option<String> {
        let fetched = match self.api.fetch_url(url).await {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!(%url, error = %err, "image download failed; reference left as is");
                return None;
            }
        };
        if fetched.status != StatusCode::OK {
            warn!(%url, status = %fetched.status, "image fetch failed; reference left as is");
            return None;
        }
        let Some(content_type) = fetched.content_type.as_deref() else {
            warn!(%url, "image fetch had no content-type; reference left as is");
            return None;
        };
        let essence = normalize_content_type(content_type);
        if !essence.starts_with("image/") && essence != "application/octet-stream" {
            warn!(%url, content_type = %essence, "fetched content is not an image; reference left as is");
            return None;
        }
        if let Some(smms) = &self.smms {
            let upload_name = url.rsplit('/').next().unwrap_or("image").to_string();
            match smms.upload(&upload_name, fetched.body.clone()).await {
                Ok(hosted) => {
                    info!(%url, %hosted, "image relayed to sm.ms");
                    return Some(hosted);
                }
                Err(err) => {
                    warn!(%url, error = %err, "sm.ms upload failed; storing the image locally");
                }
            }
        }
        self.store_image(url, &fetched, &essence, stem, folder)
    }

    fn store_image(
        &self,
        url: &str,
        fetched: &FetchedUrl,
        essence: &str,
        stem: &str,
        folder: &Path,
    ) -> Option<String> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(%url, error = %err, "unparsable image url; reference left as is");
                return None;
            }
        };
        let extension = naming::image_extension(&parsed, Some(essence), &fetched.body);
        let file_name = naming::content_hash_name(&fetched.body, &extension);
        let target = self.write_asset(&file_name, &fetched.body, stem, folder)?;
        info!(%url, path = %target.display(), "image stored locally");
        // Images relayed through SM.MS never use relative fallbacks, so a
        // rerun with a working relay finds them by absolute path.
        Some(self.render_link(&target, stem, self.smms.is_none()))
    }

    async fn resolve_attachment(
        &self,
        label: &str,
        url: &str,
        stem: &str,
        folder: &Path,
    ) -> Option<String> {
        let fetched = match self.api.fetch_url(url).await {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!(%url, error = %err, "attachment download failed; reference left as is");
                return None;
            }
        };
        if fetched.status != StatusCode::OK || fetched.content_type.is_none() {
            warn!(%url, status = %fetched.status, "attachment fetch failed; reference left as is");
            return None;
        }
        let base_name = Url::parse(url)
            .ok()
            .map(|u| u.path().rsplit('/').next().unwrap_or("").to_string())
            .unwrap_or_default();
        // The share endpoint redirects to a signed URL whose query carries
        // the real file name.
        let suffix = match fetched.final_url.query() {
            Some(query) if !query.is_empty() => fetched
                .final_url
                .query_pairs()
                .find(|(key, _)| key == "filename")
                .or_else(|| {
                    fetched
                        .final_url
                        .query_pairs()
                        .find(|(key, _)| key == "download")
                })
                .map(|(_, value)| value.into_owned())
                .unwrap_or_default(),
            _ => label.to_string(),
        };
        let file_name = naming::sanitize_media_name(&format!("{base_name}{suffix}"));
        let target = self.write_asset(&file_name, &fetched.body, stem, folder)?;
        info!(%url, path = %target.display(), "attachment stored locally");
        Some(self.render_link(&target, stem, true))
    }

    fn write_asset(
        &self,
        file_name: &str,
        body: &[u8],
        stem: &str,
        folder: &Path,
    ) -> Option<PathBuf> {
        let dir = folder.join(ASSETS_DIR).join(stem);
        if let Err(err) = std::fs::create_dir_all(&dir) {
            warn!(path = %dir.display(), error = %err, "cannot create asset directory");
            return None;
        }
        let target = dir.join(file_name);
        if let Err(err) = std::fs::write(&target, body) {
            warn!(path = %target.display(), error = %err, "cannot write asset");
            return None;
        }
        Some(target)
    }

    fn render_link(&self, target: &Path, stem: &str, allow_relative: bool) -> String {
        if self.relative_links && allow_relative {
            let name = target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            // Angle brackets keep names with spaces or parentheses valid.
            return format!("<../{ASSETS_DIR}/{stem}/{name}>");
        }
        target.display().to_string()
    }
}

fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}
