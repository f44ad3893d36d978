use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tracing::{info, warn};
use ydnote_core::{ApiError, FileEntry, YdnoteClient};

use crate::convert::{self, ConvertError};
use crate::media::migrate::{MediaMigrator, MigrateError};
use crate::sync::classify::{self, NoteKind};
use crate::sync::names::{self, relative_key};
use crate::sync::reaper;

/// Failure that ends the whole run: the account is unreachable, a listing
/// broke, or the mirror tree itself cannot be maintained.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("api error: {0}")]
    Api(#[from] ApiError),
    #[error("remote folder {0:?} does not exist at the account root")]
    MissingTopFolder(String),
    #[error("I/O error under the mirror root: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure scoped to a single entry. The walk logs it and moves on.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("api error: {0}")]
    Api(#[from] ApiError),
    #[error("conversion failed: {0}")]
    Convert(#[from] ConvertError),
    #[error("media migration failed: {0}")]
    Migrate(#[from] MigrateError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Add,
    Update,
    Skip,
}

impl FileAction {
    pub fn as_str(self) -> &'static str {
        match self {
            FileAction::Add => "add",
            FileAction::Update => "update",
            FileAction::Skip => "skip",
        }
    }
}

/// What one run did, for the closing log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PullReport {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub reaped_documents: usize,
    pub reaped_media_dirs: usize,
}

/// One-way mirror engine. Walks the remote tree depth-first in listing
/// order, one entry at a time, materializing each into the local mirror.
pub struct Puller {
    api: YdnoteClient,
    migrator: MediaMigrator,
    mirror_root: PathBuf,
    top_folder: String,
    synced: BTreeSet<String>,
}

impl Puller {
    pub fn new(
        api: YdnoteClient,
        migrator: MediaMigrator,
        mirror_root: PathBuf,
        top_folder: String,
    ) -> Self {
        Puller {
            api,
            migrator,
            mirror_root,
            top_folder,
            synced: BTreeSet::new(),
        }
    }

    /// Runs one full pull: walk, materialize, then reap orphans.
    ///
    /// The reaper only runs when the walk covered the whole tree; any
    /// listing failure aborts beforehand so partial knowledge never
    /// deletes local files.
    pub async fn run(&mut self) -> Result<PullReport, EngineError> {
        self.synced.clear();
        let mut report = PullReport::default();
        let start_dir = self.resolve_start_dir().await?;
        let root = self.mirror_root.clone();
        self.pull_dir(&start_dir, &root, &mut report).await?;

        let reaped = reaper::reap_orphans(&self.mirror_root, &self.synced)?;
        report.reaped_documents = reaped.documents;
        report.reaped_media_dirs = reaped.media_dirs;
        Ok(report)
    }

    /// Relative paths recorded by the last run.
    pub fn synced_paths(&self) -> &BTreeSet<String> {
        &self.synced
    }

    async fn resolve_start_dir(&self) -> Result<String, EngineError> {
        let root_id = self.api.root_dir_id().await?;
        if self.top_folder.is_empty() {
            return Ok(root_id);
        }
        let entries = self.api.list_dir(&root_id).await?;
        entries
            .into_iter()
            .find(|entry| entry.is_dir && entry.name == self.top_folder)
            .map(|entry| entry.id)
            .ok_or_else(|| EngineError::MissingTopFolder(self.top_folder.clone()))
    }

    fn pull_dir<'a>(
        &'a mut self,
        dir_id: &'a str,
        local_dir: &'a Path,
        report: &'a mut PullReport,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        async move {
            let entries = self.api.list_dir(dir_id).await?;
            for entry in entries {
                if entry.is_dir {
                    let sub_dir = local_dir.join(&entry.name);
                    if !sub_dir.exists() {
                        std::fs::create_dir(&sub_dir)?;
                    }
                    self.pull_dir(&entry.id, &sub_dir, report).await?;
                } else {
                    match self.materialize_entry(&entry, local_dir).await {
                        Ok(FileAction::Add) => report.added += 1,
                        Ok(FileAction::Update) => report.updated += 1,
                        Ok(FileAction::Skip) => report.skipped += 1,
                        Err(err) => {
                            report.failed += 1;
                            warn!(
                                id = %entry.id,
                                name = %entry.name,
                                error = %err,
                                "entry pull failed; continuing with the next entry"
                            );
                        }
                    }
                }
            }
            Ok(())
        }
        .boxed()
    }

    /// Pulls one file entry: classify, decide, fetch, convert, migrate.
    async fn materialize_entry(
        &mut self,
        entry: &FileEntry,
        local_dir: &Path,
    ) -> Result<FileAction, EntryError> {
        let file_name = names::normalize_note_name(&entry.name);
        let (stem, suffix) = names::split_suffix(&file_name);
        let (stem, suffix) = (stem.to_string(), suffix.to_string());
        let original_path = local_dir.join(&file_name);
        let posts_candidate = local_dir.join(names::POSTS_DIR).join(format!("{stem}.md"));

        let (kind, probed) = if suffix == names::MARKDOWN_SUFFIX {
            (NoteKind::Markdown, None)
        } else if classify::needs_content_probe(&suffix) {
            match self.api.fetch_file(&entry.id).await {
                Ok(body) => (classify::classify(&suffix, &body), Some(body)),
                Err(err) => {
                    // Without the kind the final home is unknown; shield
                    // both candidates from the reaper before bailing out.
                    self.record_synced(&original_path);
                    self.record_synced(&posts_candidate);
                    return Err(err.into());
                }
            }
        } else {
            (NoteKind::Other, None)
        };

        let final_path = if kind.becomes_markdown() {
            std::fs::create_dir_all(local_dir.join(names::POSTS_DIR))?;
            posts_candidate
        } else {
            original_path.clone()
        };

        let action = decide_action(&final_path, entry.modify_time)?;
        self.record_synced(&final_path);
        match action {
            FileAction::Skip => {
                info!(path = %final_path.display(), "skip: local copy is up to date");
                return Ok(FileAction::Skip);
            }
            FileAction::Update => std::fs::remove_file(&final_path)?,
            FileAction::Add => {}
        }

        if kind.becomes_markdown() {
            // Media will be re-downloaded by the migration below; stale
            // assets from the previous revision would otherwise pile up.
            let stale_assets = local_dir.join(names::ASSETS_DIR).join(&stem);
            if stale_assets.exists() {
                std::fs::remove_dir_all(&stale_assets)?;
            }
        }

        let body = match probed {
            Some(body) => body,
            None => self.api.fetch_file(&entry.id).await?,
        };
        std::fs::write(&original_path, &body)?;

        let markdown_ready = match kind {
            NoteKind::LegacyXml => match convert::xml_note_to_markdown(&original_path) {
                Ok(_) => true,
                Err(err) if err.is_xml_parse() => {
                    info!(
                        name = %file_name,
                        "body is not well-formed XML; retrying as a legacy HTML note"
                    );
                    match convert::html_note_to_markdown(&original_path) {
                        Ok(_) => true,
                        Err(err) => {
                            warn!(
                                name = %file_name,
                                error = %err,
                                "conversion failed; raw note body left in place"
                            );
                            false
                        }
                    }
                }
                Err(err) => return Err(err.into()),
            },
            NoteKind::LegacyJson => {
                convert::json_note_to_markdown(&original_path)?;
                true
            }
            NoteKind::Markdown => true,
            NoteKind::Other => false,
        };

        if kind.becomes_markdown() {
            if !markdown_ready {
                return Ok(action);
            }
            let converted_path = local_dir.join(format!("{stem}.md"));
            if converted_path != final_path {
                std::fs::rename(&converted_path, &final_path)?;
            }
            self.migrator.migrate_document(&final_path, local_dir).await?;
        }

        set_entry_times(&final_path, entry.create_time, entry.modify_time)?;
        info!(
            action = action.as_str(),
            kind = kind.as_str(),
            path = %final_path.display(),
            "entry pulled"
        );
        Ok(action)
    }

    fn record_synced(&mut self, path: &Path) {
        if let Some(key) = relative_key(&self.mirror_root, path) {
            self.synced.insert(key);
        }
    }
}

/// ADD when no local copy exists, SKIP when the local copy is at least as
/// new as the remote, UPDATE otherwise.
fn decide_action(final_path: &Path, remote_modify: i64) -> Result<FileAction, EntryError> {
    if !final_path.exists() {
        return Ok(FileAction::Add);
    }
    let metadata = std::fs::metadata(final_path)?;
    let local_modify = metadata
        .modified()?
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0);
    if remote_modify <= local_modify {
        Ok(FileAction::Skip)
    } else {
        Ok(FileAction::Update)
    }
}

/// Stamps the mirrored file with the remote creation and modification
/// times. Runs last so the SKIP comparison sees the remote clock, not the
/// local write time.
fn set_entry_times(path: &Path, create_time: i64, modify_time: i64) -> std::io::Result<()> {
    filetime::set_file_times(
        path,
        FileTime::from_unix_time(create_time, 0),
        FileTime::from_unix_time(modify_time, 0),
    )
}
