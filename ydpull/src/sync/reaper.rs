use std::collections::BTreeSet;
use std::path::Path;

use tracing::info;
use walkdir::WalkDir;

use crate::sync::names::{ASSETS_DIR, POSTS_DIR, relative_key};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReapReport {
    pub documents: usize,
    pub media_dirs: usize,
}

/// Deletes local documents and media directories whose relative paths no
/// longer exist remotely.
///
/// `synced` must cover every path recorded by a fully completed walk; a
/// partial walk must never reach this function.
pub fn reap_orphans(root: &Path, synced: &BTreeSet<String>) -> std::io::Result<ReapReport> {
    let mut report = ReapReport::default();
    let mut walker = WalkDir::new(root).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        if entry.file_name().to_str() == Some(POSTS_DIR) {
            reap_documents(root, entry.path(), synced, &mut report)?;
            walker.skip_current_dir();
        } else if entry.file_name().to_str() == Some(ASSETS_DIR) {
            reap_media_dirs(root, entry.path(), synced, &mut report)?;
            walker.skip_current_dir();
        }
    }
    Ok(report)
}

fn reap_documents(
    root: &Path,
    posts_dir: &Path,
    synced: &BTreeSet<String>,
    report: &mut ReapReport,
) -> std::io::Result<()> {
    for child in std::fs::read_dir(posts_dir)? {
        let child = child?;
        if !child.file_type()?.is_file() {
            continue;
        }
        let path = child.path();
        let keep = relative_key(root, &path).is_some_and(|key| synced.contains(&key));
        if !keep {
            std::fs::remove_file(&path)?;
            info!(path = %path.display(), "removed document deleted remotely");
            report.documents += 1;
        }
    }
    Ok(())
}

fn reap_media_dirs(
    root: &Path,
    assets_dir: &Path,
    synced: &BTreeSet<String>,
    report: &mut ReapReport,
) -> std::io::Result<()> {
    // assets/ and posts/ are siblings; a media folder survives exactly as
    // long as its document does.
    let Some(folder) = assets_dir.parent() else {
        return Ok(());
    };
    for child in std::fs::read_dir(assets_dir)? {
        let child = child?;
        if !child.file_type()?.is_dir() {
            continue;
        }
        let name = child.file_name().to_string_lossy().into_owned();
        let document = folder.join(POSTS_DIR).join(format!("{name}.md"));
        let keep = relative_key(root, &document).is_some_and(|key| synced.contains(&key));
        if !keep {
            let path = child.path();
            std::fs::remove_dir_all(&path)?;
            info!(path = %path.display(), "removed media for a document deleted remotely");
            report.media_dirs += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn touch(path: &PathBuf) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn removes_stale_documents_and_media() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("posts").join("kept.md"));
        touch(&root.join("posts").join("stale.md"));
        touch(&root.join("assets").join("kept").join("pic.png"));
        touch(&root.join("assets").join("stale").join("pic.png"));

        let synced = BTreeSet::from(["posts/kept.md".to_string()]);
        let report = reap_orphans(root, &synced).unwrap();

        assert_eq!(report, ReapReport { documents: 1, media_dirs: 1 });
        assert!(root.join("posts").join("kept.md").exists());
        assert!(!root.join("posts").join("stale.md").exists());
        assert!(root.join("assets").join("kept").exists());
        assert!(!root.join("assets").join("stale").exists());
    }

    #[test]
    fn reaps_nested_folders() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("Tech").join("posts").join("gone.md"));
        touch(&root.join("Tech").join("assets").join("gone").join("a.png"));

        let report = reap_orphans(root, &BTreeSet::new()).unwrap();

        assert_eq!(report, ReapReport { documents: 1, media_dirs: 1 });
        assert!(!root.join("Tech").join("posts").join("gone.md").exists());
        assert!(!root.join("Tech").join("assets").join("gone").exists());
    }

    #[test]
    fn foreign_files_under_posts_are_reaped_too() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("posts").join("notes.txt"));

        let report = reap_orphans(root, &BTreeSet::new()).unwrap();

        assert_eq!(report.documents, 1);
        assert!(!root.join("posts").join("notes.txt").exists());
    }

    #[test]
    fn fully_synced_mirror_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("posts").join("a.md"));
        touch(&root.join("Tech").join("posts").join("b.md"));
        touch(&root.join("Tech").join("assets").join("b").join("pic.png"));
        touch(&root.join("plain.pdf"));

        let synced = BTreeSet::from([
            "posts/a.md".to_string(),
            "Tech/posts/b.md".to_string(),
            "plain.pdf".to_string(),
        ]);
        let report = reap_orphans(root, &synced).unwrap();

        assert_eq!(report, ReapReport::default());
        assert!(root.join("Tech").join("assets").join("b").join("pic.png").exists());
    }

    #[test]
    fn files_directly_under_assets_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("assets").join("loose.png"));

        let report = reap_orphans(root, &BTreeSet::new()).unwrap();

        assert_eq!(report, ReapReport::default());
        assert!(root.join("assets").join("loose.png").exists());
    }
}
