use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::parser;

/// Entry discovered during a filesystem walk.
#[derive(Debug, Clone)]
pub struct MediaEntry {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub mtime_ts: i64,
}

impl MediaEntry {
    /// Path relative to the library root, as the path-hint parser expects.
    pub fn relative_to<'a>(&'a self, root: &Path) -> &'a Path {
        self.path.strip_prefix(root).unwrap_or(&self.path)
    }
}

/// Walk a library directory and collect video files, skipping ignored
/// patterns. Directories are visited from a worklist, so nesting depth does
/// not grow the call stack. Results are sorted by path.
pub fn walk_media_dir(root: &Path) -> Vec<MediaEntry> {
    let mut entries = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let read_dir = match std::fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "cannot read directory");
                continue;
            }
        };

        for entry in read_dir.flatten() {
            let path = entry.path();
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();

            // Skip hidden files/dirs and ignored patterns
            if name.starts_with('.') || parser::should_ignore(&name) {
                debug!(path = %path.display(), "skipping ignored entry");
                continue;
            }

            if path.is_dir() {
                // Skip known junk directories
                if name == "@eaDir" || name == "#recycle" {
                    continue;
                }
                pending.push(path);
            } else if parser::is_video_file(&name) {
                let Ok(metadata) = std::fs::metadata(&path) else {
                    continue;
                };
                let mtime = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(0);

                entries.push(MediaEntry {
                    path,
                    size_bytes: metadata.len(),
                    mtime_ts: mtime,
                });
            }
        }
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries
}
