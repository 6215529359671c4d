//! Code library persistence
//!
//! The library lives in one JSON file: an object mapping command names to
//! flat duration arrays. Every save rotates the previous generations
//! first (`codes.json` -> `codes.json.bak` -> `codes.json.bak1` ->
//! `codes.json.bak2`), so a bad recording session can always be rolled
//! back by hand.

use std::path::{Path, PathBuf};

use irck_common::{Error, Library, Result};
use tracing::{info, warn};

/// Load the library from `path`.
///
/// Both a missing file and unparseable contents map to
/// [`Error::SourceUnavailable`]: on the playback path there is nothing to
/// play either way.
pub async fn load(path: &Path) -> Result<Library> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::SourceUnavailable(format!("{}: {}", path.display(), e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::SourceUnavailable(format!("{}: {}", path.display(), e)))
}

/// Load the library, substituting an empty one when the source is
/// unavailable.
///
/// This is the record-path behavior: a first session starts from nothing,
/// and a corrupt file is superseded (its last generation survives in the
/// rotation backups).
pub async fn load_or_new(path: &Path) -> Library {
    match load(path).await {
        Ok(library) => {
            info!(
                commands = library.len(),
                "loaded code library from {}",
                path.display()
            );
            library
        }
        Err(e) => {
            warn!("starting new code library: {}", e);
            Library::new()
        }
    }
}

/// Persist the library to `path`, rotating backups first.
pub async fn save(path: &Path, library: &Library) -> Result<()> {
    rotate_backups(path).await;
    let mut json = serde_json::to_string_pretty(library)?;
    json.push('\n');
    tokio::fs::write(path, json).await?;
    info!(
        commands = library.len(),
        "saved code library to {}",
        path.display()
    );
    Ok(())
}

/// file -> file.bak -> file.bak1 -> file.bak2
///
/// Each rename is best effort: absent generations simply don't move.
async fn rotate_backups(path: &Path) {
    let bak = suffixed(path, "bak");
    let bak1 = suffixed(path, "bak1");
    let bak2 = suffixed(path, "bak2");
    let _ = tokio::fs::rename(&bak1, &bak2).await;
    let _ = tokio::fs::rename(&bak, &bak1).await;
    let _ = tokio::fs::rename(path, &bak).await;
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
