use std::path::{Path, PathBuf};

use tokio::{
    fs::{self, File},
    io::{self, AsyncWriteExt},
};

/// Replaces the contents of `path` with `content` in a way that never leaves a half written file
/// behind. Data is written to a sibling temporary file, synced, then renamed over the target.
pub async fn replace_file_atomically(path: &Path, content: &[u8]) -> Result<(), io::Error> {
    let temporary = temporary_sibling(path);
    let result = async {
        let mut file = File::create(&temporary).await?;
        file.write_all(content).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temporary, path).await
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&temporary).await;
    }
    result
}

/// Removes a file, treating a missing file as already removed.
pub async fn remove_if_exists(path: &Path) -> Result<(), io::Error> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}
