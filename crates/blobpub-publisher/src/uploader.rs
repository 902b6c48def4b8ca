//! Directory uploads.

use std::path::{Path, PathBuf};

use blobpub_storage::BlobContainer;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use crate::error::PublishResult;
use crate::run_log::RunLog;

/// Predicate over file names selecting which files to upload.
pub type FileFilter<'a> = &'a (dyn Fn(&str) -> bool + Sync);

/// Join a blob prefix and a file name with a single `/`.
pub fn join_blob_name(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Content type for a file, by extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "json" => "application/json",
        "md" => "text/markdown; charset=utf-8",
        "html" | "htm" => "text/html; charset=utf-8",
        "txt" | "log" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// List the regular files directly inside `dir`, sorted by name.
pub async fn list_files(dir: &Path) -> PublishResult<Vec<(String, PathBuf)>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!(file = ?raw, "Skipping file with a non UTF-8 name");
                continue;
            }
        };

        // Follows symlinks, unlike DirEntry::file_type.
        if !tokio::fs::metadata(&path).await?.is_file() {
            debug!(path = %path.display(), "Skipping non-file entry");
            continue;
        }
        files.push((name, path));
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Upload every file in `local_dir` to `blob_prefix/<file name>`.
///
/// Returns the public URLs in file-name order. Uploads run concurrently, at
/// most `max_concurrency` at a time. The first failure aborts the directory;
/// blobs already written stay in place.
pub async fn upload_directory(
    container: &dyn BlobContainer,
    local_dir: &Path,
    blob_prefix: &str,
    filter: Option<FileFilter<'_>>,
    run_log: &RunLog,
    max_concurrency: usize,
) -> PublishResult<Vec<String>> {
    let mut files = list_files(local_dir).await?;
    if let Some(filter) = filter {
        files.retain(|(name, _)| filter(name.as_str()));
    }

    debug!(
        dir = %local_dir.display(),
        prefix = %blob_prefix,
        files = files.len(),
        "Uploading directory"
    );

    stream::iter(files)
        .map(|(name, path)| {
            let blob_name = join_blob_name(blob_prefix, &name);
            async move { upload_file(container, &blob_name, &path, Some(run_log)).await }
        })
        .buffered(max_concurrency.max(1))
        .try_collect()
        .await
}

/// Upload a single file and return its public URL.
pub async fn upload_file(
    container: &dyn BlobContainer,
    blob_name: &str,
    path: &Path,
    run_log: Option<&RunLog>,
) -> PublishResult<String> {
    let url = container.url_of_blob(blob_name);
    if let Some(run_log) = run_log {
        run_log.log(format!("Uploading {} to {}", path.display(), url));
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(blob_name);
    container
        .create_blob_from_file(blob_name, path, content_type_for(file_name))
        .await?;
    Ok(url)
}
