//! Log directory retention.
//!
//! Log directories are the first path segment below the logs prefix and are
//! named after run timestamps. Names are compared as plain strings, which is
//! chronological for the fixed-width timestamps this crate generates.

use std::collections::BTreeSet;

use blobpub_storage::{BlobContainer, BlobInfo};
use futures::future::try_join_all;

use crate::error::{PublishError, PublishResult};
use crate::run_log::RunLog;
use crate::timestamp::RunTimestamp;

/// Distinct directory names under `prefix`, sorted.
///
/// Every listed name must start with `prefix`. Blobs sitting directly under
/// the prefix belong to no directory and are reported separately.
pub fn directory_names(
    prefix: &str,
    blobs: &[BlobInfo],
) -> PublishResult<(BTreeSet<String>, Vec<String>)> {
    let mut directories = BTreeSet::new();
    let mut loose = Vec::new();

    for blob in blobs {
        let relative = blob
            .name
            .strip_prefix(prefix)
            .ok_or_else(|| PublishError::UnexpectedBlobName {
                prefix: prefix.to_string(),
                name: blob.name.clone(),
            })?;

        match relative.split_once('/') {
            Some((directory, _)) if !directory.is_empty() => {
                directories.insert(directory.to_string());
            }
            _ => loose.push(blob.name.clone()),
        }
    }

    Ok((directories, loose))
}

/// The oldest directories beyond `max_directories`, oldest first.
pub fn directories_to_remove(sorted: &BTreeSet<String>, max_directories: usize) -> Vec<String> {
    let excess = sorted.len().saturating_sub(max_directories);
    sorted.iter().take(excess).cloned().collect()
}

/// Delete the oldest directories under `prefix` so that at most
/// `max_directories` remain.
///
/// Returns the deleted directory names, oldest first.
pub async fn remove_old_directories(
    container: &dyn BlobContainer,
    prefix: &str,
    max_directories: usize,
    run_log: &RunLog,
) -> PublishResult<Vec<String>> {
    let blobs = container.list_blobs(prefix).await?;
    let (directories, loose) = directory_names(prefix, &blobs)?;

    for name in &loose {
        run_log.log_warning(format!("Ignoring {}: it is not inside a log directory", name));
    }

    if directories.len() <= max_directories {
        run_log.log(format!(
            "No need to remove old directories: have {}, can go up to {}.",
            directories.len(),
            max_directories
        ));
        return Ok(Vec::new());
    }

    let unparsable: Vec<&str> = directories
        .iter()
        .filter(|name| RunTimestamp::parse(name).is_none())
        .map(String::as_str)
        .collect();
    if !unparsable.is_empty() {
        run_log.log_warning(format!(
            "Directories not named by timestamp, ordered as plain strings: [{}]",
            unparsable.join(",")
        ));
    }

    let to_delete = directories_to_remove(&directories, max_directories);
    run_log.log(format!(
        "Too many old logs, so removing the following directories: [{}]",
        to_delete.join(",")
    ));

    try_join_all(to_delete.iter().map(|directory| {
        delete_directory(container, format!("{}{}/", prefix, directory), run_log)
    }))
    .await?;

    Ok(to_delete)
}

/// Delete every blob whose name starts with `directory_prefix`.
async fn delete_directory(
    container: &dyn BlobContainer,
    directory_prefix: String,
    run_log: &RunLog,
) -> PublishResult<()> {
    let blobs = container.list_blobs(&directory_prefix).await?;
    let names: Vec<&str> = blobs.iter().map(|blob| blob.name.as_str()).collect();
    run_log.log(format!(
        "Deleting directory {}: delete files [{}]",
        directory_prefix,
        names.join(",")
    ));

    try_join_all(names.iter().map(|name| container.delete_blob(name))).await?;
    Ok(())
}
