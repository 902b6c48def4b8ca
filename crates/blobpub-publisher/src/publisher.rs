//! Publishing run orchestration.

use std::sync::Arc;

use blobpub_storage::{BlobContainer, CorsRule, PublicAccess};
use serde::Serialize;
use tracing::{info, Instrument};

use crate::config::PublisherConfig;
use crate::error::PublishResult;
use crate::index;
use crate::pruner;
use crate::run_log::RunLog;
use crate::timestamp::RunTimestamp;
use crate::uploader::{self, join_blob_name};

/// Outcome of a publishing run.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub timestamp: RunTimestamp,
    pub data_urls: Vec<String>,
    /// Log URLs; the run log itself comes last.
    pub log_urls: Vec<String>,
    /// Log directories removed by retention, oldest first.
    pub deleted_directories: Vec<String>,
    pub index_url: String,
}

/// Publishes the data and logs directories to a blob container.
pub struct Publisher {
    container: Arc<dyn BlobContainer>,
    config: PublisherConfig,
}

impl Publisher {
    pub fn new(container: Arc<dyn BlobContainer>, config: PublisherConfig) -> Self {
        Self { container, config }
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Run one publishing pass.
    ///
    /// 1. Ensure the container exists with public blob access and CORS.
    /// 2. Upload data, and concurrently prune old logs and upload this run's logs.
    /// 3. Write and upload the run log.
    /// 4. Regenerate the index page.
    pub async fn run(&self, timestamp: &RunTimestamp) -> PublishResult<PublishReport> {
        let run_log = RunLog::new(timestamp.as_str());
        let span = run_log.create_span();
        self.run_with_log(timestamp, &run_log).instrument(span).await
    }

    async fn run_with_log(
        &self,
        timestamp: &RunTimestamp,
        run_log: &RunLog,
    ) -> PublishResult<PublishReport> {
        info!("Starting publishing run");
        self.prepare_container().await?;

        let (data_urls, (deleted_directories, mut log_urls)) =
            tokio::try_join!(self.upload_data(run_log), self.upload_logs(timestamp, run_log))?;

        log_urls.push(self.upload_run_log(timestamp, run_log).await?);

        let index_url = index::upload_index(
            self.container.as_ref(),
            &self.config.index_blob,
            timestamp.as_str(),
            &data_urls,
            &log_urls,
        )
        .await?;

        info!(
            data = data_urls.len(),
            logs = log_urls.len(),
            pruned = deleted_directories.len(),
            index = %index_url,
            "Publishing run complete"
        );

        Ok(PublishReport {
            timestamp: timestamp.clone(),
            data_urls,
            log_urls,
            deleted_directories,
            index_url,
        })
    }

    async fn prepare_container(&self) -> PublishResult<()> {
        self.container.ensure_created(PublicAccess::Blob).await?;
        self.container.set_cors(&[CorsRule::public_read()]).await?;
        Ok(())
    }

    async fn upload_data(&self, run_log: &RunLog) -> PublishResult<Vec<String>> {
        uploader::upload_directory(
            self.container.as_ref(),
            &self.config.data_dir,
            &self.config.data_prefix,
            None,
            run_log,
            self.config.max_concurrent_uploads,
        )
        .await
    }

    /// Prune old log directories, then upload the local logs directory
    /// (except the run log) into this run's directory.
    async fn upload_logs(
        &self,
        timestamp: &RunTimestamp,
        run_log: &RunLog,
    ) -> PublishResult<(Vec<String>, Vec<String>)> {
        // Leave room for the directory this run is about to create.
        let deleted = pruner::remove_old_directories(
            self.container.as_ref(),
            &self.config.logs_listing_prefix(),
            self.config.max_log_directories.saturating_sub(1),
            run_log,
        )
        .await?;

        let run_log_name = self.config.run_log_name.as_str();
        let not_run_log = move |name: &str| name != run_log_name;
        let urls = uploader::upload_directory(
            self.container.as_ref(),
            &self.config.logs_dir,
            &self.run_directory(timestamp),
            Some(&not_run_log),
            run_log,
            self.config.max_concurrent_uploads,
        )
        .await?;

        Ok((deleted, urls))
    }

    async fn upload_run_log(
        &self,
        timestamp: &RunTimestamp,
        run_log: &RunLog,
    ) -> PublishResult<String> {
        let local_path = self.config.logs_dir.join(&self.config.run_log_name);
        run_log.write_to(&local_path).await?;

        let blob_name = join_blob_name(&self.run_directory(timestamp), &self.config.run_log_name);
        uploader::upload_file(self.container.as_ref(), &blob_name, &local_path, None).await
    }

    /// Blob prefix of this run's log directory, e.g. `logs/<timestamp>`.
    fn run_directory(&self, timestamp: &RunTimestamp) -> String {
        join_blob_name(&self.config.logs_prefix, timestamp.as_str())
    }
}
