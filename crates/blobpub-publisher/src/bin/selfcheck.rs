use std::path::Path;

use blobpub_publisher::PublisherConfig;
use blobpub_storage::AzureConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = PublisherConfig::from_env()?;

    println!(
        "blobpub-selfcheck: data_dir={} logs_dir={}",
        config.data_dir.display(),
        config.logs_dir.display()
    );
    ensure_dir(&config.data_dir).await?;
    ensure_dir(&config.logs_dir).await?;
    ensure_credentials()?;

    println!("blobpub-selfcheck: ok");
    Ok(())
}

async fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| anyhow::anyhow!("{} not readable: {}", path.display(), e))?;

    if !metadata.is_dir() {
        return Err(anyhow::anyhow!("{} is not a directory", path.display()));
    }
    Ok(())
}

fn ensure_credentials() -> anyhow::Result<()> {
    let azure = AzureConfig::from_env()?;
    println!(
        "blobpub-selfcheck: account={} container={} endpoint={}",
        azure.account, azure.container, azure.endpoint
    );
    Ok(())
}
