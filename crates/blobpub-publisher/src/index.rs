//! Index page listing the latest published blobs.

use std::borrow::Cow;

use blobpub_storage::BlobContainer;
use tracing::info;

use crate::error::PublishResult;

/// Content type of the index page.
pub const INDEX_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Render the index page.
///
/// The output depends only on the arguments, so identical inputs produce
/// byte-identical pages.
pub fn render_index(timestamp: &str, data_urls: &[String], log_urls: &[String]) -> String {
    let mut lines = Vec::with_capacity(data_urls.len() + log_urls.len() + 5);
    lines.push("<html><head></head><body>".to_string());
    lines.push(format!(
        "<h3>Here is the latest data as of <b>{}</b>:</h3>",
        escape_html(timestamp)
    ));
    lines.push("<h4>Data</h4>".to_string());
    lines.extend(data_urls.iter().map(|url| link(url)));
    lines.push("<h4>Logs</h4>".to_string());
    lines.extend(log_urls.iter().map(|url| link(url)));
    lines.push("</body></html>".to_string());
    lines.join("\n")
}

/// Render and upload the index page, replacing the previous one.
///
/// Returns the index URL.
pub async fn upload_index(
    container: &dyn BlobContainer,
    index_blob: &str,
    timestamp: &str,
    data_urls: &[String],
    log_urls: &[String],
) -> PublishResult<String> {
    let html = render_index(timestamp, data_urls, log_urls);
    container
        .create_blob_from_text(index_blob, &html, INDEX_CONTENT_TYPE)
        .await?;

    let url = container.url_of_blob(index_blob);
    info!(url = %url, links = data_urls.len() + log_urls.len(), "Uploaded index");
    Ok(url)
}

/// List item linking `url`, labelled with its last path segment.
fn link(url: &str) -> String {
    let last = url.rsplit('/').next().unwrap_or(url);
    let short = urlencoding::decode(last).unwrap_or(Cow::Borrowed(last));
    format!(
        "<li><a href='{}'>{}</a></li>",
        escape_html(url),
        escape_html(&short)
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
