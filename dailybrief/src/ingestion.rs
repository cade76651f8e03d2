use anyhow::{Context, Result};
use common::FeedConfig;
use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::{Category, NewsItem, MISSING_LINK, MISSING_SUMMARY, MISSING_TITLE};

/// Fetches a feed from the given URL and parses it.
/// Retries server errors, rate limiting and network failures with exponential backoff.
pub async fn fetch_and_parse_feed(url: &str, timeout_secs: u64) -> Result<Feed> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("dailybrief/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build reqwest client")?;

    let max_retries = 3;
    let mut last_error = None;

    for attempt in 1..=max_retries {
        if attempt > 1 {
            let backoff = Duration::from_secs(2u64.pow(attempt - 2)); // 1s, 2s
            info!("Retrying feed fetch for {} (attempt {}/{}) after {:?}...", url, attempt, max_retries, backoff);
            tokio::time::sleep(backoff).await;
        }

        match client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let bytes = response.bytes().await.context("failed to read response body")?;
                    let feed = parser::parse(bytes.as_ref())
                        .with_context(|| format!("failed to parse feed {}", url))?;
                    return Ok(feed);
                } else if status.is_server_error() {
                    last_error = Some(anyhow::anyhow!("server error: {}", status));
                } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    last_error = Some(anyhow::anyhow!("rate limited: {}", status));
                } else {
                    // Other 4xx are permanent
                    anyhow::bail!("feed fetch for {} failed with status: {}", url, status);
                }
            }
            Err(e) => {
                last_error = Some(anyhow::Error::new(e).context("network error during fetch"));
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("unknown error after retries")))
}

/// Maps at most `limit` entries of a parsed feed to news items, in feed order.
pub fn extract_items(feed: &Feed, category: Category, limit: usize) -> Vec<NewsItem> {
    feed.entries
        .iter()
        .take(limit)
        .map(|entry| entry_to_item(entry, category))
        .collect()
}

fn entry_to_item(entry: &Entry, category: Category) -> NewsItem {
    let title = entry
        .title
        .as_ref()
        .map(|t| flatten_html(&t.content))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| MISSING_TITLE.to_string());

    let link = entry
        .links
        .first()
        .map(|l| l.href.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| MISSING_LINK.to_string());

    // summary first, then the entry body (RSS description / content)
    let summary = entry
        .summary
        .as_ref()
        .map(|s| s.content.as_str())
        .filter(|s| !s.trim().is_empty())
        .or_else(|| {
            entry
                .content
                .as_ref()
                .and_then(|c| c.body.as_deref())
                .filter(|b| !b.trim().is_empty())
        })
        .map(flatten_html)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| MISSING_SUMMARY.to_string());

    NewsItem {
        category,
        title,
        link,
        summary,
    }
}

/// Strips markup from feed text; plain text passes through trimmed.
fn flatten_html(raw: &str) -> String {
    let raw = raw.trim();
    if !raw.contains('<') {
        return raw.to_string();
    }
    match html2text::from_read(raw.as_bytes(), 10_000) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!("ingestion: failed to flatten html, keeping raw text: {}", e);
            raw.to_string()
        }
    }
}

/// Fetches every configured feed in order and collects their items.
/// Fetch errors are not caught here.
pub async fn collect_news(feeds: &[FeedConfig], limit: usize, timeout_secs: u64) -> Result<Vec<NewsItem>> {
    let mut items = Vec::new();
    for source in feeds {
        let feed = fetch_and_parse_feed(&source.url, timeout_secs).await?;
        let extracted = extract_items(&feed, source.category(), limit);
        info!(
            "Fetched feed '{}': {} entries, kept {}",
            source.url,
            feed.entries.len(),
            extracted.len()
        );
        items.extend(extracted);
    }
    Ok(items)
}

/// Plain-text blob handed to the model, one block per item.
pub fn news_text(items: &[NewsItem]) -> String {
    items
        .iter()
        .map(|item| format!("제목: {}\n내용: {}\n\n", item.title, item.summary))
        .collect()
}
