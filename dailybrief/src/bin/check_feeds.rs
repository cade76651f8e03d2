use common::Config;
use dailybrief::ingestion;

/// Fetches every configured feed and prints what the collector would keep.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = Config::load_with_defaults(
        Some(std::path::Path::new("config.default.toml")),
        Some(std::path::Path::new("config.toml")),
    )
    .await?;

    for source in &config.feeds.sources {
        println!("\n{}", "=".repeat(60));
        println!("Testing: {} [{}]", source.url, source.category());
        println!("{}", "=".repeat(60));

        match ingestion::fetch_and_parse_feed(&source.url, config.feeds.fetch_timeout_seconds).await {
            Ok(feed) => {
                let items = ingestion::extract_items(&feed, source.category(), config.feeds.entries_per_feed);
                println!("✓ Success!");
                println!("  Title: {:?}", feed.title.as_ref().map(|t| &t.content));
                println!("  Entries: {} (keeping {})", feed.entries.len(), items.len());

                for (i, item) in items.iter().enumerate() {
                    println!("    {}. {}", i + 1, item.title);
                    println!("       URL: {}", item.link);
                    println!("       Summary: {} chars", item.summary.chars().count());
                }
            }
            Err(e) => {
                println!("✗ Failed: {:#}", e);
            }
        }
    }
    Ok(())
}
