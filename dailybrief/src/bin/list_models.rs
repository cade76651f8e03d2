use common::Config;
use dailybrief::llm::gemini::GeminiProvider;

/// Prints every model the configured API key can call with generateContent.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();
    dotenv::dotenv().ok();

    let config = Config::load_with_defaults(None, Some(std::path::Path::new("config.toml"))).await?;
    let api_key = std::env::var(&config.llm.api_key_env)
        .map_err(|_| anyhow::anyhow!("{} is not set", config.llm.api_key_env))?;

    let provider = GeminiProvider::new(&config.llm.api_url, api_key);

    println!("--- Available models ---");
    for model in provider.list_models().await? {
        println!("Name: {}", model.name);
        if let Some(display) = &model.display_name {
            println!("Display name: {}", display);
        }
        if let Some(description) = &model.description {
            println!("Description: {}", description);
        }
        println!("{}", "-".repeat(30));
    }
    Ok(())
}
