/*!
common/src/lib.rs

Shared configuration types and credential loading for dailybrief.

This file provides:
- Config data structures (deserialized from TOML, every section optional)
- An async loader merging a default file with an override file
- Credentials resolved once from the environment and passed explicitly
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Default prompt for the full analysis. `{date}` and `{news}` are substituted at run time.
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"역할 : 경제 및 금융 전문 애널리스트
아래 뉴스 데이터를 분석해서 마크다운 형식으로 보고서를 작성해줘.
모든 분석의 기준 시점은 반드시 {date}이어야 해.

[포함 내용]
1. 🎯 오늘의 경제 및 시장 핵심 키워드 (3개)
2. 📈 종합 분석 및 투자 전략 (심도 있게)
3. ⚠️ 주의 깊게 봐야 할 지표나 일정

전문적이고 신뢰감 있는 톤으로 작성해줘.
[뉴스 데이터]
{news}
"#;

/// Default prompt for the short chat teaser. Only `{news}` is substituted.
pub const DEFAULT_BRIEF_TEMPLATE: &str = r#"다음 뉴스 데이터를 바탕으로 오늘 가장 중요한 경제 소식 3가지를 요약해줘.
- 각 소식은 한 줄로 작성할 것.
- 이모지를 적절히 섞어서 친근하게 작성할 것.
- 전체 리포트를 읽고 싶게 만드는 핵심 내용 위주로 작성할 것.
- 한국어로 작성할 것.

뉴스 데이터:
{news}
"#;

/// News category attached to every item of a feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedCategory {
    Economy,
    Securities,
}

impl FeedCategory {
    /// Category implied by a feed URL when none is configured.
    pub fn from_url(url: &str) -> Self {
        if url.contains("economy") {
            FeedCategory::Economy
        } else {
            FeedCategory::Securities
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FeedCategory::Economy => "경제",
            FeedCategory::Securities => "증권",
        }
    }
}

impl fmt::Display for FeedCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where the final report ends up besides the local file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputChannel {
    /// Write the file and send a chat message linking to it
    #[default]
    File,
    /// Send the rendered file itself as a chat document
    ChatDocument,
    /// Archive the report as an issue and link the issue from the chat message
    IssueAndChat,
}

/// Report file placement policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportLayout {
    /// `{dir}/YYYY-MM-DD.md`
    #[default]
    ReportsDir,
    /// `daily_brief_YYYY-MM-DD.md` in the working directory
    WorkingDir,
}

/// How the short chat teaser is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BriefSource {
    /// Ask `llm.brief_model` for a separate teaser
    #[default]
    Model,
    /// Cut the full analysis down to `notify.brief_max_chars`
    Truncate,
}

/// Simple feed descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    pub category: Option<FeedCategory>,
}

impl FeedConfig {
    pub fn category(&self) -> FeedCategory {
        self.category.unwrap_or_else(|| FeedCategory::from_url(&self.url))
    }
}

/// Feed ingestion section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedsConfig {
    pub sources: Vec<FeedConfig>,
    /// Maximum entries taken from each feed
    pub entries_per_feed: usize,
    pub fetch_timeout_seconds: u64,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                FeedConfig {
                    url: "https://www.hankyung.com/feed/economy".to_string(),
                    category: Some(FeedCategory::Economy),
                },
                FeedConfig {
                    url: "https://www.hankyung.com/feed/finance".to_string(),
                    category: Some(FeedCategory::Securities),
                },
            ],
            entries_per_feed: 5,
            fetch_timeout_seconds: 10,
        }
    }
}

/// Generative model section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the generateContent API (without the `/models/...` suffix)
    pub api_url: String,
    pub api_key_env: String,
    /// Fallback order, first entry tried first
    pub model_priority: Vec<String>,
    pub brief_model: String,
    pub brief_source: BriefSource,
    pub timeout_seconds: u64,
    pub prompt_template: String,
    pub brief_template: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            model_priority: vec![
                "gemini-2.5-flash".to_string(),
                "models/gemma-3-27b-it".to_string(),
            ],
            brief_model: "models/gemma-3-27b-it".to_string(),
            brief_source: BriefSource::Model,
            timeout_seconds: 120,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            brief_template: DEFAULT_BRIEF_TEMPLATE.to_string(),
        }
    }
}

/// Report output section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub layout: ReportLayout,
    pub dir: String,
    /// Published location of the report, e.g. `https://me.github.io/news/reports/{date}.md`
    pub site_url_template: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            layout: ReportLayout::ReportsDir,
            dir: "docs/reports".to_string(),
            site_url_template: None,
        }
    }
}

/// Chat delivery section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub channel: OutputChannel,
    pub telegram_api_url: String,
    pub token_env: String,
    pub chat_id_env: String,
    pub brief_max_chars: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            channel: OutputChannel::File,
            telegram_api_url: "https://api.telegram.org".to_string(),
            token_env: "TELEGRAM_TOKEN".to_string(),
            chat_id_env: "CHAT_ID".to_string(),
            brief_max_chars: 600,
        }
    }
}

/// Issue archive section (only used by `OutputChannel::IssueAndChat`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_url: String,
    pub token_env: String,
    /// `owner/name`
    pub repo: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token_env: "GH_TOKEN".to_string(),
            repo: None,
        }
    }
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub github: GithubConfig,
}

impl Config {
    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence). With neither,
    /// the built-in defaults are returned.
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if path.exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations that could never produce a run.
    pub fn validate(&self) -> Result<()> {
        if self.feeds.sources.is_empty() {
            anyhow::bail!("feeds.sources must list at least one feed");
        }
        for feed in &self.feeds.sources {
            url::Url::parse(&feed.url).with_context(|| format!("invalid feed url: {}", feed.url))?;
        }
        if self.llm.model_priority.is_empty() {
            anyhow::bail!("llm.model_priority must name at least one model");
        }
        if !self.llm.prompt_template.contains("{news}") {
            anyhow::bail!("llm.prompt_template must contain a {{news}} placeholder");
        }
        if self.notify.channel == OutputChannel::IssueAndChat && self.github.repo.is_none() {
            anyhow::bail!("notify.channel = \"issue_and_chat\" requires github.repo");
        }
        Ok(())
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Secrets read from the environment once at startup.
#[derive(Clone)]
pub struct Credentials {
    pub gemini_api_key: String,
    /// Absent only when nothing will be sent (dry run)
    pub telegram: Option<TelegramCredentials>,
    pub github_token: Option<String>,
}

#[derive(Clone)]
pub struct TelegramCredentials {
    pub bot_token: String,
    pub chat_id: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("chat_id", &self.telegram.as_ref().map(|t| t.chat_id.as_str()))
            .field("github_token", &self.github_token.as_ref().map(|_| "<set>"))
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Read credentials from process environment variables named by `config`.
    /// The Telegram pair is mandatory only when `deliver` is set.
    pub fn from_env(config: &Config, deliver: bool) -> Result<Self> {
        Self::from_lookup(config, deliver, |name| std::env::var(name).ok())
    }

    /// Resolve credentials through an arbitrary lookup (used by tests).
    /// Empty values count as unset.
    pub fn from_lookup<F>(config: &Config, deliver: bool, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &str| {
            get(name).with_context(|| format!("required environment variable {} is not set", name))
        };

        let telegram = if deliver {
            Some(TelegramCredentials {
                bot_token: require(&config.notify.token_env)?,
                chat_id: require(&config.notify.chat_id_env)?,
            })
        } else {
            get(&config.notify.token_env)
                .zip(get(&config.notify.chat_id_env))
                .map(|(bot_token, chat_id)| TelegramCredentials { bot_token, chat_id })
        };

        Ok(Self {
            gemini_api_key: require(&config.llm.api_key_env)?,
            telegram,
            github_token: get(&config.github.token_env),
        })
    }
}
