//! One daily run: Collect → Summarize → Render → Notify → Done.
//! Any unhandled error ends the run in the failed state; delivery failures are logged only.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use common::{BriefSource, Config, Credentials, OutputChannel};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::ingestion;
use crate::llm::gemini::GeminiProvider;
use crate::llm::summarizer::{Summarizer, SummarizeError};
use crate::llm::LlmProvider;
use crate::models::Report;
use crate::notify::{self, GithubClient, TelegramClient, CAPTION_LIMIT};
use crate::report;

/// Upper bound for a model-written teaser inside a chat message.
const MESSAGE_BRIEF_LIMIT: usize = 3500;

/// Run stages, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Collect,
    Summarize,
    Render,
    Notify,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Collect => "collect",
            Stage::Summarize => "summarize",
            Stage::Render => "render",
            Stage::Notify => "notify",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Result of a finished run
#[derive(Debug)]
pub enum RunOutcome {
    /// Feeds returned no entries; nothing was summarized, written or sent
    NoNews,
    Completed(RunSummary),
}

#[derive(Debug)]
pub struct RunSummary {
    pub report_path: PathBuf,
    pub items: usize,
    /// Model that wrote the analysis, `None` when every model was exhausted
    pub model: Option<String>,
    /// Link included in the chat message
    pub link: Option<String>,
    pub issue_url: Option<String>,
    pub delivered: bool,
}

pub struct Pipeline {
    config: Config,
    provider: Arc<dyn LlmProvider>,
    summarizer: Summarizer,
    telegram: Option<TelegramClient>,
    github: Option<GithubClient>,
    dry_run: bool,
}

impl Pipeline {
    /// Builds the pipeline against the configured Gemini endpoint.
    pub fn new(config: Config, credentials: &Credentials) -> Self {
        let provider = GeminiProvider::new(&config.llm.api_url, &credentials.gemini_api_key)
            .with_defaults(config.llm.timeout_seconds);
        Self::with_provider(config, credentials, Arc::new(provider))
    }

    pub fn with_provider(config: Config, credentials: &Credentials, provider: Arc<dyn LlmProvider>) -> Self {
        let http = reqwest::Client::new();
        let telegram = credentials.telegram.as_ref().map(|t| {
            TelegramClient::new(http.clone(), &t.bot_token, &t.chat_id)
                .with_api_url(&config.notify.telegram_api_url)
        });
        let github = credentials
            .github_token
            .as_ref()
            .map(|token| GithubClient::new(http, token).with_api_url(&config.github.api_url));

        Self {
            summarizer: Summarizer::from_config(&config.llm),
            config,
            provider,
            telegram,
            github,
            dry_run: false,
        }
    }

    /// Render and save the report but skip every outbound delivery.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(&self, today: NaiveDate) -> Result<RunOutcome> {
        info!(stage = %Stage::Collect, feeds = self.config.feeds.sources.len(), "collecting news");
        let items = ingestion::collect_news(
            &self.config.feeds.sources,
            self.config.feeds.entries_per_feed,
            self.config.feeds.fetch_timeout_seconds,
        )
        .await
        .context("news collection failed")?;

        if items.is_empty() {
            warn!("no news entries found, skipping analysis and delivery");
            return Ok(RunOutcome::NoNews);
        }
        let news_text = ingestion::news_text(&items);

        info!(stage = %Stage::Summarize, items = items.len(), models = ?self.summarizer.models(), "summarizing");
        let result = self
            .summarizer
            .summarize(self.provider.as_ref(), &news_text, today)
            .await;
        let (analysis, model) = match result {
            Ok(analysis) => (analysis.text, Some(analysis.model)),
            Err(e @ SummarizeError::Aborted { .. }) => {
                return Err(anyhow::Error::new(e).context("summarization aborted"));
            }
            Err(e) => {
                warn!(error = ?e, "all models exhausted, report carries the failure notice");
                (e.to_string(), None)
            }
        };
        let analysed = model.is_some();

        info!(stage = %Stage::Render, "rendering report");
        let report = Report::new(today, items, analysis);
        let markdown = report::render_markdown(&report);
        let path = report::report_path(
            self.config.report.layout,
            Path::new(&self.config.report.dir),
            today,
        );
        report::save_report(&path, &markdown).await?;
        let site_url = report::site_url(self.config.report.site_url_template.as_deref(), today);

        let mut summary = RunSummary {
            report_path: path,
            items: report.items.len(),
            model,
            link: None,
            issue_url: None,
            delivered: false,
        };

        if self.dry_run {
            info!("dry run: skipping notification");
        } else {
            info!(stage = %Stage::Notify, channel = ?self.config.notify.channel, "delivering");
            let brief = self.brief(&news_text, &report, analysed).await;
            self.deliver(&report, &markdown, &brief, site_url, &mut summary).await;
        }

        info!(stage = %Stage::Done, path = %summary.report_path.display(), delivered = summary.delivered, "run finished");
        Ok(RunOutcome::Completed(summary))
    }

    /// Chat teaser: a separate model call, or the analysis cut down. Falls back to truncation.
    async fn brief(&self, news_text: &str, report: &Report, analysed: bool) -> String {
        let max_chars = self.config.notify.brief_max_chars;
        if analysed && self.config.llm.brief_source == BriefSource::Model {
            match self.summarizer.brief(self.provider.as_ref(), news_text).await {
                Ok(brief) => return notify::truncate_brief(&brief, MESSAGE_BRIEF_LIMIT),
                Err(e) => warn!("brief model failed, using truncated analysis: {}", e),
            }
        }
        notify::truncate_brief(&report.analysis, max_chars)
    }

    async fn deliver(
        &self,
        report: &Report,
        markdown: &str,
        brief: &str,
        site_url: Option<String>,
        summary: &mut RunSummary,
    ) {
        let Some(telegram) = &self.telegram else {
            error!("{} / {} not set, nothing sent", self.config.notify.token_env, self.config.notify.chat_id_env);
            return;
        };
        let local_link = summary.report_path.display().to_string();

        let sent = match self.config.notify.channel {
            OutputChannel::File => {
                let link = site_url.unwrap_or(local_link);
                let message = notify::compose_message(report.date, brief, Some(&link));
                summary.link = Some(link);
                telegram.send_message(&message).await
            }
            OutputChannel::ChatDocument => {
                let caption = notify::compose_caption(report.date, brief, site_url.as_deref(), CAPTION_LIMIT);
                summary.link = site_url;
                let file_name = summary
                    .report_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| format!("{}.md", report.date_key()));
                telegram
                    .send_document(&file_name, markdown.as_bytes().to_vec(), &caption)
                    .await
            }
            OutputChannel::IssueAndChat => {
                summary.issue_url = self.archive_issue(report, markdown).await;
                let link = summary.issue_url.clone().or(site_url).unwrap_or(local_link);
                let message = notify::compose_message(report.date, brief, Some(&link));
                summary.link = Some(link);
                telegram.send_message(&message).await
            }
        };

        match sent {
            Ok(()) => {
                info!("chat notification sent");
                summary.delivered = true;
            }
            Err(e) => error!("chat notification failed: {}", e),
        }
    }

    async fn archive_issue(&self, report: &Report, markdown: &str) -> Option<String> {
        let Some(repo) = self.config.github.repo.as_deref() else {
            warn!("github.repo not configured, skipping issue archive");
            return None;
        };
        let Some(github) = &self.github else {
            warn!("{} not set, skipping issue archive", self.config.github.token_env);
            return None;
        };

        match github
            .create_issue(repo, &report::report_title(report.date), markdown)
            .await
        {
            Ok(url) => {
                info!(%url, "report archived as issue");
                Some(url)
            }
            Err(e) => {
                error!("issue archive failed: {}", e);
                None
            }
        }
    }
}
