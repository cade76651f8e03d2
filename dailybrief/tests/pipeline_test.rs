use chrono::NaiveDate;
use common::{BriefSource, Config, Credentials, FeedConfig, OutputChannel, ReportLayout, TelegramCredentials};
use dailybrief::llm::summarizer::SummarizeError;
use dailybrief::pipeline::{Pipeline, RunOutcome};
use mockito::{Matcher, Mock, Server, ServerGuard};

fn rss(title: &str, link: &str, description: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>feed</title>
    <link>https://example.com</link>
    <description>feed</description>
    <item>
      <title>{title}</title>
      <link>{link}</link>
      <description>{description}</description>
    </item>
  </channel>
</rss>"#
    )
}

const EMPTY_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>feed</title><link>https://example.com</link><description>feed</description></channel></rss>"#;

fn gemini_body(text: &str) -> String {
    serde_json::json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
    })
    .to_string()
}

fn credentials(github: bool) -> Credentials {
    Credentials {
        gemini_api_key: "gemini-key".into(),
        telegram: Some(TelegramCredentials {
            bot_token: "TOKEN".into(),
            chat_id: "42".into(),
        }),
        github_token: github.then(|| "ghp_test".to_string()),
    }
}

fn config(server: &ServerGuard, report_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.feeds.sources = vec![
        FeedConfig { url: format!("{}/feed/economy", server.url()), category: None },
        FeedConfig { url: format!("{}/feed/finance", server.url()), category: None },
    ];
    config.feeds.fetch_timeout_seconds = 5;
    config.llm.api_url = server.url();
    config.llm.model_priority = vec!["gemini-2.5-flash".into(), "gemma-3-27b".into()];
    config.llm.brief_source = BriefSource::Truncate;
    config.llm.timeout_seconds = 5;
    config.report.layout = ReportLayout::ReportsDir;
    config.report.dir = report_dir.to_string_lossy().into_owned();
    config.notify.telegram_api_url = server.url();
    config.github.api_url = server.url();
    config
}

async fn mock_feeds(server: &mut ServerGuard) -> Vec<Mock> {
    let economy = server
        .mock("GET", "/feed/economy")
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(rss("Rates held steady", "https://news.example/a", "BoK kept rates."))
        .create_async()
        .await;
    let finance = server
        .mock("GET", "/feed/finance")
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(rss("KOSPI closes higher", "https://news.example/b", "Chipmakers led."))
        .create_async()
        .await;
    vec![economy, finance]
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()
}

#[tokio::test]
async fn test_end_to_end_with_quota_fallback() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let _feeds = mock_feeds(&mut server).await;

    let primary = server
        .mock("POST", "/models/gemini-2.5-flash:generateContent")
        .with_status(429)
        .with_body(r#"{"error":{"code":429,"message":"429 quota exceeded"}}"#)
        .expect(1)
        .create_async()
        .await;
    let secondary = server
        .mock("POST", "/models/gemma-3-27b:generateContent")
        .with_status(200)
        .with_body(gemini_body("Market is stable."))
        .expect(1)
        .create_async()
        .await;
    let telegram = server
        .mock("POST", "/botTOKEN/sendMessage")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("2026-02-28".to_string()),
            Matcher::Regex("2026-02-28\\.md".to_string()),
        ]))
        .with_status(200)
        .with_body(r#"{"ok":true,"result":{}}"#)
        .expect(1)
        .create_async()
        .await;

    let pipeline = Pipeline::new(config(&server, dir.path()), &credentials(false));
    let outcome = pipeline.run(today()).await.expect("run");

    let RunOutcome::Completed(summary) = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(summary.items, 2);
    assert_eq!(summary.model.as_deref(), Some("gemma-3-27b"));
    assert!(summary.delivered);
    assert_eq!(summary.report_path, dir.path().join("2026-02-28.md"));

    let markdown = std::fs::read_to_string(&summary.report_path).unwrap();
    let first = markdown.find("1. [경제] [Rates held steady](https://news.example/a)").expect("first headline");
    let second = markdown.find("2. [증권] [KOSPI closes higher](https://news.example/b)").expect("second headline");
    let analysis = markdown.find("Market is stable.").expect("analysis");
    assert!(first < second && second < analysis);

    primary.assert_async().await;
    secondary.assert_async().await;
    telegram.assert_async().await;
}

#[tokio::test]
async fn test_non_fallback_error_aborts_run() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let _feeds = mock_feeds(&mut server).await;

    let _primary = server
        .mock("POST", "/models/gemini-2.5-flash:generateContent")
        .with_status(403)
        .with_body(r#"{"error":{"code":403,"message":"permission denied"}}"#)
        .create_async()
        .await;
    let secondary = server
        .mock("POST", "/models/gemma-3-27b:generateContent")
        .expect(0)
        .create_async()
        .await;
    let telegram = server
        .mock("POST", "/botTOKEN/sendMessage")
        .expect(0)
        .create_async()
        .await;

    let pipeline = Pipeline::new(config(&server, dir.path()), &credentials(false));
    let err = pipeline.run(today()).await.unwrap_err();

    assert!(format!("{:#}", err).contains("permission denied"));
    assert!(matches!(
        err.downcast_ref::<SummarizeError>(),
        Some(SummarizeError::Aborted { model, .. }) if model == "gemini-2.5-flash"
    ));
    // context → SummarizeError → GenerationError stays a chain, not one flattened string
    assert!(err.chain().count() >= 3);
    assert!(!dir.path().join("2026-02-28.md").exists());
    secondary.assert_async().await;
    telegram.assert_async().await;
}

#[tokio::test]
async fn test_exhausted_models_still_write_report() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let _feeds = mock_feeds(&mut server).await;

    let mut _models = Vec::new();
    for model in ["gemini-2.5-flash", "gemma-3-27b"] {
        let mock = server
            .mock("POST", format!("/models/{}:generateContent", model).as_str())
            .with_status(404)
            .with_body(r#"{"error":{"code":404,"message":"not found"}}"#)
            .create_async()
            .await;
        _models.push(mock);
    }
    let _telegram = server
        .mock("POST", "/botTOKEN/sendMessage")
        .with_status(200)
        .with_body(r#"{"ok":true,"result":{}}"#)
        .create_async()
        .await;

    let pipeline = Pipeline::new(config(&server, dir.path()), &credentials(false));
    let RunOutcome::Completed(summary) = pipeline.run(today()).await.expect("run") else {
        panic!("expected a completed run");
    };

    assert!(summary.model.is_none());
    let markdown = std::fs::read_to_string(&summary.report_path).unwrap();
    assert!(markdown.ends_with(dailybrief::llm::summarizer::ALL_MODELS_FAILED));
}

#[tokio::test]
async fn test_no_news_skips_summarizer() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();

    let mut _feeds = Vec::new();
    for path in ["/feed/economy", "/feed/finance"] {
        let mock = server
            .mock("GET", path)
            .with_status(200)
            .with_body(EMPTY_RSS)
            .create_async()
            .await;
        _feeds.push(mock);
    }
    let model = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let pipeline = Pipeline::new(config(&server, dir.path()), &credentials(false));
    let outcome = pipeline.run(today()).await.expect("run");

    assert!(matches!(outcome, RunOutcome::NoNews));
    model.assert_async().await;
}

#[tokio::test]
async fn test_issue_channel_links_issue_url() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let _feeds = mock_feeds(&mut server).await;

    let _model = server
        .mock("POST", "/models/gemini-2.5-flash:generateContent")
        .with_status(200)
        .with_body(gemini_body("Market is stable."))
        .create_async()
        .await;
    let issue = server
        .mock("POST", "/repos/me/daily_news/issues")
        .match_body(Matcher::Regex("Market is stable".to_string()))
        .with_status(201)
        .with_body(r#"{"html_url":"https://github.com/me/daily_news/issues/3"}"#)
        .create_async()
        .await;
    let telegram = server
        .mock("POST", "/botTOKEN/sendMessage")
        .match_body(Matcher::Regex("https://github.com/me/daily_news/issues/3".to_string()))
        .with_status(200)
        .with_body(r#"{"ok":true,"result":{}}"#)
        .create_async()
        .await;

    let mut config = config(&server, dir.path());
    config.notify.channel = OutputChannel::IssueAndChat;
    config.github.repo = Some("me/daily_news".into());

    let pipeline = Pipeline::new(config, &credentials(true));
    let RunOutcome::Completed(summary) = pipeline.run(today()).await.expect("run") else {
        panic!("expected a completed run");
    };

    assert_eq!(summary.issue_url.as_deref(), Some("https://github.com/me/daily_news/issues/3"));
    assert!(summary.delivered);
    issue.assert_async().await;
    telegram.assert_async().await;
}

#[tokio::test]
async fn test_delivery_failure_is_not_fatal() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let _feeds = mock_feeds(&mut server).await;

    let _model = server
        .mock("POST", "/models/gemini-2.5-flash:generateContent")
        .with_status(200)
        .with_body(gemini_body("Market is stable."))
        .create_async()
        .await;
    let _telegram = server
        .mock("POST", "/botTOKEN/sendDocument")
        .with_status(400)
        .with_body(r#"{"ok":false,"description":"Bad Request"}"#)
        .create_async()
        .await;

    let mut config = config(&server, dir.path());
    config.notify.channel = OutputChannel::ChatDocument;

    let pipeline = Pipeline::new(config, &credentials(false));
    let RunOutcome::Completed(summary) = pipeline.run(today()).await.expect("run") else {
        panic!("expected a completed run");
    };

    assert!(!summary.delivered);
    assert!(summary.report_path.exists());
}

#[tokio::test]
async fn test_dry_run_sends_nothing() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let _feeds = mock_feeds(&mut server).await;

    let _model = server
        .mock("POST", "/models/gemini-2.5-flash:generateContent")
        .with_status(200)
        .with_body(gemini_body("Market is stable."))
        .create_async()
        .await;
    let telegram = server
        .mock("POST", Matcher::Regex("^/botTOKEN/".to_string()))
        .expect(0)
        .create_async()
        .await;

    let mut credentials = credentials(false);
    credentials.telegram = None;
    let pipeline = Pipeline::new(config(&server, dir.path()), &credentials).dry_run(true);
    let RunOutcome::Completed(summary) = pipeline.run(today()).await.expect("run") else {
        panic!("expected a completed run");
    };

    assert!(!summary.delivered);
    assert!(summary.report_path.exists());
    telegram.assert_async().await;
}

#[tokio::test]
async fn test_brief_model_failure_falls_back_to_analysis() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let _feeds = mock_feeds(&mut server).await;

    let _model = server
        .mock("POST", "/models/gemini-2.5-flash:generateContent")
        .with_status(200)
        .with_body(gemini_body("Market is stable."))
        .create_async()
        .await;
    let brief = server
        .mock("POST", "/models/brief-model:generateContent")
        .with_status(500)
        .with_body(r#"{"error":{"code":500,"message":"internal error"}}"#)
        .expect(1)
        .create_async()
        .await;
    let telegram = server
        .mock("POST", "/botTOKEN/sendMessage")
        .match_body(Matcher::Regex("Market is stable\\.".to_string()))
        .with_status(200)
        .with_body(r#"{"ok":true,"result":{}}"#)
        .expect(1)
        .create_async()
        .await;

    let mut config = config(&server, dir.path());
    config.llm.brief_source = BriefSource::Model;
    config.llm.brief_model = "models/brief-model".into();

    let pipeline = Pipeline::new(config, &credentials(false));
    let RunOutcome::Completed(summary) = pipeline.run(today()).await.expect("run") else {
        panic!("expected a completed run");
    };

    assert!(summary.delivered);
    brief.assert_async().await;
    telegram.assert_async().await;
}

#[tokio::test]
async fn test_brief_model_text_is_sent() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let _feeds = mock_feeds(&mut server).await;

    let _model = server
        .mock("POST", "/models/gemini-2.5-flash:generateContent")
        .with_status(200)
        .with_body(gemini_body("Market is stable."))
        .create_async()
        .await;
    let brief = server
        .mock("POST", "/models/brief-model:generateContent")
        .with_status(200)
        .with_body(gemini_body("Rates on hold, chips rally."))
        .expect(1)
        .create_async()
        .await;
    let telegram = server
        .mock("POST", "/botTOKEN/sendMessage")
        .match_body(Matcher::Regex("Rates on hold, chips rally\\.".to_string()))
        .with_status(200)
        .with_body(r#"{"ok":true,"result":{}}"#)
        .expect(1)
        .create_async()
        .await;

    let mut config = config(&server, dir.path());
    config.llm.brief_source = BriefSource::Model;
    config.llm.brief_model = "models/brief-model".into();

    let pipeline = Pipeline::new(config, &credentials(false));
    let RunOutcome::Completed(summary) = pipeline.run(today()).await.expect("run") else {
        panic!("expected a completed run");
    };

    assert!(summary.delivered);
    let markdown = std::fs::read_to_string(&summary.report_path).unwrap();
    assert!(!markdown.contains("Rates on hold"));
    brief.assert_async().await;
    telegram.assert_async().await;
}

#[tokio::test]
async fn test_document_caption_keeps_link_markup() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let _feeds = mock_feeds(&mut server).await;

    let analysis = format!("{}{}", "&".repeat(30), "가".repeat(900));
    let _model = server
        .mock("POST", "/models/gemini-2.5-flash:generateContent")
        .with_status(200)
        .with_body(gemini_body(&analysis))
        .create_async()
        .await;
    let telegram = server
        .mock("POST", "/botTOKEN/sendDocument")
        .match_body(Matcher::Regex(
            "<a href=\"https://me.github.io/daily_news/2026-02-28.html\">상세 분석 보고서 보기</a>".to_string(),
        ))
        .with_status(200)
        .with_body(r#"{"ok":true,"result":{}}"#)
        .expect(1)
        .create_async()
        .await;

    let mut config = config(&server, dir.path());
    config.notify.channel = OutputChannel::ChatDocument;
    config.notify.brief_max_chars = 2000;
    config.report.site_url_template = Some("https://me.github.io/daily_news/{date}.html".into());

    let pipeline = Pipeline::new(config, &credentials(false));
    let RunOutcome::Completed(summary) = pipeline.run(today()).await.expect("run") else {
        panic!("expected a completed run");
    };

    assert!(summary.delivered);
    telegram.assert_async().await;
}
