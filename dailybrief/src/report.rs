use anyhow::{Context, Result};
use chrono::NaiveDate;
use common::ReportLayout;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::Report;

/// Title line shared by the report heading, issue title and chat caption.
pub fn report_title(date: NaiveDate) -> String {
    format!("📑 데일리 경제 브리핑 보고서 ({})", date.format("%Y-%m-%d"))
}

/// Renders the report as markdown. Output depends only on the report contents.
pub fn render_markdown(report: &Report) -> String {
    let mut md = String::new();
    // Writing into a String cannot fail
    let _ = writeln!(md, "# {}\n", report_title(report.date));
    let _ = writeln!(md, "## 📰 주요 뉴스 헤드라인 (TOP {})", report.items.len());
    for (i, item) in report.items.iter().enumerate() {
        let _ = writeln!(md, "{}. [{}] [{}]({})", i + 1, item.category, item.title, item.link);
    }
    md.push_str("\n---\n\n");
    md.push_str("## 🤖 AI 분석 및 시장 전망\n");
    md.push_str(&report.analysis);
    md
}

/// File location for a given date under the configured layout.
pub fn report_path(layout: ReportLayout, dir: &Path, date: NaiveDate) -> PathBuf {
    let day = date.format("%Y-%m-%d");
    match layout {
        ReportLayout::ReportsDir => dir.join(format!("{}.md", day)),
        ReportLayout::WorkingDir => PathBuf::from(format!("daily_brief_{}.md", day)),
    }
}

/// Published URL of the report, when a template is configured.
pub fn site_url(template: Option<&str>, date: NaiveDate) -> Option<String> {
    template.map(|t| t.replace("{date}", &date.format("%Y-%m-%d").to_string()))
}

/// Writes `markdown` to `path`, creating parent directories and replacing any earlier file.
pub async fn save_report(path: &Path, markdown: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create report directory: {}", parent.display()))?;
    }
    tokio::fs::write(path, markdown)
        .await
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    info!(path = %path.display(), bytes = markdown.len(), "report saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, NewsItem};

    fn sample() -> Report {
        Report::new(
            NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(),
            vec![
                NewsItem {
                    category: Category::Economy,
                    title: "Rates held".into(),
                    link: "https://example.com/a".into(),
                    summary: "s".into(),
                },
                NewsItem {
                    category: Category::Securities,
                    title: "KOSPI up".into(),
                    link: "https://example.com/b".into(),
                    summary: "s".into(),
                },
            ],
            "Market is stable.",
        )
    }

    #[test]
    fn renders_fixed_layout() {
        let md = render_markdown(&sample());
        let expected = "# 📑 데일리 경제 브리핑 보고서 (2026-02-28)\n\n\
                        ## 📰 주요 뉴스 헤드라인 (TOP 2)\n\
                        1. [경제] [Rates held](https://example.com/a)\n\
                        2. [증권] [KOSPI up](https://example.com/b)\n\
                        \n---\n\n\
                        ## 🤖 AI 분석 및 시장 전망\n\
                        Market is stable.";
        assert_eq!(md, expected);
    }

    #[test]
    fn rendering_is_deterministic() {
        let report = sample();
        assert_eq!(render_markdown(&report), render_markdown(&report.clone()));
    }

    #[test]
    fn paths_follow_layout() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(
            report_path(ReportLayout::ReportsDir, Path::new("docs/reports"), date),
            PathBuf::from("docs/reports/2026-03-01.md")
        );
        assert_eq!(
            report_path(ReportLayout::WorkingDir, Path::new("ignored"), date),
            PathBuf::from("daily_brief_2026-03-01.md")
        );
    }

    #[test]
    fn site_url_substitutes_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(
            site_url(Some("https://me.github.io/news/reports/{date}.md"), date).as_deref(),
            Some("https://me.github.io/news/reports/2026-03-01.md")
        );
        assert!(site_url(None, date).is_none());
    }

    #[tokio::test]
    async fn save_overwrites_existing_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/2026-03-01.md");

        save_report(&path, "first").await.unwrap();
        save_report(&path, "second").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }
}
