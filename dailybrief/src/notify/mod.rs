//! Delivery of the finished brief: Telegram chat messages and GitHub issue archiving.

use chrono::NaiveDate;
use thiserror::Error;

pub mod github;
pub mod telegram;

pub use github::GithubClient;
pub use telegram::TelegramClient;

/// Telegram rejects captions above this many characters.
pub const CAPTION_LIMIT: usize = 1024;

/// Delivery errors
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote API returned an error
    #[error("{service} API error {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },
}

/// HTML chat message: dated header, teaser, and a link to the full report when one exists.
/// Web links become anchors; local paths are shown verbatim.
pub fn compose_message(date: NaiveDate, brief: &str, link: Option<&str>) -> String {
    let mut message = format!(
        "📅 <b>오늘의 경제 브리핑 ({})</b>\n\n{}",
        date.format("%Y-%m-%d"),
        html_escape::encode_text(brief.trim())
    );

    match link {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
            message.push_str(&format!(
                "\n\n🔗 <a href=\"{}\">상세 분석 보고서 보기</a>",
                html_escape::encode_double_quoted_attribute(url)
            ));
        }
        Some(path) => {
            message.push_str(&format!(
                "\n\n🔗 상세 분석 보고서: <code>{}</code>",
                html_escape::encode_text(path)
            ));
        }
        None => {}
    }

    message
}

/// Like [`compose_message`], but keeps the whole caption within `limit` characters.
/// Only the brief is shortened, measured by its escaped length, so the header
/// and the link markup always survive intact.
pub fn compose_caption(date: NaiveDate, brief: &str, link: Option<&str>, limit: usize) -> String {
    let full = compose_message(date, brief, link);
    if full.chars().count() <= limit {
        return full;
    }

    let budget = limit.saturating_sub(compose_message(date, "", link).chars().count());
    let mut cut = String::new();
    let mut used = 0;
    let mut buf = [0u8; 4];
    for c in brief.trim().chars() {
        let width = html_escape::encode_text(c.encode_utf8(&mut buf)).chars().count();
        // one slot is kept for the ellipsis
        if used + width + 1 > budget {
            break;
        }
        cut.push(c);
        used += width;
    }
    cut.push('…');
    compose_message(date, &cut, link)
}

/// Cuts `text` to at most `max_chars` characters, marking the cut with an ellipsis.
pub fn truncate_brief(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
