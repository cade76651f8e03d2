use chrono::NaiveDate;

pub use common::FeedCategory as Category;

pub const MISSING_TITLE: &str = "제목 없음";
pub const MISSING_SUMMARY: &str = "내용 없음";
pub const MISSING_LINK: &str = "#";

/// One headline taken from a feed entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    pub category: Category,
    pub title: String,
    pub link: String,
    pub summary: String,
}

/// Everything rendered into the markdown brief for one date
#[derive(Debug, Clone)]
pub struct Report {
    pub date: NaiveDate,
    pub items: Vec<NewsItem>,
    pub analysis: String,
}

impl Report {
    pub fn new(date: NaiveDate, items: Vec<NewsItem>, analysis: impl Into<String>) -> Self {
        Self {
            date,
            items,
            analysis: analysis.into(),
        }
    }

    /// `YYYY-MM-DD`, used for file names and headings
    pub fn date_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}
