use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::NotifyError;

/// Minimal GitHub REST client used to archive reports as issues
pub struct GithubClient {
    client: Client,
    api_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    html_url: String,
}

impl GithubClient {
    pub fn new(client: Client, token: impl Into<String>) -> Self {
        Self {
            client,
            api_url: "https://api.github.com".to_string(),
            token: token.into(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Opens an issue on `repo` (`owner/name`) and returns its browsable URL.
    pub async fn create_issue(&self, repo: &str, title: &str, body: &str) -> Result<String, NotifyError> {
        let resp = self
            .client
            .post(format!("{}/repos/{}/issues", self.api_url, repo))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", concat!("dailybrief/", env!("CARGO_PKG_VERSION")))
            .json(&json!({ "title": title, "body": body }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                service: "GitHub",
                status: status.as_u16(),
                body,
            });
        }

        let issue: CreatedIssue = resp.json().await?;
        Ok(issue.html_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn create_issue_returns_html_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/me/daily_news/issues")
            .match_header("authorization", "Bearer ghp_test")
            .match_body(Matcher::PartialJson(json!({ "title": "brief" })))
            .with_status(201)
            .with_body(r#"{"number":7,"html_url":"https://github.com/me/daily_news/issues/7"}"#)
            .create_async()
            .await;

        let client = GithubClient::new(Client::new(), "ghp_test").with_api_url(server.url());
        let url = client.create_issue("me/daily_news", "brief", "# body").await.unwrap();

        assert_eq!(url, "https://github.com/me/daily_news/issues/7");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_issue_surfaces_api_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/repos/me/daily_news/issues")
            .with_status(401)
            .with_body(r#"{"message":"Bad credentials"}"#)
            .create_async()
            .await;

        let client = GithubClient::new(Client::new(), "bad").with_api_url(server.url());
        let err = client.create_issue("me/daily_news", "t", "b").await.unwrap_err();

        assert!(matches!(err, NotifyError::Api { service: "GitHub", status: 401, .. }));
    }
}
