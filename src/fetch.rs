use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::error::Error;

/// Raw content retrieved for one target, plus the page title as a hint for
/// diagnostics.
#[derive(Debug, Clone)]
pub struct Page {
    pub content: String,
    pub title_hint: String,
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),
    #[error("blocked by challenge page ({0:?})")]
    Challenge(String),
}

/// Capability that retrieves page content for a URL.
///
/// `fetch` takes `&mut self` so a single fetcher instance can only have one
/// request in flight, matching the deliberately sequential pacing of the
/// monitor. Implementations own any anti-automation detection and report it
/// as `FetchError::Challenge`; the monitor treats that like any other fetch
/// failure and skips the target for the cycle.
#[allow(async_fn_in_trait)]
pub trait PageFetcher {
    async fn fetch(&mut self, url: &str) -> Result<Page, FetchError>;
}

/// Plain HTTP fetcher. Sufficient for status pages that do not sit behind
/// JavaScript challenges; pages that do are reported as `Challenge` so the
/// monitor skips them instead of misclassifying interstitial content.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

// Interstitial pages from common bot-protection vendors carry one of these
// titles instead of the real page.
const CHALLENGE_TITLES: [&str; 2] = ["just a moment", "attention required"];

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/119.0.0.0 Safari/537.36";

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&mut self, url: &str) -> Result<Page, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let content = response.text().await?;

        let title_hint = extract_title(&content).unwrap_or_default();
        if is_challenge_title(&title_hint) {
            return Err(FetchError::Challenge(title_hint));
        }
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        Ok(Page {
            content,
            title_hint,
        })
    }
}

fn is_challenge_title(title: &str) -> bool {
    let title = title.to_ascii_lowercase();
    CHALLENGE_TITLES
        .iter()
        .any(|marker| title.contains(marker))
}

/// Extracts the text of the first `<title>` element, if any.
fn extract_title(html: &str) -> Option<String> {
    // ASCII folding keeps byte offsets valid for slicing the original text.
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let open_end = lower[open..].find('>')? + open + 1;
    let close = lower[open_end..].find("</title>")? + open_end;
    Some(html[open_end..close].trim().to_string())
}
