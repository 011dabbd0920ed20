use log::{debug, warn};

use geocasher_logic::{FeedSource, Post, parse_feed, prelude::*};

const fn server_host() -> &'static str {
    if let Some(host) = option_env!("FEED_SERVER_HOST") {
        host
    } else {
        "localhost"
    }
}

const fn server_port() -> u16 {
    if let Some(port) = option_env!("FEED_SERVER_PORT") {
        const_str::parse!(port, u16)
    } else {
        8000
    }
}

const fn server_secure() -> bool {
    if let Some(secure) = option_env!("FEED_SERVER_SECURE") {
        const_str::eq_ignore_ascii_case!(secure, "true") || const_str::equal!(secure, "1")
    } else {
        false
    }
}

const fn server_http_proto() -> &'static str {
    if server_secure() { "https" } else { "http" }
}

const SERVER_HOST: &str = server_host();
const SERVER_PORT: u16 = server_port();
const SERVER_HTTP_PROTO: &str = server_http_proto();

const SERVER_SOCKET: &str = const_str::concat!(SERVER_HOST, ":", SERVER_PORT);

const SERVER_HTTP_URL: &str = const_str::concat!(SERVER_HTTP_PROTO, "://", SERVER_SOCKET);

/// Where the image feed is served from
pub const FEED_URL: &str = const_str::concat!(SERVER_HTTP_URL, "/imagefeed.json");

/// Fetches the post feed over HTTP
#[derive(Debug, Clone)]
pub struct HttpFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpFeed {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for HttpFeed {
    fn default() -> Self {
        Self::new(FEED_URL)
    }
}

impl FeedSource for HttpFeed {
    async fn fetch_posts(&self) -> Result<Vec<Post>> {
        debug!("Fetching feed from {}", self.url);
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("Failed to make request")?;

        // Error replies are parsed like any other body, usually yielding no posts
        let status = resp.status();
        if !status.is_success() {
            warn!("Feed server replied with {status}");
        }

        let body = resp.bytes().await.context("Failed to read feed body")?;
        Ok(parse_feed(&body))
    }
}
