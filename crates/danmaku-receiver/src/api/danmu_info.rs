//! Danmaku server lookup

use async_trait::async_trait;
use danmaku_common::BilibiliConfig;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, ORIGIN, USER_AGENT};
use serde::Deserialize;

const DANMU_INFO_PATH: &str = "/xlive/web-room/v1/index/getDanmuInfo";
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:135.0) Gecko/20100101 Firefox/135.0";
const LIVE_ORIGIN: &str = "https://live.bilibili.com";

/// Host lookup failures; any of these aborts startup for the room
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned code {code}: {message}")]
    Api { code: i64, message: String },

    #[error("API response has no data")]
    MissingData,

    #[error("API response lists no hosts")]
    NoHosts,

    #[error("Invalid header value for {0}")]
    InvalidHeader(&'static str),
}

/// Gateway endpoint and token for one room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanmuServer {
    pub host: String,
    pub port: u16,
    pub token: String,
}

impl DanmuServer {
    /// WebSocket URL of the gateway
    #[must_use]
    pub fn websocket_url(&self) -> String {
        format!("wss://{}:{}/sub", self.host, self.port)
    }
}

/// Resolves the gateway for a room
#[async_trait]
pub trait HostLookup: Send + Sync + 'static {
    async fn lookup(&self, room_id: i64) -> Result<DanmuServer, LookupError>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<DanmuInfo>,
}

#[derive(Debug, Deserialize)]
struct DanmuInfo {
    token: String,
    #[serde(default)]
    host_list: Vec<HostEntry>,
}

#[derive(Debug, Deserialize)]
struct HostEntry {
    host: String,
    wss_port: u16,
}

impl ApiResponse {
    fn into_server(self) -> Result<DanmuServer, LookupError> {
        if self.code != 0 {
            return Err(LookupError::Api {
                code: self.code,
                message: self.message,
            });
        }

        let data = self.data.ok_or(LookupError::MissingData)?;
        let first = data.host_list.into_iter().next().ok_or(LookupError::NoHosts)?;

        Ok(DanmuServer {
            host: first.host,
            port: first.wss_port,
            token: data.token,
        })
    }
}

/// HTTP client for the live API
#[derive(Debug, Clone)]
pub struct BiliApiClient {
    http: reqwest::Client,
    api_base: String,
}

impl BiliApiClient {
    /// Create a client sending browser-like headers and the configured cookie
    pub fn new(config: &BilibiliConfig) -> Result<Self, LookupError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(ORIGIN, HeaderValue::from_static(LIVE_ORIGIN));
        if !config.cookie.is_empty() {
            let cookie = HeaderValue::from_str(&config.cookie)
                .map_err(|_| LookupError::InvalidHeader("Cookie"))?;
            headers.insert(COOKIE, cookie);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self) -> String {
        format!("{}{DANMU_INFO_PATH}", self.api_base)
    }
}

#[async_trait]
impl HostLookup for BiliApiClient {
    #[tracing::instrument(skip(self))]
    async fn lookup(&self, room_id: i64) -> Result<DanmuServer, LookupError> {
        let response: ApiResponse = self
            .http
            .get(self.url())
            .query(&[("id", room_id.to_string()), ("type", "0".to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let server = response.into_server()?;
        tracing::debug!(host = %server.host, port = server.port, "Danmaku server resolved");
        Ok(server)
    }
}
