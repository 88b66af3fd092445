//! Telegram Bot API notifier.

use crate::domain::config_validation::TELEGRAM_HARD_LIMIT;
use crate::domain::error::ScannerError;
use crate::ports::notification_port::NotificationPort;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

pub const TOKEN_ENV: &str = "TELEGRAM_TOKEN";
pub const CHAT_ID_ENV: &str = "TELEGRAM_CHAT_ID";

const API_BASE: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramAdapter {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
    max_chars: usize,
    retries: u8,
    retry_delay: Duration,
}

impl TelegramAdapter {
    pub fn new(
        token: &str,
        chat_id: &str,
        max_chars: usize,
        retries: u8,
    ) -> Result<Self, ScannerError> {
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| sink_error(e.to_string()))?;
        Ok(Self {
            client,
            api_base: API_BASE.to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
            max_chars: max_chars.min(TELEGRAM_HARD_LIMIT),
            retries,
            retry_delay: RETRY_DELAY,
        })
    }

    /// Credentials from `TELEGRAM_TOKEN` / `TELEGRAM_CHAT_ID`; `None` when
    /// either is unset or blank.
    pub fn from_env(max_chars: usize, retries: u8) -> Result<Option<Self>, ScannerError> {
        let read = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        match (read(TOKEN_ENV), read(CHAT_ID_ENV)) {
            (Some(token), Some(chat_id)) => {
                Self::new(&token, &chat_id, max_chars, retries).map(Some)
            }
            _ => Ok(None),
        }
    }

    #[cfg(test)]
    fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.to_string();
        self.retry_delay = Duration::ZERO;
        self
    }

    fn send_once(&self, text: &str) -> Result<(), ScannerError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("chat_id", self.chat_id.as_str()),
                ("text", text),
                ("disable_web_page_preview", "true"),
            ])
            .send()
            // the URL carries the bot token
            .map_err(|e| sink_error(e.without_url().to_string()))?;

        let status = response.status();
        let body = response.text().unwrap_or_default();
        let api: Option<ApiResponse> = serde_json::from_str(&body).ok();
        match api {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(ApiResponse {
                description: Some(description),
                ..
            }) => Err(sink_error(format!("HTTP {}: {}", status, description))),
            _ => Err(sink_error(format!("HTTP {}", status))),
        }
    }
}

fn sink_error(reason: String) -> ScannerError {
    ScannerError::Sink {
        sink: "telegram".to_string(),
        reason,
    }
}

impl NotificationPort for TelegramAdapter {
    fn name(&self) -> &str {
        "telegram"
    }

    fn max_chars(&self) -> usize {
        self.max_chars
    }

    fn send(&self, text: &str) -> Result<(), ScannerError> {
        let mut attempt = 0;
        loop {
            match self.send_once(text) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(error = %e, attempt, "telegram send failed, retrying");
                    std::thread::sleep(self.retry_delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::runtime::Runtime;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SEND_PATH: &str = "/bot123:abc/sendMessage";

    fn start() -> (Runtime, MockServer) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let server = rt.block_on(MockServer::start());
        (rt, server)
    }

    fn adapter(server: &MockServer, retries: u8) -> TelegramAdapter {
        TelegramAdapter::new("123:abc", "42", 3500, retries)
            .unwrap()
            .with_api_base(&server.uri())
    }

    fn ok() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"ok": true}))
    }

    #[test]
    fn send_posts_form() {
        let (rt, server) = start();
        rt.block_on(
            Mock::given(method("POST"))
                .and(path(SEND_PATH))
                .and(body_string_contains("chat_id=42"))
                .and(body_string_contains("text=hello"))
                .and(body_string_contains("disable_web_page_preview=true"))
                .respond_with(ok())
                .expect(1)
                .mount(&server),
        );

        adapter(&server, 0).send("hello").unwrap();
        rt.block_on(server.verify());
    }

    #[test]
    fn api_error_is_sink_error() {
        let (rt, server) = start();
        rt.block_on(
            Mock::given(method("POST"))
                .and(path(SEND_PATH))
                .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                    "ok": false,
                    "description": "Bad Request: chat not found"
                })))
                .expect(1)
                .mount(&server),
        );

        let err = adapter(&server, 0).send("hello").unwrap_err();
        assert!(matches!(
            &err,
            ScannerError::Sink { reason, .. } if reason.contains("chat not found")
        ));
        assert!(!err.to_string().contains("123:abc"));
        rt.block_on(server.verify());
    }

    #[test]
    fn retries_once_then_succeeds() {
        let (rt, server) = start();
        rt.block_on(async {
            Mock::given(method("POST"))
                .and(path(SEND_PATH))
                .respond_with(ResponseTemplate::new(502))
                .up_to_n_times(1)
                .with_priority(1)
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path(SEND_PATH))
                .respond_with(ok())
                .expect(1)
                .mount(&server)
                .await;
        });

        adapter(&server, 1).send("hello").unwrap();
        rt.block_on(server.verify());
    }

    #[test]
    fn gives_up_after_retry() {
        let (rt, server) = start();
        rt.block_on(
            Mock::given(method("POST"))
                .and(path(SEND_PATH))
                .respond_with(ResponseTemplate::new(502))
                .expect(2)
                .mount(&server),
        );

        assert!(adapter(&server, 1).send("hello").is_err());
        rt.block_on(server.verify());
    }

    #[test]
    fn max_chars_capped_at_api_limit() {
        let adapter = TelegramAdapter::new("t", "c", 10_000, 0).unwrap();
        assert_eq!(adapter.max_chars(), TELEGRAM_HARD_LIMIT);
    }
}
