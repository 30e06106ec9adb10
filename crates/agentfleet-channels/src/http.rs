//! Shared per-request retry helper for transports that talk to a cloud API
//! directly (as opposed to the channel-level reconnect backoff in
//! [`crate::manager`], which governs persistent connections).

use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::error::ChannelError;

/// Default per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Default number of retries after the first attempt.
pub const MAX_RETRIES: u32 = 2;
/// Base delay before the first retry; doubles each subsequent attempt.
pub const BASE_DELAY: Duration = Duration::from_millis(500);

/// POST `body` as JSON to `url`, retrying transport-level failures (timeouts,
/// connection errors) up to [`MAX_RETRIES`] times with exponential backoff.
/// A non-2xx HTTP response is not retried — it's surfaced immediately since
/// retrying a rejected request rarely helps and may duplicate side effects.
pub async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    auth_header: Option<(&str, &str)>,
    body: &Value,
    channel: &str,
) -> Result<Value, ChannelError> {
    let mut delay = BASE_DELAY;

    for attempt in 0..=MAX_RETRIES {
        let mut req = client.post(url).timeout(REQUEST_TIMEOUT).json(body);
        if let Some((name, value)) = auth_header {
            req = req.header(name, value);
        }

        match req.send().await {
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                if status.is_success() {
                    return serde_json::from_str(&text)
                        .map_err(|e| ChannelError::SendFailed(format!("malformed response: {e}")));
                }
                if status.as_u16() == 401 || status.as_u16() == 403 {
                    return Err(ChannelError::AuthFailed(format!(
                        "{channel} rejected credentials: {status} {text}"
                    )));
                }
                return Err(ChannelError::SendFailed(format!("{channel}: {status} {text}")));
            }
            Err(e) if attempt == MAX_RETRIES => {
                if e.is_timeout() {
                    return Err(ChannelError::Timeout {
                        ms: REQUEST_TIMEOUT.as_millis() as u64,
                    });
                }
                return Err(ChannelError::ConnectionFailed(e.to_string()));
            }
            Err(e) => {
                warn!(channel, attempt, error = %e, retry_after_ms = delay.as_millis() as u64, "request failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }

    unreachable!("retry loop always returns inside the match arms above")
}
