//! Shared JSON-over-HTTP plumbing for the hosted providers.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::LlmError;
use crate::retry::RetryPolicy;

/// How a request authenticates against the provider.
#[derive(Clone, Debug)]
pub enum Auth {
    None,
    Bearer(String),
    Header(&'static str, String),
}

/// A reqwest client with a per-request timeout and a retry policy.
#[derive(Clone, Debug)]
pub struct JsonHttp {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl JsonHttp {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, retry })
    }

    /// POST `body` as JSON and decode the JSON response into `T`.
    ///
    /// Transport failures and retryable statuses go through the retry policy;
    /// a body that does not decode is returned as `InvalidResponse` at once.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        auth: &Auth,
        body: &Value,
    ) -> Result<T, LlmError> {
        self.retry
            .execute(url, move || async move {
                debug!(url, "POST");
                let mut request = self.client.post(url).json(body);
                request = match auth {
                    Auth::None => request,
                    Auth::Bearer(token) => request.bearer_auth(token),
                    Auth::Header(name, value) => request.header(*name, value.as_str()),
                };

                let response = request.send().await?;
                let status = response.status();
                if !status.is_success() {
                    let message = response.text().await.unwrap_or_default();
                    return Err(LlmError::Api {
                        status: status.as_u16(),
                        message: truncate_message(&message),
                    });
                }

                let text = response.text().await?;
                serde_json::from_str::<T>(&text).map_err(|e| {
                    LlmError::InvalidResponse(format!("{e}: {}", truncate_message(&text)))
                })
            })
            .await
    }
}

fn truncate_message(message: &str) -> String {
    const LIMIT: usize = 300;
    match message.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &message[..idx]),
        None => message.to_string(),
    }
}

/// Join a base URL and a path without doubling the slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
