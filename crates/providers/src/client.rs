use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

pub mod config;
pub mod consts;

/// Bodies longer than this are cut from error messages.
const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {source}")]
    Request {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{provider} returned no content")]
    Empty { provider: &'static str },
}

/// Sends `request` and returns the response if the status is a success.
pub(crate) async fn send(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<Response, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|source| ProviderError::Request { provider, source })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        body.truncate(cut);
    }
    Err(ProviderError::Status {
        provider,
        status,
        body,
    })
}

pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<T, ProviderError> {
    send(provider, request)
        .await?
        .json::<T>()
        .await
        .map_err(|source| ProviderError::Request { provider, source })
}
