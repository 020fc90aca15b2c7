use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use shared::{
    error::{ApiError, ApiException, ErrorCode},
    protocol::{ListQuery, RawPage},
};
use tracing::debug;
use url::Url;

use crate::{config::ListSettings, error::ListError};

/// Outbound seam to the REST collection endpoints: one call per page load.
#[async_trait]
pub trait ListTransport: Send + Sync {
    async fn fetch_page(&self, endpoint: &str, query: &ListQuery) -> Result<RawPage, ListError>;
}

pub struct HttpListTransport {
    http: Client,
    server_url: String,
}

impl HttpListTransport {
    pub fn new(server_url: &str) -> Result<Self, ListError> {
        Self::with_client(Client::new(), server_url)
    }

    pub fn from_settings(settings: &ListSettings) -> Result<Self, ListError> {
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(ListError::Client)?;
        Self::with_client(http, &settings.server_url)
    }

    pub fn with_client(http: Client, server_url: &str) -> Result<Self, ListError> {
        let parsed = Url::parse(server_url)?;
        Ok(Self {
            http,
            server_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.server_url, endpoint.trim_start_matches('/'))
    }
}

#[async_trait]
impl ListTransport for HttpListTransport {
    async fn fetch_page(&self, endpoint: &str, query: &ListQuery) -> Result<RawPage, ListError> {
        let data = query.to_query_param().map_err(ListError::Encode)?;
        let url = self.endpoint_url(endpoint);
        debug!(%url, page = query.page, page_size = query.page_size, "fetching list page");

        let response = self
            .http
            .get(&url)
            .query(&[("data", data)])
            .send()
            .await
            .map_err(|err| ListError::transport(endpoint, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ListError::Rejected {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                source: rejection_from_body(status, &body),
            });
        }

        response
            .json::<RawPage>()
            .await
            .map_err(|err| ListError::transport(endpoint, err))
    }
}

fn rejection_from_body(status: StatusCode, body: &str) -> ApiException {
    if let Ok(api_error) = serde_json::from_str::<ApiError>(body) {
        return api_error.into();
    }
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.trim().to_string()
    };
    ApiError::new(error_code_for_status(status), message).into()
}

fn error_code_for_status(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::UNAUTHORIZED => ErrorCode::Unauthorized,
        StatusCode::FORBIDDEN => ErrorCode::Forbidden,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorCode::Validation,
        StatusCode::TOO_MANY_REQUESTS => ErrorCode::RateLimited,
        _ => ErrorCode::Internal,
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
