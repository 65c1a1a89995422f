//! HTTP implementation of the remote draft API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode, Url, header};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    application::adapters::{PublishPostParams, RemoteDraftClient, RemoteError, UpsertDraftParams},
    domain::drafts::{DraftRecord, PostRecord},
    domain::types::PostStatus,
    infra::error::InfraError,
};

use super::rate_limit::RateLimitStore;

const BLOGS_PATH: &str = "api/blogs";
const WRITE_ROUTE: &str = "blogs:write";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the blog API's draft endpoints.
///
/// Every write passes the local throttle first, so a runaway caller trips
/// the limiter here instead of hammering the server into rate limiting us.
#[derive(Debug, Clone)]
pub struct HttpDraftClient {
    client: Client,
    base: Url,
    blogs: Url,
    token: Option<String>,
    limiter: RateLimitStore,
    limit_key: String,
}

impl HttpDraftClient {
    pub fn new(
        base_url: &Url,
        api_token: Option<String>,
        account_id: Option<Uuid>,
        limiter: RateLimitStore,
    ) -> Result<Self, InfraError> {
        let base = base_url
            .join("/")
            .map_err(|err| InfraError::configuration(format!("invalid remote base url: {err}")))?;
        let blogs = base
            .join(BLOGS_PATH)
            .map_err(|err| InfraError::configuration(format!("invalid remote base url: {err}")))?;
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| {
                InfraError::configuration(format!("failed to build http client: {err}"))
            })?;
        let limit_key = match account_id {
            Some(id) => format!("account:{id}"),
            None => "anonymous".to_string(),
        };

        Ok(Self {
            client,
            base,
            blogs,
            token: api_token,
            limiter,
            limit_key,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("bozza/", env!("CARGO_PKG_VERSION"))
    }

    /// One connectivity probe against the remote root. Any response counts
    /// as online; only a transport failure counts as offline.
    pub async fn probe(&self) -> bool {
        let response = self
            .client
            .head(self.base.clone())
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        match response {
            Ok(_) => true,
            Err(err) => {
                debug!(error = %err, "connectivity probe failed");
                false
            }
        }
    }

    fn authorized(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn check_write_budget(&self) -> Result<(), RemoteError> {
        let (allowed, remaining) = self.limiter.allow(&self.limit_key, WRITE_ROUTE);
        if allowed {
            debug!(remaining, "write budget consumed");
            return Ok(());
        }
        let retry_after = self.limiter.retry_after_secs();
        warn!(target = "bozza::http", retry_after, "local write throttle engaged");
        Err(RemoteError::network(format!(
            "write throttled locally, retry after {retry_after}s"
        )))
    }

    fn single_blog_url(&self, id: Uuid) -> Url {
        let mut url = self.blogs.clone();
        url.query_pairs_mut().append_pair("id", &id.to_string());
        url
    }

    async fn send_blog(
        &self,
        method: Method,
        body: &DraftWriteDto<'_>,
    ) -> Result<BlogDto, RemoteError> {
        let response = self
            .authorized(method, self.blogs.clone())
            .json(body)
            .send()
            .await
            .map_err(RemoteError::network)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        response
            .json()
            .await
            .map_err(|err| RemoteError::network(format!("failed to parse blog body: {err}")))
    }

    async fn error_from_response(response: Response) -> RemoteError {
        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED => RemoteError::Unauthorized,
            StatusCode::NOT_FOUND => RemoteError::NotFound,
            StatusCode::BAD_REQUEST => RemoteError::rejected(read_error_message(response).await),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("?")
                    .to_string();
                RemoteError::network(format!(
                    "rate limited by server, retry after {retry_after}s"
                ))
            }
            _ => {
                let message = read_error_message(response).await;
                RemoteError::network(format!("status {status}: {message}"))
            }
        }
    }
}

#[async_trait]
impl RemoteDraftClient for HttpDraftClient {
    async fn upsert_draft(&self, params: UpsertDraftParams) -> Result<DraftRecord, RemoteError> {
        self.check_write_budget()?;
        let method = if params.id.is_some() {
            Method::PUT
        } else {
            Method::POST
        };
        let body = DraftWriteDto {
            id: params.id,
            title: &params.title,
            content: &params.content,
            category: &params.category,
            status: PostStatus::Draft,
            is_private: false,
        };
        let blog = self.send_blog(method, &body).await?;
        Ok(DraftRecord {
            id: blog.id,
            updated_at: blog.updated_at,
        })
    }

    async fn delete_draft(&self, id: Uuid) -> Result<(), RemoteError> {
        self.check_write_budget()?;
        let response = self
            .authorized(Method::DELETE, self.single_blog_url(id))
            .send()
            .await
            .map_err(RemoteError::network)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from_response(response).await)
        }
    }

    async fn publish(&self, params: PublishPostParams) -> Result<PostRecord, RemoteError> {
        self.check_write_budget()?;
        let method = if params.id.is_some() {
            Method::PUT
        } else {
            Method::POST
        };
        let body = DraftWriteDto {
            id: params.id,
            title: &params.title,
            content: &params.content,
            category: &params.category,
            status: PostStatus::Published,
            is_private: params.private,
        };
        let blog = self.send_blog(method, &body).await?;
        Ok(blog.into_post())
    }

    async fn fetch_post(&self, id: Uuid) -> Result<PostRecord, RemoteError> {
        let response = self
            .authorized(Method::GET, self.single_blog_url(id))
            .send()
            .await
            .map_err(RemoteError::network)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        let blog: BlogDto = response
            .json()
            .await
            .map_err(|err| RemoteError::network(format!("failed to parse blog body: {err}")))?;
        Ok(blog.into_post())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DraftWriteDto<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Uuid>,
    title: &'a str,
    content: &'a str,
    category: &'a str,
    status: PostStatus,
    is_private: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlogDto {
    id: Uuid,
    title: String,
    content: String,
    category: String,
    status: PostStatus,
    #[serde(default)]
    is_private: bool,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
    user: AuthorDto,
}

#[derive(Debug, Deserialize)]
struct AuthorDto {
    id: Uuid,
}

impl BlogDto {
    fn into_post(self) -> PostRecord {
        PostRecord {
            id: self.id,
            author_id: self.user.id,
            title: self.title,
            content: self.content,
            category: self.category,
            status: self.status,
            is_private: self.is_private,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

async fn read_error_message(response: Response) -> String {
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(_) => return "unreadable error body".to_string(),
    };
    match serde_json::from_slice::<ErrorBody>(&bytes) {
        Ok(body) => body.error,
        Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
    }
}
