//! Identity lookups against one upstream Yggdrasil provider.
//!
//! # Responsibilities
//! - Batch name → UUID resolution (`POST .../profiles/minecraft`)
//! - UUID → profile resolution (`GET .../session/minecraft/profile/<hex>`)
//! - Tell "not found" apart from upstream failure
//!
//! # Design Decisions
//! - One client per provider; the endpoint is fixed at construction
//! - The `reqwest::Client` is shared, so connections to the provider are pooled
//! - Unknown names are simply absent from a batch result

use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use url::Url;
use uuid::Uuid;

use crate::yggdrasil::profile::{GameProfile, ProfileRef};

#[derive(Debug, thiserror::Error)]
pub enum YggdrasilError {
    #[error("upstream unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),
    #[error("upstream {url} answered {status}")]
    UpstreamStatus { status: u16, url: String },
    /// The upstream answered with something that is not the expected JSON.
    #[error("upstream protocol error: {0}")]
    Protocol(String),
}

/// Anything that can resolve names and profiles.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    /// Resolve `names`. Only recognised names appear in the result.
    async fn query_uuids(&self, names: &[String]) -> Result<Vec<ProfileRef>, YggdrasilError>;

    /// Fetch one profile. `Ok(None)` means no such profile.
    async fn query_profile(
        &self,
        id: Uuid,
        with_signature: bool,
    ) -> Result<Option<GameProfile>, YggdrasilError>;
}

/// Endpoint layout of a provider.
#[derive(Debug, Clone)]
pub struct ApiProvider {
    name: &'static str,
    profiles_by_name: String,
    profile_base: String,
}

impl ApiProvider {
    /// Provider with explicit endpoints. `profile_base` is completed by
    /// appending the dashless UUID.
    pub fn new(name: &'static str, profiles_by_name: impl Into<String>, profile_base: impl Into<String>) -> Self {
        Self {
            name,
            profiles_by_name: profiles_by_name.into(),
            profile_base: profile_base.into(),
        }
    }

    /// Provider rooted at a configured API root (which ends in `/`).
    pub fn custom(api_root: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            name: "custom",
            profiles_by_name: api_root.join("api/profiles/minecraft")?.to_string(),
            profile_base: api_root.join("sessionserver/session/minecraft/profile/")?.to_string(),
        })
    }

    pub fn mojang() -> Self {
        Self {
            name: "mojang",
            profiles_by_name: "https://api.mojang.com/profiles/minecraft".to_string(),
            profile_base: "https://sessionserver.mojang.com/session/minecraft/profile/".to_string(),
        }
    }

    pub fn profiles_by_name_url(&self) -> &str {
        &self.profiles_by_name
    }

    pub fn profile_url(&self, id: Uuid, with_signature: bool) -> String {
        let mut url = format!("{}{}", self.profile_base, id.simple());
        if with_signature {
            url.push_str("?unsigned=false");
        }
        url
    }
}

/// Build the HTTP client used for identity lookups.
pub fn http_client(
    connect_timeout: Duration,
    request_timeout: Duration,
    proxy: Option<&str>,
) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .user_agent(concat!("yggdrasil-gateway/", env!("CARGO_PKG_VERSION")));
    builder = match proxy {
        Some(proxy) => builder.proxy(reqwest::Proxy::all(proxy)?),
        None => builder.no_proxy(),
    };
    builder.build()
}

/// [`ProfileLookup`] backed by one provider over HTTP.
#[derive(Debug, Clone)]
pub struct YggdrasilClient {
    provider: ApiProvider,
    http: reqwest::Client,
}

impl YggdrasilClient {
    pub fn new(provider: ApiProvider, http: reqwest::Client) -> Self {
        Self { provider, http }
    }

    /// Send a request and return the body of a successful answer.
    /// `None` stands for "not found" (204, 404 or an empty body).
    async fn fetch(&self, request: reqwest::RequestBuilder, url: &str) -> Result<Option<bytes::Bytes>, YggdrasilError> {
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(YggdrasilError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(body))
    }
}

#[async_trait]
impl ProfileLookup for YggdrasilClient {
    async fn query_uuids(&self, names: &[String]) -> Result<Vec<ProfileRef>, YggdrasilError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.provider.profiles_by_name_url();
        tracing::debug!(provider = self.provider.name, count = names.len(), "Querying uuids");
        let body = self.fetch(self.http.post(url).json(names), url).await?;
        match body {
            None => Ok(Vec::new()),
            Some(body) => serde_json::from_slice(&body).map_err(|e| YggdrasilError::Protocol(e.to_string())),
        }
    }

    async fn query_profile(
        &self,
        id: Uuid,
        with_signature: bool,
    ) -> Result<Option<GameProfile>, YggdrasilError> {
        let url = self.provider.profile_url(id, with_signature);
        tracing::debug!(provider = self.provider.name, uuid = %id.simple(), "Querying profile");
        match self.fetch(self.http.get(&url), &url).await? {
            None => Ok(None),
            Some(body) => serde_json::from_slice(&body)
                .map(Some)
                .map_err(|e| YggdrasilError::Protocol(e.to_string())),
        }
    }
}
