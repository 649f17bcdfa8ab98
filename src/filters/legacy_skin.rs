//! `skins.minecraft.net/MinecraftSkins/<name>.png` for old clients.
//!
//! The legacy endpoint served skins by player name. The skin is found
//! through the custom provider (name → UUID → `textures` property) and
//! downloaded from wherever the textures payload points.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use http::{Method, StatusCode};
use serde::Deserialize;

use crate::filters::{Filter, FilterError};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::routing::matcher::{Matcher, SegmentRoute};
use crate::yggdrasil::{GameProfile, ProfileLookup, YggdrasilError};

const ROUTE: SegmentRoute = SegmentRoute::new("skins.minecraft.net", "/MinecraftSkins/", ".png");

#[derive(Deserialize)]
struct TexturesPayload {
    #[serde(default)]
    textures: Textures,
}

#[derive(Deserialize, Default)]
struct Textures {
    #[serde(rename = "SKIN")]
    skin: Option<Texture>,
}

#[derive(Deserialize)]
struct Texture {
    url: String,
}

pub struct LegacySkinFilter {
    lookup: Arc<dyn ProfileLookup>,
    http: reqwest::Client,
}

/// Skin URL from a profile's `textures` property, if any.
pub fn skin_url(profile: &GameProfile) -> Option<String> {
    let property = profile.properties.get("textures")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(property.value.trim())
        .ok()?;
    let payload: TexturesPayload = serde_json::from_slice(&decoded).ok()?;
    payload.textures.skin.map(|t| t.url)
}

impl LegacySkinFilter {
    pub fn new(lookup: Arc<dyn ProfileLookup>, http: reqwest::Client) -> Self {
        Self { lookup, http }
    }

    async fn find_skin_url(&self, name: &str) -> Result<Option<String>, YggdrasilError> {
        let found = self.lookup.query_uuids(&[name.to_string()]).await?;
        let Some(entry) = found.into_iter().find(|r| r.name.eq_ignore_ascii_case(name)) else {
            return Ok(None);
        };
        let Some(profile) = self.lookup.query_profile(entry.id, false).await? else {
            return Ok(None);
        };
        Ok(skin_url(&profile))
    }

    async fn download(&self, url: &str) -> Result<Option<bytes::Bytes>, YggdrasilError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(YggdrasilError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(Some(response.bytes().await?))
    }
}

#[async_trait]
impl Filter for LegacySkinFilter {
    fn name(&self) -> &'static str {
        "legacy_skin"
    }

    fn matches(&self, domain: &str, path: &str) -> bool {
        ROUTE.matches(domain, path)
    }

    async fn handle(
        &self,
        _domain: &str,
        path: &str,
        request: &mut Request<'_>,
    ) -> Result<Option<Response>, FilterError> {
        if *request.method() != Method::GET {
            return Ok(None);
        }
        let Some(name) = ROUTE.capture(path) else {
            return Ok(None);
        };

        let Some(url) = self.find_skin_url(name).await? else {
            tracing::debug!(name, "No skin for legacy request");
            return Ok(Some(Response::new(StatusCode::NOT_FOUND)));
        };
        match self.download(&url).await? {
            Some(image) => Ok(Some(Response::fixed(StatusCode::OK, Some("image/png"), image))),
            None => Ok(Some(Response::new(StatusCode::NOT_FOUND))),
        }
    }
}
