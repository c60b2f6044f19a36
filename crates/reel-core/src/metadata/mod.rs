//! Title metadata lookups.
//!
//! [`MetadataSource`] abstracts the external catalogue; [`TmdbSource`] talks
//! to a TMDB-style HTTP API and [`CachedMetadata`] puts any source behind the
//! read-through cache so browsing keeps working offline.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheBackend, CacheRead, ReadThroughCache};
use crate::config::ClientConfig;
use crate::models::{is_region_code, ItemKey, MediaKind};
use crate::util::{failure_message, http_base_url, normalize_text_option};
use crate::{Error, Result};

/// Default catalogue endpoint
pub const DEFAULT_METADATA_BASE_URL: &str = "https://api.themoviedb.org/3";

/// A catalogue entry as listed by the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleSummary {
    pub id: u64,
    pub media_type: MediaKind,
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
}

impl TitleSummary {
    #[must_use]
    pub const fn key(&self) -> ItemKey {
        ItemKey::new(self.id, self.media_type)
    }
}

/// How a provider offers a title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferKind {
    Flatrate,
    Rent,
    Buy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchProvider {
    pub id: u32,
    pub name: String,
    pub offer: OfferKind,
}

/// Where a title can be watched in one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub key: ItemKey,
    pub region: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub providers: Vec<WatchProvider>,
}

/// External title catalogue
pub trait MetadataSource: Send + Sync {
    /// Popular titles of `kind` in `region`
    fn popular(
        &self,
        kind: MediaKind,
        region: &str,
    ) -> impl Future<Output = Result<Vec<TitleSummary>>> + Send;

    /// Watch availability of `key` in `region`
    fn availability(
        &self,
        key: ItemKey,
        region: &str,
    ) -> impl Future<Output = Result<Availability>> + Send;
}

fn normalize_region(region: &str) -> Result<String> {
    let region = region.trim();
    if is_region_code(region) {
        Ok(region.to_ascii_uppercase())
    } else {
        Err(Error::InvalidInput(format!(
            "'{region}' is not a two-letter region code"
        )))
    }
}

/// TMDB-compatible HTTP source
#[derive(Debug, Clone)]
pub struct TmdbSource {
    base_url: String,
    api_key: String,
    client: Client,
}

impl TmdbSource {
    pub fn new(base_url: impl AsRef<str>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = http_base_url(base_url.as_ref()).ok_or_else(|| {
            Error::InvalidInput("metadata base URL must include http:// or https://".to_string())
        })?;
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(Error::InvalidInput(
                "metadata API key must not be empty".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::Metadata(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }

    /// Build a source from client configuration; `None` without an API key
    pub fn from_config(config: &ClientConfig) -> Result<Option<Self>> {
        let Some(api_key) = normalize_text_option(config.metadata_api_key.clone()) else {
            return Ok(None);
        };
        let base_url = normalize_text_option(config.metadata_base_url.clone())
            .unwrap_or_else(|| DEFAULT_METADATA_BASE_URL.to_string());
        Self::new(base_url, api_key, config.sync.request_timeout()).map(Some)
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|error| Error::Metadata(format!("request failed: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| Error::Metadata(format!("failed to read response body: {error}")))?;
        if !status.is_success() {
            return Err(Error::Metadata(describe_failure(status, &body)));
        }
        Ok(body)
    }
}

impl MetadataSource for TmdbSource {
    async fn popular(&self, kind: MediaKind, region: &str) -> Result<Vec<TitleSummary>> {
        let region = normalize_region(region)?;
        let body = self
            .get_json(&format!("/{kind}/popular"), &[("region", region.as_str())])
            .await?;
        parse_popular(kind, &body)
    }

    async fn availability(&self, key: ItemKey, region: &str) -> Result<Availability> {
        let region = normalize_region(region)?;
        let body = self
            .get_json(
                &format!("/{}/{}/watch/providers", key.media_type, key.id),
                &[],
            )
            .await?;
        parse_availability(key, &region, &body)
    }
}

#[derive(Debug, Deserialize)]
struct PopularResponse {
    #[serde(default)]
    results: Vec<PopularResult>,
}

#[derive(Debug, Deserialize)]
struct PopularResult {
    id: u64,
    title: Option<String>,
    name: Option<String>,
    poster_path: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
}

fn parse_popular(kind: MediaKind, body: &str) -> Result<Vec<TitleSummary>> {
    let response: PopularResponse = serde_json::from_str(body)
        .map_err(|error| Error::Metadata(format!("invalid popular response: {error}")))?;

    Ok(response
        .results
        .into_iter()
        .filter_map(|result| {
            let title = normalize_text_option(result.title.or(result.name))?;
            Some(TitleSummary {
                id: result.id,
                media_type: kind,
                title,
                poster_path: normalize_text_option(result.poster_path),
                release_date: normalize_text_option(result.release_date.or(result.first_air_date)),
            })
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct ProvidersResponse {
    #[serde(default)]
    results: std::collections::HashMap<String, RegionProviders>,
}

#[derive(Debug, Default, Deserialize)]
struct RegionProviders {
    link: Option<String>,
    #[serde(default)]
    flatrate: Vec<ProviderResult>,
    #[serde(default)]
    rent: Vec<ProviderResult>,
    #[serde(default)]
    buy: Vec<ProviderResult>,
}

#[derive(Debug, Deserialize)]
struct ProviderResult {
    provider_id: u32,
    provider_name: String,
}

fn parse_availability(key: ItemKey, region: &str, body: &str) -> Result<Availability> {
    let mut response: ProvidersResponse = serde_json::from_str(body)
        .map_err(|error| Error::Metadata(format!("invalid providers response: {error}")))?;
    let regional = response.results.remove(region).unwrap_or_default();

    let offers = [
        (OfferKind::Flatrate, regional.flatrate),
        (OfferKind::Rent, regional.rent),
        (OfferKind::Buy, regional.buy),
    ];
    let providers = offers
        .into_iter()
        .flat_map(|(offer, providers)| {
            providers.into_iter().map(move |provider| WatchProvider {
                id: provider.provider_id,
                name: provider.provider_name,
                offer,
            })
        })
        .collect();

    Ok(Availability {
        key,
        region: region.to_string(),
        link: normalize_text_option(regional.link),
        providers,
    })
}

#[derive(Debug, Deserialize)]
struct TmdbErrorResponse {
    status_message: Option<String>,
}

fn describe_failure(status: StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<TmdbErrorResponse>(body)
        .ok()
        .and_then(|payload| payload.status_message);
    failure_message(status.as_u16(), message, body)
}

/// A [`MetadataSource`] behind the read-through cache
#[derive(Debug, Clone)]
pub struct CachedMetadata<S, B> {
    source: S,
    cache: ReadThroughCache<B>,
    popular_ttl: Duration,
    availability_ttl: Duration,
}

impl<S: MetadataSource, B: CacheBackend> CachedMetadata<S, B> {
    pub const fn new(
        source: S,
        cache: ReadThroughCache<B>,
        popular_ttl: Duration,
        availability_ttl: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            popular_ttl,
            availability_ttl,
        }
    }

    pub async fn popular(&self, kind: MediaKind, region: &str) -> Result<CacheRead<Vec<TitleSummary>>> {
        let region = normalize_region(region)?;
        let key = format!("popular:{kind}:{region}");
        self.cache
            .read_through(&key, self.popular_ttl, || self.source.popular(kind, &region))
            .await
    }

    pub async fn availability(&self, item: ItemKey, region: &str) -> Result<CacheRead<Availability>> {
        let region = normalize_region(region)?;
        let key = format!("availability:{}:{}:{region}", item.media_type, item.id);
        self.cache
            .read_through(&key, self.availability_ttl, || {
                self.source.availability(item, &region)
            })
            .await
    }
}
