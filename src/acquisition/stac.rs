//! STAC item search.
//!
//! Serde models for the subset of STAC API Item Search responses needed to locate assets,
//! and a small async client that follows `next` links across result pages.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::acquisition::args::DownloadArgs;
use crate::error::RasterAnalysisError;

/// Body for `POST /search`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SearchRequest {
    /// Single date or `start/end` range
    pub datetime: String,

    /// Maximum number of items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    /// GeoJSON geometry the items must intersect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intersects: Option<Value>,

    /// Property filters
    pub query: Map<String, Value>,
}

impl SearchRequest {
    /// Build a search request from the tool's arguments.
    ///
    /// Reads the `--intersects` GeoJSON file, if given.
    pub fn from_args(args: &DownloadArgs) -> Result<Self, RasterAnalysisError> {
        let intersects = args.intersects.as_deref().map(read_json).transpose()?;
        let request = Self {
            datetime: args.date_range(),
            limit: args.limit,
            intersects,
            query: query_parameters(args.cloud_cover, args.query.as_deref())?,
        };
        debug!("Search parameters: {:?}", request);
        Ok(request)
    }
}

/// Build the query filters: items below `cloud_cover` percent, overlaid with `query`.
///
/// Keys in `query` replace the cloud cover filter when they clash.
pub fn query_parameters(
    cloud_cover: i64,
    query: Option<&str>,
) -> Result<Map<String, Value>, RasterAnalysisError> {
    let mut parameters = Map::new();
    parameters.insert(
        "eo:cloud_cover".to_string(),
        serde_json::json!({ "lt": cloud_cover }),
    );
    if let Some(query) = query {
        let user_query: Map<String, Value> =
            serde_json::from_str(query).map_err(|source| RasterAnalysisError::InvalidJson {
                context: "query".to_string(),
                source,
            })?;
        parameters.extend(user_query);
    }
    Ok(parameters)
}

/// Read a JSON document from a file.
fn read_json(path: &str) -> Result<Value, RasterAnalysisError> {
    let data = std::fs::read_to_string(path).map_err(|source| RasterAnalysisError::Io {
        path: PathBuf::from(path),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| RasterAnalysisError::InvalidJson {
        context: path.to_string(),
        source,
    })
}

/// A page of search results (GeoJSON FeatureCollection).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StacItemCollection {
    #[serde(default)]
    pub features: Vec<StacItem>,

    #[serde(default)]
    pub links: Vec<StacLink>,
}

impl StacItemCollection {
    /// Find the `"next"` pagination link, if any.
    pub fn next_link(&self) -> Option<&StacLink> {
        self.links.iter().find(|link| link.rel == "next")
    }
}

/// A single STAC Item (GeoJSON Feature).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StacItem {
    /// Unique item identifier.
    pub id: String,

    /// Collection this item belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    #[serde(default)]
    pub properties: StacItemProperties,

    #[serde(default)]
    pub assets: BTreeMap<String, StacAsset>,
}

impl StacItem {
    /// Date part (`YYYY-MM-DD`) of the item's acquisition datetime.
    pub fn date(&self) -> Option<&str> {
        self.properties.datetime.as_deref().and_then(|dt| dt.get(..10))
    }
}

/// STAC Item properties.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StacItemProperties {
    /// ISO 8601 datetime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// A single STAC Asset (file reference).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StacAsset {
    /// URL to the asset file.
    pub href: String,

    /// Media type.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

/// A STAC Link. Only `next` links are followed.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StacLink {
    pub rel: String,

    pub href: String,

    /// HTTP method, `GET` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Request body for `POST` links.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Whether `body` is merged over the previous request body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<bool>,
}

impl StacLink {
    fn is_post(&self) -> bool {
        self.method
            .as_deref()
            .is_some_and(|method| method.eq_ignore_ascii_case("POST"))
    }
}

/// Request body to send when following a `POST` next link.
fn next_body(link: &StacLink, previous: &Value) -> Value {
    match (&link.body, link.merge.unwrap_or(false)) {
        (Some(body), true) => {
            let mut merged = previous.clone();
            if let (Some(merged), Some(body)) = (merged.as_object_mut(), body.as_object()) {
                merged.extend(body.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            merged
        }
        (Some(body), false) => body.clone(),
        (None, _) => previous.clone(),
    }
}

/// The item search endpoint below a STAC API root.
pub fn search_url(root: &Url) -> Url {
    let mut url = root.clone();
    let path = root.path().trim_end_matches('/');
    if !path.ends_with("/search") {
        url.set_path(&format!("{}/search", path));
    }
    url
}

/// Async client for STAC Item Search.
#[derive(Clone, Debug)]
pub struct StacClient {
    search_url: Url,
    client: reqwest::Client,
}

impl StacClient {
    /// Return a new StacClient for the API rooted at `root`.
    pub fn new(root: &Url, client: reqwest::Client) -> Self {
        Self {
            search_url: search_url(root),
            client,
        }
    }

    /// Search endpoint used by this client.
    pub fn url(&self) -> &Url {
        &self.search_url
    }

    /// Run a search, following `next` links until the results are exhausted or the request
    /// limit is reached.
    pub async fn search(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<StacItem>, RasterAnalysisError> {
        let max_items = request.limit.map(|limit| limit as usize);
        let mut body =
            serde_json::to_value(request).map_err(|source| RasterAnalysisError::InvalidJson {
                context: "search request".to_string(),
                source,
            })?;
        let mut url = self.search_url.clone();
        let mut page = self.fetch(self.client.post(url.clone()).json(&body), &url).await?;
        let mut items = Vec::new();
        loop {
            let next = page.next_link().cloned();
            items.extend(page.features);
            debug!("Fetched {} items", items.len());
            if max_items.is_some_and(|max| items.len() >= max) {
                break;
            }
            let Some(link) = next else { break };
            // Links may be relative to the page they were found on.
            url = url
                .join(&link.href)
                .map_err(|source| RasterAnalysisError::InvalidUrl {
                    url: link.href.clone(),
                    source,
                })?;
            page = if link.is_post() {
                body = next_body(&link, &body);
                self.fetch(self.client.post(url.clone()).json(&body), &url)
                    .await?
            } else {
                self.fetch(self.client.get(url.clone()), &url).await?
            };
            if page.features.is_empty() {
                break;
            }
        }
        if let Some(max) = max_items {
            items.truncate(max);
        }
        Ok(items)
    }

    async fn fetch(
        &self,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<StacItemCollection, RasterAnalysisError> {
        let http_error = |source| RasterAnalysisError::Http {
            url: url.to_string(),
            source,
        };
        request
            .send()
            .await
            .map_err(http_error)?
            .error_for_status()
            .map_err(http_error)?
            .json()
            .await
            .map_err(http_error)
    }
}
