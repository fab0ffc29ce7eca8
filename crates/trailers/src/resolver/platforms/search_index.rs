use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::resolver::error::ResolveError;
use crate::resolver::formats::{VideoFormatCandidate, select_best};
use crate::resolver::registry::ProviderDescriptor;
use crate::resolver::request::ProviderClient;
use crate::resolver::scene::SceneReference;

const API_KEY_HEADER: &str = "x-algolia-api-key";
const APPLICATION_ID_HEADER: &str = "x-algolia-application-id";
const AGENT_HEADER: &str = "x-algolia-agent";

#[derive(Debug, Default, Deserialize)]
struct IndexReply {
    #[serde(default)]
    hits: Option<Vec<Hit>>,
    /// Multi-index replies nest hits one level down.
    #[serde(default)]
    results: Option<Vec<IndexResult>>,
}

#[derive(Debug, Deserialize)]
struct IndexResult {
    #[serde(default)]
    hits: Option<Vec<Hit>>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(default)]
    video_formats: Option<Vec<RawFormat>>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    trailer_url: Option<String>,
}

impl IndexReply {
    fn flat_hit(&self) -> Option<&Hit> {
        self.hits.as_deref()?.first()
    }

    fn nested_hit(&self) -> Option<&Hit> {
        self.results.as_deref()?.first()?.hits.as_deref()?.first()
    }

    fn first_hit(&self) -> Option<&Hit> {
        self.flat_hit().or_else(|| self.nested_hit())
    }
}

/// Resolves trailers through a shared multi-tenant search index.
#[derive(Debug, Clone)]
pub struct SearchIndexResolver {
    client: Client,
}

impl SearchIndexResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Query string selecting exactly one hit for `clip_id:<scene_id>`.
    pub fn build_query(scene_id: &str) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("clickAnalytics", "true")
            .append_pair("facetFilters", &format!(r#"[["clip_id:{scene_id}"]]"#))
            .append_pair("facets", "[]")
            .append_pair("hitsPerPage", "1")
            .append_pair("tagFilters", "")
            .finish()
    }

    #[instrument(skip(self, credential, provider), fields(domain = %provider.domain))]
    pub async fn resolve(
        &self,
        url: &str,
        credential: &str,
        provider: &ProviderDescriptor,
    ) -> Result<String, ResolveError> {
        let scene = SceneReference::parse(url)?;
        debug!(scene_id = %scene.numeric_id, "Querying search index");

        let mut request = ProviderClient::new(&provider.domain, self.client.clone());
        request.set_origin_and_referer(&provider.site_host());
        request.add_header_str(API_KEY_HEADER, credential);
        request.add_header_str(APPLICATION_ID_HEADER, provider.application_id().unwrap_or_default());
        request.add_header_str(AGENT_HEADER, provider.client_agent());

        let body = serde_json::json!({ "params": Self::build_query(&scene.numeric_id) });
        let bytes = request
            .post(&provider.index_url())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        Self::trailer_from_body(&bytes)
    }

    /// Pick the highest-resolution trailer from a raw index reply.
    pub fn trailer_from_body(body: &[u8]) -> Result<String, ResolveError> {
        let reply: IndexReply = serde_json::from_slice(body)?;
        let hit = reply.first_hit().ok_or(ResolveError::NoHits)?;

        let candidates: Vec<VideoFormatCandidate> = hit
            .video_formats
            .iter()
            .flatten()
            .map(|f| {
                VideoFormatCandidate::new(
                    f.format.as_deref().unwrap_or_default(),
                    f.trailer_url.as_deref(),
                )
            })
            .collect();

        let best = select_best(&candidates).ok_or(ResolveError::NoFormats)?;
        debug!(quality = %best.quality_label, "Selected video format");
        best.video_url.clone().ok_or(ResolveError::NoUrl)
    }
}
