use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::resolver::error::ResolveError;
use crate::resolver::formats::{VideoFormatCandidate, select_best};
use crate::resolver::registry::ProviderDescriptor;
use crate::resolver::request::ProviderClient;
use crate::resolver::scene::SceneReference;
use crate::resolver::utils::non_empty;

/// Resolves trailers from a provider's own per-scene release resource.
///
/// Release payloads come in several historical shapes. They are tried in a
/// fixed order and the first non-empty URL wins:
///
/// 1. `trailerUrl` on the release
/// 2. `downloadUrls.trailer`
/// 3. the highest resolution across *all* `videos` categories
#[derive(Debug, Clone)]
pub struct ResourceFetchResolver {
    client: Client,
}

impl ResourceFetchResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn release_url(provider: &ProviderDescriptor, scene_id: &str) -> String {
        format!("{}/v2/releases/{scene_id}", provider.api_base())
    }

    #[instrument(skip(self, credential, provider), fields(domain = %provider.domain))]
    pub async fn resolve(
        &self,
        url: &str,
        credential: &str,
        provider: &ProviderDescriptor,
    ) -> Result<String, ResolveError> {
        let scene = SceneReference::parse(url)?;
        let api_url = Self::release_url(provider, &scene.numeric_id);
        debug!(
            provider = scene.provider_key().unwrap_or_default(),
            scene_id = %scene.numeric_id,
            %api_url,
            "Fetching release"
        );

        let mut request = ProviderClient::new(&provider.domain, self.client.clone());
        request.set_origin_and_referer(&provider.site_host());
        request.add_header_str(provider.token_header(), credential);

        let bytes = request
            .get(&api_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let root: Value = serde_json::from_slice(&bytes)?;

        Self::trailer_from_release(&root)
    }

    /// Apply the fallback chain to a decoded release payload.
    pub fn trailer_from_release(root: &Value) -> Result<String, ResolveError> {
        if !root.is_object() {
            return Err(ResolveError::MalformedResponse(
                "release payload is not an object".to_string(),
            ));
        }
        let release = root.get("result").filter(|v| v.is_object()).unwrap_or(root);

        direct_trailer(release)
            .or_else(|| download_trailer(release))
            .or_else(|| best_video(release))
            .ok_or(ResolveError::NoTrailerFound)
    }
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str).and_then(non_empty)
}

fn direct_trailer(release: &Value) -> Option<String> {
    str_at(release, "/trailerUrl").map(ToOwned::to_owned)
}

fn download_trailer(release: &Value) -> Option<String> {
    str_at(release, "/downloadUrls/trailer").map(ToOwned::to_owned)
}

/// Collect candidates from every category before choosing, so a 1080p file in
/// a later category beats a 720p file in an earlier one.
fn best_video(release: &Value) -> Option<String> {
    let categories = release.get("videos")?.as_object()?;

    let candidates: Vec<VideoFormatCandidate> = categories
        .values()
        .filter_map(|category| category.get("files").unwrap_or(category).as_object())
        .flat_map(|files| files.iter())
        .filter_map(|(label, file)| video_candidate(label, file))
        .collect();

    debug!(candidates = candidates.len(), "Collected release video files");
    select_best(&candidates).and_then(|best| best.video_url.clone())
}

/// A file entry is either a bare URL or a descriptor with `format` and
/// `urls.view`.
fn video_candidate(label: &str, file: &Value) -> Option<VideoFormatCandidate> {
    match file {
        Value::String(url) => non_empty(url).map(|url| VideoFormatCandidate::new(label, Some(url))),
        Value::Object(_) => {
            let url = str_at(file, "/urls/view")?;
            let label = file.get("format").and_then(Value::as_str).unwrap_or(label);
            Some(VideoFormatCandidate::new(label, Some(url)))
        }
        _ => None,
    }
}
