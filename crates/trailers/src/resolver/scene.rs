use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::error::ResolveError;

static DIGIT_RUN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").unwrap());

/// A scene page URL together with the numeric id embedded in its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneReference {
    /// Registry form of the host, see [`normalize_host`].
    pub domain: String,
    pub numeric_id: String,
}

impl SceneReference {
    pub fn parse(raw_url: &str) -> Result<Self, ResolveError> {
        let url = Url::parse(raw_url).map_err(|_| ResolveError::IdNotFound(raw_url.to_owned()))?;
        let domain = url.host_str().map(normalize_host).unwrap_or_default();
        let numeric_id = extract_scene_id(url.path())
            .ok_or_else(|| ResolveError::IdNotFound(raw_url.to_owned()))?;

        Ok(Self {
            domain,
            numeric_id: numeric_id.to_owned(),
        })
    }

    /// The provider key of this scene's host, see [`provider_key`].
    pub fn provider_key(&self) -> Option<&str> {
        provider_key(&self.domain)
    }
}

/// The last maximal run of ASCII digits in a URL path.
pub fn extract_scene_id(path: &str) -> Option<&str> {
    DIGIT_RUN_REGEX.find_iter(path).last().map(|m| m.as_str())
}

/// Lowercase a host and strip a leading `www.`.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_owned(),
        None => host,
    }
}

/// The registry domain for a URL, or `None` if it has no host.
pub fn domain_of(raw_url: &str) -> Option<String> {
    let url = Url::parse(raw_url).ok()?;
    url.host_str().map(normalize_host).filter(|h| !h.is_empty())
}

/// The label immediately preceding the top-level domain,
/// e.g. `"example"` for `"www.example.com"`.
pub fn provider_key(host: &str) -> Option<&str> {
    let mut labels = host.rsplit('.').filter(|l| !l.is_empty());
    let _tld = labels.next()?;
    labels.next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_last_digit_run_in_path() {
        assert_eq!(extract_scene_id("/en/video/some-title/12345/"), Some("12345"));
        assert_eq!(extract_scene_id("/en/video/12345"), Some("12345"));
        assert_eq!(extract_scene_id("/scene/2024-release/987"), Some("987"));
        assert_eq!(extract_scene_id("/en/video/title"), None);
    }

    #[test]
    fn query_digits_are_ignored() {
        let scene = SceneReference::parse("https://www.example.com/video/title?page=7");
        assert!(matches!(scene, Err(ResolveError::IdNotFound(_))));
    }

    #[test]
    fn parses_scene_reference() {
        let scene = SceneReference::parse("https://WWW.Example.com/en/video/title/12345/").unwrap();
        assert_eq!(scene.domain, "example.com");
        assert_eq!(scene.numeric_id, "12345");
        assert_eq!(scene.provider_key(), Some("example"));
    }

    #[test]
    fn unparseable_url_has_no_id() {
        assert!(matches!(
            SceneReference::parse("not a url"),
            Err(ResolveError::IdNotFound(_))
        ));
    }

    #[test]
    fn derives_domain_and_provider_key() {
        assert_eq!(
            domain_of("https://www.example.com/x/1").as_deref(),
            Some("example.com")
        );
        assert_eq!(domain_of("https://sub.example.com").as_deref(), Some("sub.example.com"));
        assert_eq!(domain_of("mailto:someone"), None);
        assert_eq!(provider_key("site-api.example.com"), Some("example"));
        assert_eq!(provider_key("localhost"), None);
    }
}
