pub mod doodstream;
pub mod gogostream;
pub mod mixdrop;
pub mod mp4upload;
pub mod primevid;
pub mod streamwish;

use futures::future::BoxFuture;
use log::warn;

use crate::{
    errors::{ExtractError, Result},
    models::ManifestResolution,
    resolver::{soften, ManifestResolver},
    utils::fetch::{referer_headers, Headers},
};

pub type BoxExtractor = for<'a> fn(
    &'a ManifestResolver,
    &'a HostRequest,
) -> BoxFuture<'a, Result<ManifestResolution>>;

pub type HostMatcher = fn(&str) -> bool;

const BUILTIN: [(&str, HostMatcher, BoxExtractor); 6] = [
    ("streamwish", streamwish::matches, streamwish::extract_boxed),
    ("mixdrop", mixdrop::matches, mixdrop::extract_boxed),
    ("doodstream", doodstream::matches, doodstream::extract_boxed),
    ("mp4upload", mp4upload::matches, mp4upload::extract_boxed),
    ("gogostream", gogostream::matches, gogostream::extract_boxed),
    ("primevid", primevid::matches, primevid::extract_boxed),
];

const PAGE_FALLBACK: &str = "page";

/// One embed link an adapter found on a site page.
#[derive(Debug, Clone, Default)]
pub struct HostRequest {
    pub url: String,
    /// Page the embed was found on; some hosts refuse requests without it.
    pub referer: Option<String>,
    /// Server name put in front of every variant label.
    pub prefix: Option<String>,
}

impl HostRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn headers(&self) -> Headers {
        self.referer
            .as_deref()
            .map(referer_headers)
            .unwrap_or_default()
    }
}

/// Ordered host table; the first entry whose matcher accepts the url wins.
pub struct ExtractorRegistry {
    entries: Vec<(&'static str, HostMatcher, BoxExtractor)>,
    page_fallback: bool,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ExtractorRegistry {
    /// A registry without any host.
    pub fn empty() -> Self {
        Self {
            entries: vec![],
            page_fallback: false,
        }
    }

    /// Reference hosts, then any http page through [`ManifestResolver::resolve_page`].
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN.to_vec(),
            page_fallback: true,
        }
    }

    /// Appends a host. Built-in entries keep precedence.
    pub fn register(
        mut self,
        name: &'static str,
        matches: HostMatcher,
        extract: BoxExtractor,
    ) -> Self {
        self.entries.push((name, matches, extract));
        self
    }

    pub fn without_page_fallback(mut self) -> Self {
        self.page_fallback = false;
        self
    }

    /// Name of the entry that would handle `url`.
    pub fn find(&self, url: &str) -> Option<&'static str> {
        self.find_entry(url).map(|(name, _)| name)
    }

    fn find_entry(&self, url: &str) -> Option<(&'static str, BoxExtractor)> {
        self.entries
            .iter()
            .find(|(_, matches, _)| matches(url))
            .map(|(name, _, extract)| (*name, *extract))
            .or_else(|| {
                (self.page_fallback && is_http_url(url))
                    .then_some((PAGE_FALLBACK, resolve_page_boxed as BoxExtractor))
            })
    }

    /// Resolves one embed link. Unknown hosts and soft failures give an
    /// empty resolution; fetch and decrypt failures propagate.
    pub async fn resolve(
        &self,
        resolver: &ManifestResolver,
        request: &HostRequest,
    ) -> Result<ManifestResolution> {
        let (name, extract) = match self.find_entry(&request.url) {
            Some(entry) => entry,
            None => {
                return soften(
                    &request.url,
                    Err(ExtractError::UnsupportedHost(request.url.clone())),
                )
            }
        };

        let resolution = soften(&request.url, extract(resolver, request).await)?;
        if resolution.is_empty() {
            warn!("[{name}] nothing found for {}", request.url);
        }

        Ok(match &request.prefix {
            Some(prefix) => resolution.with_label_prefix(prefix),
            None => resolution,
        })
    }

    /// Resolves all links concurrently. A failing mirror is logged and
    /// skipped; empty resolutions are dropped. Output follows input order.
    pub async fn resolve_all(
        &self,
        resolver: &ManifestResolver,
        requests: &[HostRequest],
    ) -> Vec<ManifestResolution> {
        let resolutions_itr = requests.iter().map(|request| async move {
            match self.resolve(resolver, request).await {
                Ok(resolution) => Some(resolution),
                Err(err) => {
                    warn!("[extractors] {} failed: {err}", request.url);
                    None
                }
            }
        });

        futures::future::join_all(resolutions_itr)
            .await
            .into_iter()
            .flatten()
            .filter(|resolution| !resolution.is_empty())
            .collect()
    }
}

fn resolve_page_boxed<'a>(
    resolver: &'a ManifestResolver,
    request: &'a HostRequest,
) -> BoxFuture<'a, Result<ManifestResolution>> {
    Box::pin(async move { resolver.resolve_page(&request.url, &request.headers()).await })
}

fn is_http_url(url: &str) -> bool {
    url::Url::parse(url).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// Host part of `url`, lower-cased.
pub(crate) fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()?
        .host_str()
        .map(str::to_lowercase)
}

/// True when the host of `url` contains one of `names`.
pub(crate) fn host_contains(url: &str, names: &[&str]) -> bool {
    host_of(url).is_some_and(|host| names.iter().any(|name| host.contains(name)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{models::StreamVariant, utils::fetch::testing::StaticFetcher};

    fn custom_boxed<'a>(
        _resolver: &'a ManifestResolver,
        request: &'a HostRequest,
    ) -> BoxFuture<'a, Result<ManifestResolution>> {
        Box::pin(async move {
            Ok(ManifestResolution::single_file(
                &request.url,
                StreamVariant::new(&request.url, "720p"),
            ))
        })
    }

    fn failing_boxed<'a>(
        _resolver: &'a ManifestResolver,
        request: &'a HostRequest,
    ) -> BoxFuture<'a, Result<ManifestResolution>> {
        Box::pin(async move { Err(ExtractError::fetch(&request.url, Some(502), "bad gateway")) })
    }

    #[test]
    fn should_dispatch_first_match() {
        let registry = ExtractorRegistry::builtin();

        assert_eq!(registry.find("https://streamwish.to/e/1mranuy7w6r2"), Some("streamwish"));
        assert_eq!(registry.find("https://filelions.to/v/p7n08t2i7jee"), Some("streamwish"));
        assert_eq!(registry.find("https://mixdrop.ps/f/364x6xlmtdp1p7"), Some("mixdrop"));
        assert_eq!(registry.find("https://dood.wf/e/c37gfflwk73i"), Some("doodstream"));
        assert_eq!(
            registry.find("https://www.mp4upload.com/embed-h5x14yaphmdk.html"),
            Some("mp4upload")
        );
        assert_eq!(
            registry.find("https://s3embtaku.pro/embedplus?id=MTIzOTc3"),
            Some("gogostream")
        );
        assert_eq!(registry.find("https://primevid.click/?api=all#esi1k"), Some("primevid"));
        assert_eq!(registry.find("https://unknown.example/e/1"), Some(PAGE_FALLBACK));
        assert_eq!(registry.find("magnet:?xt=urn:btih:abc"), None);
    }

    #[test]
    fn should_keep_builtin_precedence_over_registered() {
        let registry = ExtractorRegistry::builtin().register(
            "custom",
            |url| url.contains("mixdrop") || url.contains("custom"),
            custom_boxed,
        );

        assert_eq!(registry.find("https://mixdrop.ps/e/1"), Some("mixdrop"));
        assert_eq!(registry.find("https://custom.example/e/1"), Some("custom"));
    }

    #[test_log::test(tokio::test)]
    async fn should_resolve_unknown_host_to_nothing() {
        let resolver = ManifestResolver::new(Arc::new(StaticFetcher::new()));
        let registry = ExtractorRegistry::empty();

        let res = registry
            .resolve(&resolver, &HostRequest::new("https://unknown.example/e/1"))
            .await
            .unwrap();

        assert!(res.is_empty());
        assert_eq!(res.source_url, "https://unknown.example/e/1");
    }

    #[test_log::test(tokio::test)]
    async fn should_prefix_labels() {
        let resolver = ManifestResolver::new(Arc::new(StaticFetcher::new()));
        let registry = ExtractorRegistry::empty().register("custom", |_| true, custom_boxed);

        let res = registry
            .resolve(
                &resolver,
                &HostRequest::new("https://custom.example/e/1").with_prefix("Custom"),
            )
            .await
            .unwrap();

        assert_eq!(res.variants[0].label, "Custom - 720p");
    }

    #[test_log::test(tokio::test)]
    async fn should_skip_failing_mirrors() {
        let fetcher = StaticFetcher::new().with(
            "https://page.example/e/1",
            r#"<video src="https://cdn.page.example/v/1.mp4"></video>"#,
        );
        let resolver = ManifestResolver::new(Arc::new(fetcher));
        let registry = ExtractorRegistry::builtin()
            .register("broken", |url| url.contains("broken.example"), failing_boxed);

        let requests = [
            HostRequest::new("https://broken.example/e/1"),
            HostRequest::new("https://page.example/e/1").with_referer("https://site.example/"),
            HostRequest::new("https://empty.example/e/1"),
        ];
        let resolutions = registry.resolve_all(&resolver, &requests).await;

        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].variants[0].url, "https://cdn.page.example/v/1.mp4");
        assert_eq!(
            resolutions[0].variants[0].required_headers["Referer"],
            "https://site.example/"
        );
    }

    #[test]
    fn should_match_hosts() {
        assert!(host_contains("https://dood.wf/e/1", &["dood"]));
        assert!(!host_contains("https://example.com/dood/1", &["dood"]));
        assert!(!host_contains("not a url", &["dood"]));
    }
}
