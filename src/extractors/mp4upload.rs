use std::sync::OnceLock;

use futures::future::BoxFuture;
use regex::Regex;

use super::{host_contains, HostRequest};
use crate::{
    errors::{ExtractError, Result},
    models::{ManifestResolution, StreamVariant, DEFAULT_LABEL},
    resolver::ManifestResolver,
    utils::fetch::referer_headers,
};

pub fn matches(url: &str) -> bool {
    host_contains(url, &["mp4upload"])
}

pub fn extract_boxed<'a>(
    resolver: &'a ManifestResolver,
    request: &'a HostRequest,
) -> BoxFuture<'a, Result<ManifestResolution>> {
    Box::pin(extract(resolver, request))
}

pub async fn extract(
    resolver: &ManifestResolver,
    request: &HostRequest,
) -> Result<ManifestResolution> {
    static SRC_REGEXP: OnceLock<Regex> = OnceLock::new();

    let html = resolver.fetch_text(&request.url, &request.headers()).await?;

    let file = SRC_REGEXP
        .get_or_init(|| Regex::new(r#"src:?\s+"(?<src>.*?(mp4|m3u8))""#).unwrap())
        .captures(&html)
        .and_then(|m| Some(m.name("src")?.as_str().to_owned()))
        .ok_or_else(|| ExtractError::UnsupportedHost(request.url.clone()))?;

    let headers = referer_headers(&request.url);
    if file.ends_with("m3u8") {
        return resolver.resolve_direct_manifest(&file, &headers).await;
    }

    Ok(ManifestResolution::single_file(
        &request.url,
        StreamVariant::new(file, DEFAULT_LABEL).with_headers(&headers),
    ))
}
