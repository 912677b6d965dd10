use futures::future::BoxFuture;

use super::{host_contains, HostRequest};
use crate::{errors::Result, models::ManifestResolution, resolver::ManifestResolver};

const STREAMWISH_URL: &str = "https://streamwish.to";
const SUBSTITUTE_URL: &str = "https://yuguaab.com";
const FILELIONS_URL: &str = "https://dinisglows.com";

const HOSTS: [&str; 9] = [
    "streamwish",
    "yuguaab",
    "wishembed",
    "filelions",
    "dinisglows",
    "vidhide",
    "filemoon",
    "yesmovies",
    "playerwish",
];

pub fn matches(url: &str) -> bool {
    host_contains(url, &HOSTS)
}

pub fn extract_boxed<'a>(
    resolver: &'a ManifestResolver,
    request: &'a HostRequest,
) -> BoxFuture<'a, Result<ManifestResolution>> {
    Box::pin(extract(resolver, request))
}

/// Packed jwplayer pages: `hlsN` links or a `file` property, each pointing at a master playlist.
pub async fn extract(
    resolver: &ManifestResolver,
    request: &HostRequest,
) -> Result<ManifestResolution> {
    let embed_url = embed_url(&request.url);
    resolver.resolve_page(&embed_url, &request.headers()).await
}

fn embed_url(url: &str) -> String {
    if url.starts_with(STREAMWISH_URL) {
        return url.replace(STREAMWISH_URL, SUBSTITUTE_URL);
    }

    if host_contains(url, &["filelions"]) {
        if let Some((_, id)) = url.trim_end_matches('/').rsplit_once('/') {
            return format!("{FILELIONS_URL}/v/{id}");
        }
    }

    url.to_owned()
}
