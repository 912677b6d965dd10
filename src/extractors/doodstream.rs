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

const DOOD_URL: &str = "https://dood.re";
const RND_STRING: &str = "d96ZdcNq9N";

const HOSTS: [&str; 5] = ["dood", "ds2play", "ds2video", "d0000d", "d000d"];

pub fn matches(url: &str) -> bool {
    host_contains(url, &HOSTS)
}

pub fn extract_boxed<'a>(
    resolver: &'a ManifestResolver,
    request: &'a HostRequest,
) -> BoxFuture<'a, Result<ManifestResolution>> {
    Box::pin(extract(resolver, request))
}

/// Two hops: the embed page names a `/pass_md5/` path, which answers with
/// the start of the media url.
pub async fn extract(
    resolver: &ManifestResolver,
    request: &HostRequest,
) -> Result<ManifestResolution> {
    let id = request
        .url
        .trim_end_matches('/')
        .rsplit_once('/')
        .map(|(_, id)| id)
        .ok_or_else(|| ExtractError::UnsupportedHost(request.url.clone()))?;

    let iframe_url = format!("{DOOD_URL}/e/{id}");
    let iframe = resolver.fetch_text(&iframe_url, &request.headers()).await?;

    let md5_pass = find_md5_pass(&iframe)
        .ok_or_else(|| ExtractError::UnsupportedHost(iframe_url.clone()))?;
    let token = md5_pass.rsplit('/').next().unwrap_or(md5_pass);

    let headers = referer_headers(&iframe_url);
    let media_link_part = resolver
        .fetch_text(&format!("{DOOD_URL}/pass_md5/{md5_pass}"), &headers)
        .await?;

    let expiry = chrono::Utc::now().timestamp_millis();
    let media_link = format!(
        "{}{RND_STRING}?token={token}&expiry={expiry}",
        media_link_part.trim()
    );

    Ok(ManifestResolution::single_file(
        &iframe_url,
        StreamVariant::new(media_link, DEFAULT_LABEL).with_headers(&headers),
    ))
}

fn find_md5_pass(iframe: &str) -> Option<&str> {
    static MD5_PASS_RE: OnceLock<Regex> = OnceLock::new();
    MD5_PASS_RE
        .get_or_init(|| Regex::new(r"/pass_md5/(?<pass>[^'\x22]*)").unwrap())
        .captures(iframe)
        .and_then(|caps| Some(caps.name("pass")?.as_str()))
}
