use std::{collections::HashMap, sync::OnceLock};

use futures::future::BoxFuture;
use log::debug;
use regex::Regex;

use super::{host_contains, HostRequest};
use crate::{
    errors::{ExtractError, Result},
    models::{ManifestResolution, StreamVariant, DEFAULT_LABEL},
    resolver::ManifestResolver,
    utils::{self, text, unpack::packerjs},
};

const HOSTS: [&str; 4] = ["mixdrop", "mixdrp", "mxdrop", "m1xdrop"];

pub fn matches(url: &str) -> bool {
    host_contains(url, &HOSTS)
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
    let iframe_url = request.url.replace("/f/", "/e/");
    let iframe = resolver.fetch_text(&iframe_url, &request.headers()).await?;

    let file = find_wurl(&iframe).ok_or_else(|| ExtractError::UnsupportedHost(iframe_url.clone()))?;

    let headers = HashMap::from([
        ("User-Agent".to_owned(), utils::get_user_agent().to_owned()),
        ("Referer".to_owned(), iframe_url.clone()),
    ]);

    Ok(ManifestResolution::single_file(
        &iframe_url,
        StreamVariant::new(text::to_full_url(&file), DEFAULT_LABEL).with_headers(&headers),
    ))
}

fn find_wurl(iframe: &str) -> Option<String> {
    static WURL_RE: OnceLock<Regex> = OnceLock::new();
    let wurl_re = WURL_RE
        .get_or_init(|| Regex::new(r#"MDCore.wurl\s*=\s*["](?<file>[^"]+)["]"#).unwrap());

    packerjs::packed_scripts(iframe).iter().find_map(|script| {
        let unpacked = packerjs::unpack_and_combine(script)?;
        debug!("[mixdrop] unpacked player script");

        wurl_re
            .captures(&unpacked)
            .and_then(|m| Some(m.name("file")?.as_str().to_owned()))
    })
}
