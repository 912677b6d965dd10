use std::sync::OnceLock;

use futures::future::BoxFuture;
use regex::Regex;

use super::{host_contains, HostRequest};
use crate::{
    errors::{ExtractError, Result},
    models::ManifestResolution,
    resolver::ManifestResolver,
    utils::{crypto, fetch::referer_headers, text},
};

const URL: &str = "https://primevid.click";
const KEY: &str = "kiemtienmua911ca";
const IV: &str = "$%&'()*+,#oitxtr";

pub fn matches(url: &str) -> bool {
    host_contains(url, &["primevid"])
}

pub fn extract_boxed<'a>(
    resolver: &'a ManifestResolver,
    request: &'a HostRequest,
) -> BoxFuture<'a, Result<ManifestResolution>> {
    Box::pin(extract(resolver, request))
}

/// The video api answers with hex encoded AES-128 ciphertext; the `cf` field
/// of the plaintext is the master playlist.
pub async fn extract(
    resolver: &ManifestResolver,
    request: &HostRequest,
) -> Result<ManifestResolution> {
    let hash = match request.url.split_once('#') {
        Some((_, hash)) if !hash.is_empty() => hash,
        _ => return Err(ExtractError::UnsupportedHost(request.url.clone())),
    };

    let headers = referer_headers(URL);
    let api_url = format!("{URL}/api/v1/video?id={hash}&w=1960&h=1080&r=primewire.tf");
    let res = resolver.fetch_text(&api_url, &headers).await?;

    let pt = decrypt_response(&res)?;

    static HLS_URL_RE: OnceLock<Regex> = OnceLock::new();
    let hls_url_re = HLS_URL_RE.get_or_init(|| Regex::new(r#"cf":"([^"]+)"#).unwrap());

    let (_, [hls_url]) = match hls_url_re.captures(&pt) {
        Some(cap) => cap.extract(),
        None => return Err(ExtractError::UnsupportedHost(api_url)),
    };

    let final_url = text::unescape_slashes(hls_url).replace('\\', "");
    resolver.resolve_direct_manifest(&final_url, &headers).await
}

fn decrypt_response(res: &str) -> Result<String> {
    // the body carries one stray trailing character
    let mut body = res.trim();
    if body.len() % 2 == 1 {
        if let Some((last, _)) = body.char_indices().last() {
            body = &body[..last];
        }
    }

    let ct = hex::decode(body)
        .map_err(|e| ExtractError::decrypt(format!("invalid hex body: {e}")))?;
    let pt_bytes = crypto::decrypt_aes(KEY.as_bytes(), IV.as_bytes(), &ct)?;

    String::from_utf8(pt_bytes).map_err(ExtractError::decrypt)
}
