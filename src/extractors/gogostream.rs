use std::sync::OnceLock;

use futures::future::BoxFuture;
use log::debug;
use scraper::Selector;
use serde::Deserialize;
use url::Url;

use super::{host_contains, HostRequest};
use crate::{
    errors::{ExtractError, Result},
    models::{EncryptedPayload, ManifestResolution},
    resolver::ManifestResolver,
    utils::fetch::{referer_headers, Headers},
};

const HOSTS: [&str; 5] = ["gogo", "embtaku", "goload", "anihdplay", "playtaku"];

/// Fixed pair some encrypt-ajax mirrors use instead of page-embedded keys.
pub const SHARED_KEY: &[u8] = b"93422192433952489752342908585752";
pub const SHARED_IV: &[u8] = b"9262859232435825";

pub fn matches(url: &str) -> bool {
    host_contains(url, &HOSTS)
}

pub fn extract_boxed<'a>(
    resolver: &'a ManifestResolver,
    request: &'a HostRequest,
) -> BoxFuture<'a, Result<ManifestResolution>> {
    Box::pin(extract(resolver, request))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AjaxKeys {
    pub iv: Vec<u8>,
    pub encrypt_key: Vec<u8>,
    pub decrypt_key: Vec<u8>,
}

impl AjaxKeys {
    pub fn shared() -> Self {
        Self {
            iv: SHARED_IV.to_vec(),
            encrypt_key: SHARED_KEY.to_vec(),
            decrypt_key: SHARED_KEY.to_vec(),
        }
    }
}

/// Embed pages whose player asks `encrypt-ajax.php` for its sources.
/// Keys are read from the page, falling back to [`AjaxKeys::shared`].
pub async fn extract(
    resolver: &ManifestResolver,
    request: &HostRequest,
) -> Result<ManifestResolution> {
    extract_with(resolver, request, None).await
}

/// Same as [`extract`] with a known key set.
pub async fn extract_with(
    resolver: &ManifestResolver,
    request: &HostRequest,
    keys: Option<AjaxKeys>,
) -> Result<ManifestResolution> {
    let url = &request.url;
    let iframe = resolver.fetch_text(url, &request.headers()).await?;

    let (page_keys, data) =
        parse_iframe(&iframe).ok_or_else(|| ExtractError::UnsupportedHost(url.clone()))?;
    let keys = keys.or(page_keys).unwrap_or_else(AjaxKeys::shared);

    let crypto = ManifestResolver::decrypt_envelope(&EncryptedPayload::new(
        data,
        &keys.encrypt_key,
        &keys.iv,
    ))?;
    let (crypto_id, ajax_params) = crypto
        .split_once('&')
        .ok_or_else(|| ExtractError::decrypt("no ajax params in crypto value"))?;

    let url_parsed = Url::parse(url).map_err(|_| ExtractError::UnsupportedHost(url.clone()))?;
    let id = url_parsed
        .query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| crypto_id.to_owned());

    let encoded_id = ManifestResolver::encrypt_envelope(&id, &keys.encrypt_key, &keys.iv)?;

    let host = url_parsed
        .host_str()
        .ok_or_else(|| ExtractError::UnsupportedHost(url.clone()))?;
    let links_url =
        format!("https://{host}/encrypt-ajax.php?id={encoded_id}&{ajax_params}&alias={id}");
    debug!("[gogostream] {links_url}");

    let mut ajax_headers = referer_headers(url);
    ajax_headers.insert("X-Requested-With".to_owned(), "XMLHttpRequest".to_owned());
    let links_res_str = resolver.fetch_text(&links_url, &ajax_headers).await?;

    #[derive(Deserialize)]
    struct LinksRes {
        data: String,
    }

    let links_res: LinksRes = serde_json::from_str(&links_res_str)
        .map_err(|e| ExtractError::decrypt(format!("unexpected encrypt-ajax response: {e}")))?;

    let links_config = ManifestResolver::decrypt_envelope(&EncryptedPayload::new(
        links_res.data,
        &keys.decrypt_key,
        &keys.iv,
    ))?;

    let stream_headers: Headers = referer_headers(url);
    resolver
        .parse_source_array(url, &links_config, &stream_headers)
        .await
}

fn parse_iframe(iframe: &str) -> Option<(Option<AjaxKeys>, String)> {
    static IV_SELECTOR: OnceLock<Selector> = OnceLock::new();
    static SEC_KEY_SELECTOR: OnceLock<Selector> = OnceLock::new();
    static DEC_KEY_SELECTOR: OnceLock<Selector> = OnceLock::new();
    static DATA_SELECTOR: OnceLock<Selector> = OnceLock::new();

    let iframe_document = scraper::Html::parse_document(iframe);

    let data = iframe_document
        .select(DATA_SELECTOR.get_or_init(|| Selector::parse("script[data-value]").unwrap()))
        .filter_map(|el| el.attr("data-value"))
        .next()?
        .to_owned();

    let find_class_key = |selector: &Selector, prefix: &str| {
        iframe_document
            .select(selector)
            .filter_map(|el| el.attr("class"))
            .filter_map(|classes| find_key(classes, prefix))
            .map(|key| key.as_bytes().to_vec())
            .next()
    };

    let iv = find_class_key(
        IV_SELECTOR.get_or_init(|| Selector::parse("div.wrapper").unwrap()),
        "container-",
    );
    let encrypt_key = find_class_key(
        SEC_KEY_SELECTOR.get_or_init(|| Selector::parse("body").unwrap()),
        "container-",
    );
    let decrypt_key = find_class_key(
        DEC_KEY_SELECTOR.get_or_init(|| Selector::parse("div.videocontent").unwrap()),
        "videocontent-",
    );

    let keys = match (iv, encrypt_key, decrypt_key) {
        (Some(iv), Some(encrypt_key), Some(decrypt_key)) => Some(AjaxKeys {
            iv,
            encrypt_key,
            decrypt_key,
        }),
        _ => None,
    };

    Some((keys, data))
}

fn find_key<'a>(classes: &'a str, prefix: &str) -> Option<&'a str> {
    classes
        .split_whitespace()
        .find_map(|class| class.strip_prefix(prefix))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::utils::fetch::testing::StaticFetcher;

    const EMBED_URL: &str = "https://s3embtaku.pro/embedplus?id=MTIzOTc3&token=tjMJsk7ukddplzOXoxnUcQ&expires=1734193918";

    const EMBED: &str = r#"<!DOCTYPE html>
<html>
<head><script type="text/javascript" src="/js/jquery.min.js"></script></head>
<body class="container-37911490979715163134003223491201">
<div class="wrapper container-3134003223491201">
  <div class="videocontent videocontent-54674138327930866480207815084989">
    <div id="myVideo"></div>
  </div>
</div>
<script type="text/javascript" src="/js/player.js" data-name="episode" data-value="egaK6blHupj7Z7XmU1WUJBOkb0EvvEkX/HkA2cagr3CAfP8hWSr+u1cIrdHM4ht8Oc8F+jB5Hgs4vtIe/u6qCg=="></script>
</body>
</html>"#;

    const AJAX_RESPONSE: &str = r#"{"data":"w89bNzwCrlGHreXFIaZoZvoj5XBv+qDHRpy2Mm3sgoHUXUe8wtJZ/xnOwOI6jEN3mkzVM6pAKfmPIxTy2DqpBZeeP69dRPs+IlROHHbeqFHZy0UnlIMEC3Ke7ySKFplSwr2xNFiRSZQZRTPETccrOtn1dr6Ahexkh/OcOytk63ahetWFWlBBvGAGI7QsEl6+iMVJ9ILZTa3EdBFVOCuKdIMeM76Le/o4rAIvAIaavM/eyyRUkZibdXbkdt6oVcN7j5rJCrnZAVRMBpSsrZ8C+CptM2ZB+mdlNEL5LqqfwPe2a2UsGS1mA/jZSEWm7sgBPCME57E4nNSJJxwVGK3bF7ajbB0rCpbCw8PZtuS9qBIZdK5X3nAWUTVtADpWKHaC31Xy7jDNmWCMnbHN3XUZDGC7e6fpaqiGtSL1VAAnJxTMk2Uxdc8yQC7jnRWJdHZz328a3sj0b7WvSz/AvHJytQ=="}"#;

    const MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:PROGRAM-ID=1,BANDWIDTH=1287000,RESOLUTION=1280x720,NAME=\"720p\"
ep.1.1703914189.720.m3u8
#EXT-X-STREAM-INF:PROGRAM-ID=1,BANDWIDTH=515000,RESOLUTION=640x360,NAME=\"360p\"
ep.1.1703914189.360.m3u8
";

    #[test_log::test(tokio::test)]
    async fn should_load_sources() -> anyhow::Result<()> {
        let fetcher = Arc::new(
            StaticFetcher::new()
                .with(EMBED_URL, EMBED)
                .with("https://s3embtaku.pro/encrypt-ajax.php*", AJAX_RESPONSE)
                .with("https://gogo-cdn.example/hls/abc/ep.1.m3u8", MASTER),
        );
        let resolver = ManifestResolver::new(fetcher.clone());

        let res = extract(&resolver, &HostRequest::new(EMBED_URL)).await?;

        let labels: Vec<_> = res.variants.iter().map(|v| v.label.as_str()).collect();
        assert_eq!(labels, ["720p", "360p", "720 p"]);
        assert_eq!(
            res.variants[0].url,
            "https://gogo-cdn.example/hls/abc/ep.1.1703914189.720.m3u8"
        );
        assert_eq!(res.variants[2].url, "https://gogo-bk.example/abc/ep.1.720.mp4");
        assert_eq!(res.subtitles.len(), 1);
        assert_eq!(res.variants[0].required_headers["Referer"], EMBED_URL);

        let (ajax_url, ajax_headers) = fetcher.requests()[1].clone();
        assert_eq!(
            ajax_url,
            "https://s3embtaku.pro/encrypt-ajax.php?id=KM2Sd7P9O4fKuDV95/gFZg==&token=tjMJsk7ukddplzOXoxnUcQ&expires=1734193918&alias=MTIzOTc3"
        );
        assert_eq!(ajax_headers["X-Requested-With"], "XMLHttpRequest");

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn should_use_shared_keys() -> anyhow::Result<()> {
        let page_url = "https://asianload.example/streaming.php?id=MTIzOTc3";
        let page = r#"<html><body><script data-name="crypto" data-value="g2+4uaty+DPF4j5MTzLqCka/J7nwfPjCQ7A3Y01vQSE="></script></body></html>"#;
        let fetcher = Arc::new(
            StaticFetcher::new()
                .with(page_url, page)
                .with(
                    "https://asianload.example/encrypt-ajax.php*",
                    r#"{"data":"USL7ba3bLkNU0PzzOOJmDJY69xkPwr3fxxeqblwL3E4O4ZRhFXeMKHzzp4/Dkh/qbRUMHB1qx6vzKlTOvvZ92NLjctcOi4XmR+GuBP3RqmIEXCH/un443lasa1h98sTQ7AHpEBsJ5TxMJMXkHVfNOpZzcXuulVIaSPsV+GS+/VU="}"#,
                )
                .with("https://asia-cdn.example/hls/abc/ep.1.m3u8", MASTER),
        );
        let resolver = ManifestResolver::new(fetcher.clone());

        let res = extract_with(
            &resolver,
            &HostRequest::new(page_url),
            Some(AjaxKeys::shared()),
        )
        .await?;

        assert_eq!(res.variants.len(), 2);
        assert_eq!(
            fetcher.requested_urls()[1],
            "https://asianload.example/encrypt-ajax.php?id=RcGxG1ZPvdm33zXo2W2dDg==&token=x1&expires=2&alias=MTIzOTc3"
        );

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn should_fail_hard_on_wrong_keys() {
        let fetcher = StaticFetcher::new().with(EMBED_URL, EMBED);
        let resolver = ManifestResolver::new(Arc::new(fetcher));

        let err = extract_with(&resolver, &HostRequest::new(EMBED_URL), Some(AjaxKeys::shared()))
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::DecryptFailed(_)));
    }

    #[test]
    fn should_find_class_keys() {
        assert_eq!(
            find_key("wrapper container-3134003223491201", "container-"),
            Some("3134003223491201")
        );
        assert_eq!(find_key("videocontent", "videocontent-"), None);
    }
}
