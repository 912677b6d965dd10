use std::sync::Arc;

use log::{debug, warn};

use crate::{
    errors::{ExtractError, Result},
    models::{EncryptedPayload, ManifestResolution, StreamVariant, DEFAULT_LABEL},
    utils::{
        crypto, crypto_js,
        fetch::{self, Fetcher, Headers, ReqwestFetcher},
        hls,
        jwp_player::{JWPConfig, Source, Track},
        text, unpack,
    },
};

/// Turns host responses (master playlists, encrypted source envelopes,
/// player setups, whole embed pages) into [`ManifestResolution`]s.
///
/// Every resolution is independent; the resolver holds no state besides
/// the fetcher.
#[derive(Clone)]
pub struct ManifestResolver {
    fetcher: Arc<dyn Fetcher>,
}

impl Default for ManifestResolver {
    fn default() -> Self {
        Self::new(Arc::new(ReqwestFetcher::default()))
    }
}

impl ManifestResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    pub async fn fetch_text(&self, url: &str, headers: &Headers) -> Result<String> {
        fetch::fetch_text(self.fetcher(), url, headers).await
    }

    /// Fetches `manifest_url` and lists its variants.
    ///
    /// A body without `#EXT-X-STREAM-INF` is the media itself and comes back
    /// as a single variant labelled [`DEFAULT_LABEL`]. HTML or a master
    /// playlist without any variant resolve to an empty result.
    pub async fn resolve_direct_manifest(
        &self,
        manifest_url: &str,
        headers: &Headers,
    ) -> Result<ManifestResolution> {
        let body = self.fetch_text(manifest_url, headers).await?;
        soften(manifest_url, parse_manifest(manifest_url, &body, headers))
    }

    pub fn decrypt_envelope(payload: &EncryptedPayload) -> Result<String> {
        let plaintext = crypto::decrypt_base64_aes(
            &payload.key,
            &payload.iv,
            payload.ciphertext_base64.trim().as_bytes(),
        )?;

        String::from_utf8(plaintext).map_err(ExtractError::decrypt)
    }

    pub fn encrypt_envelope(plaintext: &str, key: &[u8], iv: &[u8]) -> Result<String> {
        crypto::encrypt_base64_aes(key, iv, plaintext.as_bytes())
    }

    /// Opens a CryptoJS passphrase envelope (`U2FsdGVkX1...`).
    pub fn decrypt_salted_envelope(ciphertext_base64: &str, passphrase: &str) -> Result<String> {
        crypto_js::decrypt_salted_base64(passphrase.as_bytes(), ciphertext_base64.trim())
    }

    /// Builds a resolution from a player source list.
    ///
    /// `hls` entries are fetched and expanded into their variants, everything
    /// else is a leaf with a normalized label. Unparseable json resolves to an
    /// empty result.
    pub async fn parse_source_array(
        &self,
        source_url: &str,
        json: &str,
        headers: &Headers,
    ) -> Result<ManifestResolution> {
        let config = match JWPConfig::parse(json) {
            Ok(config) => config,
            Err(err) => {
                warn!("[resolver] invalid source list from {source_url}: {err}");
                return Ok(ManifestResolution::empty(source_url));
            }
        };

        let sources: Vec<_> = config.all_sources().cloned().collect();
        self.resolve_sources(source_url, &sources, &config.tracks, headers)
            .await
    }

    /// Fetches a host page and digs the streams out of it.
    ///
    /// Packed scripts are unpacked first; then a `sources` array, `hlsN`
    /// properties, a `file` property and finally any media url are tried in
    /// that order, over the unpacked code and then the raw page. Pages with
    /// none of those resolve to an empty result.
    pub async fn resolve_page(
        &self,
        page_url: &str,
        headers: &Headers,
    ) -> Result<ManifestResolution> {
        let page = self.fetch_text(page_url, headers).await?;
        self.resolve_page_content(page_url, &page, headers).await
    }

    /// [`ManifestResolver::resolve_page`] over an already fetched page.
    pub async fn resolve_page_content(
        &self,
        page_url: &str,
        page: &str,
        headers: &Headers,
    ) -> Result<ManifestResolution> {
        let stream_headers = with_referer(headers, page_url);

        let mut scripts = vec![];
        if let Some(unpacked) = unpack::unpack_and_combine(page) {
            debug!("[resolver] unpacked player script of {page_url}");
            scripts.push(unpacked);
        }
        scripts.push(page.to_owned());

        let found = scripts
            .iter()
            .find_map(|script| find_page_sources(page_url, script));

        let sources = match found {
            Some(PageSources::Config(config)) => {
                let sources: Vec<_> = config.all_sources().cloned().collect();
                return self
                    .resolve_sources(page_url, &sources, &config.tracks, &stream_headers)
                    .await;
            }
            Some(PageSources::Links(sources)) => sources,
            None => {
                return soften(
                    page_url,
                    Err(ExtractError::UnsupportedHost(page_url.to_owned())),
                )
            }
        };

        self.resolve_sources(page_url, &sources, &[], &stream_headers)
            .await
    }

    async fn resolve_sources(
        &self,
        source_url: &str,
        sources: &[Source],
        tracks: &[Track],
        headers: &Headers,
    ) -> Result<ManifestResolution> {
        let mut resolution = ManifestResolution::empty(source_url);
        let mut all_single = true;
        let mut first_error = None;

        for source in sources {
            let file = text::to_absolute_url(source_url, &text::unescape_slashes(&source.file));

            if !source.is_hls() {
                resolution.variants.push(
                    StreamVariant::new(file, source.normalized_label()).with_headers(headers),
                );
                continue;
            }

            match self.resolve_direct_manifest(&file, headers).await {
                Ok(mut nested) => {
                    if nested.is_single_file {
                        for variant in nested.variants.iter_mut() {
                            variant.label = source.normalized_label();
                        }
                    } else {
                        all_single = false;
                    }
                    resolution.variants.extend(nested.variants);
                    resolution.audio_tracks.extend(nested.audio_tracks);
                }
                Err(err) => {
                    warn!("[resolver] skipping source {file}: {err}");
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Some(err) = first_error {
            if resolution.is_empty() {
                return Err(err);
            }
        }

        let config = JWPConfig {
            tracks: tracks.to_vec(),
            ..Default::default()
        };
        resolution.subtitles = config.subtitles();
        resolution.is_single_file = all_single && resolution.variants.len() == 1;

        Ok(resolution)
    }
}

/// Parses a fetched manifest body.
pub fn parse_manifest(
    manifest_url: &str,
    body: &str,
    headers: &Headers,
) -> Result<ManifestResolution> {
    if body.trim().is_empty() {
        return Err(ExtractError::manifest(manifest_url, "empty body"));
    }

    if !hls::is_master_playlist(body) {
        if hls::looks_like_html(body) {
            return Err(ExtractError::manifest(manifest_url, "got an html page"));
        }

        return Ok(ManifestResolution::single_file(
            manifest_url,
            StreamVariant::new(manifest_url, DEFAULT_LABEL).with_headers(headers),
        ));
    }

    let variants: Vec<_> = hls::parse_variants(body, manifest_url)
        .into_iter()
        .map(|variant| variant.with_headers(headers))
        .collect();

    if variants.is_empty() {
        return Err(ExtractError::manifest(manifest_url, "no variant has a uri"));
    }

    Ok(ManifestResolution {
        source_url: manifest_url.to_owned(),
        variants,
        is_single_file: false,
        audio_tracks: hls::parse_audio_tracks(body, manifest_url),
        subtitles: vec![],
    })
}

/// Soft failures end as an empty resolution, everything else propagates.
pub fn soften(source_url: &str, result: Result<ManifestResolution>) -> Result<ManifestResolution> {
    match result {
        Err(err) if err.is_soft() => {
            warn!("[resolver] {err}");
            Ok(ManifestResolution::empty(source_url))
        }
        other => other,
    }
}

enum PageSources {
    Config(JWPConfig),
    Links(Vec<Source>),
}

fn find_page_sources(page_url: &str, script: &str) -> Option<PageSources> {
    if let Some(array) = text::extract_sources_array(script) {
        match JWPConfig::parse(&text::unescape_slashes(array)) {
            Ok(config) if config.all_sources().next().is_some() => {
                return Some(PageSources::Config(config))
            }
            _ => debug!("[resolver] sources array of {page_url} is not json"),
        }
    }

    let hls_links: Vec<_> = text::extract_hls_properties(script)
        .into_iter()
        .map(|(idx, file)| link_source(page_url, file, Some(format!("hls{idx}"))))
        .collect();
    if !hls_links.is_empty() {
        return Some(PageSources::Links(hls_links));
    }

    text::extract_file_property(script)
        .or_else(|| text::find_media_url(script))
        .map(|file| PageSources::Links(vec![link_source(page_url, file, None)]))
}

fn link_source(page_url: &str, file: &str, label: Option<String>) -> Source {
    let file = text::to_absolute_url(page_url, &text::unescape_slashes(file));
    let kind = is_manifest_url(&file).then(|| "hls".to_owned());

    Source { file, label, kind }
}

fn is_manifest_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.ends_with(".m3u8") || path.ends_with(".txt")
}

fn with_referer(headers: &Headers, page_url: &str) -> Headers {
    let mut headers = headers.clone();
    if !headers.keys().any(|name| name.eq_ignore_ascii_case("referer")) {
        headers.insert("Referer".to_owned(), page_url.to_owned());
    }
    headers
}
