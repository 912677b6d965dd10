use std::{collections::HashMap, sync::OnceLock};

use log::warn;
use regex::Regex;

use crate::models::{AudioTrack, StreamVariant, AUTO_LABEL};

pub const STREAM_INF_TAG: &str = "#EXT-X-STREAM-INF:";
const MEDIA_TAG: &str = "#EXT-X-MEDIA:";

/// True when the playlist lists variant streams rather than media segments.
pub fn is_master_playlist(content: &str) -> bool {
    content.contains(STREAM_INF_TAG)
}

/// Hosts answer expired or blocked manifest links with an html error page.
pub fn looks_like_html(content: &str) -> bool {
    let head: String = content.trim_start().chars().take(15).collect();
    let head = head.to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

/// Parses every `#EXT-X-STREAM-INF` entry together with the uri line that follows it.
/// Entries keep the playlist order.
pub fn parse_variants(content: &str, base_url: &str) -> Vec<StreamVariant> {
    let mut variants = vec![];
    let mut pending: Option<HashMap<String, String>> = None;

    for line in content.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }

        if let Some(attrs) = line.strip_prefix(STREAM_INF_TAG) {
            if pending.is_some() {
                warn!("[hls] stream entry without uri in {base_url}");
            }
            pending = Some(parse_attributes(attrs));
        } else if line.starts_with('#') {
            continue;
        } else if let Some(attrs) = pending.take() {
            let mut variant =
                StreamVariant::new(resolve_uri(base_url, line), variant_label(&attrs));
            variant.bandwidth_hint = attrs
                .get("BANDWIDTH")
                .or_else(|| attrs.get("AVERAGE-BANDWIDTH"))
                .and_then(|b| b.parse().ok());

            variants.push(variant);
        }
    }

    variants
}

/// Parses `#EXT-X-MEDIA:TYPE=AUDIO` renditions that carry their own playlist.
pub fn parse_audio_tracks(content: &str, base_url: &str) -> Vec<AudioTrack> {
    content
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix(MEDIA_TAG))
        .map(parse_attributes)
        .filter(|attrs| attrs.get("TYPE").map(String::as_str) == Some("AUDIO"))
        .filter_map(|mut attrs| {
            let uri = attrs.remove("URI")?;
            Some(AudioTrack {
                url: resolve_uri(base_url, &uri),
                name: attrs.remove("NAME").unwrap_or_else(|| AUTO_LABEL.to_owned()),
                language: attrs.remove("LANGUAGE"),
                is_default: attrs.get("DEFAULT").map(String::as_str) == Some("YES"),
            })
        })
        .collect()
}

fn variant_label(attrs: &HashMap<String, String>) -> String {
    attrs
        .get("RESOLUTION")
        .and_then(|res| res.split_once('x'))
        .and_then(|(_, height)| height.trim().parse::<u32>().ok())
        .map(|height| format!("{height}p"))
        .or_else(|| attrs.get("NAME").cloned())
        .unwrap_or_else(|| AUTO_LABEL.to_owned())
}

/// Splits an attribute list (`KEY=VALUE,KEY="QUOTED,VALUE"`) into a map.
pub fn parse_attributes(attrs: &str) -> HashMap<String, String> {
    static ATTR_RE: OnceLock<Regex> = OnceLock::new();

    ATTR_RE
        .get_or_init(|| Regex::new(r#"(?<key>[A-Z0-9-]+)=(?<value>"[^"]*"|[^,]*)"#).unwrap())
        .captures_iter(attrs)
        .map(|caps| {
            let value = caps["value"].trim_matches('"');
            (caps["key"].to_owned(), value.to_owned())
        })
        .collect()
}

/// Resolves a relative URI against the playlist url
pub fn resolve_uri(base_url: &str, relative_path: &str) -> String {
    if let Ok(resolved) = url::Url::parse(base_url).and_then(|base| base.join(relative_path)) {
        return resolved.to_string();
    }

    // Fallback: simple string concatenation for relative paths
    if base_url.ends_with('/') {
        format!("{}{}", base_url, relative_path)
    } else if let Some(pos) = base_url.rfind('/') {
        format!("{}/{}", &base_url[..pos], relative_path)
    } else {
        format!("{}/{}", base_url, relative_path)
    }
}
