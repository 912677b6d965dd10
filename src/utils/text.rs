use std::sync::OnceLock;

use regex::Regex;

pub fn extract_file_property(script: &str) -> Option<&str> {
    static FILE_PROPERTY_RE: OnceLock<Regex> = OnceLock::new();
    FILE_PROPERTY_RE
        .get_or_init(|| Regex::new(r#"file\s*:\s*['"](?<file>[^"']+)['"]"#).unwrap())
        .captures(script)
        .and_then(|m| Some(m.name("file")?.as_str()))
}

/// `"hls2":"..."` style properties of jwplayer setups, in script order.
pub fn extract_hls_properties(script: &str) -> Vec<(&str, &str)> {
    static HLS_PROPERTY_RE: OnceLock<Regex> = OnceLock::new();
    HLS_PROPERTY_RE
        .get_or_init(|| Regex::new(r#"["']?hls(\d+)["']?\s*:\s*['"]([^"']+)['"]"#).unwrap())
        .captures_iter(script)
        .filter_map(|m| Some((m.get(1)?.as_str(), m.get(2)?.as_str())))
        .collect()
}

/// The `sources:[...]` array literal of a player setup call.
pub fn extract_sources_array(script: &str) -> Option<&str> {
    static SOURCES_RE: OnceLock<Regex> = OnceLock::new();
    SOURCES_RE
        .get_or_init(|| {
            Regex::new(r#"["']?sources["']?\s*:\s*(?<sources>\[\s*\{.*?\}\s*\])"#).unwrap()
        })
        .captures(script)
        .and_then(|m| Some(m.name("sources")?.as_str()))
}

/// First absolute (or protocol relative) `.m3u8`/`.mp4` url in the text.
pub fn find_media_url(text: &str) -> Option<&str> {
    static MEDIA_URL_RE: OnceLock<Regex> = OnceLock::new();
    MEDIA_URL_RE
        .get_or_init(|| {
            Regex::new(r#"(?:https?:)?//[^"'\s<>\\]+?\.(?:m3u8|mp4)(?:\?[^"'\s<>\\]*)?"#).unwrap()
        })
        .find(text)
        .map(|m| m.as_str())
}

pub fn to_full_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{url}")
    } else {
        url.into()
    }
}

/// Makes a path found in a host page absolute against the page origin.
pub fn to_absolute_url(page_url: &str, link: &str) -> String {
    if link.starts_with("//") || link.starts_with("http") {
        return to_full_url(link);
    }

    url::Url::parse(page_url)
        .and_then(|base| base.join(link))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| link.to_owned())
}

/// Unescapes `\/` sequences left by json encoders inside scripts.
pub fn unescape_slashes(text: &str) -> String {
    text.replace("\\/", "/")
}
