use serde::Deserialize;

use crate::models::{SubtitleTrack, AUTO_LABEL};

#[derive(Deserialize, Debug, Clone)]
pub struct Track {
    pub file: String,
    pub kind: Option<String>,
    pub label: Option<String>,
}

impl Track {
    pub fn is_subtitle(&self) -> bool {
        matches!(
            self.kind.as_deref(),
            Some("caption" | "captions" | "subtitle" | "subtitles")
        )
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Source {
    #[serde(alias = "url", alias = "src")]
    pub file: String,
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl Source {
    pub fn is_hls(&self) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|kind| kind.eq_ignore_ascii_case("hls"))
    }

    pub fn normalized_label(&self) -> String {
        self.label
            .as_deref()
            .map(|label| label.trim().to_lowercase())
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| AUTO_LABEL.to_owned())
    }
}

/// Player setup as hosts return it: either `{sources, tracks}` or the
/// encrypt-ajax flavour `{source, source_bk, track}`.
#[derive(Deserialize, Debug, Default)]
pub struct JWPConfig {
    #[serde(alias = "source", default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub source_bk: Vec<Source>,
    #[serde(alias = "track", default)]
    pub tracks: Vec<Track>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SourceList {
    Flat(Vec<Source>),
    Config(JWPConfig),
}

impl JWPConfig {
    /// Accepts a bare `[{file, label, type}]` array as well as a full config.
    pub fn parse(json: &str) -> serde_json::Result<Self> {
        Ok(match serde_json::from_str(json)? {
            SourceList::Flat(sources) => JWPConfig {
                sources,
                ..Default::default()
            },
            SourceList::Config(config) => config,
        })
    }

    pub fn all_sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter().chain(self.source_bk.iter())
    }

    pub fn subtitles(&self) -> Vec<SubtitleTrack> {
        self.tracks
            .iter()
            .filter(|track| track.is_subtitle())
            .map(|track| SubtitleTrack {
                url: track.file.clone(),
                label: track.label.clone(),
            })
            .collect()
    }
}
