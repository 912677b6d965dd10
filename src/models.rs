use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LABEL: &str = "Default";
pub const AUTO_LABEL: &str = "auto";

/// Result of reversing one p.a.c.k.e.r. call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackedPayload {
    pub code: String,
    pub symbol_count: usize,
    pub radix: u32,
}

/// One playable rendition of a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamVariant {
    pub url: String,
    pub label: String,
    pub bandwidth_hint: Option<u64>,
    pub required_headers: HashMap<String, String>,
}

impl StreamVariant {
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
            bandwidth_hint: None,
            required_headers: HashMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: &HashMap<String, String>) -> Self {
        self.required_headers = headers.clone();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub name: String,
    pub url: String,
    pub language: Option<String>,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub url: String,
    pub label: Option<String>,
}

/// Outcome of resolving one host page or API call.
///
/// Variants are kept in the order the host listed them. Nothing is cached
/// between resolutions: hosts rotate their signed URLs too often.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestResolution {
    pub source_url: String,
    pub variants: Vec<StreamVariant>,
    pub is_single_file: bool,
    pub audio_tracks: Vec<AudioTrack>,
    pub subtitles: Vec<SubtitleTrack>,
}

impl ManifestResolution {
    pub fn empty(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            ..Default::default()
        }
    }

    pub fn single_file(source_url: impl Into<String>, variant: StreamVariant) -> Self {
        Self {
            source_url: source_url.into(),
            variants: vec![variant],
            is_single_file: true,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Names every variant `"<prefix> - <label>"`, the way adapters tell servers apart.
    pub fn with_label_prefix(mut self, prefix: &str) -> Self {
        for variant in self.variants.iter_mut() {
            variant.label = format!("{prefix} - {}", variant.label);
        }
        self
    }

    /// Moves variants whose label contains `preferred` to the front, keeping
    /// relative order inside both groups.
    pub fn sorted_by_preference(mut self, preferred: &str) -> Self {
        self.variants.sort_by_key(|variant| !variant.label.contains(preferred));
        self
    }

    /// Appends another resolution's variants and tracks. The result is never
    /// a single file once more than one variant is present.
    pub fn merge(&mut self, other: ManifestResolution) {
        self.variants.extend(other.variants);
        self.audio_tracks.extend(other.audio_tracks);
        self.subtitles.extend(other.subtitles);
        self.is_single_file =
            self.variants.len() == 1 && (self.is_single_file || other.is_single_file);
    }
}

/// AES-CBC wrapped payload, keyed by a pair baked into the host's player script.
#[derive(Debug, Clone)]
pub struct EncryptedPayload {
    pub ciphertext_base64: String,
    pub iv: Vec<u8>,
    pub key: Vec<u8>,
}

impl EncryptedPayload {
    pub fn new(ciphertext_base64: impl Into<String>, key: &[u8], iv: &[u8]) -> Self {
        Self {
            ciphertext_base64: ciphertext_base64.into(),
            iv: iv.to_vec(),
            key: key.to_vec(),
        }
    }
}
