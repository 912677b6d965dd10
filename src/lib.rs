pub mod api;
pub mod errors;
pub mod extractors;
pub mod models;
pub mod resolver;
pub mod utils;

pub use errors::{ExtractError, Result};
pub use extractors::{ExtractorRegistry, HostRequest};
pub use models::{
    AudioTrack, EncryptedPayload, ManifestResolution, StreamVariant, SubtitleTrack,
    UnpackedPayload,
};
pub use resolver::ManifestResolver;
pub use utils::fetch::{FetchResponse, Fetcher, ReqwestFetcher};
