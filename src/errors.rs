pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("malformed p.a.c.k.e.r. data: {0}")]
    UnrecoverablePacking(String),

    #[error("no known video pattern for {0}")]
    UnsupportedHost(String),

    #[error("failed to fetch {url}: {reason}")]
    FetchFailed {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("decryption failed: {0}")]
    DecryptFailed(String),

    #[error("failed to parse manifest {url}: {reason}")]
    ManifestParseFailed { url: String, reason: String },
}

impl ExtractError {
    pub fn fetch(url: &str, status: Option<u16>, reason: impl ToString) -> Self {
        Self::FetchFailed {
            url: url.to_owned(),
            status,
            reason: reason.to_string(),
        }
    }

    pub fn decrypt(reason: impl ToString) -> Self {
        Self::DecryptFailed(reason.to_string())
    }

    pub fn manifest(url: &str, reason: impl ToString) -> Self {
        Self::ManifestParseFailed {
            url: url.to_owned(),
            reason: reason.to_string(),
        }
    }

    /// Transport level failure, worth restarting the chain from the host page.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchFailed { .. })
    }

    /// Parsing anomalies that callers turn into "no result for this item".
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Self::UnrecoverablePacking(_)
                | Self::UnsupportedHost(_)
                | Self::ManifestParseFailed { .. }
        )
    }
}

impl From<reqwest::Error> for ExtractError {
    fn from(e: reqwest::Error) -> Self {
        Self::FetchFailed {
            url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            status: e.status().map(|s| s.as_u16()),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_classify_errors() {
        let fetch = ExtractError::fetch("https://host/master.m3u8", Some(503), "unavailable");
        assert!(fetch.is_retryable());
        assert!(!fetch.is_soft());

        let decrypt = ExtractError::decrypt("bad padding");
        assert!(!decrypt.is_retryable());
        assert!(!decrypt.is_soft());

        assert!(ExtractError::UnsupportedHost("https://host".into()).is_soft());
        assert!(ExtractError::UnrecoverablePacking("count".into()).is_soft());
        assert!(ExtractError::manifest("https://host", "html").is_soft());
    }

    #[test]
    fn should_format_fetch_error() {
        let err = ExtractError::fetch("https://host/a", Some(404), "status 404");
        assert_eq!(err.to_string(), "failed to fetch https://host/a: status 404");
    }
}
