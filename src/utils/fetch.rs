use std::collections::HashMap;

use futures::future::BoxFuture;
use log::{debug, warn};

use super::{create_client, create_client_builder, ClientOptions};
use crate::errors::{ExtractError, Result};

pub type Headers = HashMap<String, String>;

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

/// The http capability the extraction core runs on. Timeouts and
/// cancellation belong to the implementation.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        headers: &'a Headers,
    ) -> BoxFuture<'a, Result<FetchResponse>>;
}

/// Fetches `url` as text, treating http error statuses as failed fetches.
pub async fn fetch_text(fetcher: &dyn Fetcher, url: &str, headers: &Headers) -> Result<String> {
    let res = fetcher.fetch(url, headers).await?;

    if res.status >= 400 {
        return Err(ExtractError::fetch(
            url,
            Some(res.status),
            format!("http status {}", res.status),
        ));
    }

    Ok(res.body)
}

pub fn referer_headers(referer: &str) -> Headers {
    HashMap::from([("Referer".to_owned(), referer.to_owned())])
}

/// [`Fetcher`] backed by the shared reqwest client.
///
/// Certificate verification stays on. A host with a broken certificate chain
/// can be routed through a relaxed client with
/// [`ReqwestFetcher::allow_invalid_certs_for`]; no other host is affected.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    relaxed_client: Option<reqwest::Client>,
    relaxed_hosts: Vec<String>,
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new(create_client().clone())
    }
}

impl ReqwestFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            relaxed_client: None,
            relaxed_hosts: vec![],
        }
    }

    pub fn allow_invalid_certs_for(mut self, host: &str) -> Result<Self> {
        if self.relaxed_client.is_none() {
            let client = create_client_builder(&ClientOptions::default())
                .danger_accept_invalid_certs(true)
                .build()?;
            self.relaxed_client = Some(client);
        }

        warn!("[fetch] certificate verification disabled for {host}");
        self.relaxed_hosts.push(host.to_lowercase());
        Ok(self)
    }

    fn client_for(&self, url: &str) -> &reqwest::Client {
        match &self.relaxed_client {
            Some(relaxed) if host_matches(url, &self.relaxed_hosts) => relaxed,
            _ => &self.client,
        }
    }
}

impl Fetcher for ReqwestFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        headers: &'a Headers,
    ) -> BoxFuture<'a, Result<FetchResponse>> {
        Box::pin(async move {
            debug!("[fetch] GET {url}");

            let mut request = self.client_for(url).get(url);
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }

            let res = request
                .send()
                .await
                .map_err(|e| ExtractError::fetch(url, None, e))?;

            let status = res.status().as_u16();
            let body = res
                .text()
                .await
                .map_err(|e| ExtractError::fetch(url, Some(status), e))?;

            Ok(FetchResponse { status, body })
        })
    }
}

fn host_matches(url: &str, hosts: &[String]) -> bool {
    let host = match url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
    {
        Some(host) => host,
        None => return false,
    };

    hosts
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{h}")))
}


#[cfg(test)]
mod tests {
    use super::{testing::StaticFetcher, *};

    #[tokio::test]
    async fn should_map_error_status_to_fetch_failed() {
        let fetcher = StaticFetcher::new()
            .with("https://host/ok", "body")
            .with_status("https://host/gone", 404, "not found");

        let body = fetch_text(&fetcher, "https://host/ok", &Headers::new()).await.unwrap();
        assert_eq!(body, "body");

        let err = fetch_text(&fetcher, "https://host/gone", &Headers::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::FetchFailed { status: Some(404), .. }));
        assert!(err.is_retryable());

        let err = fetch_text(&fetcher, "https://down/", &Headers::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::FetchFailed { status: None, .. }));
    }

    #[tokio::test]
    async fn should_pass_headers() {
        let fetcher = StaticFetcher::new().with("https://host/*", "ok");
        let headers = referer_headers("https://site.example/");

        fetch_text(&fetcher, "https://host/page", &headers).await.unwrap();

        let requests = fetcher.requests();
        assert_eq!(requests[0].0, "https://host/page");
        assert_eq!(requests[0].1["Referer"], "https://site.example/");
    }

    #[test]
    fn should_match_relaxed_hosts() {
        let hosts = vec!["broken.example".to_owned()];

        assert!(host_matches("https://broken.example/e/1", &hosts));
        assert!(host_matches("https://CDN.Broken.Example/v.mp4", &hosts));
        assert!(!host_matches("https://notbroken.example/e/1", &hosts));
        assert!(!host_matches("https://other.example/e/1", &hosts));
        assert!(!host_matches("not a url", &hosts));
    }
}
