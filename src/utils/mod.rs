pub mod crypto;
pub mod crypto_js;
mod dns;
pub mod fetch;
pub mod hls;
pub mod jwp_player;
pub mod text;
pub mod unpack;

use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use dns::PublicDnsResolver;
use log::error;
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    ClientBuilder,
};

pub fn get_user_agent<'a>() -> &'a str {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36 Edg/138.0.0.0"
}

/// Knobs of the shared http client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub user_agent: String,
    pub public_dns: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            user_agent: get_user_agent().to_owned(),
            public_dns: true,
        }
    }
}

pub fn create_client() -> &'static reqwest::Client {
    static LAZZY_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    LAZZY_CLIENT.get_or_init(|| build_client(create_client_builder(&ClientOptions::default())))
}

fn build_client(builder: ClientBuilder) -> reqwest::Client {
    builder.build().unwrap_or_else(|err| {
        error!("[client] fail to build configured client, using a bare one: {err}");
        reqwest::Client::new()
    })
}

pub fn create_client_builder(options: &ClientOptions) -> reqwest::ClientBuilder {
    let builder = ClientBuilder::new()
        .connect_timeout(options.connect_timeout)
        .read_timeout(options.read_timeout)
        .user_agent(&options.user_agent)
        .default_headers(get_default_headers())
        .cookie_store(true);

    if options.public_dns {
        builder.dns_resolver(Arc::new(PublicDnsResolver::default()))
    } else {
        builder
    }
}

pub fn get_default_headers() -> HeaderMap {
    let mut headers = HeaderMap::default();

    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers
}
