use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
};

use hickory_resolver::{
    config::ResolverConfig, name_server::TokioConnectionProvider, Resolver, TokioResolver,
};
use log::debug;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};

/// Resolves host names through Cloudflare's public resolvers instead of the
/// system ones. Several video hosts are blocked at the ISP resolver level.
#[derive(Debug, Default, Clone)]
pub struct PublicDnsResolver {
    state: Arc<OnceLock<TokioResolver>>,
}

impl PublicDnsResolver {
    fn resolver(&self) -> &TokioResolver {
        self.state.get_or_init(|| {
            Resolver::builder_with_config(
                ResolverConfig::cloudflare(),
                TokioConnectionProvider::default(),
            )
            .build()
        })
    }
}

impl Resolve for PublicDnsResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let this = self.clone();

        Box::pin(async move {
            let lookup = this.resolver().lookup_ip(name.as_str()).await?;
            debug!("[dns] resolved {}", name.as_str());

            let addrs: Addrs = Box::new(lookup.into_iter().map(|addr| SocketAddr::new(addr, 0)));

            Ok(addrs)
        })
    }
}
