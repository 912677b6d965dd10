use std::sync::OnceLock;

use crate::{
    errors::Result,
    extractors::{ExtractorRegistry, HostRequest},
    models::{ManifestResolution, UnpackedPayload},
    resolver::ManifestResolver,
    utils::{
        fetch::Headers,
        unpack::{packerjs, PackedScript},
    },
};

fn default_resolver() -> &'static ManifestResolver {
    static RESOLVER: OnceLock<ManifestResolver> = OnceLock::new();
    RESOLVER.get_or_init(ManifestResolver::default)
}

fn default_registry() -> &'static ExtractorRegistry {
    static REGISTRY: OnceLock<ExtractorRegistry> = OnceLock::new();
    REGISTRY.get_or_init(ExtractorRegistry::builtin)
}

pub fn detect_packed(script: String) -> bool {
    PackedScript::from(script.as_str()).detect()
}

pub fn unpack_script(script: String) -> Option<String> {
    packerjs::unpack_and_combine(&script)
}

pub fn unpack_payloads(script: String) -> Vec<UnpackedPayload> {
    packerjs::unpack_payloads(&script).collect()
}

pub fn find_host(url: String) -> Option<String> {
    default_registry().find(&url).map(str::to_owned)
}

pub async fn resolve_manifest(url: String, headers: Headers) -> Result<ManifestResolution> {
    default_resolver().resolve_direct_manifest(&url, &headers).await
}

pub async fn resolve_host(
    url: String,
    referer: Option<String>,
    prefix: Option<String>,
) -> Result<ManifestResolution> {
    let request = HostRequest {
        url,
        referer,
        prefix,
    };
    default_registry().resolve(default_resolver(), &request).await
}

pub async fn resolve_hosts(requests: Vec<HostRequest>) -> Vec<ManifestResolution> {
    default_registry()
        .resolve_all(default_resolver(), &requests)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_unpack_through_api() {
        let script = "eval(function(p,a,c,k,e,d){return p}('0 1=5;2(1)',36,3,'var|x|alert'.split('|')))";

        assert!(detect_packed(script.to_owned()));
        assert_eq!(unpack_script(script.to_owned()).as_deref(), Some("var x=5;alert(x)"));
        assert_eq!(unpack_payloads(script.to_owned())[0].symbol_count, 3);
    }

    #[test]
    fn should_find_host() {
        assert_eq!(find_host("https://mixdrop.ps/e/1".into()).as_deref(), Some("mixdrop"));
        assert_eq!(find_host("not a url".into()), None);
    }
}
