//! Upstream target resolution for requests no filter claims.

use url::Url;

/// Decides where an unclaimed request goes.
pub trait Redirector: Send + Sync {
    /// Upstream URL (without query) for `domain` + `path`, or `None` to keep
    /// the original target.
    fn resolve(&self, domain: &str, path: &str) -> Option<String>;
}

/// Domains served by the account service, and where they live under the API root.
pub const API_ROOT_SUBDIRECTORIES: [(&str, &str); 5] = [
    ("api.mojang.com", "api/"),
    ("authserver.mojang.com", "authserver/"),
    ("sessionserver.mojang.com", "sessionserver/"),
    ("skins.minecraft.net", "skins/"),
    ("api.minecraftservices.com", "minecraftservices/"),
];

/// Maps the well-known domains onto subdirectories of the configured API root.
#[derive(Debug, Clone)]
pub struct ApiRootRedirector {
    api_root: Url,
}

impl ApiRootRedirector {
    /// `api_root` must end in `/`.
    pub fn new(api_root: Url) -> Self {
        Self { api_root }
    }
}

impl Redirector for ApiRootRedirector {
    fn resolve(&self, domain: &str, path: &str) -> Option<String> {
        let (_, subdirectory) = API_ROOT_SUBDIRECTORIES
            .iter()
            .find(|(d, _)| d.eq_ignore_ascii_case(domain))?;
        Some(format!(
            "{}{}{}",
            self.api_root,
            subdirectory,
            path.strip_prefix('/').unwrap_or(path)
        ))
    }
}
