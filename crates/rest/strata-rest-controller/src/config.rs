//! Controller configuration.

use url::Url;

/// Identity of the application the controller serves.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub application_id: String,
    /// Public URL of the server. Its path is the prefix stripped from
    /// incoming request paths.
    pub server_url: Url,
    pub master_key: Option<String>,
}

impl ControllerConfig {
    pub fn new(application_id: impl Into<String>, server_url: Url) -> Self {
        Self {
            application_id: application_id.into(),
            server_url,
            master_key: None,
        }
    }

    pub fn with_master_key(mut self, master_key: impl Into<String>) -> Self {
        self.master_key = Some(master_key.into());
        self
    }

    pub fn with_server_url(mut self, server_url: Url) -> Self {
        self.server_url = server_url;
        self
    }

    /// The server's mount path without a trailing slash; empty when mounted
    /// at the root.
    pub fn mount_path(&self) -> &str {
        self.server_url.path().trim_end_matches('/')
    }

    /// Strip the mount path from `path` and make sure the result starts
    /// with `/`.
    pub fn normalize_path(&self, path: &str) -> String {
        let mount = self.mount_path();
        let stripped = match path.strip_prefix(mount) {
            Some(rest) if !mount.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
            _ => path,
        };
        if stripped.starts_with('/') {
            stripped.to_string()
        } else {
            format!("/{stripped}")
        }
    }
}
