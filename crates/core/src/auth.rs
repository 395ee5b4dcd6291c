//! Credential attachment for outbound requests

use std::sync::Arc;

use tollgate_domain::{Credential, RequestDescriptor};
use tracing::trace;

use crate::endpoint::{path_matches, target_path};
use crate::ports::TokenStore;

/// Attaches the current bearer credential unless the target is allow-listed
pub struct AuthInterceptor {
    base_url: String,
    bypass_paths: Vec<String>,
    store: Arc<dyn TokenStore>,
}

impl AuthInterceptor {
    pub fn new(
        base_url: impl Into<String>,
        bypass_paths: Vec<String>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self { base_url: base_url.into(), bypass_paths, store }
    }

    /// True when `url` targets an unauthenticated endpoint (login, register,
    /// captcha, token verify/refresh).
    pub fn is_bypassed(&self, url: &str) -> bool {
        let path = target_path(&self.base_url, url);
        self.bypass_paths.iter().any(|pattern| path_matches(&path, pattern))
    }

    /// Set the `Authorization` header from the token store.
    ///
    /// Returns the credential that was attached. Bypassed targets and an
    /// empty store leave the request untouched and return `None`; the server
    /// answers 401 if it needed one.
    pub fn attach(&self, request: &mut RequestDescriptor) -> Option<Credential> {
        if self.is_bypassed(&request.url) {
            trace!(url = %request.url, "auth bypassed for allow-listed endpoint");
            return None;
        }

        let credential = self.store.get()?;
        request.set_authorization(credential.bearer());
        Some(credential)
    }
}
