use crate::error::ConfigurationError;
use crate::fetch::HttpClient;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};

/// An [`HttpClient`] wrapper that injects a credential as an HTTP header.
///
/// Header name and value are validated when the wrapper is built, so a bad
/// token fails configuration instead of every request.
pub struct ApiKey<C> {
    inner: C,
    header_name: HeaderName,
    value: HeaderValue,
}

impl<C> ApiKey<C> {
    pub fn new(inner: C, header_name: &str, value: &str) -> Result<Self, ConfigurationError> {
        let header_name = HeaderName::from_bytes(header_name.as_bytes())
            .map_err(|e| ConfigurationError::Invalid(format!("header name: {e}")))?;
        let mut value = HeaderValue::from_str(value)
            .map_err(|e| ConfigurationError::Invalid(format!("header value: {e}")))?;
        value.set_sensitive(true);
        Ok(Self {
            inner,
            header_name,
            value,
        })
    }

    /// `Authorization: Bearer <token>`, as used for Earthdata login tokens.
    pub fn bearer(inner: C, token: &str) -> Result<Self, ConfigurationError> {
        Self::new(inner, AUTHORIZATION.as_str(), &format!("Bearer {token}"))
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header_name.clone(), self.value.clone());
        self.inner.execute(req).await
    }
}
