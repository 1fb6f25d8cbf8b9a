use std::time::Duration;

use tdx_core::config::ProviderConfig;
use tdx_core::error::{AppError, ErrorKind};

/// Connection details for an OpenAI-compatible embeddings/completions API.
///
/// Remote endpoints must use `https://`; plain `http://` is accepted only for
/// `127.0.0.1` (local model servers), where the API key may also be empty.
#[derive(Clone)]
pub struct ProviderClient {
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ProviderClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, AppError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let loopback = validate_base_url(&base_url)?;

        if api_key.trim().is_empty() && !loopback {
            return Err(AppError::new(
                ErrorKind::Config,
                "AI_API_KEY_MISSING",
                "provider.api_key is required for remote providers",
            ));
        }

        Ok(Self {
            base_url,
            api_key: api_key.trim().to_string(),
            timeout,
        })
    }

    pub fn from_config(cfg: &ProviderConfig) -> Result<Self, AppError> {
        Self::new(
            &cfg.base_url,
            &cfg.api_key,
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
        code: &str,
    ) -> Result<ureq::Response, AppError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut req = ureq::post(&url).timeout(self.timeout);
        if !self.api_key.is_empty() {
            req = req.set("Authorization", &format!("Bearer {}", self.api_key));
        }
        req.send_json(body).map_err(|e| call_error(e, code))
    }

    /// Lists models; succeeds when the endpoint is reachable and accepts the key.
    pub fn health_check(&self) -> Result<(), AppError> {
        let url = format!("{}/models", self.base_url);
        let mut req = ureq::get(&url).timeout(Duration::from_secs(5));
        if !self.api_key.is_empty() {
            req = req.set("Authorization", &format!("Bearer {}", self.api_key));
        }
        req.call().map(|_| ()).map_err(|e| call_error(e, "AI_PROVIDER_UNHEALTHY"))
    }
}

/// Returns whether the URL points at loopback.
fn validate_base_url(base_url: &str) -> Result<bool, AppError> {
    let reject = |why: &str| {
        AppError::new(ErrorKind::Config, "AI_BASE_URL_INVALID", "Provider base URL is not allowed")
            .with_details(format!("base_url={base_url}; {why}"))
    };

    let (loopback, rest) = if let Some(rest) = base_url.strip_prefix("https://") {
        (false, rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        (true, rest)
    } else {
        return Err(reject("scheme must be https"));
    };

    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() || authority.contains('@') || authority.chars().any(char::is_whitespace) {
        return Err(reject("malformed host"));
    }

    if loopback {
        let port = match authority.strip_prefix("127.0.0.1") {
            Some("") => None,
            Some(p) => match p.strip_prefix(':') {
                Some(p) => Some(p),
                None => return Err(reject("plain http is only allowed for 127.0.0.1")),
            },
            None => return Err(reject("plain http is only allowed for 127.0.0.1")),
        };
        if let Some(p) = port {
            match p.parse::<u16>() {
                Ok(n) if n > 0 => {}
                _ => return Err(reject("invalid port")),
            }
        }
    }

    Ok(loopback)
}

pub(crate) fn call_error(e: ureq::Error, code: &str) -> AppError {
    match e {
        ureq::Error::Status(status, resp) => {
            let body = resp.into_string().unwrap_or_default();
            let body: String = body.chars().take(300).collect();
            let details = format!("status={status}; body={body}");
            match status {
                401 | 403 => AppError::new(
                    ErrorKind::Authentication,
                    code,
                    "Provider rejected the API key",
                )
                .with_details(details),
                400 | 404 | 422 => {
                    AppError::new(ErrorKind::Query, code, "Provider rejected the request")
                        .with_details(details)
                }
                429 | 500..=599 => {
                    AppError::new(ErrorKind::Provider, code, "Provider request failed")
                        .with_details(details)
                        .with_retryable(true)
                }
                _ => AppError::new(ErrorKind::Provider, code, "Provider request failed")
                    .with_details(details),
            }
        }
        ureq::Error::Transport(t) => {
            AppError::new(ErrorKind::Connection, code, "Failed to reach provider")
                .with_details(t.to_string())
                .with_retryable(true)
        }
    }
}
