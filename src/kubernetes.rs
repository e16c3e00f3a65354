use reqwest::{Certificate, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const CA_FILE_NAME: &str = "ca.crt";
const PEM_CERT_MARKER: &str = "-----BEGIN CERTIFICATE-----";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid API base URL {0:?}")]
    InvalidBaseUrl(String),
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("request to {path} failed: {source}")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {path} returned status {status}")]
    Status { path: String, status: StatusCode },
    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {path} was cancelled")]
    Cancelled { path: String },
}

impl ApiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled { .. })
    }
}

/// How the client verifies the API server certificate.
pub enum TlsTrust {
    /// The platform's built-in roots.
    System,
    /// Only the given CA bundle.
    CustomCa(Certificate),
    /// No verification. Used when a configured CA bundle cannot be loaded.
    Insecure,
}

impl fmt::Debug for TlsTrust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsTrust::System => f.write_str("System"),
            TlsTrust::CustomCa(_) => f.write_str("CustomCa"),
            TlsTrust::Insecure => f.write_str("Insecure"),
        }
    }
}

impl TlsTrust {
    /// Resolve the trust policy for a CA path. A directory is assumed to contain `ca.crt`.
    /// Any failure to load the bundle degrades to [`TlsTrust::Insecure`].
    pub fn from_ca_path(path: &Path) -> TlsTrust {
        let path: PathBuf = if path.is_dir() {
            info!(
                "supplied path {} is a directory; assuming CA filename is {}",
                path.display(),
                CA_FILE_NAME
            );
            path.join(CA_FILE_NAME)
        } else {
            path.to_path_buf()
        };

        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) => {
                warn!(
                    "failed to read CA bundle {}: {}; API server certificate will NOT be verified",
                    path.display(),
                    e
                );
                return TlsTrust::Insecure;
            }
        };

        if !String::from_utf8_lossy(&bytes).contains(PEM_CERT_MARKER) {
            warn!(
                "CA bundle {} contains no PEM certificate; API server certificate will NOT be verified",
                path.display()
            );
            return TlsTrust::Insecure;
        }

        match Certificate::from_pem(&bytes) {
            Ok(cert) => {
                info!("using CA bundle {}", path.display());
                TlsTrust::CustomCa(cert)
            }
            Err(e) => {
                warn!(
                    "invalid CA bundle {}: {}; API server certificate will NOT be verified",
                    path.display(),
                    e
                );
                TlsTrust::Insecure
            }
        }
    }

    pub fn is_insecure(&self) -> bool {
        matches!(self, TlsTrust::Insecure)
    }
}

pub struct ApiClientBuilder {
    base_url: String,
    token: String,
    timeout: Duration,
    trust: TlsTrust,
}

impl ApiClientBuilder {
    /// Maximum time to wait for a complete response.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Trust the CA bundle found at `path` (file, or directory holding `ca.crt`).
    pub fn ca_path(mut self, path: impl AsRef<Path>) -> Self {
        self.trust = TlsTrust::from_ca_path(path.as_ref());
        self
    }

    pub fn trust(mut self, trust: TlsTrust) -> Self {
        self.trust = trust;
        self
    }

    pub fn build(self) -> Result<ApiClient, ApiError> {
        let mut base = Url::parse(&self.base_url)
            .map_err(|_| ApiError::InvalidBaseUrl(self.base_url.clone()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(self.base_url));
        }
        if let Ok(mut segments) = base.path_segments_mut() {
            segments.pop_if_empty();
        }

        let (http, trust) = match self.trust {
            TlsTrust::CustomCa(cert) => match http_client_builder(self.timeout)
                .tls_built_in_root_certs(false)
                .add_root_certificate(cert)
                .build()
            {
                Ok(client) => (client, "custom CA"),
                Err(e) => {
                    warn!(
                        "CA bundle rejected by TLS backend: {}; API server certificate will NOT be verified",
                        e
                    );
                    (insecure_client(self.timeout)?, "insecure")
                }
            },
            TlsTrust::Insecure => (insecure_client(self.timeout)?, "insecure"),
            TlsTrust::System => (
                http_client_builder(self.timeout).build().map_err(ApiError::Build)?,
                "system roots",
            ),
        };
        debug!("API client for {} using {} TLS trust", base, trust);

        Ok(ApiClient {
            base,
            token: self.token,
            http,
        })
    }
}

fn http_client_builder(timeout: Duration) -> reqwest::ClientBuilder {
    reqwest::Client::builder().timeout(timeout)
}

fn insecure_client(timeout: Duration) -> Result<reqwest::Client, ApiError> {
    http_client_builder(timeout)
        .danger_accept_invalid_certs(true)
        .build()
        .map_err(ApiError::Build)
}

/// Minimal read-only client for the Kubernetes core API.
#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    token: String,
    http: reqwest::Client,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient").field("base", &self.base.as_str()).finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn builder(base_url: impl Into<String>, token: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.into(),
            token: token.into(),
            timeout: DEFAULT_TIMEOUT,
            trust: TlsTrust::System,
        }
    }

    /// URL for `segments` appended to the base path. Segments are percent-encoded.
    pub fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    /// Issue one authenticated GET and decode the JSON body. No retries.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        segments: &[&str],
    ) -> Result<T, ApiError> {
        let url = self.url_for(segments);
        let path = url.path().to_string();

        let request = async {
            let res = self
                .http
                .get(url)
                .bearer_auth(&self.token)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(|source| ApiError::Request { path: path.clone(), source })?;

            let status = res.status();
            if !status.is_success() {
                return Err(ApiError::Status { path: path.clone(), status });
            }
            res.json::<T>()
                .await
                .map_err(|source| ApiError::Decode { path: path.clone(), source })
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled { path: path.clone() }),
            result = request => result,
        }
    }
}
