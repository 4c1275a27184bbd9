//! Transporter gateway
//!
//! Client-side proxy for one Transporter service. Every call is signed with
//! the caller's identity, tagged with a correlation id and sent as JSON over
//! HTTP. Responses must carry a valid signature from the Transporter itself.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use upa_core::metadata::{operation, response_operation};
use upa_core::{
    AuthError, CallContext, CallMetadata, JobDecision, JobRequest, JobView, RequestCorrelator,
    SignatureHandler, TransporterFault,
};

use crate::directory::DirectoryClient;
use crate::error::{GatewayError, Result};

// ============================================================================
// Port
// ============================================================================

/// Operations a Transporter service offers
#[async_trait]
pub trait TransporterPort: Send + Sync + Debug {
    /// Name the Transporter is known by
    fn name(&self) -> &str;

    async fn ping(&self, name: &str) -> Result<String>;

    /// Ask for a quote. `None` means the Transporter declines to offer.
    async fn request_job(&self, origin: &str, destination: &str, price: i64) -> Result<Option<JobView>>;

    /// Accept or reject a previously quoted job
    async fn decide_job(&self, job_id: &str, accept: bool) -> Result<JobView>;

    /// Current state of a job, `None` if the Transporter does not know it
    async fn job_status(&self, job_id: &str) -> Result<Option<JobView>>;

    async fn list_jobs(&self) -> Result<Vec<JobView>>;

    async fn clear_jobs(&self) -> Result<()>;
}

// ============================================================================
// Gateway
// ============================================================================

#[derive(Debug)]
enum Endpoint {
    Fixed(String),
    Directory {
        directory: Arc<dyn DirectoryClient>,
        resolved: OnceCell<String>,
    },
}

/// HTTP implementation of [`TransporterPort`]
#[derive(Debug)]
pub struct TransporterGateway {
    name: String,
    endpoint: Endpoint,
    signer: Arc<SignatureHandler>,
    correlator: Arc<RequestCorrelator>,
    http: reqwest::Client,
}

impl TransporterGateway {
    /// Gateway to a Transporter at a known address
    pub fn with_address(
        name: impl Into<String>,
        address: impl Into<String>,
        signer: Arc<SignatureHandler>,
        http: reqwest::Client,
    ) -> Self {
        Self::build(name.into(), Endpoint::Fixed(trim(address.into())), signer, http)
    }

    /// Gateway whose address is looked up in the directory on first use
    pub fn with_directory(
        name: impl Into<String>,
        directory: Arc<dyn DirectoryClient>,
        signer: Arc<SignatureHandler>,
        http: reqwest::Client,
    ) -> Self {
        let endpoint = Endpoint::Directory {
            directory,
            resolved: OnceCell::new(),
        };
        Self::build(name.into(), endpoint, signer, http)
    }

    fn build(name: String, endpoint: Endpoint, signer: Arc<SignatureHandler>, http: reqwest::Client) -> Self {
        Self {
            name,
            endpoint,
            signer,
            correlator: Arc::new(RequestCorrelator::new()),
            http,
        }
    }

    /// Share a correlator with other gateways
    pub fn with_correlator(mut self, correlator: Arc<RequestCorrelator>) -> Self {
        self.correlator = correlator;
        self
    }

    /// Address the gateway talks to, resolving it if needed. Failed lookups
    /// are retried on the next call.
    pub async fn address(&self) -> Result<&str> {
        match &self.endpoint {
            Endpoint::Fixed(address) => Ok(address.as_str()),
            Endpoint::Directory { directory, resolved } => {
                let address = resolved
                    .get_or_try_init(|| async {
                        let address = directory.lookup(&self.name).await?;
                        debug!(transporter = %self.name, address = %address, "Resolved transporter");
                        Ok::<_, upa_core::DirectoryFault>(trim(address))
                    })
                    .await
                    .map_err(|fault| GatewayError::from((self.name.as_str(), fault)))?;
                Ok(address.as_str())
            }
        }
    }

    /// Fresh context for one call
    fn context(&self, operation: &str, body: &Value) -> CallContext {
        let request_id = self.correlator.next_id();
        let metadata = self
            .correlator
            .attach(self.signer.sign(operation, body), &request_id);
        CallContext {
            request_id,
            operation: operation.to_string(),
            metadata,
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: Method, path: &str, body: Option<&impl Serialize>) -> Result<T> {
        let base = self.address().await?;
        let payload = match body {
            Some(body) => serde_json::to_value(body).map_err(|e| GatewayError::protocol(&self.name, e))?,
            None => Value::Null,
        };
        let ctx = self.context(&operation(method.as_str(), path), &payload);

        debug!(
            transporter = %self.name,
            request_id = %ctx.request_id,
            operation = %ctx.operation,
            "Calling transporter"
        );

        let mut request = self.http.request(method, format!("{}{}", base, path));
        for (key, value) in ctx.metadata.iter() {
            request = request.header(key, value);
        }
        if body.is_some() {
            request = request.json(&payload);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::unreachable(&self.name, e))?;
        let status = response.status();
        let metadata = CallMetadata::from_pairs(
            response
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str(), v.to_string()))),
        );
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::unreachable(&self.name, e))?;
        let value: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| GatewayError::protocol(&self.name, e))?
        };

        self.authenticate(&ctx, &metadata, &value).await?;

        if status.is_success() {
            return serde_json::from_value(value).map_err(|e| GatewayError::protocol(&self.name, e));
        }
        match serde_json::from_value::<TransporterFault>(value) {
            Ok(fault) if status.is_client_error() => {
                debug!(transporter = %self.name, request_id = %ctx.request_id, fault = %fault, "Transporter fault");
                Err(fault.into())
            }
            _ => Err(GatewayError::protocol(&self.name, format!("unexpected status {}", status))),
        }
    }

    /// The response must be signed by the Transporter this gateway represents
    /// and bound to the call it answers
    async fn authenticate(&self, ctx: &CallContext, metadata: &CallMetadata, body: &Value) -> Result<()> {
        let binding = ctx.metadata.response_binding().unwrap_or_default();
        let verified = self
            .signer
            .verify(metadata, &response_operation(&ctx.operation, binding), body)
            .await
            .map_err(|e| {
                warn!(transporter = %self.name, request_id = %ctx.request_id, error = %e, "SECURITY: unauthenticated response");
                e
            })?;

        if verified.name != self.name {
            warn!(
                transporter = %self.name,
                sender = %verified.name,
                "SECURITY: response signed by another principal"
            );
            return Err(AuthError::UnexpectedSender {
                expected: self.name.clone(),
                actual: verified.name,
            }
            .into());
        }
        Ok(())
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Builds ports for Transporters discovered by name
pub trait TransporterConnector: Send + Sync + Debug {
    fn connect(&self, name: &str) -> Arc<dyn TransporterPort>;
}

/// Connects to Transporters through [`TransporterGateway`], resolving each
/// address in the directory. All gateways share one HTTP client, signer and
/// correlator.
#[derive(Debug, Clone)]
pub struct GatewayConnector {
    directory: Arc<dyn DirectoryClient>,
    signer: Arc<SignatureHandler>,
    correlator: Arc<RequestCorrelator>,
    http: reqwest::Client,
}

impl GatewayConnector {
    pub fn new(
        directory: Arc<dyn DirectoryClient>,
        signer: Arc<SignatureHandler>,
        correlator: Arc<RequestCorrelator>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            directory,
            signer,
            correlator,
            http,
        }
    }
}

impl TransporterConnector for GatewayConnector {
    fn connect(&self, name: &str) -> Arc<dyn TransporterPort> {
        let gateway = TransporterGateway::with_directory(
            name,
            self.directory.clone(),
            self.signer.clone(),
            self.http.clone(),
        )
        .with_correlator(self.correlator.clone());
        Arc::new(gateway)
    }
}

fn trim(address: String) -> String {
    address.trim_end_matches('/').to_string()
}

/// Bytes kept verbatim in a path segment
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Percent-encode one path segment. Dot segments would be collapsed by URL
/// normalisation and are refused.
fn segment(transporter: &str, value: &str) -> Result<String> {
    if value.is_empty() || value == "." || value == ".." {
        return Err(GatewayError::protocol(transporter, format!("unusable path segment '{}'", value)));
    }
    Ok(utf8_percent_encode(value, SEGMENT).to_string())
}

#[async_trait]
impl TransporterPort for TransporterGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self, name: &str) -> Result<String> {
        let path = format!("/v1/ping/{}", segment(&self.name, name)?);
        self.call(Method::GET, &path, None::<&()>).await
    }

    async fn request_job(&self, origin: &str, destination: &str, price: i64) -> Result<Option<JobView>> {
        let body = JobRequest {
            origin: origin.to_string(),
            destination: destination.to_string(),
            price,
        };
        self.call(Method::POST, "/v1/jobs/request", Some(&body)).await
    }

    async fn decide_job(&self, job_id: &str, accept: bool) -> Result<JobView> {
        let path = format!("/v1/jobs/{}/decision", segment(&self.name, job_id)?);
        self.call(Method::POST, &path, Some(&JobDecision { accept }))
            .await
    }

    async fn job_status(&self, job_id: &str) -> Result<Option<JobView>> {
        let path = format!("/v1/jobs/{}", segment(&self.name, job_id)?);
        self.call(Method::GET, &path, None::<&()>).await
    }

    async fn list_jobs(&self) -> Result<Vec<JobView>> {
        self.call(Method::GET, "/v1/jobs", None::<&()>).await
    }

    async fn clear_jobs(&self) -> Result<()> {
        self.call(Method::DELETE, "/v1/jobs", None::<&()>).await
    }
}
