//! Shared test helpers: scripted Transporters, in-process and over HTTP

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use upa_broker::api::auth::{sign_response, verify_request};
use upa_broker::{create_router, AppState, Broker, BrokerConfig, CallAuth, JobStore, MemoryJobStore};
use upa_core::metadata::operation;
use upa_client::{DirectoryClient, DirectoryEntry, GatewayError, TransporterConnector, TransporterPort};
use upa_core::{
    CallMetadata, CertificateStore, DirectoryFault, JobDecision, JobRequest, JobState, JobView, KeyPair,
    MemoryCertificateStore, SignatureHandler, TransporterFault,
};

// =============================================================================
// Principals
// =============================================================================

pub fn certificates() -> Arc<MemoryCertificateStore> {
    Arc::new(MemoryCertificateStore::new())
}

/// Fresh principal registered in `certs`
pub fn signer(name: &str, certs: &Arc<MemoryCertificateStore>) -> Arc<SignatureHandler> {
    let key = KeyPair::generate(name);
    certs.register(key.certificate());
    let store: Arc<dyn CertificateStore> = certs.clone();
    Arc::new(SignatureHandler::new(key, store))
}

// =============================================================================
// Scripted Transporter
// =============================================================================

/// How a scripted Transporter answers job requests
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Offer at a fixed price
    Quote(i64),
    /// Answer without an offer
    NoOffer,
    /// Answer with a business fault
    Fault,
    /// Never reachable
    Unreachable,
    /// Offer after a delay
    Slow(Duration, i64),
    /// Offer, then fail the confirmation
    ConfirmFails(i64),
    /// Offer for the return trip instead of the route asked
    WrongRoute(i64),
}

#[derive(Debug)]
pub struct MockTransporter {
    name: String,
    behavior: Behavior,
    jobs: Mutex<BTreeMap<String, JobView>>,
    decisions: Mutex<Vec<(String, bool)>>,
    next_job: AtomicU64,
    requests: AtomicUsize,
    status_down: AtomicBool,
}

impl MockTransporter {
    pub fn new(name: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            behavior,
            jobs: Mutex::new(BTreeMap::new()),
            decisions: Mutex::new(Vec::new()),
            next_job: AtomicU64::new(1),
            requests: AtomicUsize::new(0),
            status_down: AtomicBool::new(false),
        })
    }

    /// Number of job requests received
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Every decision received, in order
    pub fn decisions(&self) -> Vec<(String, bool)> {
        self.decisions.lock().unwrap().clone()
    }

    /// Advance a job as if the Transporter were carrying it out
    pub fn set_state(&self, job_id: &str, state: JobState) {
        self.jobs.lock().unwrap().get_mut(job_id).unwrap().state = state;
    }

    /// Make status queries fail as unreachable
    pub fn take_status_down(&self) {
        self.status_down.store(true, Ordering::SeqCst);
    }

    pub fn job_ids(&self) -> Vec<String> {
        self.jobs.lock().unwrap().keys().cloned().collect()
    }

    fn unreachable(&self) -> GatewayError {
        GatewayError::Unreachable {
            transporter: self.name.clone(),
            reason: "connection refused".into(),
        }
    }

    fn quote(&self, origin: &str, destination: &str, price: i64) -> Option<JobView> {
        let id = format!("{}-{}", self.name, self.next_job.fetch_add(1, Ordering::SeqCst));
        let job = JobView {
            company: self.name.clone(),
            id: id.clone(),
            origin: origin.to_string(),
            destination: destination.to_string(),
            price,
            state: JobState::Proposed,
        };
        self.jobs.lock().unwrap().insert(id, job.clone());
        Some(job)
    }
}

#[async_trait]
impl TransporterPort for MockTransporter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self, name: &str) -> upa_client::Result<String> {
        match self.behavior {
            Behavior::Unreachable => Err(self.unreachable()),
            _ => Ok(format!("{}: Hello {} !", self.name, name)),
        }
    }

    async fn request_job(&self, origin: &str, destination: &str, _price: i64) -> upa_client::Result<Option<JobView>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match self.behavior.clone() {
            Behavior::Quote(price) | Behavior::ConfirmFails(price) => Ok(self.quote(origin, destination, price)),
            Behavior::WrongRoute(price) => Ok(self.quote(destination, origin, price)),
            Behavior::NoOffer => Ok(None),
            Behavior::Fault => Err(TransporterFault::BadLocation {
                location: origin.to_string(),
            }
            .into()),
            Behavior::Unreachable => Err(self.unreachable()),
            Behavior::Slow(delay, price) => {
                tokio::time::sleep(delay).await;
                Ok(self.quote(origin, destination, price))
            }
        }
    }

    async fn decide_job(&self, job_id: &str, accept: bool) -> upa_client::Result<JobView> {
        self.decisions.lock().unwrap().push((job_id.to_string(), accept));
        if accept && matches!(self.behavior, Behavior::ConfirmFails(_)) {
            return Err(TransporterFault::BadJob { id: job_id.to_string() }.into());
        }
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| GatewayError::from(TransporterFault::BadJob { id: job_id.to_string() }))?;
        job.state = if accept { JobState::Accepted } else { JobState::Rejected };
        Ok(job.clone())
    }

    async fn job_status(&self, job_id: &str) -> upa_client::Result<Option<JobView>> {
        if self.status_down.load(Ordering::SeqCst) {
            return Err(self.unreachable());
        }
        Ok(self.jobs.lock().unwrap().get(job_id).cloned())
    }

    async fn list_jobs(&self) -> upa_client::Result<Vec<JobView>> {
        Ok(self.jobs.lock().unwrap().values().cloned().collect())
    }

    async fn clear_jobs(&self) -> upa_client::Result<()> {
        self.jobs.lock().unwrap().clear();
        Ok(())
    }
}

// =============================================================================
// Discovery
// =============================================================================

/// Connects discovered names to pre-built scripted Transporters
#[derive(Debug, Default)]
pub struct MockConnector {
    ports: HashMap<String, Arc<MockTransporter>>,
}

impl MockConnector {
    pub fn with(mut self, port: Arc<MockTransporter>) -> Self {
        self.ports.insert(port.name().to_string(), port);
        self
    }
}

impl TransporterConnector for MockConnector {
    fn connect(&self, name: &str) -> Arc<dyn TransporterPort> {
        match self.ports.get(name) {
            Some(port) => port.clone(),
            None => MockTransporter::new(name, Behavior::Unreachable),
        }
    }
}

/// Directory that is always down
#[derive(Debug)]
pub struct DownDirectory;

#[async_trait]
impl DirectoryClient for DownDirectory {
    async fn lookup(&self, _name: &str) -> Result<String, DirectoryFault> {
        Err(DirectoryFault::Unavailable("down".into()))
    }

    async fn bind(&self, _name: &str, _address: &str) -> Result<(), DirectoryFault> {
        Err(DirectoryFault::Unavailable("down".into()))
    }

    async fn unbind(&self, _name: &str) -> Result<(), DirectoryFault> {
        Err(DirectoryFault::Unavailable("down".into()))
    }

    async fn list(&self, _prefix: &str) -> Result<Vec<DirectoryEntry>, DirectoryFault> {
        Err(DirectoryFault::Unavailable("down".into()))
    }
}

// =============================================================================
// Transporter over HTTP
// =============================================================================

/// Serves a scripted Transporter behind the signed call protocol
#[derive(Debug)]
struct FakeTransporter {
    port: Arc<MockTransporter>,
}

struct FaultResponse(GatewayError);

impl IntoResponse for FaultResponse {
    fn into_response(self) -> Response {
        match self.0 {
            GatewayError::Remote(fault) => (StatusCode::BAD_REQUEST, Json(fault)).into_response(),
            other => (StatusCode::INTERNAL_SERVER_ERROR, Json(other.to_string())).into_response(),
        }
    }
}

type Reply<T> = Result<Json<T>, FaultResponse>;

async fn ping(State(t): State<Arc<FakeTransporter>>, Path(name): Path<String>) -> Reply<String> {
    t.port.ping(&name).await.map(Json).map_err(FaultResponse)
}

async fn request_job(State(t): State<Arc<FakeTransporter>>, Json(req): Json<JobRequest>) -> Reply<Option<JobView>> {
    t.port
        .request_job(&req.origin, &req.destination, req.price)
        .await
        .map(Json)
        .map_err(FaultResponse)
}

async fn decide_job(
    State(t): State<Arc<FakeTransporter>>,
    Path(id): Path<String>,
    Json(decision): Json<JobDecision>,
) -> Reply<JobView> {
    t.port.decide_job(&id, decision.accept).await.map(Json).map_err(FaultResponse)
}

async fn job_status(State(t): State<Arc<FakeTransporter>>, Path(id): Path<String>) -> Reply<Option<JobView>> {
    t.port.job_status(&id).await.map(Json).map_err(FaultResponse)
}

async fn list_jobs(State(t): State<Arc<FakeTransporter>>) -> Reply<Vec<JobView>> {
    t.port.list_jobs().await.map(Json).map_err(FaultResponse)
}

async fn clear_jobs(State(t): State<Arc<FakeTransporter>>) -> Reply<()> {
    t.port.clear_jobs().await.map(Json).map_err(FaultResponse)
}

/// Router for a Transporter that authenticates with `auth`
pub fn transporter_router(port: Arc<MockTransporter>, auth: Arc<CallAuth>) -> Router {
    Router::new()
        .route("/v1/ping/{name}", get(ping))
        .route("/v1/jobs/request", post(request_job))
        .route("/v1/jobs/{id}/decision", post(decide_job))
        .route("/v1/jobs/{id}", get(job_status))
        .route("/v1/jobs", get(list_jobs).delete(clear_jobs))
        .route_layer(from_fn_with_state(auth.clone(), verify_request))
        .route_layer(from_fn_with_state(auth, sign_response))
        .with_state(Arc::new(FakeTransporter { port }))
}

/// Serve `router` on an ephemeral local port, returning its base URL
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Serve a scripted Transporter whose calls must be signed and whose
/// replies are signed by `auth`
pub async fn spawn_transporter(port: Arc<MockTransporter>, auth: Arc<CallAuth>) -> String {
    serve(transporter_router(port, auth)).await
}

// =============================================================================
// Broker API
// =============================================================================

pub struct TestApp {
    pub router: Router,
    pub certs: Arc<MemoryCertificateStore>,
    /// A registered client principal
    pub client: Arc<SignatureHandler>,
    pub transporter: Arc<MockTransporter>,
}

/// Broker API over one scripted Transporter quoting 25
pub fn test_app(require_signed_requests: bool) -> TestApp {
    let certs = certificates();
    let broker_signer = signer("UpaBroker", &certs);
    let client = signer("UpaClient", &certs);
    let transporter = MockTransporter::new("UpaTransporter1", Behavior::Quote(25));

    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let broker = Broker::new("UpaBroker", store)
        .with_call_timeout(Duration::from_millis(500))
        .with_transporter(transporter.clone());

    let state = Arc::new(AppState {
        broker: Arc::new(broker),
        auth: Arc::new(CallAuth::new(broker_signer, require_signed_requests)),
        config: BrokerConfig {
            require_signed_requests,
            ..BrokerConfig::default()
        },
    });

    TestApp {
        router: create_router(state),
        certs,
        client,
        transporter,
    }
}

fn request(method: &str, path: &str, body: &Option<Value>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(path);
    match body {
        Some(_) => builder.header("content-type", "application/json"),
        None => builder,
    }
}

fn body_of(body: Option<Value>) -> Body {
    match body {
        Some(value) => Body::from(serde_json::to_vec(&value).unwrap()),
        None => Body::empty(),
    }
}

pub fn unsigned_request(method: &str, path: &str, body: Option<Value>) -> Request<Body> {
    request(method, path, &body).body(body_of(body)).unwrap()
}

/// Metadata `signer` would attach to this call
pub fn sign_call(signer: &SignatureHandler, method: &str, path: &str, body: &Option<Value>) -> CallMetadata {
    signer.sign(&operation(method, path), body.as_ref().unwrap_or(&Value::Null))
}

/// Request carrying `metadata` as headers
pub fn request_with(metadata: &CallMetadata, method: &str, path: &str, body: Option<Value>) -> Request<Body> {
    let builder = metadata
        .iter()
        .fold(request(method, path, &body), |b, (k, v)| b.header(k, v));
    builder.body(body_of(body)).unwrap()
}

pub fn signed_request(signer: &SignatureHandler, method: &str, path: &str, body: Option<Value>) -> Request<Body> {
    let metadata = sign_call(signer, method, path, &body);
    request_with(&metadata, method, path, body)
}

pub fn response_metadata(response: &Response) -> CallMetadata {
    CallMetadata::from_pairs(
        response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str(), v.to_string()))),
    )
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}
