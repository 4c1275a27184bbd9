//! The Broker
//!
//! Solicits quotes from every known Transporter, books the cheapest one that
//! fits the client's ceiling, and keeps track of the booked transports.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use upa_client::{DirectoryClient, TransporterConnector, TransporterPort};
use upa_core::{BrokerFault, JobOffer, JobState, JobView, Region, TransportState, TransportView};

use super::selection::{select, Reply, Selection};
use super::validation::{validate_request, Route};
use crate::storage::{JobRecord, JobStore};

/// Default bound on a single Transporter call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Finds Transporters by name prefix in the directory
#[derive(Debug)]
struct Discovery {
    directory: Arc<dyn DirectoryClient>,
    prefix: String,
    connector: Arc<dyn TransporterConnector>,
}

#[derive(Debug)]
pub struct Broker {
    name: String,
    store: Arc<dyn JobStore>,
    transporters: RwLock<BTreeMap<String, Arc<dyn TransporterPort>>>,
    discovery: Option<Discovery>,
    call_timeout: Duration,
    next_id: AtomicU64,
}

impl Broker {
    pub fn new(name: impl Into<String>, store: Arc<dyn JobStore>) -> Self {
        Self {
            name: name.into(),
            store,
            transporters: RwLock::new(BTreeMap::new()),
            discovery: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Add a Transporter known up front
    pub fn with_transporter(self, port: Arc<dyn TransporterPort>) -> Self {
        self.add_transporter(port);
        self
    }

    /// Discover Transporters in `directory` whose names start with `prefix`
    pub fn with_discovery(
        mut self,
        directory: Arc<dyn DirectoryClient>,
        prefix: impl Into<String>,
        connector: Arc<dyn TransporterConnector>,
    ) -> Self {
        self.discovery = Some(Discovery {
            directory,
            prefix: prefix.into(),
            connector,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn add_transporter(&self, port: Arc<dyn TransporterPort>) {
        let mut transporters = self.transporters.write().unwrap_or_else(PoisonError::into_inner);
        info!(transporter = %port.name(), "Added transporter");
        transporters.insert(port.name().to_string(), port);
    }

    /// Names of the Transporters currently known, sorted
    pub fn known_transporters(&self) -> Vec<String> {
        let transporters = self.transporters.read().unwrap_or_else(PoisonError::into_inner);
        transporters.keys().cloned().collect()
    }

    pub async fn transport_count(&self) -> usize {
        self.store.count().await
    }

    fn ports(&self) -> Vec<Arc<dyn TransporterPort>> {
        let transporters = self.transporters.read().unwrap_or_else(PoisonError::into_inner);
        transporters.values().cloned().collect()
    }

    /// Port for a named Transporter, connecting through discovery if needed
    fn port_for(&self, name: &str) -> Option<Arc<dyn TransporterPort>> {
        if let Some(port) = self
            .transporters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Some(port.clone());
        }
        let discovery = self.discovery.as_ref()?;
        let port = discovery.connector.connect(name);
        self.add_transporter(port.clone());
        Some(port)
    }

    /// Pick up Transporters bound in the directory since the last refresh,
    /// returning how many were new. On directory failure the previously
    /// known set is kept.
    pub async fn refresh_transporters(&self) -> Result<usize, BrokerFault> {
        let Some(discovery) = &self.discovery else {
            return Ok(0);
        };
        let entries = discovery.directory.list(&discovery.prefix).await.map_err(|e| {
            warn!(prefix = %discovery.prefix, error = %e, "Transporter discovery failed, using known set");
            BrokerFault::Directory(e)
        })?;

        let mut added = 0;
        for entry in entries {
            let known = self
                .transporters
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(&entry.name);
            if !known {
                self.add_transporter(discovery.connector.connect(&entry.name));
                added += 1;
            }
        }
        Ok(added)
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Book the cheapest transport from `origin` to `destination` priced at
    /// or under `price`, returning the Broker-side transport id.
    pub async fn request_transport(&self, origin: &str, destination: &str, price: i64) -> Result<String, BrokerFault> {
        let route = validate_request(origin, destination, price)?;
        if let Err(fault) = self.refresh_transporters().await {
            // Nobody to ask at all
            if self.ports().is_empty() {
                return Err(fault);
            }
        }

        let replies = self.solicit(&route).await;
        debug!(
            origin = %route.origin,
            destination = %route.destination,
            replies = replies.len(),
            "Solicitation complete"
        );

        let (winner, losers) = match select(replies, route.ceiling) {
            Selection::Chosen { winner, losers } => (winner, losers),
            Selection::NoneQualified { replied, offers } => {
                self.decline(offers).await;
                return Err(if replied {
                    BrokerFault::InvalidPrice { price: route.ceiling }
                } else {
                    BrokerFault::UnavailableTransport {
                        origin: route.origin.to_string(),
                        destination: route.destination.to_string(),
                    }
                });
            }
        };

        let confirmed = self.confirm(&winner).await;
        self.decline(losers).await;
        if !confirmed {
            return Err(BrokerFault::UnavailableTransportPrice { price: winner.price });
        }

        let seq = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = JobRecord {
            id: format!("{}-{}", self.name, seq),
            seq,
            transporter: winner.transporter,
            job_id: winner.job_id,
            origin: route.origin,
            destination: route.destination,
            price: winner.price,
            state: TransportState::Booked,
            created_at: Utc::now(),
        };
        let id = record.id.clone();
        self.store.insert(record).await;

        Ok(id)
    }

    /// Current view of a booked transport. Falls back to the last known state
    /// when the Transporter cannot be asked.
    pub async fn view_transport(&self, id: &str) -> Result<TransportView, BrokerFault> {
        let record = self
            .store
            .get(id)
            .await
            .ok_or_else(|| BrokerFault::UnknownTransport { id: id.to_string() })?;

        let port = self.port_for(&record.transporter);
        Ok(refresh(self.store.clone(), port, self.call_timeout, record).await)
    }

    /// Views of every booked transport, oldest first
    pub async fn list_transports(&self) -> Vec<TransportView> {
        let mut tasks = JoinSet::new();
        for record in self.store.list().await {
            let port = self.port_for(&record.transporter);
            let store = self.store.clone();
            let call_timeout = self.call_timeout;
            tasks.spawn(async move {
                let seq = record.seq;
                (seq, refresh(store, port, call_timeout, record).await)
            });
        }

        let mut views = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(view) => views.push(view),
                Err(e) => warn!(error = %e, "Transport refresh task failed"),
            }
        }
        views.sort_by_key(|(seq, _)| *seq);
        views.into_iter().map(|(_, view)| view).collect()
    }

    /// Forget every booked transport. Transporters are not contacted.
    pub async fn clear_transports(&self) -> usize {
        self.store.clear().await
    }

    /// Greeting followed by one line per known Transporter
    pub async fn ping(&self, name: &str) -> String {
        if let Err(fault) = self.refresh_transporters().await {
            debug!(fault = %fault, "Pinging known transporters only");
        }

        let mut tasks = JoinSet::new();
        for port in self.ports() {
            let caller = self.name.clone();
            let call_timeout = self.call_timeout;
            tasks.spawn(async move {
                let reply = match timeout(call_timeout, port.ping(&caller)).await {
                    Ok(Ok(reply)) => reply,
                    Ok(Err(e)) => {
                        debug!(transporter = %port.name(), error = %e, "Ping failed");
                        format!("{}: unreachable", port.name())
                    }
                    Err(_) => format!("{}: timed out", port.name()),
                };
                (port.name().to_string(), reply)
            });
        }

        let mut replies = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            if let Ok(reply) = joined {
                replies.push(reply);
            }
        }
        replies.sort();

        std::iter::once(format!("Hello {} !", name))
            .chain(replies.into_iter().map(|(_, reply)| reply))
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ========================================================================
    // Transporter calls
    // ========================================================================

    /// Ask every known Transporter for a quote and wait for all of them
    async fn solicit(&self, route: &Route) -> Vec<Reply> {
        let mut tasks = JoinSet::new();
        for port in self.ports() {
            let route = *route;
            let call_timeout = self.call_timeout;

            tasks.spawn(async move {
                let transporter = port.name().to_string();
                let request = port.request_job(route.origin.name(), route.destination.name(), route.ceiling);
                match timeout(call_timeout, request).await {
                    Ok(Ok(Some(job))) if !offer_matches(&job, &transporter, &route) => {
                        warn!(
                            transporter = %transporter,
                            company = %job.company,
                            origin = %job.origin,
                            destination = %job.destination,
                            "SECURITY: offer does not answer the request, ignored"
                        );
                        Reply::Silent { transporter }
                    }
                    Ok(Ok(Some(job))) => {
                        debug!(transporter = %transporter, job_id = %job.id, price = job.price, "Offer received");
                        Reply::Offer(JobOffer::from_view(transporter, &job))
                    }
                    Ok(Ok(None)) => Reply::Declined { transporter },
                    Ok(Err(e)) if e.is_reply() => {
                        debug!(transporter = %transporter, fault = %e, "Transporter refused request");
                        Reply::Declined { transporter }
                    }
                    Ok(Err(e)) => {
                        warn!(transporter = %transporter, error = %e, "No reply from transporter");
                        Reply::Silent { transporter }
                    }
                    Err(_) => {
                        warn!(transporter = %transporter, timeout_ms = call_timeout.as_millis() as u64, "Transporter timed out");
                        Reply::Silent { transporter }
                    }
                }
            });
        }

        let mut replies = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(reply) => replies.push(reply),
                Err(e) => warn!(error = %e, "Solicitation task failed"),
            }
        }
        replies
    }

    /// Accept the winning offer. Not retried.
    async fn confirm(&self, winner: &JobOffer) -> bool {
        let Some(port) = self.port_for(&winner.transporter) else {
            return false;
        };
        match timeout(self.call_timeout, port.decide_job(&winner.job_id, true)).await {
            Ok(Ok(job)) if job.state != JobState::Rejected => {
                info!(
                    transporter = %winner.transporter,
                    job_id = %winner.job_id,
                    price = winner.price,
                    "Offer confirmed"
                );
                true
            }
            Ok(Ok(_)) => {
                warn!(transporter = %winner.transporter, job_id = %winner.job_id, "Confirmation answered with rejection");
                false
            }
            Ok(Err(e)) => {
                warn!(transporter = %winner.transporter, job_id = %winner.job_id, error = %e, "Confirmation failed");
                false
            }
            Err(_) => {
                warn!(transporter = %winner.transporter, job_id = %winner.job_id, "Confirmation timed out");
                false
            }
        }
    }

    /// Reject offers that were not taken. Failures are only logged.
    async fn decline(&self, offers: Vec<JobOffer>) {
        let mut tasks = JoinSet::new();
        for offer in offers {
            let Some(port) = self.port_for(&offer.transporter) else {
                continue;
            };
            let call_timeout = self.call_timeout;
            tasks.spawn(async move {
                match timeout(call_timeout, port.decide_job(&offer.job_id, false)).await {
                    Ok(Ok(_)) => debug!(transporter = %offer.transporter, job_id = %offer.job_id, "Offer declined"),
                    Ok(Err(e)) => warn!(transporter = %offer.transporter, job_id = %offer.job_id, error = %e, "Decline failed"),
                    Err(_) => warn!(transporter = %offer.transporter, job_id = %offer.job_id, "Decline timed out"),
                }
            });
        }
        while tasks.join_next().await.is_some() {}
    }
}

/// Ask the owning Transporter for the job state and update the cached copy.
/// Any failure leaves the cached state as the answer.
async fn refresh(
    store: Arc<dyn JobStore>,
    port: Option<Arc<dyn TransporterPort>>,
    call_timeout: Duration,
    record: JobRecord,
) -> TransportView {
    let Some(port) = port else {
        return record.view();
    };

    match timeout(call_timeout, port.job_status(&record.job_id)).await {
        Ok(Ok(Some(job))) => {
            let state = TransportState::from(job.state);
            store.update_state(&record.id, state).await;
            TransportView {
                state,
                ..record.view()
            }
        }
        Ok(Ok(None)) => {
            debug!(id = %record.id, job_id = %record.job_id, "Job unknown at transporter, using cached state");
            record.view()
        }
        Ok(Err(e)) => {
            warn!(id = %record.id, transporter = %record.transporter, error = %e, "Status refresh failed, using cached state");
            record.view()
        }
        Err(_) => {
            warn!(id = %record.id, transporter = %record.transporter, "Status refresh timed out, using cached state");
            record.view()
        }
    }
}

/// An offer must come from the Transporter asked, for the route asked
fn offer_matches(job: &JobView, transporter: &str, route: &Route) -> bool {
    job.company == transporter
        && job.origin.parse::<Region>().ok() == Some(route.origin)
        && job.destination.parse::<Region>().ok() == Some(route.destination)
}
