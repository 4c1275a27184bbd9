//! UPA Broker Server Binary
//!
//! Runs the Broker HTTP server and registers it in the directory.

use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use upa_broker::{create_router, AppState, Broker, BrokerConfig, CallAuth, JobStore, MemoryJobStore};
use upa_client::{DirectoryClient, GatewayConnector, HttpDirectory};
use upa_core::certs::load_key_pair;
use upa_core::{CertificateStore, FileCertificateStore, SignatureConfig, SignatureHandler};

#[tokio::main]
async fn main() {
    let config = BrokerConfig::from_env().expect("Invalid broker configuration");

    // Initialize logging
    let log_level = config.log_level.parse().unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    // Identity: our private key plus the certificates of every principal
    let identity = load_key_pair(&config.keys_dir, &config.name)
        .await
        .expect("Failed to load broker key pair");
    let certificates: Arc<dyn CertificateStore> = Arc::new(FileCertificateStore::new(&config.keys_dir));
    let signer = Arc::new(SignatureHandler::with_config(
        identity,
        certificates,
        SignatureConfig {
            freshness: config.nonce_window,
            ..SignatureConfig::default()
        },
    ));
    let auth = Arc::new(CallAuth::new(signer.clone(), config.require_signed_requests));

    let http = reqwest::Client::builder()
        .timeout(config.call_timeout)
        .build()
        .expect("Failed to build HTTP client");

    // Initialize storage
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());

    let mut broker = Broker::new(&config.name, store).with_call_timeout(config.call_timeout);

    let directory: Option<Arc<dyn DirectoryClient>> = config
        .directory_url
        .as_ref()
        .map(|url| Arc::new(HttpDirectory::new(url, http.clone())) as Arc<dyn DirectoryClient>);

    if let Some(directory) = &directory {
        let connector = GatewayConnector::new(
            directory.clone(),
            signer.clone(),
            auth.correlator.clone(),
            http.clone(),
        );
        broker = broker.with_discovery(directory.clone(), &config.transporter_prefix, Arc::new(connector));
    } else {
        warn!("UPA_DIRECTORY_URL not set, no transporters will be discovered");
    }

    info!(
        name = %config.name,
        port = config.port,
        directory = ?config.directory_url,
        require_signed_requests = config.require_signed_requests,
        "Starting Broker server"
    );

    // Create application state
    let state = Arc::new(AppState {
        broker: Arc::new(broker),
        auth,
        config: config.clone(),
    });

    // Build router
    let app = create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    if let Some(directory) = &directory {
        if let Err(e) = directory.bind(&config.name, &config.public_url).await {
            warn!(error = %e, "Failed to bind broker in directory");
        }
    }

    info!(addr = %addr, public_url = %config.public_url, "Broker listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
        .expect("Server error");

    if let Some(directory) = &directory {
        if let Err(e) = directory.unbind(&config.name).await {
            warn!(error = %e, "Failed to unbind broker from directory");
        }
    }

    info!("Broker stopped");
}
