use std::time::Duration;

use crate::{
    backend::BookingBackend, booking_workflow::BookingWorkflow, configuration::Configuration,
    configuration_handler::ConfigurationHandler, database_interface::DatabaseInterface,
    http::create_app, local_store::LocalStore,
};
use tokio::{net::TcpListener, signal, time::sleep};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod backend;
mod booking_workflow;
mod configuration;
mod configuration_handler;
mod database_interface;
mod error;
mod http;
mod local_store;
mod schema;
#[cfg(test)]
mod testutils;
mod types;

#[derive(Clone)]
pub struct AppState<T: BookingBackend, C: Configuration> {
    booking_workflow: BookingWorkflow<T>,
    configuration: C,
}

impl<T: BookingBackend, C: Configuration> AppState<T, C> {
    pub fn new(backend: T, configuration: C) -> Self {
        Self {
            booking_workflow: BookingWorkflow::new(backend),
            configuration,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting appointment manager");

    let configuration = ConfigurationHandler::parse_arguments();

    let address = format!("0.0.0.0:{}", configuration.port());
    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(?err, "Failed to bind {address}");
            return;
        }
    };
    info!("Accessible at {address}");

    let app = if let Some(database_url) = configuration.database_url() {
        let backend = loop {
            match DatabaseInterface::new(&database_url, configuration.max_connections()) {
                Ok(backend) => {
                    info!("Successfully connected to database");
                    break backend;
                }
                Err(err) if err.is_retryable() => {
                    error!(%err, "Failed to establish database connection. Retry in 1 sec. You may want to restart without a database url (appointments are then kept in memory).");
                    sleep(Duration::from_secs(1)).await;
                }
                Err(err) => {
                    error!(%err, "Database schema could not be migrated, shutting down");
                    return;
                }
            }
        };
        create_app(backend, configuration)
    } else {
        warn!("No database url configured, appointments are kept in memory only");
        create_app(LocalStore::default(), configuration)
    };

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(?err, "Server stopped unexpectedly");
    }
    info!("Appointment manager shut down");
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!(?err, "Failed to listen for shutdown signal, running until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
