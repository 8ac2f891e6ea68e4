use crate::configuration::Configuration;
use clap::Parser;
use tracing::debug;

#[derive(Parser, Debug, Clone)]
#[command(name = "appointment_manager", about = "Appointment booking service")]
pub struct ConfigurationHandler {
    /// Port the http server listens on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// PostgreSQL connection url. Appointments are kept in memory if omitted.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Shared secret the authenticating gateway sends with every request
    #[arg(long, env = "GATEWAY_SECRET", hide_env_values = true)]
    gateway_secret: String,

    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    max_connections: u32,
}

impl ConfigurationHandler {
    pub fn parse_arguments() -> Self {
        if let Err(err) = dotenvy::dotenv() {
            debug!(?err, "No .env file loaded");
        }
        Self::parse()
    }
}

impl Configuration for ConfigurationHandler {
    fn port(&self) -> u16 {
        self.port
    }

    fn database_url(&self) -> Option<String> {
        self.database_url.clone()
    }

    fn gateway_secret(&self) -> String {
        self.gateway_secret.clone()
    }

    fn max_connections(&self) -> u32 {
        self.max_connections
    }
}
