// openweather_exporter - Prometheus metrics exporter for OpenWeather
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use clap::Parser;
use openweather_exporter::client::{Location, OpenWeatherClient, Units};
use openweather_exporter::collector::{Collector, CollectorMetrics};
use openweather_exporter::http::RequestContext;
use openweather_exporter::registry::MetricRegistry;
use reqwest::Client;
use std::error::Error;
use std::io;
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{self, SignalKind};
use tracing::Level;

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 8080);
const DEFAULT_REFERSH_SECS: u64 = 300;
const DEFAULT_TIMEOUT_MILLIS: u64 = 5000;
const DEFAULT_API_URL: &str = "https://api.openweathermap.org/";

#[derive(Debug, Parser)]
#[clap(name = "openweather_exporter", version = clap::crate_version!())]
struct OpenWeatherExporterApplication {
    /// Latitude of the location to fetch weather and air pollution for
    #[clap(long, env = "LATITUDE", allow_negative_numbers = true)]
    latitude: f64,

    /// Longitude of the location to fetch weather and air pollution for
    #[clap(long, env = "LONGITUDE", allow_negative_numbers = true)]
    longitude: f64,

    /// OpenWeather API key
    #[clap(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Unit system for measurements. Allowed values are 'standard', 'metric', and 'imperial'
    #[clap(long, env = "UNITS", default_value_t = Units::Standard)]
    units: Units,

    /// Base URL for the OpenWeather API
    #[clap(long, env = "OPENWEATHER_API_URL", default_value_t = DEFAULT_API_URL.into())]
    api_url: String,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long, env = "LOG_LEVEL", default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Fetch weather and air pollution from the OpenWeather API at this interval, in seconds.
    #[clap(long, env = "REFRESH_SECS", default_value_t = DEFAULT_REFERSH_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    refresh_secs: u64,

    /// Timeout for each request to the OpenWeather API, in milliseconds.
    #[clap(long, env = "TIMEOUT_MILLIS", default_value_t = DEFAULT_TIMEOUT_MILLIS, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_millis: u64,

    /// Address to bind to. By default, openweather_exporter will bind to public address since
    /// the purpose is to expose metrics to an external system (Prometheus or another
    /// agent for ingestion)
    #[clap(long, env = "EXPORTER_BIND", default_value_t = DEFAULT_BIND_ADDR.into())]
    bind: SocketAddr,

    /// Port to bind to, replacing the port of the bind address if given.
    #[clap(long, env = "EXPORTER_PORT")]
    port: Option<u16>,
}

impl OpenWeatherExporterApplication {
    fn bind_addr(&self) -> SocketAddr {
        let mut addr = self.bind;
        if let Some(port) = self.port {
            addr.set_port(port);
        }

        addr
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // Options may also come from a .env file in the working directory. Variables already
    // set in the environment take precedence over it.
    let dotenv = dotenvy::dotenv();
    let opts = OpenWeatherExporterApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    match dotenv {
        Ok(path) => tracing::debug!(message = "loaded environment file", path = %path.display()),
        Err(e) if e.not_found() => tracing::debug!("no environment file found"),
        Err(e) => tracing::warn!(message = "unable to load environment file", error = %e),
    }

    let timeout = Duration::from_millis(opts.timeout_millis);
    let http_client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize HTTP client", error = %e);
        process::exit(1)
    });

    let location = Location {
        latitude: opts.latitude,
        longitude: opts.longitude,
    };
    let client = OpenWeatherClient::new(http_client, &opts.api_url, location, &opts.api_key, opts.units)
        .unwrap_or_else(|e| {
            tracing::error!(message = "unable to initialize OpenWeather client", error = %e);
            process::exit(1)
        });

    let registry = Arc::new(MetricRegistry::new());
    let metrics = CollectorMetrics::new();
    let collector = Collector::new(client, registry.clone(), metrics.clone());
    let refresh = Duration::from_secs(opts.refresh_secs);

    tracing::info!(
        message = "weather polling started",
        api_url = %opts.api_url,
        latitude = opts.latitude,
        longitude = opts.longitude,
        units = %opts.units,
        refresh_secs = opts.refresh_secs,
    );
    tokio::spawn(collector.run(refresh));

    let context = Arc::new(RequestContext::new(registry, metrics));
    let app = openweather_exporter::http::router(context);
    let bind = opts.bind_addr();
    let server = axum::Server::try_bind(&bind).unwrap_or_else(|e| {
        tracing::error!(message = "error binding to address", address = %bind, error = %e);
        process::exit(1)
    });

    let server = server.serve(app.into_make_service());
    tracing::info!(message = "server started", address = %server.local_addr());

    server
        .with_graceful_shutdown(async {
            // Wait for either SIGTERM or SIGINT to shutdown
            tokio::select! {
                _ = sigterm() => {}
                _ = sigint() => {}
            }
        })
        .await?;

    tracing::info!("server shutdown");
    Ok(())
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> io::Result<()> {
    unix::signal(SignalKind::interrupt())?.recv().await;
    Ok(())
}
