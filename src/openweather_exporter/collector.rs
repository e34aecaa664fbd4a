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

use crate::client::{ClientError, OpenWeatherClient};
use crate::metrics::{self, Observation};
use crate::registry::MetricRegistry;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue, LabelValueEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::fmt::{self, Write};
use std::future::Future;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, Level};

/// Upstream API a request was made to.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Source {
    Weather,
    Pollution,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Pollution => "pollution",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EncodeLabelValue for Source {
    fn encode(&self, encoder: &mut LabelValueEncoder) -> Result<(), fmt::Error> {
        encoder.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct SourceLabels {
    source: Source,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ErrorLabels {
    source: Source,
    kind: &'static str,
}

/// Metrics about requests made to the upstream APIs.
///
/// Clones share the same underlying values so a clone can be handed to the HTTP
/// server for rendering while the `Collector` updates the original.
#[derive(Debug, Clone, Default)]
pub struct CollectorMetrics {
    requests: Family<SourceLabels, Counter>,
    errors: Family<ErrorLabels, Counter>,
    last_success: Family<SourceLabels, Gauge<f64, AtomicU64>>,
}

impl CollectorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle to each metric with `reg`.
    pub fn register(&self, reg: &mut Registry) {
        reg.register(
            "upstream_requests",
            "Total requests made to the OpenWeather API",
            self.requests.clone(),
        );
        reg.register(
            "upstream_errors",
            "Total failed requests to the OpenWeather API by kind of failure",
            self.errors.clone(),
        );
        reg.register(
            "upstream_last_success_timestamp_seconds",
            "UNIX timestamp of the last successful request to the OpenWeather API",
            self.last_success.clone(),
        );
    }

    pub fn requests(&self, source: Source) -> u64 {
        self.requests.get_or_create(&SourceLabels { source }).get()
    }

    pub fn errors(&self, source: Source, kind: &'static str) -> u64 {
        self.errors.get_or_create(&ErrorLabels { source, kind }).get()
    }

    fn request(&self, source: Source) {
        self.requests.get_or_create(&SourceLabels { source }).inc();
    }

    fn error(&self, source: Source, kind: &'static str) {
        self.errors.get_or_create(&ErrorLabels { source, kind }).inc();
    }

    fn success(&self, source: Source) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        self.last_success.get_or_create(&SourceLabels { source }).set(now);
    }
}

/// How far a single refresh got before finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Both weather and air pollution observations were written.
    Complete,
    /// Weather couldn't be fetched so nothing was written and pollution was skipped.
    WeatherFailed,
    /// Weather observations were written but air pollution couldn't be fetched.
    PollutionFailed,
}

/// Periodically fetch weather and air pollution data and write it to a `MetricRegistry`.
///
/// Air pollution responses don't include a station ID so the ID from the weather
/// response is used for both. When the weather request fails, the air pollution
/// request for that refresh is skipped.
#[derive(Debug)]
pub struct Collector {
    client: OpenWeatherClient,
    registry: Arc<MetricRegistry>,
    metrics: CollectorMetrics,
}

impl Collector {
    pub fn new(client: OpenWeatherClient, registry: Arc<MetricRegistry>, metrics: CollectorMetrics) -> Self {
        Collector {
            client,
            registry,
            metrics,
        }
    }

    /// Refresh immediately and then every `period` until the task is dropped. Refreshes
    /// never overlap: if one takes longer than `period`, missed ticks are skipped.
    ///
    /// # Panics
    ///
    /// If `period` is zero.
    pub async fn run(self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            self.refresh()
                .instrument(tracing::span!(Level::DEBUG, "ow_refresh"))
                .await;
        }
    }

    /// Fetch, map, and write weather and then air pollution observations. Errors are
    /// logged and end the refresh early, observations already written are kept.
    pub async fn refresh(&self) -> RefreshOutcome {
        let weather = match self.fetch(Source::Weather, self.client.weather()).await {
            Ok(w) => w,
            Err(e) => {
                tracing::error!(message = "failed to fetch weather", source = %Source::Weather, error = %e);
                return RefreshOutcome::WeatherFailed;
            }
        };

        let (station, observations) = metrics::map_weather(&weather);
        let written = self.write(observations);
        tracing::info!(
            message = "fetched weather",
            station = %station,
            name = %weather.name,
            observations = written,
        );

        let pollution = match self.fetch(Source::Pollution, self.client.pollution()).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(
                    message = "failed to fetch air pollution",
                    source = %Source::Pollution,
                    station = %station,
                    error = %e,
                );
                return RefreshOutcome::PollutionFailed;
            }
        };

        let written = self.write(metrics::map_pollution(&pollution, &station));
        if written == 0 {
            tracing::warn!(message = "air pollution response contained no entries", station = %station);
        } else {
            tracing::info!(message = "fetched air pollution", station = %station, observations = written);
        }

        RefreshOutcome::Complete
    }

    async fn fetch<T, F>(&self, source: Source, request: F) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        self.metrics.request(source);
        match request.await {
            Ok(v) => {
                self.metrics.success(source);
                Ok(v)
            }
            Err(e) => {
                self.metrics.error(source, e.kind());
                Err(e)
            }
        }
    }

    fn write(&self, observations: Vec<Observation>) -> usize {
        let count = observations.len();
        for obs in observations {
            self.registry.observe(obs);
        }

        count
    }
}
