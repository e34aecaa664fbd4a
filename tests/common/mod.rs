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

#![allow(dead_code)]

use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use openweather_exporter::client::{Location, OpenWeatherClient, Units};
use openweather_exporter::collector::{Collector, CollectorMetrics};
use openweather_exporter::registry::MetricRegistry;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Reply {
    status: StatusCode,
    body: String,
}

#[derive(Debug)]
struct StubState {
    weather: Reply,
    pollution: Reply,
    weather_delay: Duration,
    weather_calls: usize,
    pollution_calls: usize,
    weather_query: Option<String>,
    pollution_query: Option<String>,
}

/// Stand-in for the OpenWeather API with responses that can be changed between requests.
#[derive(Debug, Clone)]
pub struct StubUpstream {
    state: Arc<Mutex<StubState>>,
    pub addr: SocketAddr,
}

impl StubUpstream {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(StubState {
            weather: Reply {
                status: StatusCode::OK,
                body: weather_body().to_string(),
            },
            pollution: Reply {
                status: StatusCode::OK,
                body: pollution_body().to_string(),
            },
            weather_delay: Duration::ZERO,
            weather_calls: 0,
            pollution_calls: 0,
            weather_query: None,
            pollution_query: None,
        }));

        let app = Router::new()
            .route("/data/2.5/weather", get(weather))
            .route("/data/2.5/air_pollution", get(pollution))
            .with_state(state.clone());

        let server = axum::Server::bind(&"127.0.0.1:0".parse().unwrap()).serve(app.into_make_service());
        let addr = server.local_addr();
        tokio::spawn(server);

        StubUpstream { state, addr }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn set_weather(&self, status: StatusCode, body: impl ToString) {
        self.state.lock().unwrap().weather = Reply {
            status,
            body: body.to_string(),
        };
    }

    pub fn set_pollution(&self, status: StatusCode, body: impl ToString) {
        self.state.lock().unwrap().pollution = Reply {
            status,
            body: body.to_string(),
        };
    }

    /// Wait `delay` before answering each weather request.
    pub fn set_weather_delay(&self, delay: Duration) {
        self.state.lock().unwrap().weather_delay = delay;
    }

    pub fn weather_calls(&self) -> usize {
        self.state.lock().unwrap().weather_calls
    }

    pub fn pollution_calls(&self) -> usize {
        self.state.lock().unwrap().pollution_calls
    }

    pub fn weather_query(&self) -> Option<String> {
        self.state.lock().unwrap().weather_query.clone()
    }

    pub fn pollution_query(&self) -> Option<String> {
        self.state.lock().unwrap().pollution_query.clone()
    }
}

async fn weather(State(state): State<Arc<Mutex<StubState>>>, RawQuery(query): RawQuery) -> (StatusCode, String) {
    let delay = state.lock().unwrap().weather_delay;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mut s = state.lock().unwrap();
    s.weather_calls += 1;
    s.weather_query = query;
    (s.weather.status, s.weather.body.clone())
}

async fn pollution(State(state): State<Arc<Mutex<StubState>>>, RawQuery(query): RawQuery) -> (StatusCode, String) {
    let mut s = state.lock().unwrap();
    s.pollution_calls += 1;
    s.pollution_query = query;
    (s.pollution.status, s.pollution.body.clone())
}

pub fn weather_body() -> Value {
    json!({
        "id": 42,
        "name": "Boston",
        "main": {"temp": 15.5, "humidity": 70},
        "weather": [{"main": "Clouds", "description": "overcast clouds"}],
    })
}

pub fn pollution_body() -> Value {
    json!({
        "list": [{"main": {"aqi": 3}, "components": {"co": 201.9, "pm2_5": 8.9}}],
    })
}

/// Collector pointed at `base_url` along with the registry and metrics it writes to.
pub fn new_collector(base_url: &str) -> (Collector, Arc<MetricRegistry>, CollectorMetrics) {
    collector_with_client(base_url, reqwest::Client::new())
}

/// Like `new_collector` but each request fails once `timeout` has passed.
pub fn new_collector_with_timeout(
    base_url: &str,
    timeout: Duration,
) -> (Collector, Arc<MetricRegistry>, CollectorMetrics) {
    let http = reqwest::Client::builder().timeout(timeout).build().unwrap();
    collector_with_client(base_url, http)
}

fn collector_with_client(base_url: &str, http: reqwest::Client) -> (Collector, Arc<MetricRegistry>, CollectorMetrics) {
    let location = Location {
        latitude: 42.36,
        longitude: -71.06,
    };
    let client = OpenWeatherClient::new(http, base_url, location, "test-key", Units::Metric).unwrap();
    let registry = Arc::new(MetricRegistry::new());
    let metrics = CollectorMetrics::new();
    let collector = Collector::new(client, registry.clone(), metrics.clone());

    (collector, registry, metrics)
}
