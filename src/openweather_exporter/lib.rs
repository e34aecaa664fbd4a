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

//! Prometheus metrics exporter for the OpenWeather API
//!
//! ## Features
//!
//! `openweather_exporter` periodically fetches current weather and air pollution information for a
//! particular location using the [OpenWeather API] and emits it as Prometheus metrics. Users must supply
//! coordinates and an API key. The following metrics are emitted, all labeled with the ID of the
//! weather station OpenWeather picked for the coordinates.
//!
//! * `ow_weather_temp{station=$STATION}` - Current temperature.
//! * `ow_weather_feels_like{station=$STATION}` - Feels like temperature.
//! * `ow_weather_temp_min{station=$STATION}` - Minimum temperature.
//! * `ow_weather_temp_max{station=$STATION}` - Maximum temperature.
//! * `ow_weather_pressure{station=$STATION}` - Atmospheric pressure, in hPa.
//! * `ow_weather_humidity{station=$STATION}` - Humidity (0-100).
//! * `ow_weather_sea_level{station=$STATION}` - Sea level pressure, in hPa.
//! * `ow_weather_grnd_level{station=$STATION}` - Ground level pressure, in hPa.
//! * `ow_weather_visibility{station=$STATION}` - Visibility, in meters.
//! * `ow_weather_wind_speed{station=$STATION}` - Wind speed.
//! * `ow_weather_wind_deg{station=$STATION}` - Wind direction, in degrees.
//! * `ow_weather_clouds{station=$STATION}` - Cloud coverage (0-100).
//! * `ow_weather_condition{station=$STATION, main=$MAIN, description=$DESCRIPTION}` - Current condition, always 1.
//! * `ow_air_pollution_aqi{station=$STATION}` - Air Quality Index (1-5).
//! * `ow_air_pollution_{co,no,no2,o3,so2,pm2_5,pm10,nh3}{station=$STATION}` - Concentrations, in μg/m³.
//!
//! Units of temperature and wind speed depend on the `--units` flag (`standard`, `metric`, or
//! `imperial`) and are passed through from the API unchanged.
//!
//! Values are only ever overwritten, never removed. If a request to the API fails, the values from
//! the last successful request continue to be exported. The following metrics can be used to tell
//! when that happens.
//!
//! * `ow_upstream_requests_total{source=$SOURCE}` - Requests made to the API.
//! * `ow_upstream_errors_total{source=$SOURCE, kind=$KIND}` - Failed requests by kind of failure.
//! * `ow_upstream_last_success_timestamp_seconds{source=$SOURCE}` - Time of the last successful request.
//!
//! [OpenWeather API]: https://openweathermap.org/api
//!
//! ## Build
//!
//! `openweather_exporter` is a Rust program and must be built from source using a
//! [Rust toolchain](https://rustup.rs/).
//!
//! ```text
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! All options can be given as flags or environment variables. The free tier of the API allows
//! 1000 calls per day. Each refresh makes two calls so the default refresh interval of five minutes
//! (576 calls per day) stays below that limit.
//!
//! ```text
//! OPENWEATHER_API_KEY=... ./openweather_exporter --latitude 42.36 --longitude -71.06 --units metric
//! ```
//!
//! ### Prometheus
//!
//! Prometheus metrics are exposed on port `8080` at `/metrics`. Once `openweather_exporter`
//! is running, configure scrapes of it by your Prometheus server. Add the host running
//! `openweather_exporter` as a target under the Prometheus `scrape_configs` section as
//! described by the example below.
//!
//! ```yaml
//! # Sample config for Prometheus.
//!
//! global:
//!   scrape_interval:     15s
//!   evaluation_interval: 15s
//!   external_labels:
//!     monitor: 'my_prom'
//!
//! scrape_configs:
//! - job_name: openweather_exporter
//!   static_configs:
//!   - targets: ['example:8080']
//! ```
//!

pub mod client;
pub mod collector;
pub mod http;
pub mod metrics;
pub mod registry;
