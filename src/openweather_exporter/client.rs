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

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::error;
use std::fmt;
use std::str::FromStr;

const PARAM_API_KEY: &str = "appid";
const REDACTED: &str = "REDACTED";

#[derive(Debug)]
pub enum ClientError {
    InvalidUrl(String),
    Transport(reqwest::Error),
    Status(StatusCode, String),
    Decode(serde_json::Error),
}

impl ClientError {
    /// Short name of the kind of failure, suitable for use as a label value.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "url",
            Self::Transport(_) => "transport",
            Self::Status(_, _) => "status",
            Self::Decode(_) => "decode",
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl(u) => write!(f, "invalid URL {}", u),
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Status(status, url) => write!(f, "unexpected status {} for {}", status, url),
            Self::Decode(e) => write!(f, "unable to decode response: {}", e),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Decode(e) => Some(e),
            _ => None,
        }
    }
}

/// Unit system the OpenWeather API reports measurements in.
///
/// Values are passed through to metrics unchanged so the chosen system determines
/// the units of temperature and wind speed metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    #[default]
    Standard,
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitsParseError(String);

impl fmt::Display for UnitsParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid units '{}', must be one of 'standard', 'metric', or 'imperial'",
            self.0
        )
    }
}

impl error::Error for UnitsParseError {}

impl FromStr for Units {
    type Err = UnitsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            _ => Err(UnitsParseError(s.to_owned())),
        }
    }
}

/// Latitude and longitude to fetch weather and air pollution data for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Client for the current weather and air pollution endpoints of the OpenWeather API.
///
/// Both request URLs (including the API key) are built once at construction. Each
/// fetch is a single GET request with no retries. Timeouts are whatever the provided
/// `reqwest::Client` was configured with.
#[derive(Debug)]
pub struct OpenWeatherClient {
    client: Client,
    weather_url: Url,
    pollution_url: Url,
}

impl OpenWeatherClient {
    const USER_AGENT: &'static str = "OpenWeather Prometheus Exporter";
    const JSON_RESPONSE: &'static str = "application/json";

    pub fn new(
        client: Client,
        base_url: &str,
        location: Location,
        api_key: &str,
        units: Units,
    ) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let mut weather_url = endpoint_url(&base_url, "weather")?;
        weather_url
            .query_pairs_mut()
            .append_pair("lat", &location.latitude.to_string())
            .append_pair("lon", &location.longitude.to_string())
            .append_pair(PARAM_API_KEY, api_key)
            .append_pair("units", units.as_str());

        let mut pollution_url = endpoint_url(&base_url, "air_pollution")?;
        pollution_url
            .query_pairs_mut()
            .append_pair("lat", &location.latitude.to_string())
            .append_pair("lon", &location.longitude.to_string())
            .append_pair(PARAM_API_KEY, api_key);

        Ok(OpenWeatherClient {
            client,
            weather_url,
            pollution_url,
        })
    }

    pub fn weather_url(&self) -> &Url {
        &self.weather_url
    }

    pub fn pollution_url(&self) -> &Url {
        &self.pollution_url
    }

    pub async fn weather(&self) -> Result<WeatherResponse, ClientError> {
        self.fetch(&self.weather_url).await
    }

    pub async fn pollution(&self) -> Result<PollutionResponse, ClientError> {
        self.fetch(&self.pollution_url).await
    }

    /// Make a GET request to `url` and decode the JSON body as `T`.
    pub async fn fetch<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ClientError> {
        let display_url = redact(url);
        tracing::debug!(message = "making upstream request", url = %display_url);

        // Errors from reqwest include the full URL by default which contains the API key.
        let res = self
            .client
            .get(url.clone())
            .header(USER_AGENT, Self::USER_AGENT)
            .header(ACCEPT, Self::JSON_RESPONSE)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.without_url()))?;

        let status = res.status();
        if !status.is_success() {
            return Err(ClientError::Status(status, display_url));
        }

        let body = res
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(e.without_url()))?;
        serde_json::from_slice(&body).map_err(ClientError::Decode)
    }
}

fn endpoint_url(base: &Url, endpoint: &str) -> Result<Url, ClientError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map(|mut p| {
            p.pop_if_empty().extend(["data", "2.5", endpoint]);
        })
        .map_err(|_| ClientError::InvalidUrl(base.to_string()))?;

    Ok(url)
}

/// Render `url` with the API key replaced so that it can be logged.
pub fn redact(url: &Url) -> String {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == PARAM_API_KEY {
                REDACTED.to_owned()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();

    let mut redacted = url.clone();
    if !pairs.is_empty() {
        redacted.query_pairs_mut().clear().extend_pairs(pairs);
    }

    redacted.to_string()
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Coordinates {
    pub lon: f64,
    pub lat: f64,
}

/// Response from the `/data/2.5/weather` endpoint.
///
/// Missing fields are set to their default value, unknown fields are ignored.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct WeatherResponse {
    pub coord: Coordinates,
    #[serde(alias = "weather")]
    pub conditions: Vec<Condition>,
    pub base: String,
    pub main: WeatherMain,
    pub visibility: f64,
    pub wind: Wind,
    pub clouds: Clouds,
    pub dt: i64,
    pub sys: WeatherSystem,
    pub timezone: i64,
    pub id: i64,
    pub name: String,
    pub cod: i64,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Condition {
    pub id: i64,
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct WeatherMain {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub sea_level: f64,
    #[serde(alias = "grnd_level")]
    pub ground_level: f64,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Wind {
    pub speed: f64,
    #[serde(alias = "deg")]
    pub degrees: f64,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Clouds {
    #[serde(alias = "all")]
    pub coverage: f64,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct WeatherSystem {
    #[serde(alias = "type")]
    pub type_: i64,
    pub id: i64,
    pub country: String,
    pub sunrise: i64,
    pub sunset: i64,
}

/// Response from the `/data/2.5/air_pollution` endpoint.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct PollutionResponse {
    pub coord: Coordinates,
    pub list: Vec<PollutionEntry>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct PollutionEntry {
    pub main: AirQuality,
    pub components: Components,
    pub dt: i64,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct AirQuality {
    pub aqi: i64,
}

/// Pollutant concentrations, in μg/m³.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Components {
    pub co: f64,
    pub no: f64,
    pub no2: f64,
    pub o3: f64,
    pub so2: f64,
    pub pm2_5: f64,
    pub pm10: f64,
    pub nh3: f64,
}
