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

use crate::client::{PollutionResponse, WeatherResponse};

pub const LABEL_STATION: &str = "station";
pub const LABEL_MAIN: &str = "main";
pub const LABEL_DESCRIPTION: &str = "description";

const STATION_LABELS: &[&str] = &[LABEL_STATION];
const CONDITION_LABELS: &[&str] = &[LABEL_STATION, LABEL_MAIN, LABEL_DESCRIPTION];

/// Definition of a single metric: name (without the exporter prefix), help text, and
/// the label keys every observation of it carries, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Series {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

impl Series {
    const fn station(name: &'static str, help: &'static str) -> Self {
        Series {
            name,
            help,
            labels: STATION_LABELS,
        }
    }
}

pub const WEATHER_TEMP: Series = Series::station("weather_temp", "Current temperature");
pub const WEATHER_FEELS_LIKE: Series = Series::station("weather_feels_like", "Feels like temperature");
pub const WEATHER_TEMP_MIN: Series = Series::station("weather_temp_min", "Minimum temperature");
pub const WEATHER_TEMP_MAX: Series = Series::station("weather_temp_max", "Maximum temperature");
pub const WEATHER_PRESSURE: Series = Series::station("weather_pressure", "Atmospheric pressure in hPa");
pub const WEATHER_HUMIDITY: Series = Series::station("weather_humidity", "Humidity percentage");
pub const WEATHER_SEA_LEVEL: Series = Series::station("weather_sea_level", "Sea level pressure in hPa");
pub const WEATHER_GROUND_LEVEL: Series = Series::station("weather_grnd_level", "Ground level pressure in hPa");
pub const WEATHER_VISIBILITY: Series = Series::station("weather_visibility", "Visibility in meters");
pub const WEATHER_WIND_SPEED: Series = Series::station("weather_wind_speed", "Wind speed");
pub const WEATHER_WIND_DEG: Series = Series::station("weather_wind_deg", "Wind direction in degrees");
pub const WEATHER_CLOUDS: Series = Series::station("weather_clouds", "Cloud coverage percentage");
pub const WEATHER_CONDITION: Series = Series {
    name: "weather_condition",
    help: "Current weather condition, always 1",
    labels: CONDITION_LABELS,
};

pub const AIR_POLLUTION_AQI: Series = Series::station("air_pollution_aqi", "Air Quality Index (1-5)");
pub const AIR_POLLUTION_CO: Series = Series::station("air_pollution_co", "Carbon monoxide concentration in μg/m³");
pub const AIR_POLLUTION_NO: Series = Series::station("air_pollution_no", "Nitrogen monoxide concentration in μg/m³");
pub const AIR_POLLUTION_NO2: Series = Series::station("air_pollution_no2", "Nitrogen dioxide concentration in μg/m³");
pub const AIR_POLLUTION_O3: Series = Series::station("air_pollution_o3", "Ozone concentration in μg/m³");
pub const AIR_POLLUTION_SO2: Series = Series::station("air_pollution_so2", "Sulphur dioxide concentration in μg/m³");
pub const AIR_POLLUTION_PM2_5: Series = Series::station("air_pollution_pm2_5", "PM2.5 concentration in μg/m³");
pub const AIR_POLLUTION_PM10: Series = Series::station("air_pollution_pm10", "PM10 concentration in μg/m³");
pub const AIR_POLLUTION_NH3: Series = Series::station("air_pollution_nh3", "Ammonia concentration in μg/m³");

/// Label key/value pairs in the order given by the `labels` of their `Series`.
pub type Labels = Vec<(&'static str, String)>;

/// A single value for a series with a particular set of label values.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub series: Series,
    pub labels: Labels,
    pub value: f64,
}

impl Observation {
    fn station(series: Series, station: &str, value: f64) -> Self {
        Observation {
            series,
            labels: vec![(LABEL_STATION, station.to_owned())],
            value,
        }
    }
}

/// Convert a current weather response into observations, all labeled with the station
/// ID of the response. The station ID is returned as well since pollution observations
/// need to use the same label.
///
/// Only the first entry of the list of conditions is used. If there are no conditions,
/// no condition observation is emitted.
pub fn map_weather(weather: &WeatherResponse) -> (String, Vec<Observation>) {
    let station = weather.id.to_string();
    let mut out = vec![
        Observation::station(WEATHER_TEMP, &station, weather.main.temp),
        Observation::station(WEATHER_FEELS_LIKE, &station, weather.main.feels_like),
        Observation::station(WEATHER_TEMP_MIN, &station, weather.main.temp_min),
        Observation::station(WEATHER_TEMP_MAX, &station, weather.main.temp_max),
        Observation::station(WEATHER_PRESSURE, &station, weather.main.pressure),
        Observation::station(WEATHER_HUMIDITY, &station, weather.main.humidity),
        Observation::station(WEATHER_SEA_LEVEL, &station, weather.main.sea_level),
        Observation::station(WEATHER_GROUND_LEVEL, &station, weather.main.ground_level),
        Observation::station(WEATHER_VISIBILITY, &station, weather.visibility),
        Observation::station(WEATHER_WIND_SPEED, &station, weather.wind.speed),
        Observation::station(WEATHER_WIND_DEG, &station, weather.wind.degrees),
        Observation::station(WEATHER_CLOUDS, &station, weather.clouds.coverage),
    ];

    if let Some(condition) = weather.conditions.first() {
        out.push(Observation {
            series: WEATHER_CONDITION,
            labels: vec![
                (LABEL_STATION, station.clone()),
                (LABEL_MAIN, condition.main.clone()),
                (LABEL_DESCRIPTION, condition.description.clone()),
            ],
            value: 1.0,
        });
    }

    (station, out)
}

/// Convert an air pollution response into observations labeled with `station`.
///
/// Only the first entry of the response is used. If there are no entries, no
/// observations are emitted.
pub fn map_pollution(pollution: &PollutionResponse, station: &str) -> Vec<Observation> {
    let entry = match pollution.list.first() {
        Some(e) => e,
        None => return Vec::new(),
    };

    let c = &entry.components;
    vec![
        Observation::station(AIR_POLLUTION_AQI, station, entry.main.aqi as f64),
        Observation::station(AIR_POLLUTION_CO, station, c.co),
        Observation::station(AIR_POLLUTION_NO, station, c.no),
        Observation::station(AIR_POLLUTION_NO2, station, c.no2),
        Observation::station(AIR_POLLUTION_O3, station, c.o3),
        Observation::station(AIR_POLLUTION_SO2, station, c.so2),
        Observation::station(AIR_POLLUTION_PM2_5, station, c.pm2_5),
        Observation::station(AIR_POLLUTION_PM10, station, c.pm10),
        Observation::station(AIR_POLLUTION_NH3, station, c.nh3),
    ]
}
