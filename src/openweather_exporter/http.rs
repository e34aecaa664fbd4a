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

use crate::collector::CollectorMetrics;
use crate::metrics::Series;
use crate::registry::{MetricRegistry, Snapshot};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabelValue, LabelValueEncoder};
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const METRIC_PREFIX: &str = "ow";
const OPENMETRICS_TEXT: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";
const INDEX_PAGE: &str = r#"<html>
<head><title>OpenWeather Exporter</title></head>
<body>
<h1>OpenWeather Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
</body>
</html>
"#;

/// Everything needed to render metrics in response to a scrape.
#[derive(Debug)]
pub struct RequestContext {
    registry: Arc<MetricRegistry>,
    metrics: CollectorMetrics,
}

impl RequestContext {
    pub fn new(registry: Arc<MetricRegistry>, metrics: CollectorMetrics) -> Self {
        RequestContext { registry, metrics }
    }

    /// Render a fresh snapshot of the registry in the text exposition format.
    pub fn render(&self) -> Result<String, fmt::Error> {
        render(self.registry.snapshot(), &self.metrics)
    }
}

/// Label value escaped per the text exposition format. Values like the weather
/// description come straight from the API and may contain any character.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct EscapedValue(String);

impl EncodeLabelValue for EscapedValue {
    fn encode(&self, encoder: &mut LabelValueEncoder) -> Result<(), fmt::Error> {
        for c in self.0.chars() {
            match c {
                '\\' => encoder.write_str("\\\\")?,
                '"' => encoder.write_str("\\\"")?,
                '\n' => encoder.write_str("\\n")?,
                _ => encoder.write_char(c)?,
            }
        }

        Ok(())
    }
}

type EscapedLabels = Vec<(&'static str, EscapedValue)>;

/// Encode every sample of `snapshot` as a gauge, along with `metrics`.
pub fn render(snapshot: Snapshot, metrics: &CollectorMetrics) -> Result<String, fmt::Error> {
    let mut families: BTreeMap<Series, Family<EscapedLabels, Gauge<f64, AtomicU64>>> = BTreeMap::new();
    for sample in snapshot {
        let labels: EscapedLabels = sample
            .labels
            .into_iter()
            .map(|(k, v)| (k, EscapedValue(v)))
            .collect();

        families
            .entry(sample.series)
            .or_default()
            .get_or_create(&labels)
            .set(sample.value);
    }

    let mut reg = Registry::with_prefix(METRIC_PREFIX);
    for (series, family) in families {
        reg.register(series.name, series.help, family);
    }
    metrics.register(&mut reg);

    let mut buf = String::new();
    encode(&mut buf, &reg)?;
    Ok(buf)
}

/// Build the router serving `/metrics` and a landing page at `/`.
pub fn router(context: Arc<RequestContext>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/metrics", get(text_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

async fn text_metrics(State(context): State<Arc<RequestContext>>) -> Response {
    match context.render() {
        Ok(buf) => {
            tracing::debug!(message = "encoded metrics to text format", num_bytes = buf.len());
            ([(CONTENT_TYPE, OPENMETRICS_TEXT)], buf).into_response()
        }
        Err(e) => {
            tracing::error!(message = "error encoding metrics", error = %e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{AIR_POLLUTION_CO, LABEL_DESCRIPTION, LABEL_MAIN, LABEL_STATION, WEATHER_CONDITION, WEATHER_TEMP};

    #[test]
    fn test_render_empty() {
        let buf = render(Snapshot::default(), &CollectorMetrics::new()).unwrap();

        assert!(!buf.contains("ow_weather_"));
        assert!(buf.ends_with("# EOF\n"));
    }

    #[test]
    fn test_render_observations() {
        let registry = MetricRegistry::new();
        registry.set(WEATHER_TEMP, vec![(LABEL_STATION, "42".to_owned())], 15.5);
        registry.set(AIR_POLLUTION_CO, vec![(LABEL_STATION, "42".to_owned())], 201.9);
        registry.set(
            WEATHER_CONDITION,
            vec![
                (LABEL_STATION, "42".to_owned()),
                (LABEL_MAIN, "Clouds".to_owned()),
                (LABEL_DESCRIPTION, "overcast clouds".to_owned()),
            ],
            1.0,
        );

        let context = RequestContext::new(Arc::new(registry), CollectorMetrics::new());
        let buf = context.render().unwrap();

        assert!(buf.contains("# HELP ow_weather_temp Current temperature"));
        assert!(buf.contains("# TYPE ow_weather_temp gauge"));
        assert!(buf.contains("ow_weather_temp{station=\"42\"} 15.5"));
        assert!(buf.contains("ow_air_pollution_co{station=\"42\"} 201.9"));
        assert!(buf.contains("ow_weather_condition{station=\"42\",main=\"Clouds\",description=\"overcast clouds\"} 1"));
    }

    #[test]
    fn test_render_reflects_latest_write() {
        let registry = Arc::new(MetricRegistry::new());
        let context = RequestContext::new(registry.clone(), CollectorMetrics::new());

        registry.set(WEATHER_TEMP, vec![(LABEL_STATION, "42".to_owned())], 10.5);
        assert!(context.render().unwrap().contains("ow_weather_temp{station=\"42\"} 10.5"));

        registry.set(WEATHER_TEMP, vec![(LABEL_STATION, "42".to_owned())], 11.5);
        let buf = context.render().unwrap();
        assert!(buf.contains("ow_weather_temp{station=\"42\"} 11.5"));
        assert!(!buf.contains("10.5"));
    }

    #[test]
    fn test_render_escapes_label_values() {
        let registry = MetricRegistry::new();
        registry.set(
            WEATHER_CONDITION,
            vec![
                (LABEL_STATION, "42".to_owned()),
                (LABEL_MAIN, "Odd\\Weather".to_owned()),
                (LABEL_DESCRIPTION, "a \"quoted\"\nline".to_owned()),
            ],
            1.0,
        );

        let context = RequestContext::new(Arc::new(registry), CollectorMetrics::new());
        let buf = context.render().unwrap();

        assert!(buf.contains(
            "ow_weather_condition{station=\"42\",main=\"Odd\\\\Weather\",description=\"a \\\"quoted\\\"\\nline\"} 1"
        ));
        assert!(buf.lines().all(|l| l.starts_with('#') || l.starts_with("ow_")));
    }
}
