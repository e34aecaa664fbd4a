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

use crate::metrics::{Labels, Observation, Series};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    series: Series,
    labels: Labels,
}

/// Latest value of every series and label set that has been written.
///
/// Entries are never removed. If a later refresh doesn't produce a value for a
/// particular series and label set, the previous value stays visible to scrapes.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    entries: RwLock<BTreeMap<Key, f64>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite the value for `series` with `labels`.
    pub fn set(&self, series: Series, labels: Labels, value: f64) {
        debug_assert!(
            labels.iter().map(|(k, _)| *k).eq(series.labels.iter().copied()),
            "labels {:?} don't match those of series {}",
            labels,
            series.name
        );

        // A panic while holding the lock can't leave a partially written f64 behind
        // so it's fine to keep using the map if the lock was poisoned.
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(Key { series, labels }, value);
    }

    pub fn observe(&self, obs: Observation) {
        self.set(obs.series, obs.labels, obs.value);
    }

    /// Copy every current entry, ordered by series and then labels.
    pub fn snapshot(&self) -> Snapshot {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let samples = entries
            .iter()
            .map(|(k, v)| Sample {
                series: k.series,
                labels: k.labels.clone(),
                value: *v,
            })
            .collect();

        Snapshot { samples }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub series: Series,
    pub labels: Labels,
    pub value: f64,
}

/// Point-in-time copy of all entries of a `MetricRegistry`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    samples: Vec<Sample>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Value of `series` with exactly the given label values, if present.
    pub fn get(&self, series: &Series, label_values: &[&str]) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| &s.series == series && s.labels.iter().map(|(_, v)| v.as_str()).eq(label_values.iter().copied()))
            .map(|s| s.value)
    }
}

impl IntoIterator for Snapshot {
    type Item = Sample;
    type IntoIter = std::vec::IntoIter<Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{LABEL_STATION, WEATHER_HUMIDITY, WEATHER_TEMP};
    use std::sync::Arc;
    use std::thread;

    fn station(id: &str) -> Labels {
        vec![(LABEL_STATION, id.to_owned())]
    }

    #[test]
    fn test_empty() {
        let reg = MetricRegistry::new();
        assert!(reg.snapshot().is_empty());
    }

    #[test]
    fn test_set_overwrites() {
        let reg = MetricRegistry::new();
        reg.set(WEATHER_TEMP, station("42"), 10.0);
        reg.set(WEATHER_TEMP, station("42"), 12.5);

        let snap = reg.snapshot();
        assert_eq!(1, snap.len());
        assert_eq!(Some(12.5), snap.get(&WEATHER_TEMP, &["42"]));
    }

    #[test]
    fn test_distinct_labels() {
        let reg = MetricRegistry::new();
        reg.set(WEATHER_TEMP, station("42"), 10.0);
        reg.set(WEATHER_TEMP, station("43"), 11.0);
        reg.set(WEATHER_HUMIDITY, station("42"), 55.0);

        let snap = reg.snapshot();
        assert_eq!(3, snap.len());
        assert_eq!(Some(10.0), snap.get(&WEATHER_TEMP, &["42"]));
        assert_eq!(Some(11.0), snap.get(&WEATHER_TEMP, &["43"]));
        assert_eq!(Some(55.0), snap.get(&WEATHER_HUMIDITY, &["42"]));
        assert_eq!(None, snap.get(&WEATHER_HUMIDITY, &["43"]));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let reg = MetricRegistry::new();
        reg.set(WEATHER_TEMP, station("42"), 10.0);
        let snap = reg.snapshot();
        reg.set(WEATHER_TEMP, station("42"), 20.0);

        assert_eq!(Some(10.0), snap.get(&WEATHER_TEMP, &["42"]));
        assert_eq!(Some(20.0), reg.snapshot().get(&WEATHER_TEMP, &["42"]));
    }

    #[test]
    fn test_snapshot_ordering() {
        let reg = MetricRegistry::new();
        reg.set(WEATHER_TEMP, station("b"), 1.0);
        reg.set(WEATHER_TEMP, station("a"), 2.0);

        let values: Vec<f64> = reg.snapshot().iter().map(|s| s.value).collect();
        assert_eq!(vec![2.0, 1.0], values);
    }

    #[test]
    fn test_concurrent_set_and_snapshot() {
        let reg = Arc::new(MetricRegistry::new());
        reg.set(WEATHER_TEMP, station("42"), 1.0);

        let writer = {
            let reg = reg.clone();
            thread::spawn(move || {
                for i in 1..=10_000 {
                    reg.set(WEATHER_TEMP, station("42"), i as f64);
                    reg.set(WEATHER_HUMIDITY, station("42"), i as f64);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reg = reg.clone();
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        for sample in reg.snapshot() {
                            assert!(sample.value >= 1.0 && sample.value <= 10_000.0);
                            assert_eq!(sample.value, sample.value.trunc());
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }

        let snap = reg.snapshot();
        assert_eq!(Some(10_000.0), snap.get(&WEATHER_TEMP, &["42"]));
        assert_eq!(Some(10_000.0), snap.get(&WEATHER_HUMIDITY, &["42"]));
    }
}
