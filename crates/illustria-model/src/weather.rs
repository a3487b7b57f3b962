// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// One weather record: what a city looks like during a single
/// time-of-day bucket. Addressed by (city, slot index); slots are
/// read-only and dense within a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSlot {
    pub month: i64,
    pub day: i64,
    pub tod: i64,
    pub condition: Option<String>,
    pub temp_f: Option<f64>,
    pub wind_mph: Option<f64>,
    pub prcp_in: Option<f64>,
    pub cloud_oktas: Option<i64>,
}
