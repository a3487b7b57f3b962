// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

pub type CityId = i64;

/// One settlement row from the `cities` table.
///
/// Only `city_id` and `name` are guaranteed across snapshot generations.
/// Coordinates are nullable in the data itself (a handful of cities are
/// unplaced), and the geography block (`continent`, `country`, `map_x`,
/// `map_y`) plus the refined elevation only exist in newer generations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub city_id: CityId,
    pub name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub elev_ft: Option<f64>,
    pub trewartha: Option<String>,
    pub biomes: Option<String>,
    pub dist_to_coast_mi: Option<f64>,
    pub relief_100mi_ft: Option<f64>,
    pub terrain_type: Option<String>,
    pub terrain_flavor: Option<String>,
    pub continent: Option<String>,
    pub country: Option<String>,
    pub map_x: Option<f64>,
    pub map_y: Option<f64>,
}

impl City {
    #[must_use]
    pub fn coords(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}
