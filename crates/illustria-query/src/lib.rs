#![forbid(unsafe_code)]
//! Query layer over the Illustria snapshot.
//!
//! Every statement here adapts to the schema the live snapshot actually
//! has: optional columns are projected as NULL when absent, and
//! capabilities that need missing columns fail with a machine-readable
//! [`QueryError::SchemaMismatch`] instead of a raw SQL error. Table and
//! column identifiers only ever come from this crate's fixed lists;
//! caller input is always a bound parameter.

use std::fmt::{Display, Formatter};

mod cities;
mod forecast;
mod geo;
mod schema;

pub use cities::{
    city_by_id, clamp_limit, clamp_offset, continent_counts, country_counts, escape_like,
    list_cities, nearest_city, nearest_city_planar, CityListPage, CityListRequest, GroupCount,
    NearestCity,
};
pub use forecast::forecast_slots;
pub use geo::{haversine_miles, EARTH_RADIUS_MI};
pub use schema::{schema_tables, SchemaProbe};

pub const CRATE_NAME: &str = "illustria-query";

/// Hard pagination bounds, applied regardless of caller-supplied values.
pub const MAX_PAGE_SIZE: i64 = 5000;
pub const DEFAULT_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The current snapshot generation lacks columns this capability
    /// needs. Carries enough to self-diagnose without shell access.
    SchemaMismatch {
        table: String,
        missing: Vec<String>,
        present: Vec<String>,
    },
    Sql(String),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SchemaMismatch { table, missing, .. } => write!(
                f,
                "snapshot table {table} is missing columns: {}",
                missing.join(", ")
            ),
            Self::Sql(detail) => write!(f, "sql error: {detail}"),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<rusqlite::Error> for QueryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value.to_string())
    }
}
