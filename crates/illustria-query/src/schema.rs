// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::Connection;

use crate::QueryError;

/// Column-shape snapshot of the two tables the query layer touches.
/// Probed once per connection; the schema cannot change under a
/// read-only handle.
#[derive(Debug, Clone)]
pub struct SchemaProbe {
    cities: BTreeSet<String>,
    weather: BTreeSet<String>,
}

impl SchemaProbe {
    pub fn probe(conn: &Connection) -> Result<Self, QueryError> {
        Ok(Self {
            cities: table_columns(conn, "cities")?,
            weather: table_columns(conn, "weather")?,
        })
    }

    #[must_use]
    pub fn cities_has(&self, column: &str) -> bool {
        self.cities.contains(column)
    }

    #[must_use]
    pub fn columns(&self, table: &str) -> &BTreeSet<String> {
        match table {
            "weather" => &self.weather,
            _ => &self.cities,
        }
    }

    /// Fails with [`QueryError::SchemaMismatch`] naming the missing and
    /// present columns when this snapshot generation cannot support a
    /// capability.
    pub fn require(&self, table: &str, columns: &[&str]) -> Result<(), QueryError> {
        let present = self.columns(table);
        let missing: Vec<String> = columns
            .iter()
            .filter(|c| !present.contains(**c))
            .map(|c| (*c).to_string())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(QueryError::SchemaMismatch {
            table: table.to_string(),
            missing,
            present: present.iter().cloned().collect(),
        })
    }
}

// Table names are fixed literals from this crate, never caller input.
fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>, QueryError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    Ok(rows.collect::<Result<BTreeSet<_>, _>>()?)
}

/// Every user table with its columns in declaration order, for the
/// schema introspection endpoint.
pub fn schema_tables(conn: &Connection) -> Result<BTreeMap<String, Vec<String>>, QueryError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut tables = BTreeMap::new();
    for name in names {
        let mut info = conn.prepare(&format!("PRAGMA table_info({name})"))?;
        let columns = info
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        tables.insert(name, columns);
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory");
        conn.execute_batch(
            "CREATE TABLE cities(city_id INTEGER PRIMARY KEY, name TEXT, lat REAL, lon REAL);
             CREATE TABLE weather(city_id INTEGER, slot_index INTEGER);",
        )
        .expect("seed schema");
        conn
    }

    #[test]
    fn probe_reports_columns() {
        let conn = fixture();
        let probe = SchemaProbe::probe(&conn).expect("probe");
        assert!(probe.cities_has("lat"));
        assert!(!probe.cities_has("continent"));
    }

    #[test]
    fn require_names_missing_and_present() {
        let conn = fixture();
        let probe = SchemaProbe::probe(&conn).expect("probe");
        probe.require("cities", &["lat", "lon"]).expect("satisfied");
        let err = probe
            .require("cities", &["continent", "country", "lat"])
            .expect_err("must miss");
        match err {
            QueryError::SchemaMismatch {
                table,
                missing,
                present,
            } => {
                assert_eq!(table, "cities");
                assert_eq!(missing, vec!["continent", "country"]);
                assert!(present.contains(&"lat".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn schema_listing_covers_user_tables() {
        let conn = fixture();
        let tables = schema_tables(&conn).expect("tables");
        assert_eq!(tables.keys().collect::<Vec<_>>(), ["cities", "weather"]);
        assert_eq!(
            tables["weather"],
            vec!["city_id".to_string(), "slot_index".to_string()]
        );
    }
}
