// SPDX-License-Identifier: Apache-2.0

use illustria_model::City;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;

use crate::geo::haversine_miles;
use crate::schema::SchemaProbe;
use crate::{QueryError, MAX_PAGE_SIZE};

/// Optional `cities` columns projected as themselves when present and
/// `NULL AS <name>` otherwise, keeping row decoding positionally stable
/// across snapshot generations.
const OPTIONAL_CITY_COLUMNS: [&str; 12] = [
    "lat",
    "lon",
    "trewartha",
    "biomes",
    "dist_to_coast_mi",
    "relief_100mi_ft",
    "terrain_type",
    "terrain_flavor",
    "continent",
    "country",
    "map_x",
    "map_y",
];

fn city_projection(probe: &SchemaProbe) -> String {
    let mut cols: Vec<String> = vec!["city_id".to_string(), "name".to_string()];
    // Prefer the refined elevation over the noisy raw value when a
    // generation carries both.
    if probe.cities_has("elev_ft_refined") {
        cols.push("elev_ft_refined AS elev_ft".to_string());
    } else if probe.cities_has("elev_ft") {
        cols.push("elev_ft".to_string());
    } else {
        cols.push("NULL AS elev_ft".to_string());
    }
    for name in OPTIONAL_CITY_COLUMNS {
        if probe.cities_has(name) {
            cols.push(name.to_string());
        } else {
            cols.push(format!("NULL AS {name}"));
        }
    }
    cols.join(", ")
}

fn city_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<City> {
    Ok(City {
        city_id: row.get("city_id")?,
        name: row.get("name")?,
        lat: row.get("lat")?,
        lon: row.get("lon")?,
        elev_ft: row.get("elev_ft")?,
        trewartha: row.get("trewartha")?,
        biomes: row.get("biomes")?,
        dist_to_coast_mi: row.get("dist_to_coast_mi")?,
        relief_100mi_ft: row.get("relief_100mi_ft")?,
        terrain_type: row.get("terrain_type")?,
        terrain_flavor: row.get("terrain_flavor")?,
        continent: row.get("continent")?,
        country: row.get("country")?,
        map_x: row.get("map_x")?,
        map_y: row.get("map_y")?,
    })
}

pub fn city_by_id(
    conn: &Connection,
    probe: &SchemaProbe,
    city_id: i64,
) -> Result<Option<City>, QueryError> {
    let sql = format!(
        "SELECT {} FROM cities WHERE city_id = ?1",
        city_projection(probe)
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    match stmt.query_row(params![city_id], city_from_row) {
        Ok(city) => Ok(Some(city)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NearestCity {
    #[serde(flatten)]
    pub city: City,
    pub distance_mi: f64,
}

/// Linear scan over every coordinate-bearing city; no spatial index.
/// City counts are thousands, not millions. Ties keep the first row in
/// storage order.
pub fn nearest_city(
    conn: &Connection,
    probe: &SchemaProbe,
    lat: f64,
    lon: f64,
) -> Result<Option<NearestCity>, QueryError> {
    probe.require("cities", &["lat", "lon"])?;
    let sql = format!(
        "SELECT {} FROM cities WHERE lat IS NOT NULL AND lon IS NOT NULL",
        city_projection(probe)
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map([], city_from_row)?;
    let mut best: Option<NearestCity> = None;
    for city in rows {
        let city = city?;
        let Some((city_lat, city_lon)) = city.coords() else {
            continue;
        };
        let distance_mi = haversine_miles(lat, lon, city_lat, city_lon);
        if best.as_ref().map_or(true, |b| distance_mi < b.distance_mi) {
            best = Some(NearestCity { city, distance_mi });
        }
    }
    Ok(best)
}

/// Display-projection variant: squared Euclidean distance over the
/// projected (map_x, map_y) pair, since ordering does not need the
/// root. Requires the projection columns.
pub fn nearest_city_planar(
    conn: &Connection,
    probe: &SchemaProbe,
    x: f64,
    y: f64,
) -> Result<Option<City>, QueryError> {
    probe.require("cities", &["map_x", "map_y"])?;
    let sql = format!(
        "SELECT {} FROM cities WHERE map_x IS NOT NULL AND map_y IS NOT NULL",
        city_projection(probe)
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map([], city_from_row)?;
    let mut best: Option<(f64, City)> = None;
    for city in rows {
        let city = city?;
        let (Some(map_x), Some(map_y)) = (city.map_x, city.map_y) else {
            continue;
        };
        let d2 = (map_x - x).powi(2) + (map_y - y).powi(2);
        if best.as_ref().map_or(true, |(b, _)| d2 < *b) {
            best = Some((d2, city));
        }
    }
    Ok(best.map(|(_, city)| city))
}

#[derive(Debug, Clone, Default)]
pub struct CityListRequest {
    /// Case-insensitive substring match on name.
    pub q: Option<String>,
    pub continent: Option<String>,
    pub country: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CityListPage {
    pub cities: Vec<City>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[must_use]
pub fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_PAGE_SIZE)
}

#[must_use]
pub fn clamp_offset(offset: i64) -> i64 {
    offset.max(0)
}

/// Escapes LIKE wildcards so a needle matches literally under
/// `ESCAPE '!'`.
#[must_use]
pub fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '!') {
            out.push('!');
        }
        out.push(c);
    }
    out
}

pub fn list_cities(
    conn: &Connection,
    probe: &SchemaProbe,
    req: &CityListRequest,
) -> Result<CityListPage, QueryError> {
    let limit = clamp_limit(req.limit);
    let offset = clamp_offset(req.offset);

    let mut where_parts: Vec<&str> = Vec::new();
    let mut params: Vec<Value> = Vec::new();
    if let Some(q) = &req.q {
        where_parts.push("name LIKE ? ESCAPE '!'");
        params.push(Value::Text(format!("%{}%", escape_like(q))));
    }
    if let Some(continent) = &req.continent {
        probe.require("cities", &["continent"])?;
        where_parts.push("continent = ?");
        params.push(Value::Text(continent.clone()));
    }
    if let Some(country) = &req.country {
        probe.require("cities", &["country"])?;
        where_parts.push("country = ?");
        params.push(Value::Text(country.clone()));
    }
    let where_sql = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM cities{where_sql}");
    let mut count_stmt = conn.prepare_cached(&count_sql)?;
    let total: i64 = count_stmt.query_row(params_from_iter(params.iter()), |row| row.get(0))?;

    let page_sql = format!(
        "SELECT {} FROM cities{where_sql} ORDER BY city_id ASC LIMIT ? OFFSET ?",
        city_projection(probe)
    );
    params.push(Value::Integer(limit));
    params.push(Value::Integer(offset));
    let mut stmt = conn.prepare_cached(&page_sql)?;
    let cities = stmt
        .query_map(params_from_iter(params.iter()), city_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CityListPage {
        cities,
        total,
        limit,
        offset,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub name: String,
    pub city_count: i64,
}

fn group_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupCount> {
    Ok(GroupCount {
        name: row.get(0)?,
        city_count: row.get(1)?,
    })
}

pub fn continent_counts(
    conn: &Connection,
    probe: &SchemaProbe,
) -> Result<Vec<GroupCount>, QueryError> {
    probe.require("cities", &["continent"])?;
    let mut stmt = conn.prepare_cached(
        "SELECT continent, COUNT(*) AS city_count FROM cities \
         WHERE continent IS NOT NULL GROUP BY continent \
         ORDER BY city_count DESC, continent ASC",
    )?;
    let rows = stmt.query_map([], group_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn country_counts(
    conn: &Connection,
    probe: &SchemaProbe,
    continent: Option<&str>,
) -> Result<Vec<GroupCount>, QueryError> {
    probe.require("cities", &["country"])?;
    if let Some(continent) = continent {
        probe.require("cities", &["continent"])?;
        let mut stmt = conn.prepare_cached(
            "SELECT country, COUNT(*) AS city_count FROM cities \
             WHERE country IS NOT NULL AND continent = ?1 GROUP BY country \
             ORDER BY city_count DESC, country ASC",
        )?;
        let rows = stmt.query_map(params![continent], group_from_row)?;
        return Ok(rows.collect::<Result<Vec<_>, _>>()?);
    }
    let mut stmt = conn.prepare_cached(
        "SELECT country, COUNT(*) AS city_count FROM cities \
         WHERE country IS NOT NULL GROUP BY country \
         ORDER BY city_count DESC, country ASC",
    )?;
    let rows = stmt.query_map([], group_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_and_offset_clamps() {
        assert_eq!(clamp_limit(100_000), MAX_PAGE_SIZE);
        assert_eq!(clamp_limit(0), 1);
        assert_eq!(clamp_limit(-3), 1);
        assert_eq!(clamp_limit(250), 250);
        assert_eq!(clamp_offset(-5), 0);
        assert_eq!(clamp_offset(42), 42);
    }

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("50%_done!"), "50!%!_done!!");
    }
}
