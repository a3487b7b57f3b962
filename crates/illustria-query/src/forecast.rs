// SPDX-License-Identifier: Apache-2.0

use illustria_model::{TimeSlot, WeatherSlot, SLOTS_PER_DAY};
use rusqlite::{params, Connection};

use crate::QueryError;

/// Slots for `city_id` whose index lies in
/// `[slot_index(start), slot_index(start) + days*3)`, ascending.
///
/// No wraparound at the year boundary: the out-of-range tail of a
/// window simply yields no rows. `start` components are fed to the slot
/// formula as-is, including out-of-domain values.
pub fn forecast_slots(
    conn: &Connection,
    city_id: i64,
    start: TimeSlot,
    days: i64,
) -> Result<Vec<WeatherSlot>, QueryError> {
    let first = start.slot_index();
    let end = first + days * SLOTS_PER_DAY;
    let mut stmt = conn.prepare_cached(
        "SELECT month, day, tod, condition, temp_f, wind_mph, prcp_in, cloud_oktas \
         FROM weather WHERE city_id = ?1 AND slot_index >= ?2 AND slot_index < ?3 \
         ORDER BY slot_index ASC",
    )?;
    let rows = stmt.query_map(params![city_id, first, end], |row| {
        Ok(WeatherSlot {
            month: row.get(0)?,
            day: row.get(1)?,
            tod: row.get(2)?,
            condition: row.get(3)?,
            temp_f: row.get(4)?,
            wind_mph: row.get(5)?,
            prcp_in: row.get(6)?,
            cloud_oktas: row.get(7)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
