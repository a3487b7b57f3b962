#![forbid(unsafe_code)]
//! Illustria model SSOT.
//!
//! Plain data carried between the snapshot query layer and the HTTP
//! surface. Nothing here performs I/O; optional fields mirror columns
//! that may be absent from older snapshot generations.

mod city;
mod timeslot;
mod weather;

pub use city::{City, CityId};
pub use timeslot::{TimeSlot, DAYS_PER_MONTH, MONTHS_PER_YEAR, SLOTS_PER_DAY, SLOTS_PER_YEAR};
pub use weather::WeatherSlot;

pub const CRATE_NAME: &str = "illustria-model";
