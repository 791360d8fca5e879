//! Location feed callback payloads.
//!
//! The positioning feed posts a loosely typed JSON envelope: coordinates may
//! be numbers or strings, and some producers emit bare `NaN` tokens. The
//! types here accept that shape and [`parse_feed`] turns raw bytes into a
//! validated [`FeedPayload`].

mod coordinate;
mod parse;
mod payload;
mod sanitize;

pub use coordinate::Coordinate;
pub use parse::{parse_feed, FeedError};
pub use payload::{
    BleBeacon, FeedData, FeedPayload, FloorPlan, LatestRecord, Location, Observation,
    ReportingAp, RssiRecord,
};
pub use sanitize::sanitize_nan;
