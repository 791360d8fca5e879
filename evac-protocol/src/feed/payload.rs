use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Coordinate;

/// Envelope posted by the positioning feed.
///
/// `secret` is carried through but never verified here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedPayload {
    #[serde(default)]
    pub version: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub secret: String,
    pub data: FeedData,
}

/// Observation batch reported by one network for one time window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedData {
    #[serde(default)]
    pub network_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub reporting_aps: Vec<ReportingAp>,
    pub observations: Vec<Observation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportingAp {
    pub serial: String,
    pub mac: String,
    pub name: String,
    pub lat: Coordinate,
    pub lng: Coordinate,
    pub tags: Vec<String>,
    pub floor_plan: FloorPlan,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorPlan {
    pub id: String,
    pub name: String,
    pub x: Coordinate,
    pub y: Coordinate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RssiRecord {
    pub ap_mac: String,
    pub rssi: i32,
}

/// One location fix for a device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Location {
    pub lat: Coordinate,
    pub lng: Coordinate,
    pub variance: Coordinate,
    pub rssi_records: Vec<RssiRecord>,
    pub floor_plan: Option<FloorPlan>,
    pub nearest_ap_mac: String,
    pub time: String,
}

impl Location {
    /// Latitude and longitude, only when both resolve to known values.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.lat.known(), self.lng.known()) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }

    /// Timestamp of the fix, if the feed supplied a readable one.
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.time)
            .ok()
            .map(|value| value.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BleBeacon {
    pub uuid: String,
    pub tx_power: i32,
    pub major: i32,
    pub ble_type: String,
    pub minor: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LatestRecord {
    pub time: String,
    pub nearest_ap_mac: String,
    pub nearest_ap_rssi: i32,
}

/// Everything the feed saw of one device during the window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Observation {
    pub client_mac: String,
    pub name: String,
    pub locations: Vec<Location>,
    pub ble_beacons: Vec<BleBeacon>,
    pub latest_record: LatestRecord,
}

impl Observation {
    /// Most recent fix; fixes arrive in chronological order.
    pub fn latest_fix(&self) -> Option<&Location> {
        self.locations.last()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn latest_fix_is_last_location() {
        let observation: Observation = serde_json::from_value(json!({
            "clientMac": "aa:bb:cc:dd:ee:ff",
            "locations": [
                { "lat": 1.5, "lng": 2.5, "time": "2024-03-01T10:00:00Z" },
                { "lat": "3.5", "lng": 4.5, "time": "2024-03-01T10:00:05Z" }
            ]
        }))
        .expect("observation decodes");

        let latest = observation.latest_fix().expect("has a fix");
        assert_eq!(latest.coordinates(), Some((3.5, 4.5)));
        assert_eq!(
            latest.observed_at().map(|at| at.to_rfc3339()),
            Some("2024-03-01T10:00:05+00:00".to_string())
        );
    }

    #[test]
    fn one_unknown_axis_drops_both_coordinates() {
        let fix = Location {
            lat: Coordinate::from("40.71"),
            lng: Coordinate::from("n/a"),
            ..Location::default()
        };
        assert_eq!(fix.coordinates(), None);
    }

    #[test]
    fn observation_without_fixes_has_no_latest() {
        let observation = Observation {
            client_mac: "aa:bb:cc:dd:ee:ff".into(),
            ..Observation::default()
        };
        assert!(observation.latest_fix().is_none());
    }
}
