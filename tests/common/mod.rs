#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use evacuation::evac_protocol::registry::{Company, Person, Site, Team, TrackedAsset};
use evacuation::evac_protocol::scan::ScanRecord;
use evacuation::{build_router, AppState, MemoryStorage, ServiceSettings};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

pub const VALIDATOR_KEY: &str = "validator-token";

/// A memory-backed deployment with one site, one team and one company.
pub struct World {
    pub storage: MemoryStorage,
    pub site: Site,
    pub team: Team,
    pub company: Company,
}

impl World {
    pub fn new(network_id: &str) -> Self {
        let storage = MemoryStorage::new();
        let site = Site {
            id: Uuid::new_v4(),
            external_id: network_id.into(),
            name: "North yard".into(),
        };
        let team = Team {
            id: Uuid::new_v4(),
            name: "Rigging".into(),
        };
        let company = Company {
            id: Uuid::new_v4(),
            name: "Acme".into(),
        };
        storage.add_site(site.clone());
        storage.add_team(team.clone());
        storage.add_company(company.clone());
        Self {
            storage,
            site,
            team,
            company,
        }
    }

    /// Registers a person wearing a beacon with the given hardware address.
    pub fn worker(&self, first_name: &str, mac: &str) -> (Person, TrackedAsset) {
        let person = Person {
            id: Uuid::new_v4(),
            first_name: first_name.into(),
            last_name: "Silva".into(),
            kind: "contractor".into(),
            team_id: self.team.id,
            company_id: self.company.id,
        };
        let asset = TrackedAsset {
            id: Uuid::new_v4(),
            mac_address: mac.into(),
            assigned_to: Some(person.id),
        };
        self.storage.add_person(person.clone());
        self.storage.add_asset(asset.clone());
        (person, asset)
    }

    pub fn seen(&self, asset: &TrackedAsset, at: DateTime<Utc>) {
        self.storage.record_scan(ScanRecord {
            id: Uuid::new_v4(),
            mac_address: asset.mac_address.clone(),
            worksite_id: self.site.id,
            beacon_id: Some(asset.id),
            latitude: None,
            longitude: None,
            scanned_at: at,
            created_at: at,
        });
    }

    pub fn router(&self) -> Router {
        build_router(AppState::new(
            Arc::new(self.storage.clone()),
            ServiceSettings::new(VALIDATOR_KEY).with_scan_deadline(Duration::from_secs(5)),
        ))
    }
}

pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Bytes) {
    let response = router.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    (status, bytes)
}

pub async fn send_json(router: Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request");
    let (status, bytes) = send(router, request).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json response")
    };
    (status, value)
}

pub async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::get(uri).body(Body::empty()).expect("request");
    let (status, bytes) = send(router, request).await;
    (status, serde_json::from_slice(&bytes).expect("json response"))
}

/// Feed envelope with one fix per device.
pub fn feed(network_id: &str, devices: &[(&str, Value, Value)]) -> Value {
    let observations: Vec<Value> = devices
        .iter()
        .map(|(mac, lat, lng)| {
            json!({
                "clientMac": mac,
                "name": "",
                "locations": [{
                    "lat": lat,
                    "lng": lng,
                    "variance": 3.2,
                    "time": "2024-03-01T10:00:30Z",
                    "floorPlan": null
                }],
                "bleBeacons": [],
                "latestRecord": { "time": "2024-03-01T10:00:30Z", "nearestApMac": "00:11", "nearestApRssi": -60 }
            })
        })
        .collect();

    json!({
        "version": "3.0",
        "type": "BLE devices",
        "secret": "not-checked",
        "data": {
            "networkId": network_id,
            "startTime": "2024-03-01T10:00:00Z",
            "endTime": "2024-03-01T10:01:00Z",
            "reportingAps": [{ "serial": "Q2XX", "mac": "00:11", "name": "ap-1", "lat": 1.0, "lng": 2.0, "tags": [], "floorPlan": {} }],
            "observations": observations
        }
    })
}
