use chrono::{DateTime, Utc};
use evac_protocol::evacuation::{
    ArrivalReport, ArrivalUpdate, EndSessionRequest, EvacuationSession, NewSessionRequest,
    RosterRow, SnapshotReport,
};
use evac_protocol::scan::ScanOutcome;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("service returned an error: {0}")]
    Service(String),
    #[error("could not read {path}: {message}")]
    Input { path: String, message: String },
    #[error("{0}")]
    Validation(String),
}

impl From<reqwest::Error> for CliError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value.to_string())
    }
}

/// Body of a 201 from session creation.
#[derive(Debug, Clone, Deserialize)]
pub struct StartedSession {
    pub session: EvacuationSession,
    pub roster: SnapshotReport,
}

#[derive(Debug, Clone)]
pub enum StartOutcome {
    Started(StartedSession),
    AlreadyActive(Vec<EvacuationSession>),
}

pub struct EvacClient {
    base_url: Url,
    http: reqwest::Client,
}

impl EvacClient {
    pub fn new(base_url: &str) -> Result<Self, CliError> {
        let url = Url::parse(base_url)
            .map_err(|err| CliError::Validation(format!("invalid service URL: {err}")))?;
        Ok(Self {
            base_url: url,
            http: reqwest::Client::new(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, CliError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|err| CliError::Validation(format!("invalid path: {err}")))?;
        debug!(%url, "calling evacuation service");
        Ok(url)
    }

    /// Posts a captured feed body unchanged.
    pub async fn replay(&self, raw: Vec<u8>) -> Result<Vec<ScanOutcome>, CliError> {
        let url = self.endpoint("/api/cisco")?;
        let response = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(raw)
            .send()
            .await?;
        parse_response(response).await
    }

    pub async fn start_session(&self, worksite: Uuid) -> Result<StartOutcome, CliError> {
        let url = self.endpoint("/api/evacuations")?;
        let response = self
            .http
            .post(url)
            .json(&NewSessionRequest { worksite })
            .send()
            .await?;

        if response.status() == StatusCode::CREATED {
            Ok(StartOutcome::Started(parse_response(response).await?))
        } else {
            Ok(StartOutcome::AlreadyActive(parse_response(response).await?))
        }
    }

    pub async fn end_session(
        &self,
        session: Uuid,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<EvacuationSession, CliError> {
        let url = self.endpoint(&format!("/api/evacuations/{session}/end"))?;
        let response = self
            .http
            .post(url)
            .json(&EndSessionRequest { end_date })
            .send()
            .await?;
        parse_response(response).await
    }

    /// `selector` is a session id or `0` for the most recent session.
    pub async fn roster(&self, selector: &str) -> Result<Vec<RosterRow>, CliError> {
        let url = self.endpoint(&format!("/api/people-on-evacuation/{selector}"))?;
        let response = self.http.get(url).send().await?;
        parse_response(response).await
    }

    pub async fn arrive(&self, updates: &[ArrivalUpdate]) -> Result<Vec<ArrivalReport>, CliError> {
        let url = self.endpoint("/api/evacuation-beacons")?;
        let response = self.http.post(url).json(updates).send().await?;
        parse_response(response).await
    }
}

async fn parse_response<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, CliError> {
    if response.status().is_success() {
        response
            .json::<T>()
            .await
            .map_err(|err| CliError::Http(err.to_string()))
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!(%status, %body, "service rejected request");
        if let Ok(err) = serde_json::from_str::<ServiceError>(&body) {
            Err(CliError::Service(format!("{status}: {}", err.error)))
        } else {
            Err(CliError::Service(format!("{status}: {body}")))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    error: String,
}
