// ============================================================================
// JSON Intake Functions
// ============================================================================
//
// Dispatch frontends submit schedule candidates and rest-period recordings as
// JSON. These helpers validate and deserialize that input into domain types;
// regulatory validation happens later, in the service layer.

use crate::api::{DriverId, LoadId, RestPeriod, RestType, Schedule, ScheduleStatus, TimeWindow};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

#[derive(serde::Deserialize)]
struct CandidateInput {
    pub driver_id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub status: Option<ScheduleStatus>,
    #[serde(default)]
    pub load_id: Option<i64>,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub fuel_used_l: Option<f64>,
}

#[derive(serde::Deserialize)]
struct RestInput {
    pub driver_id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub rest_type: RestType,
    #[serde(default)]
    pub notes: Option<String>,
}

fn validate_input_fields(json: &str, required: &[&str]) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(json).context("Invalid JSON")?;
    let obj = value
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("Expected a JSON object"))?;
    for field in required {
        if !obj.contains_key(*field) {
            anyhow::bail!("Missing required '{}' field", field);
        }
    }
    Ok(())
}

/// Parse a schedule candidate from a JSON string.
///
/// Accepts the wire shape `{"driver_id", "start", "end", ...}` with RFC 3339
/// timestamps. The returned candidate carries no id (server-assigned) and
/// defaults to `Pending` status when none is given.
///
/// This rejects only structurally invalid input (missing fields, inverted
/// interval); overlap and compliance checks are the scheduler's job.
pub fn parse_candidate_json_str(json: &str) -> Result<Schedule> {
    validate_input_fields(json, &["driver_id", "start", "end"])?;

    let input: CandidateInput =
        serde_json::from_str(json).context("Failed to deserialize schedule candidate")?;

    let window = TimeWindow::new(input.start, input.end).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid interval: start {} is not before end {}",
            input.start,
            input.end
        )
    })?;

    let mut candidate = Schedule::new(DriverId::new(input.driver_id), window);
    if let Some(status) = input.status {
        candidate.status = status;
    }
    candidate.load_id = input.load_id.map(LoadId::new);
    candidate.distance_km = input.distance_km;
    candidate.fuel_used_l = input.fuel_used_l;
    Ok(candidate)
}

/// Parse a rest-period recording from a JSON string.
pub fn parse_rest_period_json_str(json: &str) -> Result<RestPeriod> {
    validate_input_fields(json, &["driver_id", "start", "end", "rest_type"])?;

    let input: RestInput =
        serde_json::from_str(json).context("Failed to deserialize rest period")?;

    let window = TimeWindow::new(input.start, input.end).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid interval: start {} is not before end {}",
            input.start,
            input.end
        )
    })?;

    let mut rest = RestPeriod::new(DriverId::new(input.driver_id), window, input.rest_type);
    rest.notes = input.notes;
    Ok(rest)
}

// ============================================================================
// Tests
// ============================================================================
