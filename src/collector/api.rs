// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Collector HTTP routes
//!
//! The ingestion body is taken as raw text, capped by the `string` limit, and
//! parsed by [`Snapshot::from_json_str`] so that every malformed payload,
//! whatever the reason, is answered the same way: `400` with a JSON message
//! and the stored snapshot left untouched. A body cut at the limit is
//! answered `413` and never parsed.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use rocket::data::{Capped, Limits};
use rocket::http::Status;
use rocket::response::{self, status, Responder};
use rocket::serde::json::Json;
use rocket::{catch, get, post, Request};
use serde::Serialize;

use super::state::CollectorState;
use crate::error::CollectorError;
use crate::snapshot::Snapshot;

/// Acknowledgment of an accepted ingestion.
#[derive(Debug, Serialize)]
pub struct IngestAck {
    pub status: u16,
    pub message: String,
}

/// Body of `GET /data`.
#[derive(Debug, Serialize)]
pub struct DataResponse {
    pub status: u16,
    /// The stored snapshot as a JSON object
    pub data: Snapshot,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of every error answer.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
}

impl<'r> Responder<'r, 'static> for CollectorError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        warn!("Rejected ingestion: {}", self);
        let status = match self {
            CollectorError::MalformedPayload { .. } => Status::BadRequest,
            CollectorError::PayloadTooLarge { .. } => Status::PayloadTooLarge,
        };
        let body = ErrorBody {
            status: status.code,
            message: self.to_string(),
        };
        status::Custom(status, Json(body)).respond_to(request)
    }
}

/// Replace the stored snapshot with the request body.
#[post("/data", data = "<body>")]
pub async fn ingest_data(
    body: Capped<String>,
    state: &CollectorState,
    request_limits: &Limits,
) -> Result<status::Custom<Json<IngestAck>>, CollectorError> {
    if !body.is_complete() {
        let limit = request_limits.get("string").unwrap_or(Limits::STRING);
        return Err(CollectorError::PayloadTooLarge {
            limit_kib: limit.as_u64() / 1024,
        });
    }
    let snapshot = Snapshot::from_json_str(&body)?;
    let readings = snapshot.len();
    let count = state.ingest(snapshot).await;
    debug!("Ingestion #{} stored {} readings", count, readings);

    Ok(status::Custom(
        Status::Created,
        Json(IngestAck {
            status: Status::Created.code,
            message: "Successfully received data".to_string(),
        }),
    ))
}

/// Current snapshot, empty before the first ingestion.
#[get("/data")]
pub async fn get_data(state: &CollectorState) -> Json<DataResponse> {
    let slot = state.query().await;
    Json(DataResponse {
        status: Status::Ok.code,
        data: slot.snapshot,
        updated_at: slot.updated_at,
    })
}

#[catch(404)]
pub fn not_found(request: &Request<'_>) -> Json<ErrorBody> {
    Json(ErrorBody {
        status: Status::NotFound.code,
        message: format!("No route for {} {}", request.method(), request.uri()),
    })
}
