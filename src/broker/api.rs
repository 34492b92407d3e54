// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! HTTP interface of the broker.
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | `/` | service banner |
//! | GET | `/processor` | deployed processors |
//! | POST | `/processor/run/{processor}` | submit a job |
//! | GET | `/processor/job/{job_id}` | job record |
//! | GET | `/processor/log/{job_id}` | job log content |
//! | GET | `/processor/{processor}/resources` | registered resources, or `?name=` lookup |
//! | POST | `/processor/{processor}/resources` | download and register |
//! | POST | `/workflow/run?mets_path=..&page_wise=..` | submit a workflow (multipart `workflow`) |
//! | GET | `/workflow/job/{workflow_id}` | workflow status |
//! | GET | `/workflow/job-simple/{workflow_id}` | id and state only |
//! | POST | `/workflow/job/{workflow_id}/cancel` | cancel |
//! | POST | `/stop` | stop all deployed agents |

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::service::ProcessingBroker;
use crate::errors::{BrokerError, RegistryError};
use crate::registry::{Job, JobId, JobRequest, JobState, WorkflowId, WorkflowStatus};
use crate::traits::ResourceRecord;

type BrokerState = Arc<ProcessingBroker>;

pub fn build_router(broker: BrokerState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/processor", get(list_processors))
        .route("/processor/run/{processor}", post(run_processor))
        .route("/processor/job/{job_id}", get(get_job))
        .route("/processor/log/{job_id}", get(get_job_log))
        .route(
            "/processor/{processor}/resources",
            get(get_resources).post(fetch_resource),
        )
        .route("/workflow/run", post(run_workflow))
        .route("/workflow/job/{workflow_id}", get(get_workflow))
        .route("/workflow/job-simple/{workflow_id}", get(get_workflow_simple))
        .route("/workflow/job/{workflow_id}/cancel", post(cancel_workflow))
        .route("/stop", post(stop))
        .with_state(broker)
}

/// Ids that do not parse cannot name a record.
fn parse_id<T: FromStr>(raw: &str, kind: &'static str) -> Result<T, BrokerError> {
    raw.parse().map_err(|_| {
        RegistryError::NotFound {
            kind,
            id: raw.to_string(),
        }
        .into()
    })
}

async fn home() -> Json<Value> {
    Json(json!({
        "message": "The home page of the OCR-D processing broker",
        "time": Utc::now(),
    }))
}

async fn list_processors(State(broker): State<BrokerState>) -> Json<Vec<String>> {
    Json(broker.list_processors())
}

async fn run_processor(
    State(broker): State<BrokerState>,
    Path(processor): Path<String>,
    Json(request): Json<JobRequest>,
) -> Result<Json<Job>, BrokerError> {
    Ok(Json(broker.submit_job(&processor, request).await?))
}

async fn get_job(
    State(broker): State<BrokerState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, BrokerError> {
    let id: JobId = parse_id(&job_id, "Job")?;
    Ok(Json(broker.get_job(&id)?))
}

async fn get_job_log(
    State(broker): State<BrokerState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, BrokerError> {
    let id: JobId = parse_id(&job_id, "Job")?;
    let log = broker.get_job_log(&id).await?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], log))
}

#[derive(Debug, Deserialize)]
struct ResourceQuery {
    name: Option<String>,
}

async fn get_resources(
    State(broker): State<BrokerState>,
    Path(processor): Path<String>,
    Query(query): Query<ResourceQuery>,
) -> Result<Json<Value>, BrokerError> {
    match query.name {
        Some(name) => {
            let path = broker.locate_resource(&processor, &name)?;
            Ok(Json(json!({ "processor": processor, "name": name, "path": path })))
        }
        None => {
            let resources: Vec<ResourceRecord> = broker.list_resources(&processor)?;
            Ok(Json(json!({ "processor": processor, "resources": resources })))
        }
    }
}

#[derive(Debug, Deserialize)]
struct FetchRequest {
    url: String,
    #[serde(default)]
    name: Option<String>,
}

async fn fetch_resource(
    State(broker): State<BrokerState>,
    Path(processor): Path<String>,
    Json(request): Json<FetchRequest>,
) -> Result<Json<Value>, BrokerError> {
    let path = broker
        .fetch_resource(&processor, &request.url, request.name.as_deref())
        .await?;
    Ok(Json(json!({ "processor": processor, "url": request.url, "path": path })))
}

#[derive(Debug, Deserialize)]
struct WorkflowQuery {
    mets_path: PathBuf,
    #[serde(default, deserialize_with = "query_flag")]
    page_wise: bool,
}

/// Boolean query values as HTTP clients spell them: `true`, `True`, `1`, `yes`, `on`.
fn query_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(serde::de::Error::custom(format!(
            "'{}' is not a boolean",
            raw
        ))),
    }
}

async fn run_workflow(
    State(broker): State<BrokerState>,
    Query(query): Query<WorkflowQuery>,
    mut multipart: Multipart,
) -> Result<Json<WorkflowStatus>, BrokerError> {
    let mut definition = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| BrokerError::InvalidRequest(e.to_string()))?
    {
        if field.name() == Some("workflow") {
            let text = field
                .text()
                .await
                .map_err(|e| BrokerError::InvalidRequest(e.to_string()))?;
            definition = Some(text);
        }
    }
    let definition = definition.ok_or_else(|| {
        BrokerError::InvalidRequest("multipart field 'workflow' is required".to_string())
    })?;

    let id = broker.submit_workflow(&definition, query.mets_path, query.page_wise)?;
    Ok(Json(broker.get_workflow(&id)?))
}

async fn get_workflow(
    State(broker): State<BrokerState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<WorkflowStatus>, BrokerError> {
    let id: WorkflowId = parse_id(&workflow_id, "Workflow")?;
    Ok(Json(broker.get_workflow(&id)?))
}

#[derive(Debug, Serialize)]
struct SimpleWorkflowStatus {
    #[serde(rename = "job_id")]
    workflow_id: WorkflowId,
    state: JobState,
}

async fn get_workflow_simple(
    State(broker): State<BrokerState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<SimpleWorkflowStatus>, BrokerError> {
    let id: WorkflowId = parse_id(&workflow_id, "Workflow")?;
    let status = broker.get_workflow(&id)?;
    Ok(Json(SimpleWorkflowStatus {
        workflow_id: status.workflow_id,
        state: status.state,
    }))
}

async fn cancel_workflow(
    State(broker): State<BrokerState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<WorkflowStatus>, BrokerError> {
    let id: WorkflowId = parse_id(&workflow_id, "Workflow")?;
    Ok(Json(broker.cancel_workflow(&id)?))
}

async fn stop(State(broker): State<BrokerState>) -> Result<Json<Value>, BrokerError> {
    broker.stop_deployed_agents().await?;
    Ok(Json(json!({ "message": "All deployed agents stopped" })))
}
