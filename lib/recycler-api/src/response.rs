use crate::RequestShape;
use recycler_core::{AggregateStatus, BatchResult, RecycleOutcome, RecycleStatus};
use serde::{Deserialize, Serialize};

/// Legacy single-target reply
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyResponse {
    pub status_code: u16,
    pub body: String,
}

/// Batch reply
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    /// "success", "partial" or "error"
    pub status: String,

    pub outcomes: Vec<OutcomeView>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Equivalent HTTP status, not part of the payload
    #[serde(skip)]
    pub status_code: u16,
}

/// Wire form of one outcome
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeView {
    pub namespace: String,
    pub pod_name: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<&RecycleOutcome> for OutcomeView {
    fn from(outcome: &RecycleOutcome) -> Self {
        Self {
            namespace: outcome.target.namespace.clone(),
            pod_name: outcome.target.pod_name.clone(),
            status: outcome.status.as_str().to_string(),
            detail: outcome.status.detail().map(str::to_string),
        }
    }
}

/// Reply in the shape the caller used
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InvocationResponse {
    Legacy(LegacyResponse),
    Batch(BatchResponse),
}

/// HTTP-equivalent status for a finished batch
pub fn status_code(result: &BatchResult) -> u16 {
    if result.aggregate == AggregateStatus::Success {
        200
    } else if result.rejected_before_attempt() {
        400
    } else if result
        .outcomes
        .iter()
        .all(|o| o.status == RecycleStatus::NotFound)
    {
        404
    } else {
        500
    }
}

fn aggregate_label(aggregate: AggregateStatus) -> &'static str {
    match aggregate {
        AggregateStatus::Success => "success",
        AggregateStatus::PartialFailure => "partial",
        AggregateStatus::Failure => "error",
    }
}

fn summary(result: &BatchResult) -> String {
    match result.aggregate {
        AggregateStatus::Success if result.outcomes.is_empty() => {
            "No pods to recycle.".to_string()
        }
        AggregateStatus::Success => "All specified pods recycled successfully.".to_string(),
        _ => format!(
            "{} of {} pod(s) recycled.",
            result.succeeded(),
            result.outcomes.len()
        ),
    }
}

fn legacy_body(result: &BatchResult) -> String {
    let [outcome] = result.outcomes.as_slice() else {
        return summary(result);
    };
    let target = &outcome.target;
    match &outcome.status {
        RecycleStatus::Success => format!(
            "Pod {} recycled (deleted) in namespace {}.",
            target.pod_name, target.namespace
        ),
        RecycleStatus::AuthorizationDenied => {
            format!("Error: Namespace '{}' is not allowed.", target.namespace)
        }
        RecycleStatus::NotFound => format!(
            "Error: Pod {} not found in namespace {}.",
            target.pod_name, target.namespace
        ),
        RecycleStatus::ApiError(detail) => format!("Error: Kubernetes API error: {}", detail),
        RecycleStatus::ValidationError(detail) => format!("Error: {}.", detail),
    }
}

impl InvocationResponse {
    /// Render a finished batch
    pub fn from_result(shape: RequestShape, result: &BatchResult) -> Self {
        let code = status_code(result);
        match shape {
            RequestShape::Single => InvocationResponse::Legacy(LegacyResponse {
                status_code: code,
                body: legacy_body(result),
            }),
            RequestShape::Batch => InvocationResponse::Batch(BatchResponse {
                status: aggregate_label(result.aggregate).to_string(),
                outcomes: result.outcomes.iter().map(OutcomeView::from).collect(),
                message: Some(summary(result)),
                status_code: code,
            }),
        }
    }

    /// Render a request-level failure where no outcomes exist
    pub fn failure(shape: RequestShape, status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match shape {
            RequestShape::Single => InvocationResponse::Legacy(LegacyResponse {
                status_code,
                body: format!("Error: {}", message),
            }),
            RequestShape::Batch => InvocationResponse::Batch(BatchResponse {
                status: "error".to_string(),
                outcomes: Vec::new(),
                message: Some(message),
                status_code,
            }),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            InvocationResponse::Legacy(r) => r.status_code,
            InvocationResponse::Batch(r) => r.status_code,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code() == 200
    }
}
