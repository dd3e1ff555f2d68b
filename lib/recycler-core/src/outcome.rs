//! Per-target outcomes and batch aggregation

use crate::PodTarget;
use serde::Serialize;

/// Terminal state of a single recycle attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum RecycleStatus {
    Success,
    AuthorizationDenied,
    NotFound,
    ApiError(String),
    ValidationError(String),
}

impl RecycleStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RecycleStatus::Success)
    }

    /// True when the cluster was never asked to delete anything for this target
    pub fn rejected_before_attempt(&self) -> bool {
        matches!(
            self,
            RecycleStatus::AuthorizationDenied | RecycleStatus::ValidationError(_)
        )
    }

    /// Stable name used in responses and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            RecycleStatus::Success => "success",
            RecycleStatus::AuthorizationDenied => "authorizationDenied",
            RecycleStatus::NotFound => "notFound",
            RecycleStatus::ApiError(_) => "apiError",
            RecycleStatus::ValidationError(_) => "validationError",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            RecycleStatus::ApiError(detail) | RecycleStatus::ValidationError(detail) => {
                Some(detail)
            }
            _ => None,
        }
    }
}

/// Outcome for one submitted target
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecycleOutcome {
    pub target: PodTarget,
    pub status: RecycleStatus,
}

impl RecycleOutcome {
    pub fn new(target: PodTarget, status: RecycleStatus) -> Self {
        Self { target, status }
    }
}

/// Aggregate status across a whole batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregateStatus {
    Success,
    PartialFailure,
    Failure,
}

/// Ordered outcomes plus their aggregate
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub outcomes: Vec<RecycleOutcome>,
    pub aggregate: AggregateStatus,
}

impl BatchResult {
    /// Aggregate outcomes, keeping their order
    pub fn from_outcomes(outcomes: Vec<RecycleOutcome>) -> Self {
        let aggregate = aggregate(&outcomes);
        Self {
            outcomes,
            aggregate,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// True when no target reached the cluster API
    pub fn rejected_before_attempt(&self) -> bool {
        !self.outcomes.is_empty()
            && self
                .outcomes
                .iter()
                .all(|o| o.status.rejected_before_attempt())
    }
}

/// Empty batches only come from listing an empty namespace and count as success.
pub fn aggregate(outcomes: &[RecycleOutcome]) -> AggregateStatus {
    let succeeded = outcomes.iter().filter(|o| o.status.is_success()).count();
    if succeeded == outcomes.len() {
        AggregateStatus::Success
    } else if succeeded == 0 {
        AggregateStatus::Failure
    } else {
        AggregateStatus::PartialFailure
    }
}
