use thiserror::Error;

/// Failure of a single request that never produced an HTTP response.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("configuration error: {0}")]
    MissingCredential(String),
    #[error("network error while calling {model}: {message}")]
    Network { model: String, message: String },
    #[error("model {model} is not available ({status}): {message}")]
    ModelUnavailable { model: String, status: u16, message: String },
    #[error("model {model} returned an empty reply")]
    EmptyResponse { model: String },
    #[error("API error {status} from model {model}: {message}")]
    Api { status: u16, model: String, message: String },
    #[error("all candidate models failed")]
    AllModelsFailed,
}

impl PlanError {
    /// Errors that move the client on to the next candidate model.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(self, PlanError::ModelUnavailable { .. } | PlanError::EmptyResponse { .. })
    }

    /// One line for the user-facing alert.
    pub fn user_message(&self) -> String {
        match self {
            PlanError::MissingCredential(msg) => format!("Missing API key: {}", msg),
            PlanError::Network { message, .. } => {
                format!("Network error: could not reach the plan service ({}). Check your connection.", message)
            }
            PlanError::ModelUnavailable { model, message, .. } => {
                format!("Model '{}' is not available: {}", model, message)
            }
            PlanError::EmptyResponse { model } => {
                format!("Model '{}' returned no usable text. Try again.", model)
            }
            PlanError::Api { status, model, message } if matches!(status, 401 | 403) => {
                format!("The API key was rejected ({} on {}): {}", status, model, message)
            }
            PlanError::Api { status, model, message } if matches!(status, 402 | 429) => {
                format!("Quota or billing limit reached ({} on {}): {}", status, model, message)
            }
            PlanError::Api { status, model, message } => {
                format!("Plan service error {} from {}: {}", status, model, message)
            }
            PlanError::AllModelsFailed => "No model could generate a plan. Try again later.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_eligibility() {
        let unavailable = PlanError::ModelUnavailable { model: "a".into(), status: 404, message: "model not found".into() };
        let empty = PlanError::EmptyResponse { model: "a".into() };
        let api = PlanError::Api { status: 500, model: "a".into(), message: "boom".into() };
        assert!(unavailable.is_fallback_eligible());
        assert!(empty.is_fallback_eligible());
        assert!(!api.is_fallback_eligible());
        assert!(!PlanError::Network { model: "a".into(), message: "reset".into() }.is_fallback_eligible());
    }

    #[test]
    fn user_message_separates_quota_from_auth() {
        let quota = PlanError::Api { status: 429, model: "m".into(), message: "rate limited".into() };
        let auth = PlanError::Api { status: 401, model: "m".into(), message: "invalid x-api-key".into() };
        assert!(quota.user_message().starts_with("Quota or billing"));
        assert!(auth.user_message().starts_with("The API key was rejected"));
    }
}
