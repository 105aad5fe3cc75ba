//! Request validation for the analyze endpoint

use shared::{OptimizeJob, Tier};

use crate::error::{ApiError, MSG_CV_TOO_SHORT, MSG_INVALID_EMAIL, MSG_MISSING_FIELDS};
use crate::types::AnalyzeRequest;

/// Shortest CV accepted, in characters
pub const MIN_CV_LENGTH: usize = 10;

const DEFAULT_TEMPLATE: &str = "standard";
const UNKNOWN_SESSION: &str = "unknown";

/// A request that passed validation, normalized into a job
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub job: OptimizeJob,
    pub requested_tier: Tier,
}

pub fn validate(request: AnalyzeRequest, max_cv_length: usize) -> Result<ValidatedRequest, ApiError> {
    let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());

    let (Some(cv), Some(email)) = (non_empty(request.current_cv), non_empty(request.email)) else {
        return Err(ApiError::validation(MSG_MISSING_FIELDS));
    };

    if !email.contains('@') {
        return Err(ApiError::validation(MSG_INVALID_EMAIL));
    }

    let length = cv.chars().count();
    if length < MIN_CV_LENGTH {
        return Err(ApiError::validation(MSG_CV_TOO_SHORT));
    }
    if length > max_cv_length {
        return Err(ApiError::validation(format!(
            "CV jest za długie (maksimum {}KB)",
            max_cv_length / 1000
        )));
    }

    let requested_tier = match non_empty(request.plan) {
        None => Tier::Basic,
        Some(plan) => plan
            .parse::<Tier>()
            .map_err(|_| ApiError::validation(format!("Nieznany plan: {plan}")))?,
    };

    let template = non_empty(request.template).unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());
    let session_id = non_empty(request.session_id).unwrap_or_else(|| UNKNOWN_SESSION.to_string());

    let job = OptimizeJob::new(cv.trim(), email.trim())
        .with_job_posting(request.job_posting.as_deref().map(str::trim).unwrap_or_default())
        .with_session_id(session_id)
        .with_plan(requested_tier)
        .with_template(template);

    Ok(ValidatedRequest { job, requested_tier })
}
