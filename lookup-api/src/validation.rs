//! Request Validation
//!
//! Checks a lookup batch before it reaches the engine. Bodies are decoded
//! into [`LookupRequestBody`], which keeps parameters as raw JSON so that
//! an array or object parameter surfaces as a per-field validation error
//! rather than an opaque decode failure. Every problem in the batch is
//! reported at once, each tagged with the request index and field.

use std::collections::HashMap;

use lookup_core::{
    validate_request, EngineConfig, FilterValue, LookupRequest, ValidationError, DEFAULT_PAGE,
    DEFAULT_PAGE_SIZE,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{validation_field, ApiError, ApiResult};

fn default_page() -> i64 {
    DEFAULT_PAGE
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

/// Wire form of one lookup request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequestBody {
    #[serde(default)]
    pub lookup_key: String,
    #[serde(default)]
    pub search_term: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl LookupRequestBody {
    /// Convert into an engine request, narrowing each parameter to a
    /// [`FilterValue`].
    pub fn into_request(self) -> Result<LookupRequest, ValidationError> {
        let mut parameters = HashMap::with_capacity(self.parameters.len());
        for (name, value) in self.parameters {
            let value = FilterValue::from_json(&name, &value)?;
            parameters.insert(name, value);
        }
        Ok(LookupRequest {
            lookup_key: self.lookup_key,
            search_term: self.search_term,
            parameters,
            page: self.page,
            page_size: self.page_size,
        })
    }
}

/// Validate a whole batch, returning engine requests in input order.
///
/// # Errors
/// `VALIDATION_FAILED` with `details` listing `{field, message}` for every
/// offending request, fields prefixed with the request index
/// (`[2].pageSize`).
pub fn validate_batch(
    bodies: Vec<LookupRequestBody>,
    config: &EngineConfig,
) -> ApiResult<Vec<LookupRequest>> {
    if bodies.is_empty() {
        return Err(batch_error(ValidationError::EmptyBatch));
    }
    if bodies.len() > config.max_batch_size {
        return Err(batch_error(ValidationError::BatchTooLarge {
            count: bodies.len(),
            max: config.max_batch_size,
        }));
    }

    let mut requests = Vec::with_capacity(bodies.len());
    let mut problems = Vec::new();
    for (index, body) in bodies.into_iter().enumerate() {
        let checked = body
            .into_request()
            .and_then(|request| validate_request(&request, config).map(|()| request));
        match checked {
            Ok(request) => requests.push(request),
            Err(err) => problems.push(json!({
                "field": format!("[{}].{}", index, validation_field(&err)),
                "message": err.to_string(),
            })),
        }
    }

    if problems.is_empty() {
        Ok(requests)
    } else {
        Err(ApiError::validation_failed(format!(
            "{} of the lookup requests are invalid",
            problems.len()
        ))
        .with_details(Value::Array(problems)))
    }
}

fn batch_error(err: ValidationError) -> ApiError {
    ApiError::validation_failed(err.to_string())
        .with_details(json!([{ "field": validation_field(&err), "message": err.to_string() }]))
}
