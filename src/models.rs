//! Request and response data types

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request data for the analyze endpoint
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AnalysisRequest {
    /// Name of the analysis to run, e.g. `MEAN_VALUE`
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
}

impl AnalysisRequest {
    /// Return a new AnalysisRequest object.
    pub fn new(name: &str) -> Self {
        AnalysisRequest {
            name: name.to_string(),
        }
    }
}
