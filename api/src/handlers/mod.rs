pub mod health;
pub mod measurements;
pub mod nodes;
pub mod projects;
pub mod zones;

use crate::error::{ApiError, ApiResult};
use std::fmt::Display;

/// Turn a missing row into a 404
pub(crate) fn found<T>(row: Option<T>, what: impl Display) -> ApiResult<T> {
    row.ok_or_else(|| ApiError::NotFound(what.to_string()))
}

/// Reject batches that name nothing
pub(crate) fn non_empty<T>(items: &[T], what: &str) -> ApiResult<()> {
    if items.is_empty() {
        return Err(ApiError::BadRequest(format!("No {} given", what)));
    }
    Ok(())
}
