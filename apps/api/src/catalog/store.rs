//! Storage seam for the catalog.
//!
//! `AppState` holds an `Arc<dyn PromptStore>`, chosen at startup from config.

use async_trait::async_trait;

use crate::catalog::filter::FilterPredicate;
use crate::catalog::rating::RatingSample;
use crate::errors::AppError;
use crate::models::dimension::{DepartmentFunction, NamedEntity};
use crate::models::prompt::{PromptView, RatingUpdate};

#[async_trait]
pub trait PromptStore: Send + Sync {
    /// Prompts satisfying every predicate, ordered by id, at most `RESULT_CAP`.
    async fn search(&self, predicates: &[FilterPredicate]) -> Result<Vec<PromptView>, AppError>;

    /// Folds one sample into the prompt's running mean as a single atomic step.
    /// Returns `AppError::NotFound` when the prompt does not exist.
    async fn rate(&self, prompt_id: i32, sample: RatingSample) -> Result<RatingUpdate, AppError>;

    async fn list_departments(&self) -> Result<Vec<NamedEntity>, AppError>;

    async fn list_functions(&self) -> Result<Vec<NamedEntity>, AppError>;

    async fn list_activities(&self) -> Result<Vec<NamedEntity>, AppError>;

    async fn department_functions(&self) -> Result<Vec<DepartmentFunction>, AppError>;

    /// Functions under a department, sorted by name. Empty when the department
    /// is unknown or has none.
    async fn functions_of(&self, department_id: i32) -> Result<Vec<NamedEntity>, AppError>;

    /// Activities under a function, sorted by name. Empty when the function is
    /// unknown or has none.
    async fn activities_of(&self, function_id: i32) -> Result<Vec<NamedEntity>, AppError>;
}
