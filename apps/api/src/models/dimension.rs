use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A department, function, application or activity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct NamedEntity {
    pub id: i32,
    pub name: String,
}

/// One edge of the department → function hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentFunction {
    pub department_id: i32,
    pub department_name: String,
    pub function_id: i32,
    pub function_name: String,
}
