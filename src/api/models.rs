use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data::row::CellValue;
use crate::session::Role;

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: Option<String>,
    #[serde(default)]
    pub is_admin: Value,
    pub message: Option<String>,
}

impl LoginResponse {
    /// The backend sends MySQL booleans, which may arrive as 0/1
    pub fn is_admin(&self) -> bool {
        CellValue::from_json(&self.is_admin)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ActivityLogQuery<'a> {
    pub search_term: &'a str,
}

#[derive(Debug, Serialize)]
pub struct UserStatusRequest<'a> {
    pub user_id: &'a str,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsersPage {
    #[serde(default)]
    pub users: Vec<Value>,
    #[serde(default)]
    pub total: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsPage {
    #[serde(default)]
    pub documents: Vec<Value>,
    pub total: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityLogs {
    #[serde(default)]
    pub logs: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecentActivity {
    pub action: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardData {
    #[serde(default)]
    pub total_documents: u64,
    #[serde(default)]
    pub total_users: u64,
    #[serde(default)]
    pub recent_activities: Vec<RecentActivity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentCount {
    pub count: u64,
}

/// `{"admin_name": ..}` or `{"user_name": ..}` depending on the endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayName {
    #[serde(alias = "admin_name", alias = "user_name")]
    pub name: String,
}

/// Generic acknowledgement carrying a human-readable message
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionReply {
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ActionReply {
    pub fn text(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "done".to_string())
    }
}

/// Best human-readable message in an error body
pub fn error_message(body: &Value) -> Option<String> {
    ["error", "message", "details"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
