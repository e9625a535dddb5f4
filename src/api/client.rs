use reqwest::header::{AUTHORIZATION, CONTENT_DISPOSITION};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::api::download::{filename_from_disposition, DownloadedFile};
use crate::api::models::{
    error_message, ActionReply, ActivityLogQuery, ActivityLogs, DashboardData, DisplayName,
    DocumentCount, DocumentsPage, LoginRequest, LoginResponse, RegisterRequest, UserStatusRequest,
    UsersPage,
};
use crate::error::ApiError;
use crate::session::{Role, Session};

/// Async client for the document-management backend.
///
/// The backend tracks logins with a session cookie, so one client (and its
/// cookie jar) should be reused for the lifetime of a session. Every call
/// that needs an identity takes the `Session` explicitly.
#[derive(Clone)]
pub struct DmsApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl DmsApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder, session: &Session) -> RequestBuilder {
        request.header(AUTHORIZATION, format!("Bearer {}", session.token))
    }

    pub async fn login(&self, email: &str, password: &str, role: Role) -> Result<Session, ApiError> {
        debug!(email, %role, "logging in");
        let response = self
            .client
            .post(self.url("/login"))
            .json(&LoginRequest {
                email,
                password,
                role,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = parse_message(&body).unwrap_or_else(|| match status {
                StatusCode::UNAUTHORIZED => "Invalid credentials. Please try again.".to_string(),
                StatusCode::INTERNAL_SERVER_ERROR => {
                    "An error occurred on the server. Please try again later.".to_string()
                }
                other => format!("Login failed: {}", other),
            });
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let reply: LoginResponse = decode(response).await?;
        let is_admin = reply.is_admin();
        if (role == Role::Admin) != is_admin {
            return Err(ApiError::RoleMismatch {
                requested: role.to_string(),
            });
        }
        let token = reply
            .token
            .ok_or_else(|| ApiError::Parse("login reply carried no token".to_string()))?;

        info!(email, admin = is_admin, "logged in");
        Ok(Session::from_login(email, token, is_admin))
    }

    /// Create an account. `confirm` must repeat `password`.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        confirm: &str,
    ) -> Result<String, ApiError> {
        let email = email.trim();
        let password = password.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ApiError::InvalidInput(
                "Email and password are required".to_string(),
            ));
        }
        if password != confirm.trim() {
            return Err(ApiError::InvalidInput("Passwords do not match!".to_string()));
        }

        let response = self
            .client
            .post(self.url("/register"))
            .json(&RegisterRequest { email, password })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status == StatusCode::CREATED {
            info!(email, "registered");
            return Ok(parse_message(&body).unwrap_or_else(|| "Registration successful".to_string()));
        }
        Err(ApiError::Status {
            status: status.as_u16(),
            message: parse_message(&body).unwrap_or(body),
        })
    }

    pub async fn logout(&self, session: &Session) -> Result<String, ApiError> {
        let request = self.authorized(self.client.post(self.url("/logout")), session);
        let reply: ActionReply = decode(request.send().await?).await?;
        Ok(reply.text())
    }

    pub async fn get_users(
        &self,
        session: &Session,
        page: usize,
        limit: usize,
    ) -> Result<UsersPage, ApiError> {
        let request = self
            .client
            .get(self.url("/get_users"))
            .query(&[("page", page), ("limit", limit)]);
        let response = self.authorized(request, session).send().await?;
        decode(response).await
    }

    /// Paged listing; admins see every active document
    pub async fn get_documents(
        &self,
        session: &Session,
        page: usize,
        limit: usize,
    ) -> Result<DocumentsPage, ApiError> {
        let request = self
            .client
            .get(self.url("/get_documents"))
            .query(&[("page", page), ("limit", limit)]);
        let response = self.authorized(request, session).send().await?;
        decode(response).await
    }

    /// Every document owned by the caller, unpaged
    pub async fn get_user_documents(&self, session: &Session) -> Result<DocumentsPage, ApiError> {
        let request = self.client.get(self.url("/get_user_documents"));
        let response = self.authorized(request, session).send().await?;
        decode(response).await
    }

    pub async fn get_activity_logs(
        &self,
        session: &Session,
        search_term: &str,
    ) -> Result<ActivityLogs, ApiError> {
        let request = self
            .client
            .post(self.url("/get_activity_logs"))
            .json(&ActivityLogQuery { search_term });
        let response = self.authorized(request, session).send().await?;
        decode(response).await
    }

    pub async fn get_dashboard_data(&self, session: &Session) -> Result<DashboardData, ApiError> {
        let request = self.client.get(self.url("/get_dashboard_data"));
        decode(self.authorized(request, session).send().await?).await
    }

    pub async fn get_document_count(&self, session: &Session) -> Result<u64, ApiError> {
        let request = self.client.get(self.url("/get-document-count"));
        let count: DocumentCount = decode(self.authorized(request, session).send().await?).await?;
        Ok(count.count)
    }

    pub async fn get_display_name(&self, session: &Session) -> Result<String, ApiError> {
        let path = match session.role() {
            Role::Admin => "/get_admin_name",
            Role::User => "/get_user_name",
        };
        let request = self.client.get(self.url(path));
        let name: DisplayName = decode(self.authorized(request, session).send().await?).await?;
        Ok(name.name)
    }

    pub async fn set_user_active(
        &self,
        session: &Session,
        user_id: &str,
        is_active: bool,
    ) -> Result<String, ApiError> {
        let request = self
            .client
            .post(self.url("/admin/users/status"))
            .json(&UserStatusRequest { user_id, is_active });
        let reply: ActionReply = decode(self.authorized(request, session).send().await?).await?;
        info!(user_id, is_active, "user status updated");
        Ok(reply.text())
    }

    pub async fn delete_user(&self, session: &Session, user_id: &str) -> Result<String, ApiError> {
        let request = self
            .client
            .delete(self.url("/admin/users/delete"))
            .query(&[("user_id", user_id)]);
        let reply: ActionReply = decode(self.authorized(request, session).send().await?).await?;
        info!(user_id, "user deleted");
        Ok(reply.text())
    }

    pub async fn upload_document(&self, session: &Session, path: &Path) -> Result<String, ApiError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ApiError::InvalidInput(format!("not a file: {}", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        debug!(file = %filename, size = bytes.len(), "uploading");

        let form = Form::new().part("file", Part::bytes(bytes).file_name(filename));
        let request = self.client.post(self.url("/upload_document")).multipart(form);
        let reply: ActionReply = decode(self.authorized(request, session).send().await?).await?;
        Ok(reply.text())
    }

    pub async fn download_document(
        &self,
        session: &Session,
        document_id: &str,
    ) -> Result<DownloadedFile, ApiError> {
        let path = format!("/{}/document/{}/download", session.role(), document_id);
        let request = self.client.get(self.url(&path));
        let response = check_status(self.authorized(request, session).send().await?).await?;

        let filename = filename_from_disposition(
            response
                .headers()
                .get(CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok()),
        );
        let bytes = response.bytes().await?.to_vec();
        info!(document_id, file = %filename, size = bytes.len(), "downloaded");
        Ok(DownloadedFile { filename, bytes })
    }

    /// Delete through the admin or owner endpoint depending on the caller
    pub async fn delete_document(
        &self,
        session: &Session,
        document_id: &str,
    ) -> Result<String, ApiError> {
        let path = format!("/{}/document/{}/delete", session.role(), document_id);
        let request = self.client.delete(self.url(&path));
        let reply: ActionReply = decode(self.authorized(request, session).send().await?).await?;
        info!(document_id, "document deleted");
        Ok(reply.text())
    }
}

fn parse_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(error_message)
}

/// Turn a non-2xx response into `ApiError::Status`
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = parse_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Check status, parse JSON, honour `success: false`, then decode into `T`
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let response = check_status(response).await?;
    let text = response.text().await?;
    let body: Value = serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))?;
    decode_body(body)
}

pub(crate) fn decode_body<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    if body.get("success") == Some(&Value::Bool(false)) {
        let message = error_message(&body).unwrap_or_else(|| "request was rejected".to_string());
        return Err(ApiError::Rejected(message));
    }
    serde_json::from_value(body).map_err(|e| ApiError::Parse(e.to_string()))
}
