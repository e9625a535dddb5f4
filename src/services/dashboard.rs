use anyhow::{Context, Result};
use tracing::debug;

use crate::api::client::DmsApiClient;
use crate::api::models::RecentActivity;
use crate::session::{Role, Session};

/// Header figures shown on login
#[derive(Debug, Clone)]
pub struct DashboardSummary {
    pub display_name: String,
    pub total_documents: u64,
    pub total_users: u64,
    pub recent_activities: Vec<RecentActivity>,
    /// Documents owned by the caller; only fetched for regular users
    pub own_documents: Option<u64>,
}

/// Fetch the dashboard figures and the caller's display name concurrently
pub async fn load_dashboard(client: &DmsApiClient, session: &Session) -> Result<DashboardSummary> {
    let (data, display_name) = tokio::try_join!(
        client.get_dashboard_data(session),
        client.get_display_name(session)
    )
    .context("Failed to load dashboard")?;

    let own_documents = match session.role() {
        Role::User => Some(
            client
                .get_document_count(session)
                .await
                .context("Failed to count documents")?,
        ),
        Role::Admin => None,
    };

    debug!(
        documents = data.total_documents,
        users = data.total_users,
        activities = data.recent_activities.len(),
        "dashboard loaded"
    );

    Ok(DashboardSummary {
        display_name,
        total_documents: data.total_documents,
        total_users: data.total_users,
        recent_activities: data.recent_activities,
        own_documents,
    })
}
