//! `DataSource` implementations backed by the HTTP API

use async_trait::async_trait;

use crate::api::client::DmsApiClient;
use crate::data::data_source::DataSource;
use crate::data::row::Dataset;
use crate::data::tabular_view::PaginationMode;
use crate::error::ViewError;
use crate::session::{Role, Session};

const ID_FIELD: &str = "id";

/// Admin user listing, paginated by the server
#[derive(Clone)]
pub struct UsersSource {
    client: DmsApiClient,
    session: Session,
}

impl UsersSource {
    pub fn new(client: DmsApiClient, session: Session) -> Self {
        Self { client, session }
    }

    pub fn mode(&self) -> PaginationMode {
        PaginationMode::ServerDriven
    }
}

#[async_trait]
impl DataSource for UsersSource {
    async fn fetch_page(&self, page: usize, page_size: usize) -> Result<Dataset, ViewError> {
        let reply = self.client.get_users(&self.session, page, page_size).await?;
        Dataset::from_json_rows(&reply.users, ID_FIELD, Some(reply.total))
    }

    fn name(&self) -> &str {
        "users"
    }
}

/// Document listing. Admins page through every document on the server;
/// regular users get their own documents in one response.
#[derive(Clone)]
pub struct DocumentsSource {
    client: DmsApiClient,
    session: Session,
}

impl DocumentsSource {
    pub fn new(client: DmsApiClient, session: Session) -> Self {
        Self { client, session }
    }

    pub fn mode(&self) -> PaginationMode {
        match self.session.role() {
            Role::Admin => PaginationMode::ServerDriven,
            Role::User => PaginationMode::ClientDriven,
        }
    }
}

#[async_trait]
impl DataSource for DocumentsSource {
    async fn fetch_page(&self, page: usize, page_size: usize) -> Result<Dataset, ViewError> {
        let reply = match self.session.role() {
            Role::Admin => {
                self.client
                    .get_documents(&self.session, page, page_size)
                    .await?
            }
            Role::User => {
                let mut reply = self.client.get_user_documents(&self.session).await?;
                // whole list; the view slices it
                reply.total = None;
                reply
            }
        };
        Dataset::from_json_rows(&reply.documents, ID_FIELD, reply.total)
    }

    fn name(&self) -> &str {
        "documents"
    }
}

/// Activity log, optionally narrowed server-side by a search term
#[derive(Clone)]
pub struct ActivityLogSource {
    client: DmsApiClient,
    session: Session,
    search_term: String,
}

impl ActivityLogSource {
    pub fn new(client: DmsApiClient, session: Session, search_term: impl Into<String>) -> Self {
        Self {
            client,
            session,
            search_term: search_term.into(),
        }
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn mode(&self) -> PaginationMode {
        PaginationMode::ClientDriven
    }
}

#[async_trait]
impl DataSource for ActivityLogSource {
    async fn fetch_page(&self, _page: usize, _page_size: usize) -> Result<Dataset, ViewError> {
        let reply = self
            .client
            .get_activity_logs(&self.session, &self.search_term)
            .await?;
        Dataset::from_json_rows(&reply.logs, ID_FIELD, None)
    }

    fn name(&self) -> &str {
        "activity"
    }
}
