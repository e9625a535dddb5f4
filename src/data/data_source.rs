use async_trait::async_trait;
use std::sync::Arc;

use crate::data::row::{Dataset, Row};
use crate::error::ViewError;

/// Trait for abstracting where a view's rows come from (HTTP endpoint,
/// in-memory fixture, ...). The view never needs to know which.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch one page. Sources that cannot paginate return every row and
    /// report `total` as the number of rows returned.
    async fn fetch_page(&self, page: usize, page_size: usize) -> Result<Dataset, ViewError>;

    /// Short label used in logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<S: DataSource + ?Sized> DataSource for Arc<S> {
    async fn fetch_page(&self, page: usize, page_size: usize) -> Result<Dataset, ViewError> {
        (**self).fetch_page(page, page_size).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Fixed in-memory rows. Serves pages server-style when `paged` is set,
/// otherwise returns the whole set on every call.
#[derive(Debug, Clone)]
pub struct VecDataSource {
    rows: Arc<Vec<Row>>,
    paged: bool,
}

impl VecDataSource {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: Arc::new(rows),
            paged: false,
        }
    }

    pub fn paged(rows: Vec<Row>) -> Self {
        Self {
            rows: Arc::new(rows),
            paged: true,
        }
    }
}

#[async_trait]
impl DataSource for VecDataSource {
    async fn fetch_page(&self, page: usize, page_size: usize) -> Result<Dataset, ViewError> {
        if !self.paged {
            return Ok(Dataset::from_rows(self.rows.to_vec()));
        }
        let start = page.saturating_sub(1).saturating_mul(page_size);
        let rows = self
            .rows
            .iter()
            .skip(start)
            .take(page_size)
            .cloned()
            .collect();
        Ok(Dataset::new(rows, self.rows.len()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
