use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::data::compare::compare_rows_by;
use crate::data::data_source::DataSource;
use crate::data::filter::{FilterSpec, KeywordScope};
use crate::data::renderer::{Renderer, SubscriptionId};
use crate::data::row::{Dataset, Row};
use crate::error::ViewError;

/// Who owns pagination for a view. Fixed for the lifetime of the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationMode {
    /// Every page change refetches; the source already sliced the rows
    ServerDriven,
    /// The source returns the whole set once; page changes reslice locally
    ClientDriven,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub order: SortOrder,
}

/// Pagination, sort and filter configuration that drives `render`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub page: usize,
    pub page_size: usize,
    pub sort: Option<SortSpec>,
    pub filter: FilterSpec,
    pub scope: Option<KeywordScope>,
}

impl ViewState {
    fn new(page_size: usize) -> Self {
        Self {
            page: 1,
            page_size,
            sort: None,
            filter: FilterSpec::default(),
            scope: None,
        }
    }

    pub fn sort_column(&self) -> Option<&str> {
        self.sort.as_ref().map(|s| s.column.as_str())
    }

    pub fn sort_order(&self) -> Option<SortOrder> {
        self.sort.as_ref().map(|s| s.order)
    }
}

/// Coarse state of a view for the host to display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewStatus {
    /// No load has succeeded yet
    NotLoaded,
    /// Rows are available
    Ready,
    /// Data is loaded but filtering left nothing to show
    NoMatches,
    /// The most recent load failed; earlier rows are still held
    LoadFailed,
}

/// Result of a load that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The response was adopted as the view's dataset
    Applied(Arc<Dataset>),
    /// A newer load was issued (or the view was torn down) before this
    /// response arrived, so it was dropped
    Stale,
}

impl LoadOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, LoadOutcome::Applied(_))
    }
}

/// Result of a page navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageChange {
    Moved(usize),
    /// Requested page was out of range, nothing happened
    Unchanged,
    /// The page fetch was overtaken by a newer load
    Superseded,
}

/// Issued by `begin_load`; carries the request sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    seq: u64,
    page: usize,
    page_size: usize,
}

impl LoadTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn page(&self) -> usize {
        self.page
    }
}

struct ViewInner {
    state: ViewState,
    dataset: Option<Arc<Dataset>>,
    issued: u64,
    last_error: Option<ViewError>,
    closed: bool,
    subscribers: Vec<(SubscriptionId, Arc<dyn Renderer>)>,
    next_subscription: u64,
}

impl ViewInner {
    fn filtered(&self) -> Vec<&Row> {
        let Some(dataset) = &self.dataset else {
            return Vec::new();
        };
        let state = &self.state;
        let mut rows: Vec<&Row> = dataset
            .rows
            .iter()
            .filter(|row| state.scope.as_ref().map_or(true, |s| s.matches(row)))
            .filter(|row| state.filter.matches(row))
            .collect();

        if let Some(sort) = &state.sort {
            // Vec::sort_by is stable, ties keep fetch order
            rows.sort_by(|a, b| {
                let ord = compare_rows_by(a, b, &sort.column);
                match sort.order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                }
            });
        }
        rows
    }

    fn visible(&self, mode: PaginationMode) -> Vec<Row> {
        let rows = self.filtered();
        match mode {
            PaginationMode::ServerDriven => rows.into_iter().cloned().collect(),
            PaginationMode::ClientDriven => {
                let start = (self.state.page - 1) * self.state.page_size;
                rows.into_iter()
                    .skip(start)
                    .take(self.state.page_size)
                    .cloned()
                    .collect()
            }
        }
    }

    fn total(&self, mode: PaginationMode) -> usize {
        match mode {
            PaginationMode::ServerDriven => self.dataset.as_ref().map_or(0, |d| d.total),
            PaginationMode::ClientDriven => self.filtered().len(),
        }
    }

    fn page_count(&self, mode: PaginationMode) -> usize {
        self.total(mode).div_ceil(self.state.page_size).max(1)
    }

    fn clamp_page(&mut self, mode: PaginationMode) {
        if mode == PaginationMode::ClientDriven {
            let last = self.page_count(mode);
            if self.state.page > last {
                self.state.page = last;
            }
        }
    }
}

pub(crate) struct Shared<S> {
    source: S,
    mode: PaginationMode,
    inner: Mutex<ViewInner>,
}

/// A filtered, sorted and paginated window over rows from a `DataSource`.
///
/// Cloning is cheap and every clone drives the same view. Filter and sort
/// are applied synchronously to the rows already held; only `load` and
/// server-driven page changes go back to the source. Overlapping loads are
/// allowed and the most recently issued one wins.
pub struct TabularView<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for TabularView<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: DataSource> TabularView<S> {
    pub fn new(source: S, mode: PaginationMode, page_size: usize) -> Result<Self, ViewError> {
        if page_size == 0 {
            return Err(ViewError::validation("page size must be at least 1"));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                source,
                mode,
                inner: Mutex::new(ViewInner {
                    state: ViewState::new(page_size),
                    dataset: None,
                    issued: 0,
                    last_error: None,
                    closed: false,
                    subscribers: Vec::new(),
                    next_subscription: 0,
                }),
            }),
        })
    }

    pub(crate) fn from_shared(shared: Arc<Shared<S>>) -> Self {
        Self { shared }
    }

    pub(crate) fn downgrade(&self) -> std::sync::Weak<Shared<S>> {
        Arc::downgrade(&self.shared)
    }

    fn lock(&self) -> MutexGuard<'_, ViewInner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mode(&self) -> PaginationMode {
        self.shared.mode
    }

    pub fn source(&self) -> &S {
        &self.shared.source
    }

    /// Register a fetch and take the next sequence number.
    ///
    /// Only the response carrying the latest ticket will be adopted by
    /// `finish_load`.
    pub fn begin_load(&self, page: usize, page_size: usize) -> Result<LoadTicket, ViewError> {
        if page == 0 {
            return Err(ViewError::validation("pages are numbered from 1"));
        }
        if page_size == 0 {
            return Err(ViewError::validation("page size must be at least 1"));
        }
        let mut inner = self.lock();
        if inner.closed {
            return Err(ViewError::validation("view has been torn down"));
        }
        inner.issued += 1;
        Ok(LoadTicket {
            seq: inner.issued,
            page,
            page_size,
        })
    }

    /// Apply (or discard) the response for a ticket
    pub fn finish_load(
        &self,
        ticket: LoadTicket,
        result: Result<Dataset, ViewError>,
    ) -> Result<LoadOutcome, ViewError> {
        let mut inner = self.lock();
        if inner.closed || ticket.seq != inner.issued {
            warn!(
                source = self.shared.source.name(),
                seq = ticket.seq,
                latest = inner.issued,
                "discarding stale response"
            );
            return Ok(LoadOutcome::Stale);
        }

        match result {
            Ok(dataset) => {
                let dataset = Arc::new(dataset);
                info!(
                    source = self.shared.source.name(),
                    page = ticket.page,
                    rows = dataset.len(),
                    total = dataset.total,
                    "load applied"
                );
                inner.dataset = Some(Arc::clone(&dataset));
                inner.state.page = ticket.page;
                inner.state.page_size = ticket.page_size;
                inner.last_error = None;
                inner.clamp_page(self.shared.mode);
                self.notify(inner);
                Ok(LoadOutcome::Applied(dataset))
            }
            Err(err) => {
                warn!(source = self.shared.source.name(), error = %err, "load failed");
                inner.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Fetch a page from the source and adopt it if no newer load was
    /// issued in the meantime.
    ///
    /// The sequence number is taken when `load` is called, not when the
    /// returned future is first polled, so issue order is call order.
    pub fn load(
        &self,
        page: usize,
        page_size: usize,
    ) -> impl Future<Output = Result<LoadOutcome, ViewError>> + '_ {
        let ticket = self.begin_load(page, page_size);
        async move {
            let ticket = ticket?;
            debug!(
                source = self.shared.source.name(),
                seq = ticket.seq,
                page,
                page_size,
                "fetching"
            );
            let result = self.shared.source.fetch_page(page, page_size).await;
            self.finish_load(ticket, result)
        }
    }

    /// Refetch the current page
    pub fn reload(&self) -> impl Future<Output = Result<LoadOutcome, ViewError>> + '_ {
        let (page, page_size) = {
            let inner = self.lock();
            (inner.state.page, inner.state.page_size)
        };
        self.load(page, page_size)
    }

    pub fn set_filter<I, F>(&self, text: impl Into<String>, fields: I)
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        let mut inner = self.lock();
        inner.state.filter = FilterSpec::new(text, fields);
        inner.clamp_page(self.shared.mode);
        self.notify(inner);
    }

    pub fn set_scope(&self, scope: Option<KeywordScope>) {
        let mut inner = self.lock();
        inner.state.scope = scope;
        inner.clamp_page(self.shared.mode);
        self.notify(inner);
    }

    /// Sort by `column`, flipping the direction when it is already the
    /// sort column
    pub fn set_sort(&self, column: &str) {
        let mut inner = self.lock();
        let order = match &inner.state.sort {
            Some(current) if current.column == column => current.order.toggled(),
            _ => SortOrder::Ascending,
        };
        inner.state.sort = Some(SortSpec {
            column: column.to_string(),
            order,
        });
        self.notify(inner);
    }

    pub fn clear_sort(&self) {
        let mut inner = self.lock();
        inner.state.sort = None;
        self.notify(inner);
    }

    pub async fn next_page(&self) -> Result<PageChange, ViewError> {
        let (page, last) = {
            let inner = self.lock();
            if inner.dataset.is_none() {
                return Ok(PageChange::Unchanged);
            }
            (inner.state.page, inner.page_count(self.shared.mode))
        };
        if page >= last {
            return Ok(PageChange::Unchanged);
        }
        self.move_to(page + 1).await
    }

    pub async fn prev_page(&self) -> Result<PageChange, ViewError> {
        let page = {
            let inner = self.lock();
            if inner.dataset.is_none() {
                return Ok(PageChange::Unchanged);
            }
            inner.state.page
        };
        if page <= 1 {
            return Ok(PageChange::Unchanged);
        }
        self.move_to(page - 1).await
    }

    /// Explicit jump. Unlike next/prev, an out-of-range page is an error.
    pub async fn go_to_page(&self, page: usize) -> Result<PageChange, ViewError> {
        let last = self.total_pages();
        if page == 0 || page > last {
            return Err(ViewError::validation(format!(
                "page {} is out of range (1..={})",
                page, last
            )));
        }
        self.move_to(page).await
    }

    async fn move_to(&self, page: usize) -> Result<PageChange, ViewError> {
        match self.shared.mode {
            PaginationMode::ClientDriven => {
                let mut inner = self.lock();
                inner.state.page = page;
                self.notify(inner);
                Ok(PageChange::Moved(page))
            }
            PaginationMode::ServerDriven => {
                let page_size = self.lock().state.page_size;
                match self.load(page, page_size).await? {
                    LoadOutcome::Applied(_) => Ok(PageChange::Moved(page)),
                    LoadOutcome::Stale => Ok(PageChange::Superseded),
                }
            }
        }
    }

    /// Rows to display: filtered, sorted and, for client-driven views,
    /// sliced to the current page
    pub fn render(&self) -> Vec<Row> {
        self.lock().visible(self.shared.mode)
    }

    /// Number of rows passing the filter, before any client-side slicing
    pub fn matching_count(&self) -> usize {
        self.lock().filtered().len()
    }

    /// Total used for page arithmetic
    pub fn total(&self) -> usize {
        self.lock().total(self.shared.mode)
    }

    pub fn total_pages(&self) -> usize {
        self.lock().page_count(self.shared.mode)
    }

    pub fn state(&self) -> ViewState {
        self.lock().state.clone()
    }

    pub fn dataset(&self) -> Option<Arc<Dataset>> {
        self.lock().dataset.clone()
    }

    pub fn last_error(&self) -> Option<ViewError> {
        self.lock().last_error.clone()
    }

    pub fn status(&self) -> ViewStatus {
        let inner = self.lock();
        if inner.last_error.is_some() {
            ViewStatus::LoadFailed
        } else if inner.dataset.is_none() {
            ViewStatus::NotLoaded
        } else if inner.filtered().is_empty() {
            ViewStatus::NoMatches
        } else {
            ViewStatus::Ready
        }
    }

    pub fn subscribe(&self, renderer: Arc<dyn Renderer>) -> SubscriptionId {
        let mut inner = self.lock();
        inner.next_subscription += 1;
        let id = SubscriptionId(inner.next_subscription);
        inner.subscribers.push((id, renderer));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(sub, _)| *sub != id);
        inner.subscribers.len() != before
    }

    /// Close the view: in-flight and future loads are discarded, polls
    /// stop at their next tick and subscribers are released.
    pub fn teardown(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.subscribers.clear();
        debug!(source = self.shared.source.name(), "view torn down");
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Push the current rows to every subscriber. Renderers run after the
    /// lock is released so they may call back into the view.
    fn notify(&self, inner: MutexGuard<'_, ViewInner>) {
        if inner.closed || inner.subscribers.is_empty() {
            return;
        }
        let rows = inner.visible(self.shared.mode);
        let state = inner.state.clone();
        let subscribers: Vec<Arc<dyn Renderer>> = inner
            .subscribers
            .iter()
            .map(|(_, renderer)| Arc::clone(renderer))
            .collect();
        drop(inner);

        for renderer in subscribers {
            renderer.draw(&rows, &state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::data_source::VecDataSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn users() -> Vec<Row> {
        vec![
            Row::new("1")
                .with("id", 1)
                .with("email", "a@x.com")
                .with("role", "user"),
            Row::new("2")
                .with("id", 2)
                .with("email", "b@x.com")
                .with("role", "admin"),
        ]
    }

    fn ids(rows: &[Row]) -> Vec<&str> {
        rows.iter().map(Row::id).collect()
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let result = TabularView::new(VecDataSource::new(users()), PaginationMode::ClientDriven, 0);
        assert!(matches!(result, Err(ViewError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_filter_example() {
        let view =
            TabularView::new(VecDataSource::new(users()), PaginationMode::ClientDriven, 10).unwrap();
        view.load(1, 10).await.unwrap();

        view.set_filter("b", ["email"]);
        assert_eq!(ids(&view.render()), vec!["2"]);
    }

    #[tokio::test]
    async fn test_status_distinguishes_no_matches() {
        let view =
            TabularView::new(VecDataSource::new(users()), PaginationMode::ClientDriven, 10).unwrap();
        assert_eq!(view.status(), ViewStatus::NotLoaded);

        view.load(1, 10).await.unwrap();
        assert_eq!(view.status(), ViewStatus::Ready);

        view.set_filter("nobody", ["email"]);
        assert_eq!(view.status(), ViewStatus::NoMatches);
        assert!(view.render().is_empty());
        assert!(view.last_error().is_none());
    }

    #[test]
    fn test_stale_ticket_is_dropped() {
        let view =
            TabularView::new(VecDataSource::new(users()), PaginationMode::ServerDriven, 1).unwrap();
        let first = view.begin_load(1, 1).unwrap();
        let second = view.begin_load(2, 1).unwrap();
        assert!(second.seq() > first.seq());

        let newer = Dataset::new(vec![users()[1].clone()], 2);
        let older = Dataset::new(vec![users()[0].clone()], 2);
        assert!(view.finish_load(second, Ok(newer)).unwrap().is_applied());
        assert_eq!(view.finish_load(first, Ok(older)).unwrap(), LoadOutcome::Stale);

        assert_eq!(ids(&view.render()), vec!["2"]);
        assert_eq!(view.state().page, 2);
    }

    #[test]
    fn test_stale_error_is_dropped_too() {
        let view =
            TabularView::new(VecDataSource::new(users()), PaginationMode::ServerDriven, 1).unwrap();
        let first = view.begin_load(1, 1).unwrap();
        let second = view.begin_load(1, 1).unwrap();
        view.finish_load(second, Ok(Dataset::from_rows(users()))).unwrap();

        let outcome = view.finish_load(first, Err(ViewError::fetch("timeout")));
        assert_eq!(outcome, Ok(LoadOutcome::Stale));
        assert!(view.last_error().is_none());
    }

    #[test]
    fn test_failed_load_keeps_last_good_state() {
        let view =
            TabularView::new(VecDataSource::new(users()), PaginationMode::ServerDriven, 10).unwrap();
        let ok = view.begin_load(1, 10).unwrap();
        view.finish_load(ok, Ok(Dataset::from_rows(users()))).unwrap();

        let bad = view.begin_load(2, 10).unwrap();
        let err = view
            .finish_load(bad, Err(ViewError::parse("unexpected token")))
            .unwrap_err();
        assert!(matches!(err, ViewError::Parse { .. }));

        assert_eq!(view.status(), ViewStatus::LoadFailed);
        assert_eq!(view.state().page, 1);
        assert_eq!(view.render().len(), 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_every_change() {
        let view =
            TabularView::new(VecDataSource::new(users()), PaginationMode::ClientDriven, 10).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let id = view.subscribe(Arc::new(move |_rows: &[Row], _state: &ViewState| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        view.load(1, 10).await.unwrap();
        view.set_sort("email");
        view.set_filter("a", ["email"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        assert!(view.unsubscribe(id));
        view.set_sort("email");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_teardown_discards_loads() {
        let view =
            TabularView::new(VecDataSource::new(users()), PaginationMode::ClientDriven, 10).unwrap();
        let pending = view.begin_load(1, 10).unwrap();
        view.teardown();

        assert_eq!(
            view.finish_load(pending, Ok(Dataset::from_rows(users()))),
            Ok(LoadOutcome::Stale)
        );
        assert!(view.load(1, 10).await.is_err());
        assert_eq!(view.status(), ViewStatus::NotLoaded);
    }
}
