use chrono::{DateTime, NaiveDateTime};
use std::cmp::Ordering;
use std::sync::atomic::{self, AtomicUsize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::data::data_source::DataSource;
use crate::data::filter::ActionCategory;
use crate::data::poller::PollHandle;
use crate::data::renderer::SubscriptionId;
use crate::data::row::Row;
use crate::data::tabular_view::{PaginationMode, TabularView, ViewState};
use crate::error::ViewError;

pub const DEFAULT_RECENT_LIMIT: usize = 7;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

const TIMESTAMP_COLUMN: &str = "timestamp";

/// Parse the timestamp formats the backend emits. Zoned values are
/// normalised to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok())
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok())
}

/// Newest `limit` rows by their `timestamp` cell. Rows whose timestamp
/// cannot be parsed go last, keeping their original order.
pub fn recent_activity(rows: &[Row], limit: usize) -> Vec<Row> {
    let mut keyed: Vec<(Option<NaiveDateTime>, &Row)> = rows
        .iter()
        .map(|row| (parse_timestamp(&row.text(TIMESTAMP_COLUMN)), row))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    keyed
        .into_iter()
        .take(limit)
        .map(|(_, row)| row.clone())
        .collect()
}

/// Live activity log: a client-driven view refreshed on a fixed interval.
///
/// The poll handle lives in the feed, so dropping the feed stops polling.
pub struct ActivityFeed<S: DataSource + 'static> {
    view: TabularView<S>,
    poll: Option<PollHandle>,
    notice: Option<SubscriptionId>,
    interval: Duration,
    recent_limit: usize,
}

impl<S: DataSource + 'static> ActivityFeed<S> {
    pub fn new(
        source: S,
        page_size: usize,
        interval: Duration,
        recent_limit: usize,
    ) -> Result<Self, ViewError> {
        if interval.is_zero() {
            return Err(ViewError::validation("poll interval must be positive"));
        }
        Ok(Self {
            view: TabularView::new(source, PaginationMode::ClientDriven, page_size)?,
            poll: None,
            notice: None,
            interval,
            recent_limit,
        })
    }

    pub fn view(&self) -> &TabularView<S> {
        &self.view
    }

    /// Narrow the log to one category of actions, or clear with `None`
    pub fn set_category(&self, category: Option<ActionCategory>) {
        self.view.set_scope(category.map(ActionCategory::scope));
    }

    /// Start polling. Returns false when already running.
    pub fn start(&mut self) -> bool {
        if self.is_watching() {
            return false;
        }
        info!(every = ?self.interval, source = self.view.source().name(), "watching activity");
        self.poll = Some(self.view.start_polling(self.interval));
        true
    }

    /// Start polling and call `on_change` with the size of the whole log
    /// each time a refresh changes it. Returns false when already running.
    pub fn watch<F>(&mut self, on_change: F) -> bool
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        if self.is_watching() {
            return false;
        }
        self.clear_notice();

        let weak = self.view.downgrade();
        let baseline = self.view.dataset().map_or(usize::MAX, |d| d.total);
        let seen = Arc::new(AtomicUsize::new(baseline));
        let id = self.view.subscribe(Arc::new(move |_rows: &[Row], _state: &ViewState| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let Some(total) = TabularView::from_shared(shared).dataset().map(|d| d.total) else {
                return;
            };
            let previous = seen.swap(total, atomic::Ordering::SeqCst);
            if previous != usize::MAX && previous != total {
                on_change(total);
            }
        }));
        self.notice = Some(id);
        self.start()
    }

    fn clear_notice(&mut self) {
        if let Some(id) = self.notice.take() {
            self.view.unsubscribe(id);
        }
    }

    pub fn is_watching(&self) -> bool {
        self.poll.as_ref().is_some_and(|p| !p.is_finished())
    }

    /// Stop polling and wait for the task to exit
    pub async fn stop(&mut self) {
        self.clear_notice();
        if let Some(poll) = self.poll.take() {
            poll.stop().await;
            debug!("activity polling stopped");
        }
    }

    /// Most recent entries of whatever the feed last loaded
    pub fn recent(&self) -> Vec<Row> {
        self.view
            .dataset()
            .map(|d| recent_activity(&d.rows, self.recent_limit))
            .unwrap_or_default()
    }

    /// Stop polling and close the underlying view
    pub fn close(&mut self) {
        self.clear_notice();
        if let Some(poll) = self.poll.take() {
            poll.cancel();
        }
        self.view.teardown();
    }
}
