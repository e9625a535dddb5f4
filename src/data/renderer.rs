//! Presentation sink for view output.
//!
//! A `TabularView` never touches a terminal or a DOM; it hands plain rows
//! and its current state to every subscribed renderer.

use crate::data::row::Row;
use crate::data::tabular_view::ViewState;

pub trait Renderer: Send + Sync {
    fn draw(&self, rows: &[Row], state: &ViewState);
}

impl<F> Renderer for F
where
    F: Fn(&[Row], &ViewState) + Send + Sync,
{
    fn draw(&self, rows: &[Row], state: &ViewState) {
        self(rows, state)
    }
}

/// Handle returned by `TabularView::subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);
