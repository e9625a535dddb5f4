//! Data layer: rows, filtering, sorting and the paginated view
//!
//! This module separates what is displayed (a `TabularView` over rows)
//! from where the rows come from (`DataSource`) and how they are shown
//! (`Renderer`).

pub mod compare;
pub mod data_source;
pub mod filter;
pub mod poller;
pub mod renderer;
pub mod row;
pub mod tabular_view;

pub use data_source::{DataSource, VecDataSource};
pub use filter::{ActionCategory, FilterSpec, KeywordScope};
pub use poller::PollHandle;
pub use renderer::{Renderer, SubscriptionId};
pub use row::{column_names, CellValue, Dataset, Row};
pub use tabular_view::{
    LoadOutcome, LoadTicket, PageChange, PaginationMode, SortOrder, SortSpec, TabularView,
    ViewState, ViewStatus,
};
