pub mod activity_feed;
pub mod dashboard;

pub use activity_feed::{recent_activity, ActivityFeed};
pub use dashboard::{load_dashboard, DashboardSummary};
