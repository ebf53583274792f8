//! Pusher dashboard: one commit feed per tracked project, polled together and
//! merged into a single grid.

pub mod aggregator;
pub mod feed;
pub mod merge;
pub mod query;

pub use aggregator::{Aggregator, AggregatorConfig, AggregatorState, Snapshot};
pub use feed::{Feed, fetch_round};
pub use merge::{MergedRow, PusherView, merge_rows};
pub use query::PusherQuery;
