pub mod group;
pub mod lifecycle;
pub mod merge;

pub use group::group_sequences;
pub use lifecycle::{lifecycles, mean_time_to_acknowledge, AlarmLifecycle};
pub use merge::{consolidate, summarize, Consolidated, EventSummary};
