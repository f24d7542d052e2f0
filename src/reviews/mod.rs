//! Peer reviews, bucketed by calendar month.

pub mod handlers;
pub mod rotation;
pub mod service;

pub use rotation::{bucket_key, next_month_start, spawn_purge_task, PurgeTask, ReviewRotation};
pub use service::{NewReview, ReviewService};
