//! Core of notibox: the notification query language, storage and services.
//!
//! - [`query`] parses search strings such as `repo:cli is:unread` and lowers
//!   them to SQL or evaluates them in memory with identical results.
//! - [`store`] persists notifications, repositories, tags and sync state.
//! - [`notification`] is the service front ends call to list, triage and tag
//!   notifications.
//! - [`sync`] mirrors GitHub notification threads into the store.
//! - [`views`] saves named queries, and [`rules`] runs saved queries against
//!   newly synced notifications to triage them automatically.
//!
//! ```
//! use chrono::Utc;
//! use notibox_core::models::Notification;
//! use notibox_core::query::{EvalTarget, Evaluator};
//!
//! let evaluator = Evaluator::new("is:unread type:pullrequest").unwrap();
//! let notification = Notification {
//!     subject_type: "PullRequest".to_string(),
//!     ..Default::default()
//! };
//! assert!(evaluator.matches(&EvalTarget::new(&notification), Utc::now()));
//! ```

pub mod models;
pub mod notification;
pub mod query;
pub mod rules;
pub mod store;
pub mod sync;
pub mod views;

pub use notification::{NotificationService, ServiceError};
pub use rules::{RuleMatcher, RuleService};
pub use store::{SqliteStore, Store, StoreError};
pub use sync::{SyncError, SyncService, SyncSettings};
pub use views::ViewService;
