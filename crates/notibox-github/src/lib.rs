//! GitHub notifications API client
//!
//! A small client over the parts of the GitHub REST API needed to mirror a
//! user's notification inbox: paginated thread listing and subject lookups.
//!
//! ```no_run
//! use notibox_github::{FetchNotificationsParams, GithubClient};
//!
//! # async fn run() -> notibox_github::Result<()> {
//! let client = GithubClient::new("ghp_example")?;
//! let threads = client
//!     .fetch_notifications(&FetchNotificationsParams::default())
//!     .await?;
//! println!("{} threads", threads.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
pub mod retry;

pub use client::GithubClient;
pub use error::{ApiError, Error, Result};
pub use models::{FetchNotificationsParams, NotificationThread};
pub use retry::RetryConfig;
