//! Output formatting utilities for the nb CLI.
//!
//! - [`notifications`] - listing, polling and detail views
//! - [`tags`] - tag listing
//! - [`rules`] - rule and view listings
//! - [`query`] - query check and field reference
//! - [`helpers`] - common formatting utilities (truncation, markers, times)

pub mod helpers;
mod notifications;
mod query;
mod rules;
mod tags;

pub use notifications::{
    format_item_details, format_item_json, format_list_json, format_list_table,
    format_poll_json, format_poll_table, format_updated_json,
};
pub use query::{format_check_json, format_check_text, format_fields_json, format_fields_table};
pub use rules::{
    describe_actions, format_rules_json, format_rules_table, format_views_json, format_views_table,
};
pub use tags::{format_tags_json, format_tags_table};
