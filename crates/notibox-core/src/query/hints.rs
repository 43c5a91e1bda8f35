//! Action hints: which status changes would drop a notification from view.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::evaluator::{EvalTarget, Evaluator};
use crate::models::Notification;

/// How far ahead a hypothetical snooze is placed.
const HYPOTHETICAL_SNOOZE_HOURS: i64 = 24;

/// A mutable status attribute of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HintFlag {
    Read,
    Archived,
    Starred,
    Snoozed,
    Muted,
    Filtered,
}

impl HintFlag {
    pub const ALL: [HintFlag; 6] = [
        HintFlag::Read,
        HintFlag::Archived,
        HintFlag::Starred,
        HintFlag::Snoozed,
        HintFlag::Muted,
        HintFlag::Filtered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HintFlag::Read => "read",
            HintFlag::Archived => "archived",
            HintFlag::Starred => "starred",
            HintFlag::Snoozed => "snoozed",
            HintFlag::Muted => "muted",
            HintFlag::Filtered => "filtered",
        }
    }

    /// Returns a copy of the notification with this flag flipped.
    fn flipped(&self, notification: &Notification, now: DateTime<Utc>) -> Notification {
        let mut copy = notification.clone();
        match self {
            HintFlag::Read => copy.is_read = !copy.is_read,
            HintFlag::Archived => copy.archived = !copy.archived,
            HintFlag::Starred => copy.starred = !copy.starred,
            HintFlag::Muted => copy.muted = !copy.muted,
            HintFlag::Filtered => copy.filtered = !copy.filtered,
            HintFlag::Snoozed => {
                copy.snoozed_until = if notification.is_snoozed(now) {
                    None
                } else {
                    Some(now + Duration::hours(HYPOTHETICAL_SNOOZE_HOURS))
                };
            }
        }
        copy
    }
}

impl fmt::Display for HintFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flags whose change would remove the notification from the current view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionHints {
    pub dismissed_on: Vec<HintFlag>,
}

impl ActionHints {
    pub fn contains(&self, flag: HintFlag) -> bool {
        self.dismissed_on.contains(&flag)
    }

    pub fn is_empty(&self) -> bool {
        self.dismissed_on.is_empty()
    }
}

impl Evaluator {
    /// Computes action hints for a notification under this query.
    ///
    /// Each flag is flipped on a private copy and the query re-evaluated; the
    /// shared evaluator is never mutated. Notifications that do not match to
    /// begin with get no hints.
    pub fn compute_action_hints(&self, target: &EvalTarget<'_>, now: DateTime<Utc>) -> ActionHints {
        if !self.matches(target, now) {
            return ActionHints::default();
        }

        let dismissed_on = HintFlag::ALL
            .iter()
            .copied()
            .filter(|flag| {
                let variant = flag.flipped(target.notification, now);
                let hypothetical = EvalTarget {
                    notification: &variant,
                    ..*target
                };
                !self.matches(&hypothetical, now)
            })
            .collect();

        ActionHints { dismissed_on }
    }
}
