//! Registry of filterable fields and their value semantics.

use std::fmt;

use serde::Serialize;

/// A recognised filter field. Aliases resolve to the same variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    In,
    Is,
    Repo,
    Org,
    Author,
    Reason,
    Type,
    State,
    StateReason,
    Tags,
    Read,
    Archived,
    Muted,
    Snoozed,
    Filtered,
    Starred,
    Merged,
}

/// How a field's values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Case-insensitive substring match.
    Contains,
    /// Case-insensitive equality against a closed set; unknown values never match.
    Enum(&'static [&'static str]),
    /// `true/false/yes/no/1/0`.
    Boolean,
    /// Field with bespoke handling (`is`, `in`).
    Special,
}

/// Static description of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: FieldName,
    pub match_kind: MatchKind,
    pub negatable: bool,
    pub description: &'static str,
}

pub const REASONS: &[&str] = &[
    "approval_requested",
    "assign",
    "author",
    "ci_activity",
    "comment",
    "invitation",
    "manual",
    "member_feature_requested",
    "mention",
    "review_requested",
    "security_advisory_credit",
    "security_alert",
    "state_change",
    "subscribed",
    "team_mention",
];

pub const SUBJECT_TYPES: &[&str] = &[
    "CheckRun",
    "CheckSuite",
    "Commit",
    "Discussion",
    "Issue",
    "PullRequest",
    "Release",
    "RepositoryAdvisory",
    "RepositoryDependabotAlertsThread",
    "RepositoryInvitation",
    "RepositoryVulnerabilityAlert",
];

pub const STATES: &[&str] = &["open", "closed", "merged"];

pub const STATE_REASONS: &[&str] = &["completed", "not_planned", "reopened"];

pub const IS_VALUES: &[&str] = &[
    "read", "unread", "archived", "muted", "snoozed", "starred", "filtered",
];

pub const IN_VALUES: &[&str] = &["inbox", "archive", "snoozed", "filtered", "anywhere"];

const REGISTRY: &[FieldSpec] = &[
    FieldSpec {
        name: FieldName::In,
        match_kind: MatchKind::Special,
        negatable: false,
        description: "view scope: inbox, archive, snoozed, filtered, anywhere",
    },
    FieldSpec {
        name: FieldName::Is,
        match_kind: MatchKind::Special,
        negatable: true,
        description: "status flag: read, unread, archived, muted, snoozed, starred, filtered",
    },
    FieldSpec {
        name: FieldName::Repo,
        match_kind: MatchKind::Contains,
        negatable: true,
        description: "repository full name contains",
    },
    FieldSpec {
        name: FieldName::Org,
        match_kind: MatchKind::Contains,
        negatable: true,
        description: "repository owner",
    },
    FieldSpec {
        name: FieldName::Author,
        match_kind: MatchKind::Contains,
        negatable: true,
        description: "subject author login contains",
    },
    FieldSpec {
        name: FieldName::Reason,
        match_kind: MatchKind::Enum(REASONS),
        negatable: true,
        description: "why GitHub notified you",
    },
    FieldSpec {
        name: FieldName::Type,
        match_kind: MatchKind::Enum(SUBJECT_TYPES),
        negatable: true,
        description: "subject type",
    },
    FieldSpec {
        name: FieldName::State,
        match_kind: MatchKind::Enum(STATES),
        negatable: true,
        description: "subject state",
    },
    FieldSpec {
        name: FieldName::StateReason,
        match_kind: MatchKind::Enum(STATE_REASONS),
        negatable: true,
        description: "reason an issue was closed or reopened",
    },
    FieldSpec {
        name: FieldName::Tags,
        match_kind: MatchKind::Contains,
        negatable: true,
        description: "assigned tag slug contains",
    },
    FieldSpec {
        name: FieldName::Read,
        match_kind: MatchKind::Boolean,
        negatable: true,
        description: "read flag",
    },
    FieldSpec {
        name: FieldName::Archived,
        match_kind: MatchKind::Boolean,
        negatable: true,
        description: "archived flag",
    },
    FieldSpec {
        name: FieldName::Muted,
        match_kind: MatchKind::Boolean,
        negatable: true,
        description: "muted flag",
    },
    FieldSpec {
        name: FieldName::Snoozed,
        match_kind: MatchKind::Boolean,
        negatable: true,
        description: "snoozed into the future",
    },
    FieldSpec {
        name: FieldName::Filtered,
        match_kind: MatchKind::Boolean,
        negatable: true,
        description: "filtered flag",
    },
    FieldSpec {
        name: FieldName::Starred,
        match_kind: MatchKind::Boolean,
        negatable: true,
        description: "starred flag",
    },
    FieldSpec {
        name: FieldName::Merged,
        match_kind: MatchKind::Boolean,
        negatable: true,
        description: "pull request merged",
    },
];

/// Names accepted in queries, including aliases.
const NAMES: &[(&str, FieldName)] = &[
    ("in", FieldName::In),
    ("is", FieldName::Is),
    ("repo", FieldName::Repo),
    ("repository", FieldName::Repo),
    ("org", FieldName::Org),
    ("author", FieldName::Author),
    ("reason", FieldName::Reason),
    ("type", FieldName::Type),
    ("subject_type", FieldName::Type),
    ("state", FieldName::State),
    ("state_reason", FieldName::StateReason),
    ("tags", FieldName::Tags),
    ("tag", FieldName::Tags),
    ("read", FieldName::Read),
    ("archived", FieldName::Archived),
    ("muted", FieldName::Muted),
    ("snoozed", FieldName::Snoozed),
    ("filtered", FieldName::Filtered),
    ("starred", FieldName::Starred),
    ("merged", FieldName::Merged),
];

impl FieldName {
    /// Resolves a field name or alias, case-insensitively.
    pub fn lookup(name: &str) -> Option<FieldName> {
        let name = name.trim();
        NAMES
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, field)| *field)
    }

    /// Canonical query-language name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::In => "in",
            FieldName::Is => "is",
            FieldName::Repo => "repo",
            FieldName::Org => "org",
            FieldName::Author => "author",
            FieldName::Reason => "reason",
            FieldName::Type => "type",
            FieldName::State => "state",
            FieldName::StateReason => "state_reason",
            FieldName::Tags => "tags",
            FieldName::Read => "read",
            FieldName::Archived => "archived",
            FieldName::Muted => "muted",
            FieldName::Snoozed => "snoozed",
            FieldName::Filtered => "filtered",
            FieldName::Starred => "starred",
            FieldName::Merged => "merged",
        }
    }

    /// Registry entry for this field.
    pub fn spec(&self) -> &'static FieldSpec {
        // REGISTRY is declared in variant order.
        &REGISTRY[*self as usize]
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every registered field, in declaration order.
pub fn all_fields() -> impl Iterator<Item = &'static FieldSpec> {
    REGISTRY.iter()
}

/// Suggests the closest known field name for a misspelling.
pub fn suggest_field(name: &str) -> Option<&'static str> {
    let lower = name.to_ascii_lowercase();
    NAMES
        .iter()
        .map(|(candidate, _)| (*candidate, strsim::jaro_winkler(&lower, candidate)))
        .filter(|(_, score)| *score >= 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(candidate, _)| candidate)
}

/// Returns the canonical spelling of an enum value, if it is allowed.
pub fn canonical_enum_value(allowed: &'static [&'static str], value: &str) -> Option<&'static str> {
    let value = value.trim();
    allowed
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(value))
        .copied()
}

/// Parses a boolean field value.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Parses a `merged:` value, which also accepts `merged`/`unmerged`.
pub fn parse_merged(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "merged" => Some(true),
        "unmerged" => Some(false),
        other => parse_bool(other),
    }
}

/// Value of an `is:` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsValue {
    Read,
    Unread,
    Archived,
    Muted,
    Snoozed,
    Starred,
    Filtered,
}

impl IsValue {
    pub fn parse(value: &str) -> Option<IsValue> {
        match value.trim().to_ascii_lowercase().as_str() {
            "read" => Some(IsValue::Read),
            "unread" => Some(IsValue::Unread),
            "archived" => Some(IsValue::Archived),
            "muted" => Some(IsValue::Muted),
            "snoozed" => Some(IsValue::Snoozed),
            "starred" => Some(IsValue::Starred),
            "filtered" => Some(IsValue::Filtered),
            _ => None,
        }
    }
}

/// Checks a single value against the field's accepted set.
///
/// Returns a message for values the field can never accept. Unknown enum
/// values are deliberately accepted: they parse, and simply match nothing.
pub fn check_value(field: FieldName, value: &str) -> Option<String> {
    let valid = match field {
        FieldName::In => canonical_enum_value(IN_VALUES, value).is_some(),
        FieldName::Is => IsValue::parse(value).is_some(),
        FieldName::Merged => parse_merged(value).is_some(),
        _ => match field.spec().match_kind {
            MatchKind::Boolean => parse_bool(value).is_some(),
            _ => true,
        },
    };
    if valid {
        return None;
    }

    let expected = match field {
        FieldName::In => IN_VALUES.join(", "),
        FieldName::Is => IS_VALUES.join(", "),
        FieldName::Merged => "true, false, yes, no, 1, 0, merged, unmerged".to_string(),
        _ => "true, false, yes, no, 1, 0".to_string(),
    };
    Some(format!(
        "invalid value for {}: {} (valid: {})",
        field, value, expected
    ))
}
