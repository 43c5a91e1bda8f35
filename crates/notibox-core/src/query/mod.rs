//! Notification query language.
//!
//! Queries are GitHub-style `field:value` terms combined with implicit AND,
//! `OR`, negation and parentheses. A query string is parsed once into a
//! [`Query`] AST, then either compiled to SQL ([`compile`]) or evaluated
//! against a single notification in memory ([`Evaluator`]). Both paths share
//! one lowering step, so they select exactly the same rows.
//!
//! # Syntax
//!
//! ## Fields
//! - `repo:name` - Repository full name contains `name`
//! - `org:owner` - Repository belongs to `owner`
//! - `author:login` - Subject author login contains `login`
//! - `reason:mention,comment` - Comma lists match any value
//! - `type:PullRequest`, `state:open`, `state_reason:completed`
//! - `tags:slug` - An assigned tag slug contains `slug`
//! - `is:unread`, `is:read`, `is:starred`, `is:muted`, ...
//! - `in:inbox|archive|snoozed|filtered|anywhere` - View scope (default `inbox`)
//!
//! ## Boolean Operators
//! - `a b` or `a AND b` - AND
//! - `a OR b` - OR (binds looser than AND)
//! - `-a` or `NOT a` - NOT
//! - `()` - Grouping
//!
//! Bare words and `"quoted phrases"` search the title and metadata.
//!
//! # Example
//!
//! ```
//! use notibox_core::query::{parse, ViewScope, apply_default_scope};
//!
//! let parsed = parse("in:archive repo:cli -is:read");
//! assert!(parsed.is_valid());
//!
//! let scoped = apply_default_scope(&parsed.query);
//! assert_eq!(scoped.scope, ViewScope::Archive);
//! assert_eq!(scoped.filter.to_string(), "repo:cli -is:read");
//! ```

mod ast;
mod compiler;
mod error;
mod evaluator;
pub mod fields;
mod hints;
mod lexer;
mod parser;
mod predicate;
mod scope;

pub use ast::{BinaryOp, FieldTerm, FreeTextTerm, Query};
pub use compiler::{compile, CompileOptions, CompiledQuery, SqlValue};
pub(crate) use compiler::notification_columns;
pub use error::{QueryError, QueryResult, ValidationError, ValidationErrorKind};
pub use evaluator::{EvalTarget, Evaluator};
pub use fields::{FieldName, FieldSpec};
pub use hints::{ActionHints, HintFlag};
pub use parser::{parse, Parsed};
pub use scope::{apply_default_scope, ScopedQuery, ViewScope};
