//! CLI argument parsing using clap derive macros.

use clap::{Args, Parser, Subcommand};

/// nb - triage GitHub notifications from the terminal
#[derive(Parser, Debug)]
#[command(name = "nb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbose output (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// GitHub token (default: from config)
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pull new notifications from GitHub
    Sync,

    /// Refetch the subject (issue, pull request) of a notification
    Refresh {
        /// Notification ID
        id: String,
    },

    /// List notifications matching a query
    #[command(alias = "ls")]
    List {
        /// Query, e.g. "repo:cli is:unread" (default: inbox)
        #[arg(default_value = "")]
        query: String,

        /// Start from a saved view's query (name, slug or ID)
        #[arg(long)]
        view: Option<String>,

        /// Page number, starting at 1
        #[arg(long)]
        page: Option<i64>,

        /// Rows per page (max 200)
        #[arg(long)]
        per_page: Option<i64>,

        /// Print reduced rows for periodic refresh
        #[arg(long)]
        poll: bool,
    },

    /// Show one notification
    Show {
        /// Notification ID
        id: String,
    },

    /// Mark as read
    Read { id: String },
    /// Mark as unread
    Unread { id: String },
    /// Move to the archive
    Archive { id: String },
    /// Move back to the inbox
    Unarchive { id: String },
    /// Star
    Star { id: String },
    /// Remove the star
    Unstar { id: String },
    /// Hide this thread, including future activity
    Mute { id: String },
    /// Stop hiding this thread
    Unmute { id: String },
    /// Clear the filtered flag
    Unfilter { id: String },
    /// Return a snoozed notification to the inbox
    Unsnooze { id: String },

    /// Hide until a given time
    Snooze {
        /// Notification ID
        id: String,

        /// RFC 3339 timestamp, e.g. 2024-06-01T09:00:00Z
        #[arg(long)]
        until: String,
    },

    /// Apply one action to many notifications
    Bulk {
        /// Action: mark-read, mark-unread, archive, unarchive, star, unstar,
        /// mute, unmute, snooze, unsnooze, unfilter
        operation: String,

        /// Notification IDs (comma separated)
        #[arg(
            long,
            value_delimiter = ',',
            conflicts_with = "query",
            required_unless_present = "query"
        )]
        ids: Vec<String>,

        /// Query selecting the notifications
        #[arg(long)]
        query: Option<String>,

        /// Snooze time for the snooze action
        #[arg(long)]
        until: Option<String>,
    },

    /// Manage tags
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },

    /// Manage rules that triage newly synced notifications
    Rule {
        #[command(subcommand)]
        command: RuleCommands,
    },

    /// Manage saved views
    View {
        #[command(subcommand)]
        command: ViewCommands,
    },

    /// Inspect the query language
    Query {
        #[command(subcommand)]
        command: QueryCommands,
    },

    /// View or change configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

/// Tag subcommands
#[derive(Subcommand, Debug)]
pub enum TagCommands {
    /// List tags
    List,

    /// Tag a notification, creating the tag if needed
    Assign {
        /// Notification ID
        id: String,
        /// Tag name
        name: String,
    },

    /// Remove a tag from a notification
    Remove {
        /// Notification ID
        id: String,
        /// Tag name or slug
        name: String,
    },
}

/// Rule subcommands
#[derive(Subcommand, Debug)]
pub enum RuleCommands {
    /// List rules in the order they run
    List,

    /// Add a rule
    Add(RuleAddArgs),

    /// Delete a rule
    #[command(alias = "remove")]
    Rm {
        /// Rule name or ID
        rule: String,
    },

    /// Turn a rule on
    Enable {
        /// Rule name or ID
        rule: String,
    },

    /// Turn a rule off
    Disable {
        /// Rule name or ID
        rule: String,
    },

    /// Run a rule once over every stored notification
    Apply {
        /// Rule name or ID
        rule: String,
    },

    /// Move rules to the front of the run order
    Reorder {
        /// Rule names or IDs (comma separated), first runs first
        #[arg(value_delimiter = ',', required = true)]
        rules: Vec<String>,
    },
}

/// Arguments for `nb rule add`
#[derive(Args, Debug, Default)]
pub struct RuleAddArgs {
    /// Rule name
    pub name: String,

    /// Query the rule matches
    #[arg(long, conflicts_with = "view", required_unless_present = "view")]
    pub query: Option<String>,

    /// Follow a saved view's query instead (name, slug or ID)
    #[arg(long)]
    pub view: Option<String>,

    /// Description
    #[arg(long)]
    pub description: Option<String>,

    /// Keep matches out of the inbox
    #[arg(long)]
    pub skip_inbox: bool,

    /// Mark matches as read
    #[arg(long)]
    pub mark_read: bool,

    /// Star matches
    #[arg(long)]
    pub star: bool,

    /// Archive matches
    #[arg(long)]
    pub archive: bool,

    /// Mute matches
    #[arg(long)]
    pub mute: bool,

    /// Tag matches, creating the tag if needed (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Remove a tag from matches (repeatable)
    #[arg(long = "untag")]
    pub untags: Vec<String>,

    /// Create the rule turned off
    #[arg(long)]
    pub disabled: bool,

    /// Also run the rule over notifications already stored
    #[arg(long)]
    pub apply: bool,
}

/// View subcommands
#[derive(Subcommand, Debug)]
pub enum ViewCommands {
    /// List views with their unread counts
    List,

    /// Save a query as a view
    Add {
        /// View name
        name: String,

        /// Query the view shows
        query: String,

        /// Description
        #[arg(long)]
        description: Option<String>,

        /// Icon name
        #[arg(long)]
        icon: Option<String>,
    },

    /// Delete a view
    #[command(alias = "remove")]
    Rm {
        /// View name, slug or ID
        view: String,

        /// Also delete rules that follow this view
        #[arg(long)]
        force: bool,
    },

    /// Move views to the front of the display order
    Reorder {
        /// View names, slugs or IDs (comma separated)
        #[arg(value_delimiter = ',', required = true)]
        views: Vec<String>,
    },
}

/// Query subcommands
#[derive(Subcommand, Debug)]
pub enum QueryCommands {
    /// Validate a query and print the SQL it compiles to
    Check {
        /// Query string
        query: String,
    },

    /// List the fields queries can use
    Fields,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Key, e.g. database.path or sync.initial_sync_days
        key: String,
        /// Value
        value: String,
    },

    /// Print the config file path
    Path,
}
