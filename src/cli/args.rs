//! CLI argument grammar (spec.md 6, "CLI surface").

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "envsync",
    about = "Versioned, end-to-end encrypted environment variables for teams",
    version
)]
pub struct Cli {
    /// Emit structured tracing output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a new local vault (generates a recovery phrase).
    Init,

    /// Log in against the configured cloud service.
    Login {
        /// Raw access token; prompted interactively if omitted.
        #[arg(long)]
        token: Option<String>,
    },

    /// Clear the active cloud session.
    Logout,

    /// Print the authenticated cloud identity.
    Whoami,

    /// Run diagnostic checks against local state, the remote, and the keychain.
    Doctor {
        /// Emit `{ok, checks}` as JSON instead of a human-readable report.
        #[arg(long)]
        json: bool,
    },

    /// Re-derive the local vault key-check from a recovery phrase, recovering
    /// a lost or corrupted `state.json` from a remote copy.
    Restore,

    /// Manage projects.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage teams and team membership.
    Team {
        #[command(subcommand)]
        action: TeamAction,
    },

    /// Manage environments within the active project.
    Env {
        #[command(subcommand)]
        action: EnvAction,
    },

    /// Set a secret value, creating a new version.
    Set {
        key: String,
        value: String,
        /// RFC3339 timestamp or duration (e.g. `24h`, `1h30m`).
        #[arg(long)]
        expires_at: Option<String>,
    },

    /// Replace a secret's value; the key must already exist.
    Rotate { key: String, value: String },

    /// Decrypt and print a secret's current value.
    Get { key: String },

    /// Tombstone a secret (appends a deletion marker, keeps history).
    Delete { key: String },

    /// List secret keys in the active environment.
    List {
        /// Decrypt and display values (requires the recovery phrase).
        #[arg(long)]
        show: bool,
    },

    /// Print `export KEY="value"` lines for every live secret.
    Load,

    /// Import `KEY=VALUE` lines from a `.env`-style file.
    Import { path: String },

    /// Export the active environment to a `.env`-style file.
    Export { path: String },

    /// Show every version of a secret.
    History { key: String },

    /// Append a new version byte-identical to a past version's ciphertext.
    Rollback {
        key: String,
        #[arg(long)]
        version: u64,
    },

    /// Compare local and remote state without requiring the recovery phrase.
    Diff,

    /// Push local changes to the remote.
    Push {
        /// Let local versions win every conflicting key.
        #[arg(long)]
        force: bool,
    },

    /// Pull remote changes into local state.
    Pull {
        /// Let remote versions win every conflicting key.
        #[arg(long)]
        force_remote: bool,
    },

    /// Manage the cached recovery phrase.
    Phrase {
        #[command(subcommand)]
        action: PhraseAction,
    },

    /// Generate shell completion scripts.
    Completions { shell: Shell },
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Create a project, optionally owned by a team.
    Create {
        name: String,
        #[arg(long)]
        team: Option<String>,
    },
    /// List known projects.
    List,
    /// Select the active project.
    Use { name: String },
    /// Delete a project (admin only; requires team ownership).
    Delete { name: String },
}

#[derive(Subcommand)]
pub enum TeamAction {
    /// Create a team (the creator becomes admin).
    Create { name: String },
    /// List known teams.
    List,
    /// Select the active team.
    Use { name: String },
    /// Add a member with a role (`admin`, `maintainer`/`writer`, `reader`).
    AddMember {
        team: String,
        actor: String,
        role: String,
    },
    /// Remove a member.
    RemoveMember { team: String, actor: String },
    /// List a team's members and roles.
    ListMembers {
        /// Defaults to the active team.
        team: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum EnvAction {
    /// Create an environment in the active project.
    Create { name: String },
    /// Select the active environment.
    Use { name: String },
    /// List environments in the active project.
    List,
}

#[derive(Subcommand)]
pub enum PhraseAction {
    /// Store the recovery phrase in the OS keychain.
    Save {
        /// Prompted interactively if omitted.
        #[arg(long)]
        phrase: Option<String>,
    },
    /// Remove the cached recovery phrase from the keychain.
    Clear,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
