use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// CLI surface definition: one-shot file utilities plus the credential store commands.
#[derive(Parser, Debug)]
#[command(
    name = "passvault",
    about = "Encrypted credential store with per-entry envelopes and recovery keys",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Log output format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides applied on top of the config file for one invocation.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreArgs {
    /// Store directory (defaults to the configured one).
    #[arg(long, global = true)]
    pub store_path: Option<PathBuf>,

    /// File ending of entries on disk.
    #[arg(long, global = true)]
    pub file_ending: Option<String>,

    /// Store salted hashes instead of the passwords themselves.
    #[arg(long, global = true)]
    pub hash_passwords: bool,

    /// Write a recovery entry alongside every write.
    #[arg(long, global = true, env = "PASSVAULT_RECOVERY_KEY", hide_env_values = true)]
    pub recovery_key: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Encrypt the contents of a file and print the ciphertext.
    Encrypt { file: PathBuf, key: String },
    /// Decrypt a stored entry and print its packed envelope.
    Decrypt { file: PathBuf, key: String },
    /// Recover a secret from an entry file and its sibling recovery file.
    Recovery { file: PathBuf, key: String },
    /// Print the path of the store, or of the file backing an id.
    Path { id: Option<String> },
    /// List all stored ids.
    List,
    /// Report whether an id is stored.
    Exists { id: String },
    /// Print the stored secret.
    Get { id: String, key: String },
    /// Check a password against the stored secret.
    Check {
        id: String,
        password: String,
        key: String,
    },
    /// Create or replace an entry without checking the previous value.
    Overwrite {
        id: String,
        password: String,
        key: String,
    },
    /// Replace an entry, requiring the current password if it exists.
    Set {
        id: String,
        old_password: String,
        new_password: String,
        key: String,
    },
    /// Delete an entry after checking its password.
    Unset {
        id: String,
        password: String,
        key: String,
    },
    /// Delete an entry without a password check.
    Delete { id: String },
    /// Delete every entry in the store.
    Clean {
        /// Required, since the removal cannot be undone.
        #[arg(long)]
        force: bool,
    },
    /// Re-encrypt an entry under a new storage key.
    RewriteKey {
        id: String,
        old_key: String,
        new_key: String,
    },
    /// Export the raw encrypted entries as JSON.
    Dump {
        /// Write to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Import raw encrypted entries from a JSON dump.
    Load { input: PathBuf },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
