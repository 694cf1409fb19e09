mod cli;
mod config;
mod files;
mod storage;

use std::{
    fs,
    io::{self, Write},
};

use clap::Parser;
use color_eyre::{eyre::bail, Result};
use passvault_crypto::Crypto;
use passvault_manager::Manager;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Command, ConfigCommand, LogFormat};

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = cli::Cli::parse();
    init_tracing(cli.log_format);

    let mut stdout = io::stdout().lock();
    match cli.command {
        Command::Version => print_version(),
        Command::Config(ConfigCommand::Init) => init_config()?,
        Command::Encrypt { file, key } => {
            let ciphertext = files::encrypt_file(&file, &key, &Crypto::default())?;
            // No trailing newline: the output is meant to be stored verbatim.
            write!(stdout, "{ciphertext}")?;
        }
        Command::Decrypt { file, key } => {
            let packed = files::decrypt_file(&file, &key, &Crypto::default())?;
            write!(stdout, "{}", packed.as_str())?;
        }
        Command::Recovery { file, key } => {
            let secret = files::recover(&file, &key, &Crypto::default())?;
            writeln!(stdout, "{}", secret.as_str())?;
        }
        command => {
            let config = config::load()?;
            let manager = storage::manager_from_config(&config, &cli.store)?;
            run_store_command(&manager, command, &mut stdout)?;
        }
    }
    stdout.flush()?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    // Respect user-provided filters; stdout is reserved for command output.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(io::stderr),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(io::stderr),
            )
            .init(),
    }
}

fn print_version() {
    println!("passvault {}", env!("CARGO_PKG_VERSION"));
}

fn init_config() -> Result<()> {
    let path = config::write_default_if_missing(&config::Config::default())?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

/// Executes a store command against `manager`, writing results to `out`.
fn run_store_command(manager: &Manager, command: Command, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Path { id: None } => {
            writeln!(out, "{}", manager.store_path()?.display())?;
        }
        Command::Path { id: Some(id) } => {
            writeln!(out, "{}", manager.file_path(&id)?.display())?;
        }
        Command::List => {
            for id in manager.list()? {
                writeln!(out, "{id}")?;
            }
        }
        Command::Exists { id } => writeln!(out, "{}", manager.exists(&id)?)?,
        Command::Get { id, key } => writeln!(out, "{}", manager.get(&id, &key)?)?,
        Command::Check { id, password, key } => {
            writeln!(out, "{}", manager.check(&id, &password, &key)?)?;
        }
        Command::Overwrite { id, password, key } => manager.overwrite(&id, &password, &key)?,
        Command::Set {
            id,
            old_password,
            new_password,
            key,
        } => manager.set(&id, &old_password, &new_password, &key)?,
        Command::Unset { id, password, key } => manager.unset(&id, &password, &key)?,
        Command::Delete { id } => manager.delete(&id)?,
        Command::Clean { force: false } => {
            bail!("refusing to delete every entry without --force");
        }
        Command::Clean { force: true } => manager.clean()?,
        Command::RewriteKey {
            id,
            old_key,
            new_key,
        } => manager.rewrite_key(&id, &old_key, &new_key)?,
        Command::Dump { output: None } => writeln!(out, "{}", manager.dump_json()?)?,
        Command::Dump { output: Some(path) } => fs::write(path, manager.dump_json()?)?,
        Command::Load { input } => manager.load_json(&fs::read_to_string(input)?)?,
        Command::Version
        | Command::Config(_)
        | Command::Encrypt { .. }
        | Command::Decrypt { .. }
        | Command::Recovery { .. } => bail!("not a store command"),
    }
    Ok(())
}
