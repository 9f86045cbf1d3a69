use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use mailfeed::config::Config;
use mailfeed::error::SweepError;
use mailfeed::feed::FeedAssembler;
use mailfeed::keyring;
use mailfeed::mail::{ImapSession, MailSource};
use mailfeed::normalize::Normalizer;
use mailfeed::store::LedgerHandle;
use mailfeed::summarize::NoopSummarizer;
use mailfeed::sweep::Sweeper;

#[derive(Parser)]
#[command(
    name = "mailfeed",
    version,
    about = "Polls IMAP folders and republishes messages as RSS and JSON Feed documents"
)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "mailfeed.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sweep the configured folders and regenerate feed documents.
    Process {
        /// Run a single pass and exit instead of polling.
        #[arg(long)]
        once: bool,
    },
    /// Clear one folder's dedup history so the next pass re-ingests it.
    Reset { folder: String },
    /// Read a password from stdin and store it in the OS keyring.
    SetPassword,
    /// Remove the stored password from the OS keyring.
    ForgetPassword,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, SweepError> {
    let config = Config::load(&cli.config)?;

    match cli.command {
        Command::SetPassword => {
            let password = read_password()?;
            keyring::set_password(&config.username, &config.host, &password)
                .map_err(SweepError::Config)?;
            log::info!("Stored password for {}@{}", config.username, config.host);
            Ok(ExitCode::SUCCESS)
        }
        Command::ForgetPassword => {
            keyring::delete_password(&config.username, &config.host)
                .map_err(SweepError::Config)?;
            log::info!("Removed password for {}@{}", config.username, config.host);
            Ok(ExitCode::SUCCESS)
        }
        Command::Reset { folder } => {
            let ledger = LedgerHandle::open(&config.store_path).map_err(SweepError::Store)?;
            let removed = ledger
                .clear_folder(folder.clone())
                .await
                .map_err(SweepError::Store)?;
            log::info!("{folder}: cleared {removed} ledger row(s)");
            Ok(ExitCode::SUCCESS)
        }
        Command::Process { once } => {
            let ledger = LedgerHandle::open(&config.store_path).map_err(SweepError::Store)?;
            let password = config.resolve_password().map_err(SweepError::Config)?;
            let mail: Arc<dyn MailSource> = ImapSession::connect(&config, &password)
                .await
                .map_err(SweepError::Mail)?;

            let sweeper = Sweeper::new(
                mail,
                ledger,
                FeedAssembler::new(config.feed_config()),
                Normalizer::new(config.normalize_config()),
                Arc::new(NoopSummarizer),
                config.max_workers,
                config.max_summary_len,
            );

            if once {
                let summary = sweeper.run(&config.folders).await;
                return Ok(if summary.all_failed() {
                    ExitCode::FAILURE
                } else {
                    ExitCode::SUCCESS
                });
            }

            log::info!(
                "Polling {} folder(s) every {}s",
                config.folders.len(),
                config.poll_interval_secs
            );
            let mut interval =
                tokio::time::interval(Duration::from_secs(config.poll_interval_secs.max(1)));
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = tokio::signal::ctrl_c() => {
                        log::info!("Shutting down");
                        return Ok(ExitCode::SUCCESS);
                    }
                }
                // Select against the pass itself so shutdown does not wait
                // out a slow server. Ledger commits are per message and
                // document writes are atomic, so an abandoned pass leaves
                // nothing half-written and the next run resumes cleanly.
                tokio::select! {
                    _ = sweeper.run(&config.folders) => {}
                    _ = tokio::signal::ctrl_c() => {
                        log::info!("Shutting down mid-pass");
                        return Ok(ExitCode::SUCCESS);
                    }
                }
            }
        }
    }
}

/// Read a password from stdin. Works both interactively and piped; the
/// trailing newline is not part of the password.
fn read_password() -> Result<String, SweepError> {
    eprint!("Password: ");
    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| SweepError::Config(format!("read password: {e}")))?;
    let password = input.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        return Err(SweepError::Config("password must not be empty".into()));
    }
    Ok(password.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_every_subcommand() {
        let cli = Cli::try_parse_from(["mailfeed", "process", "--once"]).expect("parse");
        assert!(matches!(cli.command, Command::Process { once: true }));

        let cli = Cli::try_parse_from(["mailfeed", "reset", "INBOX"]).expect("parse");
        assert!(matches!(cli.command, Command::Reset { folder } if folder == "INBOX"));

        let cli = Cli::try_parse_from(["mailfeed", "set-password"]).expect("parse");
        assert!(matches!(cli.command, Command::SetPassword));

        let cli = Cli::try_parse_from(["mailfeed", "forget-password"]).expect("parse");
        assert!(matches!(cli.command, Command::ForgetPassword));
    }

    #[test]
    fn cli_config_path_defaults_and_overrides() {
        let cli = Cli::try_parse_from(["mailfeed", "process"]).expect("parse");
        assert_eq!(cli.config, PathBuf::from("mailfeed.json"));

        let cli = Cli::try_parse_from(["mailfeed", "--config", "/etc/mf.json", "process"])
            .expect("parse");
        assert_eq!(cli.config, PathBuf::from("/etc/mf.json"));
    }
}
