use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use vaultsync::auth::Authenticator;
use vaultsync::drive::DriveClient;
use vaultsync::sync::{sync_file, SyncOutcome};

/// Back up a local credential database to the automatic_backups folder on
/// Google Drive, uploading only when the content has changed.
#[derive(Parser, Debug)]
#[command(name = "vaultsync", version)]
struct Cli {
    /// Local credential database file to back up
    local_file: PathBuf,

    /// Google OAuth client secret JSON file
    client_secret: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> vaultsync::Result<()> {
    info!("Beginning of syncing");

    let auth = Authenticator::from_secret_file(&cli.client_secret)?
        .authenticate()
        .await?;
    let mut drive = DriveClient::new(auth);

    match sync_file(&mut drive, &cli.local_file).await? {
        SyncOutcome::Created { id } => info!("Backup created (id: {id})"),
        SyncOutcome::Updated { id } => info!("Backup updated (id: {id})"),
        SyncOutcome::Unchanged => info!("Backup already up to date"),
    }

    info!("End of syncing");
    Ok(())
}
