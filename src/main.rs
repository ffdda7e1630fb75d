mod api;
mod cli;
mod config;
mod device;
mod paddock;
mod present;
mod readings;
mod session;
#[cfg(test)]
mod test_support;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{
    api::{
        errors::ApiError,
        models::{
            CreatePaddockRequest, CropType, RegisterDeviceRequest, SignupRequest,
            UpdatePaddockRequest,
        },
        ApiClient,
    },
    cli::{
        Cli, Commands, DeviceArgs, PaddockCreateArgs, PaddockRenameArgs, PaddocksArgs,
        SettingsArgs, Toggle,
    },
    config::Config,
    device::view::{ViewScope, ViewSettings, ViewState},
    paddock::{load_paddock_view, search_dashboard},
    present::{
        csv,
        tables::{paddock_display_name, PaddockRow},
    },
    readings::ReadingType,
    session::{Session, SessionStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; variables may come from the environment.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let client = ApiClient::new(&config)?;
    let store = SessionStore::new(config.session_file.clone());

    match cli.command {
        Commands::Login(args) => {
            let session = client.login(&args.email, &args.password).await.map_err(shown)?;
            store.save(&session).await?;
            println!("Logged in. Session stored in {}", store.path().display());
        }
        Commands::Logout => {
            store.clear().await?;
            println!("Logged out.");
        }
        Commands::Signup(args) => {
            let signup = SignupRequest {
                first_name: args.first_name,
                last_name: args.last_name,
                user_id: args.email,
                password: args.password,
            };
            let message = client.signup(&signup).await.map_err(shown)?;
            println!("{message}");
        }
        Commands::ForgotPassword(args) => {
            let message = client
                .request_password_reset(&args.email)
                .await
                .map_err(shown)?;
            println!("{message}");
        }
        Commands::ResetPassword(args) => {
            let message = client
                .confirm_password_reset(&args.token, &args.new_password)
                .await
                .map_err(shown)?;
            println!("{message}");
        }
        Commands::Paddocks(PaddocksArgs { search: Some(query) }) => {
            let session = require_session(&config, &store).await?;
            let items = search_dashboard(&client, &session, &query).await.map_err(shown)?;
            if items.is_empty() {
                println!("No results found");
            }
            for item in &items {
                println!("{item}");
            }
        }
        Commands::Paddocks(PaddocksArgs { search: None }) => {
            let session = require_session(&config, &store).await?;
            let paddocks = client.list_paddocks(&session).await.map_err(shown)?;
            if paddocks.is_empty() {
                println!("No paddocks yet.");
            }
            for paddock in &paddocks {
                println!("{}", PaddockRow::from(paddock));
            }
        }
        Commands::Paddock(args) => {
            let session = Session::resolve(&config, &store).await?;
            let view = load_paddock_view(&client, session.as_ref(), args.paddock_id).await?;
            println!("{view}");
        }
        Commands::PaddockCreate(args) => {
            let session = require_session(&config, &store).await?;
            let request = create_request(&args)?;
            let message = client.create_paddock(&session, &request).await.map_err(shown)?;
            println!("{message}");
        }
        Commands::PaddockRename(args) => {
            let session = require_session(&config, &store).await?;
            rename_paddock(&client, &session, &args).await?;
        }
        Commands::PaddockDelete(args) => {
            let session = require_session(&config, &store).await?;
            let message = client
                .delete_paddock(&session, args.paddock_id)
                .await
                .map_err(shown)?;
            println!("{message}");
        }
        Commands::Device(args) => {
            let session = Session::resolve(&config, &store).await?;
            show_device(&client, session, &config, args).await?;
        }
        Commands::DeviceRegister(args) => {
            let session = require_session(&config, &store).await?;
            let request = RegisterDeviceRequest {
                node_id: args.node_id,
                node_name: args.name,
                paddock_id: args.paddock,
                secret_key: args.secret_key,
            };
            let node = client.register_device(&session, &request).await.map_err(shown)?;
            println!(
                "{} linked to paddock {}",
                node.node_name.as_deref().unwrap_or(&node.node_id),
                node.paddock_id
            );
        }
        Commands::DeviceUnlink(args) => {
            let session = require_session(&config, &store).await?;
            let message = client
                .unlink_device(&session, &args.node_id)
                .await
                .map_err(shown)?;
            println!("{message}");
        }
        Commands::Settings(args) => {
            let session = require_session(&config, &store).await?;
            show_settings(&client, &session, &args).await?;
        }
    }

    Ok(())
}

/// Surface only the user-facing message; details were logged at the call.
fn shown(e: ApiError) -> anyhow::Error {
    debug!(status = ?e.status(), error = %e, "Command failed");
    anyhow!(e.user_message().to_owned())
}

async fn require_session(config: &Config, store: &SessionStore) -> Result<Session> {
    match Session::resolve(config, store).await? {
        Some(session) => Ok(session),
        None => bail!("You must be logged in."),
    }
}

fn create_request(args: &PaddockCreateArgs) -> Result<CreatePaddockRequest> {
    let crop: CropType = args.crop.parse()?;
    Ok(CreatePaddockRequest::from_form(
        args.name.as_deref(),
        crop,
        &args.area,
        &args.plant_date,
        args.soil.as_deref(),
    ))
}

async fn rename_paddock(client: &ApiClient, session: &Session, args: &PaddockRenameArgs) -> Result<()> {
    let crop_type = args.crop.as_deref().map(str::parse::<CropType>).transpose()?;
    let update = UpdatePaddockRequest {
        paddock_name: args.name.clone(),
        crop_type,
        area: args.area,
    };
    let updated = client
        .update_paddock(session, args.paddock_id, &update)
        .await
        .map_err(shown)?;
    match updated {
        Some(detail) => println!(
            "Paddock {} is now {}",
            detail.paddock_id,
            paddock_display_name(detail.paddock_name.as_deref())
        ),
        None => println!("Paddock updated successfully"),
    }
    Ok(())
}

async fn show_device(
    client: &ApiClient,
    session: Option<Session>,
    config: &Config,
    args: DeviceArgs,
) -> Result<()> {
    let mut streams = config.reading_streams.clone();
    let selected = args
        .stream
        .as_deref()
        .map(str::parse::<ReadingType>)
        .transpose()
        .context("--stream must name a reading type")?;
    if let Some(rt) = &selected {
        if !streams.contains(rt) {
            streams.push(rt.clone());
        }
    }

    let settings = ViewSettings {
        streams,
        offline_after: config.offline_after,
        selected,
    };
    let mut scope = ViewScope::new(client.clone(), session, settings);
    scope.navigate(Some(&args.node_id));

    let settled = tokio::select! {
        state = scope.wait_settled() => Some(state),
        _ = shutdown_signal() => None,
    };
    let Some(state) = settled else {
        // Dropping the scope cancels the requests still in flight.
        info!(node_id = %args.node_id, "Device view closed");
        return Ok(());
    };

    match state {
        ViewState::Ready(dashboard) => {
            println!("{dashboard}");
            if let Some(dir) = &args.export {
                match dashboard.csv() {
                    Some(body) => {
                        let path = csv::write_export(dir, &dashboard.export_file_name(), &body).await?;
                        println!("Exported {}", path.display());
                    }
                    None => println!("No {} data to export.", dashboard.selected().label()),
                }
            }
            Ok(())
        }
        ViewState::Error(message) => bail!(message),
        ViewState::Loading => bail!("Device view closed before it loaded"),
    }
}

async fn show_settings(client: &ApiClient, session: &Session, args: &SettingsArgs) -> Result<()> {
    let current = match args.alerts {
        Some(toggle) => {
            let enabled = matches!(toggle, Toggle::On);
            client.update_settings(session, enabled).await.map_err(shown)?
        }
        None => client.get_settings(session).await.map_err(shown)?,
    };
    println!("Alerts: {}", if current.alerts_enabled { "on" } else { "off" });
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
