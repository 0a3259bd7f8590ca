use std::env;

use add::add_packages;
use clap::Parser;
use cli::{Args, Commands, UserAction};
use list::{list_classifiers, list_packages, set_release_hidden, show_package};
use logging::setup_logging;
use serve::serve;
use tracing::info;
use ureq::Proxy;
use user::{add_user, list_users, set_password};
use utils::COLOR;
use wheelhouse_config::{
    config::{self, generate_default_config, get_config, CONFIG_PATH},
    error::ConfigError,
};
use wheelhouse_core::error::ErrorContext;
use wheelhouse_dl::{error::DownloadError, http_client::configure_http_client};
use wheelhouse_operations::{RegistryContext, Result};
use wheelhouse_utils::path::resolve_path;

mod add;
mod cli;
mod list;
mod logging;
mod serve;
mod user;
mod utils;

fn create_context() -> Result<RegistryContext> {
    RegistryContext::new(get_config())
}

/// Runs the command line. Returns whether the command fully succeeded.
async fn handle_cli() -> Result<bool> {
    let args = Args::parse();

    setup_logging(&args);

    if args.no_color {
        let mut color = COLOR.write().unwrap();
        *color = false;
    }

    if let Some(ref c) = args.config {
        let mut config_path = CONFIG_PATH.write().unwrap();
        let path = resolve_path(c).map_err(|err| ConfigError::Utils(err.into()))?;
        let path = if path.is_absolute() {
            path
        } else {
            env::current_dir()
                .with_context(|| "retrieving current directory".into())?
                .join(path)
        };
        *config_path = path;
    }

    let proxy = args
        .proxy
        .as_deref()
        .map(Proxy::new)
        .transpose()
        .map_err(DownloadError::from)?;
    let user_agent = args.user_agent.clone();

    configure_http_client(|config| {
        if proxy.is_some() {
            config.proxy = proxy;
        }
        if let Some(user_agent) = user_agent {
            config.user_agent = Some(user_agent);
        }
    });

    match args.command {
        Commands::DefConfig => {
            generate_default_config()?;
            info!(
                "Default config written to {}",
                CONFIG_PATH.read().unwrap().display()
            );
        }
        Commands::Env => {
            config::init()?;
            let config = get_config();

            info!("WHEELHOUSE_CONFIG={}", CONFIG_PATH.read().unwrap().display());
            info!("WHEELHOUSE_ROOT={}", config.get_root_path()?.display());
            info!("WHEELHOUSE_DB={}", config.get_db_path()?.display());
            info!("WHEELHOUSE_STORAGE={}", config.get_storage_path()?.display());
        }
        command => {
            config::init()?;
            let ctx = create_context()?;

            match command {
                Commands::Serve {
                    listen,
                } => serve(ctx, listen).await?,
                Commands::Add {
                    labels,
                    owner,
                } => return add_packages(ctx, labels, owner).await,
                Commands::User {
                    action,
                } => {
                    match action {
                        UserAction::Add {
                            username,
                            email,
                            password,
                        } => add_user(&ctx, &username, &email, password.as_deref())?,
                        UserAction::Passwd {
                            username,
                            password,
                        } => set_password(&ctx, &username, &password)?,
                        UserAction::List => list_users(&ctx)?,
                    }
                }
                Commands::List {
                    package,
                } => {
                    match package {
                        Some(package) => show_package(&ctx, &package)?,
                        None => list_packages(&ctx)?,
                    }
                }
                Commands::Hide {
                    package,
                    version,
                } => set_release_hidden(&ctx, &package, &version, true)?,
                Commands::Unhide {
                    package,
                    version,
                } => set_release_hidden(&ctx, &package, &version, false)?,
                Commands::Classifiers => list_classifiers(&ctx)?,
                Commands::DefConfig | Commands::Env => unreachable!(),
            }
        }
    }

    Ok(true)
}

#[tokio::main]
async fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    match handle_cli().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("{:?}", miette::Report::new(err));
            std::process::exit(1);
        }
    }
}
