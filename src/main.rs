//! SafeNav - command-line client for the SafeNav personal-safety service.
//!
//! # Commands
//!
//! - `login`, `register`, `logout` - session management
//! - `profile [show|update|password]` - the signed-in user's profile
//! - `contacts [list|add|edit|delete]` - emergency contacts
//! - `route plan|navigate|current|crimes` - safe route planning, the journey in
//!   progress and nearby crime reports
//! - `sos [test]` - arm an SOS alert (Ctrl-C cancels during the countdown)
//! - `history` - past SOS alerts
//! - `whereami` - the configured location and its address
//!
//! Configuration comes from `SAFENAV_*` environment variables; see
//! [`safenav::config`].

use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use safenav::api::ApiClient;
use safenav::config::ClientConfig;
use safenav::error::ApiError;
use safenav::geocoding::ReverseGeocoder;
use safenav::geolocation::{LocationRequest, locate_once};
use safenav::model::{ContactDraft, GeoFix, NewAccount, PasswordChange, ProfileUpdate};
use safenav::render;
use safenav::route_cache::RouteContextCache;
use safenav::session::SessionStore;
use safenav::sos::{SosController, SosState};
use safenav::storage::{KeyValueStore, SqliteStore};

#[derive(Parser, Debug)]
#[command(name = "safenav")]
#[command(version, about = "SafeNav personal-safety navigation client", long_about = None)]
struct Cli {
    /// SafeNav service URL (overrides SAFENAV_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and keep the session token
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        address: String,
    },
    /// Forget the session token
    Logout,
    /// Show or change the profile
    Profile {
        #[command(subcommand)]
        action: Option<ProfileCommand>,
    },
    /// Manage emergency contacts
    Contacts {
        #[command(subcommand)]
        action: Option<ContactsCommand>,
    },
    /// Plan routes and manage the journey in progress
    Route {
        #[command(subcommand)]
        action: RouteCommand,
    },
    /// Arm an SOS alert
    Sos {
        #[command(subcommand)]
        action: Option<SosCommand>,
    },
    /// List past SOS alerts
    History,
    /// Show the configured location
    Whereami,
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    Show,
    /// Change name, phone or address; omitted fields keep their value
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    Password {
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },
}

#[derive(Subcommand, Debug)]
enum ContactsCommand {
    List,
    Add {
        name: String,
        phone: String,
        #[arg(long, default_value = "")]
        relationship: String,
    },
    Edit {
        id: String,
        name: String,
        phone: String,
        #[arg(long, default_value = "")]
        relationship: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum RouteCommand {
    /// List candidate routes, safest first
    Plan { start: String, end: String },
    /// Plan and start navigating one of the options
    Navigate {
        start: String,
        end: String,
        /// Which option to take (1 = safest)
        #[arg(long, default_value_t = 1)]
        option: usize,
    },
    /// Show the journey in progress
    Current,
    /// Crime reports around the configured location
    Crimes {
        /// Address label sent with the query (reverse geocoded when omitted)
        #[arg(long)]
        address: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum SosCommand {
    /// Run a local drill; nothing is sent
    Test,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to stderr so command output stays clean
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("safenav=info".parse()?))
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env();
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }

    debug!(api_url = %config.api_url, state_db = %config.state_db, "Starting SafeNav client");

    if let Err(e) = run(cli.command, &config).await {
        let message = match e.downcast_ref::<ApiError>() {
            Some(api) => api.user_message(),
            None => format!("{:#}", e),
        };
        eprintln!("Error: {}", message);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(command: Command, config: &ClientConfig) -> anyhow::Result<()> {
    let store = SqliteStore::new(&config.state_db)
        .await
        .with_context(|| format!("Failed to open local state at {}", config.state_db))?;

    let api = ApiClient::with_base_url(&config.api_url, SessionStore::new(store.clone()));
    let cache = RouteContextCache::new(store);

    match command {
        Command::Login { email, password } => {
            api.login(&email, &password).await?;
            println!("Signed in as {}", email.trim());
        }
        Command::Register {
            name,
            email,
            password,
            confirm_password,
            phone,
            address,
        } => {
            let account = NewAccount {
                full_name: name,
                email,
                password,
                confirm_password,
                phone_number: phone,
                address,
            };
            let response = api.register(&account).await?;
            println!("{}", or_default(&response.message, "Account created. You can now sign in."));
        }
        Command::Logout => {
            api.logout().await?;
            println!("Signed out");
        }
        Command::Profile { action } => {
            require_session(&api).await?;
            run_profile(&api, action.unwrap_or(ProfileCommand::Show)).await?;
        }
        Command::Contacts { action } => {
            require_session(&api).await?;
            run_contacts(&api, action.unwrap_or(ContactsCommand::List)).await?;
        }
        Command::Route { action } => run_route(&api, &cache, config, action).await?,
        Command::Sos { action } => {
            require_session(&api).await?;
            let drill = matches!(action, Some(SosCommand::Test));
            run_sos(api, &cache, config, drill).await?;
        }
        Command::History => {
            require_session(&api).await?;
            let alerts = api.sos_history().await?;
            print!("{}", render::alert_history(&alerts));
        }
        Command::Whereami => {
            let fix = current_fix(config).await?;
            let geocoder = ReverseGeocoder::with_base_url(&config.geocoder_url);
            println!("{:.6}, {:.6}", fix.latitude, fix.longitude);
            println!("{}", geocoder.address_for(&fix).await);
        }
    }

    Ok(())
}

async fn current_fix(config: &ClientConfig) -> anyhow::Result<GeoFix> {
    match locate_once(&config.location_source(), LocationRequest::default()).await {
        Ok(fix) => Ok(fix),
        Err(notice) => bail!("{}", notice.message),
    }
}

/// Refuse protected commands without a session, as the app's route guard does.
async fn require_session<S: KeyValueStore>(api: &ApiClient<S>) -> anyhow::Result<()> {
    if !api.is_authenticated().await {
        bail!("Not signed in. Run `safenav login <email> --password <password>` first.");
    }
    Ok(())
}

async fn run_profile<S: KeyValueStore>(api: &ApiClient<S>, action: ProfileCommand) -> anyhow::Result<()> {
    match action {
        ProfileCommand::Show => {
            let profile = api.profile().await?;
            println!("Name:    {}", profile.full_name);
            println!("Email:   {}", profile.email);
            println!("Phone:   {}", or_default(&profile.phone_number, "-"));
            println!("Address: {}", or_default(&profile.address, "-"));
        }
        ProfileCommand::Update {
            name,
            phone,
            address,
        } => {
            let current = api.profile().await?;
            let update = ProfileUpdate {
                full_name: name.unwrap_or(current.full_name),
                phone_number: phone.unwrap_or(current.phone_number),
                address: address.unwrap_or(current.address),
            };
            let ack = api.update_profile(&update).await?;
            println!("{}", or_default(&ack.message, "Profile updated successfully"));
        }
        ProfileCommand::Password { old, new, confirm } => {
            let change = PasswordChange {
                old_password: old,
                new_password: new,
                confirm_password: confirm,
            };
            let ack = api.change_password(&change).await?;
            println!("{}", or_default(&ack.message, "Password updated successfully"));
        }
    }
    Ok(())
}

async fn run_contacts<S: KeyValueStore>(api: &ApiClient<S>, action: ContactsCommand) -> anyhow::Result<()> {
    match action {
        ContactsCommand::List => {
            let contacts = api.contacts().await?;
            print!("{}", render::contacts(&contacts));
        }
        ContactsCommand::Add {
            name,
            phone,
            relationship,
        } => {
            let draft = ContactDraft {
                name,
                phone_number: phone,
                relationship,
            };
            let added = api.add_contact(&draft).await?;
            println!("Added {}", added.name);
        }
        ContactsCommand::Edit {
            id,
            name,
            phone,
            relationship,
        } => {
            let draft = ContactDraft {
                name,
                phone_number: phone,
                relationship,
            };
            let updated = api.update_contact(&id, &draft).await?;
            println!("Updated {}", updated.name);
        }
        ContactsCommand::Delete { id } => {
            let ack = api.delete_contact(&id).await?;
            println!("{}", or_default(&ack.message, "Contact deleted"));
        }
    }
    Ok(())
}

async fn run_route<S: KeyValueStore>(
    api: &ApiClient<S>,
    cache: &RouteContextCache<S>,
    config: &ClientConfig,
    action: RouteCommand,
) -> anyhow::Result<()> {
    match action {
        RouteCommand::Plan { start, end } => {
            require_session(api).await?;
            let routes = api.plan_route(&start, &end).await?;
            print!("{}", render::route_options(&routes));
        }
        RouteCommand::Navigate { start, end, option } => {
            require_session(api).await?;
            let routes = api.plan_route(&start, &end).await?;
            let Some(route) = option.checked_sub(1).and_then(|idx| routes.get(idx)) else {
                bail!("No route option {} ({} available)", option, routes.len());
            };

            let context = cache.start_navigation(route, &start, &end).await?;
            println!("Navigating: {}", route.name);
            print!("{}", render::route_details(&context, "  "));
        }
        RouteCommand::Current => match cache.load().await {
            Some(context) => print!("{}", render::route_details(&context, "")),
            None => println!("No journey in progress."),
        },
        RouteCommand::Crimes { address } => {
            require_session(api).await?;
            let fix = current_fix(config).await?;
            let address = match address {
                Some(address) => address,
                None => {
                    ReverseGeocoder::with_base_url(&config.geocoder_url)
                        .address_for(&fix)
                        .await
                }
            };
            let reports = api.crime_reports(fix.latitude, fix.longitude, &address).await?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
    }
    Ok(())
}

/// Arm an alert (or a drill) and follow it until it settles.
async fn run_sos<S: KeyValueStore>(
    api: ApiClient<S>,
    cache: &RouteContextCache<S>,
    config: &ClientConfig,
    drill: bool,
) -> anyhow::Result<()> {
    let (controller, mut notices) = SosController::new(api, config.sos_config());

    // Only local reads happen before arming; network work runs alongside.
    controller.load_route_context(cache).await;
    let _locating = controller.request_location(config.location_source());

    let mut state = controller.subscribe();
    let started = if drill {
        controller.test_alert()
    } else {
        controller.trigger()
    };
    if !started {
        bail!("An SOS alert is already in progress");
    }
    let _history = controller.request_history();
    println!("{}", render::sos_state(&state.borrow_and_update()));

    let settled = loop {
        tokio::select! {
            // State first, so the outcome is seen before its notice.
            biased;

            changed = state.changed() => {
                if changed.is_err() {
                    break None;
                }
                let current = state.borrow_and_update().clone();
                println!("{}", render::sos_state(&current));
                if current.is_settled() || current == SosState::Idle {
                    break Some(current);
                }
            }
            Some(notice) = notices.recv() => println!("{}", notice),
            _ = tokio::signal::ctrl_c(), if controller.state().is_armed() => {
                if controller.cancel() {
                    info!("SOS cancelled from the terminal");
                }
            }
        }
    };

    if settled.as_ref().is_some_and(SosState::is_settled) {
        if let Ok(Some(notice)) = tokio::time::timeout(Duration::from_secs(1), notices.recv()).await {
            println!("{}", notice);
        }
    }
    while let Ok(notice) = notices.try_recv() {
        println!("{}", notice);
    }

    match settled {
        Some(SosState::Failed(_)) => bail!("SOS alert was not sent"),
        _ => Ok(()),
    }
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() { fallback } else { value }
}
