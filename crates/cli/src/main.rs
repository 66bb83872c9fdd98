//! Forkful CLI - Drive the ordering client from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Run the whole order flow against the in-process service
//! forkful demo
//!
//! # List the orders an admin can see, with the legal transitions per order
//! forkful orders --user-id 2 --email ops@forkful.test --role admin
//!
//! # Move an order as a driver
//! forkful transition --user-id 3 --email rider@forkful.test --role driver 42 out_for_delivery
//!
//! # Assign (or, without --driver, unassign) a driver
//! forkful assign --user-id 2 --email ops@forkful.test 42 --driver 7
//! ```
//!
//! # Commands
//!
//! - `demo` - End-to-end flow against the in-memory ordering service
//! - `orders` - List orders visible to a role
//! - `transition` - Request a status change through the role's view
//! - `assign` - Admin driver assignment

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};
use forkful_client::config::SentryConfig;
use forkful_core::{DriverId, OrderId, OrderStatus, Role, UserId};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CommandError;

#[derive(Parser)]
#[command(name = "forkful")]
#[command(author, version, about = "Forkful ordering client")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Who the command acts as. The auth flow is external; these are its claims.
#[derive(Args)]
struct Identity {
    /// Signed-in user id
    #[arg(long)]
    user_id: UserId,

    /// Signed-in user email
    #[arg(long)]
    email: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run browse, checkout, assignment and delivery against an in-process service
    Demo,
    /// List the orders visible to a role
    Orders {
        #[command(flatten)]
        identity: Identity,

        /// Role to act as (`customer`, `admin`, `driver`)
        #[arg(short, long, default_value = "customer")]
        role: Role,
    },
    /// Request a status change for an order
    Transition {
        #[command(flatten)]
        identity: Identity,

        /// Role to act as (`customer`, `admin`, `driver`)
        #[arg(short, long)]
        role: Role,

        /// Order id
        order: OrderId,

        /// Target status (e.g. `confirmed`, `out_for_delivery`)
        status: OrderStatus,
    },
    /// Assign a driver to an order, or clear the assignment
    Assign {
        #[command(flatten)]
        identity: Identity,

        /// Order id
        order: OrderId,

        /// Driver id; omit to unassign
        #[arg(short, long)]
        driver: Option<DriverId>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &SentryConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config.environment.clone().map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&SentryConfig::from_env());

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "forkful_client=info,forkful_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(cli.json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!cli.json).then(tracing_subscriber::fmt::layer))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli.command).await {
        if let CommandError::App(app) = &e {
            app.report();
            tracing::error!(error = %e, "{}", app.user_message());
        } else {
            tracing::error!("Command failed: {e}");
        }
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<(), CommandError> {
    match command {
        Commands::Demo => commands::demo::run().await,
        Commands::Orders { identity, role } => {
            let session = commands::session(identity.user_id, &identity.email, role)?;
            commands::orders::list(&session, role).await
        }
        Commands::Transition {
            identity,
            role,
            order,
            status,
        } => {
            let session = commands::session(identity.user_id, &identity.email, role)?;
            commands::orders::transition(&session, role, order, status).await
        }
        Commands::Assign {
            identity,
            order,
            driver,
        } => {
            let session = commands::session(identity.user_id, &identity.email, Role::Admin)?;
            commands::orders::assign(&session, order, driver).await
        }
    }
}
