use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "bb")]
#[command(about = "Bitbucket Cloud command-line client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Basic (app password) authentication
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// OAuth 2.0 authentication
    Oauth {
        #[command(subcommand)]
        command: OauthCommands,
    },

    /// Show the identity the current credentials belong to
    Whoami,
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Store a username and app password
    LoginBasic {
        /// Bitbucket username
        #[arg(short, long, env = "BB_USERNAME")]
        username: String,

        /// App password (prompted when omitted)
        #[arg(short = 'p', long, env = "BB_APP_PASSWORD")]
        app_password: Option<String>,
    },

    /// Show which credentials are configured
    Status,

    /// Delete stored Basic credentials
    Logout,
}

#[derive(Subcommand)]
enum OauthCommands {
    /// Register the OAuth consumer (client id/secret)
    Setup {
        /// OAuth consumer key
        #[arg(long)]
        client_id: String,

        /// OAuth consumer secret (prompted when omitted)
        #[arg(long)]
        client_secret: Option<String>,

        /// Redirect URI registered with the consumer
        #[arg(long, default_value = "http://localhost:8080/callback")]
        redirect_uri: String,

        /// Scopes to request (defaults to a standard working set)
        #[arg(long, value_delimiter = ',')]
        scopes: Vec<String>,
    },

    /// Run the interactive browser login
    Login {
        /// Loopback port for the callback listener
        #[arg(short, long)]
        port: Option<u16>,

        /// Print the authorization URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,

        /// Seconds to wait for the browser redirect
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,
    },

    /// Obtain a token without a browser (client credentials grant)
    ClientCredentials,

    /// Show OAuth configuration and token state
    Status,

    /// Delete the stored OAuth app and token
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    match cli.command {
        Commands::Auth { command } => match command {
            AuthCommands::LoginBasic {
                username,
                app_password,
            } => commands::auth::login_basic(username, app_password).await,
            AuthCommands::Status => commands::auth::status().await,
            AuthCommands::Logout => commands::auth::logout().await,
        },
        Commands::Oauth { command } => match command {
            OauthCommands::Setup {
                client_id,
                client_secret,
                redirect_uri,
                scopes,
            } => commands::oauth::setup(client_id, client_secret, redirect_uri, scopes).await,
            OauthCommands::Login {
                port,
                no_browser,
                timeout_secs,
            } => commands::oauth::login(port, no_browser, timeout_secs).await,
            OauthCommands::ClientCredentials => commands::oauth::client_credentials().await,
            OauthCommands::Status => commands::oauth::status().await,
            OauthCommands::Logout => commands::oauth::logout().await,
        },
        Commands::Whoami => commands::auth::whoami().await,
    }
}
