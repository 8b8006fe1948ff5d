use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::debug;

use tokenauth::db::Database;
use tokenauth::store::SqliteStore;
use tokenauth::{AuthConfig, AuthServices, IssuedToken, NewUser, User, UserAccount};

const APP_NAME: &str = "tokenauth";

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.common);
    async_main(cli)
}

#[tokio::main]
async fn async_main(cli: Cli) -> Result<()> {
    let config = AuthConfig::load(cli.common.config.as_deref())
        .context("loading authentication config")?;
    debug!(?config, "resolved configuration");

    let db = Database::new(&cli.common.database)
        .await
        .with_context(|| format!("opening database {}", cli.common.database.display()))?;
    let store = Arc::new(SqliteStore::from_database(&db));
    let services = AuthServices::new(store, &config).context("building services")?;

    let out = Output {
        json: cli.common.json,
    };

    match cli.command {
        Command::CreateUser(cmd) => handle_create_user(&services, &out, cmd).await,
        Command::ListUsers => handle_list_users(&services, &out).await,
        Command::GetUser { user } => handle_get_user(&services, &out, user).await,
        Command::ResetPassword { id, password } => {
            services.users.reset_password(id, &password).await?;
            out.message(&format!("password reset for user {id}"))
        }
        Command::DeleteUser { id } => {
            services.users.delete(id).await?;
            out.message(&format!("deleted user {id}"))
        }
        Command::IssueToken(cmd) => handle_issue_token(&services, &out, cmd).await,
        Command::Authenticate { header } => {
            let user = services.authenticator.authenticate_header(Some(&header)).await?;
            out.user(&user)
        }
        Command::RevokeToken { token } => {
            services.tokens.delete_by_plaintext(&token).await?;
            out.message("token revoked")
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Manage users and bearer tokens in a tokenauth database.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Path to the SQLite database
    #[arg(long, value_name = "PATH", env = "TOKENAUTH_DATABASE", default_value = "tokenauth.db", global = true)]
    database: PathBuf,
    /// Path to a TOML config file
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Output machine readable JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a user
    CreateUser(CreateUserCommand),
    /// List all users ordered by last name
    ListUsers,
    /// Show a user and their live token
    GetUser {
        /// User id or email
        user: UserRef,
    },
    /// Set a new password for a user
    ResetPassword {
        id: i64,
        #[arg(long, env = "TOKENAUTH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Delete a user and their tokens
    DeleteUser { id: i64 },
    /// Issue a token, replacing any the user already has
    IssueToken(IssueTokenCommand),
    /// Resolve the user behind an Authorization header value
    Authenticate {
        /// Full header value, e.g. "Bearer <token>"
        header: String,
    },
    /// Delete the token with this plaintext
    RevokeToken { token: String },
}

#[derive(Debug, Args)]
struct CreateUserCommand {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    email: String,
    #[arg(long, env = "TOKENAUTH_PASSWORD", hide_env_values = true)]
    password: String,
    /// Create the user as inactive
    #[arg(long)]
    inactive: bool,
}

#[derive(Debug, Args)]
struct IssueTokenCommand {
    /// User id or email
    user: UserRef,
    /// Token lifetime in hours
    #[arg(long, default_value_t = 24, allow_negative_numbers = true)]
    ttl_hours: i64,
    /// Verify this password before issuing (email lookup only)
    #[arg(long, env = "TOKENAUTH_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

/// A user named on the command line by id or by email.
#[derive(Debug, Clone)]
enum UserRef {
    Id(i64),
    Email(String),
}

impl std::str::FromStr for UserRef {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse() {
            Ok(id) => UserRef::Id(id),
            Err(_) => UserRef::Email(s.to_string()),
        })
    }
}

async fn fetch_account(services: &AuthServices, user: UserRef) -> Result<UserAccount> {
    let account = match user {
        UserRef::Id(id) => services.users.fetch(id).await?,
        UserRef::Email(email) => services.users.fetch_by_email(&email).await?,
    };
    Ok(account)
}

async fn handle_create_user(
    services: &AuthServices,
    out: &Output,
    cmd: CreateUserCommand,
) -> Result<()> {
    let id = services
        .users
        .create(NewUser {
            first_name: cmd.first_name,
            last_name: cmd.last_name,
            email: cmd.email,
            active: !cmd.inactive,
            password: cmd.password,
        })
        .await?;

    let account = services.users.fetch(id).await?;
    out.user(&account.user)
}

async fn handle_list_users(services: &AuthServices, out: &Output) -> Result<()> {
    let users = services.users.list().await?;
    if out.json {
        return out.print_json(&users);
    }

    let mut stdout = io::stdout().lock();
    for user in &users {
        writeln!(
            stdout,
            "{}\t{}\t{}\t{}",
            user.id,
            user.full_name(),
            user.email,
            if user.active { "active" } else { "inactive" }
        )?;
    }
    Ok(())
}

async fn handle_get_user(services: &AuthServices, out: &Output, user: UserRef) -> Result<()> {
    let account = fetch_account(services, user).await?;
    if out.json {
        return out.print_json(&account);
    }

    out.user(&account.user)?;
    match &account.token {
        Some(token) => println!(
            "token:   #{} {} (expires {})",
            token.id,
            token.hash_hex(),
            token.expiry.to_rfc3339()
        ),
        None => println!("token:   none"),
    }
    Ok(())
}

async fn handle_issue_token(
    services: &AuthServices,
    out: &Output,
    cmd: IssueTokenCommand,
) -> Result<()> {
    let ttl = chrono::Duration::try_hours(cmd.ttl_hours).context("ttl out of range")?;

    let issued = match (cmd.user, cmd.password) {
        (UserRef::Email(email), Some(password)) => {
            let (_, issued) = services.users.login(&email, &password, ttl).await?;
            issued
        }
        (user, _) => {
            let account = fetch_account(services, user).await?;
            services.tokens.issue(&account.user, ttl).await?
        }
    };

    out.token(&issued)
}

struct Output {
    json: bool,
}

impl Output {
    fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn message(&self, msg: &str) -> Result<()> {
        if self.json {
            self.print_json(&serde_json::json!({ "status": "ok", "message": msg }))
        } else {
            println!("{msg}");
            Ok(())
        }
    }

    fn user(&self, user: &User) -> Result<()> {
        if self.json {
            return self.print_json(user);
        }
        println!("id:      {}", user.id);
        println!("name:    {}", user.full_name());
        println!("email:   {}", user.email);
        println!("active:  {}", user.active);
        Ok(())
    }

    fn token(&self, issued: &IssuedToken) -> Result<()> {
        if self.json {
            return self.print_json(issued);
        }
        println!("{}", issued.plaintext);
        println!("expires: {}", issued.token.expiry.to_rfc3339());
        Ok(())
    }
}

fn init_logging(common: &CommonOpts) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let level = match common.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{APP_NAME}={level},tokenauthctl={level}")));

    // Logs go to stderr so stdout stays parseable.
    if common.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .try_init()
            .ok();
    }
}
