use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::application::{AccountService, PointsReceipt, UserUpdate};
use crate::auth::{DEFAULT_TOKEN_TTL_DAYS, TokenIssuer};
use crate::domain::{DEFAULT_PAGE_NUMBER, DEFAULT_PAGE_SIZE, PageRequest, UserProfile};
use crate::http::{self, AppState};

/// pointledger - user accounts with a points ledger
#[derive(Parser)]
#[command(name = "pointledger")]
#[command(about = "User accounts with an append-only points ledger")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "POINTLEDGER_DATABASE", default_value = "pointledger.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Serve the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, env = "POINTLEDGER_BIND", default_value = "127.0.0.1:5000")]
        bind: SocketAddr,

        /// Secret used to sign bearer tokens
        #[arg(long, env = "POINTLEDGER_TOKEN_SECRET", hide_env_values = true)]
        token_secret: String,

        /// How long issued tokens stay valid, in days
        #[arg(long, default_value_t = DEFAULT_TOKEN_TTL_DAYS)]
        token_ttl_days: i64,
    },

    /// User management commands
    #[command(subcommand)]
    User(UserCommands),

    /// Points ledger commands
    #[command(subcommand)]
    Points(PointsCommands),
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a new user
    Register {
        /// Display name
        name: String,

        /// Email address (must be unique)
        email: String,

        /// Password
        #[arg(long, env = "POINTLEDGER_PASSWORD", hide_env_values = true)]
        password: String,

        /// Grant administrator rights
        #[arg(long)]
        admin: bool,
    },

    /// List users, one page at a time
    List {
        /// Users per page
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: i64,

        /// Page to show, starting at 1 (0 also means the first page)
        #[arg(short, long, default_value_t = DEFAULT_PAGE_NUMBER)]
        page: i64,
    },

    /// Show a user's profile and ledger
    Show {
        /// User ID
        id: Uuid,
    },

    /// Change a user's name, email or admin flag
    Update {
        /// User ID
        id: Uuid,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        /// Set or clear administrator rights (true/false)
        #[arg(long)]
        admin: Option<bool>,
    },

    /// Delete a user and its ledger
    Delete {
        /// User ID
        id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum PointsCommands {
    /// Append a point event (any sign)
    Add {
        /// User ID
        id: Uuid,

        /// Signed amount, e.g. 10 or -3
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },

    /// Append a point event exactly like `add`; pass a negative amount to lower the total
    Remove {
        /// User ID
        id: Uuid,

        /// Signed amount, appended as given
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },

    /// Subtract a non-negative amount from the total
    Deduct {
        /// User ID
        id: Uuid,

        /// Amount to subtract
        amount: i64,
    },

    /// Show a user's ledger
    History {
        /// User ID
        id: Uuid,
    },
}

impl Cli {
    /// Install the global tracing subscriber. `RUST_LOG` overrides the defaults.
    pub fn init_logging(&self) {
        let default_filter = if self.verbose {
            "pointledger=debug,tower_http=debug"
        } else if matches!(self.command, Commands::Serve { .. }) {
            "pointledger=info,tower_http=info"
        } else {
            "pointledger=warn"
        };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
        // Logs go to stderr so command output stays pipeable.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                AccountService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Serve {
                bind,
                token_secret,
                token_ttl_days,
            } => {
                let service = AccountService::init(&self.database).await?;
                let tokens =
                    TokenIssuer::new(token_secret, chrono::Duration::days(token_ttl_days))
                        .context("Invalid token configuration")?;
                http::serve(bind, AppState::new(service, tokens)).await?;
            }

            Commands::User(user_cmd) => {
                let service = AccountService::connect(&self.database).await?;
                run_user_command(&service, user_cmd).await?;
            }

            Commands::Points(points_cmd) => {
                let service = AccountService::connect(&self.database).await?;
                run_points_command(&service, points_cmd).await?;
            }
        }

        Ok(())
    }
}

async fn run_user_command(service: &AccountService, cmd: UserCommands) -> Result<()> {
    match cmd {
        UserCommands::Register {
            name,
            email,
            password,
            admin,
        } => {
            let user = if admin {
                service.register_admin(&name, &email, &password).await?
            } else {
                service.register(&name, &email, &password).await?
            };
            println!(
                "Registered user: {} <{}> ({}){}",
                user.name,
                user.email,
                user.id,
                if user.is_admin { " [admin]" } else { "" }
            );
        }

        UserCommands::List { page_size, page } => {
            let request = PageRequest::from_numbers(page_size, page)?;
            let page = service.list_users(request).await?;
            if page.items.is_empty() {
                println!("No users found.");
            } else {
                println!(
                    "{:<36}  {:<20} {:<30} {:>10} {:<5}",
                    "ID", "NAME", "EMAIL", "POINTS", "ADMIN"
                );
                println!("{}", "-".repeat(106));
                for user in &page.items {
                    println!(
                        "{:<36}  {:<20} {:<30} {:>10} {:<5}",
                        user.id,
                        truncate(&user.name, 20),
                        truncate(&user.email, 30),
                        user.points,
                        if user.is_admin { "yes" } else { "no" }
                    );
                }
            }
            println!("Page {} of {}", page.page, page.pages);
        }

        UserCommands::Show { id } => {
            let user = service.get_user(id).await?;
            print_profile(&user);
            println!();
            print_ledger(&user);
        }

        UserCommands::Update {
            id,
            name,
            email,
            admin,
        } => {
            let user = service
                .update_user(
                    id,
                    UserUpdate {
                        name,
                        email,
                        is_admin: admin,
                    },
                )
                .await?;
            println!("Updated user:");
            print_profile(&user);
        }

        UserCommands::Delete { id } => {
            service.delete_user(id).await?;
            println!("User removed: {}", id);
        }
    }
    Ok(())
}

async fn run_points_command(service: &AccountService, cmd: PointsCommands) -> Result<()> {
    match cmd {
        PointsCommands::Add { id, amount } => {
            let receipt = service.add_points(id, amount).await?;
            print_receipt("Added points successfully", &receipt);
        }

        PointsCommands::Remove { id, amount } => {
            let receipt = service.remove_points(id, amount).await?;
            print_receipt("Removed points", &receipt);
        }

        PointsCommands::Deduct { id, amount } => {
            let receipt = service.deduct_points(id, amount).await?;
            print_receipt("Deducted points", &receipt);
        }

        PointsCommands::History { id } => {
            let user = service.get_user(id).await?;
            print_ledger(&user);
        }
    }
    Ok(())
}

fn print_receipt(message: &str, receipt: &PointsReceipt) {
    println!(
        "{}: {:+} (total {}, {} entries)",
        message, receipt.event.num_points, receipt.points, receipt.entries
    );
}

fn print_profile(user: &UserProfile) {
    println!("User: {}", user.name);
    println!("  ID:       {}", user.id);
    println!("  Email:    {}", user.email);
    println!("  Admin:    {}", if user.is_admin { "yes" } else { "no" });
    println!("  Points:   {}", user.points);
    println!(
        "  Created:  {}",
        user.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "  Updated:  {}",
        user.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
}

fn print_ledger(user: &UserProfile) {
    if user.points_array.is_empty() {
        println!("No point events recorded.");
        return;
    }
    println!("{:<20} {:>12} {:>12}", "TIME", "POINTS", "RUNNING");
    println!("{}", "-".repeat(46));
    let mut running: i64 = 0;
    for event in &user.points_array {
        running = running.saturating_add(event.num_points);
        println!(
            "{:<20} {:>+12} {:>12}",
            event.time.format("%Y-%m-%d %H:%M:%S"),
            event.num_points,
            running
        );
    }
    println!("{}", "-".repeat(46));
    println!("{:<20} {:>12} {:>12}", "TOTAL", "", user.points);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
