//! CLI entry point for AutoPart.

pub mod auth;
pub mod resources;

use clap::{Args, Parser, Subcommand};

/// AutoPart inventory CLI
#[derive(Parser, Debug)]
#[command(name = "autopart", version, about = "AutoPart inventory backend CLI")]
pub struct Cli {
    /// Backend base URL (overrides AUTOPART_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Session management
    Auth(AuthArgs),
    /// Warehouse locations
    Warehouses {
        #[command(subcommand)]
        command: WarehouseCommands,
    },
    /// Part-to-location assignments
    PartLocations {
        #[command(subcommand)]
        command: PartLocationCommands,
    },
    /// Customers
    Customers {
        #[command(subcommand)]
        command: CustomerCommands,
    },
}

#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommands,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Log in and store the token pair
    Login(LoginArgs),
    /// Revoke the session and drop stored tokens
    Logout,
    /// Show whether an access token is stored
    Status,
    /// Register a new user
    Signup(SignupArgs),
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    #[arg(short, long)]
    pub username: String,
    /// Password (falls back to AUTOPART_PASSWORD)
    #[arg(short, long, env = "AUTOPART_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args, Debug)]
pub struct SignupArgs {
    #[arg(short, long)]
    pub username: String,
    #[arg(short, long)]
    pub email: String,
    #[arg(short, long, env = "AUTOPART_PASSWORD", hide_env_values = true)]
    pub password: String,
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
}

/// Paging flags shared by every `list` command.
#[derive(Args, Debug, Clone, Copy)]
pub struct PageArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    #[arg(long, default_value_t = 20)]
    pub page_size: u32,
}

#[derive(Subcommand, Debug)]
pub enum WarehouseCommands {
    List {
        #[command(flatten)]
        paging: PageArgs,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },
    Get {
        id: i64,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        country: Option<String>,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum PartLocationCommands {
    List {
        #[command(flatten)]
        paging: PageArgs,
        #[arg(long)]
        part_id: Option<i64>,
        #[arg(long)]
        warehouse_id: Option<i64>,
    },
    Get {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum CustomerCommands {
    List {
        #[command(flatten)]
        paging: PageArgs,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    Get {
        id: i64,
    },
}
