use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use shoestock_core::models::{Currency, PurchaseStatus, Role};

#[derive(Parser, Debug)]
#[command(name = "shoestock")]
#[command(version)]
#[command(about = "Shoe inventory, purchases and stock from the command line", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in with a phone number
    Login {
        /// Phone number, e.g. 07501234567
        phone: String,
        #[arg(long, env = "SHOESTOCK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account with the shop's invitation secret
    Register {
        name: String,
        phone: String,
        #[arg(long, env = "SHOESTOCK_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, env = "SHOESTOCK_INVITATION_SECRET", hide_env_values = true)]
        secret: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Send a password reset link
    ForgotPassword { phone: String },
    /// Check whether a reset token is still valid
    VerifyResetToken { token: String },
    /// Choose a new password with a reset token
    ResetPassword {
        token: String,
        #[arg(long, env = "SHOESTOCK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// List the shoe catalogue
    Shoes {
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one shoe
    Shoe { id: String },
    /// List stock levels
    Stock {
        /// Only this shoe
        #[arg(long)]
        shoe: Option<String>,
        #[command(subcommand)]
        action: Option<StockAction>,
    },
    /// List purchases
    Purchases {
        #[arg(long, value_enum, conflicts_with = "todo")]
        status: Option<StatusArg>,
        /// Outstanding purchases grouped by supplier
        #[arg(long)]
        todo: bool,
    },
    /// Record or update a purchase
    Purchase {
        #[command(subcommand)]
        action: PurchaseAction,
    },
    /// List suppliers
    Suppliers,
    /// List accounts (admin)
    Users,
    /// Manage an account (admin)
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Show or set the USD to IQD rate
    ExchangeRate {
        /// New rate (admin)
        #[arg(long)]
        set: Option<f64>,
    },
    /// Show or choose the interface language (en, ar, ckb)
    Language { code: Option<String> },
}

#[derive(Subcommand, Debug)]
pub enum StockAction {
    /// Set the on-hand quantity of a stock item
    Set { id: String, quantity: i64 },
}

#[derive(Subcommand, Debug)]
pub enum PurchaseAction {
    /// Record a new purchase
    Add {
        #[arg(long)]
        shoe: String,
        #[arg(long)]
        supplier: String,
        #[arg(long)]
        quantity: i64,
        #[arg(long)]
        unit_price: f64,
        #[arg(long, value_enum, default_value_t = CurrencyArg::Usd)]
        currency: CurrencyArg,
        #[arg(long)]
        note: Option<String>,
    },
    /// Mark a purchase as done
    Done { id: String },
    /// Move a purchase back to todo
    Todo { id: String },
    /// Delete a purchase
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum UserAction {
    /// Change an account's role
    Role {
        id: String,
        #[arg(value_enum)]
        role: RoleArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Todo,
    Done,
}

impl From<StatusArg> for PurchaseStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Todo => PurchaseStatus::Todo,
            StatusArg::Done => PurchaseStatus::Done,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CurrencyArg {
    Usd,
    Iqd,
}

impl From<CurrencyArg> for Currency {
    fn from(value: CurrencyArg) -> Self {
        match value {
            CurrencyArg::Usd => Currency::Usd,
            CurrencyArg::Iqd => Currency::Iqd,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RoleArg {
    Admin,
    User,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Admin => Role::Admin,
            RoleArg::User => Role::User,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_commands() {
        let cli = Cli::parse_from([
            "shoestock",
            "purchase",
            "add",
            "--shoe",
            "s1",
            "--supplier",
            "Nawroz",
            "--quantity",
            "4",
            "--unit-price",
            "21.5",
        ]);
        match cli.command {
            Commands::Purchase {
                action: PurchaseAction::Add {
                    quantity, currency, ..
                },
            } => {
                assert_eq!(quantity, 4);
                assert!(matches!(currency, CurrencyArg::Usd));
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::parse_from(["shoestock", "stock", "set", "st1", "0"]);
        assert!(matches!(
            cli.command,
            Commands::Stock {
                action: Some(StockAction::Set { quantity: 0, .. }),
                ..
            }
        ));
    }

    #[test]
    fn todo_and_status_conflict() {
        let parsed = Cli::try_parse_from(["shoestock", "purchases", "--todo", "--status", "done"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
