use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shoestock_core::{
    models::{NewPurchase, Purchase, PurchaseStatus, Shoe, ShoeFilter, StockFilter},
    resource::{Notification, Severity},
    AppContext, Identity, Language, QueryState,
};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::args::{Commands, PurchaseAction, StockAction, UserAction};

/// Marker for failures already shown to the user through a notification.
#[derive(Debug, Error)]
#[error("mutation failed")]
pub struct Reported;

pub struct Runner {
    context: AppContext,
    notifications: mpsc::Receiver<Notification>,
    json: bool,
}

impl Runner {
    pub fn new(mut context: AppContext, json: bool) -> Result<Self> {
        let notifications = context
            .take_notifications()
            .ok_or_else(|| anyhow!("notification channel already taken"))?;
        Ok(Self {
            context,
            notifications,
            json,
        })
    }

    pub async fn handle(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Login { phone, password } => {
                let identity = self.context.login(&phone, &password).await?;
                println!("Logged in as {}", identity.display_name());
            }
            Commands::Register {
                name,
                phone,
                password,
                secret,
            } => {
                let identity = self
                    .context
                    .register(&name, &phone, &password, &secret)
                    .await?;
                println!("Welcome, {}", identity.display_name());
            }
            Commands::Logout => {
                self.context.logout();
                println!("Logged out");
            }
            Commands::Whoami => {
                let identity = self.require_session()?;
                self.whoami(&identity)?;
            }
            Commands::ForgotPassword { phone } => {
                self.context.api().forgot_password(&phone).await?;
                println!("If the number is registered, a reset link is on its way.");
            }
            Commands::VerifyResetToken { token } => {
                if self.context.api().verify_reset_token(&token).await? {
                    println!("Token is valid");
                } else {
                    bail!("Token is invalid or has expired");
                }
            }
            Commands::ResetPassword { token, password } => {
                self.context.api().reset_password(&token, &password).await?;
                println!("Password changed. You can log in now.");
            }
            Commands::Shoes { search } => {
                self.require_session()?;
                let shoes = ready(self.context.loader().shoes(&ShoeFilter { search }).await?)?;
                self.print(&shoes, |shoes| {
                    for shoe in shoes {
                        print_shoe(shoe);
                    }
                })?;
            }
            Commands::Shoe { id } => {
                self.require_session()?;
                let shoe = ready(self.context.loader().shoe(&id).await?)?;
                self.print(&shoe, print_shoe)?;
            }
            Commands::Stock { shoe, action } => {
                self.require_session()?;
                match action {
                    Some(StockAction::Set { id, quantity }) => {
                        let result = self.context.sync().update_stock(&id, quantity).await;
                        self.settle(result)?;
                    }
                    None => {
                        let filter = StockFilter { shoe_id: shoe };
                        let stock = ready(self.context.loader().stock(&filter).await?)?;
                        self.print(&stock, |stock| {
                            for item in stock {
                                let label = item
                                    .shoe
                                    .as_ref()
                                    .map(Shoe::display_name)
                                    .unwrap_or_else(|| item.shoe_id.clone());
                                println!("{:<10} {:>6}  {label}", item.id, item.quantity);
                            }
                        })?;
                    }
                }
            }
            Commands::Purchases { status, todo } => {
                self.require_session()?;
                if todo {
                    let groups = ready(self.context.loader().todo_purchases().await?)?;
                    self.print(&groups, |groups| {
                        for group in groups {
                            println!("{} ({} pairs)", group.supplier, group.total_quantity);
                            for purchase in &group.purchases {
                                print!("  ");
                                print_purchase(purchase);
                            }
                        }
                    })?;
                } else {
                    let status = status.map(PurchaseStatus::from);
                    let purchases = ready(self.context.loader().purchases(status).await?)?;
                    self.print(&purchases, |purchases| {
                        for purchase in purchases {
                            print_purchase(purchase);
                        }
                    })?;
                }
            }
            Commands::Purchase { action } => {
                self.require_session()?;
                let sync = self.context.sync();
                match action {
                    PurchaseAction::Add {
                        shoe,
                        supplier,
                        quantity,
                        unit_price,
                        currency,
                        note,
                    } => {
                        let purchase = NewPurchase {
                            shoe_id: shoe,
                            supplier,
                            quantity,
                            unit_price,
                            currency: currency.into(),
                            note,
                        };
                        let result = sync.create_purchase(&purchase).await;
                        self.settle(result)?;
                    }
                    PurchaseAction::Done { id } => {
                        let result = sync.mark_done(&id).await;
                        self.settle(result)?;
                    }
                    PurchaseAction::Todo { id } => {
                        let result = sync.mark_todo(&id).await;
                        self.settle(result)?;
                    }
                    PurchaseAction::Delete { id } => {
                        let result = sync.delete_purchase(&id).await;
                        self.settle(result)?;
                    }
                }
            }
            Commands::Suppliers => {
                self.require_session()?;
                let suppliers = ready(self.context.loader().suppliers().await?)?;
                self.print(&suppliers, |suppliers| {
                    for supplier in suppliers {
                        println!("{:<30} {:>4} purchases", supplier.name, supplier.purchase_count);
                    }
                })?;
            }
            Commands::Users => {
                self.require_admin()?;
                let users = ready(self.context.loader().users().await?)?;
                self.print(&users, |users| {
                    for user in users {
                        println!(
                            "{:<10} {:<6} {:<12} {:<24} {}",
                            user.id,
                            user.role.as_str(),
                            user.phone_number,
                            user.name,
                            format_date(user.created_at)
                        );
                    }
                })?;
            }
            Commands::User { action } => {
                self.require_admin()?;
                match action {
                    UserAction::Role { id, role } => {
                        let result = self.context.sync().change_role(&id, role.into()).await;
                        self.settle(result)?;
                    }
                }
            }
            Commands::ExchangeRate { set } => match set {
                Some(rate) => {
                    self.require_admin()?;
                    let result = self.context.sync().set_exchange_rate(rate).await;
                    self.settle(result)?;
                }
                None => {
                    self.require_session()?;
                    let rate = ready(self.context.loader().exchange_rate().await?)?;
                    self.print(&rate, |rate| {
                        println!(
                            "1 USD = {:.0} IQD (updated {})",
                            rate.rate,
                            format_date(rate.updated_at)
                        );
                    })?;
                }
            },
            Commands::Language { code } => {
                let preferences = self.context.preferences();
                match code {
                    Some(code) => {
                        let language: Language = code.parse().map_err(|err: String| anyhow!(err))?;
                        preferences.set_language(language)?;
                        println!("Language set to {language}");
                    }
                    None => {
                        let current = preferences.language();
                        let direction = if current.is_rtl() { "rtl" } else { "ltr" };
                        println!("{current} ({direction})");
                    }
                }
            }
        }
        Ok(())
    }

    fn require_session(&self) -> Result<Identity> {
        self.context
            .view()
            .user()
            .ok_or_else(|| anyhow!("Please log in first: shoestock login <phone>"))
    }

    fn require_admin(&self) -> Result<Identity> {
        let identity = self.require_session()?;
        if !identity.is_admin() {
            bail!("Only admins can do that");
        }
        Ok(identity)
    }

    fn whoami(&self, identity: &Identity) -> Result<()> {
        #[derive(Serialize)]
        struct Whoami<'a> {
            #[serde(flatten)]
            identity: &'a Identity,
            language: Language,
        }

        let language = self.context.preferences().language();
        let summary = Whoami { identity, language };
        self.print(&summary, |summary| {
            println!("{}", summary.identity.display_name());
            println!("role: {}", summary.identity.role);
            println!("language: {}", summary.language);
        })
    }

    fn print<T: Serialize>(&self, value: &T, plain: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            plain(value);
        }
        Ok(())
    }

    /// Print the notifications a mutation produced and turn a failure into [`Reported`].
    fn settle<T>(&mut self, result: Result<T, shoestock_core::ApiError>) -> Result<()> {
        let mut reported = false;
        while let Ok(notification) = self.notifications.try_recv() {
            match notification.severity {
                Severity::Success => {
                    println!("{}. {}", notification.title, notification.description)
                }
                Severity::Error => {
                    reported = true;
                    eprintln!("{}: {}", notification.title, notification.description)
                }
            }
        }
        match result {
            Ok(_) => Ok(()),
            Err(_) if reported => Err(Reported.into()),
            Err(err) => Err(anyhow!(err.user_message())),
        }
    }
}

fn ready<T>(state: QueryState<T>) -> Result<T> {
    match state {
        QueryState::Ready(value) => Ok(value),
        QueryState::Disabled => bail!("Please log in first: shoestock login <phone>"),
    }
}

fn print_shoe(shoe: &Shoe) {
    println!(
        "{:<10} {:<32} {:>8.2}  {}",
        shoe.id,
        shoe.display_name(),
        shoe.price,
        shoe.color.as_deref().unwrap_or("-")
    );
}

fn print_purchase(purchase: &Purchase) {
    println!(
        "{:<10} {:<5} {:<20} {:>4} x {:>8.2} {:?}  {}",
        purchase.id,
        purchase.status.as_str(),
        purchase.supplier,
        purchase.quantity,
        purchase.unit_price,
        purchase.currency,
        format_date(purchase.created_at)
    );
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}
