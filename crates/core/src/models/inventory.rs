#![allow(missing_docs)]

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::ValidationError, validation};

/// Currency a purchase price is quoted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Iqd,
}

/// Progress of a purchase order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    /// Still to be bought.
    #[default]
    Todo,
    /// Bought and received.
    Done,
}

impl PurchaseStatus {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Todo => "todo",
            PurchaseStatus::Done => "done",
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PurchaseStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "todo" => Ok(PurchaseStatus::Todo),
            "done" => Ok(PurchaseStatus::Done),
            other => Err(format!("unknown purchase status '{other}'")),
        }
    }
}

/// A shoe model in the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shoe {
    pub id: String,
    pub name: String,
    pub brand: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Shoe {
    /// Returns a user-facing label combining brand and name.
    pub fn display_name(&self) -> String {
        match self.size.as_deref() {
            Some(size) if !size.is_empty() => format!("{} {} ({})", self.brand, self.name, size),
            _ => format!("{} {}", self.brand, self.name),
        }
    }
}

/// Query parameters for the shoe list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ShoeFilter {
    /// Case-insensitive search over name and brand.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

/// Payload for adding a shoe to the catalogue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewShoe {
    pub name: String,
    pub brand: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    pub price: f64,
}

impl NewShoe {
    /// Check every field before a request is made.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::name("name", &self.name)?;
        validation::name("brand", &self.brand)?;
        validation::positive_amount("price", self.price)
    }
}

/// Partial update of a shoe; absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl ShoeUpdate {
    /// Check the fields that are present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validation::name("name", name)?;
        }
        if let Some(brand) = &self.brand {
            validation::name("brand", brand)?;
        }
        if let Some(price) = self.price {
            validation::positive_amount("price", price)?;
        }
        Ok(())
    }
}

/// On-hand quantity of one shoe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    pub id: String,
    pub shoe_id: String,
    #[serde(default)]
    pub shoe: Option<Shoe>,
    pub quantity: i64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Query parameters for the stock list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockFilter {
    /// Restrict to a single shoe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shoe_id: Option<String>,
}

/// A purchase order placed with a supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: String,
    pub shoe_id: String,
    #[serde(default)]
    pub shoe: Option<Shoe>,
    pub supplier: String,
    pub quantity: i64,
    pub unit_price: f64,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub status: PurchaseStatus,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Purchase {
    /// Quantity multiplied by unit price, in the purchase currency.
    pub fn total(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }
}

/// Outstanding purchases for one supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoGroup {
    pub supplier: String,
    #[serde(default)]
    pub purchases: Vec<Purchase>,
    #[serde(default)]
    pub total_quantity: i64,
}

/// Payload for recording a purchase.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPurchase {
    pub shoe_id: String,
    pub supplier: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub currency: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl NewPurchase {
    /// Check every field before a request is made.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::name("shoeId", &self.shoe_id)?;
        validation::name("supplier", &self.supplier)?;
        validation::quantity("quantity", self.quantity, 1)?;
        validation::positive_amount("unitPrice", self.unit_price)
    }
}

/// Partial update of a purchase; absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PurchaseUpdate {
    /// Check the fields that are present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(supplier) = &self.supplier {
            validation::name("supplier", supplier)?;
        }
        if let Some(quantity) = self.quantity {
            validation::quantity("quantity", quantity, 1)?;
        }
        if let Some(price) = self.unit_price {
            validation::positive_amount("unitPrice", price)?;
        }
        Ok(())
    }
}

/// Supplier known from past purchases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub name: String,
    #[serde(default)]
    pub purchase_count: u64,
}

/// Current USD to IQD conversion rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    pub rate: f64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ExchangeRate {
    /// Convert a USD amount to IQD.
    pub fn to_iqd(&self, usd: f64) -> f64 {
        usd * self.rate
    }
}
