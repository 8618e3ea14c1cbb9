//! Product Catalog
//!
//! Static mapping from product key to price, billing cycle and the
//! provider-specific identifier used to open a checkout for it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CheckoutError, Result};

/// Billing cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BillingCycle {
    OneTime,
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OneTime => "one-time",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Suffix used when composing a product key from a plan name
    const fn key_suffix(self) -> &'static str {
        match self {
            Self::OneTime => "",
            Self::Monthly => "Monthly",
            Self::Yearly => "Yearly",
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sellable product
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Stable lookup key shared with callers (e.g. `growthMonthly`)
    pub key: String,

    /// Name of the provider adapter that sells this product
    pub provider: String,

    /// Provider-side identifier (price ID, variant ID, ...)
    pub provider_product_id: String,

    /// Display name
    pub name: String,

    /// Price in whole currency units
    pub price: u32,

    /// ISO currency code
    pub currency: String,

    pub billing_cycle: BillingCycle,

    pub description: String,
}

impl Product {
    pub fn new(
        key: impl Into<String>,
        provider: impl Into<String>,
        provider_product_id: impl Into<String>,
        name: impl Into<String>,
        price: u32,
        billing_cycle: BillingCycle,
    ) -> Self {
        Self {
            key: key.into(),
            provider: provider.into(),
            provider_product_id: provider_product_id.into(),
            name: name.into(),
            price,
            currency: "USD".into(),
            billing_cycle,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Free products are routed to a contact flow, never to a provider
    pub const fn is_purchasable(&self) -> bool {
        self.price > 0
    }

    /// Price formatted for display: `Free`, `$2,990`, `1,200 EUR`
    pub fn display_price(&self) -> String {
        if self.price == 0 {
            return "Free".into();
        }

        let amount = group_thousands(self.price);
        if self.currency.eq_ignore_ascii_case("USD") {
            format!("${amount}")
        } else {
            format!("{amount} {}", self.currency)
        }
    }
}

fn group_thousands(value: u32) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Immutable product lookup table
#[derive(Clone, Debug, Default)]
pub struct ProductCatalog {
    products: HashMap<String, Product>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a fixed product list; later duplicates replace earlier ones
    pub fn from_products(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: products.into_iter().map(|p| (p.key.clone(), p)).collect(),
        }
    }

    pub fn with_product(mut self, product: Product) -> Self {
        self.products.insert(product.key.clone(), product);
        self
    }

    /// Look up a product by key
    pub fn resolve(&self, product_key: &str) -> Result<&Product> {
        self.products
            .get(product_key)
            .ok_or_else(|| CheckoutError::UnknownProduct(product_key.to_string()))
    }

    /// Resolve by plan name and billing cycle (`growth` + monthly -> `growthMonthly`)
    pub fn resolve_plan(&self, plan: &str, cycle: BillingCycle) -> Result<&Product> {
        self.resolve(&format!("{plan}{}", cycle.key_suffix()))
    }

    /// All products, sorted by key for stable listings
    pub fn products(&self) -> Vec<&Product> {
        let mut products: Vec<_> = self.products.values().collect();
        products.sort_by(|a, b| a.key.cmp(&b.key));
        products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ProductCatalog {
        ProductCatalog::from_products([
            Product::new("growthMonthly", "paddle", "pri_1", "Growth Plan", 249, BillingCycle::Monthly),
            Product::new("growthYearly", "paddle", "pri_2", "Growth Plan (Yearly)", 2990, BillingCycle::Yearly),
        ])
    }

    #[test]
    fn test_resolve_known_product() {
        let catalog = catalog();
        let product = catalog.resolve("growthMonthly").unwrap();
        assert_eq!(product.price, 249);
        assert_eq!(product.provider_product_id, "pri_1");
    }

    #[test]
    fn test_resolve_unknown_product() {
        let err = catalog().resolve("enterprise").unwrap_err();
        assert!(matches!(err, CheckoutError::UnknownProduct(key) if key == "enterprise"));
    }

    #[test]
    fn test_resolve_plan() {
        let catalog = catalog();
        let product = catalog.resolve_plan("growth", BillingCycle::Yearly).unwrap();
        assert_eq!(product.key, "growthYearly");
    }

    #[test]
    fn test_display_price() {
        let catalog = catalog();
        assert_eq!(catalog.resolve("growthMonthly").unwrap().display_price(), "$249");
        assert_eq!(catalog.resolve("growthYearly").unwrap().display_price(), "$2,990");

        let free = Product::new("freeAnalysis", "lemonsqueezy", "contact", "Free Analysis", 0, BillingCycle::OneTime);
        assert_eq!(free.display_price(), "Free");
        assert!(!free.is_purchasable());

        let eur = Product::new("x", "paddle", "pri_x", "X", 1_200_000, BillingCycle::OneTime).with_currency("EUR");
        assert_eq!(eur.display_price(), "1,200,000 EUR");
    }

    #[test]
    fn test_billing_cycle_serde() {
        let json = serde_json::to_string(&BillingCycle::OneTime).unwrap();
        assert_eq!(json, "\"one-time\"");
    }
}
