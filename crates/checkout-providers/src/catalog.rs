//! Default product catalogs
//!
//! Prices are whole US dollars. Both deployments share product keys so the
//! pricing UI can switch provider without changing how products are chosen.

use checkout_core::{BillingCycle, Product, ProductCatalog};

use crate::{lemonsqueezy, paddle};

const GROWTH: &str = "Save $8,000+ monthly in support costs";
const PROFESSIONAL: &str = "Save $15,000+ monthly with advanced automation";

/// Catalog for the Paddle deployment
pub fn paddle_catalog() -> ProductCatalog {
    let p = paddle::PROVIDER_NAME;
    ProductCatalog::from_products([
        Product::new("growthMonthly", p, "pri_01k59bk6ttdtkd75tbkvn1v4hc", "Growth Plan", 249, BillingCycle::Monthly)
            .with_description(GROWTH),
        Product::new(
            "growthYearly",
            p,
            "pri_01k59befr6ebm9j0czccppw99n",
            "Growth Plan (Yearly)",
            2990,
            BillingCycle::Yearly,
        )
        .with_description(format!("{GROWTH} - 20% off yearly")),
        Product::new(
            "professionalMonthly",
            p,
            "pri_01k59bna93cma1ssnz4x1gbpva",
            "Professional Plan",
            666,
            BillingCycle::Monthly,
        )
        .with_description(PROFESSIONAL),
        // TODO: replace with the yearly price id once it exists in the Paddle dashboard
        Product::new(
            "professionalYearly",
            p,
            "pri_01k59bna93cma1ssnz4x1gbpva",
            "Professional Plan (Yearly)",
            7990,
            BillingCycle::Yearly,
        )
        .with_description(format!("{PROFESSIONAL} - 20% off yearly")),
    ])
}

/// Catalog for the LemonSqueezy deployment
pub fn lemonsqueezy_catalog() -> ProductCatalog {
    let ls = lemonsqueezy::PROVIDER_NAME;
    ProductCatalog::from_products([
        Product::new("freeAnalysis", ls, "contact", "Free Business Analysis", 0, BillingCycle::OneTime)
            .with_description("Complete automation assessment"),
        Product::new("growthMonthly", ls, "1", "Growth Plan", 249, BillingCycle::Monthly).with_description(GROWTH),
        Product::new("growthYearly", ls, "2", "Growth Plan (Yearly)", 2990, BillingCycle::Yearly)
            .with_description(format!("{GROWTH} - 20% off yearly")),
        Product::new("professionalMonthly", ls, "3", "Professional Plan", 666, BillingCycle::Monthly)
            .with_description(PROFESSIONAL),
        Product::new("professionalYearly", ls, "4", "Professional Plan (Yearly)", 7990, BillingCycle::Yearly)
            .with_description(format!("{PROFESSIONAL} - 20% off yearly")),
    ])
}
