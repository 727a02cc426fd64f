//! Default catalog loaded into an empty store on first start.

use crate::NewItem;

const DEFAULT_CATALOG: &[(&str, &str)] = &[
    (
        "Coffee Machine",
        "A high-quality espresso machine for the perfect morning brew",
    ),
    (
        "Kitchen Knife Set",
        "Professional-grade knife set with wooden block",
    ),
    (
        "Silk Bed Sheets",
        "Luxurious 100% silk bed sheets in ivory white",
    ),
    (
        "Wine Glasses Set",
        "Crystal wine glasses set of 6 with elegant design",
    ),
    (
        "Cast Iron Cookware",
        "Premium cast iron pan and dutch oven set",
    ),
    (
        "Photo Album",
        "Handcrafted leather photo album for wedding memories",
    ),
];

/// The built-in starter catalog, for [`ClaimService::seed`](crate::ClaimService::seed).
pub fn default_catalog() -> Vec<NewItem> {
    DEFAULT_CATALOG
        .iter()
        .map(|(name, description)| NewItem::new(*name).with_description(*description))
        .collect()
}
