//! # Speed Boost Catalog
//!
//! The ledger advertises prices for every transaction class it knows. The
//! client only sells a fixed set of Speed Boost durations, so the catalog is
//! filtered when it is built.
//!
//! ## Filtering Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ledger purchase prices                                                 │
//! │      │                                                                  │
//! │      ├── class != transaction class      ──► dropped (diagnostic)       │
//! │      ├── distinguisher not in targets    ──► dropped (diagnostic)       │
//! │      └── otherwise                       ──► Sku in catalog             │
//! │                                                                         │
//! │  No prices at all          ──► catalog unavailable (None)               │
//! │  Prices, none matching     ──► empty catalog (Some, no SKUs)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Dropped entries are handed back to the caller for logging; they are
//! never shown to the user.

use serde::{Deserialize, Serialize};

use crate::types::{PurchasePrice, Sku};

/// Purchasable Speed Boost SKUs, ordered as the target list orders them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedBoostProduct {
    skus: Vec<Sku>,
}

/// Result of building a catalog from raw ledger prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogBuild {
    /// `None` when the ledger reported no prices at all.
    pub product: Option<SpeedBoostProduct>,
    /// Entries filtered out, for diagnostics.
    pub dropped: Vec<PurchasePrice>,
}

impl SpeedBoostProduct {
    /// Builds a catalog from ledger prices, keeping only `transaction_class`
    /// entries whose distinguisher appears in `targets`.
    pub fn build<S: AsRef<str>>(
        prices: &[PurchasePrice],
        transaction_class: &str,
        targets: &[S],
    ) -> CatalogBuild {
        if prices.is_empty() {
            return CatalogBuild {
                product: None,
                dropped: Vec::new(),
            };
        }

        let position =
            |d: &str| targets.iter().position(|t| t.as_ref() == d);

        let mut kept: Vec<(usize, Sku)> = Vec::new();
        let mut dropped = Vec::new();

        for price in prices {
            match position(&price.distinguisher) {
                Some(idx)
                    if price.transaction_class == transaction_class
                        && !kept.iter().any(|(i, _)| *i == idx) =>
                {
                    kept.push((idx, Sku::new(price.distinguisher.clone(), price.price)));
                }
                _ => dropped.push(price.clone()),
            }
        }

        kept.sort_by_key(|(idx, _)| *idx);

        CatalogBuild {
            product: Some(SpeedBoostProduct {
                skus: kept.into_iter().map(|(_, sku)| sku).collect(),
            }),
            dropped,
        }
    }

    /// Creates a catalog directly from SKUs.
    pub fn from_skus(skus: impl IntoIterator<Item = Sku>) -> Self {
        SpeedBoostProduct {
            skus: skus.into_iter().collect(),
        }
    }

    pub fn skus(&self) -> &[Sku] {
        &self.skus
    }

    pub fn is_empty(&self) -> bool {
        self.skus.is_empty()
    }

    /// Finds the SKU with the given distinguisher.
    pub fn find(&self, distinguisher: &str) -> Option<&Sku> {
        self.skus.iter().find(|s| s.distinguisher == distinguisher)
    }

    /// Returns a copy of this catalog without `distinguisher`.
    pub fn without(&self, distinguisher: &str) -> Self {
        SpeedBoostProduct {
            skus: self
                .skus
                .iter()
                .filter(|s| s.distinguisher != distinguisher)
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credits::Credits;

    fn price(class: &str, d: &str, units: i64) -> PurchasePrice {
        PurchasePrice {
            transaction_class: class.into(),
            distinguisher: d.into(),
            price: Credits::from_units(units),
        }
    }

    #[test]
    fn test_no_prices_means_unavailable() {
        let build = SpeedBoostProduct::build(&[], "speed-boost", &["1hr"]);
        assert_eq!(build.product, None);
        assert!(build.dropped.is_empty());
    }

    #[test]
    fn test_filters_and_orders_by_target_list() {
        let prices = vec![
            price("speed-boost", "2hr", 200),
            price("speed-boost", "1hr", 100),
            price("speed-boost", "24hr", 2000),
            price("other-class", "1hr", 5),
        ];
        let build = SpeedBoostProduct::build(&prices, "speed-boost", &["1hr", "2hr"]);

        let product = build.product.unwrap();
        let names: Vec<_> = product.skus().iter().map(|s| s.distinguisher.as_str()).collect();
        assert_eq!(names, vec!["1hr", "2hr"]);
        assert_eq!(build.dropped.len(), 2);
    }

    #[test]
    fn test_nothing_matching_is_empty_not_unavailable() {
        let prices = vec![price("speed-boost", "24hr", 2000)];
        let build = SpeedBoostProduct::build(&prices, "speed-boost", &["1hr"]);
        assert!(build.product.unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_distinguisher_keeps_first() {
        let prices = vec![
            price("speed-boost", "1hr", 100),
            price("speed-boost", "1hr", 150),
        ];
        let build = SpeedBoostProduct::build(&prices, "speed-boost", &["1hr"]);
        let product = build.product.unwrap();
        assert_eq!(product.find("1hr").unwrap().price, Credits::from_units(100));
        assert_eq!(build.dropped.len(), 1);
    }

    #[test]
    fn test_without_removes_sku() {
        let product = SpeedBoostProduct::from_skus([
            Sku::new("1hr", Credits::from_units(100)),
            Sku::new("2hr", Credits::from_units(200)),
        ]);
        let trimmed = product.without("1hr");
        assert!(trimmed.find("1hr").is_none());
        assert!(trimmed.find("2hr").is_some());
    }
}
