//! Item catalog listing with price and stock enrichment.
//!
//! The base catalog fetch returns bare item rows; two follow-up passes
//! cross-reference the price-list entries and the stock bins. Price
//! resolution runs in priority order — customer-specific entry, then the
//! configured default price list, then any selling price — first match
//! wins, and later passes only query codes still missing a price. Stock
//! prefers the default warehouse and falls back to an all-warehouse
//! aggregate when that warehouse had no rows. Both passes are
//! best-effort: a failure degrades to the unenriched rows (with a
//! warning) rather than failing the listing.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::warn;

use crate::client::FrappeClient;
use crate::error::ApiResult;
use crate::query::{filter, filter3, ListQuery};
use crate::types::Item;

/// Fallback price list when Selling Settings has none configured.
pub(crate) const DEFAULT_SELLING_PRICE_LIST: &str = "Standard Selling";

const CATALOG_PAGE_LENGTH: u32 = 40;

#[derive(Debug, Deserialize)]
struct PriceRow {
    item_code: Option<String>,
    price_list_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BinRow {
    item_code: Option<String>,
    #[serde(default)]
    actual_qty: f64,
}

impl FrappeClient {
    /// List sales items matching `search`, enriched with resolved prices
    /// and on-hand stock where available.
    pub async fn list_items(
        &self,
        search: Option<&str>,
        customer: Option<&str>,
    ) -> ApiResult<Vec<Item>> {
        let mut query = ListQuery::new()
            .fields(&[
                "name as item_code",
                "item_name",
                "description",
                "stock_uom",
                "image",
                "item_group",
            ])
            .filter(filter("Item", "is_sales_item", "=", 1))
            .filter(filter("Item", "disabled", "=", 0))
            .page_length(CATALOG_PAGE_LENGTH);

        if let Some(text) = search.map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{text}%");
            for field in ["item_name", "item_code", "name", "description"] {
                query = query.or_filter(filter("Item", field, "like", pattern.clone()));
            }
        }

        let mut items: Vec<Item> = self.list_resource("Item", &query).await?;
        if items.is_empty() {
            return Ok(items);
        }

        let codes: Vec<String> = items.iter().map(|i| i.item_code.clone()).collect();
        match self.resolve_enrichment(&codes, customer).await {
            Ok((prices, stock)) => apply_enrichment(&mut items, &prices, &stock),
            Err(e) => warn!(error = %e, "catalog enrichment degraded, returning base rows"),
        }
        Ok(items)
    }

    /// Build the price and stock maps for `codes`. Any failure aborts the
    /// whole enrichment; the caller degrades to the base rows.
    async fn resolve_enrichment(
        &self,
        codes: &[String],
        customer: Option<&str>,
    ) -> ApiResult<(HashMap<String, f64>, HashMap<String, f64>)> {
        let mut prices: HashMap<String, f64> = HashMap::new();

        if let Some(customer) = customer {
            let rows = self
                .fetch_prices(
                    vec![
                        filter("Item Price", "customer", "=", customer),
                        filter("Item Price", "selling", "=", 1),
                        filter("Item Price", "item_code", "in", serde_json::json!(codes)),
                    ],
                    codes.len(),
                )
                .await?;
            merge_price_rows(rows, &mut prices);
        }

        let price_list = self
            .selling_price_list()
            .await
            .unwrap_or_else(|| DEFAULT_SELLING_PRICE_LIST.to_string());
        let rows = self
            .fetch_prices(
                vec![
                    filter("Item Price", "price_list", "=", price_list.as_str()),
                    filter("Item Price", "selling", "=", 1),
                    filter("Item Price", "item_code", "in", serde_json::json!(codes)),
                ],
                codes.len(),
            )
            .await?;
        merge_price_rows(rows, &mut prices);

        let missing: Vec<&String> = codes.iter().filter(|c| !prices.contains_key(*c)).collect();
        if !missing.is_empty() {
            let rows = self
                .fetch_prices(
                    vec![
                        filter("Item Price", "selling", "=", 1),
                        filter("Item Price", "item_code", "in", serde_json::json!(missing)),
                    ],
                    missing.len(),
                )
                .await?;
            merge_price_rows(rows, &mut prices);
        }

        let mut stock: HashMap<String, f64> = HashMap::new();
        if let Some(warehouse) = self.default_warehouse().await {
            let rows = self
                .fetch_bins(
                    vec![
                        filter3("item_code", "in", serde_json::json!(codes)),
                        filter3("warehouse", "=", warehouse.as_str()),
                    ],
                    codes.len(),
                )
                .await?;
            merge_stock_rows(rows, &mut stock);
        }

        // No stock row at the default warehouse for any requested code:
        // aggregate across all warehouses instead.
        if stock.is_empty() {
            let rows = self
                .fetch_bins(
                    vec![filter3("item_code", "in", serde_json::json!(codes))],
                    codes.len(),
                )
                .await?;
            merge_stock_rows(rows, &mut stock);
        }

        Ok((prices, stock))
    }

    async fn fetch_prices(
        &self,
        filters: Vec<serde_json::Value>,
        expected: usize,
    ) -> ApiResult<Vec<PriceRow>> {
        let mut query = ListQuery::new()
            .fields(&["item_code", "price_list_rate"])
            .page_length(expected.max(1) as u32);
        for f in filters {
            query = query.filter(f);
        }
        self.list_resource("Item Price", &query).await
    }

    async fn fetch_bins(
        &self,
        filters: Vec<serde_json::Value>,
        expected: usize,
    ) -> ApiResult<Vec<BinRow>> {
        let mut query = ListQuery::new()
            .fields(&["item_code", "actual_qty"])
            .page_length(expected.max(20) as u32);
        for f in filters {
            query = query.filter(f);
        }
        self.list_resource("Bin", &query).await
    }
}

/// First match wins: rows never overwrite an already-resolved code.
fn merge_price_rows(rows: Vec<PriceRow>, prices: &mut HashMap<String, f64>) {
    for row in rows {
        let (Some(code), Some(rate)) = (row.item_code, row.price_list_rate) else {
            continue;
        };
        prices.entry(code).or_insert(rate);
    }
}

/// Bin quantities accumulate per item across warehouses.
fn merge_stock_rows(rows: Vec<BinRow>, stock: &mut HashMap<String, f64>) {
    for row in rows {
        let Some(code) = row.item_code else { continue };
        *stock.entry(code).or_insert(0.0) += row.actual_qty;
    }
}

fn apply_enrichment(
    items: &mut [Item],
    prices: &HashMap<String, f64>,
    stock: &HashMap<String, f64>,
) {
    for item in items {
        let resolved = prices.get(&item.item_code).copied();
        item.price_list_rate = resolved;
        item.standard_rate = resolved.or(item.standard_rate);
        item.actual_qty = stock.get(&item.item_code).copied();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
