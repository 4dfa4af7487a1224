//! Lazily fetched, memoized backend configuration.
//!
//! The selling price list, default company, company currency, default
//! warehouse, and currency symbol are read from the backend on first
//! need and kept for the client's lifetime. Only resolved values are
//! memoized: a failed or empty lookup stays unresolved and is retried on
//! the next call. Every lookup is best-effort — failures degrade to
//! `None` with a warning instead of failing the calling operation.

use std::sync::Mutex;

use serde_json::Value;
use tracing::warn;

use crate::client::FrappeClient;
use crate::types::CurrencyInfo;

/// Memoized configuration values, owned by [`FrappeClient`].
#[derive(Default)]
pub(crate) struct SellingDefaults {
    price_list: Mutex<Option<String>>,
    company: Mutex<Option<String>>,
    currency: Mutex<Option<String>>,
    warehouse: Mutex<Option<String>>,
    symbol: Mutex<Option<String>>,
}

impl SellingDefaults {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Drop every memoized value.
    pub(crate) fn reset(&self) {
        *self.price_list.lock().unwrap() = None;
        *self.company.lock().unwrap() = None;
        *self.currency.lock().unwrap() = None;
        *self.warehouse.lock().unwrap() = None;
        *self.symbol.lock().unwrap() = None;
    }
}

fn cached(slot: &Mutex<Option<String>>) -> Option<String> {
    slot.lock().unwrap().clone()
}

fn memoize(slot: &Mutex<Option<String>>, value: Option<String>) -> Option<String> {
    let value = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    if value.is_some() {
        *slot.lock().unwrap() = value.clone();
    }
    value
}

fn str_field(doc: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| doc.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

impl FrappeClient {
    /// The configured selling price list, if any.
    pub(crate) async fn selling_price_list(&self) -> Option<String> {
        if let Some(v) = cached(&self.defaults.price_list) {
            return Some(v);
        }
        let fetched = match self
            .read_resource("Selling Settings", "Selling Settings", None)
            .await
        {
            Ok(doc) => str_field(&doc, &["selling_price_list"]),
            Err(e) => {
                warn!(error = %e, "selling price list lookup failed");
                None
            }
        };
        memoize(&self.defaults.price_list, fetched)
    }

    /// The site-wide default company, if any.
    pub(crate) async fn default_company(&self) -> Option<String> {
        if let Some(v) = cached(&self.defaults.company) {
            return Some(v);
        }
        let fetched = match self
            .read_resource("Global Defaults", "Global Defaults", None)
            .await
        {
            Ok(doc) => str_field(&doc, &["default_company"]),
            Err(e) => {
                warn!(error = %e, "default company lookup failed");
                None
            }
        };
        memoize(&self.defaults.company, fetched)
    }

    /// The default currency of `company` (or of the default company).
    pub(crate) async fn company_currency(&self, company: Option<&str>) -> Option<String> {
        let company = match company {
            Some(c) => c.to_string(),
            None => self.default_company().await?,
        };
        if let Some(v) = cached(&self.defaults.currency) {
            return Some(v);
        }
        let fetched = match self
            .read_resource("Company", &company, Some(&["default_currency"]))
            .await
        {
            Ok(doc) => str_field(&doc, &["default_currency"]),
            Err(e) => {
                warn!(error = %e, company = %company, "company currency lookup failed");
                None
            }
        };
        memoize(&self.defaults.currency, fetched)
    }

    /// The default company's stock warehouse; falls back to its receipt
    /// warehouse when no dedicated default exists.
    pub(crate) async fn default_warehouse(&self) -> Option<String> {
        if let Some(v) = cached(&self.defaults.warehouse) {
            return Some(v);
        }
        let company = self.default_company().await?;
        let fetched = match self
            .read_resource(
                "Company",
                &company,
                Some(&["default_warehouse", "default_receipt_warehouse"]),
            )
            .await
        {
            Ok(doc) => str_field(&doc, &["default_warehouse", "default_receipt_warehouse"]),
            Err(e) => {
                warn!(error = %e, company = %company, "default warehouse lookup failed");
                None
            }
        };
        memoize(&self.defaults.warehouse, fetched)
    }

    async fn currency_symbol(&self, currency: &str) -> Option<String> {
        if let Some(v) = cached(&self.defaults.symbol) {
            return Some(v);
        }
        let pairs = [("currency".to_string(), currency.to_string())];
        let fetched = match self
            .call_method_get("frappe.utils.formatters.get_currency_symbol", &pairs)
            .await
        {
            Ok(body) => str_field(&body, &["message", "symbol"]),
            Err(e) => {
                warn!(error = %e, currency, "currency symbol lookup failed");
                None
            }
        };
        memoize(&self.defaults.symbol, fetched)
    }

    /// Company currency plus its display symbol. Either half may be
    /// absent when the backend has no usable configuration.
    pub async fn currency_info(&self) -> CurrencyInfo {
        let currency = self.company_currency(None).await;
        let symbol = match currency.as_deref() {
            Some(c) => self.currency_symbol(c).await,
            None => None,
        };
        CurrencyInfo { currency, symbol }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
