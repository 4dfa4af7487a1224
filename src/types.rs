//! Domain records mirrored from the remote backend.
//!
//! These are transient, advisory copies of backend-owned documents. The
//! client never validates them beyond shape; list endpoints return only
//! the requested fields, so most members are optional or defaulted.

use serde::{Deserialize, Serialize};

/// The logged-in user, as reported by the session probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub user: String,
    pub full_name: String,
    /// Raw session cookie string for the backend origin.
    #[serde(default)]
    pub sid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_group: String,
    #[serde(default)]
    pub territory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A catalog item, optionally enriched with a resolved price and on-hand
/// stock after the base fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub item_code: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stock_uom: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub item_group: String,
    /// Catalog-default rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_rate: Option<f64>,
    /// Rate resolved for the active price list / customer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_list_rate: Option<f64>,
    /// On-hand quantity, when stock enrichment found a bin row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_qty: Option<f64>,
}

/// One line of the client-local cart. Never persisted; exists only inside
/// the active session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub item: Item,
    /// Always positive; a decrement to zero removes the line instead.
    pub qty: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesOrderItem {
    pub item_code: String,
    #[serde(default)]
    pub item_name: String,
    pub qty: f64,
    #[serde(default)]
    pub rate: f64,
    #[serde(default)]
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_uom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_list_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesOrder {
    pub name: String,
    #[serde(default)]
    pub customer: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub transaction_date: String,
    /// Modification timestamp the backend uses for conflict detection on
    /// writes; carried back verbatim on update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(default)]
    pub grand_total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_taxes_and_charges: Option<f64>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub owner: String,
    /// 0 = draft, 1 = submitted, 2 = cancelled.
    #[serde(default)]
    pub docstatus: i32,
    #[serde(default)]
    pub items: Vec<SalesOrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selling_price_list: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub naming_series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_type: Option<String>,
}

/// An invoice with an unpaid balance, offered for payment allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutstandingInvoice {
    pub name: String,
    #[serde(default)]
    pub posting_date: String,
    #[serde(default)]
    pub grand_total: f64,
    #[serde(default)]
    pub outstanding_amount: f64,
}

/// An invoice selected for a payment entry, with the amount allocated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReference {
    pub name: String,
    #[serde(default)]
    pub grand_total: f64,
    #[serde(default)]
    pub outstanding_amount: f64,
    pub allocated_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(default)]
    pub posting_date: String,
    #[serde(default)]
    pub voucher_type: String,
    #[serde(default)]
    pub voucher_no: String,
    #[serde(default)]
    pub debit: f64,
    #[serde(default)]
    pub credit: f64,
    #[serde(default)]
    pub account: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMode {
    pub name: String,
    #[serde(rename = "type", default)]
    pub mode_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesOrderSummary {
    pub name: String,
    #[serde(default)]
    pub transaction_date: String,
    #[serde(default)]
    pub grand_total: f64,
    #[serde(default)]
    pub advance_paid: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceBrief {
    pub name: String,
    #[serde(default)]
    pub posting_date: String,
    #[serde(default)]
    pub grand_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentBrief {
    pub name: String,
    #[serde(default)]
    pub posting_date: String,
    #[serde(default)]
    pub paid_amount: f64,
}

/// Aggregate position of a customer's account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSummary {
    #[serde(default)]
    pub outstanding_balance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_invoice: Option<InvoiceBrief>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_payment: Option<PaymentBrief>,
}

/// Company currency and display symbol, cached for the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrencyInfo {
    pub currency: Option<String>,
    pub symbol: Option<String>,
}
