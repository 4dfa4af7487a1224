//! Sales-order document assembly and operations.
//!
//! The backend owns all pricing, tax, and numbering rules; this module
//! only shapes the documents it sends. Totals are the plain sum of
//! qty × rate per line (line amounts are recomputed before every write),
//! a single-line payment schedule covering the full total is
//! synthesized, and currency/company/price-list fields are attached only
//! when resolvable — otherwise they are omitted and left to backend
//! defaults. Updates re-read the existing order first to preserve fields
//! the client does not manage (naming series, and the modification
//! timestamp the backend uses for conflict detection).

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::client::{from_value, unwrap_doc, FrappeClient, RPC_NS};
use crate::error::ApiResult;
use crate::query::{filter, ListQuery};
use crate::types::{SalesOrder, SalesOrderItem, SalesOrderSummary};

const DEFAULT_ORDER_TYPE: &str = "Sales";
const RECENT_PAGE_LENGTH: u32 = 20;

fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Sum of qty × rate over all lines.
fn net_total(items: &[SalesOrderItem]) -> f64 {
    items.iter().map(|i| i.qty * i.rate).sum()
}

/// Single-line schedule covering 100% of the total on `due_date`.
fn payment_schedule(amount: f64, due_date: &str) -> Value {
    json!([{
        "doctype": "Payment Schedule",
        "parentfield": "payment_schedule",
        "parenttype": "Sales Order",
        "idx": 1,
        "due_date": due_date,
        "invoice_portion": 100,
        "payment_amount": amount,
        "base_payment_amount": amount,
        "description": "Full Payment",
    }])
}

/// Child rows for the `items` table. Line amounts are always recomputed
/// as qty × rate; whatever the caller carried in `amount` is ignored.
fn order_lines(items: &[SalesOrderItem], delivery_date: Option<&str>) -> Value {
    let lines: Vec<Value> = items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let mut line = Map::new();
            line.insert("doctype".into(), json!("Sales Order Item"));
            line.insert("parenttype".into(), json!("Sales Order"));
            line.insert("parentfield".into(), json!("items"));
            line.insert("idx".into(), json!(idx + 1));
            line.insert("item_code".into(), json!(item.item_code));
            line.insert("item_name".into(), json!(item.item_name));
            line.insert("qty".into(), json!(item.qty));
            line.insert("rate".into(), json!(item.rate));
            line.insert(
                "price_list_rate".into(),
                json!(item.price_list_rate.unwrap_or(item.rate)),
            );
            line.insert("amount".into(), json!(item.qty * item.rate));
            if let Some(date) = delivery_date.or(item.delivery_date.as_deref()) {
                line.insert("delivery_date".into(), json!(date));
            }
            if let Some(ref uom) = item.stock_uom {
                line.insert("stock_uom".into(), json!(uom));
            }
            Value::Object(line)
        })
        .collect();
    Value::Array(lines)
}

fn totals_fields(doc: &mut Map<String, Value>, total: f64) {
    doc.insert("net_total".into(), json!(total));
    doc.insert("base_net_total".into(), json!(total));
    doc.insert("total".into(), json!(total));
    doc.insert("base_total".into(), json!(total));
    doc.insert("total_net_weight".into(), json!(0));
    doc.insert("grand_total".into(), json!(total));
    doc.insert("base_grand_total".into(), json!(total));
}

fn currency_fields(doc: &mut Map<String, Value>, currency: Option<&str>) {
    if let Some(currency) = currency {
        doc.insert("currency".into(), json!(currency));
        doc.insert("price_list_currency".into(), json!(currency));
        doc.insert("company_currency".into(), json!(currency));
    }
    doc.insert("conversion_rate".into(), json!(1));
    doc.insert("plc_conversion_rate".into(), json!(1));
}

/// Full document for `frappe.client.insert`.
fn build_order_doc(
    customer: &str,
    items: &[SalesOrderItem],
    transaction_date: &str,
    company: Option<&str>,
    price_list: Option<&str>,
    currency: Option<&str>,
) -> Value {
    let total = net_total(items);
    let mut doc = Map::new();
    doc.insert("doctype".into(), json!("Sales Order"));
    doc.insert("customer".into(), json!(customer));
    doc.insert("transaction_date".into(), json!(transaction_date));
    doc.insert("delivery_date".into(), json!(transaction_date));
    if let Some(company) = company {
        doc.insert("company".into(), json!(company));
    }
    if let Some(price_list) = price_list {
        doc.insert("selling_price_list".into(), json!(price_list));
    }
    currency_fields(&mut doc, currency);
    doc.insert("order_type".into(), json!(DEFAULT_ORDER_TYPE));
    doc.insert("payment_terms_template".into(), Value::Null);
    doc.insert(
        "payment_schedule".into(),
        payment_schedule(total, transaction_date),
    );
    doc.insert("taxes".into(), json!([]));
    doc.insert("taxes_and_charges".into(), Value::Null);
    totals_fields(&mut doc, total);
    doc.insert("items".into(), order_lines(items, Some(transaction_date)));
    Value::Object(doc)
}

/// Update body for an existing order. Carries over the fields the client
/// does not manage from the re-read document when one is available.
fn build_order_update(
    existing: Option<&SalesOrder>,
    customer: &str,
    items: &[SalesOrderItem],
    currency: Option<&str>,
    fallback_date: &str,
) -> Value {
    let total = net_total(items);
    let due_date = existing
        .and_then(|e| {
            e.delivery_date
                .as_deref()
                .filter(|d| !d.is_empty())
                .or_else(|| Some(e.transaction_date.as_str()).filter(|d| !d.is_empty()))
        })
        .unwrap_or(fallback_date)
        .to_string();

    let mut doc = Map::new();
    if let Some(existing) = existing {
        if let Some(ref v) = existing.selling_price_list {
            doc.insert("selling_price_list".into(), json!(v));
        }
        if let Some(ref v) = existing.company {
            doc.insert("company".into(), json!(v));
        }
        if let Some(ref v) = existing.naming_series {
            doc.insert("naming_series".into(), json!(v));
        }
    }
    doc.insert(
        "order_type".into(),
        json!(existing
            .and_then(|e| e.order_type.as_deref())
            .unwrap_or(DEFAULT_ORDER_TYPE)),
    );
    currency_fields(&mut doc, currency);
    doc.insert("payment_terms_template".into(), Value::Null);
    doc.insert("payment_schedule".into(), payment_schedule(total, &due_date));
    doc.insert("taxes".into(), json!([]));
    doc.insert("taxes_and_charges".into(), Value::Null);
    totals_fields(&mut doc, total);
    doc.insert("items".into(), order_lines(items, None));
    doc.insert("customer".into(), json!(customer));
    if let Some(modified) = existing.and_then(|e| e.modified.as_deref()) {
        doc.insert("modified".into(), json!(modified));
    }
    Value::Object(doc)
}

impl FrappeClient {
    /// Create a draft sales order from the given lines.
    pub async fn create_sales_order(
        &self,
        customer: &str,
        items: &[SalesOrderItem],
    ) -> ApiResult<SalesOrder> {
        let company = self.default_company().await;
        let price_list = self.selling_price_list().await;
        let currency = self.company_currency(company.as_deref()).await;
        let date = today();

        let doc = build_order_doc(
            customer,
            items,
            &date,
            company.as_deref(),
            price_list.as_deref(),
            currency.as_deref(),
        );
        let resp = self
            .call_method_post("frappe.client.insert", &json!({ "doc": doc }))
            .await?;
        from_value(unwrap_doc(resp)?)
    }

    pub async fn get_sales_order(&self, name: &str) -> ApiResult<SalesOrder> {
        let doc = self.read_resource("Sales Order", name, None).await?;
        from_value(doc)
    }

    /// Rewrite an existing draft's lines and customer. The order is
    /// re-read first so naming series, company, and the modification
    /// timestamp round-trip unchanged.
    pub async fn update_sales_order(
        &self,
        name: &str,
        customer: &str,
        items: &[SalesOrderItem],
    ) -> ApiResult<SalesOrder> {
        let existing = self.get_sales_order(name).await.ok();
        let currency = self
            .company_currency(existing.as_ref().and_then(|e| e.company.as_deref()))
            .await;
        let body = build_order_update(existing.as_ref(), customer, items, currency.as_deref(), &today());
        let doc = self.update_resource("Sales Order", name, &body).await?;
        from_value(doc)
    }

    /// Submit a draft order for fulfilment.
    pub async fn submit_sales_order(&self, name: &str) -> ApiResult<SalesOrder> {
        let resp = self
            .call_method_post(
                &format!("{RPC_NS}.submit_sales_order"),
                &json!({ "name": name }),
            )
            .await?;
        from_value(unwrap_doc(resp)?)
    }

    /// The owner's most recent draft orders.
    pub async fn recent_orders(&self, owner: &str) -> ApiResult<Vec<SalesOrder>> {
        let query = ListQuery::new()
            .fields(&[
                "name",
                "customer",
                "customer_name",
                "transaction_date",
                "grand_total",
                "status",
                "owner",
                "docstatus",
            ])
            .filter(filter("Sales Order", "owner", "=", owner))
            .filter(filter("Sales Order", "docstatus", "=", 0))
            .order_by("creation desc")
            .page_length(RECENT_PAGE_LENGTH);
        self.list_resource("Sales Order", &query).await
    }

    /// Latest draft order for a customer (optionally scoped to an owner),
    /// re-read in full when found.
    pub async fn find_draft_order(
        &self,
        customer: &str,
        owner: Option<&str>,
    ) -> ApiResult<Option<SalesOrder>> {
        #[derive(Deserialize)]
        struct NameRow {
            name: String,
        }

        let mut query = ListQuery::new()
            .fields(&["name"])
            .filter(filter("Sales Order", "customer", "=", customer))
            .filter(filter("Sales Order", "docstatus", "=", 0))
            .order_by("creation desc")
            .page_length(1);
        if let Some(owner) = owner {
            query = query.filter(filter("Sales Order", "owner", "=", owner));
        }

        let rows: Vec<NameRow> = self.list_resource("Sales Order", &query).await?;
        match rows.first() {
            Some(row) => Ok(Some(self.get_sales_order(&row.name).await?)),
            None => Ok(None),
        }
    }

    /// Order summaries (with advances) for a customer.
    pub async fn list_order_summaries(
        &self,
        customer: &str,
    ) -> ApiResult<Vec<SalesOrderSummary>> {
        let pairs = [("customer".to_string(), customer.to_string())];
        let body = self
            .call_method_get(&format!("{RPC_NS}.get_sales_orders"), &pairs)
            .await?;
        from_value(
            body.get("message")
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
        )
    }
}

// ===========================================================================
// Tests
// ===========================================================================
