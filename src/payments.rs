//! Payment entries against outstanding invoices.
//!
//! The backend reconciles payments; the client only selects invoices,
//! allocates amounts, and ships the request. References travel as a
//! JSON-encoded string field, matching what the backend method expects.

use serde_json::{json, Map, Value};

use crate::client::{from_value, FrappeClient, RPC_NS};
use crate::error::ApiResult;
use crate::types::{OutstandingInvoice, PaymentMode, PaymentReference};

/// Request body for the payment-entry method.
fn build_payment_request(
    customer: &str,
    mode_of_payment: &str,
    paid_amount: f64,
    references: &[PaymentReference],
    sales_order: Option<&str>,
) -> Value {
    let mut body = Map::new();
    body.insert("customer".into(), json!(customer));
    body.insert("mode_of_payment".into(), json!(mode_of_payment));
    body.insert("paid_amount".into(), json!(paid_amount));
    body.insert(
        "references".into(),
        json!(serde_json::to_string(references).unwrap_or_else(|_| "[]".to_string())),
    );
    if let Some(order) = sales_order {
        body.insert("sales_order".into(), json!(order));
    }
    Value::Object(body)
}

impl FrappeClient {
    /// Invoices with an unpaid balance for a customer.
    pub async fn outstanding_invoices(&self, customer: &str) -> ApiResult<Vec<OutstandingInvoice>> {
        let pairs = [("customer".to_string(), customer.to_string())];
        let body = self
            .call_method_get(&format!("{RPC_NS}.get_outstanding_invoices"), &pairs)
            .await?;
        from_value(
            body.get("message")
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
        )
    }

    /// Payment modes configured on the backend.
    pub async fn payment_modes(&self) -> ApiResult<Vec<PaymentMode>> {
        let body = self
            .call_method_get(&format!("{RPC_NS}.get_payment_modes"), &[])
            .await?;
        from_value(
            body.get("message")
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
        )
    }

    /// Record a payment against the selected invoices. Returns the name
    /// of the created payment entry.
    pub async fn create_payment_entry(
        &self,
        customer: &str,
        mode_of_payment: &str,
        paid_amount: f64,
        references: &[PaymentReference],
        sales_order: Option<&str>,
    ) -> ApiResult<String> {
        let body = build_payment_request(
            customer,
            mode_of_payment,
            paid_amount,
            references,
            sales_order,
        );
        let resp = self
            .call_method_post(&format!("{RPC_NS}.create_payment_entry"), &body)
            .await?;
        from_value(resp.get("message").cloned().unwrap_or(Value::Null))
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(name: &str, outstanding: f64, allocated: f64) -> PaymentReference {
        PaymentReference {
            name: name.to_string(),
            grand_total: outstanding,
            outstanding_amount: outstanding,
            allocated_amount: allocated,
        }
    }

    #[test]
    fn references_travel_as_a_json_string() {
        let body = build_payment_request(
            "CUST-1",
            "Cash",
            75.0,
            &[reference("SINV-001", 50.0, 50.0), reference("SINV-002", 40.0, 25.0)],
            None,
        );
        let encoded = body["references"].as_str().expect("string field");
        let decoded: Vec<PaymentReference> = serde_json::from_str(encoded).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].name, "SINV-001");
        assert_eq!(decoded[1].allocated_amount, 25.0);
    }

    #[test]
    fn sales_order_is_attached_only_when_present() {
        let without = build_payment_request("CUST-1", "Cash", 10.0, &[], None);
        assert!(!without.as_object().unwrap().contains_key("sales_order"));

        let with = build_payment_request("CUST-1", "Cash", 10.0, &[], Some("SO-0042"));
        assert_eq!(with["sales_order"], json!("SO-0042"));
    }

    #[test]
    fn amount_and_mode_are_forwarded() {
        let body = build_payment_request("CUST-9", "Bank Draft", 120.5, &[], None);
        assert_eq!(body["customer"], json!("CUST-9"));
        assert_eq!(body["mode_of_payment"], json!("Bank Draft"));
        assert_eq!(body["paid_amount"], json!(120.5));
    }
}
