//! Customer search and account views.

use serde_json::Value;

use crate::client::{from_value, FrappeClient, RPC_NS};
use crate::error::ApiResult;
use crate::query::{filter, ListQuery};
use crate::types::{Customer, CustomerSummary, LedgerEntry};

const SEARCH_PAGE_LENGTH: u32 = 20;

impl FrappeClient {
    /// Search customers by display name; an empty search returns the
    /// first page unfiltered.
    pub async fn search_customers(&self, text: &str) -> ApiResult<Vec<Customer>> {
        let mut query = ListQuery::new()
            .fields(&["name", "customer_name", "customer_group", "territory"])
            .page_length(SEARCH_PAGE_LENGTH)
            .limit_start(0);

        let text = text.trim();
        if !text.is_empty() {
            query = query.filter(filter(
                "Customer",
                "customer_name",
                "like",
                format!("%{text}%"),
            ));
        }

        self.list_resource("Customer", &query).await
    }

    /// Aggregate position of a customer's account: outstanding balance,
    /// last invoice, last payment.
    pub async fn get_customer_summary(&self, customer: &str) -> ApiResult<CustomerSummary> {
        let pairs = [("customer".to_string(), customer.to_string())];
        let body = self
            .call_method_get(&format!("{RPC_NS}.get_customer_summary"), &pairs)
            .await?;
        from_value(body.get("message").cloned().unwrap_or(Value::Null))
    }

    /// Ledger entries for a customer, optionally bounded by posting date.
    pub async fn get_customer_ledger(
        &self,
        customer: &str,
        from_date: Option<&str>,
        to_date: Option<&str>,
    ) -> ApiResult<Vec<LedgerEntry>> {
        let mut pairs = vec![("customer".to_string(), customer.to_string())];
        if let Some(from) = from_date {
            pairs.push(("from_date".to_string(), from.to_string()));
        }
        if let Some(to) = to_date {
            pairs.push(("to_date".to_string(), to.to_string()));
        }

        let body = self
            .call_method_get(&format!("{RPC_NS}.get_customer_ledger"), &pairs)
            .await?;
        from_value(
            body.get("message")
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
        )
    }
}
