//! Session and cart state.
//!
//! Holds the authoritative client-local view of "who is logged in" and
//! "what is in the cart". The store is mutated only from the single UI
//! event queue, so it takes `&mut self` and needs no internal locking.
//! Session lifecycle: `Uninitialized` → (bootstrap) → `Authenticated` or
//! `Anonymous`; logout always clears local state, even when the remote
//! call fails.

use tracing::{debug, info, warn};

use crate::client::FrappeClient;
use crate::error::ApiResult;
use crate::types::{CartLine, CurrencyInfo, Customer, Item, SalesOrderItem, UserSession};

/// Shown when neither a currency symbol nor a code is known.
const FALLBACK_CURRENCY_DISPLAY: &str = "₹";

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Bootstrap has not run yet.
    Uninitialized,
    /// No usable backend session.
    Anonymous,
    Authenticated(UserSession),
}

pub struct SessionStore {
    client: FrappeClient,
    state: SessionState,
    customer: Option<Customer>,
    cart: Vec<CartLine>,
    current_order: Option<String>,
    currency: Option<CurrencyInfo>,
}

impl SessionStore {
    pub fn new(client: FrappeClient) -> Self {
        Self {
            client,
            state: SessionState::Uninitialized,
            customer: None,
            cart: Vec::new(),
            current_order: None,
            currency: None,
        }
    }

    pub fn client(&self) -> &FrappeClient {
        &self.client
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn session(&self) -> Option<&UserSession> {
        match &self.state {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    /// Probe an existing backend session. Success authenticates and
    /// fetches currency info; any failure (including "no active
    /// session") lands in `Anonymous` without an error escaping.
    pub async fn bootstrap(&mut self) {
        match self.client.get_session().await {
            Ok(session) => {
                info!(user = %session.user, "session restored");
                self.state = SessionState::Authenticated(session);
                self.fetch_currency().await;
            }
            Err(e) => {
                debug!(error = %e, "no usable session, starting anonymous");
                self.state = SessionState::Anonymous;
            }
        }
    }

    pub async fn login(&mut self, username: &str, password: &str) -> ApiResult<()> {
        let session = self.client.login(username, password).await?;
        self.state = SessionState::Authenticated(session);
        Ok(())
    }

    /// End the session. Local session, cart, customer, and current-order
    /// state are cleared even when the remote logout fails; the failure
    /// is still surfaced so the caller can show it.
    pub async fn logout(&mut self) -> ApiResult<()> {
        let result = self.client.logout().await;
        if let Err(ref e) = result {
            warn!(error = %e, "remote logout failed, clearing local session anyway");
        }
        self.state = SessionState::Anonymous;
        self.cart.clear();
        self.customer = None;
        self.current_order = None;
        result
    }

    /// Best-effort currency lookup; keeps the previous value on failure.
    pub async fn fetch_currency(&mut self) {
        let info = self.client.currency_info().await;
        if info.currency.is_some() || info.symbol.is_some() {
            self.currency = Some(info);
        }
    }

    // -----------------------------------------------------------------------
    // Customer / order selection
    // -----------------------------------------------------------------------

    pub fn customer(&self) -> Option<&Customer> {
        self.customer.as_ref()
    }

    pub fn set_customer(&mut self, customer: Option<Customer>) {
        self.customer = customer;
    }

    pub fn current_order(&self) -> Option<&str> {
        self.current_order.as_deref()
    }

    pub fn set_current_order(&mut self, name: Option<String>) {
        self.current_order = name;
    }

    // -----------------------------------------------------------------------
    // Cart
    // -----------------------------------------------------------------------

    pub fn cart(&self) -> &[CartLine] {
        &self.cart
    }

    /// Add one unit of `item`. An item already in the cart gets its
    /// quantity incremented instead of a duplicate line.
    pub fn add_to_cart(&mut self, item: Item) {
        match self
            .cart
            .iter_mut()
            .find(|line| line.item.item_code == item.item_code)
        {
            Some(line) => line.qty += 1,
            None => self.cart.push(CartLine { item, qty: 1 }),
        }
    }

    /// Adjust a line's quantity by `delta`; at or below zero the line is
    /// removed. Unknown item codes are ignored.
    pub fn update_qty(&mut self, item_code: &str, delta: i32) {
        let Some(idx) = self
            .cart
            .iter()
            .position(|line| line.item.item_code == item_code)
        else {
            return;
        };
        let new_qty = i64::from(self.cart[idx].qty) + i64::from(delta);
        if new_qty <= 0 {
            self.cart.remove(idx);
        } else {
            self.cart[idx].qty = new_qty as u32;
        }
    }

    /// Replace the cart with an existing order's lines. The backend does
    /// not return full item metadata on this path, so everything beyond
    /// quantity and rate is defaulted.
    pub fn set_cart_from_order(&mut self, items: &[SalesOrderItem]) {
        self.cart = items
            .iter()
            .map(|line| CartLine {
                item: Item {
                    item_code: line.item_code.clone(),
                    item_name: line.item_name.clone(),
                    description: String::new(),
                    stock_uom: line.stock_uom.clone().unwrap_or_default(),
                    image: None,
                    item_group: String::new(),
                    standard_rate: Some(line.rate),
                    price_list_rate: Some(line.rate),
                    actual_qty: None,
                },
                qty: line.qty.max(1.0) as u32,
            })
            .collect();
    }

    pub fn clear_cart(&mut self) {
        self.cart.clear();
        self.current_order = None;
    }

    // -----------------------------------------------------------------------
    // Derived values
    // -----------------------------------------------------------------------

    /// Total units in the cart (sum of quantities, not line count).
    pub fn cart_count(&self) -> u32 {
        self.cart.iter().map(|line| line.qty).sum()
    }

    /// Sum of qty × effective rate per line, where the effective rate
    /// prefers the price-list-resolved rate over the catalog rate.
    pub fn cart_total(&self) -> f64 {
        self.cart
            .iter()
            .map(|line| f64::from(line.qty) * effective_rate(&line.item))
            .sum()
    }

    /// Cart lines shaped for order assembly.
    pub fn order_items(&self) -> Vec<SalesOrderItem> {
        self.cart
            .iter()
            .map(|line| {
                let rate = effective_rate(&line.item);
                SalesOrderItem {
                    item_code: line.item.item_code.clone(),
                    item_name: line.item.item_name.clone(),
                    qty: f64::from(line.qty),
                    rate,
                    amount: f64::from(line.qty) * rate,
                    delivery_date: None,
                    stock_uom: non_empty(&line.item.stock_uom),
                    price_list_rate: line.item.price_list_rate,
                }
            })
            .collect()
    }

    pub fn currency_info(&self) -> Option<&CurrencyInfo> {
        self.currency.as_ref()
    }

    /// Symbol, else code, else the fallback glyph.
    pub fn currency_display(&self) -> String {
        self.currency
            .as_ref()
            .and_then(|c| c.symbol.clone().or_else(|| c.currency.clone()))
            .unwrap_or_else(|| FALLBACK_CURRENCY_DISPLAY.to_string())
    }
}

fn effective_rate(item: &Item) -> f64 {
    item.price_list_rate
        .or(item.standard_rate)
        .unwrap_or(0.0)
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    /// A client pointed at a closed port: every remote call fails fast.
    fn unreachable_store() -> SessionStore {
        let client = FrappeClient::new(ClientConfig::new("http://127.0.0.1:1")).unwrap();
        SessionStore::new(client)
    }

    fn item(code: &str, price_list_rate: Option<f64>, standard_rate: Option<f64>) -> Item {
        Item {
            item_code: code.to_string(),
            item_name: format!("Item {code}"),
            description: String::new(),
            stock_uom: "Nos".to_string(),
            image: None,
            item_group: "Products".to_string(),
            standard_rate,
            price_list_rate,
            actual_qty: None,
        }
    }

    #[test]
    fn adding_an_existing_item_increments_instead_of_duplicating() {
        let mut store = unreachable_store();
        store.add_to_cart(item("ITM-1", Some(10.0), None));
        store.add_to_cart(item("ITM-1", Some(10.0), None));
        store.add_to_cart(item("ITM-2", Some(5.0), None));

        assert_eq!(store.cart().len(), 2);
        assert_eq!(store.cart()[0].qty, 2);
        assert_eq!(store.cart()[1].qty, 1);
    }

    #[test]
    fn decrement_to_zero_removes_the_line() {
        let mut store = unreachable_store();
        store.add_to_cart(item("ITM-1", Some(10.0), None));
        store.update_qty("ITM-1", 2);
        assert_eq!(store.cart()[0].qty, 3);

        store.update_qty("ITM-1", -3);
        assert!(store.cart().is_empty());
    }

    #[test]
    fn decrement_below_zero_also_removes() {
        let mut store = unreachable_store();
        store.add_to_cart(item("ITM-1", Some(10.0), None));
        store.update_qty("ITM-1", -5);
        assert!(store.cart().is_empty());
    }

    #[test]
    fn unknown_item_code_is_ignored() {
        let mut store = unreachable_store();
        store.add_to_cart(item("ITM-1", Some(10.0), None));
        store.update_qty("ITM-404", -1);
        assert_eq!(store.cart().len(), 1);
    }

    #[test]
    fn cart_count_sums_quantities() {
        let mut store = unreachable_store();
        store.add_to_cart(item("ITM-1", Some(10.0), None));
        store.update_qty("ITM-1", 1);
        store.add_to_cart(item("ITM-2", Some(5.0), None));
        store.update_qty("ITM-2", 4);

        // Two lines with quantities 2 and 5.
        assert_eq!(store.cart_count(), 7);
    }

    #[test]
    fn cart_total_prefers_price_list_rate_and_defaults_to_zero() {
        let mut store = unreachable_store();
        store.add_to_cart(item("ITM-1", Some(50.0), Some(60.0)));
        store.update_qty("ITM-1", 2); // qty 3 at 50
        store.add_to_cart(item("ITM-2", None, Some(20.0)));
        store.update_qty("ITM-2", 1); // qty 2 at 20
        store.add_to_cart(item("ITM-3", None, None)); // qty 1 at 0

        assert_eq!(store.cart_total(), 190.0);
    }

    #[test]
    fn loading_from_an_order_replaces_the_cart() {
        let mut store = unreachable_store();
        store.add_to_cart(item("OLD", Some(1.0), None));

        let lines = vec![
            SalesOrderItem {
                item_code: "ITM-1".to_string(),
                item_name: "Item 1".to_string(),
                qty: 3.0,
                rate: 25.0,
                amount: 75.0,
                delivery_date: None,
                stock_uom: Some("Box".to_string()),
                price_list_rate: None,
            },
            SalesOrderItem {
                item_code: "ITM-2".to_string(),
                item_name: "Item 2".to_string(),
                qty: 1.0,
                rate: 10.0,
                amount: 10.0,
                delivery_date: None,
                stock_uom: None,
                price_list_rate: None,
            },
        ];
        store.set_cart_from_order(&lines);

        assert_eq!(store.cart().len(), 2);
        assert_eq!(store.cart()[0].qty, 3);
        assert_eq!(store.cart()[0].item.stock_uom, "Box");
        assert_eq!(store.cart()[0].item.price_list_rate, Some(25.0));
        assert_eq!(store.cart()[1].item.stock_uom, "");
        assert_eq!(store.cart_total(), 85.0);
    }

    #[test]
    fn order_items_recompute_amounts() {
        let mut store = unreachable_store();
        store.add_to_cart(item("ITM-1", Some(50.0), None));
        store.update_qty("ITM-1", 2);

        let items = store.order_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].qty, 3.0);
        assert_eq!(items[0].rate, 50.0);
        assert_eq!(items[0].amount, 150.0);
    }

    #[test]
    fn clear_cart_also_drops_the_current_order() {
        let mut store = unreachable_store();
        store.add_to_cart(item("ITM-1", Some(10.0), None));
        store.set_current_order(Some("SO-0042".to_string()));
        store.clear_cart();

        assert!(store.cart().is_empty());
        assert_eq!(store.current_order(), None);
    }

    #[test]
    fn currency_display_falls_back() {
        let mut store = unreachable_store();
        assert_eq!(store.currency_display(), "₹");

        store.currency = Some(CurrencyInfo {
            currency: Some("EUR".to_string()),
            symbol: None,
        });
        assert_eq!(store.currency_display(), "EUR");

        store.currency = Some(CurrencyInfo {
            currency: Some("EUR".to_string()),
            symbol: Some("€".to_string()),
        });
        assert_eq!(store.currency_display(), "€");
    }

    #[tokio::test]
    async fn bootstrap_failure_lands_in_anonymous_without_currency() {
        let mut store = unreachable_store();
        assert_eq!(*store.state(), SessionState::Uninitialized);

        store.bootstrap().await;
        assert_eq!(*store.state(), SessionState::Anonymous);
        assert!(store.currency_info().is_none());
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_local_state_even_when_remote_fails() {
        let mut store = unreachable_store();
        store.state = SessionState::Authenticated(UserSession {
            user: "clerk@example.com".to_string(),
            full_name: "Clerk".to_string(),
            sid: String::new(),
        });
        store.add_to_cart(item("ITM-1", Some(10.0), None));
        store.set_customer(Some(Customer {
            name: "CUST-1".to_string(),
            customer_name: "Customer One".to_string(),
            customer_group: String::new(),
            territory: String::new(),
            image: None,
        }));
        store.set_current_order(Some("SO-0042".to_string()));

        let result = store.logout().await;
        assert!(result.is_err(), "remote failure must still be surfaced");
        assert_eq!(*store.state(), SessionState::Anonymous);
        assert!(store.cart().is_empty());
        assert!(store.customer().is_none());
        assert_eq!(store.current_order(), None);
    }

    #[tokio::test]
    async fn login_failure_leaves_state_untouched() {
        let mut store = unreachable_store();
        let result = store.login("clerk@example.com", "wrong").await;
        assert!(result.is_err());
        assert_eq!(*store.state(), SessionState::Uninitialized);
    }
}
