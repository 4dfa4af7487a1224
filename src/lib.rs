//! Salesdesk - sales-order point-of-sale client for a Frappe/ERPNext
//! backend.
//!
//! A user authenticates, selects a customer, browses the item catalog
//! with live pricing and stock, builds a cart, submits it as a sales
//! order, and records payments against outstanding invoices. All
//! business logic (pricing rules, taxes, stock ledger, reconciliation,
//! numbering, permissions) lives in the backend; this crate is the
//! integration layer ([`FrappeClient`]) plus the client-local session
//! and cart state ([`SessionStore`]) a UI shell drives.

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod catalog;
mod client;
mod config;
mod customers;
mod defaults;
mod error;
mod orders;
mod payments;
mod query;
mod store;
mod token;
mod types;

pub use client::{Connectivity, FrappeClient};
pub use config::{normalize_base_url, ClientConfig};
pub use error::{ApiError, ApiResult};
pub use store::{SessionStore, SessionState};
pub use token::{TokenProvider, TOKEN_ENV_VAR};
pub use types::{
    CartLine, CurrencyInfo, Customer, CustomerSummary, InvoiceBrief, Item, LedgerEntry,
    OutstandingInvoice, PaymentBrief, PaymentMode, PaymentReference, SalesOrder, SalesOrderItem,
    SalesOrderSummary, UserSession,
};

/// Initialize structured logging: console always, plus a daily-rolling
/// file when `log_dir` is given. Call once at startup.
pub fn init_logging(log_dir: Option<&std::path::Path>) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,salesdesk=debug"));

    let console_layer = fmt::layer().with_target(true);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).ok();
            let file_appender = tracing_appender::rolling::daily(dir, "salesdesk");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true);
            registry.with(file_layer).init();
            // Keep the guard alive for the lifetime of the process —
            // dropping it flushes logs.
            std::mem::forget(guard);
        }
        None => registry.init(),
    }

    info!("salesdesk v{} logging initialized", env!("CARGO_PKG_VERSION"));
}
