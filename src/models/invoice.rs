use serde::{Deserialize, Serialize};

use super::{Environment, Store};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub invoice_id: String,
    pub app_user_id: String,
    pub product_id: Option<String>,
    pub store: Option<Store>,
    pub environment: Option<Environment>,
    pub price_usd: Option<f64>,
    pub currency: Option<String>,
    pub price_in_purchased_currency: Option<f64>,
    pub issued_at: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub invoice_id: String,
    pub app_user_id: String,
    pub product_id: Option<String>,
    pub store: Option<Store>,
    pub environment: Option<Environment>,
    pub price_usd: Option<f64>,
    pub currency: Option<String>,
    pub price_in_purchased_currency: Option<f64>,
    pub issued_at: i64,
}
