use serde::{Deserialize, Serialize};

use super::Environment;

/// Running total per `(app_user_id, currency_code)`. Integer units only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualCurrencyBalance {
    pub id: String,
    pub app_user_id: String,
    pub currency_code: String,
    pub currency_name: String,
    pub balance: i64,
    pub updated_at: i64,
}

/// Immutable ledger entry. Unique on `(transaction_id, adjustment_index)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualCurrencyTransaction {
    pub id: String,
    pub transaction_id: String,
    /// Position of the adjustment within its provider transaction
    pub adjustment_index: i64,
    pub app_user_id: String,
    pub currency_code: String,
    /// Negative for spends and refunds
    pub amount: i64,
    pub source: Option<String>,
    pub product_id: Option<String>,
    pub environment: Option<Environment>,
    pub timestamp: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct RecordCurrencyAdjustment {
    pub transaction_id: String,
    pub adjustment_index: i64,
    pub app_user_id: String,
    pub currency_code: String,
    pub currency_name: String,
    pub amount: i64,
    pub source: Option<String>,
    pub product_id: Option<String>,
    pub environment: Option<Environment>,
    pub timestamp: i64,
}
