//! Prefixed row ids for mirrored entities.
//!
//! Every row gets a `bm_` brand prefix so local ids can never be mistaken for
//! provider ids (`app_user_id`, `original_transaction_id`, event ids).
//!
//! Format: `bm_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    Customer,
    Entitlement,
    Subscription,
    Experiment,
    Transfer,
    Invoice,
    VirtualCurrencyBalance,
    VirtualCurrencyTransaction,
    WebhookEvent,
}

impl EntityType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Customer => "bm_cus",
            Self::Entitlement => "bm_ent",
            Self::Subscription => "bm_sub",
            Self::Experiment => "bm_exp",
            Self::Transfer => "bm_xfer",
            Self::Invoice => "bm_inv",
            Self::VirtualCurrencyBalance => "bm_vcb",
            Self::VirtualCurrencyTransaction => "bm_vct",
            Self::WebhookEvent => "bm_evt",
        }
    }

    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
