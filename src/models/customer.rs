use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One subscriber attribute as the provider reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriberAttribute {
    /// Empty string means the attribute was deleted upstream.
    #[serde(default)]
    pub value: String,
    pub updated_at_ms: i64,
}

pub type SubscriberAttributes = BTreeMap<String, SubscriberAttribute>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub app_user_id: String,
    pub original_app_user_id: String,
    /// Every alias ever reported for this user. Only grows.
    pub aliases: Vec<String>,
    pub attributes: SubscriberAttributes,
    /// Set on insert and never changed afterwards.
    pub first_seen_at: i64,
    pub last_seen_at: i64,
    pub updated_at: i64,
}

/// Merge incoming attributes into `stored`, key by key.
///
/// A key is overwritten only when the incoming `updated_at_ms` is strictly
/// greater than the stored one, so the result does not depend on the order
/// events arrive in. Returns true if anything changed.
pub fn merge_attributes(stored: &mut SubscriberAttributes, incoming: &SubscriberAttributes) -> bool {
    let mut changed = false;
    for (key, attr) in incoming {
        let newer = stored
            .get(key)
            .is_none_or(|existing| attr.updated_at_ms > existing.updated_at_ms);
        if newer {
            stored.insert(key.clone(), attr.clone());
            changed = true;
        }
    }
    changed
}

/// Set union preserving first-seen order.
pub fn merge_aliases(stored: &mut Vec<String>, incoming: &[String]) {
    for alias in incoming {
        if !stored.contains(alias) {
            stored.push(alias.clone());
        }
    }
}
