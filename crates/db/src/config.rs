use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::config;

/// Site configuration keys used elsewhere in the application.
pub const KEY_DISABLE_REGISTRATIONS: &str = "disable_registrations";
pub const KEY_RECONCILE_WATERMARK: &str = "last_reconciled_at";

#[derive(
    Debug, Queryable, Serialize, Deserialize, Clone, Hash, PartialEq, Eq,
)]
pub struct ConfigItem {
    pub id: i64,
    pub public_id: String,
    pub key: String,
    pub value: String,
}

type WithKey<'a> = diesel::dsl::Eq<config::key, &'a str>;

impl ConfigItem {
    pub fn with_key(key: &str) -> WithKey {
        config::key.eq(key)
    }
}
