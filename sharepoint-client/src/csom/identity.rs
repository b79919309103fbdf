//! Opaque object identity names
//!
//! CSOM addresses server objects by an opaque identity string built from a
//! fixed template embedding the site/web/list/item identifiers. The template
//! is deterministic: the same logical object always produces the same name.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed prefix of every SharePoint object identity string.
pub const OBJECT_IDENTITY_PREFIX: &str = "740c6a0b-85e2-48a0-a494-e8f1759b105e";

/// Identifies one server-side object down to web, list or item level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectIdentity {
    pub site_id: Uuid,
    pub web_id: Uuid,
    pub list_id: Option<Uuid>,
    pub item_id: Option<i64>,
}

impl ObjectIdentity {
    pub fn web(site_id: Uuid, web_id: Uuid) -> Self {
        Self {
            site_id,
            web_id,
            list_id: None,
            item_id: None,
        }
    }

    pub fn list(site_id: Uuid, web_id: Uuid, list_id: Uuid) -> Self {
        Self {
            site_id,
            web_id,
            list_id: Some(list_id),
            item_id: None,
        }
    }

    pub fn item(site_id: Uuid, web_id: Uuid, list_id: Uuid, item_id: i64) -> Self {
        Self {
            site_id,
            web_id,
            list_id: Some(list_id),
            item_id: Some(item_id),
        }
    }

    /// The most specific level this identity addresses.
    pub fn object_type(&self) -> &'static str {
        if self.item_id.is_some() {
            "item"
        } else if self.list_id.is_some() {
            "list"
        } else {
            "web"
        }
    }

    /// Render the opaque identity name from the fixed template.
    pub fn canonical(&self) -> String {
        let mut name = format!(
            "{}:site:{}:web:{}",
            OBJECT_IDENTITY_PREFIX, self.site_id, self.web_id
        );
        if let Some(list_id) = self.list_id {
            name.push_str(&format!(":list:{}", list_id));
            if let Some(item_id) = self.item_id {
                name.push_str(&format!(":item:{}", item_id));
            }
        }
        name
    }
}
