use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resource::{OwnedResource, Resource, ValidationError};

/// Purchase placed by a user. Only its owner sees it unless the caller holds
/// `order.global`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub quantity: i32,
    pub notes: String,
    pub total: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Resource for Order {
    const NAME: &'static str = "order";

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.quantity <= 0 {
            return Err(ValidationError::new("quantity must be positive"));
        }
        Ok(())
    }
}

impl OwnedResource for Order {
    fn owner_id(&self) -> Option<Uuid> {
        self.user_id
    }

    fn set_owner_id(&mut self, owner: Uuid) {
        self.user_id = Some(owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_must_be_positive() {
        let order = Order::default();
        assert_eq!(order.validate().unwrap_err().to_string(), "quantity must be positive");
        let order = Order {
            quantity: 2,
            ..Default::default()
        };
        assert!(order.validate().is_ok());
    }

    #[test]
    fn owner_reference_is_always_serialized() {
        let value = serde_json::to_value(Order::default()).unwrap();
        assert!(value.get("user_id").unwrap().is_null());
    }
}
