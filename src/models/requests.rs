//! Request DTOs for the gateway API

use serde::Deserialize;

/// Request body for `POST /items/:id/reserve`
#[derive(Debug, Clone, Deserialize)]
pub struct ReserveRequest {
    /// Units to take from stock
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

impl ReserveRequest {
    /// Returns an error message if the request is unusable.
    pub fn validate(&self) -> Option<String> {
        if self.quantity == 0 {
            return Some("Quantity must be at least 1".to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_defaults_to_one() {
        let req: ReserveRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.quantity, 1);
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_zero_quantity_invalid() {
        let req: ReserveRequest = serde_json::from_str(r#"{"quantity": 0}"#).unwrap();
        assert!(req.validate().is_some());
    }
}
