use mongodb::bson::oid::ObjectId;

use crate::error::AppError;

pub fn parse_object_id(id: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(id).map_err(|_| AppError::MalformedPayload)
}

pub fn canteens_key() -> &'static str {
    "canteens"
}

// Key builders take the parsed id, not the raw path segment: `parse_object_id`
// accepts mixed-case hex, and `to_hex` is always lowercase, so building from
// the ObjectId keeps read keys and invalidation keys in agreement.

pub fn canteen_key(canteen_id: &ObjectId) -> String {
    format!("canteen:{}", canteen_id.to_hex())
}

/// Cache key for one filtered menu listing; `*` marks an absent filter.
pub fn menu_key(canteen_id: &ObjectId, category: Option<&str>, available: Option<bool>) -> String {
    let category = category.unwrap_or("*");
    let available = available.map_or_else(|| "*".to_string(), |a| a.to_string());

    format!("menu:{}:{category}:{available}", canteen_id.to_hex())
}

/// Prefix covering every cached menu listing of one canteen.
pub fn menu_prefix(canteen_id: &ObjectId) -> String {
    format!("menu:{}:", canteen_id.to_hex())
}

pub fn session_key(user_id: &str) -> String {
    format!("session:{user_id}")
}

pub fn recent_orders_key(user_id: &ObjectId) -> String {
    format!("orders:recent:{}", user_id.to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_rejects_garbage() {
        assert!(parse_object_id("not-an-id").is_err());

        let id = ObjectId::new();
        assert_eq!(parse_object_id(&id.to_hex()).unwrap(), id);
    }

    #[test]
    fn menu_key_marks_absent_filters() {
        let id = ObjectId::new();
        let hex = id.to_hex();

        assert_eq!(menu_key(&id, None, None), format!("menu:{hex}:*:*"));
        assert_eq!(
            menu_key(&id, Some("snacks"), Some(true)),
            format!("menu:{hex}:snacks:true")
        );
        assert!(menu_key(&id, Some("snacks"), None).starts_with(&menu_prefix(&id)));
    }

    #[test]
    fn cache_keys_normalize_mixed_case_ids() {
        // A client may send the same id in any hex casing; keys built from the
        // parsed id must land where lowercase invalidation can find them.
        let id = parse_object_id("507F1F77BCF86CD799439011").unwrap();

        assert_eq!(menu_key(&id, None, None), "menu:507f1f77bcf86cd799439011:*:*");
        assert_eq!(canteen_key(&id), "canteen:507f1f77bcf86cd799439011");
        assert!(menu_key(&id, None, None).starts_with(&menu_prefix(&id)));
    }
}
