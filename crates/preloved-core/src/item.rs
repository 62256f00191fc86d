//! Recommended items and best-effort decoding of the recommender's item blobs.
//!
//! The recommender stores display attributes as an opaque `Labels` blob and
//! categories as an opaque `Categories` blob. Depending on how the catalog was
//! loaded those are either JSON-encoded strings or inline JSON values, so both
//! forms are accepted. Anything that cannot be read falls back to the
//! placeholder values below instead of failing the item.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const UNTITLED_NAME: &str = "Untitled Item";
pub const PLACEHOLDER_IMAGE: &str = "/placeholder.jpg";
pub const UNKNOWN_BRAND: &str = "Unknown Brand";
pub const UNKNOWN_CONDITION: &str = "Unknown";
pub const ONE_SIZE: &str = "One Size";

/// Item record as returned by `GET /api/item/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawItem {
    pub item_id: String,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub categories: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub labels: Option<Value>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// A product candidate ready to be shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    id: String,
    pub name: String,
    pub image_url: String,
    pub price: f64,
    pub brand: String,
    pub condition: String,
    pub size: String,
    pub color: Option<String>,
    pub categories: Vec<String>,
}

impl Item {
    /// An item carrying only its identifier, every display field defaulted.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: UNTITLED_NAME.to_string(),
            image_url: PLACEHOLDER_IMAGE.to_string(),
            price: 0.0,
            brand: UNKNOWN_BRAND.to_string(),
            condition: UNKNOWN_CONDITION.to_string(),
            size: ONE_SIZE.to_string(),
            color: None,
            categories: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn from_raw(raw: RawItem) -> Self {
        let labels = decode_labels(raw.labels.as_ref(), &raw.item_id);
        let categories = decode_categories(raw.categories.as_ref(), &raw.item_id);

        let mut item = Item::new(raw.item_id);
        if let Some(name) = raw.comment.filter(|c| !c.trim().is_empty()) {
            item.name = name;
        }
        if let Some(url) = label_str(&labels, "imageUrl") {
            item.image_url = url;
        }
        if let Some(brand) = label_str(&labels, "brand") {
            item.brand = brand;
        }
        if let Some(condition) = label_str(&labels, "condition") {
            item.condition = condition;
        }
        if let Some(size) = label_str(&labels, "size") {
            item.size = size;
        }
        item.color = label_str(&labels, "color");
        item.price = labels.get("price").and_then(parse_price).unwrap_or(0.0);
        item.categories = categories;
        item
    }

    pub fn display_price(&self) -> String {
        format!("${:.2}", self.price)
    }
}

impl From<RawItem> for Item {
    fn from(raw: RawItem) -> Self {
        Item::from_raw(raw)
    }
}

/// Unwrap a blob that may be a JSON document stored inside a string.
fn unwrap_blob(blob: Option<&Value>, item_id: &str, what: &str) -> Option<Value> {
    match blob? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(item_id, error = %e, "Ignoring malformed {what} blob");
                None
            }
        },
        other => Some(other.clone()),
    }
}

fn decode_labels(blob: Option<&Value>, item_id: &str) -> Map<String, Value> {
    match unwrap_blob(blob, item_id, "labels") {
        Some(Value::Object(map)) => map,
        Some(_) => {
            tracing::debug!(item_id, "Labels blob is not an object");
            Map::new()
        }
        None => Map::new(),
    }
}

fn decode_categories(blob: Option<&Value>, item_id: &str) -> Vec<String> {
    let values = match unwrap_blob(blob, item_id, "categories") {
        Some(Value::Array(values)) => values,
        Some(_) => {
            tracing::debug!(item_id, "Categories blob is not a list");
            return Vec::new();
        }
        None => return Vec::new(),
    };

    let mut categories: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if let Value::String(category) = value {
            if !category.is_empty() && !categories.contains(&category) {
                categories.push(category);
            }
        }
    }
    categories
}

fn label_str(labels: &Map<String, Value>, key: &str) -> Option<String> {
    match labels.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn parse_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_start_matches('$').parse::<f64>().ok()?,
        _ => return None,
    };
    price.is_finite().then_some(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(labels: Option<Value>, categories: Option<Value>) -> RawItem {
        RawItem {
            item_id: "item-1".to_string(),
            labels,
            categories,
            comment: Some("Denim jacket".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_labels_use_defaults() {
        let item = Item::from_raw(raw(Some(json!("{}")), None));

        assert_eq!(item.id(), "item-1");
        assert_eq!(item.price, 0.0);
        assert_eq!(item.condition, UNKNOWN_CONDITION);
        assert_eq!(item.size, ONE_SIZE);
        assert_eq!(item.image_url, PLACEHOLDER_IMAGE);
        assert_eq!(item.brand, UNKNOWN_BRAND);
        assert!(item.categories.is_empty());
    }

    #[test]
    fn test_absent_labels_use_defaults() {
        let item = Item::from_raw(raw(None, None));
        assert_eq!(item.price, 0.0);
        assert_eq!(item.size, ONE_SIZE);
        assert_eq!(item.name, "Denim jacket");
    }

    #[test]
    fn test_string_encoded_blobs() {
        let labels = json!(r#"{"brand":"Levi's","price":"24.50","condition":"Good","size":"M","color":"blue","imageUrl":"/img/1.jpg"}"#);
        let categories = json!(r#"["jackets","denim"]"#);
        let item = Item::from_raw(raw(Some(labels), Some(categories)));

        assert_eq!(item.brand, "Levi's");
        assert_eq!(item.price, 24.5);
        assert_eq!(item.condition, "Good");
        assert_eq!(item.size, "M");
        assert_eq!(item.color.as_deref(), Some("blue"));
        assert_eq!(item.image_url, "/img/1.jpg");
        assert_eq!(item.categories, vec!["jackets", "denim"]);
    }

    #[test]
    fn test_inline_blobs() {
        let labels = json!({"brand": "Zara", "price": 12});
        let categories = json!(["tops", "tops", "summer"]);
        let item = Item::from_raw(raw(Some(labels), Some(categories)));

        assert_eq!(item.brand, "Zara");
        assert_eq!(item.price, 12.0);
        assert_eq!(item.categories, vec!["tops", "summer"]);
    }

    #[test]
    fn test_malformed_blobs_are_treated_as_missing() {
        let item = Item::from_raw(raw(Some(json!("{not json")), Some(json!("[oops"))));
        assert_eq!(item.brand, UNKNOWN_BRAND);
        assert_eq!(item.price, 0.0);
        assert!(item.categories.is_empty());
    }

    #[test]
    fn test_non_numeric_price_defaults_to_zero() {
        let item = Item::from_raw(raw(Some(json!({"price": "free"})), None));
        assert_eq!(item.price, 0.0);
    }

    #[test]
    fn test_missing_comment_gets_untitled_name() {
        let mut r = raw(None, None);
        r.comment = Some("  ".to_string());
        assert_eq!(Item::from_raw(r).name, UNTITLED_NAME);
    }

    #[test]
    fn test_raw_item_deserializes_from_wire() {
        let wire = json!({
            "ItemId": "42",
            "IsHidden": false,
            "Categories": ["shoes"],
            "Timestamp": "2024-01-01T00:00:00Z",
            "Labels": "{\"price\": 9.99}",
            "Comment": "Sneakers"
        });
        let raw: RawItem = serde_json::from_value(wire).expect("valid item");
        let item = Item::from(raw);
        assert_eq!(item.id(), "42");
        assert_eq!(item.display_price(), "$9.99");
        assert_eq!(item.categories, vec!["shoes"]);
    }
}
