//! Output record layout
//!
//! A record is an ordered JSON object: the base item fields, then `#debug`,
//! then whatever the output extension adds.

use serde::Serialize;
use serde_json::{Map, Value};

/// Fields read from an item-detail page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDetails {
    pub name: String,
    pub item_id: Option<String>,
    pub color: Option<String>,
    pub sizes: Vec<String>,
    pub price: String,
}

/// Request metadata attached to every record under `#debug`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDebugInfo {
    pub request_id: i64,
    pub url: String,
    pub loaded_url: String,
    pub method: String,
    pub retry_count: u32,
    pub error_messages: Vec<String>,
    pub status_code: u16,
}

/// One output record, written once per item-detail page
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord(Map<String, Value>);

impl OutputRecord {
    pub fn new(url: &str, details: ItemDetails, debug: RequestDebugInfo) -> Self {
        let mut fields = Map::new();
        fields.insert("url".to_string(), Value::from(url));
        fields.insert("name".to_string(), Value::from(details.name));
        fields.insert("itemId".to_string(), details.item_id.into());
        fields.insert("color".to_string(), details.color.into());
        fields.insert("sizes".to_string(), details.sizes.into());
        fields.insert("price".to_string(), Value::from(details.price));
        fields.insert(
            "#debug".to_string(),
            serde_json::to_value(debug).unwrap_or(Value::Null),
        );
        Self(fields)
    }

    /// Merges extension fields over the record; later keys win
    pub fn with_extension(mut self, extra: Map<String, Value>) -> Self {
        for (key, value) in extra {
            self.0.insert(key, value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }
}
