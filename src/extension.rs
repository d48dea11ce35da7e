//! Output extensions
//!
//! An extension receives the parsed item-detail page and returns extra
//! fields for the output record. Its result must be a JSON object; anything
//! else ends the run.

use crate::config::ExtensionConfig;
use crate::ConfigError;
use scraper::{Html, Selector};
use serde_json::{Map, Value};

/// Computes extra record fields from an item-detail page
///
/// `SelectorExtension` always yields an object. The object check on the
/// result applies to programmatic extensions passed to
/// `Coordinator::with_extension`, such as closures.
pub trait OutputExtension: Send + Sync {
    fn extend(&self, page: &Html) -> Value;
}

impl<F> OutputExtension for F
where
    F: Fn(&Html) -> Value + Send + Sync,
{
    fn extend(&self, page: &Html) -> Value {
        self(page)
    }
}

/// Names the JSON type of a value for error messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

struct FieldExtractor {
    name: String,
    selector: Selector,
    attribute: Option<String>,
    all: bool,
}

impl FieldExtractor {
    fn read(&self, page: &Html) -> Value {
        let values = page.select(&self.selector).filter_map(|element| {
            let value = match &self.attribute {
                Some(attribute) => element.value().attr(attribute).map(str::to_string),
                None => Some(element.text().collect::<String>()),
            };
            value.map(|v| v.trim().to_string())
        });

        if self.all {
            Value::Array(values.map(Value::String).collect())
        } else {
            values.map(Value::String).next().unwrap_or(Value::Null)
        }
    }
}

/// Extension built from `[extension.fields.*]` selector rules
pub struct SelectorExtension {
    fields: Vec<FieldExtractor>,
}

impl SelectorExtension {
    /// Compiles the configured field rules
    ///
    /// # Returns
    ///
    /// * `Ok(SelectorExtension)` - Every selector compiled
    /// * `Err(ConfigError::Extension)` - No fields, or a selector is invalid
    pub fn from_config(config: &ExtensionConfig) -> Result<Self, ConfigError> {
        if config.fields.is_empty() {
            return Err(ConfigError::Extension(
                "[extension] must define at least one field".to_string(),
            ));
        }

        let fields = config
            .fields
            .iter()
            .map(|(name, rule)| {
                let selector = Selector::parse(&rule.selector).map_err(|e| {
                    ConfigError::Extension(format!(
                        "field '{}' has invalid selector '{}': {:?}",
                        name, rule.selector, e
                    ))
                })?;
                Ok(FieldExtractor {
                    name: name.clone(),
                    selector,
                    attribute: rule.attribute.clone(),
                    all: rule.all,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self { fields })
    }
}

impl OutputExtension for SelectorExtension {
    fn extend(&self, page: &Html) -> Value {
        let mut extra = Map::new();
        for field in &self.fields {
            extra.insert(field.name.clone(), field.read(page));
        }
        Value::Object(extra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldRule;
    use serde_json::json;
    use std::collections::BTreeMap;

    const PAGE: &str = r#"
        <html><body>
            <div itemprop="brand"><span itemprop="name"> Acme </span></div>
            <meta itemprop="sku" content="SKU-9">
            <ul class="tags"><li>silk</li><li> midi </li></ul>
        </body></html>
    "#;

    fn rule(selector: &str, attribute: Option<&str>, all: bool) -> FieldRule {
        FieldRule {
            selector: selector.to_string(),
            attribute: attribute.map(str::to_string),
            all,
        }
    }

    #[test]
    fn test_selector_extension_fields() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "brand".to_string(),
            rule("[itemprop=brand] [itemprop=name]", None, false),
        );
        fields.insert("sku".to_string(), rule("meta[itemprop=sku]", Some("content"), false));
        fields.insert("tags".to_string(), rule(".tags li", None, true));
        fields.insert("missing".to_string(), rule(".nothing", None, false));

        let extension = SelectorExtension::from_config(&ExtensionConfig { fields }).unwrap();
        let value = extension.extend(&Html::parse_document(PAGE));

        assert_eq!(
            value,
            json!({
                "brand": "Acme",
                "missing": null,
                "sku": "SKU-9",
                "tags": ["silk", "midi"],
            })
        );
    }

    #[test]
    fn test_empty_extension_rejected() {
        let result = SelectorExtension::from_config(&ExtensionConfig {
            fields: BTreeMap::new(),
        });
        assert!(matches!(result, Err(ConfigError::Extension(_))));
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let mut fields = BTreeMap::new();
        fields.insert("brand".to_string(), rule("div[[", None, false));
        let result = SelectorExtension::from_config(&ExtensionConfig { fields });
        assert!(matches!(result, Err(ConfigError::Extension(_))));
    }

    #[test]
    fn test_closure_extension() {
        let extension = |_: &Html| json!({ "brand": "X" });
        let value = extension.extend(&Html::parse_document(PAGE));
        assert_eq!(value, json!({ "brand": "X" }));
    }

    #[test]
    fn test_json_type_name() {
        assert_eq!(json_type_name(&json!("text")), "string");
        assert_eq!(json_type_name(&json!([1])), "array");
        assert_eq!(json_type_name(&json!({})), "object");
    }
}
