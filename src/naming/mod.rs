//! Receipt fields and filename generation

mod sanitize;
mod template;

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

pub use sanitize::sanitize;
pub use template::{Placeholder, Template, TemplateError, TemplatePart};

/// Template used when the user does not supply one
pub const DEFAULT_TEMPLATE: &str =
    "{Date} - {Item Category} - {Vendor Name} - {Item Name} - {Receipt_Invoice_No} - RM{Price Amount}";

/// Value substituted for recognized fields that are missing or empty
pub const UNKNOWN: &str = "Unknown";

/// Stem of the name reported when a template cannot be rendered
pub const FALLBACK_STEM: &str = "Error_Renaming";

/// Key carrying the source file's basename
pub const FILE_NAME_KEY: &str = "File Name";

/// Key carrying the extraction failure message
pub const ERROR_DETAILS_KEY: &str = "Error Details";

/// Fields recognized on every receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReceiptField {
    Date,
    ItemCategory,
    VendorName,
    ItemName,
    ReceiptInvoiceNo,
    PriceAmount,
}

impl ReceiptField {
    /// All recognized fields, in report column order
    pub const ALL: [ReceiptField; 6] = [
        ReceiptField::Date,
        ReceiptField::ItemCategory,
        ReceiptField::VendorName,
        ReceiptField::ItemName,
        ReceiptField::ReceiptInvoiceNo,
        ReceiptField::PriceAmount,
    ];

    /// Mapping key, also used as the placeholder name
    pub fn key(self) -> &'static str {
        match self {
            ReceiptField::Date => "Date",
            ReceiptField::ItemCategory => "Item Category",
            ReceiptField::VendorName => "Vendor Name",
            ReceiptField::ItemName => "Item Name",
            ReceiptField::ReceiptInvoiceNo => "Receipt_Invoice_No",
            ReceiptField::PriceAmount => "Price Amount",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }
}

/// Field values extracted from one receipt image
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    values: BTreeMap<String, String>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mapping from the JSON object returned by the model.
    ///
    /// Strings are taken as-is, `null` becomes empty, anything else is kept
    /// as its JSON text (e.g. `15.5`, `true`).
    pub fn from_json_object(object: &serde_json::Map<String, Value>) -> Self {
        object
            .iter()
            .map(|(key, value)| (key.clone(), value_to_text(value)))
            .collect()
    }

    /// Mapping recorded for a file whose extraction failed
    pub fn extraction_failed(file_name: &str, details: impl Into<String>) -> Self {
        let mut mapping: Self = ReceiptField::ALL
            .into_iter()
            .map(|field| (field.key(), "Error"))
            .collect();
        mapping.insert(FILE_NAME_KEY, file_name);
        mapping.insert(ERROR_DETAILS_KEY, details);
        mapping
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn field(&self, field: ReceiptField) -> Option<&str> {
        self.get(field.key())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.get(FILE_NAME_KEY)
    }

    pub fn error_details(&self) -> Option<&str> {
        self.get(ERROR_DETAILS_KEY)
    }

    /// Whether extraction failed for this receipt; such files must not be renamed
    pub fn is_error(&self) -> bool {
        self.contains_key(ERROR_DETAILS_KEY)
    }
}

impl<K, V> FromIterator<(K, V)> for FieldMapping
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Sample receipt used for template previews
pub fn sample_mapping() -> FieldMapping {
    [
        (ReceiptField::Date, "2023-10-27"),
        (ReceiptField::ItemCategory, "Food"),
        (ReceiptField::VendorName, "Starbucks"),
        (ReceiptField::ItemName, "Coffee"),
        (ReceiptField::ReceiptInvoiceNo, "12345"),
        (ReceiptField::PriceAmount, "15.50"),
    ]
    .into_iter()
    .map(|(field, value)| (field.key(), value))
    .collect()
}

/// Sanitized, trimmed copy of `fields` with every recognized field present
fn working_copy(fields: &FieldMapping) -> FieldMapping {
    let mut safe: FieldMapping = fields
        .iter()
        .map(|(key, value)| (key, sanitize(value).trim().to_string()))
        .collect();

    for field in ReceiptField::ALL {
        if safe.field(field).is_none_or(str::is_empty) {
            safe.insert(field.key(), UNKNOWN);
        }
    }

    safe
}

/// Render `template` against `fields`, failing on malformed templates and
/// placeholders that resolve to nothing.
pub fn try_generate_filename(
    fields: &FieldMapping,
    extension: &str,
    template: &str,
) -> Result<String, TemplateError> {
    let template = Template::parse(template)?;
    let mut name = template.render(&working_copy(fields))?;

    if !name.to_lowercase().ends_with(&extension.to_lowercase()) {
        name.push_str(extension);
    }

    Ok(name)
}

/// Generate a new filename from the extracted fields.
///
/// Never fails: a template that cannot be rendered yields
/// `Error_Renaming{extension}` and a warning, so one bad template does not
/// stop the rest of the batch.
pub fn generate_filename(fields: &FieldMapping, extension: &str, template: &str) -> String {
    match try_generate_filename(fields, extension, template) {
        Ok(name) => name,
        Err(e) => {
            warn!(template, error = %e, "Error generating filename");
            format!("{FALLBACK_STEM}{extension}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_default_template() {
        assert_eq!(
            generate_filename(&sample_mapping(), ".jpg", DEFAULT_TEMPLATE),
            "2023-10-27 - Food - Starbucks - Coffee - 12345 - RM15.50.jpg"
        );
    }

    #[test]
    fn sanitizes_values() {
        let mut fields = sample_mapping();
        fields.insert("Vendor Name", "Joe's <Diner>");
        assert_eq!(
            generate_filename(&fields, ".jpg", DEFAULT_TEMPLATE),
            "2023-10-27 - Food - Joe's Diner - Coffee - 12345 - RM15.50.jpg"
        );
    }

    #[test]
    fn missing_and_empty_fields_become_unknown() {
        let fields: FieldMapping = [("Date", "2024-01-02"), ("Vendor Name", "  ")].into_iter().collect();
        assert_eq!(
            generate_filename(&fields, ".png", DEFAULT_TEMPLATE),
            "2024-01-02 - Unknown - Unknown - Unknown - Unknown - RMUnknown.png"
        );
        assert_eq!(
            generate_filename(&FieldMapping::new(), ".png", "{Date}_{Price Amount}"),
            "Unknown_Unknown.png"
        );
    }

    #[test]
    fn value_of_only_forbidden_chars_becomes_unknown() {
        let fields: FieldMapping = [("Item Name", "<?>")].into_iter().collect();
        assert_eq!(generate_filename(&fields, ".jpg", "{Item Name}"), "Unknown.jpg");
    }

    #[test]
    fn unknown_placeholder_falls_back() {
        assert_eq!(
            generate_filename(&sample_mapping(), ".jpg", "{Date} {Nonexistent}"),
            "Error_Renaming.jpg"
        );
        assert_eq!(
            try_generate_filename(&sample_mapping(), ".jpg", "{Nonexistent}"),
            Err(TemplateError::UnknownPlaceholder("Nonexistent".to_string()))
        );
    }

    #[test]
    fn malformed_template_falls_back() {
        assert_eq!(generate_filename(&sample_mapping(), ".png", "{Date"), "Error_Renaming.png");
        assert_eq!(generate_filename(&sample_mapping(), ".png", "Date}"), "Error_Renaming.png");
    }

    #[test]
    fn extra_keys_resolve_without_defaulting() {
        let mut fields = sample_mapping();
        fields.insert(FILE_NAME_KEY, "IMG:001.jpg");
        assert_eq!(
            generate_filename(&fields, ".jpg", "{Date} {File Name}"),
            "2023-10-27 IMG001.jpg"
        );
        // the mapping itself is left untouched
        assert_eq!(fields.file_name(), Some("IMG:001.jpg"));
    }

    #[test]
    fn extension_handling() {
        assert_eq!(generate_filename(&sample_mapping(), ".jpg", ""), ".jpg");
        assert_eq!(generate_filename(&sample_mapping(), ".jpg", "receipt"), "receipt.jpg");
        assert_eq!(generate_filename(&sample_mapping(), ".jpg", "receipt.JPG"), "receipt.JPG");
        assert_eq!(generate_filename(&sample_mapping(), "", "{Date}"), "2023-10-27");
    }

    #[test]
    fn deterministic() {
        let a = generate_filename(&sample_mapping(), ".webp", DEFAULT_TEMPLATE);
        let b = generate_filename(&sample_mapping(), ".webp", DEFAULT_TEMPLATE);
        assert_eq!(a, b);
    }

    #[test]
    fn json_values_become_text() {
        let value: Value = serde_json::json!({
            "Date": "2023-10-27",
            "Price Amount": 15.5,
            "Receipt_Invoice_No": null,
            "Paid": true,
        });
        let fields = FieldMapping::from_json_object(value.as_object().unwrap());
        assert_eq!(fields.field(ReceiptField::PriceAmount), Some("15.5"));
        assert_eq!(fields.field(ReceiptField::ReceiptInvoiceNo), Some(""));
        assert_eq!(fields.get("Paid"), Some("true"));
        assert_eq!(
            generate_filename(&fields, ".jpg", "{Receipt_Invoice_No}-{Price Amount}"),
            "Unknown-15.5.jpg"
        );
    }

    #[test]
    fn failure_mapping() {
        let fields = FieldMapping::extraction_failed("a.jpg", "timeout");
        assert!(fields.is_error());
        assert_eq!(fields.field(ReceiptField::Date), Some("Error"));
        assert_eq!(fields.file_name(), Some("a.jpg"));
        assert_eq!(fields.error_details(), Some("timeout"));
        assert!(!sample_mapping().is_error());
    }

    #[test]
    fn field_keys_round_trip() {
        for field in ReceiptField::ALL {
            assert_eq!(ReceiptField::from_key(field.key()), Some(field));
        }
        assert_eq!(ReceiptField::from_key("date"), None);
    }
}
