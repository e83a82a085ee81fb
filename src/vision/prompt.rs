//! Extraction prompt and model reply parsing

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::ExtractError;
use crate::naming::FieldMapping;

/// Instruction sent along with every receipt image
pub const EXTRACTION_PROMPT: &str = r#"Analyze this receipt/invoice image and extract the following information in JSON format:
- Date (YYYY-MM-DD format)
- Item Category (e.g., Food, Transport, Office Supplies, Inventory, Utilities, etc. Choose the most appropriate one.)
- Vendor Name
- Item Name (A concise summary of the main item or service. If multiple, summarize e.g., "Groceries" or "Office Stationery")
- Receipt_Invoice_No (The receipt or invoice number)
- Price Amount (The total amount in format "RM 0.00", e.g., "RM 150.00". If currency is missing, assume RM.)

Ensure the keys in the JSON are exactly: "Date", "Item Category", "Vendor Name", "Item Name", "Receipt_Invoice_No", "Price Amount".
If a field is missing or illegible, use "Unknown"."#;

// ```json ... ``` or ``` ... ```, closing fence optional
static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?i:json)?(.*?)(?:```|\z)").unwrap());

/// Strip a markdown code fence around the reply, if any
pub fn strip_code_fence(reply: &str) -> &str {
    CODE_FENCE
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map_or(reply, |m| m.as_str())
        .trim()
}

/// Parse the model's reply into a field mapping
pub fn parse_fields(reply: &str) -> Result<FieldMapping, ExtractError> {
    let value: Value = serde_json::from_str(strip_code_fence(reply))?;
    match value {
        Value::Object(object) => Ok(FieldMapping::from_json_object(&object)),
        _ => Err(ExtractError::NotAnObject),
    }
}
