// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sui types and constants.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sui network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Fullnode JSON-RPC endpoint URL
    pub rpc_url: &'static str,
    /// Object explorer URL
    pub explorer_url: &'static str,
}

/// Sui Testnet configuration.
pub const SUI_TESTNET: NetworkConfig = NetworkConfig {
    rpc_url: "https://fullnode.testnet.sui.io:443",
    explorer_url: "https://testnet.suivision.xyz",
};

/// Shared clock object.
pub const CLOCK_OBJECT_ID: &str = "0x6";

/// Length of a Sui address / object id in bytes.
pub const ADDRESS_LENGTH: usize = 32;

/// Sui account address or object id in canonical form.
///
/// Format: `0x` followed by 64 lowercase hexadecimal characters. Short forms
/// such as `0x6` are left-padded with zeros.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SuiAddress(String);

impl SuiAddress {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if hex_part.is_empty() || hex_part.len() > ADDRESS_LENGTH * 2 {
            return Err(format!("invalid Sui address length: `{raw}`"));
        }
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("invalid Sui address characters: `{raw}`"));
        }

        Ok(Self(format!(
            "0x{:0>width$}",
            hex_part.to_ascii_lowercase(),
            width = ADDRESS_LENGTH * 2
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SuiAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SuiAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Compare two ids irrespective of zero padding and case.
pub fn same_object_id(a: &str, b: &str) -> bool {
    match (SuiAddress::parse(a), SuiAddress::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Explorer page for an object on testnet.
pub fn explorer_object_url(id: &str) -> String {
    format!("{}/object/{}", SUI_TESTNET.explorer_url, id)
}

/// Short display label for an object id (`0x12345678...`).
pub fn short_object_label(id: &str) -> String {
    let head: String = id.chars().take(10).collect();
    format!("{head}...")
}

// =============================================================================
// JSON-RPC payloads
// =============================================================================

/// Object read with `showContent` / `showType`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectData {
    pub object_id: String,
    #[serde(default, rename = "type")]
    pub object_type: Option<String>,
    #[serde(default)]
    pub content: Option<MoveContent>,
}

impl ObjectData {
    /// Move struct fields, or `Value::Null` for packages / missing content.
    pub fn fields(&self) -> &Value {
        self.content
            .as_ref()
            .map(|c| &c.fields)
            .unwrap_or(&Value::Null)
    }
}

/// Parsed Move content of an object.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoveContent {
    #[serde(default)]
    pub data_type: String,
    #[serde(default, rename = "type")]
    pub struct_type: Option<String>,
    #[serde(default)]
    pub fields: Value,
}

/// `sui_getObject` response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectResponse {
    #[serde(default)]
    pub data: Option<ObjectData>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// Dynamic field entry under a parent object.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DynamicFieldInfo {
    pub name: DynamicFieldName,
    #[serde(default)]
    pub object_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DynamicFieldName {
    #[serde(rename = "type")]
    pub name_type: String,
    pub value: Value,
}

impl DynamicFieldName {
    /// The name rendered as a string, as used for blob ids.
    pub fn value_string(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Cursor-paginated JSON-RPC result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<Value>,
    #[serde(default)]
    pub has_next_page: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn address_is_normalized() {
        let clock = SuiAddress::parse("0x6").unwrap();
        assert_eq!(clock.as_str().len(), 66);
        assert!(clock.as_str().ends_with("06"));

        let upper = SuiAddress::parse("0xABCDEF").unwrap();
        let lower = SuiAddress::parse("abcdef").unwrap();
        assert_eq!(upper, lower);

        assert!(SuiAddress::parse("0x").is_err());
        assert!(SuiAddress::parse("0xzz").is_err());
        assert!(SuiAddress::parse(&format!("0x{}", "1".repeat(65))).is_err());
    }

    #[test]
    fn same_object_id_ignores_padding() {
        assert!(same_object_id("0x6", "0x0000000000000000000000000000000000000000000000000000000000000006"));
        assert!(!same_object_id("0x6", "0x7"));
    }

    #[test]
    fn explorer_link_and_label() {
        let id = "0x1234567890abcdef";
        assert_eq!(
            explorer_object_url(id),
            "https://testnet.suivision.xyz/object/0x1234567890abcdef"
        );
        assert_eq!(short_object_label(id), "0x12345678...");
    }

    #[test]
    fn object_data_deserializes_move_content() {
        let raw = json!({
            "objectId": "0xabc",
            "type": "0x1::subscription::Service",
            "content": {
                "dataType": "moveObject",
                "type": "0x1::subscription::Service",
                "fields": { "fee": "10", "ttl": "60000" }
            }
        });
        let data: ObjectData = serde_json::from_value(raw).unwrap();
        assert_eq!(data.fields()["fee"], "10");

        let bare: ObjectData = serde_json::from_value(json!({ "objectId": "0x1" })).unwrap();
        assert!(bare.fields().is_null());
    }

    #[test]
    fn dynamic_field_name_renders_strings_unquoted() {
        let name: DynamicFieldName =
            serde_json::from_value(json!({ "type": "0x1::string::String", "value": "blob-1" })).unwrap();
        assert_eq!(name.value_string(), "blob-1");
    }
}
