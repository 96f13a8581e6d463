use crate::ir::*;
use crate::permission::GrantTable;
use schemars::{schema_for, JsonSchema};
use serde_json::Value;
use std::collections::BTreeMap;

/// Generate JSON schemas for all persisted and submitted types
pub fn generate_schemas() -> serde_json::Result<BTreeMap<String, Value>> {
    let mut schemas = BTreeMap::new();

    schemas.insert("DeckFile".to_string(), generate_schema::<DeckFile>()?);
    schemas.insert("StoredDeck".to_string(), generate_schema::<StoredDeck>()?);
    schemas.insert("StoredPage".to_string(), generate_schema::<StoredPage>()?);
    schemas.insert("PageForm".to_string(), generate_schema::<PageForm>()?);
    schemas.insert("GrantTable".to_string(), generate_schema::<GrantTable>()?);

    Ok(schemas)
}

/// Generate a single schema for a given type
pub fn generate_schema<T: JsonSchema>() -> serde_json::Result<Value> {
    serde_json::to_value(schema_for!(T))
}

/// Get the JSON schema for the deck file
pub fn deck_file_schema() -> serde_json::Result<Value> {
    generate_schema::<DeckFile>()
}
