// src/rpc/decode.rs

//! Decoding of AUR RPC responses into package records
//!
//! Responses are parsed into an owned `serde_json::Value` tree and mapped
//! field by field, so a record missing optional fields still decodes.
//! Malformed bodies are logged and yield no results.

use crate::package::{PackageRecord, PackageSource};
use serde_json::Value;
use tracing::warn;

/// Longest body excerpt included in protocol-error logs
const EXCERPT_LEN: usize = 200;

/// Decode an RPC response body into package records
///
/// A body that is not a JSON object, or an RPC `"type": "error"` reply,
/// produces an empty list. A missing `results` key also produces an empty
/// list.
pub fn parse_results(body: &[u8]) -> Vec<PackageRecord> {
    let root: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                "Failed to parse AUR response: {} (body starts: {:?})",
                e,
                excerpt(body)
            );
            return Vec::new();
        }
    };

    let Some(object) = root.as_object() else {
        warn!("AUR response is not a JSON object: {:?}", excerpt(body));
        return Vec::new();
    };

    if object.get("type").and_then(Value::as_str) == Some("error") {
        let message = object
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        warn!("AUR RPC error: {}", message);
        return Vec::new();
    }

    let Some(results) = object.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };

    results
        .iter()
        .map(record_from_value)
        .filter(|record| !record.name.is_empty())
        .collect()
}

/// Map one element of the `results` array to a record
pub fn record_from_value(value: &Value) -> PackageRecord {
    let pkgbase = value
        .get("PackageBase")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    PackageRecord {
        name: str_field(value, "Name"),
        version: str_field(value, "Version"),
        description: str_field(value, "Description"),
        url: str_field(value, "URL"),
        pkgbase,
        repo: "aur".to_string(),
        depends: str_list(value, "Depends"),
        makedepends: str_list(value, "MakeDepends"),
        optdepends: str_list(value, "OptDepends"),
        provides: str_list(value, "Provides"),
        conflicts: str_list(value, "Conflicts"),
        licenses: str_list(value, "License"),
        maintainer: value
            .get("Maintainer")
            .and_then(Value::as_str)
            .map(str::to_string),
        votes: value.get("NumVotes").and_then(Value::as_i64).unwrap_or(0),
        out_of_date: value.get("OutOfDate").is_some_and(|v| !v.is_null()),
        source: PackageSource::Aur,
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn str_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn excerpt(body: &[u8]) -> String {
    let end = body.len().min(EXCERPT_LEN);
    String::from_utf8_lossy(&body[..end]).into_owned()
}
