//! Indexer query boundary: chamber metadata lookups.
//!
//! The indexer serves contract models over GraphQL. Numeric fields arrive in whatever shape
//! the indexer chose for them: JSON numbers, decimal strings, or `0x`-prefixed hex strings
//! (felts). [`parse_numeric`] folds all three into integers before a [`Chamber`] is built.

use crate::game::types::{Chamber, MAX_CHAMBER_DIM};
use serde_json::Value;
use std::future::Future;
use thiserror::Error;

#[cfg(feature = "net")]
pub mod torii;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IndexerError {
    #[error("chamber {0} not found")]
    NotFound(u32),

    #[error("indexer transport error: {0}")]
    Transport(String),

    #[error("malformed chamber payload: {0}")]
    Malformed(String),
}

/// Read access to chamber models.
pub trait ChamberSource: Send + Sync + 'static {
    fn fetch_chamber(
        &self,
        chamber_id: u32,
    ) -> impl Future<Output = Result<Chamber, IndexerError>> + Send;
}

/// GraphQL document selecting one chamber model by id.
pub fn chamber_query(model_query: &str, chamber_id: u32) -> String {
    format!(
        "query {{ {model_query}(where: {{ chamber_id: {chamber_id} }}) {{ edges {{ node {{ \
         chamber_id map width height start_x start_y exit_x exit_y seed }} }} }} }}"
    )
}

/// Parse a number that may be a JSON integer, a decimal string or a hex string.
pub fn parse_numeric(value: &Value) -> Result<u64, IndexerError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| IndexerError::Malformed(format!("not an unsigned integer: {n}"))),
        Value::String(s) => {
            let s = s.trim();
            let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) if hex.is_empty() => Ok(0),
                Some(hex) => u64::from_str_radix(hex, 16),
                None => s.parse::<u64>(),
            };
            parsed.map_err(|e| IndexerError::Malformed(format!("bad number {s:?}: {e}")))
        }
        other => Err(IndexerError::Malformed(format!(
            "expected number, got {other}"
        ))),
    }
}

fn field_u32(node: &Value, name: &str) -> Result<u32, IndexerError> {
    let raw = node
        .get(name)
        .ok_or_else(|| IndexerError::Malformed(format!("missing field {name}")))?;
    let n = parse_numeric(raw)?;
    u32::try_from(n).map_err(|_| IndexerError::Malformed(format!("{name} out of range: {n}")))
}

/// Build a [`Chamber`] from one model node.
pub fn decode_chamber_node(node: &Value) -> Result<Chamber, IndexerError> {
    let map = match node.get("map") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| parse_numeric(v).map(|n| u8::try_from(n).unwrap_or(u8::MAX)))
            .collect::<Result<Vec<u8>, _>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            return Err(IndexerError::Malformed(format!(
                "map must be an array, got {other}"
            )))
        }
    };
    let seed = match node.get("seed") {
        Some(v) => parse_numeric(v)?,
        None => 0,
    };
    let chamber = Chamber {
        chamber_id: field_u32(node, "chamber_id")?,
        width: field_u32(node, "width")?,
        height: field_u32(node, "height")?,
        map,
        start_x: field_u32(node, "start_x")?,
        start_y: field_u32(node, "start_y")?,
        exit_x: field_u32(node, "exit_x")?,
        exit_y: field_u32(node, "exit_y")?,
        seed,
    };
    if !chamber.has_valid_dimensions() {
        return Err(IndexerError::Malformed(format!(
            "chamber size {}x{} outside 1..={}",
            chamber.width, chamber.height, MAX_CHAMBER_DIM
        )));
    }
    Ok(chamber)
}

/// Pull the chamber out of a full GraphQL response body.
pub fn decode_chamber_response(
    body: &Value,
    model_query: &str,
    chamber_id: u32,
) -> Result<Chamber, IndexerError> {
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if let Some(first) = errors.first() {
            let msg = first
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown GraphQL error");
            return Err(IndexerError::Transport(msg.to_string()));
        }
    }
    let edges = body
        .get("data")
        .and_then(|d| d.get(model_query))
        .and_then(|m| m.get("edges"))
        .and_then(Value::as_array)
        .ok_or_else(|| IndexerError::Malformed(format!("missing data.{model_query}.edges")))?;
    let node = edges
        .iter()
        .find_map(|e| e.get("node"))
        .ok_or(IndexerError::NotFound(chamber_id))?;
    decode_chamber_node(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_in_every_shape() {
        assert_eq!(parse_numeric(&json!(16)).unwrap(), 16);
        assert_eq!(parse_numeric(&json!("16")).unwrap(), 16);
        assert_eq!(parse_numeric(&json!("0x10")).unwrap(), 16);
        assert_eq!(parse_numeric(&json!("0x")).unwrap(), 0);
        assert!(parse_numeric(&json!("0xzz")).is_err());
        assert!(parse_numeric(&json!(-1)).is_err());
        assert!(parse_numeric(&json!(null)).is_err());
    }

    #[test]
    fn decodes_hex_encoded_chamber() {
        let body = json!({
            "data": {
                "echoesOfTheVoidChamberModels": {
                    "edges": [{
                        "node": {
                            "chamber_id": "0x2",
                            "map": ["0x2", "0x0", "0x3", 2],
                            "width": "0x2",
                            "height": 2,
                            "start_x": "0x0",
                            "start_y": "0",
                            "exit_x": "0x1",
                            "exit_y": "0x1",
                            "seed": "0x3039"
                        }
                    }]
                }
            }
        });
        let chamber = decode_chamber_response(&body, "echoesOfTheVoidChamberModels", 2).unwrap();
        assert_eq!(chamber.chamber_id, 2);
        assert_eq!(chamber.width, 2);
        assert_eq!(chamber.map, vec![2, 0, 3, 2]);
        assert_eq!(chamber.seed, 12345);
        assert_eq!((chamber.exit_x, chamber.exit_y), (1, 1));
    }

    #[test]
    fn oversized_or_empty_chamber_is_malformed() {
        let node = |w: u64, h: u64| {
            json!({
                "chamber_id": 1, "map": [], "width": w, "height": h,
                "start_x": 0, "start_y": 0, "exit_x": 0, "exit_y": 0
            })
        };
        assert!(matches!(
            decode_chamber_node(&node(u64::from(u32::MAX), 2)),
            Err(IndexerError::Malformed(_))
        ));
        assert!(matches!(
            decode_chamber_node(&node(16, 257)),
            Err(IndexerError::Malformed(_))
        ));
        assert!(matches!(
            decode_chamber_node(&node(0, 16)),
            Err(IndexerError::Malformed(_))
        ));
        assert_eq!(decode_chamber_node(&node(256, 256)).unwrap().width, 256);
    }

    #[test]
    fn empty_edges_is_not_found() {
        let body = json!({ "data": { "models": { "edges": [] } } });
        assert_eq!(
            decode_chamber_response(&body, "models", 9),
            Err(IndexerError::NotFound(9))
        );
    }

    #[test]
    fn graphql_errors_surface_message() {
        let body = json!({ "errors": [{ "message": "field not found" }] });
        match decode_chamber_response(&body, "models", 1) {
            Err(IndexerError::Transport(msg)) => assert_eq!(msg, "field not found"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn query_names_the_model_and_id() {
        let q = chamber_query("echoesOfTheVoidChamberModels", 4);
        assert!(q.contains("echoesOfTheVoidChamberModels(where: { chamber_id: 4 })"));
        assert!(q.contains("exit_y"));
    }
}
