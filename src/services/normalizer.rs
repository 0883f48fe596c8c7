use crate::api::error::{AppError, ErrorKind};
use crate::models::UploadOutcome;
use serde_json::Value;

/// Maps whatever a storage client produced into an [`UploadOutcome`].
///
/// Accepted shapes: `{error}`, `{rootHash, totalChunks, txHash}`, a bare
/// identifier, the legacy `[result, error]` pair, or an `Err`. Anything
/// absent or falsy is a failure. Unrecognised fields are dropped.
pub fn normalize(raw: anyhow::Result<Value>) -> UploadOutcome {
    match raw {
        Ok(value) => normalize_value(&value),
        Err(err) => match err.downcast_ref::<AppError>() {
            Some(app_err) => UploadOutcome::Failure {
                kind: app_err.kind(),
                message: app_err.message(),
            },
            None => failure(err.to_string()),
        },
    }
}

fn normalize_value(value: &Value) -> UploadOutcome {
    if !is_truthy(value) {
        return failure("Upload returned no result".to_string());
    }

    match value {
        Value::Object(map) => {
            if let Some(error) = map.get("error").filter(|e| is_truthy(e)) {
                return failure(value_to_message(error));
            }
            UploadOutcome::Success {
                root_hash: map.get("rootHash").and_then(as_identifier),
                chunk_count: map.get("totalChunks").and_then(as_count),
                transaction_hash: map.get("txHash").and_then(as_identifier),
            }
        }
        Value::Array(items) => {
            if let Some(error) = items.get(1).filter(|e| is_truthy(e)) {
                return failure(value_to_message(error));
            }
            match items.first() {
                Some(result) => normalize_value(result),
                None => failure("Upload returned no result".to_string()),
            }
        }
        other => UploadOutcome::Success {
            root_hash: as_identifier(other),
            chunk_count: None,
            transaction_hash: None,
        },
    }
}

fn failure(message: String) -> UploadOutcome {
    UploadOutcome::Failure {
        kind: ErrorKind::DownstreamError,
        message,
    }
}

/// Loose truthiness, matching how storage SDK results are usually checked.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn value_to_message(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

fn as_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
