//! Digests used as cache keys.
//!
//! Two functions, not interchangeable: [`webhook_fingerprint`] identifies an
//! event delivery, [`content_fingerprint`] identifies a downloaded file.

use crate::domain::{Fingerprint, PipefyId};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncReadExt;
use tracing::warn;

/// Bytes read per step while hashing a file
pub const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Serialize a JSON value with object keys sorted at every level and no
/// insignificant whitespace.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, field)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(field, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// `sha256(card_id | canonical_json(payload))` as lowercase hex.
///
/// Any change in the payload, timestamps included, yields a new fingerprint.
pub fn webhook_fingerprint(card_id: &PipefyId, payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(card_id.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(canonical_json(payload).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash a file's full content, falling back to a [`Fingerprint::Unique`]
/// when it cannot be read.
pub async fn content_fingerprint(path: &Path) -> Fingerprint {
    match hash_file(path).await {
        Ok(hex) => Fingerprint::Content(hex),
        Err(e) => {
            warn!(
                "Could not hash {}: {}. Using a unique fingerprint",
                path.display(),
                e
            );
            unique_fingerprint(path, e.to_string())
        }
    }
}

async fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_CHUNK_BYTES];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Fingerprint that matches nothing previously seen
pub fn unique_fingerprint(path: &Path, reason: impl Into<String>) -> Fingerprint {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(uuid::Uuid::new_v4().as_bytes());

    Fingerprint::Unique {
        key: format!("{:x}", hasher.finalize()),
        reason: reason.into(),
    }
}
