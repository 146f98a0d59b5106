use crate::types::{FeedItem, PipelineError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, error, info};

/// Maps raw feed records (`{"node": {...}}`) onto [`FeedItem`]s.
///
/// Required: `node`, `node.id`, `node.link`, `node.user.id`,
/// `node.user.username`. Anything else is optional.
pub struct ItemNormalizer;

impl ItemNormalizer {
    pub fn normalize(raw: &Value) -> Result<FeedItem> {
        let node = raw
            .get("node")
            .and_then(Value::as_object)
            .ok_or_else(|| malformed("node"))?;

        let id = required_id(node, "id", "node.id")?;
        let link = required_str(node, "link", "node.link")?;

        let user = node
            .get("user")
            .and_then(Value::as_object)
            .ok_or_else(|| malformed("node.user.id"))?;
        let user_id = required_id(user, "id", "node.user.id")?;
        let username = required_str(user, "username", "node.user.username")?;

        // Absent or null means a still image
        let is_video = node.get("is_video").and_then(Value::as_bool).unwrap_or(false);

        let images = match node.get("images") {
            Some(Value::Object(images)) => extract_images(images),
            _ => BTreeMap::new(),
        };

        Ok(FeedItem::new(id, link, is_video, images, user_id, username))
    }

    /// Normalizes a whole batch. The first malformed record fails the batch.
    pub fn normalize_batch(raw_records: &[Value]) -> Result<Vec<FeedItem>> {
        debug!("Normalizing {} feed records", raw_records.len());

        let mut items = Vec::with_capacity(raw_records.len());
        for (index, raw) in raw_records.iter().enumerate() {
            match Self::normalize(raw) {
                Ok(item) => items.push(item),
                Err(e) => {
                    error!("Feed record {} rejected: {}", index, e);
                    return Err(e);
                }
            }
        }

        info!("Normalized {} feed items", items.len());
        Ok(items)
    }
}

fn malformed(field: &str) -> PipelineError {
    PipelineError::MalformedRecord {
        field: field.to_string(),
    }
}

fn required_str(object: &Map<String, Value>, key: &str, field: &str) -> Result<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed(field))
}

/// Ids show up as strings or as bare integers depending on the feed version.
fn required_id(object: &Map<String, Value>, key: &str, field: &str) -> Result<String> {
    match object.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(malformed(field)),
    }
}

fn extract_images(images: &Map<String, Value>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (resolution, entry) in images {
        let url = match entry {
            Value::Object(fields) => fields.get("url").and_then(Value::as_str),
            Value::String(url) => Some(url.as_str()),
            _ => None,
        };
        match url {
            Some(url) => {
                out.insert(resolution.clone(), url.to_string());
            }
            None => debug!("Ignoring image entry without url: {}", resolution),
        }
    }
    out
}
