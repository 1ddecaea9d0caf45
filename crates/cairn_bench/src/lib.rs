//! Benchmark utilities.

use cairn_codec::Value;
use cairn_sync::{Collection, Item};
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Generate a random alphanumeric string of `len` characters.
pub fn random_text(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate an entry payload with `fields` random text fields.
pub fn entry_payload(title: &str, fields: usize) -> Value {
    let mut pairs = vec![
        ("title".to_string(), Value::from(title)),
        ("updated_at".to_string(), Value::from("2024-01-01T00:00:00Z")),
    ];
    pairs.extend((0..fields).map(|i| (format!("field_{i}"), Value::from(random_text(32)))));
    Value::object(pairs)
}

/// Generate a collection of `count` entries.
pub fn entries(count: usize, fields: usize) -> Collection {
    (0..count)
        .map(|i| {
            let title = format!("entry-{i:06}");
            let item = Item::new(title.as_str(), entry_payload(&title, fields));
            (title, item)
        })
        .collect()
}

/// A copy of `collection` where roughly `ratio` of the items carry a
/// different payload.
pub fn perturb(collection: &Collection, ratio: f64) -> Collection {
    let mut rng = rand::thread_rng();
    collection
        .iter()
        .map(|(key, item)| {
            let mut item = item.clone();
            if rng.gen_bool(ratio) {
                item.payload = item.payload.with_field("field_0", Value::from(random_text(32)));
            }
            (key.clone(), item)
        })
        .collect()
}

/// Generate folder paths `depth` levels deep with `width` children each.
pub fn folder_tree(depth: usize, width: usize) -> Vec<String> {
    let mut paths = Vec::new();
    let mut level = vec![String::new()];
    for _ in 0..depth {
        let mut next = Vec::new();
        for parent in &level {
            for i in 0..width {
                let path = if parent.is_empty() {
                    format!("d{i}")
                } else {
                    format!("{parent}/d{i}")
                };
                paths.push(path.clone());
                next.push(path);
            }
        }
        level = next;
    }
    paths
}
