//! Layered configuration merge
//!
//! Later layers win for scalars and sequences; mappings present on both
//! sides merge key by key. Key order is first-seen order, so a key keeps
//! the position of the earliest layer that defined it.

use serde_json::{Map, Value};

/// A single configuration layer
pub type Layer = Map<String, Value>;

/// Deep-merge `layers` in order into a fresh mapping
pub fn merge_layers<'a, I>(layers: I) -> Layer
where
    I: IntoIterator<Item = &'a Layer>,
{
    let mut merged = Layer::new();
    for layer in layers {
        merge_into(&mut merged, layer);
    }
    merged
}

/// Deep-merge `overlay` on top of `base`
pub fn merge_into(base: &mut Layer, overlay: &Layer) {
    for (key, value) in overlay {
        if let (Some(Value::Object(existing)), Value::Object(incoming)) = (base.get_mut(key), value)
        {
            merge_into(existing, incoming);
            continue;
        }
        // Replacing an existing key keeps its position
        base.insert(key.clone(), value.clone());
    }
}
