//! Fixed bundletool configuration.
//!
//! See bundletool's `config.proto`. Splits:
//! - ABI: on, so a device only receives one set of native libraries.
//! - LANGUAGE: off, the game engine does not keep localized strings as
//!   Android resources.
//! - SCREEN_DENSITY: off, there are no per-density resources besides icons.
//!
//! Native libraries stay compressed.

use serde_json::{Value, json};

pub fn bundle_config() -> Value {
    json!({
        "optimizations": {
            "splitsConfig": {
                "splitDimension": [
                    { "value": "ABI", "negate": false },
                    { "value": "LANGUAGE", "negate": true },
                    { "value": "SCREEN_DENSITY", "negate": true }
                ]
            },
            "uncompressNativeLibraries": { "enabled": false }
        }
    })
}

/// Pretty-printed document written next to the module archives.
pub fn bundle_config_json() -> String {
    // Serializing a `Value` cannot fail.
    serde_json::to_string_pretty(&bundle_config()).unwrap_or_default()
}
