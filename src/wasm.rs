//! WebAssembly bindings for the browser-side exporter.
//!
//! # Usage (JavaScript/TypeScript)
//!
//! ```javascript
//! import init, { rewriteRenderedMath, validateNotation, extractMetadata } from '@math-roundtrip/wasm';
//!
//! await init();
//!
//! // Turn KaTeX output back into LaTeX before saving the document
//! const { html, conversions } = rewriteRenderedMath(document.body.innerHTML);
//!
//! // With configuration (TOML)
//! const result = rewriteRenderedMath(fragment, '[rewrite]\ndelimiters = "brackets"');
//!
//! // Check user-entered source
//! const report = validateNotation(textarea.value);
//! if (!report.valid) console.warn(report.issues);
//!
//! // Title, author and outline for the file name and sidebar
//! const meta = extractMetadata(fragment);
//! ```

#![cfg(feature = "wasm")]

use wasm_bindgen::prelude::*;

use crate::config::Config;
use crate::logging::default_logger;
use crate::math::RenderedMathRewriter;
use crate::metadata::MetadataExtractor;
use crate::validate::validate_notation;

// Initialize panic hook for better error messages in console
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn load_config(config_toml: Option<String>) -> Result<Config, JsError> {
    match config_toml {
        Some(text) => Config::from_toml_str(&text).map_err(|e| JsError::new(&e.to_string())),
        None => Ok(Config::default()),
    }
}

/// Replace rendered maths in `fragment` with LaTeX.
///
/// Returns `{ html, conversions, failures, stripped }`. A fragment that cannot
/// be processed comes back unchanged; only invalid configuration is an error.
#[wasm_bindgen(js_name = rewriteRenderedMath)]
pub fn rewrite_rendered_math(fragment: &str, config_toml: Option<String>) -> Result<JsValue, JsError> {
    let config = load_config(config_toml)?;
    let rewriter = RenderedMathRewriter::new(config.rewrite, default_logger());
    let outcome = rewriter.rewrite(fragment);

    serde_wasm_bindgen::to_value(&outcome)
        .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
}

/// Check LaTeX source for unbalanced delimiters and environments.
///
/// Returns `{ valid, issues }`.
#[wasm_bindgen(js_name = validateNotation)]
pub fn validate(source: &str) -> Result<JsValue, JsError> {
    serde_wasm_bindgen::to_value(&validate_notation(source))
        .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
}

/// Extract title, author, date, document class and section outline.
#[wasm_bindgen(js_name = extractMetadata)]
pub fn extract_metadata(source: &str, config_toml: Option<String>) -> Result<JsValue, JsError> {
    let config = load_config(config_toml)?;
    let metadata = MetadataExtractor::new(config.metadata, default_logger()).extract(source);

    serde_wasm_bindgen::to_value(&metadata)
        .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
}

/// Metadata as a pretty-printed JSON string.
#[wasm_bindgen(js_name = metadataToJson)]
pub fn metadata_to_json(source: &str) -> Result<String, JsError> {
    let metadata = MetadataExtractor::default().extract(source);

    serde_json::to_string_pretty(&metadata).map_err(|e| JsError::new(&format!("JSON error: {}", e)))
}

/// Get the library version.
#[wasm_bindgen(js_name = getVersion)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
