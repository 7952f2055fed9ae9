//! WASM bindings
//!
//! Browser-facing surface of the pipeline. Rendering happens host-side
//! (the page owns the math engine and the layout), so the bindings expose
//! the sanitize stage plus a convenience full render with the built-in
//! renderers.

use wasm_bindgen::prelude::*;

use crate::core::sanitize::{gatekeeper, sanitize, SanitizeOptions};
use crate::utils::diagnostics::Diagnostic;

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct WasmDiagnostic {
    level: String,
    message: String,
    construct: Option<String>,
    offset: Option<usize>,
}

impl From<&Diagnostic> for WasmDiagnostic {
    fn from(d: &Diagnostic) -> Self {
        Self {
            level: d.level.to_string(),
            message: d.message.clone(),
            construct: d.construct.clone(),
            offset: d.offset,
        }
    }
}

/// Result payload of [`sanitize_document`].
#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct SanitizeResult {
    success: bool,
    reduced: Option<String>,
    blocks: Option<std::collections::HashMap<String, String>>,
    bibliography: Option<String>,
    title: Option<String>,
    error: Option<String>,
    diagnostics: Vec<WasmDiagnostic>,
}

fn to_js(value: &impl serde::Serialize) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or(JsValue::NULL)
}

/// Sanitize generated markup into reduced markup plus a block table.
///
/// The host typesets the reduced markup with its own engine and splices
/// the returned blocks back in at their tokens. A failed integrity check
/// on the reduced markup still hands the host the reduced markup and the
/// diagnostics, with `success: false` and the error message set.
#[wasm_bindgen(js_name = sanitizeDocument)]
pub fn sanitize_document(input: &str) -> JsValue {
    console_error_panic_hook::set_once();
    let doc = sanitize(input);
    let integrity = gatekeeper::check_balance(&doc.reduced, doc.balance_tolerance);
    to_js(&SanitizeResult {
        success: integrity.is_ok(),
        reduced: Some(doc.reduced),
        blocks: Some(doc.blocks.into_iter().collect()),
        bibliography: doc.bibliography,
        title: doc.meta.title,
        error: integrity.err().map(|e| e.message()),
        diagnostics: doc.diagnostics.iter().map(WasmDiagnostic::from).collect(),
    })
}

/// Sanitize and render to a full HTML preview with the built-in renderers.
#[wasm_bindgen(js_name = sanitizeToHtml)]
pub fn sanitize_to_html(input: &str) -> JsValue {
    console_error_panic_hook::set_once();
    #[derive(serde::Serialize)]
    #[serde(rename_all = "camelCase")]
    struct HtmlResult {
        success: bool,
        html: Option<String>,
        error: Option<String>,
    }
    match crate::sanitize_to_html(input) {
        Ok(html) => to_js(&HtmlResult {
            success: true,
            html: Some(html),
            error: None,
        }),
        Err(e) => to_js(&HtmlResult {
            success: false,
            html: None,
            error: Some(e.message()),
        }),
    }
}

/// Run only the integrity gatekeeper. Returns an error message, or null
/// when the document passes.
#[wasm_bindgen(js_name = checkIntegrity)]
pub fn check_integrity(input: &str) -> Option<String> {
    console_error_panic_hook::set_once();
    crate::check_integrity(input).err().map(|e| e.message())
}

/// Gatekeeper tolerance of the default configuration, exposed so hosts can
/// show it in messaging.
#[wasm_bindgen(js_name = balanceTolerance)]
pub fn balance_tolerance() -> usize {
    SanitizeOptions::default().balance_tolerance
}

/// Library version.
#[wasm_bindgen(js_name = getVersion)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
