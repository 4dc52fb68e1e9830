//! Node bindings.

use napi_derive::napi;
use serde::Serialize;

use crate::{ClassNameMap, CssModulesOptions, CssScopingEngine, HtmlRewriter, ScopingContext};

fn to_napi(err: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(err.to_string())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NativeCssOutput {
    css: String,
    classes: ClassNameMap,
}

/// Returns `{ css, classes }`.
#[napi]
pub fn process_css_modules_native(
    css: String,
    options_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let options: CssModulesOptions = match options_json {
        Some(json) => serde_json::from_str(&json).map_err(to_napi)?,
        None => CssModulesOptions::default(),
    };
    let ctx = ScopingContext::from_options(&options).map_err(to_napi)?;
    let output = CssScopingEngine::new(ctx).process(&css).map_err(to_napi)?;
    let output = NativeCssOutput {
        css: String::from_utf8(output.css).map_err(to_napi)?,
        classes: output.classes,
    };
    serde_json::to_value(output).map_err(to_napi)
}

#[napi]
pub fn process_html_native(html: String, classes_json: String) -> napi::Result<String> {
    let classes = ClassNameMap::from_json(&classes_json).map_err(to_napi)?;
    let html = HtmlRewriter::new(&classes).rewrite(&html).map_err(to_napi)?;
    String::from_utf8(html).map_err(to_napi)
}
