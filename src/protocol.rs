//! In-page result protocol
//!
//! The script evaluated inside the host page. It awaits the loader's module factory, calls the module's
//! `run_tests()`, prints a banner around the outcome and hands the integer status back to the harness.
//! The banners are for humans reading the console; only the returned value is the contract.

use serde_json::Value;

use crate::config::ArtifactLayout;
use crate::error::{HarnessError, HarnessResult};

/// Width of the banner rules printed around the suite.
const RULE_WIDTH: usize = 60;

/// The script the browser driver evaluates for one layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolScript {
    entry_point: String,
    suite_label: String,
}

impl ProtocolScript {
    /// `layout.entry_point` is emitted as a bare identifier and must be a valid JavaScript identifier.
    pub fn new(layout: &ArtifactLayout) -> Self {
        Self {
            entry_point: layout.entry_point.clone(),
            suite_label: layout.suite_label.clone(),
        }
    }

    /// The async arrow function, as source text.
    pub fn function_source(&self) -> String {
        let header = js_string(&format!("{}:", self.suite_label));
        let passed = js_string(&format!("{} PASSED", self.suite_label));
        let failed = js_string(&format!("{} FAILED", self.suite_label));
        format!(
            r#"async () => {{
    const testModule = await {entry}();
    const rule = "*".repeat({width});
    console.log("\n\n" + rule);
    console.log({header});
    console.log(rule);
    const status = testModule.run_tests();
    if (status == 0) {{
        console.log("\n\n" + rule);
        console.log({passed});
        console.log(rule);
    }} else {{
        console.log(rule);
        console.log({failed});
        console.log(rule);
    }}
    return status;
}}"#,
            entry = self.entry_point,
            width = RULE_WIDTH,
        )
    }

    /// Expression that invokes the function; its value is a promise of the status.
    pub fn expression(&self) -> String {
        format!("({})()", self.function_source())
    }
}

/// Quote `text` as a JavaScript string literal.
fn js_string(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

/// Decode the value returned by the page into the suite's status.
///
/// Integers pass through, finite floats are truncated toward zero and strings holding an integer are parsed.
/// Anything else is `InvalidResult`.
pub fn decode_status(value: &Value) -> HarnessResult<i64> {
    let invalid = || HarnessError::InvalidResult(value.to_string());
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                Some(f) if f.is_finite() => Ok(f.trunc() as i64),
                _ => Err(invalid()),
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}
