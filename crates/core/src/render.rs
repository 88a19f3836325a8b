//! Cross-step SQL templating.
//!
//! `{{step.<name>.<column>}}` placeholders are replaced with the value of
//! the named column in the first row of a previously executed step, rendered
//! as a SQL literal. Substitution is verbatim; the inserted text is never
//! re-scanned for further placeholders.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{EngineError, Result};
use crate::model::Row;

lazy_static! {
    static ref STEP_REF_RE: Regex =
        Regex::new(r"\{\{step\.(\w+)\.(\w+)\}\}").expect("valid regex");
}

/// Render a step's SQL template against previously collected step results.
pub fn render_sql(template: &str, collected: &BTreeMap<String, Vec<Row>>) -> Result<String> {
    let mut output = String::with_capacity(template.len());
    let mut last_end = 0;

    for caps in STEP_REF_RE.captures_iter(template) {
        let whole = caps.get(0).expect("capture 0 always present");
        let step = &caps[1];
        let column = &caps[2];

        let first_row = collected
            .get(step)
            .and_then(|rows| rows.first())
            .ok_or_else(|| EngineError::UnresolvedStepReference {
                step: step.to_string(),
            })?;

        let value = first_row
            .get(column)
            .ok_or_else(|| EngineError::UnknownColumn {
                step: step.to_string(),
                column: column.to_string(),
            })?;

        output.push_str(&template[last_end..whole.start()]);
        output.push_str(&value.sql_literal());
        last_end = whole.end();
    }

    output.push_str(&template[last_end..]);
    Ok(output)
}
