use crate::compute::{Source, TraceEntry};
use crate::store::VariableCatalog;
use crate::type_system::Value;
use std::fmt::Write;

/// Renders a computation log as an indented tree, one block per top-level request.
///
/// ```text
/// REQUEST #1
/// --------------------------------------------------
/// [L0] salaire_net<individu:1>@2024-01 = 1560 (formula since 2015-01-01)
/// |-- [L1] salaire_brut<individu:1>@2024-01 = 2000 (input)
/// ```
pub fn format_log(catalog: &VariableCatalog, entries: &[TraceEntry]) -> String {
    let mut output = String::new();
    let mut current_request = None;

    for entry in entries {
        if current_request != Some(entry.request) {
            if current_request.is_some() {
                output.push('\n');
            }
            current_request = Some(entry.request);
            let _ = writeln!(output, "REQUEST #{}", entry.request);
            let _ = writeln!(output, "--------------------------------------------------");
        }

        let prefix = if entry.depth == 0 {
            String::new()
        } else {
            format!("{}|-- ", "|   ".repeat(entry.depth - 1))
        };
        let value = match &entry.value {
            Some(value) => render(catalog, &entry.key.variable, value),
            None => "<failed>".to_string(),
        };
        let _ = writeln!(output, "{}[L{}] {} = {} ({})", prefix, entry.depth, entry.key, value, describe(entry.source));
    }
    output
}

fn render(catalog: &VariableCatalog, variable: &str, value: &Value) -> String {
    match catalog.get(variable) {
        Some(variable) => variable.render(value),
        None => value.to_string(),
    }
}

fn describe(source: Source) -> String {
    match source {
        Source::Formula(start) if start == crate::store::FORMULA_INCEPTION => "formula".to_string(),
        Source::Formula(start) => format!("formula since {}", start),
        Source::Cache => "cached".to_string(),
        Source::Input => "input".to_string(),
        Source::Default => "default".to_string(),
    }
}
