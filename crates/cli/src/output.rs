use std::io::{self, Write};

use mylite_core::{ExecutionOutcome, ReturnValue, Row, Value};

/// Prints one statement's result: a tab-separated table for row results,
/// otherwise the affected row count.
pub(crate) fn write_outcome(out: &mut impl Write, outcome: &ExecutionOutcome) -> io::Result<()> {
    match outcome.return_value() {
        ReturnValue::Rows(rows) => write_rows(out, rows),
        ReturnValue::Affected(count) => {
            let noun = if count == 1 { "row" } else { "rows" };
            writeln!(out, "Query OK, {count} {noun} affected")
        }
        ReturnValue::Success(_) => writeln!(out, "Query OK"),
    }
}

fn write_rows(out: &mut impl Write, rows: &[Row]) -> io::Result<()> {
    let Some(first) = rows.first() else {
        return writeln!(out, "Empty set");
    };
    writeln!(out, "{}", first.columns().collect::<Vec<_>>().join("\t"))?;
    for row in rows {
        let cells = row
            .iter()
            .map(|(_, value)| cell(value))
            .collect::<Vec<_>>();
        writeln!(out, "{}", cells.join("\t"))?;
    }
    Ok(())
}

fn cell(value: &Value) -> String {
    value.display_string().unwrap_or_else(|| "NULL".to_string())
}
