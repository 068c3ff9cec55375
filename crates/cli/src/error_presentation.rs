use std::{io, path::PathBuf};

use miette::Report;
use mylite_core::{ConnectError, OutcomeError};

const FILE_READ_CONTEXT: &str = "while reading script file";
const STDIN_READ_CONTEXT: &str = "while reading script from stdin";
const CONNECT_CONTEXT: &str = "while opening database";
const OUTPUT_CONTEXT: &str = "while writing results";

pub(crate) type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug)]
pub(crate) enum CliError {
    ReadFile {
        path: PathBuf,
        source: io::Error,
    },
    ReadStdin(io::Error),
    Connect {
        database: String,
        source: ConnectError,
    },
    /// Statement `index` (zero-based, in script order) failed.
    Statement {
        index: usize,
        error: OutcomeError,
    },
    WriteOutput(io::Error),
}

pub(crate) fn render_runtime_error(error: CliError) -> String {
    match error {
        CliError::ReadFile { path, source } => {
            let context = format!("{FILE_READ_CONTEXT} `{}`", path.display());
            format!("[io] {}", report_with_context(source, context))
        }
        CliError::ReadStdin(source) => {
            format!("[io] {}", report_with_context(source, STDIN_READ_CONTEXT))
        }
        CliError::Connect { database, source } => {
            let context = format!("{CONNECT_CONTEXT} `{database}`");
            format!("[connect] {}", report_with_context(source, context))
        }
        CliError::Statement { index, error } => {
            let category = error.code.category();
            let context = format!("while running statement {index}");
            let report = report_with_context(anyhow::Error::msg(error.message), context);
            format!("[{category}] {report}")
        }
        CliError::WriteOutput(source) => {
            format!("[io] {}", report_with_context(source, OUTPUT_CONTEXT))
        }
    }
}

fn report_with_context<E, C>(source: E, context: C) -> Report
where
    E: Into<anyhow::Error>,
    C: Into<String>,
{
    let wrapped = source.into().context(context.into());
    miette::miette!("{wrapped:#}")
}

#[cfg(test)]
mod tests {
    use mylite_core::{ErrorCode, OutcomeError};

    use super::{CliError, render_runtime_error};

    #[test]
    fn statement_errors_carry_category_and_context() {
        let rendered = render_runtime_error(CliError::Statement {
            index: 2,
            error: OutcomeError {
                code: ErrorCode::LockContention,
                message: "lock contention: database still busy after 3 attempts during execute"
                    .to_string(),
            },
        });
        assert_eq!(
            rendered,
            "[execute] while running statement 2: lock contention: database still busy after 3 attempts during execute"
        );
    }
}
