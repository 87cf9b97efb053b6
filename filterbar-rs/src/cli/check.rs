//! Schema and expression validation commands.

use crate::cli::args::{CheckArgs, CheckSchemaArgs};
use crate::cli::output::Output;
use crate::cli::load_schema;
use crate::config::Config;
use crate::error::{ExitCode, Result};
use crate::serialize::{deserialize, load_serialized};
use crate::validate::{validate_expressions, validate_schema, ValidationReport};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct CheckResponse {
    error_count: usize,
    #[serde(flatten)]
    report: ValidationReport,
}

fn respond(report: ValidationReport, output: &Output) -> Result<bool> {
    let valid = report.valid;
    let response = CheckResponse {
        error_count: report.errors.len(),
        report,
    };
    output.print(&response)?;
    Ok(valid)
}

/// `filterbar check-schema <schema>`
pub fn check_schema(config: &Config, args: &CheckSchemaArgs, output: &Output) -> Result<ExitCode> {
    let schema = load_schema(config, args.schema.as_deref())?;
    let report = validate_schema(&schema);
    if respond(report, output)? {
        output.info("Schema is valid");
        Ok(ExitCode::Success)
    } else {
        Ok(ExitCode::SchemaInvalid)
    }
}

/// `filterbar check <expressions> --schema <schema>`
pub fn check(config: &Config, args: &CheckArgs, output: &Output) -> Result<ExitCode> {
    let schema = load_schema(config, args.schema.as_deref())?;
    let serialized = load_serialized(&args.expressions)?;
    let expressions = deserialize(&serialized, &schema)?;
    let report = validate_expressions(&expressions, &schema);
    if respond(report, output)? {
        output.info("Expressions are valid");
        Ok(ExitCode::Success)
    } else {
        Ok(ExitCode::ExpressionsInvalid)
    }
}
