//! Conversion commands between the wire format, query strings and display
//! strings.

use crate::cli::args::{ConvertArgs, ConvertTarget, ParseQueryArgs};
use crate::cli::load_schema;
use crate::cli::output::Output;
use crate::config::Config;
use crate::error::{ExitCode, Result};
use crate::serialize::{
    deserialize, from_query_string, load_serialized, serialize, to_display_string, to_query_string,
};

/// `filterbar convert <expressions> --to wire|query|display`
pub fn convert(config: &Config, args: &ConvertArgs, output: &Output) -> Result<ExitCode> {
    let schema = load_schema(config, args.schema.as_deref())?;
    let serialized = load_serialized(&args.expressions)?;
    let expressions = deserialize(&serialized, &schema)?;

    match args.to {
        ConvertTarget::Wire => {
            output.print(&serialize(&expressions, Some(&schema)))?;
        }
        ConvertTarget::Query => {
            output.print_raw(&to_query_string(&expressions));
        }
        ConvertTarget::Display => {
            output.print_raw(&to_display_string(&expressions, None));
        }
    }
    Ok(ExitCode::Success)
}

/// `filterbar parse-query <querystring>`
pub fn parse_query(config: &Config, args: &ParseQueryArgs, output: &Output) -> Result<ExitCode> {
    let schema = load_schema(config, args.schema.as_deref())?;
    let expressions = from_query_string(&args.query, &schema);
    output.print(&serialize(&expressions, Some(&schema)))?;
    Ok(ExitCode::Success)
}
