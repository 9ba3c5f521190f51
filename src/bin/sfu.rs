use std::process::ExitCode;

use sfu::commands::{extract, ExtractRequest, Operation};
use sfu::observability;
use sfu::SfuConfig;

const USAGE: &str = "Usage: sfu <operation> <uri> [--safe|--unsafe]\n\
Operations: credentials, configuration, connection, db, warehouse, table, to_string";

fn main() -> ExitCode {
    let config = match SfuConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::from(2);
        }
    };
    observability::init_tracing(&config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let request = match parse_args(&args) {
        Ok(Some(request)) => request,
        Ok(None) => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("{}\n{}", message, USAGE);
            return ExitCode::from(2);
        }
    };

    let response = extract(&request, &config);
    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize response: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Returns `Ok(None)` when help was requested.
fn parse_args(args: &[String]) -> Result<Option<ExtractRequest>, String> {
    let mut safe = None;
    let mut positional = Vec::new();

    for arg in args {
        match arg.as_str() {
            "--safe" => safe = Some(true),
            "--unsafe" => safe = Some(false),
            "-h" | "--help" => return Ok(None),
            flag if flag.starts_with("--") => return Err(format!("Unknown flag '{}'", flag)),
            _ => positional.push(arg.as_str()),
        }
    }

    match positional.as_slice() {
        [operation, uri] => Ok(Some(ExtractRequest {
            uri: uri.to_string(),
            operation: operation.parse::<Operation>()?,
            safe,
        })),
        _ => Err(format!("Expected 2 arguments, got {}", positional.len())),
    }
}
