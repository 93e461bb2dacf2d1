//! Output formatting for the CLI.

use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print a serializable value: pretty JSON, or `text` as given.
pub fn print<T: Serialize>(value: &T, text: impl FnOnce(&T) -> String, format: &OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", text(value)),
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", text(value)),
        },
    }
}

/// One JSON document per line, for streamed output.
pub fn print_line<T: Serialize>(value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        println!("{}", json);
    }
}

pub fn print_success(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", message),
        OutputFormat::Json => {
            let json = serde_json::json!({ "status": "success", "message": message });
            println!("{}", json);
        }
    }
}

pub fn print_error(message: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => {
            let json = serde_json::json!({ "status": "error", "message": message });
            eprintln!("{}", json);
        }
    }
}

/// Print a table row.
pub fn print_row(label: &str, value: &str) {
    println!("{:<12} {}", format!("{}:", label), value);
}
