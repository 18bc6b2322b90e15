//! CLI tool for xlimport - imports a spreadsheet and outputs JSON
//!
//! Usage:
//!   xlimport_cli <input.xlsx|xls|csv>              # Output JSON to stdout
//!   xlimport_cli <input.xlsx|xls|csv> -o out.json  # Output JSON to file

#![allow(clippy::exit)]
#![allow(clippy::indexing_slicing)]

use std::env;
use std::fs;
use std::io::{self, Write};
use xlimport::{import, ImportOptions, InputKind};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: xlimport_cli <input.xlsx|xls|csv> [-o output.json]");
        std::process::exit(1);
    }

    let input_path = &args[1];
    let output_path = if args.len() > 3 && args[2] == "-o" {
        Some(&args[3])
    } else {
        None
    };

    let Some(kind) = InputKind::from_extension(input_path) else {
        eprintln!("Unsupported file type: {input_path}");
        std::process::exit(1);
    };

    // Read input file
    let data = match fs::read(input_path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error reading {input_path}: {e}");
            std::process::exit(1);
        }
    };

    let result = match import(&data, kind, &ImportOptions::default()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error importing {}: {e}", kind.as_str());
            std::process::exit(1);
        }
    };

    // Serialize to JSON
    let json = match serde_json::to_string_pretty(&result) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error serializing JSON: {e}");
            std::process::exit(1);
        }
    };

    // Output
    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(path, &json) {
                eprintln!("Error writing {path}: {e}");
                std::process::exit(1);
            }
            eprintln!(
                "Written: {path} ({} sheets, {} warnings)",
                result.snapshot.sheet_order.len(),
                result.warnings.len()
            );
        }
        None => {
            let mut stdout = io::stdout().lock();
            if stdout
                .write_all(json.as_bytes())
                .and_then(|()| stdout.write_all(b"\n"))
                .is_err()
            {
                std::process::exit(1);
            }
        }
    }
}
