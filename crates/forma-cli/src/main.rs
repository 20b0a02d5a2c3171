use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process;

use forma_core::{Diagnostic, Severity};

/// Forma — hub schema language CLI
///
/// Parse, validate, fingerprint, and merge Forma hub models.
#[derive(Parser)]
#[command(name = "forma", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a hub file and print the raw IR as JSON
    Parse {
        /// Path to .forma file
        file: PathBuf,
    },

    /// Validate a hub file (structure, composition, types)
    Validate {
        /// Path to .forma file
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute the semantic fingerprint (SHA-256) of a hub file
    Hash {
        /// Path to .forma file
        file: PathBuf,
    },

    /// Merge YAML satellite documents over a hub model and print JSON
    Merge {
        /// Path to the hub .forma file
        hub: PathBuf,
        /// Satellite YAML files, applied in order
        satellites: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Parse { file } => cmd_parse(&file),
        Commands::Validate { file, json } => cmd_validate(&file, json),
        Commands::Hash { file } => cmd_hash(&file),
        Commands::Merge { hub, satellites } => cmd_merge(&hub, &satellites),
    };

    process::exit(exit_code);
}

// ── Subcommands ────────────────────────────────────────────

fn cmd_parse(file: &Path) -> i32 {
    let Some(source) = read_source(file) else {
        return 2;
    };
    match forma_core::parse(&source) {
        Ok(model) => match serde_json::to_string_pretty(&model) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                eprintln!("error: cannot serialize model: {}", e);
                1
            }
        },
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            1
        }
    }
}

fn cmd_validate(file: &Path, json: bool) -> i32 {
    let Some(source) = read_source(file) else {
        return 2;
    };
    let model = match forma_core::parse(&source) {
        Ok(model) => model,
        Err(e) => {
            if json {
                let report = serde_json::json!({
                    "valid": false,
                    "diagnostics": [{
                        "code": e.code,
                        "severity": "error",
                        "message": e.message,
                        "line": e.line,
                        "column": e.column,
                    }],
                });
                print_json(&report);
            } else {
                eprintln!("{}", e.to_string().red());
            }
            return 1;
        }
    };

    let (expanded, mut diagnostics) = forma_core::validate(&model);
    sort_diagnostics(&mut diagnostics);
    let valid = forma_core::is_valid(&diagnostics);

    if json {
        let report = serde_json::json!({
            "valid": valid,
            "diagnostics": diagnostics,
            "expanded": expanded,
        });
        print_json(&report);
    } else {
        for diagnostic in &diagnostics {
            print_diagnostic(diagnostic);
        }
        print_summary(&model, &diagnostics, valid);
    }

    if valid {
        0
    } else {
        1
    }
}

fn cmd_hash(file: &Path) -> i32 {
    let Some(source) = read_source(file) else {
        return 2;
    };
    match forma_core::parse(&source) {
        Ok(model) => {
            println!("{}", forma_core::canon::fingerprint(&model));
            0
        }
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            1
        }
    }
}

fn cmd_merge(hub: &Path, satellites: &[PathBuf]) -> i32 {
    let Some(source) = read_source(hub) else {
        return 2;
    };
    let model = match forma_core::parse(&source) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            return 1;
        }
    };

    // A broken hub must not be silently papered over by satellites.
    let (_, mut diagnostics) = forma_core::validate(&model);
    sort_diagnostics(&mut diagnostics);
    if !forma_core::is_valid(&diagnostics) {
        for diagnostic in &diagnostics {
            print_diagnostic(diagnostic);
        }
        eprintln!("{}", "hub model is invalid; not merging".red());
        return 1;
    }

    let base = match serde_json::to_value(&model) {
        Ok(value) => value,
        Err(e) => {
            eprintln!("error: cannot serialize model: {}", e);
            return 1;
        }
    };

    let mut docs = vec![base];
    for path in satellites {
        let Some(text) = read_source(path) else {
            return 2;
        };
        match serde_yml::from_str::<serde_json::Value>(&text) {
            Ok(doc) => docs.push(doc),
            Err(e) => {
                eprintln!("error: {}: invalid YAML: {}", path.display(), e);
                return 1;
            }
        }
    }

    print_json(&forma_core::overlay::merge(&docs));
    0
}

// ── Output helpers ─────────────────────────────────────────

fn read_source(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(source) => Some(source),
        Err(e) => {
            eprintln!("error: cannot read {}: {}", path.display(), e);
            None
        }
    }
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("error: cannot serialize output: {}", e),
    }
}

/// Diagnostics without a source span sort before positioned ones.
fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by_key(|d| {
        d.span
            .as_ref()
            .map(|s| (1, s.line, s.column))
            .unwrap_or((0, 0, 0))
    });
}

fn print_diagnostic(diagnostic: &Diagnostic) {
    let label = format!("{}[{}]", diagnostic.severity, diagnostic.code);
    let label = match diagnostic.severity {
        Severity::Error => label.red().bold(),
        Severity::Warning => label.yellow().bold(),
    };
    println!("{}: {}", label, diagnostic.message);
    match &diagnostic.span {
        Some(span) => println!("  --> {} (at {})", diagnostic.location, span),
        None => println!("  --> {}", diagnostic.location),
    }
}

fn print_summary(model: &forma_core::Model, diagnostics: &[Diagnostic], valid: bool) {
    let errors = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warnings = diagnostics.len() - errors;
    let (name, version) = model
        .meta
        .as_ref()
        .map(|m| (m.name.as_str(), m.version.as_str()))
        .unwrap_or(("<unnamed>", "?"));

    if valid {
        println!(
            "{} Model \"{}\" v{} is valid ({} warning(s)).",
            "[OK]".green().bold(),
            name,
            version,
            warnings
        );
    } else {
        println!(
            "{} Model \"{}\" v{} is invalid: {} error(s), {} warning(s).",
            "[FAIL]".red().bold(),
            name,
            version,
            errors,
            warnings
        );
    }
}
