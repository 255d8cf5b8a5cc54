//! Strata resolver CLI.
//!
//! Provides the `strata` binary. A manifest lists the documents of one
//! program; `types` prints the resolved types and `faults` prints the
//! committed faults, both as JSON on stdout.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use strata_core::Uri;
use strata_resolve::{Program, ProgramOptions, ResolveError, Type};

/// Strata type resolution tools.
#[derive(Parser)]
#[command(name = "strata", about = "Strata type resolution tools")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print resolved types as JSON.
    Types {
        /// Path to the manifest file.
        manifest: PathBuf,

        /// Print only the type at this URI.
        #[arg(short, long)]
        uri: Option<String>,
    },
    /// Print the faults of the program as JSON.
    Faults {
        /// Path to the manifest file.
        manifest: PathBuf,
    },
}

/// A program description read from disk.
#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    options: ProgramOptions,
    documents: Vec<ManifestDocument>,
}

#[derive(Debug, Deserialize)]
struct ManifestDocument {
    uri: String,
    text: String,
}

/// The printed form of one type.
#[derive(Debug, Serialize, PartialEq)]
struct TypeReport {
    name: String,
    uri: String,
    specified: bool,
    bases: Vec<String>,
    contents: Vec<String>,
    values: Vec<String>,
}

impl TypeReport {
    fn new(ty: &Rc<Type>) -> Result<Self, ResolveError> {
        let uris = |types: Vec<Rc<Type>>| -> Vec<String> {
            types.iter().map(|t| t.uri().to_string()).collect()
        };
        Ok(TypeReport {
            name: ty.name().to_string(),
            uri: ty.uri().to_string(),
            specified: ty.is_specified(),
            bases: uris(ty.bases()?),
            contents: uris(ty.contents()?),
            values: ty.values()?,
        })
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match cli.command {
        Commands::Types { manifest, uri } => run_types(&manifest, uri.as_deref()),
        Commands::Faults { manifest } => run_faults(&manifest),
    };
    process::exit(exit_code);
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Read a manifest and load its documents into a new program.
fn load(path: &Path) -> Result<Program, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read manifest '{}': {}", path.display(), e))?;
    let manifest: Manifest = serde_json::from_str(&text)
        .map_err(|e| format!("invalid manifest '{}': {}", path.display(), e))?;
    build(manifest)
}

fn build(manifest: Manifest) -> Result<Program, String> {
    let program = Program::new(manifest.options);
    for doc in &manifest.documents {
        let uri = Uri::parse(&doc.uri).map_err(|e| e.to_string())?;
        program
            .create_document(&uri, &doc.text)
            .map_err(|e| format!("failed to load '{}': {}", doc.uri, e))?;
    }
    tracing::debug!(documents = manifest.documents.len(), "manifest loaded");
    Ok(program)
}

/// Collect every type reachable from the document roots through contents,
/// in document order.
fn collect_types(program: &Program) -> Result<Vec<TypeReport>, ResolveError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut reports = Vec::new();
    for document in program.documents() {
        let mut stack: Vec<Rc<Type>> = program.construct_roots(document)?;
        stack.reverse();
        while let Some(ty) = stack.pop() {
            if !seen.insert(ty.uri().to_string()) {
                continue;
            }
            reports.push(TypeReport::new(&ty)?);
            let mut contents = ty.contents()?;
            contents.reverse();
            stack.extend(contents);
        }
    }
    Ok(reports)
}

/// Execute the types subcommand.
///
/// Returns exit code: 0 = success, 1 = resolution error or unknown type,
/// 3 = I/O or manifest error.
fn run_types(manifest: &Path, uri: Option<&str>) -> i32 {
    let program = match load(manifest) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return 3;
        }
    };

    let reports = match uri {
        Some(text) => {
            let uri = match Uri::parse(text) {
                Ok(u) => u,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return 3;
                }
            };
            match program.construct(&uri).and_then(|t| t.map(|t| TypeReport::new(&t)).transpose()) {
                Ok(Some(report)) => vec![report],
                Ok(None) => {
                    eprintln!("Error: no type at '{}'", text);
                    return 1;
                }
                Err(e) => {
                    eprintln!("Resolution error: {}", e);
                    return 1;
                }
            }
        }
        None => match collect_types(&program) {
            Ok(reports) => reports,
            Err(e) => {
                eprintln!("Resolution error: {}", e);
                return 1;
            }
        },
    };

    print_json(&reports);
    0
}

/// Execute the faults subcommand.
///
/// Returns exit code: 0 = no faults, 1 = faults present,
/// 3 = I/O or manifest error.
fn run_faults(manifest: &Path) -> i32 {
    let program = match load(manifest) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return 3;
        }
    };

    let faults = program.faults();
    for fault in &faults {
        eprintln!("  - {}", fault);
    }
    print_json(&faults);
    if faults.is_empty() {
        0
    } else {
        1
    }
}

fn print_json<T: Serialize>(value: &T) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize output: {}\"}}", e));
    println!("{}", json);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(json: &str) -> Manifest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn options_default_when_absent() {
        let m = manifest(r#"{ "documents": [] }"#);
        assert_eq!(m.options, ProgramOptions::default());
    }

    #[test]
    fn reports_follow_contents_in_document_order() {
        let m = manifest(
            r#"{ "documents": [
                { "uri": "memory://zoo.strata", "text": "Animal\n\tName\nDog : Animal" }
            ] }"#,
        );
        let program = build(m).unwrap();
        let reports = collect_types(&program).unwrap();
        let uris: Vec<&str> = reports.iter().map(|r| r.uri.as_str()).collect();
        assert_eq!(
            uris,
            vec![
                "memory://zoo.strata#Animal",
                "memory://zoo.strata#Animal/Name",
                "memory://zoo.strata#Dog",
                "memory://zoo.strata#Dog/Name",
            ]
        );
        assert_eq!(reports[2].bases, vec!["memory://zoo.strata#Animal"]);
        assert!(!reports[3].specified);
    }

    #[test]
    fn bad_uris_are_manifest_errors() {
        let m = manifest(r#"{ "documents": [ { "uri": "nope", "text": "" } ] }"#);
        assert!(build(m).is_err());
    }
}
