//! `schemapack`: command-line interface for schemapacks and datapacks.
//!
//! Subcommands:
//!
//! - **`validate`**: check a datapack against a schemapack.
//! - **`check-schemapack`** / **`check-datapack`**: check one document on its own.
//! - **`isolate`**: extract the rooted schemapack/datapack pair around one resource.
//! - **`denormalize`**: render a rooted datapack as one nested document.
//!
//! Documents may be JSON or YAML. Results go to stdout, diagnostics to stderr.
//! Failures exit with a code identifying the kind of error (see
//! [`exit_code`]).

mod config;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use schemapack::isolate::IsolationError;
use schemapack::render::render_datapack_summary;
use schemapack::{
    denormalize, isolate, load_and_validate, load_datapack, load_schemapack,
    read_json_or_yaml_mapping, render_validation_error, DenormalizationError, EmbeddingProfile,
    InvalidEmbeddingProfileError, NotFoundError, SpecType,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::{CliConfig, OutputFormat};

/// Process exit codes.
mod exit_code {
    pub const VALIDATION: i32 = 10;
    pub const DATAPACK_SPEC: i32 = 20;
    pub const SCHEMAPACK_SPEC: i32 = 30;
    pub const CLASS_NOT_FOUND: i32 = 40;
    pub const RESOURCE_NOT_FOUND: i32 = 41;
    pub const OUTPUT_EXISTS: i32 = 50;
    pub const CIRCULAR_RELATION: i32 = 60;
    pub const INVALID_EMBEDDING_PROFILE: i32 = 70;
    pub const OTHER: i32 = 2;
}

/// schemapack: validate, isolate, and denormalize datapacks
#[derive(Parser)]
#[command(name = "schemapack", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a datapack against a schemapack.
    ///
    /// Prints "valid" on success. On failure, prints every issue found and
    /// exits 10 (or 20/30 if a document itself is malformed).
    Validate {
        /// Path to the schemapack (JSON or YAML).
        #[arg(short = 's', long, value_name = "FILE")]
        schemapack: PathBuf,

        /// Path to the datapack (JSON or YAML).
        #[arg(short = 'd', long, value_name = "FILE")]
        datapack: PathBuf,
    },

    /// Check that a schemapack is well-formed.
    CheckSchemapack {
        /// Path to the schemapack (JSON or YAML).
        path: PathBuf,
    },

    /// Check that a datapack is well-formed and print a summary.
    CheckDatapack {
        /// Path to the datapack (JSON or YAML).
        path: PathBuf,
    },

    /// Extract the rooted schemapack and datapack needed by one resource.
    ///
    /// Without --output-dir, prints an object with "schemapack" and
    /// "datapack" keys. With it, writes schemapack.<ext> and datapack.<ext>
    /// into the directory.
    Isolate {
        #[arg(short = 's', long, value_name = "FILE")]
        schemapack: PathBuf,

        #[arg(short = 'd', long, value_name = "FILE")]
        datapack: PathBuf,

        /// Class of the resource to isolate.
        #[arg(short = 'c', long = "class", value_name = "CLASS")]
        class_name: String,

        /// Id of the resource to isolate.
        #[arg(short = 'r', long = "resource", value_name = "ID")]
        resource_id: String,

        /// Directory to write the rooted documents into.
        #[arg(short = 'o', long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Overwrite existing output files.
        #[arg(long)]
        force: bool,

        /// Output format; defaults to SCHEMAPACK_OUTPUT or json.
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Render a rooted datapack as one nested document.
    Denormalize {
        #[arg(short = 's', long, value_name = "FILE")]
        schemapack: PathBuf,

        #[arg(short = 'd', long, value_name = "FILE")]
        datapack: PathBuf,

        /// Embedding profile (JSON or YAML) selecting which relations to inline.
        #[arg(short = 'e', long, value_name = "FILE")]
        embedding_profile: Option<PathBuf>,

        /// Output format; defaults to SCHEMAPACK_OUTPUT or json.
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] schemapack::Error),

    #[error(transparent)]
    EmbeddingProfile(#[from] InvalidEmbeddingProfileError),

    #[error("output file {} already exists; pass --force to overwrite", .0.display())]
    OutputExists(PathBuf),

    #[error("{0}")]
    Other(String),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        use schemapack::Error as E;
        match self {
            CliError::Core(E::Load(err)) => match err.spec_type() {
                SpecType::SchemaPack => exit_code::SCHEMAPACK_SPEC,
                SpecType::DataPack => exit_code::DATAPACK_SPEC,
            },
            CliError::Core(E::Validation(_)) => exit_code::VALIDATION,
            CliError::Core(E::Isolation(IsolationError::NotFound(NotFoundError::Class { .. }))) => {
                exit_code::CLASS_NOT_FOUND
            }
            CliError::Core(E::Isolation(IsolationError::NotFound(NotFoundError::Resource { .. }))) => {
                exit_code::RESOURCE_NOT_FOUND
            }
            CliError::Core(E::Denormalization(DenormalizationError::CircularRelation { .. })) => {
                exit_code::CIRCULAR_RELATION
            }
            CliError::EmbeddingProfile(_) => exit_code::INVALID_EMBEDDING_PROFILE,
            CliError::OutputExists(_) => exit_code::OUTPUT_EXISTS,
            _ => exit_code::OTHER,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let config = CliConfig::from_env().unwrap_or_else(|e| fatal(&e, exit_code::OTHER));
    init_tracing(&config.log_filter);

    if let Err(err) = run(cli.command, &config) {
        let code = err.exit_code();
        eprintln!("schemapack: {err}");
        if let CliError::Core(schemapack::Error::Validation(report)) = &err {
            eprint!("{}", render_validation_error(report));
        }
        process::exit(code);
    }
}

fn run(command: Command, config: &CliConfig) -> Result<(), CliError> {
    match command {
        Command::Validate {
            schemapack: schemapack_path,
            datapack: datapack_path,
        } => {
            load_and_validate(&schemapack_path, &datapack_path)?;
            println!("valid");
        }

        Command::CheckSchemapack { path } => {
            let schemapack = load_schemapack(&path).map_err(schemapack::Error::from)?;
            println!("valid schemapack: {} classes", schemapack.classes.len());
        }

        Command::CheckDatapack { path } => {
            let datapack = load_datapack(&path).map_err(schemapack::Error::from)?;
            print!("{}", render_datapack_summary(&datapack));
        }

        Command::Isolate {
            schemapack: schemapack_path,
            datapack: datapack_path,
            class_name,
            resource_id,
            output_dir,
            force,
            format,
        } => {
            let format = format.unwrap_or(config.output_format);
            let (schemapack, datapack) = load_and_validate(&schemapack_path, &datapack_path)?;
            let (rooted_schemapack, rooted_datapack) =
                isolate(&schemapack, &datapack, &class_name, &resource_id)
                    .map_err(schemapack::Error::from)?;
            info!(
                class = %class_name,
                resource = %resource_id,
                resources = rooted_datapack.len(),
                "isolated resource"
            );

            let rooted_schemapack = to_value(&rooted_schemapack)?;
            let rooted_datapack = to_value(&rooted_datapack)?;
            match output_dir {
                Some(dir) => {
                    let schemapack_path = dir.join(format!("schemapack.{}", format.extension()));
                    let datapack_path = dir.join(format!("datapack.{}", format.extension()));
                    for path in [&schemapack_path, &datapack_path] {
                        if path.exists() && !force {
                            return Err(CliError::OutputExists(path.clone()));
                        }
                    }
                    fs::create_dir_all(&dir).map_err(|e| {
                        CliError::Other(format!("failed to create {}: {e}", dir.display()))
                    })?;
                    write_document(&schemapack_path, &rooted_schemapack, format)?;
                    write_document(&datapack_path, &rooted_datapack, format)?;
                }
                None => {
                    let pair = Value::Object(
                        [
                            ("schemapack".to_owned(), rooted_schemapack),
                            ("datapack".to_owned(), rooted_datapack),
                        ]
                        .into_iter()
                        .collect(),
                    );
                    print!("{}", serialize(&pair, format)?);
                }
            }
        }

        Command::Denormalize {
            schemapack: schemapack_path,
            datapack: datapack_path,
            embedding_profile,
            format,
        } => {
            let format = format.unwrap_or(config.output_format);
            let profile = embedding_profile
                .as_deref()
                .map(read_embedding_profile)
                .transpose()?;
            let (schemapack, datapack) = load_and_validate(&schemapack_path, &datapack_path)?;
            let document = denormalize(&schemapack, &datapack, profile.as_ref())
                .map_err(schemapack::Error::from)?;
            print!("{}", serialize(&Value::Object(document), format)?);
        }
    }
    Ok(())
}

// --- helpers -----------------------------------------------------------------

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter)
        .unwrap_or_else(|_| EnvFilter::new(CliConfig::DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_embedding_profile(path: &Path) -> Result<EmbeddingProfile, CliError> {
    let mapping = read_json_or_yaml_mapping(path).map_err(|e| CliError::Other(e.to_string()))?;
    debug!(path = %path.display(), "read embedding profile");
    Ok(EmbeddingProfile::from_value(&Value::Object(mapping))?)
}

fn to_value<T: Serialize>(document: &T) -> Result<Value, CliError> {
    serde_json::to_value(document).map_err(|e| CliError::Other(format!("failed to serialise: {e}")))
}

/// Serialise `value`, always ending with a newline.
fn serialize(value: &Value, format: OutputFormat) -> Result<String, CliError> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)
            .map(|s| s + "\n")
            .map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
    };
    text.map_err(|e| CliError::Other(format!("failed to serialise: {e}")))
}

fn write_document(path: &Path, value: &Value, format: OutputFormat) -> Result<(), CliError> {
    let text = serialize(value, format)?;
    fs::write(path, text)
        .map_err(|e| CliError::Other(format!("failed to write {}: {e}", path.display())))?;
    info!(path = %path.display(), "wrote document");
    Ok(())
}

/// Print an error message to stderr and exit with `code`.
fn fatal(msg: &str, code: i32) -> ! {
    eprintln!("schemapack: {msg}");
    process::exit(code);
}
