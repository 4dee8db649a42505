//! XSD to LinkML CLI
//!
//! Command-line interface for translating XML Schemas into LinkML and
//! checking the result against the source structure.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use xsd_linkml::{
    compare, convert, filter_elements, load_doc_overrides, load_schema_auto, partition_schema,
    render_report, to_json_tree, to_yaml, write_json, write_schema, ConvertOptions, Diagnostic,
    DocOverrides, SchemaDefinition, SchemaMetadata, SlotMode, SourceSchema,
};

#[derive(Parser)]
#[command(name = "xsd-linkml")]
#[command(about = "Translate XML Schema definitions into LinkML")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate an XSD into a LinkML schema
    Convert {
        /// Schema source: file path or URL (http:// or https://)
        xsd: String,

        /// Output file, or directory with --partition (stdout if not specified)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Comma-separated top-level elements to keep in the intermediate tree
        #[arg(long, value_delimiter = ',')]
        elements: Vec<String>,

        /// Write one file per class into the --output directory
        #[arg(long, requires = "output")]
        partition: bool,

        /// Schema id (default: target namespace)
        #[arg(long)]
        schema_id: Option<String>,

        /// Schema name (default: derived from target namespace)
        #[arg(long)]
        name: Option<String>,

        /// Schema title (default: schema name)
        #[arg(long)]
        title: Option<String>,

        /// Default prefix (default: schema name)
        #[arg(long)]
        default_prefix: Option<String>,

        /// Extra prefix mapping in the form prefix=URI; can be repeated
        #[arg(long, value_parser = parse_prefix)]
        extra_prefix: Vec<(String, String)>,

        /// Also write the intermediate JSON tree to this path
        #[arg(long)]
        json_out: Option<PathBuf>,

        /// YAML file with description overrides ({Class: {attr: text}})
        #[arg(long)]
        doc_overrides: Option<PathBuf>,

        /// Store slots once at schema level instead of per class
        #[arg(long)]
        global_slots: bool,

        /// Print every diagnostic instead of a count
        #[arg(long, short)]
        verbose: bool,
    },

    /// Print the intermediate JSON tree of an XSD
    Json {
        /// Schema source: file path or URL (http:// or https://)
        xsd: String,

        /// Output file (stdout if not specified)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Comma-separated top-level elements to keep
        #[arg(long, value_delimiter = ',')]
        elements: Vec<String>,
    },

    /// Compare a generated LinkML schema against the XSD structure
    Verify {
        /// Schema source: file path or URL (http:// or https://)
        xsd: String,

        /// Generated LinkML YAML file
        linkml: PathBuf,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

fn parse_prefix(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((prefix, uri)) if !prefix.trim().is_empty() && !uri.trim().is_empty() => {
            Ok((prefix.trim().to_string(), uri.trim().to_string()))
        }
        _ => Err(format!("expected prefix=URI, got '{s}'")),
    }
}

struct ConvertArgs {
    xsd: String,
    output: Option<PathBuf>,
    elements: Vec<String>,
    partition: bool,
    metadata: SchemaMetadata,
    json_out: Option<PathBuf>,
    doc_overrides: Option<PathBuf>,
    global_slots: bool,
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            xsd,
            output,
            elements,
            partition,
            schema_id,
            name,
            title,
            default_prefix,
            extra_prefix,
            json_out,
            doc_overrides,
            global_slots,
            verbose,
        } => {
            let mut metadata = SchemaMetadata::new();
            metadata.schema_id = schema_id;
            metadata.schema_name = name;
            metadata.schema_title = title;
            metadata.default_prefix = default_prefix;
            metadata.extra_prefixes.extend(extra_prefix);
            run_convert(ConvertArgs {
                xsd,
                output,
                elements,
                partition,
                metadata,
                json_out,
                doc_overrides,
                global_slots,
                verbose,
            })
        }

        Commands::Json {
            xsd,
            output,
            elements,
        } => run_json(&xsd, output.as_deref(), &elements),

        Commands::Verify { xsd, linkml, json } => run_verify(&xsd, &linkml, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn load_source(xsd: &str) -> Result<SourceSchema, u8> {
    load_schema_auto(xsd).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn report_diagnostics(diagnostics: &[Diagnostic], verbose: bool) {
    if diagnostics.is_empty() {
        return;
    }
    if verbose {
        for diagnostic in diagnostics {
            eprintln!("warning{}", diagnostic);
        }
    }
    eprintln!("{} declaration(s) skipped", diagnostics.len());
}

fn run_convert(args: ConvertArgs) -> Result<(), u8> {
    let ConvertArgs {
        xsd,
        output,
        elements,
        partition,
        metadata,
        json_out,
        doc_overrides,
        global_slots,
        verbose,
    } = args;

    let source = load_source(&xsd)?;
    let overrides = match &doc_overrides {
        Some(path) => load_doc_overrides(path).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?,
        None => DocOverrides::new(),
    };

    if let Some(path) = &json_out {
        let mut tree = to_json_tree(&source);
        if !elements.is_empty() {
            filter_elements(&mut tree, &elements);
        }
        write_json(&tree, path).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;
    }

    let slot_mode = if global_slots {
        SlotMode::Global
    } else {
        SlotMode::Inline
    };
    let options = ConvertOptions::new()
        .metadata(metadata)
        .overrides(overrides)
        .slot_mode(slot_mode);
    let conversion = convert(&source, &options);
    report_diagnostics(&conversion.diagnostics, verbose);

    let written = match output {
        Some(dir) if partition => partition_schema(&conversion.schema, &dir).map(|files| {
            eprintln!("Wrote {} files to {}", files.len(), dir.display());
        }),
        Some(path) => write_schema(&conversion.schema, &path).map(|path| {
            eprintln!("Wrote {}", path.display());
        }),
        None => to_yaml(&conversion.schema).map(|yaml| print!("{}", yaml)),
    };
    written.map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn run_json(xsd: &str, output: Option<&Path>, elements: &[String]) -> Result<(), u8> {
    let source = load_source(xsd)?;
    let mut tree = to_json_tree(&source);
    if !elements.is_empty() {
        filter_elements(&mut tree, elements);
    }

    match output {
        Some(path) => write_json(&tree, path).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        }),
        None => {
            let text = serde_json::to_string_pretty(&tree).map_err(|e| {
                eprintln!("Error serializing output: {}", e);
                2u8
            })?;
            println!("{}", text);
            Ok(())
        }
    }
}

fn run_verify(xsd: &str, linkml: &Path, json_output: bool) -> Result<(), u8> {
    let source = load_source(xsd)?;
    let text = std::fs::read_to_string(linkml).map_err(|e| {
        eprintln!("Error reading {}: {}", linkml.display(), e);
        3u8
    })?;
    let schema: SchemaDefinition = serde_yaml::from_str(&text).map_err(|e| {
        eprintln!("Error parsing {}: {}", linkml.display(), e);
        2u8
    })?;

    let report = compare(&to_json_tree(&source), &schema);
    if json_output {
        let output = serde_json::json!({
            "ok": report.is_ok(),
            "report": report,
        });
        println!("{}", output);
    } else {
        print!("{}", render_report(&report));
    }

    if report.is_ok() {
        Ok(())
    } else {
        Err(1)
    }
}
