//! pbtable - Inspect Protocol Buffers wire data without a schema
//!
//! This tool walks encoded messages field by field and prints the raw
//! values, expanding embedded messages where the payload parses as one.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pbtable_core::engine::DEFAULT_MAX_DEPTH;
use pbtable_core::{inspect, InspectConfig, WireField, WireValue};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Inspect Protocol Buffers wire data without a schema
#[derive(Parser, Debug)]
#[command(name = "pbtable")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the fields of encoded messages
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct InspectArgs {
    #[command(flatten)]
    input: InputMode,

    /// Maximum nesting to expand (outermost message is 1)
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Maximum number of fields per message (0 = unlimited)
    #[arg(long, default_value = "0")]
    max_fields: usize,

    /// Output format
    #[arg(long, value_enum, default_value = "tree")]
    format: OutputFormat,
}

impl InspectArgs {
    fn config(&self) -> InspectConfig {
        let max_fields = if self.max_fields == 0 {
            usize::MAX
        } else {
            self.max_fields
        };
        InspectConfig::new()
            .max_depth(self.max_depth)
            .max_fields(max_fields)
    }
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single encoded message
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of encoded messages to process
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Output format for inspected files
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Indented field tree
    Tree,
    /// One line per file
    Summary,
}

/// Tracks inputs already inspected, by content hash
#[derive(Default)]
struct SeenInputs {
    seen: HashMap<blake3::Hash, PathBuf>,
    stats: InputStats,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct InputStats {
    inspected: usize,
    duplicates_skipped: usize,
    failed: usize,
}

impl SeenInputs {
    fn new() -> Self {
        Self::default()
    }

    /// Records `path` and returns the earlier path with identical content, if any
    fn register(&mut self, path: &Path, data: &[u8]) -> Option<&Path> {
        let hash = blake3::hash(data);
        if self.seen.contains_key(&hash) {
            self.stats.duplicates_skipped += 1;
            return self.seen.get(&hash).map(PathBuf::as_path);
        }
        self.seen.insert(hash, path.to_path_buf());
        None
    }

    fn print_summary(&self) {
        info!(
            "Summary: {} inspected, {} duplicates skipped, {} failed",
            self.stats.inspected, self.stats.duplicates_skipped, self.stats.failed
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Command::Inspect(args) => {
            if let Some(ref file) = args.input.file {
                process_single_file(args, file, &mut out)
            } else if let Some(ref directory) = args.input.directory {
                process_directory(args, directory, &mut out).map(|_| ())
            } else {
                bail!("Either --file or --directory must be specified")
            }
        }
    }
}

/// Inspect a single file
fn process_single_file(args: &InspectArgs, file: &Path, out: &mut impl Write) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    let data = fs::read(file).with_context(|| format!("Failed to read input file: {}", file.display()))?;
    inspect_data(args, file, &data, out)
}

/// Inspect every file under a directory, skipping hidden and duplicate files
fn process_directory(args: &InspectArgs, directory: &Path, out: &mut impl Write) -> Result<InputStats> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut inputs = SeenInputs::new();

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            trace!("Skipping hidden file: {}", path.display());
            continue;
        }

        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                inputs.stats.failed += 1;
                continue;
            }
        };

        if let Some(original) = inputs.register(path, &data) {
            debug!(
                "Skipping duplicate: {} (same content as {})",
                path.display(),
                original.display()
            );
            continue;
        }

        match inspect_data(args, path, &data, out) {
            Ok(()) => inputs.stats.inspected += 1,
            Err(e) => {
                // Log error but continue with other files
                warn!("Error inspecting {}: {:#}", path.display(), e);
                inputs.stats.failed += 1;
            }
        }
    }

    inputs.print_summary();
    Ok(inputs.stats)
}

/// Inspect one buffer and print it in the requested format
fn inspect_data(args: &InspectArgs, path: &Path, data: &[u8], out: &mut impl Write) -> Result<()> {
    trace!("Inspecting {} ({} bytes)", path.display(), data.len());

    let fields = inspect(data, &args.config())
        .with_context(|| format!("Failed to parse message: {}", path.display()))?;

    match args.format {
        OutputFormat::Tree => {
            writeln!(out, "# {} ({} bytes)", path.display(), data.len())?;
            render_tree(out, &fields, 0)?;
        }
        OutputFormat::Summary => {
            let total: usize = fields.iter().map(WireField::count).sum();
            writeln!(
                out,
                "{}: {} bytes, {} fields ({} total)",
                path.display(),
                data.len(),
                fields.len(),
                total
            )?;
        }
    }

    Ok(())
}

/// Write fields as an indented tree, one field per line
fn render_tree(out: &mut impl Write, fields: &[WireField<'_>], indent: usize) -> io::Result<()> {
    let pad = "  ".repeat(indent);

    for field in fields {
        let head = format!(
            "{}{} [{}] @{}",
            pad,
            field.number,
            field.wire_type.as_str(),
            field.offset
        );

        match &field.value {
            WireValue::Varint(v) => writeln!(out, "{}: {}", head, v)?,
            WireValue::Fixed32(v) => writeln!(out, "{}: 0x{:08x}", head, v)?,
            WireValue::Fixed64(v) => writeln!(out, "{}: 0x{:016x}", head, v)?,
            WireValue::Bytes(bytes) => match field.value.as_text() {
                Some(text) => writeln!(out, "{}: {:?}", head, text)?,
                None => writeln!(out, "{}: {} bytes {}", head, bytes.len(), hex(bytes))?,
            },
            WireValue::Message(children) => {
                writeln!(out, "{} {{", head)?;
                render_tree(out, children, indent + 1)?;
                writeln!(out, "{}}}", pad)?;
            }
        }
    }

    Ok(())
}

/// Hex dump of a payload, truncated after 32 bytes
fn hex(bytes: &[u8]) -> String {
    const MAX_SHOWN: usize = 32;

    let mut text: String = bytes
        .iter()
        .take(MAX_SHOWN)
        .map(|b| format!("{:02x}", b))
        .collect();
    if bytes.len() > MAX_SHOWN {
        text.push_str("..");
    }
    text
}
