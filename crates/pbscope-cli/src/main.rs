//! pbscope - Decode raw protobuf payloads against compiled descriptor sets
//!
//! This tool loads serialized descriptor-set files (`protoc
//! --descriptor_set_out` output), lists the message types they declare, and
//! decodes wire-format payload files against a chosen type without any
//! generated code.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use pbscope_core::{Inspector, PayloadMode};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, Level};
use tracing_subscriber::EnvFilter;

/// Decode raw protobuf payloads against compiled descriptor sets
#[derive(Parser, Debug)]
#[command(name = "pbscope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Payload file to decode (wire-format bytes)
    input: Option<PathBuf>,

    /// Descriptor-set file to load; repeat to load several, in order
    #[arg(short, long = "descriptor")]
    descriptors: Vec<PathBuf>,

    /// Root directory for resolving --load names; repeat to search several
    #[arg(short, long = "root")]
    roots: Vec<PathBuf>,

    /// Descriptor file name to resolve against the roots and load
    #[arg(long = "load")]
    loads: Vec<String>,

    /// Fully-qualified message type to decode the payload as
    #[arg(short = 't', long = "type")]
    message_type: Option<String>,

    /// Payload framing mode
    #[arg(short, long, value_enum, default_value = "auto")]
    mode: Mode,

    /// List all registered message types instead of decoding
    #[arg(long)]
    list_types: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Payload framing mode
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Trial single-message parse, falling back to delimited frames
    Auto,
    /// The whole payload is one message
    Single,
    /// The payload is a sequence of length-prefixed messages
    Delimited,
}

impl From<Mode> for PayloadMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Auto => PayloadMode::Auto,
            Mode::Single => PayloadMode::Single,
            Mode::Delimited => PayloadMode::Delimited,
        }
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
        .init();

    let inspector = load_descriptors(&cli)?;

    if cli.list_types {
        for name in inspector.all_message_types() {
            println!("{}", name);
        }
        return Ok(());
    }

    let Some(ref message_type) = cli.message_type else {
        bail!("either --list-types or --type <NAME> must be specified");
    };
    let Some(ref input) = cli.input else {
        bail!("a payload file is required when decoding (pbscope --type <NAME> <FILE>)");
    };

    decode_payload_file(&inspector, message_type, input, cli.mode.into())
}

/// Build an inspector from the --descriptor, --root, and --load arguments
fn load_descriptors(cli: &Cli) -> Result<Inspector> {
    if cli.descriptors.is_empty() && cli.loads.is_empty() {
        bail!("at least one --descriptor or --load must be specified");
    }

    let mut inspector = Inspector::new();
    for root in &cli.roots {
        inspector.register_root(root);
    }

    for path in &cli.descriptors {
        inspector
            .parse_file_descriptor(path)
            .with_context(|| format!("failed to load descriptor set: {}", path.display()))?;
        debug!("loaded {}", path.display());
    }
    for name in &cli.loads {
        inspector
            .load_file(name)
            .with_context(|| format!("failed to load '{}' via registered roots", name))?;
        debug!("loaded {} via roots", name);
    }

    debug!(
        "registry holds {} message type(s)",
        inspector.all_message_types().len()
    );
    Ok(inspector)
}

/// Decode one payload file and print one line per frame
fn decode_payload_file(
    inspector: &Inspector,
    message_type: &str,
    input: &PathBuf,
    mode: PayloadMode,
) -> Result<()> {
    let data = fs::read(input)
        .with_context(|| format!("failed to read payload file: {}", input.display()))?;

    debug!(
        "decoding {} byte(s) as {} ({:?})",
        data.len(),
        message_type,
        mode
    );

    let contents = inspector.decode(message_type, &data, mode);
    let mut failures = 0usize;
    for (i, content) in contents.iter().enumerate() {
        match (&content.raw_text, &content.error) {
            (Some(text), _) => println!("{}", text),
            (None, Some(err)) => {
                failures += 1;
                error!("frame {}: {}", i + 1, err);
            }
            (None, None) => {}
        }
    }

    if failures == contents.len() {
        bail!("no frame decoded successfully");
    }
    Ok(())
}
