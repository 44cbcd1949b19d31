use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use memmap2::Mmap;

use ooxml_roundtrip::{Address, ContainerKind, Error, Parsed};

/// Parse DOCX/XLSX packages into an editable tree and write edits back
#[derive(Parser)]
#[command(name = "ooxml-roundtrip", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Container kind; detected from the package when omitted
    #[arg(long, value_enum, global = true)]
    kind: Option<Kind>,

    /// Log debug output (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the structured tree as JSON
    Parse {
        input: PathBuf,
        /// Document id; defaults to the file name
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        pretty: bool,
    },
    /// Apply a JSON tree to the base container
    Export {
        input: PathBuf,
        /// Tree produced by `parse`, possibly edited
        #[arg(long)]
        edits: PathBuf,
        #[arg(short = 'o', long)]
        output: PathBuf,
    },
    /// Parse, export without edits and report drift
    Validate { input: PathBuf },
    /// Print the element an address resolves to
    Resolve { input: PathBuf, address: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Docx,
    Xlsx,
}

impl From<Kind> for ContainerKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Docx => ContainerKind::WordProcessing,
            Kind::Xlsx => ContainerKind::Spreadsheet,
        }
    }
}

fn map_input(path: &Path) -> Result<Mmap, Error> {
    let file = File::open(path)?;
    // SAFETY: the map is read-only and the input is not modified while we run.
    let map = unsafe { Mmap::map(&file)? };
    Ok(map)
}

fn file_id(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

fn report_notices(notices: &[ooxml_roundtrip::Notice]) {
    for notice in notices {
        eprintln!("notice [{:?}]: {}", notice.kind, notice.message);
    }
}

fn run(cli: Cli) -> Result<bool, Error> {
    let kind = cli.kind.map(ContainerKind::from);
    match cli.command {
        Command::Parse { input, id, pretty } => {
            let bytes = map_input(&input)?;
            let id = id.unwrap_or_else(|| file_id(&input));
            let kind = match kind {
                Some(kind) => kind,
                None => ooxml_roundtrip::detect_kind(&bytes)?,
            };
            let outcome = ooxml_roundtrip::parse_as(&bytes, &id, kind)?;
            report_notices(&outcome.notices);
            let json = if pretty {
                serde_json::to_string_pretty(&outcome.value)?
            } else {
                serde_json::to_string(&outcome.value)?
            };
            println!("{json}");
            Ok(true)
        }
        Command::Export {
            input,
            edits,
            output,
        } => {
            let bytes = map_input(&input)?;
            let tree: Parsed = serde_json::from_reader(File::open(&edits)?)?;
            if let Some(kind) = kind
                && kind != tree.kind()
            {
                log::warn!("--kind disagrees with the tree in {}", edits.display());
            }
            let outcome = ooxml_roundtrip::export(&tree, &bytes)?;
            report_notices(&outcome.notices);
            std::fs::write(&output, &outcome.value)?;
            eprintln!("Wrote {} ({} bytes)", output.display(), outcome.value.len());
            Ok(true)
        }
        Command::Validate { input } => {
            let bytes = map_input(&input)?;
            let report = ooxml_roundtrip::validate(&bytes, &file_id(&input))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(!report.has_errors())
        }
        Command::Resolve { input, address } => {
            let bytes = map_input(&input)?;
            let address: Address = address
                .parse()
                .map_err(|e| Error::AddressNotFound(format!("{address}: {e}")))?;
            let located = ooxml_roundtrip::docx::locate(&bytes, std::slice::from_ref(&address))?;
            match located.into_iter().next().flatten() {
                Some(found) => {
                    println!("{}\t{}", found.tag, found.text);
                    Ok(true)
                }
                None => Err(Error::AddressNotFound(address.to_string())),
            }
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
