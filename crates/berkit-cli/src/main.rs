//! berkit - Inspect BER/DER encoded ASN.1 files
//!
//! This tool decodes files holding BER or DER elements, dumps or
//! re-encodes them, and runs grammar queries against the decoded trees.

use anyhow::{bail, Context, Result};
use berkit_core::tree::visit::walk;
use berkit_core::{
    grammar, DecoderConfig, NodeId, PrintConfig, Session, StatsVisitor, Trailing, TreeDump, Value,
};
use clap::{Args, Parser, ValueEnum};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Inspect, canonicalize and query BER/DER encoded ASN.1 files
#[derive(Parser, Debug)]
#[command(name = "berkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value = "tree")]
    format: OutputFormat,

    /// Input files hold hex text instead of raw bytes
    #[arg(long)]
    hex: bool,

    /// Sort SET members and use definite lengths before re-encoding (DER)
    #[arg(long)]
    canonical: bool,

    /// Grammar to read from each file; prints the extracted slots
    #[arg(short, long)]
    grammar: Option<String>,

    /// Search the whole tree for the grammar instead of reading at the root
    #[arg(long, requires = "grammar")]
    search: bool,

    /// Maximum nesting depth accepted by the decoder
    #[arg(long, default_value_t = berkit_core::DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Treat malformed data inside constructed elements as an error
    #[arg(long)]
    strict: bool,

    /// Show offsets and lengths in tree output
    #[arg(long)]
    offsets: bool,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single file to decode
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of files to decode
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// What to print for each decoded file
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Indented element tree
    Tree,
    /// Re-encoded bytes as hex
    Hex,
    /// Short blake3 hash of the re-encoded bytes
    Fingerprint,
}

/// Counters reported at the end of a run
#[derive(Debug, Default)]
struct RunStats {
    files: usize,
    nodes: usize,
    failures: usize,
    trailing: usize,
}

impl RunStats {
    fn print_summary(&self) {
        info!(
            "Summary: {} files, {} nodes, {} with trailing data, {} failed",
            self.files, self.nodes, self.trailing, self.failures
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
        .init();

    // Dispatch based on input mode
    if let Some(ref file) = cli.input.file {
        process_single_file(&cli, file)
    } else if let Some(ref directory) = cli.input.directory {
        process_directory(&cli, directory)
    } else {
        bail!("Either --file or --directory must be specified")
    }
}

/// Process a single file; any error is fatal
fn process_single_file(cli: &Cli, file: &Path) -> Result<()> {
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    let mut stats = RunStats::default();
    let output = process_file(cli, file, &mut stats)?;
    print!("{}", output);
    stats.print_summary();
    Ok(())
}

/// Process a directory recursively, skipping files that fail
fn process_directory(cli: &Cli, directory: &Path) -> Result<()> {
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());
    let mut stats = RunStats::default();

    for path in collect_files(directory) {
        debug!("Processing: {}", path.display());
        match process_file(cli, &path, &mut stats) {
            Ok(output) => {
                if cli.format == OutputFormat::Fingerprint && cli.grammar.is_none() {
                    println!("{}  {}", output.trim_end(), path.display());
                } else {
                    println!("== {}", path.display());
                    print!("{}", output);
                }
            }
            Err(e) => {
                // Log error but continue with other files
                warn!("Error processing {}: {:#}", path.display(), e);
                stats.failures += 1;
            }
        }
    }

    stats.print_summary();
    Ok(())
}

/// Regular, non-hidden files below `directory`, in a stable order
fn collect_files(directory: &Path) -> Vec<PathBuf> {
    WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Decode one file and render the requested output
fn process_file(cli: &Cli, path: &Path, stats: &mut RunStats) -> Result<String> {
    trace!("Reading {}", path.display());
    let raw = fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let data = if cli.hex {
        let text = std::str::from_utf8(&raw)
            .with_context(|| format!("Hex input is not text: {}", path.display()))?;
        parse_hex(text).with_context(|| format!("Invalid hex input: {}", path.display()))?
    } else {
        raw
    };
    trace!("Read {} bytes from {}", data.len(), path.display());

    let config = DecoderConfig::new()
        .max_depth(cli.max_depth)
        .strict_trailing(cli.strict);
    let mut session = Session::new();
    let decoded = session
        .decode_with_config(data, &config)
        .with_context(|| format!("Failed to decode: {}", path.display()))?;
    stats.files += 1;

    match &decoded.trailing {
        Trailing::None => {}
        Trailing::Benign { offset } => {
            info!("{}: unused bytes from offset {}", path.display(), offset);
            stats.trailing += 1;
        }
        Trailing::Malformed { offset, reason } => {
            warn!(
                "{}: malformed data at offset {}: {}",
                path.display(),
                offset,
                reason
            );
            stats.trailing += 1;
        }
    }

    let mut tree = decoded.tree;
    let mut counter = StatsVisitor::default();
    // The visitor itself never fails
    let _ = walk(&session, tree.root(), &mut counter);
    stats.nodes += counter.node_count();
    debug!(
        "{}: {} nodes, depth {}, {} indefinite",
        path.display(),
        counter.node_count(),
        counter.max_depth,
        counter.indefinite_count
    );

    if cli.canonical {
        session.canonicalize(tree.root())?;
        // Refresh cached octets so the dump can show offsets again
        let roots: Vec<NodeId> = session.siblings(Some(tree.root())).collect();
        for id in roots {
            session.materialize(id)?;
        }
    }

    if let Some(ref grammar_text) = cli.grammar {
        if cli.search {
            grammar::search(&session, &mut tree, grammar_text)?;
            return Ok(format!("{}\n", node_path(&session, tree.current())));
        }
        let values = grammar::read(&session, &mut tree, grammar_text)?;
        let mut output = String::new();
        for (index, value) in values.iter().enumerate() {
            let _ = writeln!(output, "{:>3}: {}", index, format_value(&session, value));
        }
        return Ok(output);
    }

    Ok(match cli.format {
        OutputFormat::Tree => {
            let config = PrintConfig::new().show_offsets(cli.offsets);
            TreeDump::new(&session, tree.root()).with_config(config).render()
        }
        OutputFormat::Hex => format!("{}\n", hex::encode(tree.encode(&mut session)?)),
        OutputFormat::Fingerprint => format!("{}\n", fingerprint(&tree.encode(&mut session)?)),
    })
}

/// Parses hex text, ignoring whitespace and `:` separators
fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && *c != ':')
        .collect();
    hex::decode(&digits).with_context(|| format!("{} hex digits", digits.len()))
}

/// First 16 hex characters of the blake3 hash
fn fingerprint(bytes: &[u8]) -> String {
    let hash = blake3::hash(bytes);
    hash.to_hex()[..16].to_string()
}

/// Sibling indices from the top-level chain down to `id`, e.g. `0.2.1`
fn node_path(session: &Session, id: NodeId) -> String {
    let mut indices = Vec::new();
    let mut current = Some(id);
    while let Some(id) = current {
        let position = std::iter::successors(session.node(id).prev(), |&p| session.node(p).prev())
            .count();
        indices.push(position.to_string());
        current = session.node(id).parent();
    }
    indices.reverse();
    indices.join(".")
}

fn format_value(session: &Session, value: &Value) -> String {
    match value {
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Short(i) => i.to_string(),
        Value::BitString(bits) => {
            format!("({} bits) {}", bits.bit_len(), hex::encode(bits.as_bytes()))
        }
        Value::OctetString(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) if !s.chars().any(char::is_control) => format!("{:?}", s),
            _ => hex::encode(bytes),
        },
        Value::Null => "NULL".to_string(),
        Value::Oid(oid) => oid.to_string(),
        Value::Time(time) => time.to_string(),
        Value::Node(id) => format!("node {}", node_path(session, *id)),
        Value::Selector(index) => format!("alternative {}", index),
        Value::Found(found) => (if *found { "present" } else { "absent" }).to_string(),
        Value::Absent => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    // SET { INTEGER 2, INTEGER 1 }, not in DER order
    const UNSORTED_SET: [u8; 8] = [0x31, 0x06, 0x02, 0x01, 0x02, 0x02, 0x01, 0x01];

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["berkit"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(data).unwrap();
        path
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("30 03\n02:01:05").unwrap(), vec![0x30, 0x03, 0x02, 0x01, 0x05]);
        assert!(parse_hex("301").is_err());
        assert!(parse_hex("zz").is_err());
        assert_eq!(parse_hex("0A:ff").unwrap(), vec![0x0A, 0xFF]);
        assert_eq!(hex::encode([0x0A, 0xFF]), "0aff");
    }

    #[test]
    fn test_fingerprint() {
        let a = fingerprint(b"hello");
        assert_eq!(a, fingerprint(b"hello"));
        assert_ne!(a, fingerprint(b"world"));
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_canonical_hex_output() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "set.der", &UNSORTED_SET);
        let mut stats = RunStats::default();

        let plain = cli(&["--file", "x", "--format", "hex"]);
        let output = process_file(&plain, &path, &mut stats).unwrap();
        assert_eq!(output, "3106020102020101\n");

        let canonical = cli(&["--file", "x", "--format", "hex", "--canonical"]);
        let output = process_file(&canonical, &path, &mut stats).unwrap();
        assert_eq!(output, "3106020101020102\n");
        assert_eq!(stats.files, 2);
        assert_eq!(stats.nodes, 6);
    }

    #[test]
    fn test_canonical_tree_keeps_offsets() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "set.der", &UNSORTED_SET);
        let mut stats = RunStats::default();

        let args = cli(&["--file", "x", "--canonical", "--offsets"]);
        let output = process_file(&args, &path, &mut stats).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("     0  2+6"));
        assert!(lines[0].ends_with("SET"));
        assert!(lines[1].ends_with("INTEGER 1"));
        assert!(lines[2].starts_with("     5  2+1"));
    }

    #[test]
    fn test_hex_input_and_grammar() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "seq.hex", b"30 06 02 01 05 01 01 ff\n");
        let mut stats = RunStats::default();

        let args = cli(&["--file", "x", "--hex", "--grammar", "(sequence (integer) (boolean))"]);
        let output = process_file(&args, &path, &mut stats).unwrap();
        assert_eq!(output, "  0: 5\n  1: true\n");

        let args = cli(&["--file", "x", "--hex", "--search", "--grammar", "(boolean)"]);
        let output = process_file(&args, &path, &mut stats).unwrap();
        assert_eq!(output, "0.1\n");
    }

    #[test]
    fn test_directory_skips_hidden_files() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.der", &UNSORTED_SET);
        write_file(&dir, ".hidden", &UNSORTED_SET);
        fs::create_dir(dir.path().join("nested")).unwrap();
        write_file(&dir, "nested/b.der", &[0x05, 0x00]);

        let files = collect_files(dir.path());
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.der", "b.der"]);
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "bad.der", &[0x30, 0x05, 0x02]);
        let mut stats = RunStats::default();
        assert!(process_file(&cli(&["--file", "x"]), &path, &mut stats).is_err());
        assert_eq!(stats.files, 0);
    }

    #[test]
    fn test_search_requires_grammar() {
        let argv = ["berkit", "--file", "x", "--search"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
