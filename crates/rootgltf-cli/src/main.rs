//! rootgltf CLI - ROOT geometry to subpart glTF converter
//!
//! Runs conversions described in TOML configs and inspects geometry dumps.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rootgltf::export::{is_gltf_path, FileWriter, GltfExporter, JsonGeometrySource, MeshBuilder};
use rootgltf::{
    deduplicate, prune, ConversionConfig, Converter, InterchangeDocument, MatchList, MatchSpec,
    ProgressEvent,
};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(name = "rootgltf")]
#[command(about = "Convert ROOT detector geometry into deduplicated glTF subparts", long_about = None)]
struct Cli {
    /// More log output (repeatable)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the conversion described by a config file
    Convert {
        /// Conversion config (.toml)
        config: PathBuf,
        /// Override the geometry dump to read
        #[arg(long)]
        input: Option<PathBuf>,
        /// Override the output file name
        #[arg(long)]
        output: Option<String>,
        /// Directory the output is written to
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Override the depth limit
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Merge identical materials and meshes of an existing glTF file
    Dedup {
        /// Input .gltf file
        input: PathBuf,
        /// Output .gltf file
        output: PathBuf,
    },
    /// Display information about a geometry dump
    Info {
        /// Geometry dump (.json)
        file: PathBuf,
        /// Object to read
        #[arg(long, default_value = rootgltf::convert::DEFAULT_OBJECT)]
        object: String,
        /// Prune placements starting with this prefix first (repeatable)
        #[arg(long)]
        hide: Vec<String>,
        /// Prune placements matching this regular expression first (repeatable)
        #[arg(long)]
        hide_pattern: Vec<String>,
        /// Prune placements at this depth or deeper first
        #[arg(long)]
        max_depth: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Convert {
            config,
            input,
            output,
            out_dir,
            max_depth,
        } => {
            convert(&config, input, output, out_dir, max_depth, cli.quiet)?;
        }
        Commands::Dedup { input, output } => {
            dedup_file(&input, &output)?;
        }
        Commands::Info {
            file,
            object,
            hide,
            hide_pattern,
            max_depth,
        } => {
            show_info(&file, &object, hide, hide_pattern, max_depth)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn convert(
    config_path: &Path,
    input: Option<PathBuf>,
    output: Option<String>,
    out_dir: PathBuf,
    max_depth: Option<usize>,
    quiet: bool,
) -> Result<()> {
    let mut config = ConversionConfig::load(config_path)?;
    match input {
        Some(input) => config.input = input.to_string_lossy().into_owned(),
        None => {
            // relative inputs are relative to the config file
            let base = config_path.parent().unwrap_or(Path::new(""));
            config.input = base.join(&config.input).to_string_lossy().into_owned();
        }
    }
    if let Some(output) = output {
        config.output = output;
    }
    if let Some(max_depth) = max_depth {
        config.max_depth = max_depth;
    }
    if !is_gltf_path(Path::new(&config.output)) {
        tracing::warn!(output = %config.output, "output is written as glTF JSON regardless of its extension");
    }
    let request = config.into_request()?;

    let mut converter = Converter::new(
        JsonGeometrySource,
        MeshBuilder::new(),
        GltfExporter::new(),
        FileWriter::new(out_dir.clone()),
    );
    if !quiet {
        converter = converter.with_progress(Arc::new(|event: ProgressEvent| {
            if let ProgressEvent::Subpart { index, total, name } = event {
                eprintln!("[{}/{}] {}", index + 1, total, name);
            }
        }));
    }

    let report = converter
        .convert(&request)
        .with_context(|| format!("converting {}", config_path.display()))?;

    println!("Wrote {}", out_dir.join(&report.output).display());
    println!("  Scenes: {}", report.scenes);
    println!(
        "  Materials: {} -> {}",
        report.dedup.materials_before, report.dedup.materials_after
    );
    println!(
        "  Meshes: {} -> {}",
        report.dedup.meshes_before, report.dedup.meshes_after
    );
    println!("  Accessors: {}", report.dedup.accessors);
    println!("  Size: {} bytes", report.bytes);
    for name in &report.empty_subparts {
        println!("  Empty subpart: {}", name);
    }
    Ok(())
}

fn dedup_file(input: &Path, output: &Path) -> Result<()> {
    use std::fs;

    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let doc = InterchangeDocument::from_slice(&bytes)
        .with_context(|| format!("parsing {}", input.display()))?;
    let (doc, stats) = deduplicate(doc)?;
    fs::write(output, doc.to_vec()?).with_context(|| format!("writing {}", output.display()))?;

    println!("Deduplicated {} -> {}", input.display(), output.display());
    println!("  Materials: {} -> {}", stats.materials_before, stats.materials_after);
    println!("  Meshes: {} -> {}", stats.meshes_before, stats.meshes_after);
    Ok(())
}

fn show_info(
    file: &Path,
    object: &str,
    hide: Vec<String>,
    hide_pattern: Vec<String>,
    max_depth: Option<usize>,
) -> Result<()> {
    let mut geometry = rootgltf_geom::read_geometry(file, object)?;

    println!("geometry: {} ({})", file.display(), object);
    println!("  Top node: {}", geometry.top().name);
    print_stats(&geometry);

    let mut hidden = MatchList::prefixes(hide);
    for pattern in &hide_pattern {
        hidden.push(MatchSpec::pattern(pattern).with_context(|| format!("invalid pattern {pattern:?}"))?);
    }
    if !hidden.is_empty() || max_depth.is_some() {
        let stats = prune(&mut geometry, &hidden, max_depth.unwrap_or(usize::MAX));
        let dropped = geometry.retain_reachable();
        println!("\nAfter pruning:");
        println!("  Removed placements: {}", stats.removed);
        println!("  Dropped volumes: {}", dropped);
        print_stats(&geometry);
    }

    Ok(())
}

fn print_stats(geometry: &rootgltf_geom::Geometry) {
    let stats = geometry.stats();
    println!("  Volumes: {}", stats.volumes);
    println!("  Placements: {}", stats.placements);
    println!("  Depth: {}", stats.depth);
}
