use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use component_compiler_native::discovery::{find_component_files, load_source_file, DEFAULT_EXTENSION};
use component_compiler_native::{
    publish_styles, CollectedStyles, CompilationResult, CompileOptions, Compiler, CompilerError,
    HashMode, ResultCache, SourceFile,
};

/// Compile component documents into module descriptors.
///
/// Prints every result as JSON on stdout. With `--out-dir`, also writes one
/// `<component>.js` module per document and an aggregated `styles.css`.
#[derive(Parser, Debug)]
#[command(name = "component-compiler", version, about)]
struct Cli {
    /// A component document, or a directory searched recursively
    input: PathBuf,

    /// Write generated modules and the aggregated stylesheet here
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Production build: content hashes, no handshake data
    #[arg(long, env = "COMPONENT_COMPILER_PRODUCTION")]
    production: bool,

    /// JSON file with compile options (camelCase keys)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File extensions picked up in directory mode
    #[arg(long = "ext", default_value = DEFAULT_EXTENSION)]
    extensions: Vec<String>,

    /// Emit a source map per document
    #[arg(long)]
    source_maps: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Enable debug logging (same as RUST_LOG=debug)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileReport<'a> {
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a CompilationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a CompilerError>,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

fn load_options(cli: &Cli) -> Result<CompileOptions> {
    let mut options = match &cli.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            CompileOptions::from_json(&json)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => CompileOptions::default(),
    };

    if cli.production {
        options.production_mode = true;
        options.hash_mode = HashMode::Production;
    }
    if cli.source_maps {
        options.source_maps = true;
    }
    Ok(options)
}

fn collect_sources(cli: &Cli) -> Result<Vec<SourceFile>> {
    let paths = if cli.input.is_dir() {
        find_component_files(&cli.input, &cli.extensions)
    } else if cli.input.is_file() {
        vec![cli.input.clone()]
    } else {
        bail!("Input not found: {}", cli.input.display());
    };

    paths
        .iter()
        .map(|path| load_source_file(path).with_context(|| format!("Failed to read {}", path.display())))
        .collect()
}

fn write_outputs(out_dir: &Path, results: &[Arc<CompilationResult>]) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut styles = CollectedStyles::new();
    for result in results {
        let module_path = out_dir.join(format!("{}.js", result.component_name));
        fs::write(&module_path, &result.code)
            .with_context(|| format!("Failed to write {}", module_path.display()))?;
        if let Some(map) = &result.source_map {
            let map_path = out_dir.join(format!("{}.js.map", result.component_name));
            fs::write(&map_path, map).with_context(|| format!("Failed to write {}", map_path.display()))?;
        }
        publish_styles(result, &mut styles);
    }

    if !styles.is_empty() {
        let css_path = out_dir.join("styles.css");
        fs::write(&css_path, styles.stylesheet())
            .with_context(|| format!("Failed to write {}", css_path.display()))?;
    }
    tracing::info!(modules = results.len(), stylesheets = styles.len(), out_dir = %out_dir.display(), "wrote outputs");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = load_options(&cli)?;
    let sources = collect_sources(&cli)?;
    if sources.is_empty() {
        bail!("No component documents found under {}", cli.input.display());
    }

    let compiler = Compiler::new(options).with_cache(Arc::new(ResultCache::new()));
    let outcomes = compiler.compile_batch(&sources);

    let mut compiled = Vec::new();
    let mut reports = Vec::with_capacity(sources.len());
    for (source, outcome) in sources.iter().zip(&outcomes) {
        match outcome {
            Ok(result) => {
                for diagnostic in &result.diagnostics {
                    tracing::warn!(file = %source.path, code = %diagnostic.code, line = diagnostic.line, "{}", diagnostic.message);
                }
                compiled.push(Arc::clone(result));
                reports.push(FileReport {
                    path: &source.path,
                    result: Some(result.as_ref()),
                    error: None,
                });
            }
            Err(error) => {
                tracing::error!("{}", error);
                reports.push(FileReport {
                    path: &source.path,
                    result: None,
                    error: Some(error),
                });
            }
        }
    }

    let json = if cli.pretty {
        serde_json::to_string_pretty(&reports)?
    } else {
        serde_json::to_string(&reports)?
    };
    println!("{}", json);

    if let Some(out_dir) = &cli.out_dir {
        write_outputs(out_dir, &compiled)?;
    }

    let failures = outcomes.iter().filter(|o| o.is_err()).count();
    if failures > 0 {
        bail!("{} of {} documents failed to compile", failures, sources.len());
    }
    Ok(())
}
