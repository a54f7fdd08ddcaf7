use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use env_logger::{Builder, Env};
use log::{error, LevelFilter};

use authenticity_fusion::batch::{self, ProcessResult};
use authenticity_fusion::{FusionConfig, FusionEngine};

#[derive(Parser)]
#[command(
    name = "fusion-risk",
    about = "Fuse AI, manipulation and metadata signals into one image authenticity risk",
    version,
    after_help = "Simple usage: fusion-risk <request.json>  (writes <request>_report.json)\n\n\
                  Scores are suspicion: higher means more likely generated or manipulated."
)]
struct Cli {
    /// Request JSON file or directory of request files
    input: String,

    /// Output report file or directory (default: {name}_report.json)
    #[arg(short, long)]
    output: Option<String>,

    /// Also write the merged heatmap as PNG (file for one request, directory for a batch)
    #[arg(long)]
    heatmap: Option<String>,

    /// TOML file overriding fusion weights and thresholds
    #[arg(short, long)]
    config: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(cli: &Cli) {
    let use_env = !cli.verbose && !cli.quiet && std::env::var_os("RUST_LOG").is_some();
    let mut builder = if use_env {
        Builder::from_env(Env::default())
    } else {
        let level = if cli.quiet {
            LevelFilter::Error
        } else if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        };
        let mut b = Builder::new();
        b.filter_level(level);
        b
    };
    builder
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = match &cli.config {
        Some(path) => match FusionConfig::load(Path::new(path)) {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to load config {path}: {e}");
                process::exit(1);
            }
        },
        None => FusionConfig::default(),
    };

    let engine = match FusionEngine::with_config(config) {
        Ok(e) => e,
        Err(e) => {
            error!("Fatal: Failed to initialize engine: {e}");
            process::exit(1);
        }
    };

    let input_path = Path::new(&cli.input);
    if !input_path.exists() {
        error!("Input path does not exist: {}", cli.input);
        process::exit(1);
    }

    let results = if input_path.is_dir() {
        let output_dir = if let Some(o) = &cli.output {
            PathBuf::from(o)
        } else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: fusion-risk <input_dir> -o <output_dir>");
            process::exit(1);
        };
        let heatmap_dir = cli.heatmap.as_deref().map(Path::new);
        batch::process_directory(&engine, input_path, &output_dir, heatmap_dir)
    } else {
        let output_path = match &cli.output {
            Some(o) => PathBuf::from(o),
            None => batch::default_output_path(input_path),
        };
        let heatmap = cli.heatmap.as_deref().map(Path::new);
        vec![batch::process_file(&engine, input_path, &output_path, heatmap)]
    };

    let mut success_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r, &cli);
        if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Fused: {success_count}");
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn print_result(result: &ProcessResult, cli: &Cli) {
    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.success {
        if !cli.quiet {
            match result.fusion_score {
                Some(score) => eprintln!("[OK] {filename} (fusion {score:.3})"),
                None => eprintln!("[OK] {filename}"),
            }
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }

    if cli.verbose && !result.message.is_empty() {
        eprintln!("  -> {}", result.message);
    }
}
