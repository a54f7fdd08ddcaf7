//! Fuse a single request file and print the report.
//!
//! Usage:
//! ```sh
//! cargo run --example fuse_request -- request.json
//! ```

use std::env;
use std::path::Path;
use std::process;

use authenticity_fusion::batch;
use authenticity_fusion::refine::RefineScratch;
use authenticity_fusion::FusionEngine;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <request.json>", args[0]);
        process::exit(1);
    }

    let engine = FusionEngine::new();
    let mut scratch = RefineScratch::default();
    match batch::analyze_file(&engine, Path::new(&args[1]), &mut scratch) {
        Ok((result, report)) => {
            println!("{}", report.summary);
            println!(
                "suspicion {:.3}, authenticity {:.3}",
                result.fusion_score,
                result.authenticity()
            );
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
