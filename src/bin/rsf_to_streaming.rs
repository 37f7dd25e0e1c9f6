//! Convert a v1 raw surfel file into a directory of streaming fragments
//!
//! Usage:
//!     rsf_to_streaming [OPTIONS] <INPUT.rsf> <OUTPUT_DIR>
//!
//! Options:
//!     --scale <S>             Scale positions and radii by S
//!     --min-prims <N>         Leaf size threshold (default: 128)
//!     --subtree-divisor <D>   Fragment depth = tree depth / D (default: 5)
//!     -j, --jobs <J>          Threads used to write fragments (default: all cores)
//!     -h, --help              Show this help message

use std::env;
use std::path::PathBuf;
use std::time::Instant;

use surfkd::core::logging;
use surfkd::streaming::{write_streaming_surfels, StreamingOptions};
use surfkd::surfel::rsf::read_raw_surfels_v1;

fn print_help() {
    eprintln!("rsf_to_streaming - Build streaming fragment files from a raw surfel file");
    eprintln!();
    eprintln!("Usage: rsf_to_streaming [OPTIONS] <INPUT.rsf> <OUTPUT_DIR>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("    --scale <S>             Scale positions and radii by S");
    eprintln!("    --min-prims <N>         Leaf size threshold (default: 128)");
    eprintln!("    --subtree-divisor <D>   Fragment depth = tree depth / D (default: 5)");
    eprintln!("    -j, --jobs <J>          Threads used to write fragments (default: all cores)");
    eprintln!("    -h, --help              Show this help message");
    eprintln!();
    eprintln!("Example:");
    eprintln!("    rsf_to_streaming --scale 0.01 scan.rsf ./web/scan");
}

#[derive(Debug)]
struct Args {
    input: PathBuf,
    output_dir: PathBuf,
    scale: Option<f32>,
    options: StreamingOptions,
    jobs: Option<usize>,
}

fn next_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("Missing value for {}", flag))
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut scale = None;
    let mut options = StreamingOptions::default();
    let mut jobs = None;
    let mut positional = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "--scale" => {
                let v = next_value(&args, &mut i, "--scale")?;
                let s: f32 = v.parse().map_err(|_| format!("Invalid scale: {}", v))?;
                if s <= 0.0 {
                    return Err(format!("Scale must be positive: {}", v));
                }
                scale = Some(s);
            }
            "--min-prims" => {
                let v = next_value(&args, &mut i, "--min-prims")?;
                options.tree.min_prims = v.parse().map_err(|_| format!("Invalid min-prims: {}", v))?;
            }
            "--subtree-divisor" => {
                let v = next_value(&args, &mut i, "--subtree-divisor")?;
                options.subtree_divisor = v.parse().map_err(|_| format!("Invalid subtree-divisor: {}", v))?;
                if options.subtree_divisor == 0 {
                    return Err("Subtree divisor must be at least 1".to_string());
                }
            }
            "-j" | "--jobs" => {
                let v = next_value(&args, &mut i, "--jobs")?;
                jobs = Some(v.parse().map_err(|_| format!("Invalid jobs: {}", v))?);
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            path => positional.push(PathBuf::from(path)),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    match (positional.next(), positional.next(), positional.next()) {
        (Some(input), Some(output_dir), None) => Ok(Args { input, output_dir, scale, options, jobs }),
        (_, _, Some(_)) => Err("Too many arguments".to_string()),
        _ => Err("Expected an input file and an output directory".to_string()),
    }
}

fn main() {
    logging::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    };

    if let Some(jobs) = args.jobs {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(jobs).build_global() {
            log::warn!("Failed to configure thread pool: {}", e);
        }
    }

    let start = Instant::now();
    let surfels = match read_raw_surfels_v1(&args.input) {
        Ok(s) => s,
        Err(e) => {
            log::error!("Failed to read {}: {}", args.input.display(), e);
            std::process::exit(1);
        }
    };

    let total = surfels.len();
    let surfels: Vec<_> = surfels
        .into_iter()
        .filter(|s| s.is_finite())
        .map(|s| match args.scale {
            Some(factor) => s.scaled(factor),
            None => s,
        })
        .collect();
    if surfels.len() < total {
        log::warn!("Dropped {} surfels with non-finite position or normal", total - surfels.len());
    }

    match write_streaming_surfels(&args.output_dir, surfels, &args.options) {
        Ok(summary) => {
            log::info!(
                "Wrote {} fragments ({} nodes, tree depth {}, {} levels per fragment) to {} in {:.1}s",
                summary.fragment_count,
                summary.node_count,
                summary.tree_depth,
                summary.subtree_depth,
                args.output_dir.display(),
                start.elapsed().as_secs_f64()
            );
        }
        Err(e) => {
            log::error!("Conversion failed: {}", e);
            std::process::exit(1);
        }
    }
}
