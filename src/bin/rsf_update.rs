//! Convert a v1 raw surfel file into the single-file v2 layout with a
//! monolithic kd-tree
//!
//! Usage:
//!     rsf_update [--scale <S>] <INPUT.rsf> <OUTPUT.rsf>

use std::env;
use std::path::PathBuf;

use surfkd::core::logging;
use surfkd::surfel::rsf::{read_raw_surfels_v1, write_raw_surfels_v2};

fn print_help() {
    eprintln!("rsf_update - Convert a v1 raw surfel file to v2");
    eprintln!();
    eprintln!("Usage: rsf_update [--scale <S>] <INPUT.rsf> <OUTPUT.rsf>");
}

fn parse_args() -> Result<(PathBuf, PathBuf, Option<f32>), String> {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut scale = None;
    let mut paths = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "--scale" => {
                i += 1;
                let v = args.get(i).ok_or("Missing value for --scale")?;
                scale = Some(v.parse::<f32>().map_err(|_| format!("Invalid scale: {}", v))?);
            }
            arg if arg.starts_with('-') => return Err(format!("Unknown option: {}", arg)),
            path => paths.push(PathBuf::from(path)),
        }
        i += 1;
    }

    match <[PathBuf; 2]>::try_from(paths) {
        Ok([input, output]) => Ok((input, output, scale)),
        Err(_) => Err("Expected an input and an output file".to_string()),
    }
}

fn main() {
    logging::init();

    let (input, output, scale) = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    let result = read_raw_surfels_v1(&input).and_then(|surfels| {
        let surfels: Vec<_> = match scale {
            Some(factor) if factor > 0.0 => surfels.into_iter().map(|s| s.scaled(factor)).collect(),
            _ => surfels,
        };
        write_raw_surfels_v2(&output, &surfels)
    });

    if let Err(e) = result {
        log::error!("Conversion failed: {}", e);
        std::process::exit(1);
    }
}
