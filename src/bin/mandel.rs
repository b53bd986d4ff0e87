// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

extern crate clap;
extern crate env_logger;
extern crate mandelterm;

use clap::{App, Arg, ArgMatches};
use mandelterm::{AnsiWriter, Backend, GridSpec, RenderConfig};
use std::io;
use std::str::FromStr;

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + Ord>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

const WORKERS: &str = "workers";
const MODE: &str = "mode";
const SIZE: &str = "size";
const LEFTLOWER: &str = "leftlower";
const RIGHTUPPER: &str = "rightupper";
const ITERATIONS: &str = "iterations";
const GLYPH: &str = "glyph";

fn args<'a>() -> ArgMatches<'a> {
    App::new("mandel")
        .version("0.1.0")
        .about("Draws the Mandelbrot set on a 256-color terminal, computing rows in parallel")
        .arg(
            Arg::with_name(WORKERS)
                .required(true)
                .index(1)
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        usize::max_value(),
                        "Could not parse worker count",
                        "Worker count must be at least 1",
                    )
                })
                .help("Number of threads or processes computing rows"),
        )
        .arg(
            Arg::with_name(MODE)
                .required(false)
                .long(MODE)
                .short("m")
                .takes_value(true)
                .possible_values(&["threads", "processes"])
                .default_value("threads")
                .help("Run workers as threads or as forked processes"),
        )
        .arg(
            Arg::with_name(SIZE)
                .required(false)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("90x50")
                .validator(|s| validate_pair::<usize>(&s, 'x', "Could not parse image size"))
                .help("Columns and rows of the image"),
        )
        .arg(
            Arg::with_name(LEFTLOWER)
                .required(false)
                .long(LEFTLOWER)
                .short("l")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("-1.8,-1.0")
                .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse left lower corner"))
                .help("Left lower corner of the complex plane"),
        )
        .arg(
            Arg::with_name(RIGHTUPPER)
                .required(false)
                .long(RIGHTUPPER)
                .short("r")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value("1.0,1.0")
                .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse right upper corner"))
                .help("Right upper corner of the complex plane"),
        )
        .arg(
            Arg::with_name(ITERATIONS)
                .required(false)
                .long(ITERATIONS)
                .short("i")
                .takes_value(true)
                .default_value("100000")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        10_000_000,
                        "Could not parse iteration count",
                        "Iteration count must be between 1 and 10000000",
                    )
                })
                .help("Iteration limit per point"),
        )
        .arg(
            Arg::with_name(GLYPH)
                .required(false)
                .long(GLYPH)
                .short("g")
                .takes_value(true)
                .default_value("@")
                .validator(|s| {
                    if s.len() == 1 && s.as_bytes()[0].is_ascii_graphic() {
                        Ok(())
                    } else {
                        Err("The glyph must be one printable ASCII character".to_string())
                    }
                })
                .help("Character drawn in every cell"),
        )
        .get_matches()
}

// The validators have already run, so parsing can only fail on a
// value clap did not see.
fn config(matches: &ArgMatches) -> Result<RenderConfig, String> {
    let workers = usize::from_str(matches.value_of(WORKERS).unwrap_or(""))
        .map_err(|_| "Could not parse worker count".to_string())?;
    let backend = Backend::from_str(matches.value_of(MODE).unwrap_or("threads"))
        .map_err(|e| e.to_string())?;
    let (columns, rows) = parse_pair::<usize>(matches.value_of(SIZE).unwrap_or(""), 'x')
        .ok_or_else(|| "Error parsing image size".to_string())?;
    let (xmin, ymin) = parse_pair::<f64>(matches.value_of(LEFTLOWER).unwrap_or(""), ',')
        .ok_or_else(|| "Error parsing left lower corner".to_string())?;
    let (xmax, ymax) = parse_pair::<f64>(matches.value_of(RIGHTUPPER).unwrap_or(""), ',')
        .ok_or_else(|| "Error parsing right upper corner".to_string())?;
    let max_iterations = usize::from_str(matches.value_of(ITERATIONS).unwrap_or(""))
        .map_err(|_| "Could not parse iteration count".to_string())?;
    let glyph = matches
        .value_of(GLYPH)
        .and_then(|g| g.bytes().next())
        .unwrap_or(b'@');

    Ok(RenderConfig {
        grid: GridSpec {
            columns,
            rows,
            xmin,
            xmax,
            ymin,
            ymax,
            max_iterations,
        },
        workers,
        backend,
        glyph,
    })
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let matches = args();
    let config = match config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration failure: {}", e);
            std::process::exit(1);
        }
    };

    let interrupt = match mandelterm::signals::install() {
        Ok(flag) => flag,
        Err(e) => {
            eprintln!("Render failure: {}", e);
            std::process::exit(1);
        }
    };

    let mut sink = AnsiWriter::new(io::stdout(), config.glyph);
    if let Err(e) = mandelterm::render(&config, &mut sink, interrupt) {
        eprintln!("Render failure: {}", e);
        std::process::exit(e.exit_code());
    }
}
