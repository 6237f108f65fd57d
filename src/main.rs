//! Command line front end: read the region files of an Olson database
//! checkout, compile every zone, and optionally write one file per zone
//! into an output directory.

use std::env::args_os;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::exit;

use log::{error, warn};
use quick_error::quick_error;

use zoneinfo_compile::line::{self, Line, LineParser};
use zoneinfo_compile::table::{Table, TableBuilder};
use zoneinfo_compile::transitions::{resolve_all, Resolved, TimeZone};
use zoneinfo_compile::FILES;

quick_error! {
    /// Anything that can go wrong at any stage in the program, causing it
    /// to return 1 instead of 0.
    #[derive(Debug)]
    enum Error {
        /// A file or directory couldn't be read or written to.
        Io(err: std::io::Error) {
            from()
            display("IO error: {}", err)
            source(err)
        }

        /// The user's command-line args didn't parse.
        Options(err: getopts::Fail) {
            from()
            display("error parsing options: {}", err)
        }

        /// No (or more than one) input directory was given.
        Usage {
            display("usage: zoneinfo-compile [-o DIR] [-d] OLSEN_DIR")
        }

        /// A line of a region file failed to parse.
        Parse(file: &'static str, line: usize, err: line::Error) {
            display("{}:{}: {}", file, line, err)
            source(err)
        }

        /// A parsed line couldn't be added to the table.
        Table(file: &'static str, line: usize, message: String) {
            display("{}:{}: {}", file, line, message)
        }

        /// Some files or zones failed; their errors have already been
        /// reported individually.
        Failed(count: usize) {
            display("{} errors during compilation", count)
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e);
        exit(1);
    }
}

fn run() -> Result<(), Error> {
    let mut opts = getopts::Options::new();
    opts.optopt(
        "o",
        "output",
        "directory to write one file per compiled zone into",
        "DIR",
    );
    opts.optflag("d", "debug", "trace each period and each rule application");
    opts.optflag("h", "help", "print this help text");

    let matches = opts.parse(args_os().skip(1))?;
    if matches.opt_present("help") {
        print!(
            "{}",
            opts.usage("Usage: zoneinfo-compile [options] OLSEN_DIR")
        );
        return Ok(());
    }

    let olsen_dir = match matches.free.as_slice() {
        [dir] => PathBuf::from(dir),
        _ => return Err(Error::Usage),
    };

    env_logger::Builder::new()
        .filter_level(if matches.opt_present("debug") {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .init();

    let parser = LineParser::default();
    let mut table = Table::default();
    let mut errors = 0;

    // Each region file stands alone: one that fails to parse is dropped
    // whole, and the rest of the compilation carries on without it.
    for &fname in FILES {
        match load_file(&parser, &olsen_dir.join(fname), fname) {
            Ok(file_table) => table.extend(file_table),
            Err(e) => {
                error!("{}", e);
                errors += 1;
            }
        }
    }

    let resolved = resolve_all(&table);
    for failure in &resolved.failures {
        error!("{}", failure);
    }
    errors += resolved.failures.len();

    if let Some(dest) = matches.opt_str("output") {
        write_zones(Path::new(&dest), &resolved)?;
    }

    println!("Compiled {} time zones.", resolved.timezones.len());
    if errors > 0 {
        return Err(Error::Failed(errors));
    }
    Ok(())
}

/// Parses one region file into its own table.
fn load_file(parser: &LineParser, path: &Path, fname: &'static str) -> Result<Table, Error> {
    let text = fs::read_to_string(path)?;
    let mut builder = TableBuilder::new();

    for (index, raw) in text.lines().enumerate() {
        let number = index + 1;

        // Strip the comment portion, if any; the grammar allows one at
        // the end of every line.
        let line = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };

        let parsed = match parser.parse_str(line) {
            Ok(parsed) => parsed,
            Err(line::Error::InvalidLineType(_)) => {
                warn!("{}:{}: unrecognised line kind, skipping", fname, number);
                continue;
            }
            Err(err) => return Err(Error::Parse(fname, number, err)),
        };

        let added = match parsed {
            Line::Space => Ok(()),
            Line::Zone(zone) => builder.add_zone_line(zone).map_err(|e| e.to_string()),
            Line::Continuation(info) => builder
                .add_continuation_line(info)
                .map_err(|e| e.to_string()),
            Line::Rule(rule) => builder.add_rule_line(rule).map_err(|e| e.to_string()),
            Line::Link(link) => builder.add_link_line(link).map_err(|e| e.to_string()),
        };
        if let Err(message) = added {
            return Err(Error::Table(fname, number, message));
        }
    }

    Ok(builder.build())
}

/// Writes each compiled zone to `dest/<zone_name>`, with the slashes of
/// the zone name as directory separators.
fn write_zones(dest: &Path, resolved: &Resolved) -> Result<(), Error> {
    for (name, tz) in &resolved.timezones {
        let path = dest.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = String::new();
        match tz {
            TimeZone::Fixed(fixed) => {
                out.push_str(&format!(
                    "fixed\t{}\t{}\t{}\n",
                    fixed.offset, fixed.save, fixed.abbr
                ));
            }
            TimeZone::Variable(variable) => {
                for transition in &variable.transitions {
                    out.push_str(&format!(
                        "{}\t{}\t{}\t{}\n",
                        transition.utc,
                        transition.tz.offset,
                        transition.tz.save,
                        transition.tz.abbr
                    ));
                }
            }
        }
        fs::write(&path, out)?;
    }
    Ok(())
}
