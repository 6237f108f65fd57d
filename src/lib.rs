//! Rust library for compiling the text files of the [zoneinfo
//! database][w] into resolved time zone timelines.
//!
//! The zoneinfo (or Olson) database records civil time changes across the
//! world as plain-text region files, one per continent. Each named zone in
//! those files is described indirectly: a sequence of *zone periods* gives
//! the base offset and abbreviation template in force up to some date,
//! while separately-declared *rule sets* describe the recurring daylight
//! saving transitions a period is subject to. This crate correlates the
//! two and produces, per zone, the fully resolved list of UTC instants at
//! which the zone's offset or abbreviation changes.
//!
//! The database itself is maintained by IANA. For more information, see
//! [IANA's page on the time zone database][iana]. You can also find the
//! text files themselves in [the tz repository][tz].
//!
//! [iana]: https://www.iana.org/time-zones
//! [tz]: https://github.com/eggert/tz
//! [w]: https://en.wikipedia.org/wiki/Tz_database
//!
//! ## Outline
//!
//! Compiling a set of zoneinfo text files is split into four stages:
//!
//! - **Parsing** individual lines of text into `Line`s is done by the
//!   `line` module;
//! - **Interpreting** these lines into a complete `Table` is done by the
//!   `table` module;
//! - **Expanding** each rule set into a date-ordered list of concrete
//!   rule instances is done by the `expand` module;
//! - **Resolving** a zone's periods against the expanded rules into a
//!   monotonic timeline of transitions is done by the `transitions`
//!   module.

#![warn(missing_copy_implementations)]
#![warn(nonstandard_style)]
#![warn(trivial_numeric_casts)]
#![warn(unreachable_pub)]
#![warn(unused)]

pub mod expand;
pub mod line;
pub mod table;
pub mod transitions;

/// The region files of the database that this compiler reads.
pub const FILES: &[&str] = &[
    "africa",
    "antarctica",
    "asia",
    "australasia",
    "europe",
    "northamerica",
    "southamerica",
];
