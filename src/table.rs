//! Collecting parsed zoneinfo data lines into a set of time zone data.
//!
//! This module provides the `Table` struct, which is able to take parsed
//! lines of input from the `line` module and coalesce them into a single
//! set of data.
//!
//! It's not as simple as it seems, because the zoneinfo data lines refer
//! to each other through strings: lines of the form "link zone A to B"
//! could be *parsed* successfully but still fail to be *interpreted*
//! successfully if "B" doesn't exist. So it has to check every step of
//! the way—nothing wrong with this, it's just a consequence of reading
//! data from a text file.
//!
//! This module only deals with constructing a table from data: any
//! analysis of the data is done elsewhere.
//!
//! ## Example
//!
//! ```
//! use zoneinfo_compile::line::{Line, LineParser};
//! use zoneinfo_compile::table::TableBuilder;
//!
//! let parser = LineParser::default();
//! let mut builder = TableBuilder::new();
//!
//! let zone = "Zone  Pacific/Auckland  11:39:04  -  LMT  1868  Nov  2";
//! let link = "Link  Pacific/Auckland  Antarctica/McMurdo";
//!
//! for line in [zone, link] {
//!     match parser.parse_str(line)? {
//!         Line::Zone(zone) => builder.add_zone_line(zone).unwrap(),
//!         Line::Continuation(cont) => builder.add_continuation_line(cont).unwrap(),
//!         Line::Rule(rule) => builder.add_rule_line(rule).unwrap(),
//!         Line::Link(link) => builder.add_link_line(link).unwrap(),
//!         Line::Space => {}
//!     }
//! }
//!
//! let table = builder.build();
//!
//! assert!(table.get_zoneset("Pacific/Auckland").is_some());
//! assert!(table.get_zoneset("Antarctica/McMurdo").is_some());
//! assert!(table.get_zoneset("UTC").is_none());
//! # Ok::<(), zoneinfo_compile::line::Error>(())
//! ```

use std::collections::hash_map::{Entry, HashMap};
use std::fmt;

use log::warn;

use crate::line::{self, DaySpec, Month, Time, TimeKind, UntilDateTime, Year};

/// The first year of the era the compiler materialises rules for. Rules
/// reaching further into the past are clamped here.
pub const MIN_YEAR: i64 = 1800;

/// The last year of the era, inclusive. Rules reaching further into the
/// future are clamped here.
pub const MAX_YEAR: i64 = 2038;

/// `1800-01-01T00:00:00Z`, the instant every zone's timeline opens at.
pub const MIN_DATETIME: i64 = -5_364_662_400;

/// `2038-12-31T00:00:00Z`, the instant resolution stops at. Periods with
/// no end time run to here.
pub const MAX_DATETIME: i64 = 2_177_366_400;

/// The westernmost standard offset the database is expected to contain
/// (`-15:56:00`). Values beyond it are suspicious but not fatal.
pub const MIN_OFFSET: i64 = -(15 * 3600 + 56 * 60);

/// The easternmost standard offset the database is expected to contain
/// (`+15:13:42`).
pub const MAX_OFFSET: i64 = 15 * 3600 + 13 * 60 + 42;

/// The smallest saving a rule is expected to apply.
pub const MIN_SAVE: i64 = 0;

/// The largest saving a rule is expected to apply (two hours).
pub const MAX_SAVE: i64 = 2 * 3600;

/// The widest possible gap between the same instant expressed against two
/// different clocks, given the offset and save bounds above. Two times in
/// mixed references closer together than this cannot be ordered safely.
pub const MAX_ABS_DIFF: i64 = (MAX_OFFSET + MAX_SAVE) - (MIN_OFFSET + MIN_SAVE);

/// A **table** of all the data in one or more zoneinfo files.
#[derive(PartialEq, Debug, Default)]
pub struct Table {
    /// Mapping of ruleset names to rulesets.
    pub rulesets: HashMap<String, Vec<RuleInfo>>,

    /// Mapping of zoneset names to zonesets.
    pub zonesets: HashMap<String, Vec<ZoneInfo>>,

    /// Mapping of alias names to the zone names they link to.
    pub links: HashMap<String, String>,
}

impl Table {
    /// Tries to find the zoneset with the given name by looking it up in
    /// either the zonesets map or the links map.
    pub fn get_zoneset(&self, zone_name: &str) -> Option<&[ZoneInfo]> {
        if let Some(zoneset) = self.zonesets.get(zone_name) {
            Some(zoneset)
        } else if let Some(target) = self.links.get(zone_name) {
            self.zonesets.get(target).map(|zoneset| &**zoneset)
        } else {
            None
        }
    }

    /// Looks up a ruleset by name.
    pub fn get_ruleset(&self, ruleset_name: &str) -> Option<&[RuleInfo]> {
        self.rulesets.get(ruleset_name).map(|ruleset| &**ruleset)
    }

    /// Merges another table into this one. Used to combine the per-file
    /// tables of a multi-file compilation; names are expected to be
    /// distinct across files.
    pub fn extend(&mut self, other: Table) {
        self.rulesets.extend(other.rulesets);
        self.zonesets.extend(other.zonesets);
        self.links.extend(other.links);
    }
}

/// An owned rule definition line.
///
/// This mimics the `Rule` struct in the `line` module, only it uses owned
/// Strings instead of string slices, and drops the ruleset name (which
/// becomes the key in the table).
#[derive(PartialEq, Debug, Clone)]
pub struct RuleInfo {
    /// The year that this rule *starts* applying.
    pub from: Year,

    /// The year that this rule *finishes* applying, inclusive, or `None`
    /// if it applies during the starting year only.
    pub to: Option<Year>,

    /// The month it applies on.
    pub month: Month,

    /// The day it applies on.
    pub day: DaySpec,

    /// The exact time it applies on.
    pub at: Time,

    /// The clock that time is measured against.
    pub at_kind: TimeKind,

    /// The amount of time to save.
    pub save: Time,

    /// Any extra letters that should be added to this time zone's
    /// abbreviation, in place of `%s`.
    pub letter: Option<String>,
}

impl<'line> From<line::Rule<'line>> for RuleInfo {
    fn from(info: line::Rule) -> RuleInfo {
        RuleInfo {
            from: info.from,
            to: info.to,
            month: info.month,
            day: info.day,
            at: info.at,
            at_kind: info.at_kind,
            save: info.save,
            letter: info.letter.map(str::to_owned),
        }
    }
}

impl RuleInfo {
    /// The years this rule fires in, clamped to the compiler's era. An
    /// explicit `from` later than an explicit `to` produces an empty
    /// range.
    pub fn years(&self) -> std::ops::RangeInclusive<i64> {
        let from = match self.from {
            Year::Minimum => MIN_YEAR,
            Year::Maximum => MAX_YEAR,
            Year::Number(year) => year.max(MIN_YEAR),
        };
        let to = match self.to {
            None => from,
            Some(Year::Minimum) => MIN_YEAR,
            Some(Year::Maximum) => MAX_YEAR,
            Some(Year::Number(year)) => year.min(MAX_YEAR),
        };
        from..=to
    }
}

/// An owned zone definition line.
///
/// This struct mimics the `ZoneInfo` struct in the `line` module, *not*
/// the `Zone` struct, which is the key name in the map—this is just the
/// value.
#[derive(PartialEq, Debug, Clone)]
pub struct ZoneInfo {
    /// The amount of time that needs to be added to UTC to get the
    /// standard time in this zone.
    pub offset: Time,

    /// The name of all the rules that should apply in the time zone, or
    /// the amount of daylight-saving time to add.
    pub saving: Saving,

    /// The format for time zone abbreviations.
    pub format: Format,

    /// The time at which the rules change for this time zone, or `None`
    /// if this period runs to the end of the era.
    pub until: Option<UntilDateTime>,
}

impl<'line> From<line::ZoneInfo<'line>> for ZoneInfo {
    fn from(info: line::ZoneInfo) -> ZoneInfo {
        ZoneInfo {
            offset: info.offset,
            saving: match info.saving {
                line::Saving::NoSaving => Saving::NoSaving,
                line::Saving::Multiple(s) => Saving::Multiple(s.to_owned()),
                line::Saving::OneOff(t) => Saving::OneOff(t),
            },
            format: Format::new(info.format),
            until: info.until,
        }
    }
}

/// The amount of daylight saving time (DST) to apply to this period. This
/// is the owned version of the `Saving` type in the `line` module.
#[derive(PartialEq, Debug, Clone)]
pub enum Saving {
    /// Just stick to the base offset.
    NoSaving,

    /// This amount of time should be saved while this period is in
    /// effect. (This is the equivalent to there being a single one-off
    /// rule with the given amount of time to save).
    OneOff(Time),

    /// All rules with the given name should apply while this period is in
    /// effect.
    Multiple(String),
}

/// The format string to generate a time zone abbreviation from.
#[derive(PartialEq, Debug, Clone)]
pub enum Format {
    /// A constant format, which remains the same throughout both standard
    /// and DST periods.
    Constant(String),

    /// An alternate format, such as "PST/PDT", which changes between
    /// standard and DST periods.
    Alternate {
        /// Abbreviation to use during standard time.
        standard: String,

        /// Abbreviation to use during summer time.
        dst: String,
    },

    /// A format with a placeholder `%s`, which uses the letter of the
    /// rule in force to generate the time zone abbreviation.
    Placeholder(String),
}

impl Format {
    /// Convert the template into one of the `Format` variants. This can't
    /// fail, as any syntax that doesn't match one of the formats will just
    /// be a 'constant' format. The literal `zzz` means the zone has no
    /// abbreviation at all.
    pub fn new(template: &str) -> Format {
        if template == "zzz" {
            Format::Constant(String::new())
        } else if let Some(pos) = template.find('/') {
            Format::Alternate {
                standard: template[..pos].to_owned(),
                dst: template[pos + 1..].to_owned(),
            }
        } else if template.contains("%s") {
            Format::Placeholder(template.to_owned())
        } else {
            Format::Constant(template.to_owned())
        }
    }

    /// The abbreviation in force while the given saving applies, with the
    /// given rule letter (if any) substituted for the placeholder.
    pub fn format(&self, save: Time, letter: Option<&str>) -> String {
        match *self {
            Format::Constant(ref s) => s.clone(),
            Format::Placeholder(ref s) => s.replace("%s", letter.unwrap_or("")),
            Format::Alternate { ref standard, .. } if save == Time::ZERO => standard.clone(),
            Format::Alternate { ref dst, .. } => dst.clone(),
        }
    }
}

/// A builder for `Table` values based on various line definitions.
#[derive(PartialEq, Debug)]
pub struct TableBuilder {
    /// The table that's being built up.
    table: Table,

    /// If the last line was a zone definition, then this holds its name.
    /// `None` otherwise. This is so continuation lines can be added to
    /// the same zone as the original zone line.
    current_zoneset_name: Option<String>,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    /// Creates a new builder with an empty table.
    pub fn new() -> TableBuilder {
        TableBuilder {
            table: Table::default(),
            current_zoneset_name: None,
        }
    }

    /// Adds a new line describing a zone definition.
    ///
    /// Returns an error if there's already a zone with the same name.
    pub fn add_zone_line<'line>(
        &mut self,
        zone_line: line::Zone<'line>,
    ) -> Result<(), Error<'line>> {
        let zoneset = match self.table.zonesets.entry(zone_line.name.to_owned()) {
            Entry::Occupied(_) => return Err(Error::DuplicateZone),
            Entry::Vacant(e) => e.insert(Vec::new()),
        };

        check_bounds(zone_line.name, &zone_line.info);
        zoneset.push(zone_line.info.into());
        self.current_zoneset_name = Some(zone_line.name.to_owned());
        Ok(())
    }

    /// Adds a new line describing the *continuation* of a zone definition.
    ///
    /// Returns an error if the builder wasn't expecting a continuation
    /// line (meaning, the previous line wasn't a zone line).
    pub fn add_continuation_line(
        &mut self,
        continuation_line: line::ZoneInfo,
    ) -> Result<(), Error> {
        let name = match self.current_zoneset_name {
            Some(ref name) => name,
            None => return Err(Error::SurpriseContinuationLine),
        };

        check_bounds(name, &continuation_line);
        if let Some(zoneset) = self.table.zonesets.get_mut(name) {
            zoneset.push(continuation_line.into());
        }
        Ok(())
    }

    /// Adds a new line describing one entry in a ruleset, creating that
    /// set if it didn't exist already.
    pub fn add_rule_line(&mut self, rule_line: line::Rule) -> Result<(), Error> {
        let save = rule_line.save.as_secs();
        if !(MIN_SAVE..=MAX_SAVE).contains(&save) {
            warn!(
                "rule set {}: save {} outside the expected range [{}, {}]",
                rule_line.name,
                rule_line.save,
                Time::from_secs(MIN_SAVE),
                Time::from_secs(MAX_SAVE),
            );
        }

        let ruleset = self
            .table
            .rulesets
            .entry(rule_line.name.to_owned())
            .or_default();

        ruleset.push(rule_line.into());
        self.current_zoneset_name = None;
        Ok(())
    }

    /// Adds a new line linking one zone to another.
    ///
    /// Returns an error if there was already a link with that name.
    pub fn add_link_line<'line>(
        &mut self,
        link_line: line::Link<'line>,
    ) -> Result<(), Error<'line>> {
        match self.table.links.entry(link_line.alias.to_owned()) {
            Entry::Occupied(_) => Err(Error::DuplicateLink(link_line.alias)),
            Entry::Vacant(e) => {
                let _ = e.insert(link_line.canonical.to_owned());
                self.current_zoneset_name = None;
                Ok(())
            }
        }
    }

    /// Returns the table after it's finished being built.
    pub fn build(self) -> Table {
        self.table
    }
}

fn check_bounds(zone_name: &str, info: &line::ZoneInfo) {
    if !(MIN_OFFSET..=MAX_OFFSET).contains(&info.offset.as_secs()) {
        warn!(
            "zone {}: UTC offset {} outside the expected range [{}, {}]",
            zone_name,
            info.offset,
            Time::from_secs(MIN_OFFSET),
            Time::from_secs(MAX_OFFSET),
        );
    }

    if let line::Saving::OneOff(save) = info.saving {
        if !(MIN_SAVE..=MAX_SAVE).contains(&save.as_secs()) {
            warn!(
                "zone {}: save {} outside the expected range [{}, {}]",
                zone_name,
                save,
                Time::from_secs(MIN_SAVE),
                Time::from_secs(MAX_SAVE),
            );
        }
    }
}

/// Something that can go wrong while constructing a `Table`.
#[derive(PartialEq, Debug, Copy, Clone)]
pub enum Error<'line> {
    /// A continuation line was passed in, but the previous line wasn't a
    /// zone definition line.
    SurpriseContinuationLine,

    /// A link line was passed in, but there's already a link with that
    /// name.
    DuplicateLink(&'line str),

    /// A zone line was passed in, but there's already a zone with that
    /// name.
    DuplicateZone,
}

impl<'line> fmt::Display for Error<'line> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::SurpriseContinuationLine => {
                write!(
                    f,
                    "continuation line follows line that isn't a zone definition line"
                )
            }
            Error::DuplicateLink(name) => write!(f, "link line with name that already exists: {}", name),
            Error::DuplicateZone => write!(f, "zone line with name that already exists"),
        }
    }
}

impl<'line> std::error::Error for Error<'line> {}
