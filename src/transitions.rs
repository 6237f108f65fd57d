//! Resolving a zone's periods and rules into a timeline of transitions.
//!
//! Once a table has been fully built, each of its zones needs to be
//! turned into a *transition timeline*: the UTC instants at which the
//! zone's offset from UTC or its abbreviation changes, each paired with
//! the fixed offset/abbreviation state that applies from then on. One
//! timeline is produced per named zone; a zone whose timeline never
//! actually changes collapses to a single fixed state.
//!
//! The hard part is that the input mixes three clocks. A period's end
//! time and a rule's time of day may each be given in wall-clock time,
//! standard time, or UTC, and the wall clock itself moves whenever a rule
//! fires. The resolver therefore walks a zone's periods in order,
//! carrying the UTC instant the current period started at together with
//! the saving and abbreviation letter in force, and converts every local
//! instant to UTC with the offset and saving that applied *just before*
//! the instant in question.
//!
//! ### Example
//!
//! The rules named by the Poland-era entries of the `europe` file include
//! a pair that overlap in an awkward way:
//!
//! ```tz
//! # Rule  NAME    FROM    TO      TYPE    IN      ON      AT      SAVE    LETTER/S
//! Rule    Poland  1918    1919    -       Sep     16      2:00s   0       -
//! Rule    Poland  1919    only    -       Apr     15      2:00s   1:00    S
//! ```
//!
//! The first rule fires in both 1918 and 1919, the second in between, so
//! neither rule's instances are contiguous in time. That is why rule sets
//! are expanded to concrete dates and sorted before the resolver sees
//! them: walking the expanded list in date order yields September 1918,
//! April 1919, September 1919, with the saving toggling 0 → 1:00 → 0.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, warn};

use crate::expand::{self, ExpansionCache};
use crate::line::{self, Time, TimeKind};
use crate::table::{Saving, Table, ZoneInfo, MAX_ABS_DIFF, MAX_DATETIME, MIN_DATETIME};

/// One fixed offset/abbreviation state of a zone.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct FixedTimeZone {
    /// The abbreviation in use during this state.
    pub abbr: String,

    /// The base offset from UTC during this state.
    pub offset: Time,

    /// The extra daylight-saving offset during this state.
    pub save: Time,
}

impl FixedTimeZone {
    /// The total offset from UTC in effect during this state.
    pub fn total_offset(&self) -> Time {
        self.offset + self.save
    }
}

/// A point in UTC at which a zone changes into a new fixed state.
#[derive(PartialEq, Debug, Clone)]
pub struct Transition {
    /// The UTC instant of the change, in seconds since the Unix epoch.
    pub utc: i64,

    /// The state the zone changes into.
    pub tz: FixedTimeZone,
}

/// A zone whose offset or abbreviation changes over time: its name and
/// the strictly increasing timeline of its transitions.
#[derive(PartialEq, Debug, Clone)]
pub struct VariableTimeZone {
    pub name: String,
    pub transitions: Vec<Transition>,
}

/// The resolved form of one named zone.
#[derive(PartialEq, Debug, Clone)]
pub enum TimeZone {
    /// The zone has a single state for the whole era.
    Fixed(FixedTimeZone),

    /// The zone changes state at least once.
    Variable(VariableTimeZone),
}

/// Something that can go wrong while resolving a zone. Every variant
/// names the zone it concerns, so a caller processing a whole table can
/// report failures individually and carry on.
#[derive(PartialEq, Debug, Clone)]
pub enum Error {
    /// The table contains no zone with the requested name.
    UnknownZone(String),

    /// A period names a rule set the table does not contain.
    UnknownRuleset { zone: String, ruleset: String },

    /// Two of the zone's periods end so close together, on different
    /// clocks, that their order cannot be established.
    AmbiguousPeriodOrder { zone: String },

    /// A period's end time has no resolvable day.
    UntilResolution { zone: String, error: line::Error },

    /// A rule set the zone depends on failed to expand.
    Expand { zone: String, error: expand::Error },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnknownZone(name) => write!(f, "zone {}: not present in the table", name),
            Error::UnknownRuleset { zone, ruleset } => {
                write!(f, "zone {}: unknown rule set {}", zone, ruleset)
            }
            Error::AmbiguousPeriodOrder { zone } => {
                write!(
                    f,
                    "zone {}: period end times in mixed references are too close to order",
                    zone
                )
            }
            Error::UntilResolution { zone, error } => write!(f, "zone {}: {}", zone, error),
            Error::Expand { zone, error } => write!(f, "zone {}: {}", zone, error),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::UntilResolution { error, .. } => Some(error),
            Error::Expand { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Converts an instant on the clock `kind` names into UTC, given the
/// standard offset and saving in force.
fn to_utc(instant: i64, kind: TimeKind, offset: i64, save: i64) -> i64 {
    match kind {
        TimeKind::Universal => instant,
        TimeKind::Wall => instant - offset - save,
        TimeKind::Standard => instant - offset,
    }
}

/// The inverse of [`to_utc`]: a UTC instant expressed on the clock `kind`
/// names.
fn to_local(utc: i64, kind: TimeKind, offset: i64, save: i64) -> i64 {
    match kind {
        TimeKind::Universal => utc,
        TimeKind::Wall => utc + offset + save,
        TimeKind::Standard => utc + offset,
    }
}

/// Appends a transition, keeping the timeline strictly increasing and
/// change-only: a transition at the same instant as the previous one
/// overwrites it, and a transition into the state already in force is
/// dropped.
fn push_transition(transitions: &mut Vec<Transition>, utc: i64, tz: FixedTimeZone) {
    let len = transitions.len();
    if len > 0 && transitions[len - 1].utc == utc {
        transitions[len - 1].tz = tz;
        if len >= 2 && transitions[len - 2].tz == transitions[len - 1].tz {
            transitions.pop();
        }
    } else if len > 0 && transitions[len - 1].tz == tz {
        // No observable change.
    } else {
        transitions.push(Transition { utc, tz });
    }
}

/// Trait to put the `resolve` method on Tables.
pub trait TableResolve {
    /// Resolves the timeline for the time zone with the given name.
    fn resolve(&self, zone_name: &str, cache: &mut ExpansionCache) -> Result<TimeZone, Error>;
}

impl TableResolve for Table {
    fn resolve(&self, zone_name: &str, cache: &mut ExpansionCache) -> Result<TimeZone, Error> {
        let zoneset = self
            .get_zoneset(zone_name)
            .ok_or_else(|| Error::UnknownZone(zone_name.to_owned()))?;

        // Resolve every period's end time up front and order the periods
        // by it. End times on different clocks can only be ordered when
        // they are further apart than the largest offset swing the data
        // can contain.
        let mut periods = Vec::with_capacity(zoneset.len());
        for info in zoneset {
            let (until, until_kind) = match info.until {
                Some(until) => {
                    let instant = until.to_timestamp().map_err(|error| Error::UntilResolution {
                        zone: zone_name.to_owned(),
                        error,
                    })?;
                    (instant, until.kind())
                }
                None => (MAX_DATETIME, TimeKind::Wall),
            };
            periods.push((info, until, until_kind));
        }

        periods.sort_by_key(|&(_, until, _)| until);

        for pair in periods.windows(2) {
            let (_, until_a, kind_a) = pair[0];
            let (_, until_b, kind_b) = pair[1];
            if kind_a != kind_b && until_b - until_a <= MAX_ABS_DIFF {
                return Err(Error::AmbiguousPeriodOrder {
                    zone: zone_name.to_owned(),
                });
            }
        }

        let mut start_utc = MIN_DATETIME;
        let mut save: i64;
        let mut letter: Option<String>;
        let mut transitions = Vec::new();

        for (info, until, until_kind) in periods {
            let offset = info.offset.as_secs();

            debug!(
                "{}: period offset={} saving={:?} until={} ({:?}), starting at {}",
                zone_name, info.offset, info.saving, until, until_kind, start_utc
            );

            match info.saving {
                Saving::NoSaving => {
                    save = 0;
                    open_fixed_period(zone_name, info, save, start_utc, &mut transitions);
                }

                Saving::OneOff(amount) => {
                    save = amount.as_secs();
                    open_fixed_period(zone_name, info, save, start_utc, &mut transitions);
                }

                Saving::Multiple(ref ruleset_name) => {
                    let rules = self.get_ruleset(ruleset_name).ok_or_else(|| {
                        Error::UnknownRuleset {
                            zone: zone_name.to_owned(),
                            ruleset: ruleset_name.clone(),
                        }
                    })?;
                    let expanded =
                        cache
                            .get_or_expand(ruleset_name, rules)
                            .map_err(|error| Error::Expand {
                                zone: zone_name.to_owned(),
                                error,
                            })?;

                    // Seed the saving and letter from the last rule to
                    // have fired before this period opened. Comparing the
                    // rules' local midnights against a UTC instant is off
                    // by at most one offset-plus-save, which the data's
                    // rule spacing has to absorb anyway.
                    let fired = expanded.partition_point(|rule| rule.date <= start_utc);
                    if fired == 0 {
                        save = 0;
                        letter = expanded
                            .iter()
                            .find(|rule| rule.save == Time::ZERO)
                            .and_then(|rule| rule.letter.clone());
                    } else {
                        let rule = &expanded[fired - 1];
                        save = rule.save.as_secs();
                        letter = rule.letter.clone();
                    }

                    push_transition(
                        &mut transitions,
                        start_utc,
                        FixedTimeZone {
                            abbr: info.format.format(Time::from_secs(save), letter.as_deref()),
                            offset: info.offset,
                            save: Time::from_secs(save),
                        },
                    );

                    // Walk the remaining instances. The seeding rule is
                    // walked again: its instant predates the opening
                    // transition, so it only re-establishes state.
                    for rule in &expanded[fired.saturating_sub(1)..] {
                        let local = rule.date + rule.at.as_secs();
                        let utc = to_utc(local, rule.at_kind, offset, save);
                        let until_utc = to_utc(until, until_kind, offset, save);
                        if utc >= until_utc {
                            break;
                        }

                        debug!(
                            "{}: rule fires at wall {} (utc {}), save becomes {}",
                            zone_name,
                            to_local(utc, TimeKind::Wall, offset, save),
                            utc,
                            rule.save,
                        );

                        save = rule.save.as_secs();
                        letter = rule.letter.clone();
                        let abbr = info.format.format(rule.save, letter.as_deref());

                        if utc >= start_utc {
                            push_transition(
                                &mut transitions,
                                utc,
                                FixedTimeZone {
                                    abbr,
                                    offset: info.offset,
                                    save: rule.save,
                                },
                            );
                        }
                    }
                }
            }

            start_utc = to_utc(until, until_kind, offset, save);
            if start_utc >= MAX_DATETIME {
                break;
            }
        }

        if transitions.len() > 1 {
            Ok(TimeZone::Variable(VariableTimeZone {
                name: zone_name.to_owned(),
                transitions,
            }))
        } else {
            // A timeline that never changes is just a fixed zone. Note
            // that the abbreviation, not the zone name, is what survives.
            let sole = transitions
                .pop()
                .expect("every zone set has at least one period");
            Ok(TimeZone::Fixed(sole.tz))
        }
    }
}

/// Opens a period that applies a constant saving: one transition at the
/// period's start, no rules to walk.
fn open_fixed_period(
    zone_name: &str,
    info: &ZoneInfo,
    save: i64,
    start_utc: i64,
    transitions: &mut Vec<Transition>,
) {
    let save = Time::from_secs(save);
    let abbr = info.format.format(save, None);
    debug!(
        "{}: fixed period opens at {} as {} (offset {}, save {})",
        zone_name, start_utc, abbr, info.offset, save
    );
    push_transition(
        transitions,
        start_utc,
        FixedTimeZone {
            abbr,
            offset: info.offset,
            save,
        },
    );
}

/// The outcome of resolving a whole table: the zones that resolved, in
/// name order, and the per-zone failures for the caller to judge.
#[derive(Debug, Default)]
pub struct Resolved {
    pub timezones: BTreeMap<String, TimeZone>,
    pub failures: Vec<Error>,
}

/// Resolves every zone of the table, then materialises each link as a
/// copy of its canonical zone's resolution under the alias name.
pub fn resolve_all(table: &Table) -> Resolved {
    let mut cache = ExpansionCache::new();
    let mut resolved = Resolved::default();

    let mut names: Vec<&String> = table.zonesets.keys().collect();
    names.sort();

    for name in names {
        match table.resolve(name, &mut cache) {
            Ok(tz) => {
                resolved.timezones.insert(name.clone(), tz);
            }
            Err(e) => resolved.failures.push(e),
        }
    }

    let mut aliases: Vec<(&String, &String)> = table.links.iter().collect();
    aliases.sort();

    for (alias, canonical) in aliases {
        match resolved.timezones.get(canonical).cloned() {
            Some(TimeZone::Fixed(fixed)) => {
                resolved
                    .timezones
                    .insert(alias.clone(), TimeZone::Fixed(fixed));
            }
            Some(TimeZone::Variable(variable)) => {
                resolved.timezones.insert(
                    alias.clone(),
                    TimeZone::Variable(VariableTimeZone {
                        name: alias.clone(),
                        transitions: variable.transitions,
                    }),
                );
            }
            None => warn!("link {} -> {}: target did not resolve", alias, canonical),
        }
    }

    resolved
}
