//! Expanding rule sets into concrete, date-ordered rule instances.
//!
//! A rule line describes a *recurring* transition: "the last Sunday of
//! March, every year from 1981 to 1995". Before a zone's timeline can be
//! resolved, every rule of a rule set has to be materialised into the
//! concrete local dates it fires on, and the instances of all the set's
//! rules merged into one list sorted by date. The resolver then walks
//! that list in step with the zone's periods.
//!
//! The dates in the expanded list are *local* dates, stored as a midnight
//! timestamp; which clock "local" means is only known once a rule is
//! paired with a zone period, so the conversion to UTC happens in the
//! resolver. Because of that, the expansion also checks a separation
//! invariant: two neighbouring instances closer together than
//! [`MAX_ABS_DIFF`] could swap places once per-period offsets are
//! applied, so such a list is rejected outright rather than resolved
//! into a possibly mis-ordered timeline.
//!
//! Expansion is pure, and a resolver run needs each rule set at most
//! once per name, so the results are kept in a write-once
//! [`ExpansionCache`].

use std::collections::HashMap;
use std::fmt;

use crate::line::{timestamp, Month, Time, TimeKind};
use crate::table::{RuleInfo, MAX_ABS_DIFF};

/// One concrete instance of a rule: the rule's transition fields, pinned
/// to the local date it fires on in one particular year.
#[derive(PartialEq, Debug, Clone)]
pub struct ExpandedRule {
    /// Midnight of the day the rule fires on, as a timestamp on the
    /// (yet-unknown) local clock.
    pub date: i64,

    /// The time of day the rule fires at, added to `date` by the
    /// resolver. May reach past the end of the day.
    pub at: Time,

    /// The clock `at` is measured against.
    pub at_kind: TimeKind,

    /// The saving in force once the rule has fired.
    pub save: Time,

    /// The abbreviation fragment in force once the rule has fired.
    pub letter: Option<String>,
}

/// Something that can go wrong while expanding a rule set.
#[derive(PartialEq, Debug, Clone)]
pub enum Error {
    /// A rule's day specification matched no day of its month in some
    /// year it applies to.
    NoMatchingDay {
        ruleset: String,
        year: i64,
        month: Month,
    },

    /// Two expanded instances fell too close together for their order to
    /// survive conversion out of local time.
    OutOfOrder { ruleset: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NoMatchingDay {
                ruleset,
                year,
                month,
            } => write!(
                f,
                "rule set {}: no day in {:?} {} matches the day specification",
                ruleset, month, year
            ),
            Error::OutOfOrder { ruleset } => {
                write!(f, "rule set {}: dates are probably not in order", ruleset)
            }
        }
    }
}

impl std::error::Error for Error {}

/// Materialises every (year, rule) pair of a rule set into a list of
/// concrete instances, sorted ascending by local date.
pub fn expand_ruleset(name: &str, rules: &[RuleInfo]) -> Result<Vec<ExpandedRule>, Error> {
    let mut expanded = Vec::new();

    for rule in rules {
        for year in rule.years() {
            let day = rule
                .day
                .resolve(year, rule.month)
                .ok_or_else(|| Error::NoMatchingDay {
                    ruleset: name.to_owned(),
                    year,
                    month: rule.month,
                })?;

            expanded.push(ExpandedRule {
                date: timestamp(year, rule.month, day, 0),
                at: rule.at,
                at_kind: rule.at_kind,
                save: rule.save,
                letter: rule.letter.clone(),
            });
        }
    }

    expanded.sort_by_key(|rule| rule.date);

    // Local dates only order reliably if they are further apart than the
    // largest offset-plus-save swing the data can contain.
    for pair in expanded.windows(2) {
        if pair[1].date - pair[0].date <= MAX_ABS_DIFF {
            return Err(Error::OutOfOrder {
                ruleset: name.to_owned(),
            });
        }
    }

    Ok(expanded)
}

/// A write-once memo table over [`expand_ruleset`], keyed by rule set
/// name.
#[derive(Debug, Default)]
pub struct ExpansionCache {
    map: HashMap<String, Vec<ExpandedRule>>,
}

impl ExpansionCache {
    pub fn new() -> ExpansionCache {
        ExpansionCache::default()
    }

    /// Returns the expansion of the named rule set, computing and storing
    /// it on first use.
    pub fn get_or_expand(
        &mut self,
        name: &str,
        rules: &[RuleInfo],
    ) -> Result<&[ExpandedRule], Error> {
        if !self.map.contains_key(name) {
            let expanded = expand_ruleset(name, rules)?;
            self.map.insert(name.to_owned(), expanded);
        }
        Ok(&self.map[name])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::{Line, LineParser, Month};
    use crate::table::RuleInfo;

    fn ruleset(lines: &[&'static str]) -> Vec<RuleInfo> {
        let parser = LineParser::default();
        lines
            .iter()
            .map(|line| match parser.parse_str(line) {
                Ok(Line::Rule(rule)) => RuleInfo::from(rule),
                other => panic!("not a rule line: {:?}", other),
            })
            .collect()
    }

    #[test]
    fn interleaved_years_sort_by_date() {
        let rules = ruleset(&[
            "Rule Poland 1918 1919 - Sep 16 2:00s 0    -",
            "Rule Poland 1919 only - Apr 15 2:00s 1:00 S",
            "Rule Poland 1944 only - Apr  3 2:00s 1:00 S",
        ]);

        let expanded = expand_ruleset("Poland", &rules).unwrap();
        let dates: Vec<i64> = expanded.iter().map(|rule| rule.date).collect();
        assert_eq!(
            dates,
            vec![
                crate::line::timestamp(1918, Month::September, 16, 0),
                crate::line::timestamp(1919, Month::April, 15, 0),
                crate::line::timestamp(1919, Month::September, 16, 0),
                crate::line::timestamp(1944, Month::April, 3, 0),
            ]
        );
    }

    #[test]
    fn one_instance_per_year_in_the_rule_month() {
        let rules = ruleset(&["Rule EU 1981 1995 - Mar lastSun 1:00u 1:00 S"]);

        let expanded = expand_ruleset("EU", &rules).unwrap();
        assert_eq!(expanded.len(), 15);

        for (rule, year) in expanded.iter().zip(1981..=1995) {
            let start = crate::line::timestamp(year, Month::March, 1, 0);
            let end = crate::line::timestamp(year, Month::April, 1, 0);
            assert!(start <= rule.date && rule.date < end);
        }
    }

    #[test]
    fn day_search_is_bounded_by_the_month() {
        let rules = ruleset(&["Rule Bad 2001 only - Feb 30 2:00 1:00 D"]);

        assert_eq!(
            expand_ruleset("Bad", &rules),
            Err(Error::NoMatchingDay {
                ruleset: "Bad".to_owned(),
                year: 2001,
                month: Month::February,
            })
        );
    }

    #[test]
    fn neighbouring_instances_must_be_separated() {
        let rules = ruleset(&[
            "Rule Bad 1980 only - Apr 1 2:00 1:00 D",
            "Rule Bad 1980 only - Apr 2 2:00 0    S",
        ]);

        assert_eq!(
            expand_ruleset("Bad", &rules),
            Err(Error::OutOfOrder {
                ruleset: "Bad".to_owned(),
            })
        );
    }

    #[test]
    fn cache_is_write_once() {
        let rules = ruleset(&["Rule EU 1981 1995 - Mar lastSun 1:00u 1:00 S"]);

        let mut cache = ExpansionCache::new();
        let first = cache.get_or_expand("EU", &rules).unwrap().to_vec();

        // A second lookup must serve the memoised expansion even if the
        // rules handed in differ.
        let second = cache.get_or_expand("EU", &[]).unwrap();
        assert_eq!(first, second);
    }
}
