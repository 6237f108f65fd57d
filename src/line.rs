//! Parsing zoneinfo data files, line-by-line.
//!
//! This module provides functions that take a line of input from a zoneinfo
//! data file and attempt to parse it, returning the details of the line if
//! it gets parsed successfully. It classifies them as `Rule`, `Link`,
//! `Zone`, or `Continuation` lines.
//!
//! `Line` is the type that parses and holds zoneinfo line data. To try to
//! parse a string, use the `LineParser::parse_str` method.
//!
//! The time-of-day and calendar primitives the rest of the crate works
//! with live here as well: signed seconds-of-day [`Time`] values, the
//! [`Month`] and [`Weekday`] enums, and the [`DaySpec`] day-of-month
//! predicates.
//!
//! ## Examples
//!
//! Parsing a `Rule` line:
//!
//! ```
//! use zoneinfo_compile::line::*;
//!
//! let parser = LineParser::default();
//! let line = parser.parse_str("Rule  EU  1977    1980    -   Apr Sun>=1   1:00u  1:00    S");
//!
//! assert_eq!(line, Ok(Line::Rule(Rule {
//!     name:    "EU",
//!     from:    Year::Number(1977),
//!     to:      Some(Year::Number(1980)),
//!     month:   Month::April,
//!     day:     DaySpec::FirstOnOrAfter(Weekday::Sunday, 1),
//!     at:      Time::from_secs(3600),
//!     at_kind: TimeKind::Universal,
//!     save:    Time::from_secs(3600),
//!     letter:  Some("S"),
//! })));
//! ```
//!
//! Parsing a `Zone` line:
//!
//! ```
//! use zoneinfo_compile::line::*;
//!
//! let parser = LineParser::default();
//! let line = parser.parse_str("Zone  Australia/Adelaide  9:30  Aus  AC%sT  1971 Oct 31  2:00:00");
//!
//! assert_eq!(line, Ok(Line::Zone(Zone {
//!     name: "Australia/Adelaide",
//!     info: ZoneInfo {
//!         offset: Time::from_secs(9 * 3600 + 30 * 60),
//!         saving: Saving::Multiple("Aus"),
//!         format: "AC%sT",
//!         until:  Some(UntilDateTime::Time(
//!             1971,
//!             Month::October,
//!             DaySpec::Ordinal(31),
//!             Time::from_secs(2 * 3600),
//!             TimeKind::Wall,
//!         )),
//!     },
//! })));
//! ```

use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use regex::{Captures, Regex};

/// A parser for the line shapes that occur in zoneinfo region files.
///
/// Holds one compiled regex per shape, so build it once and reuse it for
/// every line of every file.
pub struct LineParser {
    rule_line: Regex,
    day_field: Regex,
    hm_field: Regex,
    hms_field: Regex,
    zone_line: Regex,
    continuation_line: Regex,
    link_line: Regex,
    empty_line: Regex,
}

#[derive(PartialEq, Debug, Clone)]
pub enum Error {
    FailedYearParse(String),
    FailedMonthParse(String),
    FailedWeekdayParse(String),
    InvalidLineType(String),
    CouldNotParseSaving(String),
    InvalidDaySpec(String),
    InvalidTime(String),
    NonWallClockInTimeSpec(String),
    NoDayInMonth(i64, Month),
    NotParsedAsRuleLine,
    NotParsedAsZoneLine,
    NotParsedAsLinkLine,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::FailedYearParse(s) => write!(f, "failed to parse as a year value: \"{}\"", s),
            Error::FailedMonthParse(s) => write!(f, "failed to parse as a month value: \"{}\"", s),
            Error::FailedWeekdayParse(s) => {
                write!(f, "failed to parse as a weekday value: \"{}\"", s)
            }
            Error::InvalidLineType(s) => write!(f, "line with invalid format: \"{}\"", s),
            Error::CouldNotParseSaving(s) => write!(f, "failed to parse RULES column: \"{}\"", s),
            Error::InvalidDaySpec(s) => write!(f, "invalid day specification ('ON'): \"{}\"", s),
            Error::InvalidTime(s) => write!(f, "invalid time: \"{}\"", s),
            Error::NonWallClockInTimeSpec(s) => {
                write!(f, "time value not given as wall time: \"{}\"", s)
            }
            Error::NoDayInMonth(year, month) => {
                write!(
                    f,
                    "no day in {:?} {} matches the day specification",
                    month, year
                )
            }
            Error::NotParsedAsRuleLine => write!(f, "failed to parse line as a rule"),
            Error::NotParsedAsZoneLine => write!(f, "failed to parse line as a zone"),
            Error::NotParsedAsLinkLine => write!(f, "failed to parse line as a link"),
        }
    }
}

impl std::error::Error for Error {}

impl Default for LineParser {
    fn default() -> Self {
        LineParser {
            rule_line: Regex::new(
                r##"(?x) ^
                Rule \s+
                ( ?P<name>    \S+)  \s+
                ( ?P<from>    \S+)  \s+
                ( ?P<to>      \S+)  \s+
                ( ?P<type>    \S+)  \s+
                ( ?P<in>      \S+)  \s+
                ( ?P<on>      \S+)  \s+
                ( ?P<at>      \S+)  \s+
                ( ?P<save>    \S+)  \s+
                ( ?P<letter>  \S+)  \s*
                (\#.*)?
            $ "##,
            )
            .unwrap(),

            day_field: Regex::new(
                r##"(?x) ^
                ( ?P<weekday> \w+ )
                ( ?P<sign>    [<>] = )
                ( ?P<day>     \d+ )
            $ "##,
            )
            .unwrap(),

            hm_field: Regex::new(
                r##"(?x) ^
                ( ?P<sign> -? )
                ( ?P<hour> \d{1,2} ) : ( ?P<minute> \d{2} )
                ( ?P<flag> [wsugz] )?
            $ "##,
            )
            .unwrap(),

            hms_field: Regex::new(
                r##"(?x) ^
                ( ?P<sign> -? )
                ( ?P<hour> \d{1,2} ) : ( ?P<minute> \d{2} ) : ( ?P<second> \d{2} )
                ( ?P<flag> [wsugz] )?
            $ "##,
            )
            .unwrap(),

            zone_line: Regex::new(
                r##"(?x) ^
                Zone \s+
                ( ?P<name> [A-Za-z0-9/_+-]+ )  \s+
                ( ?P<gmtoff>     \S+ )  \s+
                ( ?P<rulessave>  \S+ )  \s+
                ( ?P<format>     \S+ )  \s*
                ( ?P<year>       [0-9]+)? \s*
                ( ?P<month>      [A-Za-z]+)? \s*
                ( ?P<day>        [A-Za-z0-9><=]+ )? \s*
                ( ?P<time>       [0-9:]+[suwz]? )? \s*
                (\#.*)?
            $ "##,
            )
            .unwrap(),

            continuation_line: Regex::new(
                r##"(?x) ^
                \s+
                ( ?P<gmtoff>     \S+ )  \s+
                ( ?P<rulessave>  \S+ )  \s+
                ( ?P<format>     \S+ )  \s*
                ( ?P<year>       [0-9]+)? \s*
                ( ?P<month>      [A-Za-z]+)? \s*
                ( ?P<day>        [A-Za-z0-9><=]+ )? \s*
                ( ?P<time>       [0-9:]+[suwz]? )? \s*
                (\#.*)?
            $ "##,
            )
            .unwrap(),

            link_line: Regex::new(
                r##"(?x) ^
                Link  \s+
                ( ?P<canonical>  \S+ )  \s+
                ( ?P<alias>      \S+ )  \s*
                (\#.*)?
            $ "##,
            )
            .unwrap(),

            empty_line: Regex::new(
                r##"(?x) ^
                \s*
                (\#.*)?
            $"##,
            )
            .unwrap(),
        }
    }
}

/// A **year** definition field.
///
/// A year has one of the following representations in a file:
///
/// - `min` or `minimum`, for a rule that applies as far back as the data
///   goes;
/// - `max` or `maximum`, for a rule that applies indefinitely;
/// - a year number, referring to a specific year.
///
/// The sentinels are clamped to the compiler's era bounds at the point of
/// use, not here.
#[derive(PartialEq, Debug, Copy, Clone)]
pub enum Year {
    /// The minimum year possible: `min` or `minimum`.
    Minimum,
    /// The maximum year possible: `max` or `maximum`.
    Maximum,
    /// A specific year number.
    Number(i64),
}

impl FromStr for Year {
    type Err = Error;

    fn from_str(input: &str) -> Result<Year, Self::Err> {
        Ok(match &*input.to_ascii_lowercase() {
            "min" | "minimum" => Year::Minimum,
            "max" | "maximum" => Year::Maximum,
            year => match year.parse() {
                Ok(year) => Year::Number(year),
                Err(_) => return Err(Error::FailedYearParse(input.to_string())),
            },
        })
    }
}

/// A **month** field.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum Month {
    January = 1,
    February = 2,
    March = 3,
    April = 4,
    May = 5,
    June = 6,
    July = 7,
    August = 8,
    September = 9,
    October = 10,
    November = 11,
    December = 12,
}

impl Month {
    /// The number of days in this month of the given year.
    pub fn length(self, year: i64) -> i8 {
        match self {
            Month::February if is_leap(year) => 29,
            Month::February => 28,
            Month::April | Month::June | Month::September | Month::November => 30,
            _ => 31,
        }
    }
}

impl FromStr for Month {
    type Err = Error;

    fn from_str(input: &str) -> Result<Month, Self::Err> {
        Ok(match &*input.to_ascii_lowercase() {
            "jan" | "january" => Month::January,
            "feb" | "february" => Month::February,
            "mar" | "march" => Month::March,
            "apr" | "april" => Month::April,
            "may" => Month::May,
            "jun" | "june" => Month::June,
            "jul" | "july" => Month::July,
            "aug" | "august" => Month::August,
            "sep" | "september" => Month::September,
            "oct" | "october" => Month::October,
            "nov" | "november" => Month::November,
            "dec" | "december" => Month::December,
            other => return Err(Error::FailedMonthParse(other.to_string())),
        })
    }
}

/// A **weekday** field.
#[derive(PartialEq, Debug, Copy, Clone)]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl FromStr for Weekday {
    type Err = Error;

    fn from_str(input: &str) -> Result<Weekday, Self::Err> {
        Ok(match &*input.to_ascii_lowercase() {
            "mon" | "monday" => Weekday::Monday,
            "tue" | "tuesday" => Weekday::Tuesday,
            "wed" | "wednesday" => Weekday::Wednesday,
            "thu" | "thursday" => Weekday::Thursday,
            "fri" | "friday" => Weekday::Friday,
            "sat" | "saturday" => Weekday::Saturday,
            "sun" | "sunday" => Weekday::Sunday,
            other => return Err(Error::FailedWeekdayParse(other.to_string())),
        })
    }
}

impl Weekday {
    /// The weekday a given calendar date falls on.
    pub fn of(year: i64, month: Month, day: i8) -> Weekday {
        let m = month as i64;
        let y = if m < 3 { year - 1 } else { year };
        let d = day as i64;
        const T: [i64; 12] = [0, 3, 2, 5, 0, 3, 5, 1, 4, 6, 2, 4];
        match (y + y / 4 - y / 100 + y / 400 + T[m as usize - 1] + d) % 7 {
            0 => Weekday::Sunday,
            1 => Weekday::Monday,
            2 => Weekday::Tuesday,
            3 => Weekday::Wednesday,
            4 => Weekday::Thursday,
            5 => Weekday::Friday,
            6 => Weekday::Saturday,
            _ => unreachable!("weekday index out of range"),
        }
    }
}

/// Leap year rules: years which are factors of 4, except those divisible
/// by 100, unless they are divisible by 400.
pub fn is_leap(year: i64) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// A **day** definition field.
///
/// This can be given in either absolute terms (such as "the fifth day of
/// the month"), or relative terms (such as "the last Sunday of the month",
/// or "the last Friday before or including the 13th").
///
/// Note that in the last example, it's allowed for that particular Friday
/// to *be* the 13th in question.
#[derive(PartialEq, Debug, Copy, Clone)]
pub enum DaySpec {
    /// A specific day of the month, given by its number.
    Ordinal(i8),
    /// The last day of the month with a specific weekday.
    Last(Weekday),
    /// The **last** day with the given weekday **before** (or including) a
    /// day with a specific number.
    LastOnOrBefore(Weekday, i8),
    /// The **first** day with the given weekday **after** (or including) a
    /// day with a specific number.
    FirstOnOrAfter(Weekday, i8),
}

impl DaySpec {
    /// Whether a given day of the given month satisfies this specification.
    pub fn matches(&self, year: i64, month: Month, day: i8) -> bool {
        match *self {
            DaySpec::Ordinal(n) => day == n,
            DaySpec::Last(wd) => {
                Weekday::of(year, month, day) == wd && day + 7 > month.length(year)
            }
            DaySpec::FirstOnOrAfter(wd, n) => Weekday::of(year, month, day) == wd && day >= n,
            DaySpec::LastOnOrBefore(wd, n) => {
                Weekday::of(year, month, day) == wd && day <= n && day > n - 7
            }
        }
    }

    /// The first day of the given month that satisfies this specification,
    /// scanning forward from the 1st. The search does not leave the month:
    /// a specification no day can satisfy (such as `Ordinal(30)` in
    /// February) yields `None`.
    pub fn resolve(&self, year: i64, month: Month) -> Option<i8> {
        (1..=month.length(year)).find(|&day| self.matches(year, month, day))
    }
}

/// A **time** value: a signed count of seconds.
///
/// Time fields in the files have an hours component with optional minutes
/// and seconds components, and can be negative with a starting `-`. Hour 0
/// is midnight at the start of the day, and hour 24 is midnight at the end
/// of the day; values past 24 hours are representable, since rule
/// transition times and offset sums can exceed one day.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash, Default)]
pub struct Time(i64);

impl Time {
    /// Zero seconds, i.e. midnight at the start of the day.
    pub const ZERO: Time = Time(0);

    pub const fn from_secs(secs: i64) -> Time {
        Time(secs)
    }

    pub const fn as_secs(self) -> i64 {
        self.0
    }
}

impl Add for Time {
    type Output = Time;
    fn add(self, other: Time) -> Time {
        Time(self.0 + other.0)
    }
}

impl Sub for Time {
    type Output = Time;
    fn sub(self, other: Time) -> Time {
        Time(self.0 - other.0)
    }
}

impl Neg for Time {
    type Output = Time;
    fn neg(self) -> Time {
        Time(-self.0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (sign, secs) = if self.0 < 0 { ("-", -self.0) } else { ("", self.0) };
        write!(
            f,
            "{}{:02}:{:02}:{:02}",
            sign,
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        )
    }
}

impl FromStr for Time {
    type Err = Error;

    /// Parses `[-]H[:MM[:SS]]`. A single `-` means zero; a negative hour
    /// makes the minute and second components inherit the sign.
    fn from_str(input: &str) -> Result<Time, Self::Err> {
        if input == "-" {
            return Ok(Time::ZERO);
        }

        let (negative, rest) = match input.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, input),
        };

        let mut secs = 0;
        for (i, part) in rest.split(':').enumerate() {
            if i >= 3 || part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(Error::InvalidTime(input.to_string()));
            }
            let value: i64 = part
                .parse()
                .map_err(|_| Error::InvalidTime(input.to_string()))?;
            if i > 0 && value > 59 {
                return Err(Error::InvalidTime(input.to_string()));
            }
            secs += value * [3600, 60, 1][i];
        }

        Ok(Time(if negative { -secs } else { secs }))
    }
}

/// Which clock a time value in the input is measured against.
#[derive(PartialEq, Debug, Copy, Clone)]
pub enum TimeKind {
    /// The local civil clock, including any saving in force.
    Wall,
    /// The local standard-time clock, excluding saving.
    Standard,
    /// UTC.
    Universal,
}

fn parse_time_kind(c: &str) -> Option<TimeKind> {
    Some(match c {
        "w" => TimeKind::Wall,
        "s" => TimeKind::Standard,
        "u" | "g" | "z" => TimeKind::Universal,
        _ => return None,
    })
}

/// The time at which a zone period ends.
///
/// This is described with as few units as possible: a period that ends at
/// the beginning of the year lists only the year, one that ends on a
/// particular day has to list the year, month, and day, and one that ends
/// at a particular second has to list everything.
#[derive(PartialEq, Debug, Copy, Clone)]
pub enum UntilDateTime {
    /// The earliest point in a particular **year**.
    Year(i64),
    /// The earliest point in a particular **month**.
    Month(i64, Month),
    /// The earliest point in a particular **day**.
    Day(i64, Month, DaySpec),
    /// A particular **hour, minute, or second**, measured against the
    /// clock the [`TimeKind`] names.
    Time(i64, Month, DaySpec, Time, TimeKind),
}

impl UntilDateTime {
    /// Converts this end time to the number of seconds since the Unix
    /// epoch, on the clock its kind names. A time of day of `24:00` lands
    /// on midnight of the following day by plain arithmetic.
    ///
    /// Fails when the day specification matches no day of the month.
    pub fn to_timestamp(&self) -> Result<i64, Error> {
        Ok(match *self {
            UntilDateTime::Year(y) => timestamp(y, Month::January, 1, 0),
            UntilDateTime::Month(y, m) => timestamp(y, m, 1, 0),
            UntilDateTime::Day(y, m, d) => {
                let day = d.resolve(y, m).ok_or(Error::NoDayInMonth(y, m))?;
                timestamp(y, m, day, 0)
            }
            UntilDateTime::Time(y, m, d, t, _) => {
                let day = d.resolve(y, m).ok_or(Error::NoDayInMonth(y, m))?;
                timestamp(y, m, day, t.as_secs())
            }
        })
    }

    /// The clock this end time is measured against. Wall clock unless the
    /// input carried an explicit kind letter.
    pub fn kind(&self) -> TimeKind {
        match *self {
            UntilDateTime::Time(_, _, _, _, kind) => kind,
            _ => TimeKind::Wall,
        }
    }
}

/// Seconds since the Unix epoch of the given calendar date, plus a
/// seconds-of-day component (which may exceed one day, normalising values
/// such as `24:00` onto the next day).
pub(crate) fn timestamp(year: i64, month: Month, day: i8, time_of_day: i64) -> i64 {
    fn seconds_in_year(year: i64) -> i64 {
        if is_leap(year) {
            366 * 24 * 60 * 60
        } else {
            365 * 24 * 60 * 60
        }
    }

    fn seconds_until_start_of_year(year: i64) -> i64 {
        if year >= 1970 {
            (1970..year).map(seconds_in_year).sum()
        } else {
            -(year..1970).map(seconds_in_year).sum::<i64>()
        }
    }

    const MONTHS_NON_LEAP: [i64; 12] = [
        0,
        31,
        31 + 28,
        31 + 28 + 31,
        31 + 28 + 31 + 30,
        31 + 28 + 31 + 30 + 31,
        31 + 28 + 31 + 30 + 31 + 30,
        31 + 28 + 31 + 30 + 31 + 30 + 31,
        31 + 28 + 31 + 30 + 31 + 30 + 31 + 31,
        31 + 28 + 31 + 30 + 31 + 30 + 31 + 31 + 30,
        31 + 28 + 31 + 30 + 31 + 30 + 31 + 31 + 30 + 31,
        31 + 28 + 31 + 30 + 31 + 30 + 31 + 31 + 30 + 31 + 30,
    ];
    const MONTHS_LEAP: [i64; 12] = [
        0,
        31,
        31 + 29,
        31 + 29 + 31,
        31 + 29 + 31 + 30,
        31 + 29 + 31 + 30 + 31,
        31 + 29 + 31 + 30 + 31 + 30,
        31 + 29 + 31 + 30 + 31 + 30 + 31,
        31 + 29 + 31 + 30 + 31 + 30 + 31 + 31,
        31 + 29 + 31 + 30 + 31 + 30 + 31 + 31 + 30,
        31 + 29 + 31 + 30 + 31 + 30 + 31 + 31 + 30 + 31,
        31 + 29 + 31 + 30 + 31 + 30 + 31 + 31 + 30 + 31 + 30,
    ];

    let days_before_month = if is_leap(year) {
        MONTHS_LEAP[month as usize - 1]
    } else {
        MONTHS_NON_LEAP[month as usize - 1]
    };

    seconds_until_start_of_year(year)
        + 60 * 60 * 24 * days_before_month
        + 60 * 60 * 24 * (day as i64 - 1)
        + time_of_day
}

/// The information contained in both zone lines *and* zone continuation
/// lines.
#[derive(PartialEq, Debug, Copy, Clone)]
pub struct ZoneInfo<'a> {
    /// The amount of time that needs to be added to UTC to get the
    /// standard time in this zone.
    pub offset: Time,
    /// The name of all the rules that should apply in the time zone, or
    /// the amount of time to add.
    pub saving: Saving<'a>,
    /// The format for time zone abbreviations, with `%s` as the string
    /// marker.
    pub format: &'a str,
    /// The time at which the rules change for this location, or `None` if
    /// this period runs to the end of the compiler's era.
    pub until: Option<UntilDateTime>,
}

/// The amount of daylight saving time (DST) to apply to this period. This
/// is a special type for a certain field in a zone line, which can hold
/// different types of value.
#[derive(PartialEq, Debug, Copy, Clone)]
pub enum Saving<'a> {
    /// Just stick to the base offset.
    NoSaving,
    /// This amount of time should be saved while this period is in effect.
    /// (This is the equivalent to there being a single one-off rule with
    /// the given amount of time to save).
    OneOff(Time),
    /// All rules with the given name should apply while this period is in
    /// effect.
    Multiple(&'a str),
}

/// A **rule** definition line.
///
/// According to the `zic(8)` man page, a rule line has this form, along
/// with an example:
///
/// ```text
///     Rule  NAME  FROM  TO    TYPE  IN   ON       AT    SAVE  LETTER/S
///     Rule  US    1967  1973  -     Apr  lastSun  2:00  1:00  D
/// ```
///
/// Apart from the opening `Rule` to specify which kind of line this is,
/// and the `TYPE` column (which must be present but is ignored), every
/// column in the line has a field in this struct.
#[derive(PartialEq, Debug, Copy, Clone)]
pub struct Rule<'a> {
    /// The name of the set of rules that this rule is part of.
    pub name: &'a str,
    /// The first year in which the rule applies.
    pub from: Year,
    /// The final year, or `None` if it's `only`.
    pub to: Option<Year>,
    /// The month in which the rule takes effect.
    pub month: Month,
    /// The day on which the rule takes effect.
    pub day: DaySpec,
    /// The time of day at which the rule takes effect.
    pub at: Time,
    /// The clock that time is measured against.
    pub at_kind: TimeKind,
    /// The amount of time to be added when the rule is in effect.
    pub save: Time,
    /// The variable part of time zone abbreviations to be used when this
    /// rule is in effect, if any.
    pub letter: Option<&'a str>,
}

/// A **zone** definition line.
///
/// According to the `zic(8)` man page, a zone line has this form, along
/// with an example:
///
/// ```text
///     Zone  NAME                GMTOFF  RULES/SAVE  FORMAT  [UNTILYEAR [MONTH [DAY [TIME]]]]
///     Zone  Australia/Adelaide  9:30    Aus         AC%sT   1971       Oct    31   2:00
/// ```
///
/// The last four columns are all optional, with their variants
/// consolidated into an [`UntilDateTime`].
///
/// The `RULES/SAVE` column, if it contains a value, *either* contains the
/// name of the rules to use for this zone, *or* contains a one-off period
/// of time to save.
///
/// A continuation line contains all the same fields apart from the `NAME`
/// column and the opening `Zone` identifier.
#[derive(PartialEq, Debug, Copy, Clone)]
pub struct Zone<'a> {
    /// The name of the time zone.
    pub name: &'a str,
    /// All the other fields of info.
    pub info: ZoneInfo<'a>,
}

/// A **link** definition line, aliasing one zone name to another zone's
/// data.
#[derive(PartialEq, Debug, Copy, Clone)]
pub struct Link<'a> {
    /// The name of the zone the alias refers to.
    pub canonical: &'a str,
    /// The alias being declared.
    pub alias: &'a str,
}

#[derive(PartialEq, Debug, Copy, Clone)]
pub enum Line<'a> {
    /// This line is empty.
    Space,
    /// This line contains a **zone** definition.
    Zone(Zone<'a>),
    /// This line contains a **continuation** of a zone definition.
    Continuation(ZoneInfo<'a>),
    /// This line contains a **rule** definition.
    Rule(Rule<'a>),
    /// This line contains a **link** definition.
    Link(Link<'a>),
}

impl LineParser {
    fn parse_time_and_kind(&self, input: &str) -> Result<(Time, TimeKind), Error> {
        if input == "-" {
            Ok((Time::ZERO, TimeKind::Wall))
        } else if input.chars().all(|c| c == '-' || c.is_ascii_digit()) {
            let hours: i64 = input
                .parse()
                .map_err(|_| Error::InvalidTime(input.to_string()))?;
            Ok((Time::from_secs(hours * 3600), TimeKind::Wall))
        } else if let Some(caps) = self.hm_field.captures(input) {
            let sign = if caps.name("sign").unwrap().as_str() == "-" {
                -1
            } else {
                1
            };
            let hour: i64 = caps.name("hour").unwrap().as_str().parse().unwrap();
            let minute: i64 = caps.name("minute").unwrap().as_str().parse().unwrap();
            let kind = caps
                .name("flag")
                .and_then(|c| parse_time_kind(&c.as_str()[0..1]))
                .unwrap_or(TimeKind::Wall);

            Ok((Time::from_secs(sign * (hour * 3600 + minute * 60)), kind))
        } else if let Some(caps) = self.hms_field.captures(input) {
            let sign = if caps.name("sign").unwrap().as_str() == "-" {
                -1
            } else {
                1
            };
            let hour: i64 = caps.name("hour").unwrap().as_str().parse().unwrap();
            let minute: i64 = caps.name("minute").unwrap().as_str().parse().unwrap();
            let second: i64 = caps.name("second").unwrap().as_str().parse().unwrap();
            let kind = caps
                .name("flag")
                .and_then(|c| parse_time_kind(&c.as_str()[0..1]))
                .unwrap_or(TimeKind::Wall);

            Ok((
                Time::from_secs(sign * (hour * 3600 + minute * 60 + second)),
                kind,
            ))
        } else {
            Err(Error::InvalidTime(input.to_string()))
        }
    }

    fn parse_time(&self, input: &str) -> Result<Time, Error> {
        match self.parse_time_and_kind(input) {
            Ok((time, TimeKind::Wall)) => Ok(time),
            Ok((_, _)) => Err(Error::NonWallClockInTimeSpec(input.to_string())),
            Err(e) => Err(e),
        }
    }

    fn parse_dayspec(&self, input: &str) -> Result<DaySpec, Error> {
        // Parse the field as a number if it vaguely resembles one.
        if input.chars().all(|c| c.is_ascii_digit()) {
            let day = input
                .parse()
                .map_err(|_| Error::InvalidDaySpec(input.to_string()))?;
            Ok(DaySpec::Ordinal(day))
        }
        // Check if it starts with `last`, and trim off the first four bytes
        // if it does. (The file is ASCII, so `last` is four bytes.)
        else if let Some(remainder) = input.strip_prefix("last") {
            let weekday = remainder.parse()?;
            Ok(DaySpec::Last(weekday))
        }
        // Check if it's a relative expression with the regex.
        else if let Some(caps) = self.day_field.captures(input) {
            let weekday = caps.name("weekday").unwrap().as_str().parse()?;
            let day = caps
                .name("day")
                .unwrap()
                .as_str()
                .parse()
                .map_err(|_| Error::InvalidDaySpec(input.to_string()))?;

            match caps.name("sign").unwrap().as_str() {
                "<=" => Ok(DaySpec::LastOnOrBefore(weekday, day)),
                ">=" => Ok(DaySpec::FirstOnOrAfter(weekday, day)),
                _ => unreachable!("the regex only matches one of those two"),
            }
        }
        // Otherwise, give up.
        else {
            Err(Error::InvalidDaySpec(input.to_string()))
        }
    }

    fn parse_rule<'a>(&self, input: &'a str) -> Result<Rule<'a>, Error> {
        if let Some(caps) = self.rule_line.captures(input) {
            let name = caps.name("name").unwrap().as_str();

            let from = caps.name("from").unwrap().as_str().parse()?;

            // The end year can be `only` to indicate that this rule only
            // takes place on that year.
            let to = match caps.name("to").unwrap().as_str() {
                "only" => None,
                to => Some(to.parse()?),
            };

            // The `type` column must be present for the line to have the
            // right number of fields, but its value carries no information.

            let month = caps.name("in").unwrap().as_str().parse()?;
            let day = self.parse_dayspec(caps.name("on").unwrap().as_str())?;
            let (at, at_kind) = self.parse_time_and_kind(caps.name("at").unwrap().as_str())?;
            let save = self.parse_time(caps.name("save").unwrap().as_str())?;
            let letter = match caps.name("letter").unwrap().as_str() {
                "-" => None,
                l => Some(l),
            };

            Ok(Rule {
                name,
                from,
                to,
                month,
                day,
                at,
                at_kind,
                save,
                letter,
            })
        } else {
            Err(Error::NotParsedAsRuleLine)
        }
    }

    fn saving_from_str<'a>(&self, input: &'a str) -> Result<Saving<'a>, Error> {
        if input == "-" {
            Ok(Saving::NoSaving)
        } else if input
            .chars()
            .all(|c| c == '-' || c == '_' || c.is_alphabetic())
        {
            Ok(Saving::Multiple(input))
        } else {
            match self.parse_time(input) {
                Ok(time) => Ok(Saving::OneOff(time)),
                Err(_) => Err(Error::CouldNotParseSaving(input.to_string())),
            }
        }
    }

    fn zoneinfo_from_captures<'a>(&self, caps: Captures<'a>) -> Result<ZoneInfo<'a>, Error> {
        let offset = self.parse_time(caps.name("gmtoff").unwrap().as_str())?;
        let saving = self.saving_from_str(caps.name("rulessave").unwrap().as_str())?;
        let format = caps.name("format").unwrap().as_str();

        // The year, month, day, and time fields are all optional, meaning
        // that it should be impossible to, say, have a defined month but
        // not a defined year.
        let until = match (
            caps.name("year"),
            caps.name("month"),
            caps.name("day"),
            caps.name("time"),
        ) {
            (Some(y), Some(m), Some(d), Some(t)) => {
                let year = y
                    .as_str()
                    .parse()
                    .map_err(|_| Error::FailedYearParse(y.as_str().to_string()))?;
                let (time, kind) = self.parse_time_and_kind(t.as_str())?;
                Some(UntilDateTime::Time(
                    year,
                    m.as_str().parse()?,
                    self.parse_dayspec(d.as_str())?,
                    time,
                    kind,
                ))
            }
            (Some(y), Some(m), Some(d), _) => {
                let year = y
                    .as_str()
                    .parse()
                    .map_err(|_| Error::FailedYearParse(y.as_str().to_string()))?;
                Some(UntilDateTime::Day(
                    year,
                    m.as_str().parse()?,
                    self.parse_dayspec(d.as_str())?,
                ))
            }
            (Some(y), Some(m), _, _) => {
                let year = y
                    .as_str()
                    .parse()
                    .map_err(|_| Error::FailedYearParse(y.as_str().to_string()))?;
                Some(UntilDateTime::Month(year, m.as_str().parse()?))
            }
            (Some(y), _, _, _) => {
                let year = y
                    .as_str()
                    .parse()
                    .map_err(|_| Error::FailedYearParse(y.as_str().to_string()))?;
                Some(UntilDateTime::Year(year))
            }
            (None, None, None, None) => None,
            _ => unreachable!("out-of-order capturing groups"),
        };

        Ok(ZoneInfo {
            offset,
            saving,
            format,
            until,
        })
    }

    fn parse_zone<'a>(&self, input: &'a str) -> Result<Zone<'a>, Error> {
        if let Some(caps) = self.zone_line.captures(input) {
            let name = caps.name("name").unwrap().as_str();
            let info = self.zoneinfo_from_captures(caps)?;
            Ok(Zone { name, info })
        } else {
            Err(Error::NotParsedAsZoneLine)
        }
    }

    fn parse_link<'a>(&self, input: &'a str) -> Result<Link<'a>, Error> {
        if let Some(caps) = self.link_line.captures(input) {
            let canonical = caps.name("canonical").unwrap().as_str();
            let alias = caps.name("alias").unwrap().as_str();
            Ok(Link { canonical, alias })
        } else {
            Err(Error::NotParsedAsLinkLine)
        }
    }

    /// Attempt to parse this line, returning a `Line` depending on what
    /// type of line it was, or an `Error` if it couldn't be parsed.
    pub fn parse_str<'a>(&self, input: &'a str) -> Result<Line<'a>, Error> {
        if self.empty_line.is_match(input) {
            return Ok(Line::Space);
        }

        match self.parse_zone(input) {
            Err(Error::NotParsedAsZoneLine) => {}
            result => return result.map(Line::Zone),
        }

        match self.continuation_line.captures(input) {
            None => {}
            Some(caps) => return self.zoneinfo_from_captures(caps).map(Line::Continuation),
        }

        match self.parse_rule(input) {
            Err(Error::NotParsedAsRuleLine) => {}
            result => return result.map(Line::Rule),
        }

        match self.parse_link(input) {
            Err(Error::NotParsedAsLinkLine) => {}
            result => return result.map(Line::Link),
        }

        Err(Error::InvalidLineType(input.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekdays() {
        assert_eq!(Weekday::of(1970, Month::January, 1), Weekday::Thursday);
        assert_eq!(Weekday::of(2017, Month::February, 11), Weekday::Saturday);
        assert_eq!(Weekday::of(1890, Month::March, 2), Weekday::Sunday);
        assert_eq!(Weekday::of(2100, Month::April, 20), Weekday::Tuesday);
        assert_eq!(Weekday::of(2009, Month::May, 31), Weekday::Sunday);
        assert_eq!(Weekday::of(1995, Month::July, 21), Weekday::Friday);
        assert_eq!(Weekday::of(2016, Month::February, 29), Weekday::Monday);
    }

    #[test]
    fn leap_years() {
        assert!(!is_leap(1900));
        assert!(is_leap(1904));
        assert!(is_leap(1996));
        assert!(!is_leap(1997));
        assert!(is_leap(2000));
        assert!(!is_leap(2100));
    }

    #[test]
    fn last_sunday_of_february() {
        let spec = DaySpec::Last(Weekday::Sunday);
        assert_eq!(spec.resolve(2000, Month::February), Some(27));
    }

    #[test]
    fn last_monday_through_the_year() {
        let spec = DaySpec::Last(Weekday::Monday);
        assert_eq!(spec.resolve(2016, Month::January), Some(25));
        assert_eq!(spec.resolve(2016, Month::February), Some(29));
        assert_eq!(spec.resolve(2016, Month::March), Some(28));
        assert_eq!(spec.resolve(2016, Month::October), Some(31));
        assert_eq!(spec.resolve(2016, Month::December), Some(26));
    }

    #[test]
    fn first_sunday_on_or_after() {
        let spec = DaySpec::FirstOnOrAfter(Weekday::Sunday, 8);
        assert_eq!(spec.resolve(2015, Month::March), Some(8));

        let spec = DaySpec::FirstOnOrAfter(Weekday::Monday, 20);
        assert_eq!(spec.resolve(2016, Month::January), Some(25));
        assert_eq!(spec.resolve(2016, Month::June), Some(20));
    }

    #[test]
    fn last_sunday_on_or_before() {
        // Sundays in March 2015 fall on the 1st, 8th, 15th, 22nd and 29th.
        let spec = DaySpec::LastOnOrBefore(Weekday::Sunday, 25);
        assert_eq!(spec.resolve(2015, Month::March), Some(22));
        assert!(!spec.matches(2015, Month::March, 15));
    }

    #[test]
    fn no_matching_day() {
        assert_eq!(DaySpec::Ordinal(30).resolve(2001, Month::February), None);
        // A Friday on or before the 1st only exists when the 1st is one.
        let spec = DaySpec::LastOnOrBefore(Weekday::Friday, 1);
        assert_eq!(spec.resolve(2012, Month::April), None);
        assert_eq!(spec.resolve(2016, Month::April), Some(1));
    }

    #[test]
    fn time_parse_and_display() {
        assert_eq!("2".parse(), Ok(Time::from_secs(2 * 3600)));
        assert_eq!("2:00".parse(), Ok(Time::from_secs(2 * 3600)));
        assert_eq!("15:13:42".parse(), Ok(Time::from_secs(54822)));
        assert_eq!("-15:56".parse(), Ok(Time::from_secs(-57360)));
        assert_eq!("-0:14:44".parse(), Ok(Time::from_secs(-884)));
        assert_eq!("-".parse(), Ok(Time::ZERO));
        assert_eq!("24:00".parse(), Ok(Time::from_secs(86400)));
        assert!("".parse::<Time>().is_err());
        assert!("1:60".parse::<Time>().is_err());
        assert!("1:00:00:00".parse::<Time>().is_err());

        for secs in [0, 1, 59, 60, 3600, 7200, 54822, -57360, -884, 90000] {
            let time = Time::from_secs(secs);
            assert_eq!(time.to_string().parse(), Ok(time));
        }
        assert_eq!(Time::from_secs(-884).to_string(), "-00:14:44");
        assert_eq!(Time::from_secs(90000).to_string(), "25:00:00");
    }

    #[test]
    fn timestamps() {
        assert_eq!(timestamp(1970, Month::January, 1, 0), 0);
        assert_eq!(timestamp(2016, Month::January, 1, 0), 1451606400);
        assert_eq!(timestamp(1900, Month::January, 1, 0), -2208988800);
        assert_eq!(timestamp(2000, Month::February, 27, 9 * 3600), 951642000);
    }

    #[test]
    fn twenty_four_hundred_rolls_over() {
        let until = UntilDateTime::Time(
            1984,
            Month::October,
            DaySpec::Ordinal(1),
            Time::from_secs(86400),
            TimeKind::Wall,
        );
        assert_eq!(until.to_timestamp(), Ok(465523200));
        assert_eq!(
            until.to_timestamp().unwrap(),
            timestamp(1984, Month::October, 2, 0)
        );
    }

    #[test]
    fn until_resolution_can_fail() {
        let until = UntilDateTime::Day(2001, Month::February, DaySpec::Ordinal(30));
        assert_eq!(
            until.to_timestamp(),
            Err(Error::NoDayInMonth(2001, Month::February))
        );
    }

    macro_rules! test {
        ($name:ident: $input:expr => $result:expr) => {
            #[test]
            fn $name() {
                let parser = LineParser::default();
                assert_eq!(parser.parse_str($input), $result);
            }
        };
    }

    test!(empty:    ""          => Ok(Line::Space));
    test!(spaces:   "        "  => Ok(Line::Space));

    test!(rule_1: "Rule  US    1967  1973  -     Apr  lastSun  2:00  1:00  D" => Ok(Line::Rule(Rule {
        name:    "US",
        from:    Year::Number(1967),
        to:      Some(Year::Number(1973)),
        month:   Month::April,
        day:     DaySpec::Last(Weekday::Sunday),
        at:      Time::from_secs(2 * 3600),
        at_kind: TimeKind::Wall,
        save:    Time::from_secs(3600),
        letter:  Some("D"),
    })));

    test!(rule_2: "Rule	Greece	1976	only	-	Oct	10	2:00s	0	-" => Ok(Line::Rule(Rule {
        name:    "Greece",
        from:    Year::Number(1976),
        to:      None,
        month:   Month::October,
        day:     DaySpec::Ordinal(10),
        at:      Time::from_secs(2 * 3600),
        at_kind: TimeKind::Standard,
        save:    Time::ZERO,
        letter:  None,
    })));

    test!(rule_3: "Rule	EU	1977	1980	-	Apr	Sun>=1	 1:00u	1:00	S" => Ok(Line::Rule(Rule {
        name:    "EU",
        from:    Year::Number(1977),
        to:      Some(Year::Number(1980)),
        month:   Month::April,
        day:     DaySpec::FirstOnOrAfter(Weekday::Sunday, 1),
        at:      Time::from_secs(3600),
        at_kind: TimeKind::Universal,
        save:    Time::from_secs(3600),
        letter:  Some("S"),
    })));

    // The TYPE column carries no information, so any token is accepted.
    test!(type_column_ignored: "Rule	EU	1977	1980	HEY	Apr	Sun>=1	 1:00u	1:00	S" => Ok(Line::Rule(Rule {
        name:    "EU",
        from:    Year::Number(1977),
        to:      Some(Year::Number(1980)),
        month:   Month::April,
        day:     DaySpec::FirstOnOrAfter(Weekday::Sunday, 1),
        at:      Time::from_secs(3600),
        at_kind: TimeKind::Universal,
        save:    Time::from_secs(3600),
        letter:  Some("S"),
    })));

    test!(bad_month: "Rule	EU	1977	1980	-	Febtober	Sun>=1	 1:00u	1:00	S" => Err(Error::FailedMonthParse("febtober".to_string())));

    test!(zone: "Zone  Australia/Adelaide  9:30    Aus         AC%sT   1971 Oct 31  2:00:00" => Ok(Line::Zone(Zone {
        name: "Australia/Adelaide",
        info: ZoneInfo {
            offset: Time::from_secs(9 * 3600 + 30 * 60),
            saving: Saving::Multiple("Aus"),
            format: "AC%sT",
            until:  Some(UntilDateTime::Time(1971, Month::October, DaySpec::Ordinal(31), Time::from_secs(2 * 3600), TimeKind::Wall)),
        },
    })));

    test!(zone_one_off: "Zone  Test/One_Off  4:00  0:30  TEST" => Ok(Line::Zone(Zone {
        name: "Test/One_Off",
        info: ZoneInfo {
            offset: Time::from_secs(4 * 3600),
            saving: Saving::OneOff(Time::from_secs(30 * 60)),
            format: "TEST",
            until:  None,
        },
    })));

    test!(continuation_1: "                          9:30    Aus         AC%sT   1971 Oct 31  2:00:00" => Ok(Line::Continuation(ZoneInfo {
        offset: Time::from_secs(9 * 3600 + 30 * 60),
        saving: Saving::Multiple("Aus"),
        format: "AC%sT",
        until:  Some(UntilDateTime::Time(1971, Month::October, DaySpec::Ordinal(31), Time::from_secs(2 * 3600), TimeKind::Wall)),
    })));

    test!(continuation_2: "			1:00	C-Eur	CE%sT	1943 Oct 25" => Ok(Line::Continuation(ZoneInfo {
        offset: Time::from_secs(3600),
        saving: Saving::Multiple("C-Eur"),
        format: "CE%sT",
        until:  Some(UntilDateTime::Day(1943, Month::October, DaySpec::Ordinal(25))),
    })));

    test!(zone_hyphen: "Zone Asia/Ust-Nera\t 9:32:54 -\tLMT\t1919" => Ok(Line::Zone(Zone {
        name: "Asia/Ust-Nera",
        info: ZoneInfo {
            offset: Time::from_secs(9 * 3600 + 32 * 60 + 54),
            saving: Saving::NoSaving,
            format: "LMT",
            until:  Some(UntilDateTime::Year(1919)),
        },
    })));

    #[test]
    fn negative_offsets() {
        static LINE: &str = "Zone    Europe/London   -0:01:15 -  LMT 1847 Dec  1  0:00s";
        let parser = LineParser::default();
        let zone = parser.parse_zone(LINE).unwrap();
        assert_eq!(zone.info.offset, Time::from_secs(-75));
        assert_eq!(
            zone.info.until,
            Some(UntilDateTime::Time(
                1847,
                Month::December,
                DaySpec::Ordinal(1),
                Time::ZERO,
                TimeKind::Standard
            ))
        );
    }

    #[test]
    fn negative_offsets_2() {
        static LINE: &str = "Zone America/Danmarkshavn -1:14:40 -    LMT 1916 Jul 28";
        let parser = LineParser::default();
        let zone = parser.parse_zone(LINE).unwrap();
        assert_eq!(zone.info.offset, Time::from_secs(-(3600 + 14 * 60 + 40)));
    }

    test!(link: "Link  Europe/Istanbul  Asia/Istanbul" => Ok(Line::Link(Link {
        canonical: "Europe/Istanbul",
        alias:     "Asia/Istanbul",
    })));

    #[test]
    fn month_from_str() {
        assert_eq!("Aug".parse(), Ok(Month::August));
        assert_eq!("December".parse(), Ok(Month::December));
    }

    test!(golb: "GOLB" => Err(Error::InvalidLineType("GOLB".to_string())));

    test!(comment: "# this is a comment" => Ok(Line::Space));
    test!(another_comment: "     # so is this" => Ok(Line::Space));
    test!(multiple_hash: "     # so is this ## " => Ok(Line::Space));

    test!(comment_after: "Link  Europe/Istanbul  Asia/Istanbul #with a comment after" => Ok(Line::Link(Link {
        canonical: "Europe/Istanbul",
        alias:     "Asia/Istanbul",
    })));
}
