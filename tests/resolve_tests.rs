use zoneinfo_compile::expand::ExpansionCache;
use zoneinfo_compile::line::{Line, LineParser, Time};
use zoneinfo_compile::table::{Table, TableBuilder, MIN_DATETIME};
use zoneinfo_compile::transitions::{
    resolve_all, Error, FixedTimeZone, TableResolve, TimeZone, Transition,
};

/// Builds a table from an embedded piece of zoneinfo text.
fn table(input: &str) -> Table {
    let parser = LineParser::default();
    let mut builder = TableBuilder::new();

    for raw in input.lines() {
        let line = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };

        match parser.parse_str(line).unwrap() {
            Line::Space => {}
            Line::Zone(zone) => builder.add_zone_line(zone).unwrap(),
            Line::Continuation(info) => builder.add_continuation_line(info).unwrap(),
            Line::Rule(rule) => builder.add_rule_line(rule).unwrap(),
            Line::Link(link) => builder.add_link_line(link).unwrap(),
        }
    }

    builder.build()
}

fn fixed(abbr: &str, offset: i64, save: i64) -> FixedTimeZone {
    FixedTimeZone {
        abbr: abbr.to_owned(),
        offset: Time::from_secs(offset),
        save: Time::from_secs(save),
    }
}

#[test]
fn fixed_only_zone() {
    let table = table("Zone  Etc/GMT  0  -  GMT");
    let mut cache = ExpansionCache::new();

    assert_eq!(
        table.resolve("Etc/GMT", &mut cache),
        Ok(TimeZone::Fixed(fixed("GMT", 0, 0)))
    );
}

#[test]
fn rule_driven_timeline() {
    let table = table(
        "
# An abridged version of the early Warsaw entries.
Rule Poland 1918 1919 - Sep 16 2:00s 0    -
Rule Poland 1919 only - Apr 15 2:00s 1:00 S
Rule Poland 1944 only - Apr  3 2:00s 1:00 S
Zone Europe/Warsaw 1:24:00 - LMT 1915 Aug  5
                   1:00 Poland CE%sT
",
    );
    let mut cache = ExpansionCache::new();

    let warsaw = match table.resolve("Europe/Warsaw", &mut cache) {
        Ok(TimeZone::Variable(zone)) => zone,
        other => panic!("expected a variable zone, got {:?}", other),
    };

    // The September 1918 rule leaves the saving at zero, so it produces
    // no observable transition; the remaining instants convert from
    // standard time (2:00s minus the 1:00 base offset).
    let expected = vec![
        Transition {
            utc: MIN_DATETIME,
            tz: fixed("LMT", 5040, 0),
        },
        Transition {
            utc: -1_717_032_240, // 1915-08-05 00:00 wall, minus 1:24:00
            tz: fixed("CET", 3600, 0),
        },
        Transition {
            utc: -1_600_470_000, // 1919-04-15 02:00 standard
            tz: fixed("CEST", 3600, 3600),
        },
        Transition {
            utc: -1_587_164_400, // 1919-09-16 02:00 standard
            tz: fixed("CET", 3600, 0),
        },
        Transition {
            utc: -812_502_000, // 1944-04-03 02:00 standard
            tz: fixed("CEST", 3600, 3600),
        },
    ];

    assert_eq!(warsaw.name, "Europe/Warsaw");
    assert_eq!(warsaw.transitions, expected);
}

#[test]
fn placeholder_formats_take_the_rule_letter() {
    let table = table(
        "
Rule US 1967 1973 - Apr lastSun 2:00 1:00 D
Rule US 1967 2006 - Oct lastSun 2:00 0    S
Zone America/New_York -5:00 US E%sT
",
    );
    let mut cache = ExpansionCache::new();

    let new_york = match table.resolve("America/New_York", &mut cache) {
        Ok(TimeZone::Variable(zone)) => zone,
        other => panic!("expected a variable zone, got {:?}", other),
    };

    // Seven years of April/October flips, plus the opening state. The
    // October rules keep firing through 2006, but once the April rules
    // stop in 1973 they no longer change anything.
    assert_eq!(new_york.transitions.len(), 15);

    assert_eq!(
        new_york.transitions[0],
        Transition {
            utc: MIN_DATETIME,
            tz: fixed("EST", -18000, 0),
        }
    );

    // 1967-04-30 02:00 wall = 07:00 UTC, and 1967-10-29 02:00 wall (with
    // the saving in force) = 06:00 UTC; both match the reference data.
    assert_eq!(new_york.transitions[1].utc, -84_387_600);
    assert_eq!(new_york.transitions[1].tz, fixed("EDT", -18000, 3600));
    assert_eq!(new_york.transitions[2].utc, -68_666_400);
    assert_eq!(new_york.transitions[2].tz, fixed("EST", -18000, 0));

    for pair in new_york.transitions.windows(2) {
        assert!(pair[0].utc < pair[1].utc);
        assert_ne!(pair[0].tz, pair[1].tz);
    }
}

#[test]
fn links_mirror_their_canonical_zone() {
    let table = table(
        "
Rule Poland 1918 1919 - Sep 16 2:00s 0    -
Rule Poland 1919 only - Apr 15 2:00s 1:00 S
Zone Europe/Warsaw 1:24:00 - LMT 1915 Aug  5
                   1:00 Poland CE%sT
Link Europe/Warsaw Poland
",
    );

    let resolved = resolve_all(&table);
    assert!(resolved.failures.is_empty());

    let warsaw = match &resolved.timezones["Europe/Warsaw"] {
        TimeZone::Variable(zone) => zone,
        other => panic!("expected a variable zone, got {:?}", other),
    };
    let alias = match &resolved.timezones["Poland"] {
        TimeZone::Variable(zone) => zone,
        other => panic!("expected a variable zone, got {:?}", other),
    };

    assert_eq!(alias.name, "Poland");
    assert_eq!(alias.transitions, warsaw.transitions);
}

#[test]
fn resolved_zones_are_listed_in_name_order() {
    let table = table(
        "
Zone B/Zone 1:00 - BST
Zone A/Zone 0:00 - AST
Zone C/Zone 2:00 - CST
",
    );

    let resolved = resolve_all(&table);
    let names: Vec<&String> = resolved.timezones.keys().collect();
    assert_eq!(names, ["A/Zone", "B/Zone", "C/Zone"]);
}

#[test]
fn mixed_reference_period_ends_must_be_far_apart() {
    let table = table(
        "
Zone Test/Ambiguous 0:00 - AAA 1980 Jan 1 0:00u
                    1:00 - BBB 1980 Jan 1 12:00s
                    2:00 - CCC
",
    );
    let mut cache = ExpansionCache::new();

    assert_eq!(
        table.resolve("Test/Ambiguous", &mut cache),
        Err(Error::AmbiguousPeriodOrder {
            zone: "Test/Ambiguous".to_owned(),
        })
    );
}

#[test]
fn unknown_rule_set_names_the_zone() {
    let table = table("Zone Test/Missing 1:00 Ghost T%sT");
    let mut cache = ExpansionCache::new();

    assert_eq!(
        table.resolve("Test/Missing", &mut cache),
        Err(Error::UnknownRuleset {
            zone: "Test/Missing".to_owned(),
            ruleset: "Ghost".to_owned(),
        })
    );
}

#[test]
fn failures_do_not_stop_other_zones() {
    let table = table(
        "
Zone Test/Missing 1:00 Ghost T%sT
Zone Etc/GMT 0 - GMT
",
    );

    let resolved = resolve_all(&table);
    assert_eq!(resolved.failures.len(), 1);
    assert!(resolved.timezones.contains_key("Etc/GMT"));
    assert!(!resolved.timezones.contains_key("Test/Missing"));
}
