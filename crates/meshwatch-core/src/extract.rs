//! Per-prefix field extraction for the stream parser.
//!
//! Each body line of a record block starts with a case-sensitive keyword
//! (`From:`, `Battery:`, `RSSI:`, ...). [`LINE_RULES`] maps every keyword
//! to the function that pulls its fields out of the line. A rule that
//! fails to match its expected sub-format leaves the field unset; noisy
//! upstream text is never an error.

use std::sync::LazyLock;

use meshwatch_types::NodeId;
use meshwatch_types::record::NOT_AVAILABLE;
use regex::Regex;

/// Fields gathered for the record currently being parsed.
///
/// All fields are optional. Which of them survive depends on the record
/// kind chosen by the header line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFields {
    /// `From:` value.
    pub node_id: Option<NodeId>,
    /// First free-text line of a message block.
    pub body: Option<String>,
    /// Raw `"lat, lng"` pair from `Location:`.
    pub location: Option<String>,
    /// Altitude with unit, e.g. `"120m"`.
    pub altitude: Option<String>,
    /// Signal strength from an `RSSI:` line.
    pub rssi: Option<String>,
    /// Signal-to-noise ratio from an `RSSI:` line.
    pub snr: Option<String>,
    /// Battery display value.
    pub battery: Option<String>,
    /// Battery voltage with unit, e.g. `"4.1V"`.
    pub voltage: Option<String>,
    /// Channel utilisation percent.
    pub channel_util_percent: Option<f64>,
    /// Transmit air utilisation percent.
    pub air_util_percent: Option<f64>,
    /// Uptime in hours.
    pub uptime_hours: Option<f64>,
    /// `Map:` link.
    pub map_link: Option<String>,
}

/// A keyword line and the extraction applied to it.
#[derive(Debug)]
pub struct LineRule {
    /// Case-sensitive keyword the trimmed line must start with.
    pub prefix: &'static str,
    /// Extraction into the in-progress fields.
    pub extract: fn(&str, &mut RawFields),
}

/// Extraction table, consulted in order. First matching prefix wins.
pub static LINE_RULES: &[LineRule] = &[
    LineRule { prefix: "From:", extract: extract_from },
    LineRule { prefix: "Battery:", extract: extract_battery },
    LineRule { prefix: "Channel Util:", extract: extract_utilisation },
    LineRule { prefix: "Uptime:", extract: extract_uptime },
    LineRule { prefix: "Location:", extract: extract_location },
    LineRule { prefix: "RSSI:", extract: extract_signal },
    LineRule { prefix: "Map:", extract: extract_map },
];

/// Find the rule for a trimmed line, if it is a keyword line.
pub fn rule_for(line: &str) -> Option<&'static LineRule> {
    LINE_RULES.iter().find(|rule| line.starts_with(rule.prefix))
}

/// Apply the matching rule to a trimmed line. Returns `false` when the
/// line is not a keyword line.
pub fn apply_rule(line: &str, fields: &mut RawFields) -> bool {
    rule_for(line).is_some_and(|rule| {
        (rule.extract)(line, fields);
        true
    })
}

type Pattern = LazyLock<Option<Regex>>;

static BATTERY_PERCENT: Pattern = LazyLock::new(|| Regex::new(r"Battery:\s*(\d+)%").ok());
static VOLTAGE: Pattern = LazyLock::new(|| Regex::new(r"Voltage:\s*([\d.]+)V").ok());
static CHANNEL_UTIL: Pattern = LazyLock::new(|| Regex::new(r"Channel Util:\s*([\d.]+)%").ok());
static AIR_UTIL: Pattern = LazyLock::new(|| Regex::new(r"Air Util TX:\s*([\d.]+)%").ok());
static UPTIME: Pattern = LazyLock::new(|| Regex::new(r"Uptime:\s*([\d.]+)\s*hours").ok());
static LOCATION: Pattern =
    LazyLock::new(|| Regex::new(r"Location:\s*([-\d.]+,\s*[-\d.]+)").ok());
static ALTITUDE: Pattern = LazyLock::new(|| Regex::new(r"Altitude:\s*(\d+m)").ok());
static RSSI: Pattern = LazyLock::new(|| Regex::new(r"RSSI:\s*([-\d.]+|N/A)").ok());
static SNR: Pattern = LazyLock::new(|| Regex::new(r"SNR:\s*([-\d.]+|N/A)").ok());
static TRAILING_BATTERY: Pattern = LazyLock::new(|| Regex::new(r"Battery:\s*(\S.*?)\s*$").ok());
static BRACKETED: Pattern = LazyLock::new(|| Regex::new(r"\[(.*?)\]").ok());

/// First capture group of `pattern` in `line`.
fn capture<'a>(pattern: &Pattern, line: &'a str) -> Option<&'a str> {
    let re = LazyLock::force(pattern).as_ref()?;
    re.captures(line)?.get(1).map(|m| m.as_str())
}

/// Parse a captured decimal, discarding malformed or non-finite values.
fn capture_number(pattern: &Pattern, line: &str) -> Option<f64> {
    capture(pattern, line)?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Bracketed timestamp token from a header line, e.g. `[2024-01-01 12:00:00]`.
/// Empty brackets count as absent.
pub fn header_timestamp(line: &str) -> Option<String> {
    capture(&BRACKETED, line)
        .map(str::trim)
        .filter(|ts| !ts.is_empty())
        .map(str::to_owned)
}

fn rest_after<'a>(line: &'a str, prefix: &str) -> &'a str {
    line.strip_prefix(prefix).unwrap_or(line).trim()
}

fn extract_from(line: &str, fields: &mut RawFields) {
    fields.node_id = NodeId::from_text(rest_after(line, "From:"));
}

fn extract_battery(line: &str, fields: &mut RawFields) {
    if let Some(level) = capture(&BATTERY_PERCENT, line) {
        fields.battery = Some(format!("{level}%"));
    }
    if let Some(volts) = capture(&VOLTAGE, line) {
        fields.voltage = Some(format!("{volts}V"));
    }
}

fn extract_utilisation(line: &str, fields: &mut RawFields) {
    if let Some(channel) = capture_number(&CHANNEL_UTIL, line) {
        fields.channel_util_percent = Some(channel);
    }
    if let Some(air) = capture_number(&AIR_UTIL, line) {
        fields.air_util_percent = Some(air);
    }
}

fn extract_uptime(line: &str, fields: &mut RawFields) {
    if let Some(hours) = capture_number(&UPTIME, line) {
        fields.uptime_hours = Some(hours);
    }
}

fn extract_location(line: &str, fields: &mut RawFields) {
    if let Some(pair) = capture(&LOCATION, line) {
        fields.location = Some(pair.to_owned());
    }
    if let Some(altitude) = capture(&ALTITUDE, line) {
        fields.altitude = Some(altitude.to_owned());
    }
}

fn extract_signal(line: &str, fields: &mut RawFields) {
    if let Some(rssi) = capture(&RSSI, line) {
        fields.rssi = Some(rssi.to_owned());
    }
    if let Some(snr) = capture(&SNR, line) {
        fields.snr = Some(snr.to_owned());
    }
    if let Some(battery) = capture(&TRAILING_BATTERY, line)
        && battery != NOT_AVAILABLE
    {
        fields.battery = Some(battery.to_owned());
    }
}

fn extract_map(line: &str, fields: &mut RawFields) {
    let link = rest_after(line, "Map:");
    if !link.is_empty() {
        fields.map_link = Some(link.to_owned());
    }
}
