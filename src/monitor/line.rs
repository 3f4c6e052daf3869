//! `%MON` line recognition

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref MON_LINE: Regex =
        Regex::new(r"^.*%MON\s+([A-Za-z0-9_]+)\s*=\s*(.+?)\s*$").unwrap();
}

/// Split a `... %MON <KEY> = <VALUE>` line into key and raw value text.
///
/// Anything before `%MON` (process prefixes, timestamps) is ignored. Returns
/// `None` for lines that are not monitor lines.
#[must_use]
pub fn parse_monitor_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\n', '\r']);
    let caps = MON_LINE.captures(line)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}
