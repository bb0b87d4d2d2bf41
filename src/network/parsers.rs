//! Parsers for diagnostic CLI text.
//!
//! Some EOS commands only offer text output. These helpers turn the common
//! shapes of that text into values the inventory getters can use.

use crate::error::{Error, Result};
use indexmap::IndexMap;

/// Parse `Key: value` lines into an ordered map.
///
/// Only the first colon separates key from value, so values such as MAC
/// addresses or times keep theirs. Lines without a colon are kept as keys
/// with no value; blank lines are skipped.
///
/// ```
/// use netcommit::network::parsers::parse_colon_separated;
///
/// let map = parse_colon_separated("Name: Et3\nOperational Mode: trunk\nTrunk Groups:\n");
/// assert_eq!(map["Operational Mode"].as_deref(), Some("trunk"));
/// assert_eq!(map["Trunk Groups"].as_deref(), Some(""));
/// ```
pub fn parse_colon_separated(text: &str) -> IndexMap<String, Option<String>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| match line.split_once(':') {
            Some((key, value)) => (key.trim().to_string(), Some(value.trim().to_string())),
            None => (line.trim().to_string(), None),
        })
        .collect()
}

/// Expand a VLAN list such as `2-3,5-7,23` into individual IDs.
///
/// `ALL` expands to 1-4094 and `NONE` to nothing.
pub fn expand_vlan_range(spec: &str) -> Result<Vec<u16>> {
    let spec = spec.trim();
    match spec.to_ascii_uppercase().as_str() {
        "ALL" => return Ok((1..=4094).collect()),
        "NONE" | "" => return Ok(Vec::new()),
        _ => {}
    }

    let mut vlans = Vec::new();
    for element in spec.split(',').map(str::trim) {
        match element.split_once('-') {
            None => vlans.push(parse_vlan(element, spec)?),
            Some((start, end)) => {
                let start = parse_vlan(start, spec)?;
                let end = parse_vlan(end, spec)?;
                if start > end {
                    return Err(Error::parse(
                        "vlan range",
                        format!("descending range '{}' in '{}'", element, spec),
                    ));
                }
                vlans.extend(start..=end);
            }
        }
    }
    Ok(vlans)
}

fn parse_vlan(value: &str, spec: &str) -> Result<u16> {
    value.trim().parse::<u16>().map_err(|_| {
        Error::parse(
            "vlan range",
            format!("'{}' in '{}' is not a VLAN ID", value, spec),
        )
    })
}

/// Read the first integer of a value such as `3 (VLAN0003)`.
pub fn leading_number(value: &str) -> Option<u32> {
    value.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SWITCHPORT: &str = "Name: Et3
Switchport: Enabled
Administrative Mode: trunk
Operational Mode: trunk
MAC Address Learning: enabled
Access Mode VLAN: 3 (VLAN0003)
Trunking Native Mode VLAN: 1 (default)
Administrative Native VLAN tagging: disabled
Trunking VLANs Enabled: 2-3,5-7,20-21,23,100-200
Trunk Groups:
";

    #[test]
    fn test_parse_switchport_output() {
        let map = parse_colon_separated(SWITCHPORT);
        assert_eq!(map.len(), 10);
        assert_eq!(map["Name"].as_deref(), Some("Et3"));
        assert_eq!(map["Access Mode VLAN"].as_deref(), Some("3 (VLAN0003)"));
        assert_eq!(map["Trunk Groups"].as_deref(), Some(""));
        assert_eq!(map.get_index(0).unwrap().0, "Name");
    }

    #[test]
    fn test_value_keeps_later_colons() {
        let map = parse_colon_separated("Hardware address: 00:1c:73:aa:bb:cc\nno colon here");
        assert_eq!(
            map["Hardware address"].as_deref(),
            Some("00:1c:73:aa:bb:cc")
        );
        assert_eq!(map["no colon here"], None);
    }

    #[test]
    fn test_expand_vlan_range() {
        let vlans = expand_vlan_range("2-3,5-7,20-21,23").unwrap();
        assert_eq!(vlans, vec![2, 3, 5, 6, 7, 20, 21, 23]);
        assert_eq!(expand_vlan_range("100-200").unwrap().len(), 101);
    }

    #[test]
    fn test_expand_vlan_keywords() {
        assert_eq!(expand_vlan_range("ALL").unwrap().len(), 4094);
        assert!(expand_vlan_range("NONE").unwrap().is_empty());
    }

    #[test]
    fn test_expand_vlan_range_errors() {
        assert!(expand_vlan_range("2-x").is_err());
        assert!(expand_vlan_range("10-2").is_err());
        assert!(expand_vlan_range("1-2-3").is_err());
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("3 (VLAN0003)"), Some(3));
        assert_eq!(leading_number("1 (default)"), Some(1));
        assert_eq!(leading_number("n/a"), None);
    }
}
