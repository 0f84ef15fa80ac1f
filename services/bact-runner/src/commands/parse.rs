//! Parsing of workflow-command lines.
//!
//! Two formats are recognized: the current `::command key=value,…::data`
//! syntax and the legacy `##[command key=value;…]data` syntax. Each has its
//! own escape table; in both, the `%` substitution is applied last so that
//! double-encoded sequences survive one decode exactly.

use std::collections::HashMap;

use super::{CommandName, ParsedCommand};

type EscapeTable = &'static [(&'static str, &'static str)];

/// `(token, replacement)` pairs for command data.
const DATA_ESCAPES: EscapeTable = &[("\r", "%0D"), ("\n", "%0A"), ("%", "%25")];

/// `(token, replacement)` pairs for command property values.
const PROPERTY_ESCAPES: EscapeTable = &[
    ("\r", "%0D"),
    ("\n", "%0A"),
    (":", "%3A"),
    (",", "%2C"),
    ("%", "%25"),
];

/// `(token, replacement)` pairs for the legacy format.
const LEGACY_ESCAPES: EscapeTable = &[
    (";", "%3B"),
    ("\r", "%0D"),
    ("\n", "%0A"),
    ("]", "%5D"),
    ("%", "%25"),
];

fn unescape(table: EscapeTable, data: &str) -> String {
    let mut out = data.to_string();
    for (token, replacement) in table {
        out = out.replace(replacement, token);
    }
    out
}

/// Try to parse one line of step output as a workflow command.
///
/// Returns `None` when the line is not a command (including lines naming an
/// unknown command); such lines are plain text.
pub fn parse_workflow_command(line: &str) -> Option<ParsedCommand> {
    let raw = line.to_string();
    let trimmed = line.trim();

    let mut parsed = if trimmed.starts_with("::") {
        parse_v2(trimmed)?
    } else if let Some(start) = trimmed.find("##[") {
        parse_v1(&trimmed[start..])?
    } else {
        return None;
    };

    parsed.raw = raw;
    Some(parsed)
}

/// Parse the documented `::command key=value,…::data` format.
fn parse_v2(line: &str) -> Option<ParsedCommand> {
    let line = line.trim_start_matches(' ');
    let line = line.strip_prefix("::")?;
    let header_end = line.find("::")?;
    let (header, data_raw) = (&line[..header_end], &line[header_end + 2..]);

    let (command_str, props_str) = match header.find(' ') {
        Some(idx) => (&header[..idx], &header[idx..]),
        None => (header, ""),
    };
    let command: CommandName = match command_str.parse() {
        Ok(c) => c,
        Err(()) => {
            tracing::warn!(command = %command_str, "line looks like a command, but the name is unknown");
            return None;
        }
    };

    let props = parse_props(props_str, ',', PROPERTY_ESCAPES);

    Some(ParsedCommand {
        command,
        props,
        data: unescape(DATA_ESCAPES, data_raw),
        raw: String::new(),
    })
}

/// Parse the legacy `##[command key=value;…]data` format, which may appear
/// after arbitrary prefix text.
fn parse_v1(line: &str) -> Option<ParsedCommand> {
    let line = line.strip_prefix("##[")?;
    let header_end = line.find(']')?;
    let (header, data_raw) = (&line[..header_end], &line[header_end + 1..]);

    let (command_str, props_str) = match header.find(' ') {
        Some(idx) => (&header[..idx], &header[idx..]),
        None => (header, ""),
    };
    let command: CommandName = match command_str.parse() {
        Ok(c) => c,
        Err(()) => {
            tracing::warn!(command = %command_str, "line looks like a legacy command, but the name is unknown");
            return None;
        }
    };

    let props = parse_props(props_str, ';', LEGACY_ESCAPES);

    Some(ParsedCommand {
        command,
        props,
        data: unescape(LEGACY_ESCAPES, data_raw),
        raw: String::new(),
    })
}

/// Split `key=value` pairs on `separator`. Pairs without `=` and pairs with
/// an empty value are dropped.
fn parse_props(props_str: &str, separator: char, table: EscapeTable) -> HashMap<String, String> {
    let mut props = HashMap::new();
    for prop in props_str.trim_start_matches(' ').split(separator) {
        if prop.is_empty() {
            continue;
        }
        let Some((key, value)) = prop.split_once('=') else {
            tracing::warn!(property = %prop, "property ignored because it does not contain '='");
            continue;
        };
        if value.is_empty() {
            tracing::warn!(property = %prop, "property ignored because value is empty");
            continue;
        }
        props.insert(key.to_string(), unescape(table, value));
    }
    props
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_v2_simple_command() {
        let got = parse_workflow_command("::debug k1=v1,::msg").unwrap();
        assert_eq!(got.command, CommandName::Debug);
        assert_eq!(got.data, "msg");
        assert_eq!(got.props, props(&[("k1", "v1")]));
    }

    #[test]
    fn test_v2_empty_data() {
        let got = parse_workflow_command("::debug::").unwrap();
        assert_eq!(got.command, CommandName::Debug);
        assert_eq!(got.data, "");
        assert!(got.props.is_empty());
    }

    #[test]
    fn test_v2_escaped_properties_and_data() {
        let got =
            parse_workflow_command("::debug k1=;=%2C=%0D=%0A=]=%3A,::;-%0D-%0A-]-:-,").unwrap();
        assert_eq!(got.data, ";-\r-\n-]-:-,");
        assert_eq!(got.props, props(&[("k1", ";=,=\r=\n=]=:")]));
    }

    #[test]
    fn test_v2_double_escaped() {
        let got = parse_workflow_command(
            "::debug k1=;=%252C=%250D=%250A=]=%253A,::;-%250D-%250A-]-:-,",
        )
        .unwrap();
        assert_eq!(got.data, ";-%0D-%0A-]-:-,");
        assert_eq!(got.props, props(&[("k1", ";=%2C=%0D=%0A=]=%3A")]));
    }

    #[test]
    fn test_v2_ignores_empty_property_values() {
        let got = parse_workflow_command("::debug k1=,k2=,::").unwrap();
        assert!(got.props.is_empty());
    }

    #[test]
    fn test_v2_trimmed_prefix() {
        let got = parse_workflow_command("   ::debug k1=v1,::msg").unwrap();
        assert_eq!(got.command, CommandName::Debug);
        assert_eq!(got.data, "msg");
    }

    #[test]
    fn test_v2_non_command_prefix_is_plain_text() {
        assert!(parse_workflow_command("   >>>   ::debug k1=v1,::msg").is_none());
    }

    #[test]
    fn test_v2_unknown_command_is_plain_text() {
        assert!(parse_workflow_command("::frobnicate::data").is_none());
    }

    #[test]
    fn test_v1_simple_command() {
        let got = parse_workflow_command("##[debug k1=v1;]msg").unwrap();
        assert_eq!(got.command, CommandName::Debug);
        assert_eq!(got.data, "msg");
        assert_eq!(got.props, props(&[("k1", "v1")]));
    }

    #[test]
    fn test_v1_empty_data() {
        let got = parse_workflow_command("##[debug]").unwrap();
        assert_eq!(got.data, "");
        assert!(got.props.is_empty());
    }

    #[test]
    fn test_v1_escapes() {
        let got =
            parse_workflow_command("##[debug k1=%3B=%0D=%0A=%5D;]%3B-%0D-%0A-%5D").unwrap();
        assert_eq!(got.data, ";-\r-\n-]");
        assert_eq!(got.props, props(&[("k1", ";=\r=\n=]")]));
    }

    #[test]
    fn test_v1_double_escaped() {
        let got = parse_workflow_command("##[debug k1=%253B=%250D=%250A=%255D;]%253B-%250D-%250A-%255D")
            .unwrap();
        assert_eq!(got.data, "%3B-%0D-%0A-%5D");
        assert_eq!(got.props, props(&[("k1", "%3B=%0D=%0A=%5D")]));
    }

    #[test]
    fn test_v1_prefixed_command_is_recognized() {
        let got = parse_workflow_command(">>>   ##[debug k1=v1;]msg").unwrap();
        assert_eq!(got.command, CommandName::Debug);
        assert_eq!(got.data, "msg");
    }

    #[test]
    fn test_escape_tables_round_trip_with_percent_last() {
        fn escape(table: EscapeTable, data: &str) -> String {
            let mut out = data.to_string();
            for (token, replacement) in table.iter().rev() {
                out = out.replace(token, replacement);
            }
            out
        }

        for table in [DATA_ESCAPES, PROPERTY_ESCAPES, LEGACY_ESCAPES] {
            assert_eq!(table.last().map(|(t, _)| *t), Some("%"));
            for input in ["plain", "a%0Ab", "x\r\ny:,;]100%"] {
                assert_eq!(unescape(table, &escape(table, input)), input);
            }
        }
    }

    #[test]
    fn test_raw_line_preserved() {
        let got = parse_workflow_command("  ::group::build  ").unwrap();
        assert_eq!(got.raw, "  ::group::build  ");
        assert_eq!(got.data, "build");
    }
}
