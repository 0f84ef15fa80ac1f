//! The command-file grammar shared by the env, output and state files,
//! plus the simpler path and step-summary files.
//!
//! Key/value files accept `NAME=VALUE` lines and heredocs:
//!
//! ```text
//! NAME<<DELIM
//! multi
//! line
//! DELIM
//! ```

use std::collections::HashMap;
use std::path::Path;

use super::{CommandFile, CommandFileError};

/// Upper bound on a step summary read.
pub const STEP_SUMMARY_MAX_BYTES: u64 = 1024 * 1024;

/// Parse a key/value command file from disk. Missing and empty files parse
/// to an empty map.
pub fn parse_key_value_file(
    path: &Path,
    kind: CommandFile,
) -> Result<HashMap<String, String>, CommandFileError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(e.into()),
    };
    if content.is_empty() {
        return Ok(HashMap::new());
    }
    parse_key_value_content(&content, kind)
}

/// Parse key/value content per the grammar above. Blocked names for the
/// file kind are rejected.
pub fn parse_key_value_content(
    content: &str,
    kind: CommandFile,
) -> Result<HashMap<String, String>, CommandFileError> {
    let mut reader = LineReader::new(content);
    let mut pairs = HashMap::new();
    let blocked = kind.blocked_names();

    while let Some((line, _)) = reader.read_line() {
        if line.is_empty() {
            continue;
        }

        let equals_idx = line.find('=');
        let heredoc_idx = line.find("<<");

        match (equals_idx, heredoc_idx) {
            (Some(eq), heredoc) if heredoc.map_or(true, |hd| eq < hd) => {
                let (key, value) = (&line[..eq], &line[eq + 1..]);
                if key.is_empty() {
                    return Err(CommandFileError::EmptyName(line.to_string()));
                }
                check_blocked(key, blocked, kind)?;
                pairs.insert(key.to_string(), value.to_string());
            }
            (equals, Some(hd)) if equals.map_or(true, |eq| hd < eq) => {
                let (key, delimiter) = (&line[..hd], &line[hd + 2..]);
                if key.is_empty() || delimiter.is_empty() {
                    return Err(CommandFileError::EmptyHeredocParts(line.to_string()));
                }
                let value = reader.read_heredoc(delimiter)?;
                check_blocked(key, blocked, kind)?;
                pairs.insert(key.to_string(), value);
            }
            _ => return Err(CommandFileError::MalformedLine(line.to_string())),
        }
    }

    Ok(pairs)
}

fn check_blocked(
    key: &str,
    blocked: &[&str],
    kind: CommandFile,
) -> Result<(), CommandFileError> {
    if blocked.contains(&key) {
        return Err(CommandFileError::BlockedName {
            name: key.to_string(),
            env_var: kind.env_var_name(),
        });
    }
    Ok(())
}

/// Encode one key/value pair for appending to a command file. Values with
/// embedded newlines are written as a heredoc with a random delimiter.
pub fn encode_key_value(key: &str, value: &str) -> String {
    if value.contains('\n') || value.contains('\r') {
        let delimiter = format!("ghadelimiter_{}", uuid::Uuid::new_v4());
        format!("{key}<<{delimiter}\n{value}\n{delimiter}")
    } else {
        format!("{key}={value}")
    }
}

/// Parse a path command file: newline-separated entries, order preserved,
/// empty lines skipped. Missing files parse to an empty list.
pub fn parse_path_file(path: &Path) -> Result<Vec<String>, CommandFileError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    Ok(content
        .lines()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Read a step summary file verbatim. Missing and empty files read as an
/// empty string; oversized files are an error.
pub fn read_step_summary(path: &Path) -> Result<String, CommandFileError> {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
        Err(e) => return Err(e.into()),
    };
    if meta.len() == 0 {
        return Ok(String::new());
    }
    if meta.len() > STEP_SUMMARY_MAX_BYTES {
        return Err(CommandFileError::SummaryTooLarge);
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Line-oriented cursor over command-file content, tracking whether each
/// line ended with `\n` or `\r\n`.
struct LineReader<'a> {
    input: &'a str,
    index: usize,
}

impl<'a> LineReader<'a> {
    fn new(input: &'a str) -> Self {
        LineReader { input, index: 0 }
    }

    /// Next line and its terminator (empty at EOF without one).
    fn read_line(&mut self) -> Option<(&'a str, &'static str)> {
        if self.index >= self.input.len() {
            return None;
        }
        let rest = &self.input[self.index..];
        match rest.find('\n') {
            Some(nl) => {
                let line = &rest[..nl];
                self.index += nl + 1;
                match line.strip_suffix('\r') {
                    Some(stripped) => Some((stripped, "\r\n")),
                    None => Some((line, "\n")),
                }
            }
            None => {
                self.index = self.input.len();
                Some((rest, ""))
            }
        }
    }

    /// Accumulate lines until the delimiter appears as a full line. The
    /// newline before the delimiter is not part of the value.
    fn read_heredoc(&mut self, delimiter: &str) -> Result<String, CommandFileError> {
        let mut value = String::new();
        let mut last_newline = "";
        let mut saw_content = false;

        loop {
            let Some((line, newline)) = self.read_line() else {
                return Err(CommandFileError::UnterminatedHeredoc(delimiter.to_string()));
            };
            if line == delimiter {
                if saw_content && !last_newline.is_empty() {
                    if let Some(stripped) = value.strip_suffix(last_newline) {
                        return Ok(stripped.to_string());
                    }
                }
                return Ok(value);
            }
            if newline.is_empty() {
                return Err(CommandFileError::UnterminatedHeredoc(delimiter.to_string()));
            }

            saw_content = true;
            value.push_str(line);
            value.push_str(newline);
            last_newline = newline;
        }
    }
}
