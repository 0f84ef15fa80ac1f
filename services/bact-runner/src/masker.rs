//! Masking of secret values in user-visible output.
//!
//! The registry is append-only. Every registered secret is expanded through
//! a fixed list of encoders so that the secret is still caught when a step
//! prints it base64'd, JSON-escaped, URL-escaped, and so on. The sensitive
//! list is kept sorted longest-first so a short secret never clobbers part
//! of a longer one.

use std::sync::RwLock;

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use regex::Regex;

const MASK: &str = "***";

/// Minimum fragment length worth masking in the PowerShell split encoders.
const MIN_AMPERSAND_SECTION: usize = 6;

#[derive(Debug, Default)]
struct Inner {
    sensitive_strings: Vec<String>,
    sensitive_regexes: Vec<Regex>,
}

/// Thread-safe, append-only registry of sensitive values.
#[derive(Debug, Default)]
pub struct SecretsMasker {
    inner: RwLock<Inner>,
}

impl SecretsMasker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret literal. The value is expanded through the encoder
    /// table; empty values and empty encodings are skipped.
    pub fn add_string(&self, value: &str) {
        self.add_strings([value]);
    }

    /// Register several secret literals at once.
    pub fn add_strings<'a, I>(&self, values: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut expanded = Vec::new();
        for value in values {
            if value.is_empty() {
                continue;
            }
            for encoder in ENCODERS {
                let encoded = encoder(value);
                if !encoded.is_empty() {
                    expanded.push(encoded);
                }
            }
        }
        if expanded.is_empty() {
            return;
        }

        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.sensitive_strings.extend(expanded);
        // longest first, so nested secrets mask outside-in
        inner.sensitive_strings.sort_by(|a, b| {
            b.len().cmp(&a.len()).then_with(|| a.cmp(b))
        });
        inner.sensitive_strings.dedup();
    }

    /// Register a sensitive regex. Its source text is also registered as a
    /// literal.
    pub fn add_regex(&self, regex: Regex) {
        let source = regex.as_str().to_string();
        {
            let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
            inner.sensitive_regexes.push(regex);
        }
        self.add_string(&source);
    }

    /// Replace every occurrence of a registered secret (in any encoding)
    /// with `***`.
    pub fn mask(&self, s: &str) -> String {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut out = s.to_string();
        for sensitive in &inner.sensitive_strings {
            out = out.replace(sensitive.as_str(), MASK);
        }
        for regex in &inner.sensitive_regexes {
            out = regex
                .replace_all(&out, regex::NoExpand(MASK))
                .into_owned();
        }
        out
    }
}

type Encoder = fn(&str) -> String;

/// The fixed encoder table. Order matters and is part of the contract.
const ENCODERS: &[Encoder] = &[
    // identity
    |v| v.to_string(),
    // base64 without padding, byte shifts 0..2, standard and URL-safe. If a
    // secret is embedded in a larger base64 blob at an unknown offset, one
    // of the three alignments appears verbatim in the output.
    |v| base64_shifted(v, 0, false),
    |v| base64_shifted(v, 0, true),
    |v| base64_shifted(v, 1, false),
    |v| base64_shifted(v, 1, true),
    |v| base64_shifted(v, 2, false),
    |v| base64_shifted(v, 2, true),
    // command-line argument escape
    |v| v.replace('"', "\\\""),
    // expression string escape
    |v| v.replace('\'', "''"),
    // JSON string escape, with and without HTML escaping
    |v| json_escape(v, false),
    |v| json_escape(v, true),
    // URL escape, query form and path form
    |v| urlencoding::encode(v).replace("%20", "+"),
    |v| urlencoding::encode(v).into_owned(),
    // XML text escape
    xml_escape,
    // trim surrounding quotes
    |v| v.trim_matches(|c| c == '"' || c == '\'').to_string(),
    powershell_pre_ampersand,
    powershell_post_ampersand,
];

fn base64_shifted(value: &str, shift: usize, url_safe: bool) -> String {
    let bytes = value.as_bytes();
    if shift >= bytes.len() {
        return String::new();
    }
    if url_safe {
        URL_SAFE_NO_PAD.encode(&bytes[shift..])
    } else {
        STANDARD_NO_PAD.encode(&bytes[shift..])
    }
}

/// JSON-encode a string and strip the surrounding quotes. The HTML variant
/// additionally escapes `<`, `>` and `&` the way HTML-safe JSON encoders do.
fn json_escape(value: &str, html_escape: bool) -> String {
    let encoded = serde_json::to_string(value).unwrap_or_default();
    let trimmed = encoded.trim_matches('"').to_string();
    if !html_escape {
        return trimmed;
    }
    trimmed
        .replace('&', "\\u0026")
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&#34;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
    out
}

/// First fragment of a secret as PowerShell splits it on ampersands. An
/// erroring PowerShell command can print the fragments separately, so each
/// is registered on its own.
fn powershell_pre_ampersand(value: &str) -> String {
    if !value.contains('&') {
        return String::new();
    }

    let section = if let Some(idx) = value.find("&+") {
        &value[..idx + 2]
    } else if let Some(idx) = value.rfind('&') {
        &value[..idx + 1]
    } else {
        return String::new();
    };

    if section.len() < MIN_AMPERSAND_SECTION {
        return String::new();
    }
    section.to_string()
}

/// Trailing fragment of an ampersand-split secret.
fn powershell_post_ampersand(value: &str) -> String {
    if !value.contains('&') {
        return String::new();
    }

    let section = if let Some(idx) = value.find("&+") {
        // skip "&+" plus the one character PowerShell colors
        value
            .get(idx + 2..)
            .and_then(|rest| rest.char_indices().nth(1))
            .map(|(offset, _)| &value[idx + 2 + offset..])
            .unwrap_or("")
    } else if let Some(idx) = value.rfind('&') {
        &value[idx + 1..]
    } else {
        ""
    };

    if section.len() < MIN_AMPERSAND_SECTION {
        return String::new();
    }
    section.to_string()
}
