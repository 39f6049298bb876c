//! Scan — extracts log-format directives from an httpd.conf-style file.
//!
//! Only `LogFormat`, `CustomLog`, `ErrorLogFormat` and `ErrorLog` are
//! recognized (case-insensitively); everything else, including malformed
//! directive lines, is dropped without error. Line continuations keep the
//! first line's number.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::conf::tokenize::{tokenize_line, ConfToken};
use crate::read::line_reader::LineReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Access,
    Error,
}

/// How the directive supplied its format string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatSource {
    /// `LogFormat "<fmt>" nickname`
    Named,
    /// `LogFormat "<fmt>"` or `ErrorLogFormat "<fmt>"`
    Default,
    /// `CustomLog "<path>" "<fmt>"`
    Inline,
    /// `CustomLog "<path>" nickname` — recognized but defines no format,
    /// so the parser discards it.
    Reference,
}

/// One recognized directive occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub log_type: LogKind,
    pub format_type: FormatSource,
    pub nickname: Option<String>,
    pub format_string: Option<String>,
    pub config_file: String,
    pub line_number: u64,
}

/// Parse one config file into its recognized entries.
pub fn parse_config_file(path: &Path) -> io::Result<Vec<ConfigEntry>> {
    let mut reader = LineReader::open(path)?;
    let config_file = path.display().to_string();

    let mut entries = Vec::new();
    let mut buf = Vec::new();
    let mut pending = String::new();
    let mut pending_start = 0u64;
    let mut line_number = 0u64;

    while reader.read_line(&mut buf)? {
        line_number += 1;
        let line = String::from_utf8_lossy(&buf);

        if pending.is_empty() {
            pending = line.into_owned();
            pending_start = line_number;
        } else {
            pending.push(' ');
            pending.push_str(&line);
        }

        // A trailing backslash (after trimming) continues on the next line.
        let trimmed_end = pending.trim_end();
        if let Some(stripped) = trimmed_end.strip_suffix('\\') {
            pending = stripped.to_string();
            continue;
        }

        let trimmed = pending.trim();
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            if let Some(entry) = parse_directive_line(trimmed, &config_file, pending_start) {
                entries.push(entry);
            }
        }
        pending.clear();
    }

    tracing::debug!(
        config_file = %config_file,
        entries = entries.len(),
        "parsed httpd conf"
    );
    Ok(entries)
}

fn parse_directive_line(line: &str, config_file: &str, line_number: u64) -> Option<ConfigEntry> {
    let name_end = line
        .find(|c: char| c == ' ' || c == '\t')
        .unwrap_or(line.len());
    let (name, rest) = line.split_at(name_end);
    let tokens = tokenize_line(rest);

    match name.to_ascii_lowercase().as_str() {
        "logformat" => parse_log_format(&tokens, config_file, line_number),
        "customlog" => parse_custom_log(&tokens, config_file, line_number),
        "errorlogformat" => {
            let format = tokens.first()?;
            Some(ConfigEntry {
                log_type: LogKind::Error,
                format_type: FormatSource::Default,
                nickname: None,
                format_string: Some(format.text.clone()),
                config_file: config_file.to_string(),
                line_number,
            })
        }
        // Recognized so the directive is consumed, but it carries no
        // format definition.
        "errorlog" => None,
        _ => None,
    }
}

fn parse_log_format(
    tokens: &[ConfToken],
    config_file: &str,
    line_number: u64,
) -> Option<ConfigEntry> {
    let format = tokens.first()?;

    // A second token that is not a key=value condition is a nickname.
    let nickname = tokens
        .get(1)
        .filter(|t| !t.text.contains('='))
        .map(|t| t.text.clone());
    let format_type = if nickname.is_some() {
        FormatSource::Named
    } else {
        FormatSource::Default
    };

    Some(ConfigEntry {
        log_type: LogKind::Access,
        format_type,
        nickname,
        format_string: Some(format.text.clone()),
        config_file: config_file.to_string(),
        line_number,
    })
}

fn parse_custom_log(
    tokens: &[ConfToken],
    config_file: &str,
    line_number: u64,
) -> Option<ConfigEntry> {
    if tokens.len() < 2 {
        return None;
    }
    let second = &tokens[1];

    // Quoted second argument: an inline format string. Unquoted: a
    // nickname reference, which defines nothing and is discarded.
    if !second.quoted {
        tracing::debug!(
            nickname = %second.text,
            line_number,
            "skipping CustomLog nickname reference"
        );
        return None;
    }

    Some(ConfigEntry {
        log_type: LogKind::Access,
        format_type: FormatSource::Inline,
        nickname: None,
        format_string: Some(second.text.clone()),
        config_file: config_file.to_string(),
        line_number,
    })
}

// ── Tests ───────────────────────────────────────────────────────
