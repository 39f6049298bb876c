//! Compile — turns an Apache LogFormat string into a `ParsedFormat`.
//!
//! Four passes over the format: tokenize into fields, reconcile `%r`
//! against individual request directives, group consecutive `%t` fields,
//! resolve column-name collisions, then emit and compile the line regex.
//! Losing fields are flagged `should_skip` rather than removed so the
//! field list and the regex capture groups stay positionally aligned.

use std::collections::HashMap;

use crate::error::ReadError;
use crate::format::directive;
use crate::format::field::{FormatField, ParsedFormat, TimestampGroup, TimestampKind};
use crate::format::strftime;
use regex::Regex;

/// One directive occurrence located in the format string.
struct DirectiveToken {
    directive: String,
    modifier: String,
    /// Byte offset just past the directive.
    end: usize,
}

/// Scan the directive starting at the `%` at `start`. Returns `None` for a
/// malformed occurrence (unclosed `{…}` or a trailing `%`), which both the
/// tokenizer and the regex emitter skip silently.
fn scan_directive(s: &str, start: usize) -> Option<DirectiveToken> {
    let bytes = s.as_bytes();
    let mut i = start + 1;

    // Optional status-code condition: `!`? digits and commas. Accepted and
    // ignored; it does not become part of the directive.
    if i < bytes.len() && bytes[i] == b'!' && i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit() {
        i += 1;
    }
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b',') {
        i += 1;
    }

    if i >= bytes.len() {
        return None;
    }

    if bytes[i] == b'{' {
        let close = s[i + 1..].find('}').map(|p| i + 1 + p)?;
        let modifier = s[i + 1..close].to_string();
        let j = close + 1;
        if j >= bytes.len() {
            return None;
        }
        if bytes[j] == b'^' && j + 3 <= bytes.len() && matches!(&s[j + 1..j + 3], "ti" | "to") {
            return Some(DirectiveToken {
                directive: format!("%^{}", &s[j + 1..j + 3]),
                modifier,
                end: j + 3,
            });
        }
        if (bytes[j] == b'<' || bytes[j] == b'>') && j + 1 < bytes.len() {
            let c = s[j + 1..].chars().next()?;
            return Some(DirectiveToken {
                directive: format!("%{}{}", bytes[j] as char, c),
                modifier,
                end: j + 1 + c.len_utf8(),
            });
        }
        let c = s[j..].chars().next()?;
        return Some(DirectiveToken {
            directive: format!("%{}", c),
            modifier,
            end: j + c.len_utf8(),
        });
    }

    if bytes[i] == b'^' && i + 3 <= bytes.len() && matches!(&s[i + 1..i + 3], "ti" | "to") {
        return Some(DirectiveToken {
            directive: format!("%^{}", &s[i + 1..i + 3]),
            modifier: String::new(),
            end: i + 3,
        });
    }

    if (bytes[i] == b'<' || bytes[i] == b'>') && i + 1 < bytes.len() {
        let c = s[i + 1..].chars().next()?;
        return Some(DirectiveToken {
            directive: format!("%{}{}", bytes[i] as char, c),
            modifier: String::new(),
            end: i + 1 + c.len_utf8(),
        });
    }

    let c = s[i..].chars().next()?;
    Some(DirectiveToken {
        directive: format!("%{}", c),
        modifier: String::new(),
        end: i + c.len_utf8(),
    })
}

fn classify_timestamp(modifier: &str) -> (TimestampKind, String, bool) {
    let (is_end, rest) = if let Some(r) = modifier.strip_prefix("end:") {
        (true, r)
    } else if let Some(r) = modifier.strip_prefix("begin:") {
        (false, r)
    } else {
        (false, modifier)
    };

    let kind = match rest {
        "" => TimestampKind::ApacheDefault,
        "sec" => TimestampKind::EpochSec,
        "msec" => TimestampKind::EpochMsec,
        "usec" => TimestampKind::EpochUsec,
        "msec_frac" => TimestampKind::FracMsec,
        "usec_frac" => TimestampKind::FracUsec,
        _ => TimestampKind::Strftime,
    };

    let strftime_format = if kind == TimestampKind::Strftime {
        rest.to_string()
    } else {
        String::new()
    };

    (kind, strftime_format, is_end)
}

fn tokenize(format_str: &str) -> Vec<FormatField> {
    let mut fields = Vec::new();
    let mut in_quotes = false;
    let mut pos = 0;

    while pos < format_str.len() {
        let c = format_str[pos..].chars().next().unwrap();
        match c {
            '"' => {
                in_quotes = !in_quotes;
                pos += 1;
            }
            '%' => match scan_directive(format_str, pos) {
                Some(tok) => {
                    fields.push(build_field(&tok, in_quotes));
                    pos = tok.end;
                }
                None => pos += 1,
            },
            _ => pos += c.len_utf8(),
        }
    }

    fields
}

fn build_field(tok: &DirectiveToken, in_quotes: bool) -> FormatField {
    let column_name = directive::resolve_column_name(&tok.directive, &tok.modifier);
    let column_type = directive::resolve_column_type(&tok.directive, &tok.modifier);

    let (timestamp_kind, strftime_format, is_end_timestamp) = if tok.directive == "%t" {
        classify_timestamp(&tok.modifier)
    } else {
        (TimestampKind::ApacheDefault, String::new(), false)
    };

    FormatField {
        directive: tok.directive.clone(),
        modifier: tok.modifier.clone(),
        is_quoted: in_quotes,
        column_name,
        column_type,
        should_skip: false,
        skip_method: false,
        skip_path: false,
        skip_query_string: false,
        skip_protocol: false,
        timestamp_kind,
        strftime_format,
        is_end_timestamp,
        timestamp_group: None,
    }
}

/// When an individual request directive appears alongside a `%r` variant,
/// the corresponding sub-column is dropped from the request decomposition.
fn reconcile_request_overrides(fields: &mut [FormatField]) {
    let has_method = fields.iter().any(|f| f.directive == "%m");
    let has_path = fields
        .iter()
        .any(|f| matches!(f.directive.as_str(), "%U" | "%>U" | "%<U"));
    let has_query = fields.iter().any(|f| f.directive == "%q");
    let has_protocol = fields.iter().any(|f| f.directive == "%H");

    for field in fields.iter_mut().filter(|f| f.is_request()) {
        field.skip_method = has_method;
        field.skip_path = has_path;
        field.skip_query_string = has_query;
        field.skip_protocol = has_protocol;
    }
}

/// Merge runs of consecutive `%t` fields with the same begin/end polarity
/// into groups. The first member of each group is the leader and emits the
/// timestamp column; the rest are flagged skipped but keep capturing.
fn group_timestamps(fields: &mut [FormatField]) -> Vec<TimestampGroup> {
    let mut groups: Vec<TimestampGroup> = Vec::new();
    let mut i = 0;

    while i < fields.len() {
        if !fields[i].is_timestamp() {
            i += 1;
            continue;
        }
        let polarity = fields[i].is_end_timestamp;
        let start = i;
        while i < fields.len() && fields[i].is_timestamp() && fields[i].is_end_timestamp == polarity
        {
            i += 1;
        }

        let gid = groups.len();
        let mut group = TimestampGroup {
            field_indices: (start..i).collect(),
            is_end: polarity,
            has_apache: false,
            has_epoch: false,
            has_frac: false,
            has_strftime: false,
        };
        for &idx in &group.field_indices {
            fields[idx].timestamp_group = Some(gid);
            match fields[idx].timestamp_kind {
                TimestampKind::ApacheDefault => group.has_apache = true,
                TimestampKind::EpochSec | TimestampKind::EpochMsec | TimestampKind::EpochUsec => {
                    group.has_epoch = true
                }
                TimestampKind::FracMsec | TimestampKind::FracUsec => group.has_frac = true,
                TimestampKind::Strftime => group.has_strftime = true,
            }
        }
        for &idx in &group.field_indices[1..] {
            fields[idx].should_skip = true;
        }
        groups.push(group);
    }

    // When both begin and end groups exist, the begin leader is renamed so
    // the end timestamp keeps the base column name.
    let has_begin = groups.iter().any(|g| !g.is_end);
    let has_end = groups.iter().any(|g| g.is_end);
    if has_begin && has_end {
        for group in groups.iter().filter(|g| !g.is_end) {
            fields[group.leader()].column_name = "timestamp_original".to_string();
        }
    }

    groups
}

/// Microsecond beats millisecond beats second; `%D` variants are always
/// microseconds, `%T` scales by its unit modifier.
fn duration_precision(field: &FormatField) -> u8 {
    if field.directive.ends_with('D') {
        return 2;
    }
    match field.modifier.as_str() {
        "us" => 2,
        "ms" => 1,
        _ => 0,
    }
}

fn collision_priority(field: &FormatField) -> u8 {
    directive::definition(&field.directive)
        .map(|d| d.collision_priority)
        .unwrap_or(u8::MAX)
}

fn collision_suffix(field: &FormatField) -> &'static str {
    directive::definition(&field.directive)
        .map(|d| d.collision_suffix)
        .unwrap_or("")
}

fn resolve_collisions(fields: &mut [FormatField]) {
    // Buckets over non-skipped fields by current name, in first-occurrence
    // order so resolution is deterministic.
    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, field) in fields.iter().enumerate() {
        if field.should_skip {
            continue;
        }
        let bucket = buckets.entry(field.column_name.clone()).or_default();
        if bucket.is_empty() {
            order.push(field.column_name.clone());
        }
        bucket.push(idx);
    }

    for name in order {
        let members = buckets.remove(&name).unwrap_or_default();
        if members.len() < 2 {
            continue;
        }

        if name == "duration" || name == "duration_original" {
            resolve_duration_family(fields, &members);
            continue;
        }

        apply_equivalences(fields, &members);
        let survivors: Vec<usize> = members
            .iter()
            .copied()
            .filter(|&i| !fields[i].should_skip)
            .collect();
        if survivors.len() < 2 {
            continue;
        }

        let first_directive = &fields[survivors[0]].directive;
        let all_same = survivors
            .iter()
            .all(|&i| fields[i].directive == *first_directive);
        if all_same {
            // Same directive repeated: handled by the numbering pass.
            continue;
        }

        // Distinct directives: the priority-0 member keeps the base name,
        // every other member appends its catalog suffix. Residual
        // duplicates are numbered afterwards.
        for &i in &survivors {
            if collision_priority(&fields[i]) != 0 {
                let suffix = collision_suffix(&fields[i]);
                fields[i].column_name.push_str(suffix);
            }
        }
    }

    number_residual_duplicates(fields);
}

/// Keep the highest-precision duration; `>` beats `<`-free forms at equal
/// precision through its priority-0 catalog entry. Losers are skipped.
fn resolve_duration_family(fields: &mut [FormatField], members: &[usize]) {
    let mut ranked: Vec<usize> = members.to_vec();
    ranked.sort_by(|&a, &b| {
        duration_precision(&fields[b])
            .cmp(&duration_precision(&fields[a]))
            .then(collision_priority(&fields[a]).cmp(&collision_priority(&fields[b])))
            .then(a.cmp(&b))
    });
    for &i in &ranked[1..] {
        fields[i].should_skip = true;
    }
}

/// Directive pairs that mean the same thing: `%b`/`%B`, `%P`/`%{pid}P`,
/// `%p`/`%{canonical}p`. The bare (or first) form wins; the equivalent is
/// skipped instead of renamed.
fn apply_equivalences(fields: &mut [FormatField], members: &[usize]) {
    let byte_members: Vec<usize> = members
        .iter()
        .copied()
        .filter(|&i| matches!(fields[i].directive.as_str(), "%b" | "%B"))
        .collect();
    for &i in byte_members.iter().skip(1) {
        fields[i].should_skip = true;
    }

    skip_equivalent_modifier(fields, members, "%P", "pid");
    skip_equivalent_modifier(fields, members, "%p", "canonical");
}

fn skip_equivalent_modifier(
    fields: &mut [FormatField],
    members: &[usize],
    directive: &str,
    modifier: &str,
) {
    let has_bare = members
        .iter()
        .any(|&i| fields[i].directive == directive && fields[i].modifier.is_empty());
    if !has_bare {
        return;
    }
    for &i in members {
        if fields[i].directive == directive && fields[i].modifier == modifier {
            fields[i].should_skip = true;
        }
    }
}

/// Any names still duplicated get `_2`, `_3`, … in positional order.
fn number_residual_duplicates(fields: &mut [FormatField]) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for field in fields.iter_mut().filter(|f| !f.should_skip) {
        let seen = counts.entry(field.column_name.clone()).or_insert(0);
        *seen += 1;
        if *seen > 1 {
            field.column_name = format!("{}_{}", field.column_name, seen);
        }
    }
}

fn push_literal(pattern: &mut String, c: char) {
    if matches!(
        c,
        '.' | '*' | '+' | '?' | '^' | '$' | '(' | ')' | '{' | '}' | '[' | ']' | '|' | '\\'
    ) {
        pattern.push('\\');
    }
    pattern.push(c);
}

fn emit_field(pattern: &mut String, field: &FormatField) {
    let open = if field.captures() { "(" } else { "(?:" };

    if field.is_quoted {
        pattern.push_str(open);
        pattern.push_str("[^\"]*");
        pattern.push(')');
        return;
    }

    if field.is_timestamp() {
        match field.timestamp_kind {
            // The bracket literals come from the directive itself, not the
            // format string. Timestamp fields always capture.
            TimestampKind::ApacheDefault => pattern.push_str(r"\[([^\]]+)\]"),
            TimestampKind::EpochSec | TimestampKind::EpochMsec | TimestampKind::EpochUsec => {
                pattern.push_str(open);
                pattern.push_str(r"\d+");
                pattern.push(')');
            }
            TimestampKind::FracMsec => {
                pattern.push_str(open);
                pattern.push_str(r"\d{3}");
                pattern.push(')');
            }
            TimestampKind::FracUsec => {
                pattern.push_str(open);
                pattern.push_str(r"\d{6}");
                pattern.push(')');
            }
            TimestampKind::Strftime => {
                pattern.push_str(open);
                pattern.push_str(&strftime::regex_fragment(&field.strftime_format));
                pattern.push(')');
            }
        }
        return;
    }

    pattern.push_str(open);
    pattern.push_str(r"\S+");
    pattern.push(')');
}

/// Walk the format string again in lockstep with the field list and emit
/// the anchored line pattern. Trailing content after the last directive's
/// match is tolerated (no `$`).
fn emit_pattern(format_str: &str, fields: &[FormatField]) -> String {
    let bytes = format_str.as_bytes();
    let mut pattern = String::from("^");
    let mut pos = 0;
    let mut field_idx = 0;

    while pos < format_str.len() {
        let c = format_str[pos..].chars().next().unwrap();
        match c {
            '"' => {
                pattern.push('"');
                pos += 1;
            }
            '%' => match scan_directive(format_str, pos) {
                Some(tok) => {
                    emit_field(&mut pattern, &fields[field_idx]);
                    field_idx += 1;
                    pos = tok.end;
                }
                None => pos += 1,
            },
            ' ' | '\t' => {
                pattern.push_str(r"\s+");
                while pos < bytes.len() && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
                    pos += 1;
                }
            }
            _ => {
                push_literal(&mut pattern, c);
                pos += c.len_utf8();
            }
        }
    }

    pattern
}

/// Compile a LogFormat string. The only fatal outcome is a pattern the
/// regex engine rejects; unknown directives become text columns and
/// malformed `%{…}` occurrences are skipped.
pub fn compile(format_str: &str) -> Result<ParsedFormat, ReadError> {
    let mut fields = tokenize(format_str);
    reconcile_request_overrides(&mut fields);
    let timestamp_groups = group_timestamps(&mut fields);
    resolve_collisions(&mut fields);

    let regex_pattern = emit_pattern(format_str, &fields);
    let regex = Regex::new(&regex_pattern).map_err(|e| ReadError::InvalidFormat {
        format: format_str.to_string(),
        reason: e.to_string(),
    })?;

    let parsed = ParsedFormat {
        format_str: format_str.to_string(),
        fields,
        timestamp_groups,
        regex_pattern,
        regex,
    };
    debug_assert_eq!(parsed.regex.captures_len() - 1, parsed.capture_count());
    Ok(parsed)
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::field::ColumnType;
    use crate::format::COMMON_FORMAT;

    fn names(parsed: &ParsedFormat) -> Vec<&str> {
        parsed
            .fields
            .iter()
            .filter(|f| !f.should_skip)
            .map(|f| f.column_name.as_str())
            .collect()
    }

    #[test]
    fn test_common_format_fields() {
        let parsed = compile(COMMON_FORMAT).unwrap();
        assert_eq!(
            names(&parsed),
            vec!["client_ip", "ident", "auth_user", "timestamp", "request", "status", "bytes"]
        );
        assert!(parsed.fields[4].is_quoted, "%r sits between quotes");
        assert_eq!(parsed.fields[5].column_type, ColumnType::Int32);
        assert_eq!(parsed.fields[6].column_type, ColumnType::Int64);
    }

    #[test]
    fn test_common_format_pattern() {
        let parsed = compile(COMMON_FORMAT).unwrap();
        assert_eq!(
            parsed.regex_pattern,
            r#"^(\S+)\s+(\S+)\s+(\S+)\s+\[([^\]]+)\]\s+"([^"]*)"\s+(\S+)\s+(\S+)"#
        );
    }

    #[test]
    fn test_header_modifiers() {
        let parsed = compile(r#"%h "%{Referer}i" "%{User-agent}i""#).unwrap();
        assert_eq!(names(&parsed), vec!["client_ip", "referer", "user_agent"]);
    }

    #[test]
    fn test_status_condition_prefix_is_ignored() {
        let parsed = compile("%400,501{User-agent}i %!200U").unwrap();
        assert_eq!(parsed.fields[0].directive, "%i");
        assert_eq!(parsed.fields[0].column_name, "user_agent");
        assert_eq!(parsed.fields[1].directive, "%U");
    }

    #[test]
    fn test_malformed_modifier_is_skipped() {
        let parsed = compile("%h %{Referer").unwrap();
        assert_eq!(parsed.fields.len(), 1);
        assert_eq!(parsed.fields[0].column_name, "client_ip");
    }

    #[test]
    fn test_unknown_directive_becomes_text_field() {
        let parsed = compile("%h %Z").unwrap();
        assert_eq!(names(&parsed), vec!["client_ip", "field_Z"]);
        assert_eq!(parsed.fields[1].column_type, ColumnType::Text);
    }

    #[test]
    fn test_status_collision_suffixes() {
        let parsed = compile("%s %>s").unwrap();
        assert_eq!(names(&parsed), vec!["status_original", "status"]);
        assert_eq!(parsed.fields[0].column_type, ColumnType::Int32);
        assert_eq!(parsed.fields[1].column_type, ColumnType::Int32);
    }

    #[test]
    fn test_duration_precedence_keeps_microseconds() {
        let parsed = compile("%h %D %T").unwrap();
        assert_eq!(names(&parsed), vec!["client_ip", "duration"]);
        assert_eq!(parsed.fields[1].directive, "%D");
        assert!(parsed.fields[2].should_skip);
        // The skipped %T compiles to a non-capturing group.
        assert_eq!(parsed.capture_count(), 2);
    }

    #[test]
    fn test_duration_final_beats_bare_at_equal_precision() {
        let parsed = compile("%>D %D").unwrap();
        assert!(!parsed.fields[0].should_skip);
        assert!(parsed.fields[1].should_skip);
    }

    #[test]
    fn test_bytes_equivalence_keeps_first() {
        let parsed = compile("%b %B").unwrap();
        assert_eq!(names(&parsed), vec!["bytes"]);
        assert_eq!(parsed.fields[0].directive, "%b");
        assert!(parsed.fields[1].should_skip);
    }

    #[test]
    fn test_pid_equivalence_bare_wins() {
        let parsed = compile("%P %{pid}P").unwrap();
        assert_eq!(names(&parsed), vec!["process_id"]);
        assert!(parsed.fields[1].should_skip);
    }

    #[test]
    fn test_repeated_header_is_numbered() {
        let parsed = compile("%{User-Agent}i %{User-Agent}i %{User-Agent}i").unwrap();
        assert_eq!(names(&parsed), vec!["user_agent", "user_agent_2", "user_agent_3"]);
    }

    #[test]
    fn test_server_name_collision() {
        let parsed = compile("%v %V").unwrap();
        assert_eq!(names(&parsed), vec!["server_name", "server_name_used"]);
    }

    #[test]
    fn test_request_overrides_set_skip_flags() {
        let parsed = compile(r#"%m "%r" %q"#).unwrap();
        let request = parsed.fields.iter().find(|f| f.is_request()).unwrap();
        assert!(request.skip_method);
        assert!(!request.skip_path);
        assert!(request.skip_query_string);
        assert!(!request.skip_protocol);
    }

    #[test]
    fn test_timestamp_group_members_all_capture() {
        let parsed = compile("[%{%d/%b/%Y}t %{%H:%M:%S}t %{%z}t]").unwrap();
        assert_eq!(parsed.timestamp_groups.len(), 1);
        assert_eq!(parsed.timestamp_groups[0].len(), 3);
        assert_eq!(names(&parsed), vec!["timestamp"]);
        // One capture per member even though two are skipped.
        assert_eq!(parsed.capture_count(), 3);
        assert_eq!(parsed.regex.captures_len() - 1, 3);
    }

    #[test]
    fn test_begin_and_end_groups_rename_begin_leader() {
        let parsed = compile("%{begin:sec}t %h %{end:sec}t").unwrap();
        assert_eq!(
            names(&parsed),
            vec!["timestamp_original", "client_ip", "timestamp"]
        );
    }

    #[test]
    fn test_polarity_change_splits_groups() {
        let parsed = compile("%{begin:sec}t %{end:sec}t").unwrap();
        assert_eq!(parsed.timestamp_groups.len(), 2);
    }

    #[test]
    fn test_epoch_and_frac_classification() {
        let parsed = compile("%{sec}t %{msec_frac}t").unwrap();
        assert_eq!(parsed.fields[0].timestamp_kind, TimestampKind::EpochSec);
        assert_eq!(parsed.fields[1].timestamp_kind, TimestampKind::FracMsec);
        let group = &parsed.timestamp_groups[0];
        assert!(group.has_epoch);
        assert!(group.has_frac);
    }

    #[test]
    fn test_trailer_directives() {
        let parsed = compile("%{Expires}^ti %{Trailer}^to").unwrap();
        assert_eq!(names(&parsed), vec!["expires", "trailer"]);
    }

    #[test]
    fn test_literal_metacharacters_are_escaped() {
        let parsed = compile("(%h)").unwrap();
        assert_eq!(parsed.regex_pattern, r"^\((\S+)\)");
        assert!(parsed.regex.is_match("(10.0.0.1)"));
    }

    #[test]
    fn test_capture_alignment_invariant() {
        for fmt in [
            COMMON_FORMAT,
            "%h %D %T",
            "%s %>s",
            "[%{%d/%b/%Y}t %{%H:%M:%S}t %{%z}t]",
            "%{begin:sec}t %{begin:msec_frac}t %h",
        ] {
            let parsed = compile(fmt).unwrap();
            assert_eq!(
                parsed.regex.captures_len() - 1,
                parsed.capture_count(),
                "capture alignment broken for {fmt}"
            );
        }
    }
}
