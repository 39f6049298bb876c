//! Directive — static catalogs for the Apache LogFormat grammar.
//!
//! Two process-lifetime tables: the directive catalog (default column name,
//! type, collision metadata) and the typed-header catalog that upgrades
//! specific `%{H}i`/`%{H}o` columns from text to integers. Lookup maps are
//! built lazily on first use and shared read-only across threads.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::field::ColumnType;

/// Static catalog row for one directive.
///
/// `collision_priority` is unique within each collision equivalence class:
/// the priority-0 member keeps the base column name, every other member
/// appends its `collision_suffix`.
#[derive(Debug, Clone, Copy)]
pub struct DirectiveDef {
    pub directive: &'static str,
    /// Empty for dynamic-name directives (`%i`, `%o`, `%C`, `%e`, `%n`,
    /// `%^ti`, `%^to`), whose column name is derived from the modifier.
    pub column_name: &'static str,
    pub column_type: ColumnType,
    pub collision_suffix: &'static str,
    pub collision_priority: u8,
}

/// Upgrades a header column from text to a numeric type.
#[derive(Debug, Clone, Copy)]
pub struct TypedHeaderRule {
    /// Lowercased header name as it appears in the modifier.
    pub header: &'static str,
    pub column_type: ColumnType,
    pub applies_to_request: bool,
    pub applies_to_response: bool,
}

const DIRECTIVES: &[DirectiveDef] = &[
    def("%a", "client_ip", ColumnType::Text, "_addr", 1),
    def("%A", "local_ip", ColumnType::Text, "", 0),
    def("%B", "bytes", ColumnType::Int64, "", 0),
    def("%b", "bytes", ColumnType::Int64, "_clf", 1),
    def("%C", "", ColumnType::Text, "_cookie", 2),
    def("%D", "duration", ColumnType::Interval, "", 1),
    def("%>D", "duration", ColumnType::Interval, "", 0),
    def("%<D", "duration_original", ColumnType::Interval, "", 0),
    def("%e", "", ColumnType::Text, "_env", 3),
    def("%f", "file_path", ColumnType::Text, "", 0),
    def("%h", "client_ip", ColumnType::Text, "", 0),
    def("%H", "protocol", ColumnType::Text, "", 0),
    def("%i", "", ColumnType::Text, "_in", 0),
    def("%I", "bytes_received", ColumnType::Int64, "", 0),
    def("%k", "keepalive_requests", ColumnType::Int32, "", 0),
    def("%L", "log_id", ColumnType::Text, "", 0),
    def("%l", "ident", ColumnType::Text, "", 0),
    def("%m", "method", ColumnType::Text, "", 0),
    def("%n", "", ColumnType::Text, "_note", 4),
    def("%O", "bytes_sent", ColumnType::Int64, "", 0),
    def("%o", "", ColumnType::Text, "_out", 1),
    def("%P", "process_id", ColumnType::Int32, "", 0),
    def("%p", "server_port", ColumnType::Int32, "", 0),
    def("%q", "query_string", ColumnType::Text, "", 0),
    def("%R", "handler", ColumnType::Text, "", 0),
    def("%r", "request", ColumnType::Text, "", 0),
    def("%>r", "request", ColumnType::Text, "_final", 1),
    def("%<r", "request_original", ColumnType::Text, "", 0),
    def("%S", "bytes_transferred", ColumnType::Int64, "", 0),
    def("%s", "status", ColumnType::Int32, "_original", 1),
    def("%>s", "status", ColumnType::Int32, "", 0),
    def("%<s", "status_original", ColumnType::Int32, "", 0),
    def("%T", "duration", ColumnType::Interval, "", 3),
    def("%>T", "duration", ColumnType::Interval, "", 2),
    def("%<T", "duration_original", ColumnType::Interval, "", 1),
    def("%t", "timestamp", ColumnType::Timestamp, "", 0),
    def("%u", "auth_user", ColumnType::Text, "", 0),
    def("%U", "path", ColumnType::Text, "", 0),
    def("%>U", "path", ColumnType::Text, "_final", 1),
    def("%<U", "path_original", ColumnType::Text, "", 0),
    def("%v", "server_name", ColumnType::Text, "", 0),
    def("%V", "server_name", ColumnType::Text, "_used", 1),
    def("%X", "connection_status", ColumnType::Text, "", 0),
    def("%^ti", "", ColumnType::Text, "_trailer_in", 5),
    def("%^to", "", ColumnType::Text, "_trailer_out", 6),
];

const TYPED_HEADERS: &[TypedHeaderRule] = &[
    TypedHeaderRule {
        header: "content-length",
        column_type: ColumnType::Int64,
        applies_to_request: true,
        applies_to_response: true,
    },
    TypedHeaderRule {
        header: "age",
        column_type: ColumnType::Int32,
        applies_to_request: false,
        applies_to_response: true,
    },
];

const fn def(
    directive: &'static str,
    column_name: &'static str,
    column_type: ColumnType,
    collision_suffix: &'static str,
    collision_priority: u8,
) -> DirectiveDef {
    DirectiveDef {
        directive,
        column_name,
        column_type,
        collision_suffix,
        collision_priority,
    }
}

static DIRECTIVE_MAP: Lazy<HashMap<&'static str, &'static DirectiveDef>> =
    Lazy::new(|| DIRECTIVES.iter().map(|d| (d.directive, d)).collect());

static TYPED_HEADER_MAP: Lazy<HashMap<&'static str, &'static TypedHeaderRule>> =
    Lazy::new(|| TYPED_HEADERS.iter().map(|r| (r.header, r)).collect());

pub fn definition(directive: &str) -> Option<&'static DirectiveDef> {
    DIRECTIVE_MAP.get(directive).copied()
}

pub fn typed_header(header_lower: &str) -> Option<&'static TypedHeaderRule> {
    TYPED_HEADER_MAP.get(header_lower).copied()
}

/// Directives whose column name is derived from the modifier.
pub fn is_dynamic_name(directive: &str) -> bool {
    matches!(directive, "%i" | "%o" | "%C" | "%e" | "%n" | "%^ti" | "%^to")
}

/// Lowercase a header/modifier name and replace hyphens with underscores.
pub fn normalize_name(modifier: &str) -> String {
    modifier
        .chars()
        .map(|c| if c == '-' { '_' } else { c.to_ascii_lowercase() })
        .collect()
}

/// Resolve the default column name for a directive occurrence.
pub fn resolve_column_name(directive: &str, modifier: &str) -> String {
    if is_dynamic_name(directive) && !modifier.is_empty() {
        return normalize_name(modifier);
    }

    // Modifier duos that pick a different column than the bare directive.
    match directive {
        "%a" if modifier == "c" => return "peer_ip".to_string(),
        "%h" if modifier == "c" => return "peer_host".to_string(),
        "%P" => match modifier {
            "" | "pid" => return "process_id".to_string(),
            "tid" => return "thread_id".to_string(),
            "hextid" => return "thread_id_hex".to_string(),
            _ => {}
        },
        "%p" => match modifier {
            "" | "canonical" => return "server_port".to_string(),
            "local" => return "local_port".to_string(),
            "remote" => return "remote_port".to_string(),
            _ => {}
        },
        _ => {}
    }

    match definition(directive) {
        Some(d) if !d.column_name.is_empty() => d.column_name.to_string(),
        _ => format!("field_{}", directive.trim_start_matches('%')),
    }
}

/// Resolve the column type for a directive occurrence. Typed-header rules
/// take precedence for `%i`/`%o`; `%P` switches on the pid/tid kind.
pub fn resolve_column_type(directive: &str, modifier: &str) -> ColumnType {
    match directive {
        "%i" | "%o" => {
            let header = modifier.to_ascii_lowercase();
            if let Some(rule) = typed_header(&header) {
                let applies = if directive == "%i" {
                    rule.applies_to_request
                } else {
                    rule.applies_to_response
                };
                if applies {
                    return rule.column_type;
                }
            }
            ColumnType::Text
        }
        "%P" => match modifier {
            "" | "pid" => ColumnType::Int32,
            "tid" => ColumnType::Int64,
            "hextid" => ColumnType::Text,
            _ => ColumnType::Int32,
        },
        _ => definition(directive)
            .map(|d| d.column_type)
            .unwrap_or(ColumnType::Text),
    }
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_priorities_unique_per_base_name() {
        use std::collections::HashMap;
        let mut classes: HashMap<&str, Vec<u8>> = HashMap::new();
        for d in DIRECTIVES {
            if !d.column_name.is_empty() {
                classes.entry(d.column_name).or_default().push(d.collision_priority);
            }
        }
        for (name, mut prios) in classes {
            let len = prios.len();
            prios.sort_unstable();
            prios.dedup();
            assert_eq!(len, prios.len(), "duplicate collision priority for {}", name);
        }
    }

    #[test]
    fn test_standard_directive_names() {
        assert_eq!(resolve_column_name("%h", ""), "client_ip");
        assert_eq!(resolve_column_name("%>s", ""), "status");
        assert_eq!(resolve_column_name("%b", ""), "bytes");
        assert_eq!(resolve_column_name("%t", ""), "timestamp");
    }

    #[test]
    fn test_header_names_derived_from_modifier() {
        assert_eq!(resolve_column_name("%i", "User-Agent"), "user_agent");
        assert_eq!(resolve_column_name("%o", "Content-Length"), "content_length");
        assert_eq!(resolve_column_name("%C", "SESSIONID"), "sessionid");
    }

    #[test]
    fn test_unknown_directive_falls_back() {
        assert_eq!(resolve_column_name("%Z", ""), "field_Z");
        assert_eq!(resolve_column_type("%Z", ""), ColumnType::Text);
    }

    #[test]
    fn test_peer_duo_names() {
        assert_eq!(resolve_column_name("%a", "c"), "peer_ip");
        assert_eq!(resolve_column_name("%h", "c"), "peer_host");
    }

    #[test]
    fn test_pid_tid_variants() {
        assert_eq!(resolve_column_name("%P", ""), "process_id");
        assert_eq!(resolve_column_name("%P", "tid"), "thread_id");
        assert_eq!(resolve_column_name("%P", "hextid"), "thread_id_hex");
        assert_eq!(resolve_column_type("%P", ""), ColumnType::Int32);
        assert_eq!(resolve_column_type("%P", "tid"), ColumnType::Int64);
        assert_eq!(resolve_column_type("%P", "hextid"), ColumnType::Text);
    }

    #[test]
    fn test_port_variants() {
        assert_eq!(resolve_column_name("%p", ""), "server_port");
        assert_eq!(resolve_column_name("%p", "canonical"), "server_port");
        assert_eq!(resolve_column_name("%p", "local"), "local_port");
        assert_eq!(resolve_column_name("%p", "remote"), "remote_port");
    }

    #[test]
    fn test_typed_headers() {
        assert_eq!(resolve_column_type("%i", "Content-Length"), ColumnType::Int64);
        assert_eq!(resolve_column_type("%o", "content-length"), ColumnType::Int64);
        // age is response-only
        assert_eq!(resolve_column_type("%o", "Age"), ColumnType::Int32);
        assert_eq!(resolve_column_type("%i", "Age"), ColumnType::Text);
    }
}
