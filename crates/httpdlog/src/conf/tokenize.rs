//! Tokenize — Apache-style config line tokenization.
//!
//! Whitespace separates tokens outside quotes; `"` delimits quoted
//! strings; `\` escapes the next character anywhere. Tokens remember
//! whether any part of them was quoted, which is how `CustomLog` inline
//! formats are told apart from nickname references.

/// One token with its quoting provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfToken {
    pub text: String,
    pub quoted: bool,
}

pub fn tokenize_line(line: &str) -> Vec<ConfToken> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_quoted = false;
    let mut in_quotes = false;
    let mut escape_next = false;

    for c in line.chars() {
        if escape_next {
            current.push(c);
            escape_next = false;
            continue;
        }
        if c == '\\' {
            escape_next = true;
            continue;
        }
        if c == '"' {
            if in_quotes {
                // Closing quote ends the token, even an empty one.
                tokens.push(ConfToken {
                    text: std::mem::take(&mut current),
                    quoted: true,
                });
                current_quoted = false;
                in_quotes = false;
            } else {
                in_quotes = true;
                current_quoted = true;
            }
            continue;
        }
        if !in_quotes && (c == ' ' || c == '\t') {
            if !current.is_empty() {
                tokens.push(ConfToken {
                    text: std::mem::take(&mut current),
                    quoted: current_quoted,
                });
            }
            current_quoted = false;
            continue;
        }
        current.push(c);
    }

    if !current.is_empty() {
        tokens.push(ConfToken {
            text: current,
            quoted: current_quoted,
        });
    }

    tokens
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(line: &str) -> Vec<String> {
        tokenize_line(line).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_plain_tokens() {
        assert_eq!(texts("a b\tc"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_quoted_token_keeps_spaces() {
        let tokens = tokenize_line(r#""%h %l %u" combined"#);
        assert_eq!(tokens[0].text, "%h %l %u");
        assert!(tokens[0].quoted);
        assert_eq!(tokens[1].text, "combined");
        assert!(!tokens[1].quoted);
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let tokens = tokenize_line(r#""%h \"%r\" %>s""#);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, r#"%h "%r" %>s"#);
    }

    #[test]
    fn test_empty_quoted_token_is_kept() {
        let tokens = tokenize_line(r#""" after"#);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "");
        assert!(tokens[0].quoted);
    }

    #[test]
    fn test_escape_outside_quotes() {
        assert_eq!(texts(r"a\ b c"), vec!["a b", "c"]);
    }

    #[test]
    fn test_empty_line() {
        assert!(tokenize_line("").is_empty());
        assert!(tokenize_line("   \t ").is_empty());
    }
}
