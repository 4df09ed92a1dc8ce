//! Lexical helpers shared by the Cypher renderers and validators.

/// Strip markdown code fences from LLM output.
///
/// Handles:
/// - ```cypher ... ```
/// - ```json ... ```
/// - ``` ... ```
pub fn strip_markdown(text: &str) -> String {
    let text = text.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string (`cypher`, `json`, ...) on the opening line.
        let body = match rest.find('\n') {
            Some(i) => &rest[i + 1..],
            None => rest,
        };
        let body = match body.rfind("```") {
            Some(end) => &body[..end],
            None => body,
        };
        return body.trim().to_string();
    }

    text.to_string()
}

/// Whether `name` can be used unquoted as a label, type, key or variable.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Backtick-quote an identifier, escaping embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote an identifier only when it is not a plain one.
pub fn identifier(name: &str) -> String {
    if is_plain_identifier(name) {
        name.to_string()
    } else {
        quote_identifier(name)
    }
}

/// Reference to a CSV column on the current row: ``row.`column` ``.
pub fn row_column(column: &str) -> String {
    format!("row.{}", quote_identifier(column))
}

/// Single-quoted Cypher string literal.
pub fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Blank out string literal contents and `//` comments.
///
/// Quotes are kept so the result has the same clause structure; only the
/// literal text disappears. Backtick identifiers are kept verbatim.
pub fn strip_literals(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push(c);
                while let Some(inner) = chars.next() {
                    if inner == '\\' {
                        chars.next();
                    } else if inner == c {
                        out.push(c);
                        break;
                    }
                }
            }
            '`' => {
                out.push(c);
                for inner in chars.by_ref() {
                    out.push(inner);
                    if inner == '`' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Split on `;`, trim, and drop empty segments.
///
/// Semicolons inside string literals or backtick identifiers do not split.
pub fn split_statements(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in text.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' && q != '`' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    current.push(c);
                }
                ';' => statements.push(std::mem::take(&mut current)),
                _ => current.push(c),
            },
        }
    }
    statements.push(current);

    statements
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Strip surrounding backticks from an identifier token.
pub fn unquote(name: &str) -> String {
    let trimmed = name.trim();
    match trimmed.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
        Some(inner) => inner.replace("``", "`"),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_markdown() {
        assert_eq!(strip_markdown("```cypher\nMATCH (n) RETURN n\n```"), "MATCH (n) RETURN n");
        assert_eq!(strip_markdown("```\nRETURN 1\n```"), "RETURN 1");
        assert_eq!(strip_markdown("  RETURN 1 "), "RETURN 1");
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(identifier("title"), "title");
        assert_eq!(identifier("movie title"), "`movie title`");
        assert_eq!(row_column("Release Year"), "row.`Release Year`");
        assert_eq!(quote_identifier("a`b"), "`a``b`");
        assert_eq!(unquote("`a``b`"), "a`b");
    }

    #[test]
    fn test_strip_literals() {
        let stripped = strip_literals("MATCH (m {title: 'CREATE; it'}) // MERGE\nRETURN m");
        assert_eq!(stripped, "MATCH (m {title: ''}) \nRETURN m");
    }

    #[test]
    fn test_split_statements() {
        let parts = split_statements("CREATE A; ;\n CREATE B ;RETURN ';';");
        assert_eq!(parts, vec!["CREATE A", "CREATE B", "RETURN ';'"]);
        assert!(split_statements(" ; ; ").is_empty());
    }
}
