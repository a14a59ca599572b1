//! Minimal CSV handling for the favorites file: one record per line,
//! comma separated, double-quote quoting with `""` as an escaped quote.

/// Splits text into lines, accepting both `\n` and `\r\n` endings.
pub fn lines(text: &str) -> impl Iterator<Item = &str> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

/// Parses a single line into fields. Returns `None` when a quoted field is never closed.
pub fn parse_line(line: &str) -> Option<Vec<String>> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(ch);
            }
        } else if ch == '"' {
            in_quotes = true;
        } else if ch == ',' {
            result.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }

    if in_quotes {
        return None;
    }
    result.push(current);
    Some(result)
}

/// Position of the header column named `name`, ignoring case and surrounding spaces.
pub fn column_index(header: &[String], name: &str) -> Option<usize> {
    header
        .iter()
        .position(|column| column.trim().eq_ignore_ascii_case(name))
}

/// Quotes a value if it contains a separator, quote or line break, or is padded with spaces.
pub fn escape(value: &str) -> String {
    let padded = value.trim() != value;
    if padded || value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Display titles are written lossy: commas dropped, line breaks flattened,
/// quotes doubled, and the result always quoted.
pub fn quote_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|ch| *ch != ',')
        .map(|ch| if ch == '\n' || ch == '\r' { ' ' } else { ch })
        .collect();
    format!("\"{}\"", cleaned.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_comma_is_not_a_separator() {
        let fields = parse_line(r#"a,"Hello, World",c"#).expect("parse");
        assert_eq!(fields, vec!["a", "Hello, World", "c"]);
    }

    #[test]
    fn doubled_quote_is_a_literal_quote() {
        let fields = parse_line(r#"id,"She said ""hi""""#).expect("parse");
        assert_eq!(fields, vec!["id", r#"She said "hi""#]);
    }

    #[test]
    fn empty_fields_are_kept() {
        let fields = parse_line(r#"a,,"""#).expect("parse");
        assert_eq!(fields, vec!["a", "", ""]);
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        assert!(parse_line(r#"a,"never closed"#).is_none());
    }

    #[test]
    fn lines_handle_crlf_and_trailing_blank_line() {
        let collected: Vec<&str> = lines("id,title\r\na,\"A\"\r\nb,\"B\"\n").collect();
        assert_eq!(collected, vec!["id,title", "a,\"A\"", "b,\"B\"", ""]);
    }

    #[test]
    fn lines_drop_byte_order_mark() {
        let first = lines("\u{feff}id,title\n").next();
        assert_eq!(first, Some("id,title"));
    }

    #[test]
    fn column_lookup_is_case_insensitive() {
        let header = parse_line("Title, ID ").expect("parse");
        assert_eq!(column_index(&header, "id"), Some(1));
        assert_eq!(column_index(&header, "episode"), None);
    }

    #[test]
    fn title_quoting_strips_commas_and_doubles_quotes() {
        assert_eq!(quote_title(r#"He said, "Hi""#), r#""He said ""Hi""""#);
        assert_eq!(quote_title(""), r#""""#);
    }

    #[test]
    fn escape_leaves_plain_values_alone() {
        assert_eq!(escape("one-piece"), "one-piece");
        assert_eq!(escape("a,b"), "\"a,b\"");
    }

    #[test]
    fn escape_quotes_padded_values() {
        assert_eq!(escape(" a "), "\" a \"");
        assert_eq!(escape("a\t"), "\"a\t\"");
        assert_eq!(parse_line(&escape(" a ")), Some(vec![" a ".to_string()]));
    }
}
