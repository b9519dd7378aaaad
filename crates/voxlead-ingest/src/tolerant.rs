//! Tolerant converter for unquoted dict-like analytics text.
//!
//! The analytics string is produced by an upstream language model and is
//! frequently not valid JSON: bare identifier keys, unquoted string values
//! containing commas, Python literals `None`/`True`/`False`, embedded ISO
//! timestamps. This module rewrites such text into strict JSON so the
//! normal parser can take over.
//!
//! The comma-disambiguation rule is the load-bearing part: while scanning
//! a value span, a comma only terminates the value when it is followed
//! (after whitespace) by a key-then-colon pattern. Otherwise it is part of
//! a sentence-like string value and is kept. A value also ends at the `}`
//! closing its enclosing object, tracked by brace depth.

/// Rewrites dict-like text into strict JSON.
///
/// Returns `None` when the input cannot be interpreted as an object or
/// array at all (unbalanced braces, missing colons); callers fall through
/// to the raw tier in that case. The output, when present, is guaranteed
/// to be syntactically valid JSON for any input this function accepts.
pub fn repair_to_json(input: &str) -> Option<String> {
    let chars: Vec<char> = input.trim().chars().collect();
    if chars.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(chars.len() + 16);
    let mut pos = 0;

    match chars[0] {
        '{' => convert_object(&chars, &mut pos, &mut out)?,
        '[' => convert_array(&chars, &mut pos, &mut out)?,
        _ => return None,
    }

    skip_whitespace(&chars, &mut pos);
    if pos != chars.len() {
        return None;
    }

    Some(out)
}

/// Converts one `{...}` span, advancing `pos` past its closing brace.
fn convert_object(chars: &[char], pos: &mut usize, out: &mut String) -> Option<()> {
    debug_assert_eq!(chars.get(*pos), Some(&'{'));
    out.push('{');
    *pos += 1;

    skip_whitespace(chars, pos);
    if chars.get(*pos) == Some(&'}') {
        out.push('}');
        *pos += 1;
        return Some(());
    }

    loop {
        skip_whitespace(chars, pos);

        let key = match chars.get(*pos) {
            Some(&q @ ('"' | '\'')) => read_quoted(chars, pos, q)?,
            Some(_) => read_bare_key(chars, pos)?,
            None => return None,
        };
        push_json_string(out, &key);

        skip_whitespace(chars, pos);
        if chars.get(*pos) != Some(&':') {
            return None;
        }
        out.push(':');
        *pos += 1;

        skip_whitespace(chars, pos);
        convert_value(chars, pos, out)?;

        skip_whitespace(chars, pos);
        match chars.get(*pos) {
            Some(',') => {
                out.push(',');
                *pos += 1;
            },
            Some('}') => {
                out.push('}');
                *pos += 1;
                return Some(());
            },
            _ => return None,
        }
    }
}

/// Converts one `[...]` span, advancing `pos` past its closing bracket.
///
/// Arrays have no key-colon pattern to disambiguate with, so any top-level
/// comma ends an element.
fn convert_array(chars: &[char], pos: &mut usize, out: &mut String) -> Option<()> {
    debug_assert_eq!(chars.get(*pos), Some(&'['));
    out.push('[');
    *pos += 1;

    skip_whitespace(chars, pos);
    if chars.get(*pos) == Some(&']') {
        out.push(']');
        *pos += 1;
        return Some(());
    }

    loop {
        skip_whitespace(chars, pos);

        match chars.get(*pos) {
            Some('{') => convert_object(chars, pos, out)?,
            Some('[') => convert_array(chars, pos, out)?,
            Some(&q @ ('"' | '\'')) => {
                let inner = read_quoted(chars, pos, q)?;
                push_json_string(out, &inner);
            },
            Some(_) => {
                let span = scan_scalar(chars, pos, ScalarContext::Array);
                push_scalar(out, &span);
            },
            None => return None,
        }

        skip_whitespace(chars, pos);
        match chars.get(*pos) {
            Some(',') => {
                out.push(',');
                *pos += 1;
            },
            Some(']') => {
                out.push(']');
                *pos += 1;
                return Some(());
            },
            _ => return None,
        }
    }
}

/// Converts a single value span in object position.
fn convert_value(chars: &[char], pos: &mut usize, out: &mut String) -> Option<()> {
    match chars.get(*pos) {
        Some('{') => convert_object(chars, pos, out),
        Some('[') => convert_array(chars, pos, out),
        Some(&q @ ('"' | '\'')) => {
            let inner = read_quoted(chars, pos, q)?;
            push_json_string(out, &inner);
            Some(())
        },
        Some(_) => {
            let span = scan_scalar(chars, pos, ScalarContext::Object);
            push_scalar(out, &span);
            Some(())
        },
        None => None,
    }
}

#[derive(Clone, Copy, PartialEq)]
enum ScalarContext {
    /// Value inside an object: commas only split before a key-colon
    /// pattern.
    Object,
    /// Element inside an array: any top-level comma splits.
    Array,
}

/// Scans an unquoted scalar span character by character.
///
/// Tracks brace depth so `{`/`[` embedded in a sentence do not end the
/// span early. The span ends at the enclosing close delimiter at depth 0,
/// at a qualifying comma, or at end of input (the caller then fails on the
/// missing close delimiter).
fn scan_scalar(chars: &[char], pos: &mut usize, context: ScalarContext) -> String {
    let start = *pos;
    let mut depth: u32 = 0;
    let mut end = chars.len();

    let mut i = *pos;
    while i < chars.len() {
        match chars[i] {
            '{' | '[' => depth += 1,
            '}' => {
                if depth == 0 {
                    end = i;
                    break;
                }
                depth -= 1;
            },
            ']' => {
                if depth == 0 && context == ScalarContext::Array {
                    end = i;
                    break;
                }
                depth = depth.saturating_sub(1);
            },
            ',' => {
                if depth == 0
                    && (context == ScalarContext::Array || comma_starts_new_pair(chars, i + 1))
                {
                    end = i;
                    break;
                }
            },
            _ => {},
        }
        i += 1;
    }

    *pos = end;
    chars[start..end].iter().collect::<String>().trim().to_string()
}

/// Lookahead after a comma: does a key-then-colon pattern follow?
///
/// Accepts both bare identifier keys and quoted keys, since keys earlier
/// in the same object may already be quoted.
fn comma_starts_new_pair(chars: &[char], mut i: usize) -> bool {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }

    match chars.get(i) {
        Some(&q @ ('"' | '\'')) => {
            i += 1;
            while i < chars.len() {
                if chars[i] == '\\' {
                    i += 2;
                    continue;
                }
                if chars[i] == q {
                    i += 1;
                    break;
                }
                i += 1;
            }
        },
        Some(c) if is_ident_char(*c) => {
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
        },
        _ => return false,
    }

    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    chars.get(i) == Some(&':')
}

/// Reads a bare identifier key, leaving `pos` at the first non-key char.
fn read_bare_key(chars: &[char], pos: &mut usize) -> Option<String> {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }

    if *pos == start {
        return None;
    }
    Some(chars[start..*pos].iter().collect())
}

/// Reads a quoted span, handling backslash escapes, consuming both quotes.
fn read_quoted(chars: &[char], pos: &mut usize, quote: char) -> Option<String> {
    debug_assert_eq!(chars.get(*pos), Some(&quote));
    *pos += 1;

    let mut result = String::new();
    while *pos < chars.len() {
        let ch = chars[*pos];
        if ch == '\\' {
            if let Some(next) = chars.get(*pos + 1) {
                result.push(*next);
                *pos += 2;
                continue;
            }
            return None;
        }
        if ch == quote {
            *pos += 1;
            return Some(result);
        }
        result.push(ch);
        *pos += 1;
    }

    None
}

/// Emits a trimmed scalar span as a JSON token.
///
/// Python literals normalize to their JSON spellings, numbers and JSON
/// literals stay bare, and everything else becomes an escaped string.
fn push_scalar(out: &mut String, span: &str) {
    match span {
        "None" | "null" => out.push_str("null"),
        "True" | "true" => out.push_str("true"),
        "False" | "false" => out.push_str("false"),
        _ if is_json_number(span) => out.push_str(span),
        _ => push_json_string(out, span),
    }
}

/// Whether a span is a plain JSON number (integer or decimal).
fn is_json_number(span: &str) -> bool {
    let digits = span.strip_prefix('-').unwrap_or(span);
    if digits.is_empty() {
        return false;
    }

    let mut dot_seen = false;
    for (i, ch) in digits.char_indices() {
        match ch {
            '0'..='9' => {},
            '.' if !dot_seen && i > 0 && i < digits.len() - 1 => dot_seen = true,
            _ => return false,
        }
    }
    true
}

/// Appends a JSON string literal with proper escaping.
fn push_json_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            },
            c => out.push(c),
        }
    }
    out.push('"');
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn skip_whitespace(chars: &[char], pos: &mut usize) {
    while *pos < chars.len() && chars[*pos].is_whitespace() {
        *pos += 1;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn repaired(input: &str) -> Value {
        let json = repair_to_json(input).expect("repairable input");
        serde_json::from_str(&json).expect("repaired output must be strict JSON")
    }

    #[test]
    fn quotes_bare_keys_and_values() {
        let value = repaired("{intent_level: High, intent_score: 3}");
        assert_eq!(value["intent_level"], "High");
        assert_eq!(value["intent_score"], 3);
    }

    #[test]
    fn comma_inside_sentence_value_is_kept() {
        let value = repaired(
            "{intent_level: High, reasoning: {intent: Customer asked about pricing, plans}}",
        );
        assert_eq!(value["reasoning"]["intent"], "Customer asked about pricing, plans");
    }

    #[test]
    fn python_literals_normalize() {
        let value = repaired("{a: None, b: True, c: False}");
        assert!(value["a"].is_null());
        assert_eq!(value["b"], true);
        assert_eq!(value["c"], false);
    }

    #[test]
    fn literal_lookalike_words_stay_strings() {
        let value = repaired("{a: Nothing, b: Truely}");
        assert_eq!(value["a"], "Nothing");
        assert_eq!(value["b"], "Truely");
    }

    #[test]
    fn numbers_stay_bare() {
        let value = repaired("{count: 3, ratio: -1.5, version: 1.2.3}");
        assert_eq!(value["count"], 3);
        assert_eq!(value["ratio"], -1.5);
        // Not a JSON number, so it becomes a string.
        assert_eq!(value["version"], "1.2.3");
    }

    #[test]
    fn iso_timestamp_value_becomes_string() {
        let value = repaired("{demo_book_datetime: 2025-06-01T15:30:00+05:30, x: 1}");
        assert_eq!(value["demo_book_datetime"], "2025-06-01T15:30:00+05:30");
        assert_eq!(value["x"], 1);
    }

    #[test]
    fn nested_objects_and_arrays_recurse() {
        let value = repaired("{outer: {inner: deep value, n: 2}, list: [a, b, 3]}");
        assert_eq!(value["outer"]["inner"], "deep value");
        assert_eq!(value["outer"]["n"], 2);
        assert_eq!(value["list"], serde_json::json!(["a", "b", 3]));
    }

    #[test]
    fn mixed_quoted_and_bare_keys() {
        let value = repaired("{'name': John Smith, email: john@example.com}");
        assert_eq!(value["name"], "John Smith");
        assert_eq!(value["email"], "john@example.com");
    }

    #[test]
    fn embedded_quotes_are_escaped() {
        let value = repaired(r#"{note: the "best" option, x: 1}"#);
        assert_eq!(value["note"], r#"the "best" option"#);
    }

    #[test]
    fn unbalanced_input_is_rejected() {
        assert!(repair_to_json("not json at all {{{").is_none());
        assert!(repair_to_json("{key: value").is_none());
        assert!(repair_to_json("").is_none());
        assert!(repair_to_json("{key value}").is_none());
    }

    #[test]
    fn empty_object_and_array() {
        assert_eq!(repair_to_json("{}").as_deref(), Some("{}"));
        assert_eq!(repair_to_json("[]").as_deref(), Some("[]"));
        let value = repaired("{items: []}");
        assert_eq!(value["items"], serde_json::json!([]));
    }

    #[test]
    fn braces_inside_sentence_value() {
        let value = repaired("{note: uses {curly} emphasis, x: 1}");
        assert_eq!(value["note"], "uses {curly} emphasis");
        assert_eq!(value["x"], 1);
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(repair_to_json("{a: 1} extra").is_none());
    }
}
