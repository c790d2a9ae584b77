//! Quote normalization for Python-literal-like model output.
//!
//! Models frequently answer with dict reprs (`{'name': 'x'}`) instead of
//! JSON. These helpers rewrite structural single quotes to double quotes
//! in one left-to-right pass. They are textual heuristics, not parsers:
//! there is no bracket nesting awareness and `\'` inside a single-quoted
//! string is not treated as an escape.

/// Key whose single-quoted value holds source code.
const CONTENT_KEY: &str = "content";

/// Rewrite every `'` found outside a double-quoted string to `"`.
///
/// A `"` toggles the "inside double-quoted string" flag; backslash escapes
/// are honoured only while that flag is set, so text that is already valid
/// JSON comes back unchanged.
pub fn single_to_double(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_double = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_double {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_double = false;
            }
            continue;
        }

        match c {
            '\'' => out.push('"'),
            '"' => {
                in_double = true;
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    out
}

/// Content-aware variant of [`single_to_double`].
///
/// Additionally tracks whether the current key is literally `content`; while
/// inside that key's single-quoted value, embedded `"` characters are
/// escaped as `\"` instead of toggling the double-quote flag, so source code
/// carried in the value does not break the enclosing JSON structure.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_double = false;
    let mut in_single = false;
    let mut in_content = false;
    let mut escaped = false;
    let mut expecting_content_value = false;
    let mut token = String::new();
    let mut last_string = String::new();

    for c in text.chars() {
        if in_double {
            out.push(c);
            if escaped {
                escaped = false;
                token.push(c);
            } else if c == '\\' {
                escaped = true;
                token.push(c);
            } else if c == '"' {
                in_double = false;
                if !in_single {
                    last_string = std::mem::take(&mut token);
                }
            } else {
                token.push(c);
            }
            continue;
        }

        match c {
            '\'' => {
                out.push('"');
                if in_single {
                    in_single = false;
                    in_content = false;
                    last_string = std::mem::take(&mut token);
                } else {
                    in_single = true;
                    in_content = expecting_content_value;
                    expecting_content_value = false;
                    token.clear();
                }
            }
            '"' if in_content => out.push_str("\\\""),
            '"' => {
                out.push(c);
                in_double = true;
                if !in_single {
                    token.clear();
                    expecting_content_value = false;
                }
            }
            _ if in_single => {
                out.push(c);
                token.push(c);
            }
            ':' => {
                out.push(c);
                expecting_content_value = last_string == CONTENT_KEY;
            }
            _ if c.is_whitespace() => out.push(c),
            _ => {
                out.push(c);
                expecting_content_value = false;
                last_string.clear();
            }
        }
    }

    out
}
