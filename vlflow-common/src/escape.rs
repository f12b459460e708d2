/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */

pub fn escape_field(col: &str) -> String {
    // Escape single quote, double quote, period, and brackets with a backslash
    col.replace('\'', "\\'")
        .replace('\"', "\\\"")
        .replace('.', "\\.")
        .replace('[', "\\[")
        .replace(']', "\\]")
}

pub fn unescape_field(col: &str) -> String {
    // Unescape single quote, double quote, period, and brackets
    col.replace("\\'", "'")
        .replace("\\\"", "\"")
        .replace("\\.", ".")
        .replace("\\[", "[")
        .replace("\\]", "]")
}

/// Expression that reads `field` from the current row, e.g. `datum["b"]`
pub fn datum_ref(field: &str) -> String {
    let unescaped = unescape_field(field);
    format!("datum[{}]", quote_string(&unescaped))
}

/// Double-quoted expression string literal
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Replace every character that can't appear in a signal or dataset identifier with `_`
pub fn var_name(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::escape::{datum_ref, escape_field, unescape_field, var_name};

    #[test]
    fn test_escape() {
        let col = "'foo'_._\"bar\"";
        let escaped = escape_field(col);
        assert_eq!(escaped, r#"\'foo\'_\._\"bar\""#)
    }

    #[test]
    fn test_unescape() {
        let col = r#"\'foo\'_\._\"bar\""#;
        let unescaped = unescape_field(col);
        assert_eq!(unescaped, "'foo'_._\"bar\"")
    }

    #[test]
    fn test_datum_ref() {
        assert_eq!(datum_ref("b"), r#"datum["b"]"#);
        assert_eq!(datum_ref(r#"a\.b"#), r#"datum["a.b"]"#);
        assert_eq!(datum_ref("say \"hi\""), r#"datum["say \"hi\""]"#);
    }

    #[test]
    fn test_var_name() {
        assert_eq!(var_name("bin_extent_0_1.5"), "bin_extent_0_1_5");
        assert_eq!(var_name("count_*"), "count__");
    }
}
