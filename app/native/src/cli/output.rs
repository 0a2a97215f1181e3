//! CLI output formatting.
//!
//! JSON is pretty-printed and coloured line by line; cells are formatted for
//! `tabled` tables.

use colored::Colorize;
use serde::Serialize;

use crate::error::WmResult;
use crate::modules::wm::state::Rect;

/// Print any serializable value as highlighted JSON.
///
/// # Errors
///
/// Returns `Config` when the value cannot be serialized.
pub fn print_json<T: Serialize>(value: &T) -> WmResult<()> {
    let text = serde_json::to_string_pretty(value)?;
    for line in text.lines() {
        println!("{}", highlight_json_line(line));
    }
    Ok(())
}

/// Colour one line of pretty-printed JSON: keys cyan, strings green,
/// numbers yellow, literals magenta.
fn highlight_json_line(line: &str) -> String {
    let indent_len = line.len() - line.trim_start().len();
    let (indent, body) = line.split_at(indent_len);

    let (key, value) = match split_key(body) {
        Some((key, value)) => (Some(key), value),
        None => (None, body),
    };

    let trailing_comma = value.ends_with(',');
    let value = value.trim_end_matches(',');
    let coloured = if value.starts_with('"') {
        value.green().to_string()
    } else if matches!(value, "true" | "false" | "null") {
        value.magenta().to_string()
    } else if value.parse::<f64>().is_ok() {
        value.yellow().to_string()
    } else {
        value.bold().to_string()
    };

    let mut out = String::with_capacity(line.len() + 16);
    out.push_str(indent);
    if let Some(key) = key {
        out.push_str(&key.cyan().to_string());
        out.push_str(": ");
    }
    out.push_str(&coloured);
    if trailing_comma {
        out.push(',');
    }
    out
}

/// Split `"key": value` at the colon after the closing quote of the key.
fn split_key(body: &str) -> Option<(&str, &str)> {
    let rest = body.strip_prefix('"')?;
    let mut escaped = false;
    for (idx, ch) in rest.char_indices() {
        match ch {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => {
                let key_end = idx + 2;
                let after = body[key_end..].strip_prefix(": ")?;
                return Some((&body[..key_end], after));
            }
            _ => escaped = false,
        }
    }
    None
}

/// `x,y WxH`, or a dash for an empty rect.
#[must_use]
pub fn format_rect(rect: &Rect) -> String {
    if !rect.is_valid() {
        return "-".dimmed().to_string();
    }
    format!("{},{} {}x{}", rect.x, rect.y, rect.width, rect.height)
}

/// Formats a boolean as a colored mark.
#[must_use]
pub fn format_bool(value: bool) -> String {
    if value {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_key() {
        assert_eq!(split_key(r#""width": 1080,"#), Some((r#""width""#, "1080,")));
        assert_eq!(split_key(r#""a\"b": true"#), Some((r#""a\"b""#, "true")));
        assert_eq!(split_key("1080,"), None);
        assert_eq!(split_key(r#""plain string""#), None);
    }

    #[test]
    fn test_highlight_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(highlight_json_line(r#"  "name": "panel","#), r#"  "name": "panel","#);
        assert_eq!(highlight_json_line("  }"), "  }");
    }

    #[test]
    fn test_format_rect() {
        colored::control::set_override(false);
        assert_eq!(format_rect(&Rect::new(0.0, 96.0, 1080.0, 2124.0)), "0,96 1080x2124");
        assert_eq!(format_rect(&Rect::zero()), "-");
    }

    #[test]
    fn test_format_bool() {
        assert!(format_bool(true).contains('✓'));
        assert!(format_bool(false).contains('✗'));
    }
}
