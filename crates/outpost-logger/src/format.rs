//! printf-style message rendering that never aborts the caller

use std::fmt::{self, Display, Write};

/// Emitted in place of a placeholder that has no matching argument
pub const MISSING_MARKER: &str = "%!(MISSING)";

/// Emitted when an argument's `Display` implementation fails
pub const FORMAT_ERROR_MARKER: &str = "%!(FORMAT_ERROR)";

/// Render a runtime template, substituting `{}` placeholders in order.
///
/// `{{` and `}}` produce literal braces. Placeholders without an argument
/// render as [`MISSING_MARKER`]; leftover arguments are appended as
/// `%!(EXTRA a, b)`.
pub fn render(template: &str, args: &[&dyn Display]) -> String {
    let mut out = String::with_capacity(template.len() + args.len() * 8);
    let mut remaining = args.iter();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' if chars.peek() == Some(&'}') => {
                chars.next();
                match remaining.next() {
                    Some(arg) => push_display(&mut out, *arg),
                    None => out.push_str(MISSING_MARKER),
                }
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            other => out.push(other),
        }
    }

    let extra: Vec<_> = remaining.collect();
    if !extra.is_empty() {
        out.push_str("%!(EXTRA ");
        for (i, arg) in extra.into_iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            push_display(&mut out, *arg);
        }
        out.push(')');
    }

    out
}

/// Render compile-time checked arguments from `format_args!`
pub fn render_args(args: fmt::Arguments<'_>) -> String {
    if let Some(literal) = args.as_str() {
        return literal.to_string();
    }

    let mut out = String::new();
    if fmt::write(&mut out, args).is_err() {
        out.push_str(FORMAT_ERROR_MARKER);
    }
    out
}

fn push_display(out: &mut String, arg: &dyn Display) {
    let mut rendered = String::new();
    if write!(rendered, "{}", arg).is_err() {
        rendered.push_str(FORMAT_ERROR_MARKER);
    }
    out.push_str(&rendered);
}
