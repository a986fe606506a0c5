//! ASCII timing diagram
//!
//! Each template carries placeholders of the form `%>Name` or `%<Name`.
//! The placeholder is first blanked with spaces, then the field's value
//! (`<n>ms`) is written so that it ends where the placeholder ended (`>`)
//! or starts where it started (`<`). Names resolve through
//! [`TimingField::from_name`].

use super::style::Painter;
use crate::{
    error::{AppError, Result},
    models::{Timing, TimingField},
    types::Scheme,
};
use std::ops::Range;

pub const HTTPS_TEMPLATE: &str = concat!(
    "  DNS Lookup   TCP Connection   TLS Handshake   Server Processing   Content Transfer\n",
    "[    %>DNS  |         %>TCP  |        %>TLS  |         %>Server  |      %>Transfer  ]\n",
    "            |                |               |                   |                  |\n",
    "   namelookup:%<Lookup       |               |                   |                  |\n",
    "                       connect:%<Connect     |                   |                  |\n",
    "                                   pretransfer:%<PreTransfer     |                  |\n",
    "                                                     starttransfer:%<StartTransfer  |\n",
    "                                                                                total:%<Total\n",
);

pub const HTTP_TEMPLATE: &str = concat!(
    "  DNS Lookup   TCP Connection   Server Processing   Content Transfer\n",
    "[    %>DNS  |         %>TCP  |         %>Server  |      %>Transfer  ]\n",
    "            |                |                   |                  |\n",
    "   namelookup:%<Lookup       |                   |                  |\n",
    "                       connect:%<Connect         |                  |\n",
    "                                     starttransfer:%<StartTransfer  |\n",
    "                                                                total:%<Total\n",
);

/// Which edge of the placeholder the value is pinned to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// `%>`: the value ends where the placeholder ends
    End,
    /// `%<`: the value starts where the placeholder starts
    Start,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder {
    pub start: usize,
    pub end: usize,
    pub anchor: Anchor,
    pub field: TimingField,
}

impl Placeholder {
    /// Byte range the value of `len` bytes overwrites in a buffer of `limit` bytes
    fn span(&self, len: usize, limit: usize) -> Range<usize> {
        match self.anchor {
            Anchor::End => self.end.saturating_sub(len)..self.end,
            Anchor::Start => self.start..(self.start + len).min(limit),
        }
    }
}

pub fn template_for(scheme: Scheme) -> &'static str {
    match scheme {
        Scheme::Https => HTTPS_TEMPLATE,
        Scheme::Http => HTTP_TEMPLATE,
    }
}

/// First placeholder at or after byte `from`
fn next_placeholder(buf: &str, from: usize) -> Option<Result<Placeholder>> {
    let start = from + buf[from..].find('%')?;
    let bytes = buf.as_bytes();

    let anchor = match bytes.get(start + 1) {
        Some(b'>') => Anchor::End,
        Some(b'<') => Anchor::Start,
        Some(other) => {
            return Some(Err(AppError::internal(format!(
                "invalid template direction: {:?}",
                char::from(*other)
            ))))
        }
        None => return Some(Err(AppError::internal("template ends with a bare '%'"))),
    };

    let name_start = start + 2;
    let end = name_start
        + bytes[name_start..]
            .iter()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
    let name = &buf[name_start..end];

    Some(
        TimingField::from_name(name)
            .map(|field| Placeholder { start, end, anchor, field })
            .ok_or_else(|| AppError::internal(format!("invalid template variable: {:?}", name))),
    )
}

/// Every placeholder in `template`, failing on the first malformed one
pub fn placeholders(template: &str) -> Result<Vec<Placeholder>> {
    let mut found = Vec::new();
    let mut cursor = 0;
    while let Some(placeholder) = next_placeholder(template, cursor) {
        let placeholder = placeholder?;
        cursor = placeholder.end;
        found.push(placeholder);
    }
    Ok(found)
}

/// Check the built-in templates before anything is measured
pub fn validate_templates() -> Result<()> {
    placeholders(HTTPS_TEMPLATE)?;
    placeholders(HTTP_TEMPLATE)?;
    Ok(())
}

/// Fill `template` with values from `timing`
pub fn render(template: &str, timing: &Timing, painter: &Painter) -> Result<String> {
    let mut out = template.to_string();
    let mut cursor = 0;

    while let Some(placeholder) = next_placeholder(&out, cursor) {
        let placeholder = placeholder?;
        let plain = format!("{}ms", timing.value(placeholder.field));
        let painted = painter.value(&plain).to_string();

        let blank = " ".repeat(placeholder.end - placeholder.start);
        out.replace_range(placeholder.start..placeholder.end, &blank);

        let span = placeholder.span(plain.len(), out.len());
        cursor = span.start + painted.len();
        out.replace_range(span, &painted);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn sample() -> Timing {
        Timing {
            dns: 5,
            tcp: 10,
            tls: 20,
            server: 50,
            transfer: 100,
            lookup: 5,
            connect: 15,
            pre_transfer: 35,
            start_transfer: 85,
            total: 185,
        }
    }

    fn plain() -> Painter {
        Painter::new(false)
    }

    #[test]
    fn test_builtin_templates_are_valid() {
        assert!(validate_templates().is_ok());
        assert_eq!(placeholders(HTTPS_TEMPLATE).unwrap().len(), 10);
        assert_eq!(placeholders(HTTP_TEMPLATE).unwrap().len(), 8);
    }

    #[test]
    fn test_plaintext_template_omits_tls_fields() {
        let fields: Vec<TimingField> = placeholders(HTTP_TEMPLATE)
            .unwrap()
            .into_iter()
            .map(|p| p.field)
            .collect();
        assert!(!fields.contains(&TimingField::Tls));
        assert!(!fields.contains(&TimingField::PreTransfer));
        assert_eq!(template_for(Scheme::Http), HTTP_TEMPLATE);
        assert_eq!(template_for(Scheme::Https), HTTPS_TEMPLATE);
    }

    #[test]
    fn test_tokens_in_order() {
        let rendered = render(HTTPS_TEMPLATE, &sample(), &plain()).unwrap();
        let tokens: Vec<&str> = Regex::new(r"\d+ms")
            .unwrap()
            .find_iter(&rendered)
            .map(|m| m.as_str())
            .collect();
        assert_eq!(
            tokens,
            vec!["5ms", "10ms", "20ms", "50ms", "100ms", "5ms", "15ms", "35ms", "85ms", "185ms"]
        );
    }

    #[test]
    fn test_encrypted_layout() {
        let rendered = render(HTTPS_TEMPLATE, &sample(), &plain()).unwrap();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(
            lines[1],
            "[      5ms  |          10ms  |         20ms  |             50ms  |           100ms  ]"
        );
        assert_eq!(
            lines[3],
            "   namelookup:5ms            |               |                   |                  |"
        );
        assert_eq!(
            lines[6],
            "                                                     starttransfer:85ms             |"
        );
        assert_eq!(
            lines[7],
            "                                                                                total:185ms  "
        );
        assert!(rendered.ends_with('\n'));
    }

    #[test]
    fn test_plaintext_layout() {
        let timing = Timing {
            dns: 5,
            tcp: 10,
            tls: 0,
            server: 50,
            transfer: 100,
            lookup: 5,
            connect: 15,
            pre_transfer: 15,
            start_transfer: 65,
            total: 165,
        };
        let rendered = render(HTTP_TEMPLATE, &timing, &plain()).unwrap();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines[1],
            "[      5ms  |          10ms  |             50ms  |           100ms  ]"
        );
        assert_eq!(
            lines[4],
            "                       connect:15ms              |                  |"
        );
    }

    #[test]
    fn test_unknown_variable_is_rejected() {
        let error = render("x %>Latency y", &sample(), &plain()).unwrap_err();
        assert!(matches!(error, AppError::Internal(_)));
        assert!(error.to_string().contains("Latency"));

        // Names are case-sensitive.
        assert!(placeholders("%<dns").is_err());
    }

    #[test]
    fn test_bad_direction_is_rejected() {
        assert!(placeholders("%=DNS").is_err());
        assert!(placeholders("trailing %").is_err());
    }

    #[test]
    fn test_oversized_values_are_clamped() {
        let timing = Timing { dns: 1234567, total: 123456, ..Default::default() };
        assert_eq!(render("%>DNS", &timing, &plain()).unwrap(), "1234567ms");
        assert_eq!(render("x%<Total", &timing, &plain()).unwrap(), "x123456ms");
    }

    #[test]
    fn test_template_without_placeholders_is_unchanged() {
        assert_eq!(render("no values\n", &sample(), &plain()).unwrap(), "no values\n");
    }
}
