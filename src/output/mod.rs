//! Report rendering
//!
//! Two interchangeable strategies: the human-readable connection summary
//! with its timing diagram, and a single JSON object per exchange.

pub mod diagram;
pub mod headers;
mod json;
pub mod style;

pub use json::JsonRenderer;
pub use style::{ColorScheme, Painter};

use crate::{error::Result, models::Report, types::OutputMode, types::Scheme};

/// What a renderer needs about one finished exchange
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub report: &'a Report,
    /// Scheme of the URL requested; picks the diagram template
    pub scheme: Scheme,
    /// Body disposition line, if the body was read
    pub body_message: Option<&'a str>,
}

/// Output strategy for one exchange
pub trait Renderer: Send + Sync {
    /// Full text for stdout, trailing newline included
    fn render(&self, context: &RenderContext<'_>) -> Result<String>;
}

/// Connection summary, status line, sorted headers and timing diagram
#[derive(Debug, Clone)]
pub struct DiagramRenderer {
    painter: Painter,
}

impl DiagramRenderer {
    pub fn new(painter: Painter) -> Self {
        Self { painter }
    }

    fn status_line(&self, report: &Report) -> String {
        let version = report.proto.strip_prefix("HTTP/").unwrap_or(&report.proto);
        format!(
            "{}{}{}",
            self.painter.label("HTTP"),
            self.painter.separator("/"),
            self.painter.value(&format!("{} {}", version, report.status))
        )
    }

    fn header_lines(&self, report: &Report) -> String {
        let mut out = String::new();
        for name in headers::sorted_names(report.header.keys().map(String::as_str)) {
            let values = report.header.get(name).map(|v| v.join(",")).unwrap_or_default();
            out.push_str(&format!(
                "{} {}\n",
                self.painter.separator(&format!("{}:", name)),
                self.painter.value(&values)
            ));
        }
        out
    }
}

impl Renderer for DiagramRenderer {
    fn render(&self, context: &RenderContext<'_>) -> Result<String> {
        let report = context.report;
        let mut out = String::new();

        out.push_str(&format!(
            "\n{}{}\n",
            self.painter.label("Connected to "),
            self.painter.value(&report.address)
        ));
        out.push_str(&format!("\n{}\n", self.status_line(report)));
        out.push_str(&self.header_lines(report));

        if let Some(message) = context.body_message {
            out.push_str(&format!("\n{}\n", self.painter.value(message)));
        }

        out.push('\n');
        out.push_str(&diagram::render(
            diagram::template_for(context.scheme),
            &report.timing,
            &self.painter,
        )?);
        Ok(out)
    }
}

/// Picks the renderer for the configured output mode
pub struct RendererFactory;

impl RendererFactory {
    pub fn create_renderer(mode: OutputMode, enable_color: bool) -> Box<dyn Renderer> {
        match mode {
            OutputMode::Json => Box::new(JsonRenderer),
            OutputMode::Diagram => Box::new(DiagramRenderer::new(Painter::new(enable_color))),
        }
    }

    /// Plain-text diagram renderer for scripts and tests
    pub fn create_plain_renderer() -> Box<dyn Renderer> {
        Self::create_renderer(OutputMode::Diagram, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timing;

    fn report() -> Report {
        let mut report = Report {
            address: "127.0.0.1:8080".to_string(),
            proto: "HTTP/1.1".to_string(),
            status: "200 OK".to_string(),
            timing: Timing { lookup: 0, connect: 1, pre_transfer: 1, start_transfer: 3, total: 4, ..Default::default() },
            ..Default::default()
        };
        report.header.insert("Content-Type".to_string(), vec!["text/plain".to_string()]);
        report.header.insert("Connection".to_string(), vec!["keep-alive".to_string()]);
        report.header.insert("Server".to_string(), vec!["test".to_string()]);
        report.header.insert("Vary".to_string(), vec!["Accept".to_string(), "Origin".to_string()]);
        report
    }

    #[test]
    fn test_diagram_preamble() {
        let report = report();
        let context = RenderContext { report: &report, scheme: Scheme::Http, body_message: Some("Body discarded") };
        let output = RendererFactory::create_plain_renderer().render(&context).unwrap();

        let expected = concat!(
            "\nConnected to 127.0.0.1:8080\n",
            "\nHTTP/1.1 200 OK\n",
            "Server: test\n",
            "Content-Type: text/plain\n",
            "Vary: Accept,Origin\n",
            "Connection: keep-alive\n",
            "\nBody discarded\n",
            "\n",
            "  DNS Lookup   TCP Connection   Server Processing   Content Transfer\n",
        );
        assert!(output.starts_with(expected), "unexpected output:\n{}", output);
        assert!(output.contains("total:4ms"));
    }

    #[test]
    fn test_diagram_without_body_message() {
        let report = report();
        let context = RenderContext { report: &report, scheme: Scheme::Https, body_message: None };
        let output = RendererFactory::create_plain_renderer().render(&context).unwrap();
        assert!(!output.contains("Body"));
        assert!(output.contains("Connection: keep-alive\n\n  DNS Lookup   TCP Connection   TLS Handshake"));
    }

    #[test]
    fn test_http2_status_line() {
        let mut report = report();
        report.proto = "HTTP/2.0".to_string();
        let renderer = DiagramRenderer::new(Painter::new(false));
        assert_eq!(renderer.status_line(&report), "HTTP/2.0 200 OK");
    }

    #[test]
    fn test_factory_json() {
        let report = report();
        let context = RenderContext { report: &report, scheme: Scheme::Http, body_message: None };
        let output = RendererFactory::create_renderer(OutputMode::Json, true).render(&context).unwrap();
        assert!(output.starts_with("{\"Address\":\"127.0.0.1:8080\""));
    }
}
