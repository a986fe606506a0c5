use super::{RenderContext, Renderer};
use crate::error::Result;

/// One JSON object per exchange, newline terminated
#[derive(Debug, Clone, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, context: &RenderContext<'_>) -> Result<String> {
        let mut line = serde_json::to_string(context.report)?;
        line.push('\n');
        Ok(line)
    }
}
