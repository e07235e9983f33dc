//! Render the shell templates compiled in from `data/templates`

use serde::Serialize;
use tinytemplate::{format_unescaped, TinyTemplate};

pub use tinytemplate::error::Error as TemplateError;

/// Render a single template against `context`.
///
/// Values are inserted verbatim: the output is a shell script, so HTML escaping would only
/// corrupt paths and quotes.
pub fn render<C: Serialize>(name: &'static str, template: &'static str, context: &C) -> Result<String, TemplateError> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt.add_template(name, template)?;
    tt.render(name, context)
}
