//! Display pipeline for received email bodies.
//!
//! [`sanitize_email_html`] is the only function here that carries a safety
//! guarantee. [`format_html`] and [`highlight_html`] are presentational and
//! expect markup that has already been sanitized or is otherwise trusted.

pub mod formatter;
pub mod highlight;
pub mod sanitizer;
pub mod shadow;

pub use formatter::format_html;
pub use highlight::highlight_html;
pub use sanitizer::sanitize_email_html;
pub use shadow::{render_email, render_email_document, EMAIL_STYLES};
