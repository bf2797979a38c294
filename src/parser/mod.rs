pub mod format_spec;
pub mod template;

pub use format_spec::{Align, FormatSpec};
pub use template::{Placeholder, Segment, Template, TemplateError, positional};
