pub mod interpreter;
pub mod models;
pub mod templates;

pub use interpreter::{detect_cities, QueryInterpreter};
pub use models::*;
pub use templates::{ResponseTemplates, TemplateError};
