//! Utility modules shared across the front-end:
//! - Error types and the diagnostic list
//! - Source location tracking
//! - Symbol interning
//! - Declaration/type formatting and the scope dump

pub mod errors;
pub mod intern;
pub mod location;
pub mod pretty;

// Re-exports
pub use errors::{DiagKind, Diagnostic, DiagnosticList, FrontendError, Severity};
pub use intern::{intern, resolve, Symbol};
pub use location::{SourceLocation, Span};
pub use pretty::{dump_translation_unit, format_declaration, format_type_name};
