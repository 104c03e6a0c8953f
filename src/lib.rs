//! # cfront - an ANSI C89 front end
//!
//! A front-end for the C programming language (C89 with the common
//! extensions `long long`, `inline`, `restrict`, bit-fields, and
//! `#pragma align`). One translation unit goes in; out comes a
//! fully-typed AST annotated with scopes, declarations, and an inferred
//! result type on every expression node.
//!
//! ## Architecture
//!
//! ```text
//! source -> lexer -> parser (declarations, scopes, initializers)
//!        -> type transform -> typed AST + diagnostics
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use cfront::prelude::*;
//!
//! let tu = cfront::analyze("typedef int *INTP; INTP x = 0;")?;
//! println!("{} error(s)", tu.diags.error_count());
//! println!("{}", cfront::utils::pretty::dump_translation_unit(&tu));
//! ```

#![warn(clippy::all)]

pub mod frontend;
pub mod utils;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::frontend::{
        AggrId, DeclId, Declaration, DeclTy, EnumId, Expr, ExprKind, Parser, ScopeId, Stmt,
        StmtKind, TranslationUnit, TypeName, TypeSpec,
    };
    pub use crate::utils::errors::{DiagKind, Diagnostic, DiagnosticList, FrontendError};
    pub use crate::utils::intern::{intern, resolve, Symbol};
    pub use crate::utils::location::{SourceLocation, Span};
    pub use crate::utils::pretty::{dump_translation_unit, format_declaration, format_type_name};
}

use anyhow::Result;
use frontend::TranslationUnit;

/// Parse one C translation unit. Diagnostics ride inside the result.
pub fn parse(source: &str) -> Result<TranslationUnit> {
    frontend::parse(source)
}

/// Parse and type-check one C translation unit.
pub fn analyze(source: &str) -> Result<TranslationUnit> {
    frontend::analyze(source)
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_pipeline_smoke() {
        let tu = analyze("int main(void) { return 0; }").unwrap();
        assert_eq!(tu.diags.error_count(), 0);
    }
}
