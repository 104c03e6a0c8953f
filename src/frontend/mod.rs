//! Front-end: lexer, parser, scopes, and the type-transform pass.
//!
//! The pipeline over one translation unit runs in strict order:
//!
//! ```text
//! source -> tokens -> declarations/statements (scoped AST) -> type transform
//! ```
//!
//! Parsing installs declarations into the scope tree (registering tags,
//! typedefs, and enum constants on the way, and matching initializers); the
//! transform pass then attaches a result type to every expression node of
//! each function body.

pub mod ast;
pub mod declaration;
pub mod declarator;
pub mod initializer;
pub mod layout;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod specifier;
pub mod token;
pub mod typecheck;

// Re-exports
pub use ast::{Expr, ExprKind, Stmt, StmtKind};
pub use declaration::Declaration;
pub use declarator::{DeclTy, TypeName};
pub use lexer::Lexer;
pub use parser::Parser;
pub use scope::{AggrId, DeclId, EnumId, ScopeId, TranslationUnit};
pub use specifier::TypeSpec;
pub use token::{Token, TokenKind};

use anyhow::Result;

/// Parse source code into a translation unit. Recoverable diagnostics are
/// collected inside the returned unit; `Err` is reserved for fatal
/// conditions such as lexer failures.
pub fn parse(source: &str) -> Result<TranslationUnit> {
    let mut parser = Parser::from_source(source)?;
    parser.parse_translation_unit();
    Ok(parser.finish())
}

/// Parse and run the type-transform pass.
pub fn analyze(source: &str) -> Result<TranslationUnit> {
    let mut tu = parse(source)?;
    typecheck::type_transform(&mut tu);
    Ok(tu)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let tu = parse("int x; void f(void) { x = 1; }").unwrap();
        assert_eq!(tu.diags.error_count(), 0);
    }

    #[test]
    fn test_analyze_attaches_types() {
        let tu = analyze("void f(void) { 1 + 2; }").unwrap();
        assert_eq!(tu.diags.error_count(), 0);
    }

    #[test]
    fn test_lexer_error_is_fatal() {
        assert!(parse("int x = `;").is_err());
    }
}
