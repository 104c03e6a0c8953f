//! Declarator engine.
//!
//! C declarators read inside-out: in `int (*q)[30]`, `q` is a pointer to an
//! array of 30 ints. The engine parses that grammar into a flat, canonical
//! chain: the identifier first, followed by the declaration operators in the
//! order they apply to it, innermost first.
//!
//!   int *a                        ID(a) -> POINTER
//!   int (*q)[30]                  ID(q) -> POINTER -> ARRAY(30)
//!   double (*arr[10][40])[20][30] ID(arr) -> ARRAY(10) -> ARRAY(40)
//!                                 -> POINTER -> ARRAY(20) -> ARRAY(30)
//!
//! An abstract declarator (type name, parameter without a name) is the same
//! chain without the leading ID. This canonical form is the single source of
//! truth for every type predicate, for size computation, and for printing.
//!
//! The recursive-descent productions build the chain in reverse (outermost
//! operator first) because each new suffix wraps everything parsed so far;
//! callers flip it into canonical order with `canonicalize`.

use crate::frontend::ast::Expr;
use crate::frontend::declaration::Declaration;
use crate::frontend::parser::Parser;
use crate::frontend::specifier::{TypeSpec, QUA_CONST, QUA_RESTRICT, QUA_VOLATILE};
use crate::frontend::token::TokenKind;
use crate::utils::errors::DiagKind;
use crate::utils::intern::{intern, Symbol};
use serde::{Deserialize, Serialize};

/// One node of a declarator chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeclTy {
    /// The declared identifier; always at position 0 when present.
    Id { sym: Symbol },
    /// `*`, with the qualifier bits that follow the star.
    Pointer { qua: u32 },
    /// `[dim]`; `dim` is filled by constant evaluation (0 = not yet known).
    Array {
        #[serde(skip)]
        dim_expr: Option<Box<Expr>>,
        dim: u64,
        paren: bool,
    },
    /// `(params)`
    Fun { params: Vec<Declaration>, paren: bool },
    /// `...` — only as the last pseudo-parameter of a Fun.
    Variadic,
}

impl DeclTy {
    pub fn is_id(&self) -> bool {
        matches!(self, DeclTy::Id { .. })
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, DeclTy::Pointer { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, DeclTy::Array { .. })
    }

    pub fn is_fun(&self) -> bool {
        matches!(self, DeclTy::Fun { .. })
    }
}

/// The pure operator part of a chain: everything after the leading ID.
pub fn pure_chain(chain: &[DeclTy]) -> &[DeclTy] {
    match chain.first() {
        Some(DeclTy::Id { .. }) => &chain[1..],
        _ => chain,
    }
}

fn first_op(chain: &[DeclTy]) -> Option<(usize, &DeclTy)> {
    chain
        .iter()
        .enumerate()
        .find(|(_, d)| !matches!(d, DeclTy::Id { .. } | DeclTy::Variadic))
}

/// The declared identifier, if the chain is not abstract.
pub fn chain_sym(chain: &[DeclTy]) -> Option<Symbol> {
    match chain.first() {
        Some(DeclTy::Id { sym }) => Some(*sym),
        _ => None,
    }
}

/// A pointer-typed chain: the first operator after the ID is POINTER (which
/// also covers function pointers).
pub fn is_pointer(chain: &[DeclTy]) -> bool {
    matches!(first_op(chain), Some((_, DeclTy::Pointer { .. })))
}

/// An array-typed chain: the first operator after the ID is ARRAY.
pub fn is_array(chain: &[DeclTy]) -> bool {
    matches!(first_op(chain), Some((_, DeclTy::Array { .. })))
}

/// A function declaration/designator: the first operator is FUN with no
/// intervening POINTER (`void f()`, but also `void (*f())[]`).
pub fn is_fun_decl(chain: &[DeclTy]) -> bool {
    matches!(first_op(chain), Some((_, DeclTy::Fun { .. })))
}

/// A function pointer: POINTER immediately followed by FUN.
pub fn is_fun_pointer(chain: &[DeclTy]) -> bool {
    match first_op(chain) {
        Some((i, DeclTy::Pointer { .. })) => matches!(chain.get(i + 1), Some(DeclTy::Fun { .. })),
        _ => false,
    }
}

/// Any indirection at all (array, pointer, or function).
pub fn is_indirect(chain: &[DeclTy]) -> bool {
    chain
        .iter()
        .any(|d| matches!(d, DeclTy::Pointer { .. } | DeclTy::Array { .. } | DeclTy::Fun { .. }))
}

/// A specifier plus an abstract declarator chain: the representation of
/// stand-alone types (casts, sizeof, parameter positions) and of every
/// expression result type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeName {
    pub spec: TypeSpec,
    pub chain: Vec<DeclTy>,
    /// Carried along when the type came from a bit-field declarator.
    #[serde(default)]
    pub bit_len: Option<u32>,
}

impl TypeName {
    pub fn new(spec: TypeSpec) -> Self {
        Self { spec, chain: Vec::new(), bit_len: None }
    }

    pub fn with_chain(spec: TypeSpec, chain: Vec<DeclTy>) -> Self {
        Self { spec, chain, bit_len: None }
    }

    /// The operator part of the chain, ID stripped.
    pub fn pure(&self) -> &[DeclTy] {
        pure_chain(&self.chain)
    }

    pub fn name(&self) -> Option<Symbol> {
        chain_sym(&self.chain)
    }

    pub fn is_pointer(&self) -> bool {
        is_pointer(&self.chain)
    }

    pub fn is_array(&self) -> bool {
        is_array(&self.chain)
    }

    pub fn is_fun_decl(&self) -> bool {
        is_fun_decl(&self.chain)
    }

    pub fn is_fun_pointer(&self) -> bool {
        is_fun_pointer(&self.chain)
    }

    /// No operators at all: plain scalar/aggregate of the specifier.
    pub fn is_scalar(&self) -> bool {
        self.pure().is_empty()
    }

    /// Arithmetic type (integer or floating) with no indirection.
    pub fn is_arith(&self) -> bool {
        self.is_scalar() && self.spec.is_arith()
    }

    /// Integer type with no indirection.
    pub fn is_integer_scalar(&self) -> bool {
        self.is_scalar() && self.spec.is_integer()
    }

    /// Struct/union value (not through pointer or array).
    pub fn is_aggr_value(&self) -> bool {
        self.is_scalar() && self.spec.is_aggr()
    }

    /// Copy of this type with the leading ID dropped — what an identifier
    /// expression's result type looks like.
    pub fn to_abstract(&self) -> TypeName {
        TypeName::with_chain(self.spec.clone(), self.pure().to_vec())
    }
}

/// Flip a reverse-built chain into canonical order (ID first, innermost
/// operator next).
pub fn canonicalize(mut chain: Vec<DeclTy>) -> Vec<DeclTy> {
    chain.reverse();
    chain
}

impl Parser {
    /// pointer: ('*' type-qualifier*)* — returned in source order.
    fn parse_pointer_prefix(&mut self) -> Vec<DeclTy> {
        let mut ptrs = Vec::new();
        while self.consume_if(TokenKind::Star) {
            let mut qua = 0u32;
            loop {
                match self.peek_kind() {
                    TokenKind::Const => {
                        self.advance();
                        qua |= QUA_CONST;
                    }
                    TokenKind::Volatile => {
                        self.advance();
                        qua |= QUA_VOLATILE;
                    }
                    TokenKind::Restrict => {
                        self.advance();
                        qua |= QUA_RESTRICT;
                    }
                    _ => break,
                }
            }
            ptrs.push(DeclTy::Pointer { qua });
        }
        ptrs
    }

    /// declarator := pointer? direct_declarator
    ///
    /// Returns the reverse-order chain; empty when no declarator is present.
    pub(crate) fn parse_declarator_rev(&mut self) -> Vec<DeclTy> {
        let ptrs = self.parse_pointer_prefix();
        let chain = self.parse_direct_declarator_rev();
        if chain.is_empty() {
            return Vec::new();
        }
        let mut out = ptrs;
        out.extend(chain);
        out
    }

    fn parse_direct_declarator_rev(&mut self) -> Vec<DeclTy> {
        let mut paren = false;
        let mut chain = match self.peek_kind() {
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_declarator_rev();
                if !self.expect(TokenKind::RParen, "miss ')'") {
                    return inner;
                }
                if inner.is_empty() {
                    self.err_here(DiagKind::Syntax, "must have identifier declared");
                    return inner;
                }
                paren = true;
                inner
            }
            TokenKind::Identifier => {
                let sym = intern(&self.peek().lexeme);
                let scope = self.cur_scope;
                self.tu.scope_mut(scope).syms.push(sym);
                self.advance();
                vec![DeclTy::Id { sym }]
            }
            _ => return Vec::new(),
        };
        self.parse_declarator_suffixes(&mut chain, paren);
        chain
    }

    /// abstract_declarator := pointer? direct_abstract_declarator?
    ///
    /// Also accepts a named declarator, as parameter positions allow both.
    pub(crate) fn parse_abstract_declarator_rev(&mut self) -> Vec<DeclTy> {
        let ptrs = self.parse_pointer_prefix();
        let chain = self.parse_direct_abstract_declarator_rev();
        let mut out = ptrs;
        out.extend(chain);
        out
    }

    fn parse_direct_abstract_declarator_rev(&mut self) -> Vec<DeclTy> {
        let mut paren = false;
        let mut chain = match self.peek_kind() {
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_abstract_declarator_rev();
                if !self.expect(TokenKind::RParen, "miss ')'") {
                    return inner;
                }
                paren = true;
                inner
            }
            TokenKind::Identifier => {
                let sym = intern(&self.peek().lexeme);
                let scope = self.cur_scope;
                self.tu.scope_mut(scope).syms.push(sym);
                self.advance();
                vec![DeclTy::Id { sym }]
            }
            _ => Vec::new(),
        };
        self.parse_declarator_suffixes(&mut chain, paren);
        chain
    }

    /// Zero or more `[dim]` suffixes, or one `(params)` suffix. Each suffix
    /// wraps everything parsed so far, so it lands at the front of the
    /// reverse-order chain.
    fn parse_declarator_suffixes(&mut self, chain: &mut Vec<DeclTy>, paren: bool) {
        match self.peek_kind() {
            TokenKind::LBracket => {
                while self.peek_kind() == TokenKind::LBracket {
                    self.advance();
                    let dim_expr = if self.peek_kind() == TokenKind::RBracket {
                        None
                    } else {
                        Some(Box::new(self.parse_conditional_expr()))
                    };
                    if !self.expect(TokenKind::RBracket, "miss ']'") {
                        return;
                    }
                    chain.insert(0, DeclTy::Array { dim_expr, dim: 0, paren });
                }
            }
            TokenKind::LParen => {
                self.advance();
                let params = self.parse_parameter_type_list();
                self.expect(TokenKind::RParen, "miss ')'");
                chain.insert(0, DeclTy::Fun { params, paren });
            }
            _ => {}
        }
    }

    /// parameter_type_list inside `(` `)`. Opens a transient scope so that
    /// parameter declarations and tags stay out of the enclosing scope.
    ///
    /// Canonical rewrites at close:
    /// - a single unnamed `void` parameter collapses to an empty list;
    /// - a single named `void` parameter is an error ("incomplete type");
    /// - `...` may only appear last and becomes a Variadic pseudo-parameter.
    pub(crate) fn parse_parameter_type_list(&mut self) -> Vec<Declaration> {
        self.push_scope(true);
        let mut params = Vec::new();
        loop {
            if self.peek_kind() == TokenKind::RParen
                || self.peek_kind() == TokenKind::Eof
                || self.tu.diags.too_many_errors()
            {
                break;
            }
            if self.peek_kind() == TokenKind::Ellipsis {
                self.advance();
                params.push(Declaration::variadic_marker(self.line()));
                break;
            }
            match self.parse_parameter_declaration() {
                Some(d) => params.push(d),
                None => break,
            }
            if !self.consume_if(TokenKind::Comma) {
                break;
            }
        }
        self.pop_scope();

        if params.len() == 1 {
            let only = &params[0];
            if only.ty.spec.is_void() && !only.ty.is_pointer() && !only.is_variadic_marker() {
                if only.name().is_some() {
                    self.err_here(
                        DiagKind::Incompleteness,
                        "the first parameter has incomplete type",
                    );
                }
                params.clear();
            }
        }
        params
    }

    /// parameter_declaration:
    ///     declaration_specifiers declarator
    ///     declaration_specifiers abstract_declarator
    ///     declaration_specifiers
    fn parse_parameter_declaration(&mut self) -> Option<Declaration> {
        let line = self.line();
        let mut spec = self.parse_declaration_specifiers()?;
        spec.complement_int();

        let chain = canonicalize(self.parse_abstract_declarator_rev());
        let mut ty = TypeName::with_chain(spec, chain);
        // A parameter array has at least one element even when dim 0 is
        // omitted; it is rewritten to a pointer on function definition.
        self.compute_array_dims(&mut ty, false);

        let mut decl = Declaration::new(ty, line);
        decl.scope = Some(self.cur_scope);
        decl.align = self.alignment;
        if decl.ty.spec.is_user_type_ref() {
            decl = self.expand_user_type_decl(decl);
        }
        Some(decl)
    }

    /// type_name: specifier_qualifier_list abstract_declarator?
    pub(crate) fn parse_type_name(&mut self) -> Option<TypeName> {
        let mut spec = self.parse_specifier_qualifier_list()?;
        spec.complement_int();
        let chain = canonicalize(self.parse_abstract_declarator_rev());
        let mut ty = TypeName::with_chain(spec, chain);
        self.compute_array_dims(&mut ty, false);
        Some(ty)
    }

    /// Compute the element count of every ARRAY node from its dimension
    /// expression. `allow_dim0_empty` permits a missing outermost dimension
    /// (to be back-filled from an initializer); inner dimensions must always
    /// be present and positive.
    pub(crate) fn compute_array_dims(&mut self, ty: &mut TypeName, allow_dim0_empty: bool) {
        let mut run = 0usize;
        // Move the chain out so constant evaluation can borrow the arenas.
        let mut chain = std::mem::take(&mut ty.chain);
        for node in chain.iter_mut() {
            if let DeclTy::Array { dim_expr, dim, .. } = node {
                run += 1;
                match dim_expr {
                    None => {
                        if run > 1 {
                            self.err_here(
                                DiagKind::Incompleteness,
                                format!(
                                    "size of dimension {} can not be zero, may be miss subscript",
                                    run
                                ),
                            );
                        } else if !allow_dim0_empty {
                            *dim = 1;
                        }
                    }
                    Some(expr) => match crate::frontend::ast::eval_const(expr, &self.tu) {
                        None => {
                            self.err_here(DiagKind::Syntax, "expected constant expression");
                        }
                        Some(v) if v < 0 || v > crate::frontend::layout::MAX_ARRAY_DIM => {
                            self.err_here(
                                DiagKind::Incompleteness,
                                "negative subscript or subscript is too large",
                            );
                        }
                        Some(0) => {
                            self.err_here(
                                DiagKind::Incompleteness,
                                "cannot allocate an array of constant size 0",
                            );
                        }
                        Some(v) => *dim = v as u64,
                    },
                }
            } else {
                run = 0;
            }
        }
        ty.chain = chain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::Parser;

    fn chain_of(source: &str, name: &str) -> Vec<DeclTy> {
        let mut parser = Parser::from_source(source).unwrap();
        parser.parse_translation_unit();
        let tu = parser.finish();
        assert_eq!(tu.diags.error_count(), 0, "errors: {:?}", tu.diags.errors());
        let sym = crate::utils::intern::intern(name);
        let id = tu.find_decl_in_scope(tu.global_scope(), sym).expect("decl not found");
        tu.decl(id).ty.chain.clone()
    }

    fn shape(chain: &[DeclTy]) -> String {
        chain
            .iter()
            .map(|d| match d {
                DeclTy::Id { .. } => "ID".to_string(),
                DeclTy::Pointer { .. } => "PTR".to_string(),
                DeclTy::Array { dim, .. } => format!("ARR({})", dim),
                DeclTy::Fun { .. } => "FUN".to_string(),
                DeclTy::Variadic => "VAR".to_string(),
            })
            .collect::<Vec<_>>()
            .join("->")
    }

    #[test]
    fn test_simple_pointer() {
        assert_eq!(shape(&chain_of("int *a;", "a")), "ID->PTR");
    }

    #[test]
    fn test_pointer_to_array() {
        assert_eq!(shape(&chain_of("int (*q)[30];", "q")), "ID->PTR->ARR(30)");
    }

    #[test]
    fn test_array_of_pointers_to_array() {
        assert_eq!(
            shape(&chain_of("double (*arr[10][40])[20][30];", "arr")),
            "ID->ARR(10)->ARR(40)->PTR->ARR(20)->ARR(30)"
        );
    }

    #[test]
    fn test_function_pointer() {
        let chain = chain_of("int (*fp)(int, char);", "fp");
        assert_eq!(shape(&chain), "ID->PTR->FUN");
        assert!(is_fun_pointer(&chain));
        assert!(is_pointer(&chain));
        assert!(!is_fun_decl(&chain));
    }

    #[test]
    fn test_function_decl() {
        let chain = chain_of("void f(int x);", "f");
        assert_eq!(shape(&chain), "ID->FUN");
        assert!(is_fun_decl(&chain));
        assert!(!is_pointer(&chain));
        assert!(!is_fun_pointer(&chain));
    }

    #[test]
    fn test_predicates_mutually_consistent() {
        let chain = chain_of("int *(*p)[30];", "p");
        assert_eq!(shape(&chain), "ID->PTR->ARR(30)->PTR");
        assert!(is_pointer(&chain));
        assert!(!is_array(&chain));
        assert!(!is_fun_decl(&chain));
        assert!(!is_fun_pointer(&chain));
    }

    #[test]
    fn test_id_only_at_head() {
        for (src, name) in [
            ("int a;", "a"),
            ("int *b[4];", "b"),
            ("char (*c)(void);", "c"),
            ("double (*d[2])[3];", "d"),
        ] {
            let chain = chain_of(src, name);
            assert!(chain[0].is_id());
            assert!(!chain[1..].iter().any(|d| d.is_id()));
        }
    }

    #[test]
    fn test_void_param_collapses() {
        let chain = chain_of("int f(void);", "f");
        match &chain[1] {
            DeclTy::Fun { params, .. } => assert!(params.is_empty()),
            other => panic!("expected FUN, got {:?}", other),
        }
    }

    #[test]
    fn test_variadic_marker_is_last() {
        let chain = chain_of("int printf(char *fmt, ...);", "printf")
            .iter()
            .cloned()
            .collect::<Vec<_>>();
        match &chain[1] {
            DeclTy::Fun { params, .. } => {
                assert_eq!(params.len(), 2);
                assert!(params[1].is_variadic_marker());
            }
            other => panic!("expected FUN, got {:?}", other),
        }
    }
}
