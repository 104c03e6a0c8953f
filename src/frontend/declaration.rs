//! Declaration assembly.
//!
//! Combines a finished specifier with each init-declarator into a complete
//! `Declaration` bound to the current scope: array dimensions are computed,
//! typedef references expanded, struct/union/enum specifiers parsed with the
//! forward-declaration protocol, bit-fields validated, function definitions
//! recognized, and initializers handed to the matcher.

use crate::frontend::ast::{eval_const, Expr, ExprKind};
use crate::frontend::declarator::{canonicalize, is_indirect, DeclTy, TypeName};
use crate::frontend::layout;
use crate::frontend::parser::Parser;
use crate::frontend::scope::{
    Aggr, AggrId, AggrKind, DeclId, EnumDef, EnumItem, ScopeId, TranslationUnit, GLOBAL_SCOPE,
};
use crate::frontend::specifier::{TypeSpec, QUA_MASK, SPEC_ENUM, SPEC_STRUCT, SPEC_UNION, SPEC_VOID, STOR_MASK, STOR_TYPEDEF};
use crate::frontend::token::TokenKind;
use crate::utils::errors::DiagKind;
use crate::utils::intern::{intern, known, resolve, Symbol};
use serde::{Deserialize, Serialize};

/// A complete declaration: specifier + canonical declarator chain plus the
/// bookkeeping the rest of the front-end needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declaration {
    pub ty: TypeName,
    /// Scope the declaration is bound to.
    pub scope: Option<ScopeId>,
    pub line: u32,
    /// Pragma alignment frozen in when the declaration was parsed.
    pub align: u32,
    pub is_bit_field: bool,
    pub bit_len: u32,
    /// Positional index when this declaration is an aggregate field.
    pub field_index: u32,
    pub is_sub_field: bool,
    pub is_fun_def: bool,
    pub is_formal_param: bool,
    /// Initializer tree, when present.
    #[serde(skip)]
    pub init: Option<Expr>,
    /// Function body scope, for definitions.
    pub body: Option<ScopeId>,
}

impl Declaration {
    pub fn new(ty: TypeName, line: u32) -> Self {
        Self {
            ty,
            scope: None,
            line,
            align: 0,
            is_bit_field: false,
            bit_len: 0,
            field_index: 0,
            is_sub_field: false,
            is_fun_def: false,
            is_formal_param: false,
            init: None,
            body: None,
        }
    }

    /// The `...` pseudo-parameter.
    pub fn variadic_marker(line: u32) -> Self {
        Self::new(TypeName::with_chain(TypeSpec::default(), vec![DeclTy::Variadic]), line)
    }

    pub fn is_variadic_marker(&self) -> bool {
        matches!(self.ty.chain.first(), Some(DeclTy::Variadic))
    }

    pub fn name(&self) -> Option<Symbol> {
        self.ty.name()
    }

    pub fn is_pointer(&self) -> bool {
        self.ty.is_pointer()
    }

    pub fn is_array(&self) -> bool {
        self.ty.is_array()
    }

    pub fn is_fun_decl(&self) -> bool {
        self.ty.is_fun_decl()
    }

    pub fn is_initialized(&self) -> bool {
        self.init.is_some()
    }

    /// Parameter list of the first FUN node in the chain.
    pub fn fun_params(&self) -> Option<&[Declaration]> {
        self.ty.chain.iter().find_map(|d| match d {
            DeclTy::Fun { params, .. } => Some(params.as_slice()),
            _ => None,
        })
    }
}

/// Expand a user-type (typedef) reference into its underlying type: clone
/// the typedef's specifier, drop the TYPEDEF storage bit, splice the
/// typedef's operator chain behind this declarator's own operators, and
/// propagate the outer storage/qualifier bits. Expansion is a fixed point:
/// a type that is not a user-type reference comes back structurally equal,
/// minus the TYPEDEF bit.
pub fn expand_user_type(tu: &TranslationUnit, ty: &TypeName) -> TypeName {
    if !ty.spec.is_user_type_ref() {
        let mut out = ty.clone();
        out.spec.clear(STOR_TYPEDEF);
        return out;
    }
    let target = match ty.spec.user_type {
        Some(id) => tu.decl(id),
        None => {
            let mut out = ty.clone();
            out.spec.clear(STOR_TYPEDEF);
            return out;
        }
    };
    let inner = expand_user_type(tu, &target.ty);

    let mut chain: Vec<DeclTy> = Vec::new();
    if let Some(DeclTy::Id { sym }) = ty.chain.first() {
        chain.push(DeclTy::Id { sym: *sym });
    }
    chain.extend(ty.pure().iter().cloned());
    chain.extend(inner.pure().iter().cloned());

    let mut spec = inner.spec.clone();
    spec.clear(STOR_TYPEDEF);
    spec.set(ty.spec.des & (STOR_MASK | QUA_MASK));
    TypeName::with_chain(spec, chain)
}

/// Rewrite a formal parameter the way C passes it: the outermost array
/// dimension decays to a pointer, and a function-typed parameter becomes a
/// function pointer.
pub fn decay_param(decl: &mut Declaration) {
    let chain = &mut decl.ty.chain;
    if let Some(pos) = chain
        .iter()
        .position(|d| !matches!(d, DeclTy::Id { .. } | DeclTy::Variadic))
    {
        match &chain[pos] {
            DeclTy::Array { .. } => {
                chain[pos] = DeclTy::Pointer { qua: 0 };
            }
            DeclTy::Fun { .. } => {
                chain.insert(pos, DeclTy::Pointer { qua: 0 });
            }
            _ => {}
        }
    }
}

impl Parser {
    /// declaration:
    ///     declaration_specifiers init_declarator_list? ';'
    ///
    /// Returns false when the current token cannot begin a declaration.
    /// Also recognizes function definitions (global scope only).
    pub(crate) fn parse_declaration(&mut self) -> bool {
        let Some(mut spec) = self.parse_declaration_specifiers() else {
            return false;
        };
        spec.complement_int();

        // Tag-only declaration: `struct S;`, `enum E { .. };`
        if self.peek_kind() == TokenKind::Semicolon {
            self.advance();
            return true;
        }

        let mut last_was_fun_def = false;
        loop {
            let line = self.line();
            let chain_rev = self.parse_declarator_rev();
            if chain_rev.is_empty() {
                self.err_here(DiagKind::Syntax, "declaration expected identifier");
                self.consume_to_semi();
                return true;
            }
            let chain = canonicalize(chain_rev);
            let mut ty = TypeName::with_chain(spec.clone(), chain);
            // The outermost dimension may stay open; an initializer fixes it.
            self.compute_array_dims(&mut ty, true);

            let mut decl = Declaration::new(ty, line);
            decl.scope = Some(self.cur_scope);
            decl.align = self.alignment;

            if self.consume_if(TokenKind::Equal) {
                let init = self.parse_initializer();
                if matches!(&init.kind, ExprKind::InitList(elems) if elems.is_empty()) {
                    self.tu.diags.warn(line, DiagKind::Initializer, "initial value is empty");
                }
                decl.init = Some(init);
            }

            if decl.ty.spec.is_user_type_ref() {
                decl = self.expand_user_type_decl(decl);
            }

            if decl.is_fun_decl() && !decl.is_initialized() {
                match self.peek_kind() {
                    TokenKind::LBrace => {
                        self.define_function(decl);
                        last_was_fun_def = true;
                    }
                    TokenKind::Semicolon | TokenKind::Comma => {
                        let is_typedef = decl.ty.spec.is_typedef();
                        let id = self.register_decl(decl);
                        if is_typedef {
                            let sc = self.cur_scope;
                            self.tu.scope_mut(sc).typedefs.push(id);
                        }
                    }
                    _ => {
                        self.err_here(
                            DiagKind::Syntax,
                            "illegal function definition/declaration, might be miss ';'",
                        );
                        self.consume_to_semi();
                        return true;
                    }
                }
            } else {
                self.install_object_decl(decl);
            }

            if !self.consume_if(TokenKind::Comma) {
                break;
            }
        }

        if !last_was_fun_def {
            if self.peek_kind() != TokenKind::Semicolon {
                self.err_here(DiagKind::Syntax, "expected ';' after declaration");
                self.consume_to_semi();
            } else {
                self.advance();
            }
        }
        true
    }

    /// Install a non-function declaration: uniqueness, typedef registration,
    /// completeness and bit-field checks, initializer matching, array sizing.
    fn install_object_decl(&mut self, decl: Declaration) {
        let line = decl.line;
        let name = decl.name();

        if let Some(sym) = name {
            if self.tu.find_decl_in_scope(self.cur_scope, sym).is_some() {
                self.tu.diags.err(
                    line,
                    DiagKind::Redefinition,
                    format!("'{}' already defined", resolve(sym)),
                );
                return;
            }
        }

        let is_typedef = decl.ty.spec.is_typedef();
        let id = self.register_decl(decl);
        if is_typedef {
            let sc = self.cur_scope;
            self.tu.scope_mut(sc).typedefs.push(id);
        } else {
            // A typedef may name a still-incomplete aggregate; an object
            // cannot be laid out from one.
            self.check_aggr_complete(id);
        }
        self.check_bitfield(id);

        if self.tu.decl(id).is_initialized() {
            self.match_initializer(id);
        } else if self.tu.decl(id).is_array() {
            self.fix_extern_array_size(id);
            self.check_array_sized(id);
        }
    }

    /// initializer:
    ///     assignment_expression
    ///     '{' initializer_list ','? '}'
    pub(crate) fn parse_initializer(&mut self) -> Expr {
        let span = self.peek().span;
        if self.consume_if(TokenKind::LBrace) {
            let mut elems = Vec::new();
            if self.peek_kind() != TokenKind::RBrace {
                loop {
                    elems.push(self.parse_initializer());
                    if self.consume_if(TokenKind::Comma) {
                        if self.peek_kind() == TokenKind::RBrace {
                            break;
                        }
                        continue;
                    }
                    break;
                }
            }
            self.expect(TokenKind::RBrace, "expected '}'");
            Expr::new(ExprKind::InitList(elems), span)
        } else {
            self.parse_assignment_expr()
        }
    }

    pub(crate) fn register_decl(&mut self, decl: Declaration) -> DeclId {
        let id = self.tu.alloc_decl(decl);
        let sc = self.cur_scope;
        self.tu.scope_mut(sc).decls.push(id);
        id
    }

    /// Expand the typedef reference in a freshly assembled declaration.
    pub(crate) fn expand_user_type_decl(&mut self, decl: Declaration) -> Declaration {
        let expanded = expand_user_type(&self.tu, &decl.ty);
        let mut out = decl;
        out.ty = expanded;
        out.scope = Some(self.cur_scope);
        out.align = self.alignment;
        out
    }

    /// A non-pointer, non-array use of a struct/union requires the
    /// aggregate to be complete.
    fn check_aggr_complete(&mut self, id: DeclId) {
        let decl = self.tu.decl(id);
        if !decl.ty.spec.is_aggr() || decl.is_pointer() || decl.is_array() {
            return;
        }
        let Some(aggr_id) = decl.ty.spec.aggr else { return };
        if self.tu.aggr(aggr_id).is_complete {
            return;
        }
        let aggr = self.tu.aggr(aggr_id);
        let kind = aggr.kind.name();
        let tag = aggr.tag.map(resolve).unwrap_or_default();
        let line = decl.line;
        let msg = match decl.name() {
            Some(sym) => format!(
                "'{}' uses incomplete defined {} '{}'",
                resolve(sym),
                kind,
                tag
            ),
            None => format!("uses incomplete defined {} without name", kind),
        };
        self.tu.diags.err(line, DiagKind::Incompleteness, msg);
    }

    /// Bit-fields are only legal on integer scalar fields.
    fn check_bitfield(&mut self, id: DeclId) {
        let decl = self.tu.decl(id);
        if !decl.is_bit_field {
            return;
        }
        let line = decl.line;
        if decl.is_pointer() {
            self.tu.diags.err(
                line,
                DiagKind::Typing,
                "pointer type can not assign bit length",
            );
            return;
        }
        if !decl.ty.is_integer_scalar() {
            self.tu
                .diags
                .err(line, DiagKind::Typing, "bit field must have integer type");
            return;
        }
        let bits = layout::scalar_bit_size(decl.ty.spec.des);
        if decl.bit_len as u64 > bits as u64 {
            self.tu.diags.err(
                line,
                DiagKind::Typing,
                "type of bit field too small for number of bits",
            );
        }
    }

    /// Extern arrays with an open outermost dimension are sized as one
    /// element.
    fn fix_extern_array_size(&mut self, id: DeclId) {
        if !self.tu.decl(id).ty.spec.is_extern() {
            return;
        }
        let decl = self.tu.decl_mut(id);
        for node in decl.ty.chain.iter_mut() {
            match node {
                DeclTy::Id { .. } => continue,
                DeclTy::Array { dim, .. } => {
                    if *dim == 0 {
                        *dim = 1;
                    }
                }
                _ => break,
            }
        }
    }

    /// A non-extern array without an initializer must have a known
    /// outermost dimension.
    fn check_array_sized(&mut self, id: DeclId) {
        let decl = self.tu.decl(id);
        if decl.ty.spec.is_extern() || decl.is_formal_param {
            return;
        }
        let open = decl.ty.pure().iter().find_map(|d| match d {
            DeclTy::Array { dim, .. } => Some(*dim == 0),
            _ => None,
        });
        if open == Some(true) {
            let line = decl.line;
            self.tu.diags.err(
                line,
                DiagKind::Incompleteness,
                "size of dimension 0 can not be zero, may be miss subscript",
            );
        }
    }

    /// Function definition: `declarator compound_stmt`. Only at global
    /// scope; the declaration is registered before the body is parsed so
    /// recursive calls resolve.
    fn define_function(&mut self, decl: Declaration) {
        let line = decl.line;
        if self.tu.scope(self.cur_scope).level != GLOBAL_SCOPE {
            self.tu.diags.err(
                line,
                DiagKind::Syntax,
                "miss ';' before '{' , function define should at global scope",
            );
        }

        if let Some(sym) = decl.name() {
            let dup = self
                .tu
                .scope(self.cur_scope)
                .decls
                .iter()
                .any(|&d| self.tu.decl(d).name() == Some(sym) && self.tu.decl(d).is_fun_def);
            if dup {
                self.tu.diags.err(
                    line,
                    DiagKind::Redefinition,
                    format!("function '{}' already defined", resolve(sym)),
                );
            }
        }

        let params: Vec<Declaration> = decl.fun_params().map(|p| p.to_vec()).unwrap_or_default();
        for p in &params {
            if !p.is_variadic_marker() && p.name().is_none() {
                self.tu.diags.err(
                    line,
                    DiagKind::Syntax,
                    "expected formal parameter list, not a type list",
                );
                break;
            }
        }

        let id = self.register_decl(decl);
        let body = self.parse_compound_stmt(&params);
        {
            let d = self.tu.decl_mut(id);
            d.body = Some(body);
            d.is_fun_def = true;
        }
        self.check_fun_return_type(id);
        self.check_labels(body);
    }

    /// A function may not return a function or an array.
    fn check_fun_return_type(&mut self, id: DeclId) {
        let decl = self.tu.decl(id);
        let line = decl.line;
        let mut bad: Option<&'static str> = None;
        let pure = decl.ty.pure();
        for (i, node) in pure.iter().enumerate() {
            if let DeclTy::Fun { .. } = node {
                match pure.get(i + 1) {
                    Some(DeclTy::Fun { .. }) => {
                        bad = Some("return value type of function can not be a function");
                        break;
                    }
                    Some(DeclTy::Array { .. }) => {
                        bad = Some("return value type of function can not be an array");
                        break;
                    }
                    _ => {}
                }
            }
        }
        if let Some(msg) = bad {
            self.tu.diags.err(line, DiagKind::Typing, msg);
        }
    }

    /// Resolve goto references against label definitions at function close.
    pub(crate) fn check_labels(&mut self, body: ScopeId) {
        let refs = self.tu.scope(body).label_refs.clone();
        for (name, line) in refs {
            let mut resolved = false;
            for def in self.tu.scope_mut(body).label_defs.iter_mut() {
                if def.name == name {
                    def.used = true;
                    resolved = true;
                    break;
                }
            }
            if !resolved {
                self.tu.diags.err(
                    line,
                    DiagKind::Lookup,
                    format!("label '{}' was undefined", resolve(name)),
                );
            }
        }
        let unused: Vec<(Symbol, u32)> = self
            .tu
            .scope(body)
            .label_defs
            .iter()
            .filter(|l| !l.used)
            .map(|l| (l.name, l.line))
            .collect();
        for (name, line) in unused {
            self.tu.diags.warn(
                line,
                DiagKind::Lookup,
                format!("'{}' unreferenced label", resolve(name)),
            );
        }
    }

    /// struct/union specifier: tag reference, forward declaration, or
    /// definition body. The pragma alignment in effect is frozen into the
    /// aggregate.
    pub(crate) fn parse_aggr_spec(&mut self, mut spec: TypeSpec, is_struct: bool) -> TypeSpec {
        let line = self.line();
        self.advance(); // struct / union
        let kind = if is_struct { AggrKind::Struct } else { AggrKind::Union };
        spec.set(if is_struct { SPEC_STRUCT } else { SPEC_UNION });
        if spec.check_legality().is_err() {
            self.tu.diags.err(line, DiagKind::Specifier, "type specifier is illegal");
            return spec;
        }

        let frozen_align = self.alignment;
        let pack_align = if self.explicit_align { self.alignment } else { 0 };
        let mut aggr_id: Option<AggrId> = None;

        if self.peek_kind() == TokenKind::Identifier {
            let tag = intern(&self.peek().lexeme);
            self.advance();
            // Forward declaration protocol: reuse the registered aggregate
            // if the tag is visible, otherwise register an incomplete one
            // in the current scope.
            aggr_id = self.tu.find_aggr_in_outer(self.cur_scope, tag, kind);
            if aggr_id.is_none() {
                let id = self.tu.alloc_aggr(Aggr {
                    kind,
                    tag: Some(tag),
                    scope: self.cur_scope,
                    fields: Vec::new(),
                    is_complete: false,
                    align: frozen_align,
                    field_align: 0,
                    pack_align,
                });
                let sc = self.cur_scope;
                match kind {
                    AggrKind::Struct => self.tu.scope_mut(sc).structs.push(id),
                    AggrKind::Union => self.tu.scope_mut(sc).unions.push(id),
                }
                aggr_id = Some(id);
            }
        }

        if self.peek_kind() == TokenKind::LBrace {
            let id = aggr_id.unwrap_or_else(|| {
                // Anonymous aggregate: never registered in the tag list, so
                // it cannot be found by name.
                self.tu.alloc_aggr(Aggr {
                    kind,
                    tag: None,
                    scope: self.cur_scope,
                    fields: Vec::new(),
                    is_complete: false,
                    align: frozen_align,
                    field_align: 0,
                    pack_align,
                })
            });
            if self.tu.aggr(id).is_complete {
                let tag = self.tu.aggr(id).tag.map(resolve).unwrap_or_default();
                self.tu.diags.err(
                    self.line(),
                    DiagKind::Redefinition,
                    format!("{} '{}' redefined", kind.name(), tag),
                );
                // Consume the duplicate body into a throwaway aggregate so
                // parsing can continue past it.
                let scratch = self.tu.alloc_aggr(Aggr {
                    kind,
                    tag: None,
                    scope: self.cur_scope,
                    fields: Vec::new(),
                    is_complete: false,
                    align: frozen_align,
                    field_align: 0,
                    pack_align,
                });
                self.parse_aggr_body(scratch);
            } else {
                self.parse_aggr_body(id);
            }
            aggr_id = Some(id);
        }

        match aggr_id {
            Some(id) => {
                self.tu.aggr_mut(id).align = frozen_align;
                spec.aggr = Some(id);
            }
            None => {
                let tok = self.peek().lexeme.clone();
                self.tu
                    .diags
                    .err(self.line(), DiagKind::Syntax, format!("illegal use '{}'", tok));
            }
        }
        spec
    }

    /// `{ struct-declaration-list }` — fields are parsed in their own scope
    /// and then numbered into the aggregate. An empty body is rewritten to
    /// hold one synthetic byte-sized field.
    fn parse_aggr_body(&mut self, id: AggrId) {
        self.advance(); // '{'
        self.push_scope(false);
        while self.peek_kind() != TokenKind::RBrace
            && self.peek_kind() != TokenKind::Eof
            && !self.tu.diags.too_many_errors()
        {
            self.parse_struct_declaration();
        }
        let mut fields = self.tu.scope(self.cur_scope).decls.clone();
        if fields.is_empty() {
            let mut placeholder = Declaration::new(
                TypeName::with_chain(
                    TypeSpec::new(SPEC_VOID),
                    vec![DeclTy::Id { sym: *known::PLACEHOLDER_FIELD }],
                ),
                self.line(),
            );
            placeholder.scope = Some(self.cur_scope);
            fields.push(self.tu.alloc_decl(placeholder));
        }
        self.pop_scope();

        for (i, &f) in fields.iter().enumerate() {
            let d = self.tu.decl_mut(f);
            d.field_index = i as u32;
            d.is_sub_field = true;
        }

        let closed = self.peek_kind() == TokenKind::RBrace;
        if closed {
            self.advance();
        } else {
            self.err_here(
                DiagKind::Syntax,
                format!("expected '}}' after {} definition", self.tu.aggr(id).kind.name()),
            );
            return;
        }
        let aggr = self.tu.aggr_mut(id);
        aggr.fields = fields;
        aggr.is_complete = true;
    }

    /// struct_declaration: specifier_qualifier_list struct_declarator_list ';'
    fn parse_struct_declaration(&mut self) {
        let Some(spec) = self.parse_specifier_qualifier_list() else {
            self.err_here(
                DiagKind::Syntax,
                "miss qualifier, illegal member declaration of struct",
            );
            self.consume_to_semi();
            return;
        };

        if self.peek_kind() == TokenKind::Semicolon {
            // Tag or anonymous aggregate without a declarator.
            self.advance();
            return;
        }

        loop {
            self.parse_struct_declarator(&spec);
            if !self.consume_if(TokenKind::Comma) {
                break;
            }
        }
        if self.peek_kind() != TokenKind::Semicolon {
            self.err_here(DiagKind::Syntax, "expected ';' after struct declaration");
            self.consume_to_semi();
        } else {
            self.advance();
        }
    }

    /// struct_declarator: declarator (':' const-expr)? | ':' const-expr
    fn parse_struct_declarator(&mut self, spec: &TypeSpec) {
        let line = self.line();

        // Unnamed bit-field: `int : 3;`
        if self.consume_if(TokenKind::Colon) {
            let width = self.parse_bitfield_width();
            let mut decl = Declaration::new(TypeName::new(spec.clone()), line);
            decl.is_bit_field = true;
            decl.bit_len = width;
            decl.scope = Some(self.cur_scope);
            decl.align = self.alignment;
            let id = self.register_decl(decl);
            self.check_bitfield(id);
            return;
        }

        let chain_rev = self.parse_declarator_rev();
        if chain_rev.is_empty() {
            self.err_here(DiagKind::Syntax, "declaration expected identifier");
            return;
        }
        let chain = canonicalize(chain_rev);
        let mut ty = TypeName::with_chain(spec.clone(), chain);
        self.compute_array_dims(&mut ty, true);

        let mut decl = Declaration::new(ty, line);
        decl.scope = Some(self.cur_scope);
        decl.align = self.alignment;

        if spec.is_typedef() {
            self.tu.diags.err(
                line,
                DiagKind::Specifier,
                "illegal storage class, should not use typedef in struct/union declaration",
            );
            return;
        }

        if self.peek_kind() == TokenKind::Colon {
            if is_indirect(&decl.ty.chain) {
                let name = decl.name().map(resolve).unwrap_or_default();
                self.err_here(
                    DiagKind::Typing,
                    format!("'{}' : pointer type cannot assign bit length", name),
                );
                return;
            }
            self.advance();
            decl.bit_len = self.parse_bitfield_width();
            decl.is_bit_field = true;
        }

        if decl.ty.spec.is_user_type_ref() {
            decl = self.expand_user_type_decl(decl);
        }

        if let Some(sym) = decl.name() {
            if self.tu.find_decl_in_scope(self.cur_scope, sym).is_some() {
                self.tu.diags.err(
                    line,
                    DiagKind::Redefinition,
                    format!("'{}' already defined", resolve(sym)),
                );
                return;
            }
        }
        let id = self.register_decl(decl);
        self.check_aggr_complete(id);
        self.check_bitfield(id);
    }

    fn parse_bitfield_width(&mut self) -> u32 {
        let expr = self.parse_conditional_expr();
        match eval_const(&expr, &self.tu) {
            Some(v) if v >= 0 => v as u32,
            Some(_) => {
                self.err_here(DiagKind::Typing, "bit field width can not be negative");
                0
            }
            None => {
                self.err_here(DiagKind::Syntax, "expected constant expression");
                0
            }
        }
    }

    /// enum_specifier:
    ///     enum identifier? ('{' enumerator_list '}')?
    pub(crate) fn parse_enum_spec(&mut self, mut spec: TypeSpec) -> TypeSpec {
        let line = self.line();
        self.advance(); // enum
        spec.set(SPEC_ENUM);
        if spec.check_legality().is_err() {
            self.tu.diags.err(line, DiagKind::Specifier, "type specifier is illegal");
            return spec;
        }

        let mut name: Option<Symbol> = None;
        if self.peek_kind() == TokenKind::Identifier {
            name = Some(intern(&self.peek().lexeme));
            self.advance();
        }

        if self.peek_kind() == TokenKind::LBrace {
            self.advance();
            if let Some(n) = name {
                if self.tu.find_enum_tag_in_outer(self.cur_scope, n).is_some() {
                    self.tu.diags.err(
                        line,
                        DiagKind::Redefinition,
                        format!("'{}' : enum type redefinition", resolve(n)),
                    );
                }
            }
            let mut edef = EnumDef { name, items: Vec::new() };
            while self.peek_kind() == TokenKind::Identifier {
                let iline = self.line();
                let iname = intern(&self.peek().lexeme);
                self.advance();
                if self.tu.find_enum_const_in_scope(self.cur_scope, iname).is_some()
                    || edef.items.iter().any(|i| i.name == iname)
                {
                    self.tu.diags.err(
                        iline,
                        DiagKind::Redefinition,
                        format!("'{}' : redefinition , different basic type", resolve(iname)),
                    );
                }
                let (value, explicit) = if self.consume_if(TokenKind::Equal) {
                    let expr = self.parse_conditional_expr();
                    match eval_const(&expr, &self.tu) {
                        Some(v) => (v, true),
                        None => {
                            self.err_here(DiagKind::Syntax, "expected constant expression");
                            (0, false)
                        }
                    }
                } else {
                    (0, false)
                };
                edef.items.push(EnumItem { name: iname, value, explicit });
                if !self.consume_if(TokenKind::Comma) {
                    break;
                }
            }
            if !self.expect(TokenKind::RBrace, "miss '}' during enum type declaring") {
                return spec;
            }
            edef.backfill_values();
            let id = self.tu.alloc_enum(edef);
            let sc = self.cur_scope;
            self.tu.scope_mut(sc).enums.push(id);
            spec.enum_id = Some(id);
        } else if let Some(n) = name {
            match self.tu.find_enum_tag_in_outer(self.cur_scope, n) {
                Some(id) => spec.enum_id = Some(id),
                None => {
                    // Reference to a not-yet-defined enum tag; keep an empty
                    // placeholder so the specifier stays usable.
                    let id = self.tu.alloc_enum(EnumDef { name: Some(n), items: Vec::new() });
                    spec.enum_id = Some(id);
                }
            }
        }
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::Parser;
    use crate::frontend::specifier::{SPEC_INT, STOR_REGISTER};

    fn parse_tu(source: &str) -> TranslationUnit {
        let mut parser = Parser::from_source(source).unwrap();
        parser.parse_translation_unit();
        parser.finish()
    }

    fn global_decl(tu: &TranslationUnit, name: &str) -> DeclId {
        let sym = intern(name);
        tu.find_decl_in_scope(tu.global_scope(), sym).expect("decl not found")
    }

    #[test]
    fn test_typedef_expansion() {
        let tu = parse_tu("typedef int *INTP; INTP x;");
        assert_eq!(tu.diags.error_count(), 0, "{:?}", tu.diags.errors());
        let x = tu.decl(global_decl(&tu, "x"));
        assert!(x.ty.spec.has(SPEC_INT));
        assert!(!x.ty.spec.is_typedef());
        assert!(x.is_pointer());
        assert_eq!(x.ty.pure().len(), 1);
    }

    #[test]
    fn test_typedef_expansion_is_fixed_point() {
        let tu = parse_tu("typedef int *INTP; INTP x;");
        let x = tu.decl(global_decl(&tu, "x"));
        let once = expand_user_type(&tu, &x.ty);
        let twice = expand_user_type(&tu, &once);
        assert_eq!(once.spec.des, twice.spec.des);
        assert_eq!(once.chain.len(), twice.chain.len());
    }

    #[test]
    fn test_typedef_of_array_combines_with_pointer() {
        let tu = parse_tu("typedef int A10[10]; A10 *p;");
        assert_eq!(tu.diags.error_count(), 0, "{:?}", tu.diags.errors());
        let p = tu.decl(global_decl(&tu, "p"));
        // ID -> POINTER -> ARRAY(10): pointer to array of 10 int
        assert!(p.is_pointer());
        assert!(matches!(p.ty.pure()[1], DeclTy::Array { dim: 10, .. }));
    }

    #[test]
    fn test_redefinition_reported() {
        let tu = parse_tu("int x; char x;");
        assert!(tu.diags.has_error_kind(DiagKind::Redefinition));
    }

    #[test]
    fn test_incomplete_struct_value_rejected() {
        let tu = parse_tu("struct S; struct S s;");
        assert!(tu.diags.has_error_kind(DiagKind::Incompleteness));
    }

    #[test]
    fn test_incomplete_struct_pointer_ok() {
        let tu = parse_tu("struct S; struct S *p;");
        assert_eq!(tu.diags.error_count(), 0, "{:?}", tu.diags.errors());
    }

    #[test]
    fn test_struct_completion_backfills() {
        let tu = parse_tu("struct L; struct L *p; struct L { int v; };");
        assert_eq!(tu.diags.error_count(), 0, "{:?}", tu.diags.errors());
        let sym = intern("L");
        let id = tu.find_struct_in_outer(tu.global_scope(), sym).unwrap();
        assert!(tu.aggr(id).is_complete);
        assert_eq!(tu.aggr(id).fields.len(), 1);
    }

    #[test]
    fn test_struct_redefinition() {
        let tu = parse_tu("struct S { int a; }; struct S { int b; };");
        assert!(tu.diags.has_error_kind(DiagKind::Redefinition));
    }

    #[test]
    fn test_empty_struct_gets_placeholder() {
        let tu = parse_tu("struct E {} e;");
        let sym = intern("E");
        let id = tu.find_struct_in_outer(tu.global_scope(), sym).unwrap();
        let aggr = tu.aggr(id);
        assert!(aggr.is_complete);
        assert_eq!(aggr.fields.len(), 1);
        assert_eq!(tu.decl(aggr.fields[0]).name(), Some(*known::PLACEHOLDER_FIELD));
    }

    #[test]
    fn test_enum_values_backfill() {
        let tu = parse_tu("enum E { A, B = 5, C };");
        assert_eq!(tu.diags.error_count(), 0, "{:?}", tu.diags.errors());
        let sym = intern("E");
        let id = tu.find_enum_tag_in_outer(tu.global_scope(), sym).unwrap();
        let vals: Vec<i64> = tu.enum_def(id).items.iter().map(|i| i.value).collect();
        assert_eq!(vals, vec![0, 5, 6]);
    }

    #[test]
    fn test_enum_const_redefinition() {
        let tu = parse_tu("enum E1 { A }; enum E2 { A };");
        assert!(tu.diags.has_error_kind(DiagKind::Redefinition));
    }

    #[test]
    fn test_bitfield_on_pointer_rejected() {
        let tu = parse_tu("struct S { int *p : 3; };");
        assert!(tu.diags.has_error_kind(DiagKind::Typing));
    }

    #[test]
    fn test_bitfield_too_wide_rejected() {
        let tu = parse_tu("struct S { int a : 40; };");
        assert!(tu.diags.has_error_kind(DiagKind::Typing));
    }

    #[test]
    fn test_register_implies_int() {
        let tu = parse_tu("register x;");
        let x = tu.decl(global_decl(&tu, "x"));
        assert!(x.ty.spec.has(SPEC_INT));
        assert!(x.ty.spec.has(STOR_REGISTER));
    }

    #[test]
    fn test_function_def_only_at_global_scope() {
        let tu = parse_tu("void f(void) { int g(void) { return 1; } }");
        assert!(tu.diags.error_count() > 0);
    }

    #[test]
    fn test_named_void_param_rejected() {
        let tu = parse_tu("int f(void x);");
        assert!(tu.diags.has_error_kind(DiagKind::Incompleteness));
    }

    #[test]
    fn test_void_pointer_param_ok() {
        let tu = parse_tu("int f(void *p);");
        assert_eq!(tu.diags.error_count(), 0, "{:?}", tu.diags.errors());
    }

    #[test]
    fn test_decay_param_array() {
        let tu = parse_tu("void foo(char p[][20]) { }");
        assert_eq!(tu.diags.error_count(), 0, "{:?}", tu.diags.errors());
        let f = tu.decl(global_decl(&tu, "foo"));
        let body = f.body.unwrap();
        let p = tu.find_decl_in_scope(body, intern("p")).unwrap();
        let p = tu.decl(p);
        assert!(p.is_pointer());
        // pointer to array of 20 char
        assert!(matches!(p.ty.pure()[1], DeclTy::Array { dim: 20, .. }));
    }

    #[test]
    fn test_extern_array_sized_one() {
        let tu = parse_tu("extern int tab[];");
        assert_eq!(tu.diags.error_count(), 0, "{:?}", tu.diags.errors());
        let t = tu.decl(global_decl(&tu, "tab"));
        assert!(matches!(t.ty.pure()[0], DeclTy::Array { dim: 1, .. }));
    }

    #[test]
    fn test_unsized_array_without_init_rejected() {
        let tu = parse_tu("int a[];");
        assert!(tu.diags.has_error_kind(DiagKind::Incompleteness));
    }

    #[test]
    fn test_label_checks() {
        let tu = parse_tu("void f(void) { goto done; done: ; }");
        assert_eq!(tu.diags.error_count(), 0, "{:?}", tu.diags.errors());

        let tu = parse_tu("void f(void) { goto missing; }");
        assert!(tu.diags.has_error_kind(DiagKind::Lookup));

        let tu = parse_tu("void f(void) { unused: ; }");
        assert_eq!(tu.diags.warning_count(), 1);
    }
}
