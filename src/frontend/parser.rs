//! Recursive descent parser.
//!
//! The `Parser` owns the token buffer and the translation-unit arenas; the
//! current scope is an ordinary field, threaded through push/pop, not a
//! global. Declaration parsing lives in `specifier.rs`, `declarator.rs`,
//! and `declaration.rs`; this module drives the top level and supplies the
//! statement and expression grammars.
//!
//! Error recovery is per statement/declaration: a malformed construct
//! consumes tokens up to and including the next `;`, and the outer loops
//! short-circuit once the diagnostic budget is exhausted.

use crate::frontend::ast::{
    AssignOp, BinaryOp, Expr, ExprKind, FpKind, ImmKind, IncDecOp, Stmt, StmtKind, UnaryOp,
};
use crate::frontend::declaration::{decay_param, Declaration};
use crate::frontend::layout::DEFAULT_ALIGN;
use crate::frontend::lexer::Lexer;
use crate::frontend::scope::{LabelInfo, ScopeId, TranslationUnit};
use crate::frontend::token::{Token, TokenKind};
use crate::utils::errors::{DiagKind, FrontendError};
use crate::utils::intern::intern;

/// Parser state for one translation unit.
pub struct Parser {
    tokens: Vec<Token>,
    pub(crate) pos: usize,
    pub tu: TranslationUnit,
    pub(crate) cur_scope: ScopeId,
    /// Current `#pragma align` value, frozen into each declaration.
    pub(crate) alignment: u32,
    /// True once an explicit pragma has been seen.
    pub(crate) explicit_align: bool,
}

impl Parser {
    /// Lex `source` and build a parser over it.
    pub fn from_source(source: &str) -> Result<Self, FrontendError> {
        let tokens = Lexer::new(source).tokenize()?;
        let tu = TranslationUnit::new();
        let cur_scope = tu.global_scope();
        Ok(Self {
            tokens,
            pos: 0,
            tu,
            cur_scope,
            alignment: DEFAULT_ALIGN,
            explicit_align: false,
        })
    }

    /// Hand back the finished translation unit.
    pub fn finish(self) -> TranslationUnit {
        self.tu
    }

    // ----- token plumbing -----

    pub(crate) fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or_else(|| self.tokens.last().unwrap())
    }

    pub(crate) fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    pub(crate) fn peek_ahead(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    pub(crate) fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    pub(crate) fn consume_if(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume `kind` or report `msg`. Returns whether it matched.
    pub(crate) fn expect(&mut self, kind: TokenKind, msg: impl Into<String>) -> bool {
        if self.consume_if(kind) {
            true
        } else {
            self.err_here(DiagKind::Syntax, msg);
            false
        }
    }

    pub(crate) fn line(&self) -> u32 {
        self.peek().span.line()
    }

    pub(crate) fn err_here(&mut self, kind: DiagKind, msg: impl Into<String>) {
        let line = self.line();
        self.tu.diags.err(line, kind, msg);
    }

    /// Recovery: skip to and through the next `;`.
    pub(crate) fn consume_to_semi(&mut self) {
        while !matches!(self.peek_kind(), TokenKind::Semicolon | TokenKind::Eof) {
            self.advance();
        }
        self.consume_if(TokenKind::Semicolon);
    }

    /// Fold any pending `#pragma align (N)` tokens into the parser state.
    fn consume_pragmas(&mut self) {
        while self.peek_kind() == TokenKind::PragmaAlign {
            if let Ok(v) = self.peek().lexeme.parse::<u32>() {
                if v > 0 {
                    self.alignment = v;
                    self.explicit_align = true;
                }
            }
            self.advance();
        }
    }

    // ----- scope stack -----

    pub(crate) fn push_scope(&mut self, transient: bool) {
        self.cur_scope = self.tu.alloc_scope(self.cur_scope, transient);
    }

    pub(crate) fn pop_scope(&mut self) {
        self.cur_scope = self
            .tu
            .scope(self.cur_scope)
            .parent
            .unwrap_or_else(|| self.tu.global_scope());
    }

    // ----- top level -----

    /// Parse every top-level declaration until end of file.
    pub fn parse_translation_unit(&mut self) {
        loop {
            self.consume_pragmas();
            if self.peek_kind() == TokenKind::Eof || self.tu.diags.too_many_errors() {
                break;
            }
            if self.consume_if(TokenKind::Semicolon) {
                continue;
            }
            let before = self.pos;
            if !self.parse_declaration() {
                let tok = self.peek().lexeme.clone();
                self.err_here(DiagKind::Syntax, format!("syntax error : '{}'", tok));
                self.consume_to_semi();
            }
            if self.pos == before {
                self.advance();
            }
        }
        self.cur_scope = self.tu.global_scope();
    }

    /// True when the current token can start a declaration in a block:
    /// specifier keywords, or an identifier naming a visible typedef.
    fn is_declaration_start(&self) -> bool {
        let tok = self.peek();
        if tok.kind.is_specifier_start() {
            return true;
        }
        if tok.kind == TokenKind::Identifier {
            let sym = intern(&tok.lexeme);
            return self.tu.find_typedef_in_outer(self.cur_scope, sym).is_some();
        }
        false
    }

    // ----- statements -----

    /// compound_stmt: `{ declaration* statement* }` in a fresh scope.
    /// `params` are bound into the scope first (arrays and function types
    /// decayed to pointers).
    pub(crate) fn parse_compound_stmt(&mut self, params: &[Declaration]) -> ScopeId {
        self.expect(TokenKind::LBrace, "expected '{'");
        self.push_scope(false);
        let scope = self.cur_scope;

        for p in params {
            if p.is_variadic_marker() {
                continue;
            }
            let mut d = p.clone();
            decay_param(&mut d);
            d.is_formal_param = true;
            d.scope = Some(scope);
            self.register_decl(d);
        }

        let mut stmts = Vec::new();
        loop {
            self.consume_pragmas();
            match self.peek_kind() {
                TokenKind::RBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    self.err_here(DiagKind::Syntax, "expected '}'");
                    break;
                }
                _ if self.tu.diags.too_many_errors() => break,
                _ => {
                    let before = self.pos;
                    if self.is_declaration_start() {
                        self.parse_declaration();
                    } else {
                        stmts.push(self.parse_stmt());
                    }
                    if self.pos == before {
                        self.advance();
                    }
                }
            }
        }
        self.tu.scope_mut(scope).stmts = stmts;
        self.pop_scope();
        scope
    }

    fn parse_stmt(&mut self) -> Stmt {
        let line = self.line();
        match self.peek_kind() {
            TokenKind::LBrace => {
                let scope = self.parse_compound_stmt(&[]);
                Stmt::new(StmtKind::Compound(scope), line)
            }
            TokenKind::If => {
                self.advance();
                self.expect(TokenKind::LParen, "expected '(' after if");
                let cond = self.parse_expr();
                self.expect(TokenKind::RParen, "miss ')'");
                let then_stmt = Box::new(self.parse_stmt());
                let else_stmt = if self.consume_if(TokenKind::Else) {
                    Some(Box::new(self.parse_stmt()))
                } else {
                    None
                };
                Stmt::new(StmtKind::If { cond, then_stmt, else_stmt }, line)
            }
            TokenKind::While => {
                self.advance();
                self.expect(TokenKind::LParen, "expected '(' after while");
                let cond = self.parse_expr();
                self.expect(TokenKind::RParen, "miss ')'");
                let body = Box::new(self.parse_stmt());
                Stmt::new(StmtKind::While { cond, body }, line)
            }
            TokenKind::Do => {
                self.advance();
                let body = Box::new(self.parse_stmt());
                self.expect(TokenKind::While, "expected 'while' after do body");
                self.expect(TokenKind::LParen, "expected '('");
                let cond = self.parse_expr();
                self.expect(TokenKind::RParen, "miss ')'");
                self.expect(TokenKind::Semicolon, "miss ';'");
                Stmt::new(StmtKind::DoWhile { body, cond }, line)
            }
            TokenKind::For => {
                self.advance();
                self.expect(TokenKind::LParen, "expected '(' after for");
                let init = if self.peek_kind() == TokenKind::Semicolon {
                    None
                } else {
                    Some(self.parse_expr())
                };
                self.expect(TokenKind::Semicolon, "miss ';'");
                let cond = if self.peek_kind() == TokenKind::Semicolon {
                    None
                } else {
                    Some(self.parse_expr())
                };
                self.expect(TokenKind::Semicolon, "miss ';'");
                let step = if self.peek_kind() == TokenKind::RParen {
                    None
                } else {
                    Some(self.parse_expr())
                };
                self.expect(TokenKind::RParen, "miss ')'");
                let body = Box::new(self.parse_stmt());
                Stmt::new(StmtKind::For { init, cond, step, body }, line)
            }
            TokenKind::Switch => {
                self.advance();
                self.expect(TokenKind::LParen, "expected '(' after switch");
                let cond = self.parse_expr();
                self.expect(TokenKind::RParen, "miss ')'");
                let body = Box::new(self.parse_stmt());
                Stmt::new(StmtKind::Switch { cond, body }, line)
            }
            TokenKind::Case => {
                self.advance();
                let expr = self.parse_conditional_expr();
                let value = match crate::frontend::ast::eval_const(&expr, &self.tu) {
                    Some(v) => v,
                    None => {
                        self.err_here(DiagKind::Syntax, "expected constant expression");
                        0
                    }
                };
                self.expect(TokenKind::Colon, "expected ':' after case");
                Stmt::new(StmtKind::Case(value), line)
            }
            TokenKind::Default => {
                self.advance();
                self.expect(TokenKind::Colon, "expected ':' after default");
                Stmt::new(StmtKind::Default, line)
            }
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Semicolon, "miss ';'");
                Stmt::new(StmtKind::Break, line)
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(TokenKind::Semicolon, "miss ';'");
                Stmt::new(StmtKind::Continue, line)
            }
            TokenKind::Goto => {
                self.advance();
                if self.peek_kind() == TokenKind::Identifier {
                    let sym = intern(&self.peek().lexeme);
                    self.advance();
                    if let Some(fscope) = self.tu.function_scope_of(self.cur_scope) {
                        self.tu.scope_mut(fscope).label_refs.push((sym, line));
                    }
                    self.expect(TokenKind::Semicolon, "miss ';'");
                    Stmt::new(StmtKind::Goto(sym), line)
                } else {
                    self.err_here(DiagKind::Syntax, "expected label after goto");
                    self.consume_to_semi();
                    Stmt::new(StmtKind::Empty, line)
                }
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.peek_kind() == TokenKind::Semicolon {
                    None
                } else {
                    Some(self.parse_expr())
                };
                self.expect(TokenKind::Semicolon, "miss ';'");
                Stmt::new(StmtKind::Return(value), line)
            }
            TokenKind::Semicolon => {
                self.advance();
                Stmt::new(StmtKind::Empty, line)
            }
            TokenKind::Identifier if self.peek_ahead(1) == TokenKind::Colon => {
                let sym = intern(&self.peek().lexeme);
                self.advance();
                self.advance();
                if let Some(fscope) = self.tu.function_scope_of(self.cur_scope) {
                    self.tu
                        .scope_mut(fscope)
                        .label_defs
                        .push(LabelInfo { name: sym, line, used: false });
                }
                Stmt::new(StmtKind::Label(sym), line)
            }
            _ => {
                let expr = self.parse_expr();
                if self.peek_kind() != TokenKind::Semicolon {
                    self.err_here(DiagKind::Syntax, "miss ';'");
                    self.consume_to_semi();
                } else {
                    self.advance();
                }
                Stmt::new(StmtKind::Expr(expr), line)
            }
        }
    }

    // ----- expressions -----

    /// expression: assignment (',' assignment)*
    pub(crate) fn parse_expr(&mut self) -> Expr {
        let mut lhs = self.parse_assignment_expr();
        while self.consume_if(TokenKind::Comma) {
            let rhs = self.parse_assignment_expr();
            let span = lhs.span.merge(&rhs.span);
            lhs = Expr::new(
                ExprKind::Binary { op: BinaryOp::Comma, lhs: Box::new(lhs), rhs: Box::new(rhs) },
                span,
            );
        }
        lhs
    }

    pub(crate) fn parse_assignment_expr(&mut self) -> Expr {
        let lhs = self.parse_conditional_expr();
        let op = match self.peek_kind() {
            TokenKind::Equal => Some(AssignOp::Assign),
            TokenKind::StarEqual => Some(AssignOp::MulAssign),
            TokenKind::SlashEqual => Some(AssignOp::DivAssign),
            TokenKind::PercentEqual => Some(AssignOp::ModAssign),
            TokenKind::PlusEqual => Some(AssignOp::AddAssign),
            TokenKind::MinusEqual => Some(AssignOp::SubAssign),
            TokenKind::ShlEqual => Some(AssignOp::ShlAssign),
            TokenKind::ShrEqual => Some(AssignOp::ShrAssign),
            TokenKind::AmpEqual => Some(AssignOp::AndAssign),
            TokenKind::CaretEqual => Some(AssignOp::XorAssign),
            TokenKind::PipeEqual => Some(AssignOp::OrAssign),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let rhs = self.parse_assignment_expr();
                let span = lhs.span.merge(&rhs.span);
                Expr::new(ExprKind::Assign { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, span)
            }
            None => lhs,
        }
    }

    pub(crate) fn parse_conditional_expr(&mut self) -> Expr {
        let cond = self.parse_binary_expr(0);
        if self.consume_if(TokenKind::Question) {
            let then_expr = self.parse_expr();
            self.expect(TokenKind::Colon, "expected ':' in conditional expression");
            let else_expr = self.parse_conditional_expr();
            let span = cond.span.merge(&else_expr.span);
            Expr::new(
                ExprKind::Cond {
                    cond: Box::new(cond),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                },
                span,
            )
        } else {
            cond
        }
    }

    fn binary_op_of(kind: TokenKind) -> Option<(BinaryOp, u8)> {
        // Higher binds tighter.
        let entry = match kind {
            TokenKind::PipePipe => (BinaryOp::LogOr, 1),
            TokenKind::AmpAmp => (BinaryOp::LogAnd, 2),
            TokenKind::Pipe => (BinaryOp::BitOr, 3),
            TokenKind::Caret => (BinaryOp::BitXor, 4),
            TokenKind::Amp => (BinaryOp::BitAnd, 5),
            TokenKind::EqualEqual => (BinaryOp::Eq, 6),
            TokenKind::BangEqual => (BinaryOp::Ne, 6),
            TokenKind::Less => (BinaryOp::Lt, 7),
            TokenKind::LessEqual => (BinaryOp::Le, 7),
            TokenKind::Greater => (BinaryOp::Gt, 7),
            TokenKind::GreaterEqual => (BinaryOp::Ge, 7),
            TokenKind::Shl => (BinaryOp::Shl, 8),
            TokenKind::Shr => (BinaryOp::Shr, 8),
            TokenKind::Plus => (BinaryOp::Add, 9),
            TokenKind::Minus => (BinaryOp::Sub, 9),
            TokenKind::Star => (BinaryOp::Mul, 10),
            TokenKind::Slash => (BinaryOp::Div, 10),
            TokenKind::Percent => (BinaryOp::Mod, 10),
            _ => return None,
        };
        Some(entry)
    }

    /// Precedence climbing over all left-associative binary operators.
    fn parse_binary_expr(&mut self, min_prec: u8) -> Expr {
        let mut lhs = self.parse_cast_expr();
        while let Some((op, prec)) = Self::binary_op_of(self.peek_kind()) {
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_binary_expr(prec + 1);
            let span = lhs.span.merge(&rhs.span);
            lhs = Expr::new(ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, span);
        }
        lhs
    }

    /// True when the token after the current `(` starts a type name.
    fn paren_starts_type_name(&self) -> bool {
        let next = self.peek_ahead(1);
        if next.is_specifier_start() {
            return true;
        }
        if next == TokenKind::Identifier {
            if let Some(tok) = self.tokens.get(self.pos + 1) {
                let sym = intern(&tok.lexeme);
                return self.tu.find_typedef_in_outer(self.cur_scope, sym).is_some();
            }
        }
        false
    }

    /// cast_expression: '(' type_name ')' cast_expression | unary_expression
    fn parse_cast_expr(&mut self) -> Expr {
        if self.peek_kind() == TokenKind::LParen && self.paren_starts_type_name() {
            let span = self.peek().span;
            self.advance();
            let ty = self.parse_type_name();
            self.expect(TokenKind::RParen, "miss ')'");
            let expr = self.parse_cast_expr();
            let span = span.merge(&expr.span);
            match ty {
                Some(ty) => return Expr::new(ExprKind::Cast { ty, expr: Box::new(expr) }, span),
                None => return expr,
            }
        }
        self.parse_unary_expr()
    }

    fn parse_unary_expr(&mut self) -> Expr {
        let span = self.peek().span;
        match self.peek_kind() {
            TokenKind::PlusPlus => {
                self.advance();
                let operand = self.parse_unary_expr();
                let span = span.merge(&operand.span);
                Expr::new(ExprKind::IncDec { op: IncDecOp::PreInc, operand: Box::new(operand) }, span)
            }
            TokenKind::MinusMinus => {
                self.advance();
                let operand = self.parse_unary_expr();
                let span = span.merge(&operand.span);
                Expr::new(ExprKind::IncDec { op: IncDecOp::PreDec, operand: Box::new(operand) }, span)
            }
            TokenKind::Amp => {
                self.advance();
                let operand = self.parse_cast_expr();
                let span = span.merge(&operand.span);
                Expr::new(ExprKind::Addr(Box::new(operand)), span)
            }
            TokenKind::Star => {
                self.advance();
                let operand = self.parse_cast_expr();
                let span = span.merge(&operand.span);
                Expr::new(ExprKind::Deref(Box::new(operand)), span)
            }
            TokenKind::Plus | TokenKind::Minus | TokenKind::Tilde | TokenKind::Bang => {
                let op = match self.peek_kind() {
                    TokenKind::Plus => UnaryOp::Plus,
                    TokenKind::Minus => UnaryOp::Minus,
                    TokenKind::Tilde => UnaryOp::BitNot,
                    _ => UnaryOp::Not,
                };
                self.advance();
                let operand = self.parse_cast_expr();
                let span = span.merge(&operand.span);
                Expr::new(ExprKind::Unary { op, operand: Box::new(operand) }, span)
            }
            TokenKind::Sizeof => {
                self.advance();
                if self.peek_kind() == TokenKind::LParen && self.paren_starts_type_name() {
                    self.advance();
                    let ty = self.parse_type_name();
                    self.expect(TokenKind::RParen, "miss ')'");
                    match ty {
                        Some(ty) => Expr::new(ExprKind::SizeofType(ty), span),
                        None => Expr::new(
                            ExprKind::Imm { value: 0, kind: ImmKind::UInt },
                            span,
                        ),
                    }
                } else {
                    let operand = self.parse_unary_expr();
                    let span = span.merge(&operand.span);
                    Expr::new(ExprKind::SizeofExpr(Box::new(operand)), span)
                }
            }
            _ => self.parse_postfix_expr(),
        }
    }

    fn parse_postfix_expr(&mut self) -> Expr {
        let mut expr = self.parse_primary_expr();
        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if self.peek_kind() != TokenKind::RParen {
                        loop {
                            args.push(self.parse_assignment_expr());
                            if !self.consume_if(TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen, "miss ')'");
                    let span = expr.span;
                    expr = Expr::new(ExprKind::Call { func: Box::new(expr), args }, span);
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr();
                    self.expect(TokenKind::RBracket, "miss ']'");
                    let span = expr.span.merge(&index.span);
                    expr = Expr::new(
                        ExprKind::Index { base: Box::new(expr), index: Box::new(index) },
                        span,
                    );
                }
                TokenKind::Dot | TokenKind::Arrow => {
                    let arrow = self.peek_kind() == TokenKind::Arrow;
                    self.advance();
                    if self.peek_kind() == TokenKind::Identifier {
                        let name = intern(&self.peek().lexeme);
                        let span = expr.span.merge(&self.peek().span);
                        self.advance();
                        expr = Expr::new(
                            ExprKind::Field { base: Box::new(expr), name, arrow, binding: None },
                            span,
                        );
                    } else {
                        self.err_here(DiagKind::Syntax, "expected field name after member operator");
                        break;
                    }
                }
                TokenKind::PlusPlus => {
                    self.advance();
                    let span = expr.span;
                    expr = Expr::new(
                        ExprKind::IncDec { op: IncDecOp::PostInc, operand: Box::new(expr) },
                        span,
                    );
                }
                TokenKind::MinusMinus => {
                    self.advance();
                    let span = expr.span;
                    expr = Expr::new(
                        ExprKind::IncDec { op: IncDecOp::PostDec, operand: Box::new(expr) },
                        span,
                    );
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_primary_expr(&mut self) -> Expr {
        let span = self.peek().span;
        match self.peek_kind() {
            TokenKind::IntLit => {
                let text = self.peek().lexeme.clone();
                self.advance();
                let (value, kind) = decode_int_literal(&text);
                Expr::new(ExprKind::Imm { value, kind }, span)
            }
            TokenKind::FloatLit => {
                let text = self.peek().lexeme.clone();
                self.advance();
                let (value, kind) = decode_float_literal(&text);
                Expr::new(ExprKind::Fp { value, kind }, span)
            }
            TokenKind::CharLit => {
                let text = self.peek().lexeme.clone();
                self.advance();
                let value = text.chars().next().map(|c| c as u32 as u64).unwrap_or(0);
                Expr::new(ExprKind::Imm { value, kind: ImmKind::Int }, span)
            }
            TokenKind::StrLit => {
                // Adjacent string literals concatenate.
                let mut text = self.peek().lexeme.clone();
                self.advance();
                while self.peek_kind() == TokenKind::StrLit {
                    text.push_str(&self.peek().lexeme);
                    self.advance();
                }
                Expr::new(ExprKind::Str(text), span)
            }
            TokenKind::Identifier => {
                let sym = intern(&self.peek().lexeme);
                self.advance();
                if let Some(binding) = self.tu.find_decl_in_outer(self.cur_scope, sym) {
                    return Expr::new(ExprKind::Id { sym, binding: Some(binding) }, span);
                }
                if let Some((enum_id, index)) =
                    self.tu.find_enum_const_in_outer(self.cur_scope, sym)
                {
                    return Expr::new(ExprKind::EnumConst { enum_id, index }, span);
                }
                // A field name after `.`/`->` never reaches this path, so an
                // unresolved identifier here really is undeclared.
                self.tu.diags.err(
                    span.line(),
                    DiagKind::Lookup,
                    format!("'{}' : undeclared identifier", self.resolve_for_msg(sym)),
                );
                Expr::new(ExprKind::Id { sym, binding: None }, span)
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr();
                self.expect(TokenKind::RParen, "miss ')'");
                expr
            }
            _ => {
                let tok = self.peek().lexeme.clone();
                self.err_here(DiagKind::Syntax, format!("syntax error : '{}'", tok));
                Expr::new(ExprKind::Imm { value: 0, kind: ImmKind::Int }, span)
            }
        }
    }

    fn resolve_for_msg(&self, sym: crate::utils::intern::Symbol) -> String {
        crate::utils::intern::resolve(sym)
    }
}

/// Decode an integer literal spelling (suffixes included) into a value and
/// immediate kind.
fn decode_int_literal(text: &str) -> (u64, ImmKind) {
    let mut digits = text;
    let mut unsigned = false;
    let mut long = false;
    while let Some(last) = digits.chars().last() {
        match last {
            'u' | 'U' => {
                unsigned = true;
                digits = &digits[..digits.len() - 1];
            }
            'l' | 'L' => {
                long = true;
                digits = &digits[..digits.len() - 1];
            }
            _ => break,
        }
    }
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).unwrap_or(0)
    } else if digits.len() > 1 && digits.starts_with('0') {
        u64::from_str_radix(&digits[1..], 8).unwrap_or(0)
    } else {
        digits.parse::<u64>().unwrap_or(0)
    };
    let kind = match (unsigned, long) {
        (false, false) => ImmKind::Int,
        (true, false) => ImmKind::UInt,
        (false, true) => ImmKind::LongLong,
        (true, true) => ImmKind::ULongLong,
    };
    (value, kind)
}

/// Decode a floating literal spelling into a value and kind.
fn decode_float_literal(text: &str) -> (f64, FpKind) {
    let (digits, kind) = match text.chars().last() {
        Some('f') | Some('F') => (&text[..text.len() - 1], FpKind::Float),
        Some('l') | Some('L') => (&text[..text.len() - 1], FpKind::LongDouble),
        _ => (text, FpKind::Double),
    };
    (digits.parse::<f64>().unwrap_or(0.0), kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> TranslationUnit {
        let mut parser = Parser::from_source(source).unwrap();
        parser.parse_translation_unit();
        let tu = parser.finish();
        assert_eq!(tu.diags.error_count(), 0, "errors: {:?}", tu.diags.errors());
        tu
    }

    #[test]
    fn test_int_literal_decoding() {
        assert_eq!(decode_int_literal("42"), (42, ImmKind::Int));
        assert_eq!(decode_int_literal("0x1f"), (31, ImmKind::Int));
        assert_eq!(decode_int_literal("017"), (15, ImmKind::Int));
        assert_eq!(decode_int_literal("7u"), (7, ImmKind::UInt));
        assert_eq!(decode_int_literal("7l"), (7, ImmKind::LongLong));
        assert_eq!(decode_int_literal("7ull"), (7, ImmKind::ULongLong));
    }

    #[test]
    fn test_float_literal_decoding() {
        assert_eq!(decode_float_literal("1.5"), (1.5, FpKind::Double));
        assert_eq!(decode_float_literal("1.5f"), (1.5, FpKind::Float));
        assert_eq!(decode_float_literal("2e3"), (2000.0, FpKind::Double));
    }

    #[test]
    fn test_statement_kinds() {
        let tu = parse_ok(
            "void f(int n) {\n\
             int i;\n\
             for (i = 0; i < n; i++) { if (i == 2) continue; else break; }\n\
             while (n) n--;\n\
             do { n++; } while (n < 3);\n\
             switch (n) { case 1: break; default: break; }\n\
             return;\n\
             }",
        );
        let f = tu
            .find_decl_in_scope(tu.global_scope(), intern("f"))
            .unwrap();
        let body = tu.decl(f).body.unwrap();
        assert!(tu.scope(body).stmts.len() >= 5);
    }

    #[test]
    fn test_expression_precedence() {
        // 2 + 3 * 4 == 14, proven through the constant evaluator.
        let mut parser = Parser::from_source("int a[2 + 3 * 4];").unwrap();
        parser.parse_translation_unit();
        let tu = parser.finish();
        let a = tu.find_decl_in_scope(tu.global_scope(), intern("a")).unwrap();
        match tu.decl(a).ty.pure()[0] {
            crate::frontend::declarator::DeclTy::Array { dim, .. } => assert_eq!(dim, 14),
            ref other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn test_error_recovery_continues() {
        let mut parser = Parser::from_source("int 5; int ok;").unwrap();
        parser.parse_translation_unit();
        let tu = parser.finish();
        assert!(tu.diags.error_count() > 0);
        assert!(tu.find_decl_in_scope(tu.global_scope(), intern("ok")).is_some());
    }

    #[test]
    fn test_pragma_align_is_frozen_per_declaration() {
        let tu = parse_ok("int a;\n#pragma align (8)\nint b;");
        let a = tu.find_decl_in_scope(tu.global_scope(), intern("a")).unwrap();
        let b = tu.find_decl_in_scope(tu.global_scope(), intern("b")).unwrap();
        assert_eq!(tu.decl(a).align, DEFAULT_ALIGN);
        assert_eq!(tu.decl(b).align, 8);
    }

    #[test]
    fn test_undeclared_identifier_reported() {
        let mut parser = Parser::from_source("void f(void) { x = 1; }").unwrap();
        parser.parse_translation_unit();
        let tu = parser.finish();
        assert!(tu.diags.has_error_kind(DiagKind::Lookup));
    }
}
