//! Type-transform pass.
//!
//! A post-order walk over the statement and expression trees of every
//! function body (and over file-scope initializers) that attaches a result
//! `TypeName` to each expression node, enforcing C's conversion and
//! compatibility rules along the way: usual arithmetic conversions by rank,
//! pointer/array decay, member resolution with incomplete-aggregate
//! back-fill, lvalue checks, and implicit double-to-float conversion on call
//! arguments.
//!
//! Errors are recorded and the walk continues with an `int` placeholder so
//! one run reports as much as possible; every node ends up with a non-null
//! result type either way.

use crate::frontend::ast::{BinaryOp, Expr, ExprKind, FpKind, ImmKind, Stmt, StmtKind, UnaryOp};
use crate::frontend::declaration::expand_user_type;
use crate::frontend::declarator::{DeclTy, TypeName};
use crate::frontend::layout;
use crate::frontend::scope::{AggrId, DeclId, ScopeId, TranslationUnit};
use crate::frontend::specifier::{
    TypeSpec, QUA_CONST, SPEC_CHAR, SPEC_DOUBLE, SPEC_ENUM, SPEC_FLOAT, SPEC_INT, SPEC_LONG,
    SPEC_LONGLONG, SPEC_SHORT, SPEC_UNSIGNED,
};
use crate::utils::errors::DiagKind;
use crate::utils::intern::{resolve, Symbol};
use crate::utils::pretty::format_type_name;

/// Run the pass over the whole translation unit: file-scope initializers
/// first, then each function definition's body.
pub fn type_transform(tu: &mut TranslationUnit) {
    let mut ck = TypeChecker { tu };
    ck.check_scope_decl_inits(ck.tu.global_scope());
    let fun_ids: Vec<DeclId> = ck
        .tu
        .scope(ck.tu.global_scope())
        .decls
        .iter()
        .copied()
        .filter(|&d| ck.tu.decl(d).is_fun_def)
        .collect();
    for f in fun_ids {
        if ck.tu.diags.too_many_errors() {
            break;
        }
        if let Some(body) = ck.tu.decl(f).body {
            ck.check_scope(body);
        }
    }
}

struct TypeChecker<'a> {
    tu: &'a mut TranslationUnit,
}

fn build_type(des: u32) -> TypeName {
    TypeName::new(TypeSpec::new(des))
}

/// Conversion rank per C's usual arithmetic conversions.
fn cvt_rank(des: u32) -> u32 {
    if des & (SPEC_LONGLONG | SPEC_DOUBLE) != 0 {
        if des & SPEC_DOUBLE != 0 {
            return 90;
        }
        return 89;
    }
    if des & (SPEC_LONG | SPEC_FLOAT) != 0 {
        if des & SPEC_FLOAT != 0 {
            return 88;
        }
        return 87;
    }
    if des & SPEC_SHORT != 0 {
        return 84;
    }
    if des & (SPEC_CHAR | crate::frontend::specifier::SPEC_BOOL) != 0 {
        return 83;
    }
    // int, enum, bare signed/unsigned, and anything else integral.
    85
}

/// Pick the common type of a binary operation: higher rank wins; on a tie
/// the unsigned side wins. Shifts keep the left type unconditionally.
fn binary_result(shift: bool, l: &TypeName, r: &TypeName) -> TypeName {
    if shift {
        return l.clone();
    }
    let rl = cvt_rank(l.spec.des);
    let rr = cvt_rank(r.spec.des);
    if rl > rr || (rl == rr && l.spec.has(SPEC_UNSIGNED)) {
        l.clone()
    } else {
        r.clone()
    }
}

/// Collapse the extra indirection of a function pointer in a result type:
/// `int (****f)()` behaves as `int (*f)()`.
fn collapse_fun_pointer(chain: Vec<DeclTy>) -> Vec<DeclTy> {
    let mut ptrs = 0;
    while ptrs < chain.len() && matches!(chain[ptrs], DeclTy::Pointer { .. }) {
        ptrs += 1;
    }
    if ptrs > 1 && matches!(chain.get(ptrs), Some(DeclTy::Fun { .. })) {
        let mut out = vec![DeclTy::Pointer { qua: 0 }];
        out.extend(chain[ptrs..].iter().cloned());
        return out;
    }
    chain
}

impl<'a> TypeChecker<'a> {
    fn err(&mut self, line: u32, kind: DiagKind, msg: impl Into<String>) {
        self.tu.diags.err(line, kind, msg);
    }

    /// Type the initializer expressions of every declaration in a scope.
    fn check_scope_decl_inits(&mut self, scope: ScopeId) {
        let ids: Vec<DeclId> = self.tu.scope(scope).decls.clone();
        for id in ids {
            if self.tu.diags.too_many_errors() {
                return;
            }
            if let Some(mut init) = self.tu.decl_mut(id).init.take() {
                let target = self.tu.decl(id).ty.to_abstract();
                self.trans_init(&target, &mut init);
                self.tu.decl_mut(id).init = Some(init);
            }
        }
    }

    /// Walk one scope: declarations' initializers, then the statement list.
    fn check_scope(&mut self, scope: ScopeId) {
        self.check_scope_decl_inits(scope);
        let mut stmts = std::mem::take(&mut self.tu.scope_mut(scope).stmts);
        for stmt in &mut stmts {
            if self.tu.diags.too_many_errors() {
                break;
            }
            self.trans_stmt(stmt);
        }
        self.tu.scope_mut(scope).stmts = stmts;
    }

    fn trans_stmt(&mut self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::Compound(scope) => {
                let scope = *scope;
                self.check_scope(scope);
            }
            StmtKind::Expr(e) => self.trans_expr(e),
            StmtKind::If { cond, then_stmt, else_stmt } => {
                self.trans_expr(cond);
                self.trans_stmt(then_stmt);
                if let Some(s) = else_stmt {
                    self.trans_stmt(s);
                }
            }
            StmtKind::While { cond, body } => {
                self.trans_expr(cond);
                self.trans_stmt(body);
            }
            StmtKind::DoWhile { body, cond } => {
                self.trans_stmt(body);
                self.trans_expr(cond);
            }
            StmtKind::For { init, cond, step, body } => {
                if let Some(e) = init {
                    self.trans_expr(e);
                }
                if let Some(e) = cond {
                    self.trans_expr(e);
                }
                if let Some(e) = step {
                    self.trans_expr(e);
                }
                self.trans_stmt(body);
            }
            StmtKind::Switch { cond, body } => {
                self.trans_expr(cond);
                self.trans_stmt(body);
            }
            StmtKind::Return(value) => {
                if let Some(e) = value {
                    self.trans_expr(e);
                }
            }
            StmtKind::Case(_)
            | StmtKind::Default
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Goto(_)
            | StmtKind::Label(_)
            | StmtKind::Empty => {}
        }
    }

    /// An initializer expression at declaration position: a brace list
    /// mirrors the declared type, anything else is an ordinary expression.
    fn trans_init(&mut self, target: &TypeName, e: &mut Expr) {
        if let ExprKind::InitList(elems) = &mut e.kind {
            let mut elems_taken = std::mem::take(elems);
            for child in &mut elems_taken {
                self.trans_init(&target_elem_for(target), child);
            }
            if let ExprKind::InitList(elems) = &mut e.kind {
                *elems = elems_taken;
            }
            e.result_type = Some(target.clone());
            return;
        }
        self.trans_expr(e);
    }

    /// Attach a result type to `e`, recursing post-order.
    fn trans_expr(&mut self, e: &mut Expr) {
        if matches!(e.kind, ExprKind::SizeofExpr(_) | ExprKind::SizeofType(_)) {
            self.trans_sizeof(e);
            return;
        }
        let ty = match &mut e.kind {
            ExprKind::Imm { value, kind } => {
                let high = *value >> 32 != 0;
                let des = match kind {
                    ImmKind::Int => {
                        if high {
                            SPEC_LONGLONG
                        } else {
                            SPEC_INT
                        }
                    }
                    ImmKind::UInt => {
                        if high {
                            SPEC_UNSIGNED | SPEC_LONGLONG
                        } else {
                            SPEC_UNSIGNED | SPEC_INT
                        }
                    }
                    ImmKind::LongLong => SPEC_LONGLONG,
                    ImmKind::ULongLong => SPEC_UNSIGNED | SPEC_LONGLONG,
                };
                build_type(des | QUA_CONST)
            }
            ExprKind::Fp { kind, .. } => match kind {
                FpKind::Float => build_type(SPEC_FLOAT | QUA_CONST),
                FpKind::Double | FpKind::LongDouble => build_type(SPEC_DOUBLE | QUA_CONST),
            },
            ExprKind::Str(s) => {
                let mut ty = build_type(SPEC_CHAR | QUA_CONST);
                ty.chain.push(DeclTy::Array {
                    dim_expr: None,
                    dim: s.len() as u64 + 1,
                    paren: false,
                });
                ty
            }
            ExprKind::EnumConst { .. } => build_type(SPEC_ENUM | QUA_CONST),
            ExprKind::Id { sym, binding } => {
                let sym = *sym;
                let binding = *binding;
                self.trans_id(sym, binding)
            }
            _ => {
                // The composite cases need recursion on boxed children;
                // handled below to keep the borrow on `e.kind` short.
                self.trans_composite(e);
                return;
            }
        };
        e.result_type = Some(ty);
    }

    fn trans_id(&mut self, _sym: Symbol, binding: Option<DeclId>) -> TypeName {
        let Some(id) = binding else {
            // Undeclared; already reported when the primary was parsed.
            return build_type(SPEC_INT);
        };
        let decl = self.tu.decl(id);
        let ty = if decl.ty.spec.is_user_type_ref() {
            expand_user_type(self.tu, &decl.ty)
        } else {
            decl.ty.clone()
        };
        let mut res = ty.to_abstract();
        res.chain = collapse_fun_pointer(res.chain);
        if decl.is_bit_field {
            res.bit_len = Some(decl.bit_len);
        }
        res
    }

    fn trans_composite(&mut self, e: &mut Expr) {
        let line = e.line();
        match &mut e.kind {
            ExprKind::Unary { op, operand } => {
                self.trans_expr(operand);
                let ld = operand.result_type.clone().unwrap_or_else(|| build_type(SPEC_INT));
                let op = *op;
                match op {
                    UnaryOp::Plus | UnaryOp::Minus => {
                        if !ld.is_arith() {
                            let shown = format_type_name(self.tu, &ld);
                            let sign = if op == UnaryOp::Plus { "+" } else { "-" };
                            self.err(
                                line,
                                DiagKind::Typing,
                                format!("illegal '{}' for type '{}'", sign, shown),
                            );
                        }
                    }
                    UnaryOp::BitNot => {
                        if !ld.is_integer_scalar() {
                            let shown = format_type_name(self.tu, &ld);
                            self.err(
                                line,
                                DiagKind::Typing,
                                format!("illegal bit reverse operation for type '{}'", shown),
                            );
                        }
                    }
                    UnaryOp::Not => {
                        if !ld.is_arith() && !ld.is_pointer() {
                            let shown = format_type_name(self.tu, &ld);
                            self.err(
                                line,
                                DiagKind::Typing,
                                format!("illegal logical not operation for type '{}'", shown),
                            );
                        }
                    }
                }
                e.result_type = Some(ld);
            }
            ExprKind::IncDec { operand, .. } => {
                self.trans_expr(operand);
                let ld = operand.result_type.clone().unwrap_or_else(|| build_type(SPEC_INT));
                if !ld.is_arith() && !ld.is_pointer() {
                    let shown = format_type_name(self.tu, &ld);
                    self.err(
                        line,
                        DiagKind::Typing,
                        format!("illegal '++'/'--' for type '{}'", shown),
                    );
                }
                e.result_type = Some(ld);
            }
            ExprKind::Addr(operand) => {
                self.trans_expr(operand);
                let mut ty = operand.result_type.clone().unwrap_or_else(|| build_type(SPEC_INT));
                ty.chain.insert(0, DeclTy::Pointer { qua: 0 });
                ty.bit_len = None;
                e.result_type = Some(ty);
            }
            ExprKind::Deref(operand) => {
                self.trans_expr(operand);
                let ld = operand.result_type.clone().unwrap_or_else(|| build_type(SPEC_INT));
                e.result_type = Some(self.strip_indirection(&ld, line, true));
            }
            ExprKind::Index { base, index } => {
                self.trans_expr(base);
                self.trans_expr(index);
                let idx_ty = index.result_type.clone().unwrap_or_else(|| build_type(SPEC_INT));
                if !idx_ty.is_integer_scalar() {
                    self.err(line, DiagKind::Typing, "array subscript is not an integer");
                }
                let ld = base.result_type.clone().unwrap_or_else(|| build_type(SPEC_INT));
                e.result_type = Some(self.strip_indirection(&ld, line, false));
            }
            ExprKind::Field { base, name, arrow, binding } => {
                self.trans_expr(base);
                let name = *name;
                let arrow = *arrow;
                let base_ty = base.result_type.clone().unwrap_or_else(|| build_type(SPEC_INT));

                if !base_ty.spec.is_aggr() {
                    let msg = if arrow {
                        "left of '->' must have struct/union type"
                    } else {
                        "left of field access operation '.' must be struct/union type"
                    };
                    self.err(line, DiagKind::Typing, msg);
                    e.result_type = Some(build_type(SPEC_INT));
                    return;
                }
                if arrow && !base_ty.is_pointer() {
                    self.err(
                        line,
                        DiagKind::Typing,
                        format!("'->{}' : left operand has 'struct' type, use '.'", resolve(name)),
                    );
                    e.result_type = Some(build_type(SPEC_INT));
                    return;
                }
                if !arrow && base_ty.is_pointer() {
                    self.err(
                        line,
                        DiagKind::Typing,
                        format!(
                            "'.{}' : left operand points to 'struct' type, should use '->'",
                            resolve(name)
                        ),
                    );
                    e.result_type = Some(build_type(SPEC_INT));
                    return;
                }

                match self.resolve_field(base_ty.spec.aggr, name, line) {
                    Some((field, resolved_aggr)) => {
                        *binding = Some(field);
                        if let Some(rt) = &mut base.result_type {
                            // Back-fill the reference when a complete
                            // definition was found in an outer scope.
                            rt.spec.aggr = Some(resolved_aggr);
                        }
                        let fdecl = self.tu.decl(field);
                        let mut res = fdecl.ty.to_abstract();
                        res.chain = collapse_fun_pointer(res.chain);
                        if fdecl.is_bit_field {
                            res.bit_len = Some(fdecl.bit_len);
                        }
                        e.result_type = Some(res);
                    }
                    None => {
                        e.result_type = Some(build_type(SPEC_INT));
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.trans_expr(lhs);
                self.trans_expr(rhs);
                let op = *op;
                let ld = lhs.result_type.clone().unwrap_or_else(|| build_type(SPEC_INT));
                let rd = rhs.result_type.clone().unwrap_or_else(|| build_type(SPEC_INT));
                let swap_operands = op == BinaryOp::Add && !ld.is_pointer() && rd.is_pointer();
                let (ld, rd) = if swap_operands { (rd, ld) } else { (ld, rd) };
                let res = self.trans_binary(op, &ld, &rd, line);
                e.result_type = Some(res);
            }
            ExprKind::Assign { op: _, lhs, rhs } => {
                self.trans_expr(lhs);
                let lhs_ty = lhs.result_type.clone().unwrap_or_else(|| build_type(SPEC_INT));
                if let ExprKind::InitList(_) = rhs.kind {
                    // A brace initializer on the right mirrors the left side.
                    let target = lhs_ty.clone();
                    self.trans_init(&target, rhs);
                } else {
                    self.trans_expr(rhs);
                }
                self.check_assign(&lhs_ty, line);
                e.result_type = Some(lhs_ty);
            }
            ExprKind::Cond { cond, then_expr, else_expr } => {
                self.trans_expr(cond);
                self.trans_expr(then_expr);
                self.trans_expr(else_expr);
                let td = then_expr.result_type.clone().unwrap_or_else(|| build_type(SPEC_INT));
                let fd = else_expr.result_type.clone().unwrap_or_else(|| build_type(SPEC_INT));
                if td.is_pointer() && !fd.is_pointer() {
                    if !else_expr.is_zero_int() || !fd.is_integer_scalar() {
                        self.err(line, DiagKind::Typing, "no conversion from pointer to non-pointer");
                    }
                } else if !td.is_pointer() && fd.is_pointer() {
                    if !then_expr.is_zero_int() || !td.is_integer_scalar() {
                        self.err(line, DiagKind::Typing, "no conversion from pointer to non-pointer");
                    }
                } else if td.is_array() != fd.is_array() {
                    self.err(line, DiagKind::Typing, "no conversion between array and non-array");
                } else if td.is_aggr_value() != fd.is_aggr_value()
                    || (td.is_aggr_value() && td.spec.is_struct() != fd.spec.is_struct())
                {
                    self.err(
                        line,
                        DiagKind::Typing,
                        "can not select between struct/union and other type",
                    );
                }
                e.result_type = Some(td);
            }
            ExprKind::Call { func, args } => {
                for arg in args.iter_mut() {
                    self.trans_expr(arg);
                }
                self.trans_expr(func);
                let fd = func.result_type.clone().unwrap_or_else(|| build_type(SPEC_INT));
                self.insert_arg_conversions(&fd, args);

                // Return type: strip (POINTER?) FUN from the function
                // expression's chain.
                let mut chain = fd.pure().to_vec();
                match chain.first() {
                    Some(DeclTy::Fun { .. }) => {
                        chain.remove(0);
                    }
                    Some(DeclTy::Pointer { .. })
                        if matches!(chain.get(1), Some(DeclTy::Fun { .. })) =>
                    {
                        chain.drain(0..2);
                    }
                    _ => {
                        self.err(line, DiagKind::Typing, "called object is not a function");
                        chain.clear();
                    }
                }
                let mut res = TypeName::with_chain(fd.spec.clone(), chain);
                res.spec.clear(crate::frontend::specifier::STOR_MASK);
                e.result_type = Some(res);
            }
            ExprKind::Cast { ty, expr } => {
                self.trans_expr(expr);
                let expanded = if ty.spec.is_user_type_ref() {
                    expand_user_type(self.tu, ty)
                } else {
                    ty.clone()
                };
                *ty = expanded.clone();
                e.result_type = Some(expanded);
            }
            ExprKind::Cvt { ty, expr } => {
                self.trans_expr(expr);
                e.result_type = Some(ty.clone());
            }
            ExprKind::InitList(elems) => {
                // Reached only outside an assignment/declaration context.
                for child in elems.iter_mut() {
                    self.trans_expr(child);
                }
                e.result_type = Some(build_type(SPEC_INT));
            }
            // Simple literals are handled in trans_expr.
            _ => {
                e.result_type = Some(build_type(SPEC_INT));
            }
        }
    }

    /// `sizeof expr` / `sizeof(type)`: the node becomes an unsigned
    /// immediate holding the byte size.
    fn trans_sizeof(&mut self, e: &mut Expr) {
        let size = match &mut e.kind {
            ExprKind::SizeofExpr(operand) => {
                self.trans_expr(operand);
                let ty = operand
                    .result_type
                    .clone()
                    .unwrap_or_else(|| build_type(SPEC_INT));
                layout::type_name_size(self.tu, &ty)
            }
            ExprKind::SizeofType(ty) => {
                let expanded = if ty.spec.is_user_type_ref() {
                    expand_user_type(self.tu, ty)
                } else {
                    ty.clone()
                };
                *ty = expanded.clone();
                layout::type_name_size(self.tu, &expanded)
            }
            _ => 0,
        };
        e.kind = ExprKind::Imm { value: size as u64, kind: ImmKind::UInt };
        e.result_type = Some(build_type(SPEC_UNSIGNED | SPEC_INT | QUA_CONST));
    }

    /// `*e` / `e[i]`: require pointer or array and strip one level. A
    /// function designator passes through unchanged.
    fn strip_indirection(&mut self, ld: &TypeName, line: u32, deref: bool) -> TypeName {
        let mut res = ld.clone();
        res.bit_len = None;
        match res.chain.first() {
            Some(DeclTy::Pointer { .. }) | Some(DeclTy::Array { .. }) => {
                res.chain.remove(0);
                res
            }
            Some(DeclTy::Fun { .. }) => res,
            _ => {
                let msg = if deref {
                    "Illegal dereferencing operation, indirection operation should operate on pointer type."
                } else {
                    "The referrence of array is not match with its declaration."
                };
                self.err(line, DiagKind::Typing, msg);
                build_type(SPEC_INT)
            }
        }
    }

    fn trans_binary(&mut self, op: BinaryOp, ld: &TypeName, rd: &TypeName, line: u32) -> TypeName {
        match op {
            BinaryOp::Mul | BinaryOp::Div => {
                if ld.is_arith() && rd.is_arith() {
                    binary_result(false, ld, rd)
                } else {
                    self.err(line, DiagKind::Typing, format!("illegal operation for '{}'", op));
                    build_type(SPEC_INT)
                }
            }
            BinaryOp::Mod => {
                if ld.is_integer_scalar() && rd.is_integer_scalar() {
                    binary_result(false, ld, rd)
                } else {
                    self.err(line, DiagKind::Typing, "illegal operation for '%'");
                    build_type(SPEC_INT)
                }
            }
            BinaryOp::Add => {
                if ld.is_pointer() && rd.is_pointer() {
                    self.err(line, DiagKind::Typing, "can not add two pointers");
                    return build_type(SPEC_INT);
                }
                if ld.is_array() && rd.is_array() {
                    self.err(line, DiagKind::Typing, "can not add two arrays");
                    return build_type(SPEC_INT);
                }
                if !ld.is_pointer() && (ld.is_aggr_value() || rd.is_aggr_value()) {
                    self.err(line, DiagKind::Typing, "illegal '+' for struct/union");
                    return build_type(SPEC_INT);
                }
                if ld.is_array() && rd.is_integer_scalar() {
                    // Array decays: the sum is a pointer.
                    let mut res = TypeName::new(ld.spec.clone());
                    res.chain.push(DeclTy::Pointer { qua: 0 });
                    return res;
                }
                if ld.is_pointer() && rd.is_integer_scalar() {
                    return ld.clone();
                }
                if ld.is_arith() && rd.is_arith() {
                    return binary_result(false, ld, rd);
                }
                self.err(line, DiagKind::Typing, "illegal type for '+'");
                build_type(SPEC_INT)
            }
            BinaryOp::Sub => {
                if !ld.is_pointer() && rd.is_pointer() {
                    self.err(
                        line,
                        DiagKind::Typing,
                        "pointer can only be subtracted from another pointer",
                    );
                    return build_type(SPEC_INT);
                }
                if ld.is_aggr_value() || rd.is_aggr_value() {
                    self.err(line, DiagKind::Typing, "illegal '-' for struct/union");
                    return build_type(SPEC_INT);
                }
                if ld.is_pointer() && rd.is_pointer() {
                    return build_type(SPEC_UNSIGNED | SPEC_LONG);
                }
                if (ld.is_pointer() || ld.is_array()) && rd.is_integer_scalar() {
                    return ld.clone();
                }
                if ld.is_arith() && rd.is_arith() {
                    return binary_result(false, ld, rd);
                }
                self.err(line, DiagKind::Typing, "illegal type for '-'");
                build_type(SPEC_INT)
            }
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::BitAnd | BinaryOp::BitXor | BinaryOp::BitOr => {
                if !ld.is_integer_scalar() || !rd.is_integer_scalar() {
                    self.err(
                        line,
                        DiagKind::Typing,
                        format!("illegal '{}', operands must have integer type", op),
                    );
                    return build_type(SPEC_INT);
                }
                binary_result(op.is_shift(), ld, rd)
            }
            BinaryOp::LogAnd | BinaryOp::LogOr => {
                for d in [ld, rd] {
                    if !d.is_arith() && !d.is_pointer() && !d.is_array() {
                        self.err(
                            line,
                            DiagKind::Typing,
                            format!("illegal '{}', operand is not scalar", op),
                        );
                    }
                }
                build_type(SPEC_UNSIGNED | SPEC_CHAR)
            }
            BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::Eq
            | BinaryOp::Ne => {
                if ld.is_aggr_value() || rd.is_aggr_value() {
                    self.err(
                        line,
                        DiagKind::Typing,
                        format!("can not do '{}' operation for struct/union.", op),
                    );
                }
                build_type(SPEC_UNSIGNED | SPEC_CHAR)
            }
            BinaryOp::Comma => rd.clone(),
        }
    }

    /// Assignment target must be a modifiable lvalue: not an array, not
    /// const-qualified (either on the specifier or on the outermost
    /// pointer).
    fn check_assign(&mut self, ld: &TypeName, line: u32) {
        if ld.is_array() {
            let shown = format_type_name(self.tu, ld);
            self.err(
                line,
                DiagKind::Typing,
                format!("illegal '{}', left operand must be l-value", shown),
            );
            return;
        }
        let const_pointer = matches!(
            ld.pure().first(),
            Some(DeclTy::Pointer { qua }) if qua & QUA_CONST != 0
        );
        let const_scalar = ld.pure().is_empty() && ld.spec.is_const();
        if const_scalar || const_pointer {
            let shown = format_type_name(self.tu, ld);
            self.err(
                line,
                DiagKind::Typing,
                format!("illegal '{}', l-value specifies const object", shown),
            );
        }
    }

    /// Insert the implicit double-to-float truncation on call arguments
    /// whose formal parameter is float.
    fn insert_arg_conversions(&mut self, fd: &TypeName, args: &mut [Expr]) {
        let params = fd.chain.iter().find_map(|d| match d {
            DeclTy::Fun { params, .. } => Some(params.clone()),
            _ => None,
        });
        let Some(params) = params else { return };
        for (arg, formal) in args.iter_mut().zip(params.iter()) {
            if formal.is_variadic_marker() {
                break;
            }
            let actual_is_double = arg
                .result_type
                .as_ref()
                .map(|t| t.is_scalar() && t.spec.is_double())
                .unwrap_or(false);
            let formal_is_float = formal.ty.is_scalar() && formal.ty.spec.is_float();
            if actual_is_double && formal_is_float {
                let span = arg.span;
                let inner = std::mem::replace(
                    arg,
                    Expr::new(ExprKind::Imm { value: 0, kind: ImmKind::Int }, span),
                );
                let cvt_ty = build_type(SPEC_FLOAT);
                *arg = Expr::new(ExprKind::Cvt { ty: cvt_ty.clone(), expr: Box::new(inner) }, span);
                arg.result_type = Some(cvt_ty);
            }
        }
    }

    /// Find a field by name, back-filling an incomplete aggregate from a
    /// complete definition of the same tag in an outer scope.
    fn resolve_field(
        &mut self,
        aggr: Option<AggrId>,
        name: Symbol,
        line: u32,
    ) -> Option<(DeclId, AggrId)> {
        let mut aggr_id = aggr?;
        if !self.tu.aggr(aggr_id).is_complete {
            let a = self.tu.aggr(aggr_id);
            if let Some(tag) = a.tag {
                if let Some(found) = self.tu.find_complete_aggr_in_outer(a.scope, tag, a.kind) {
                    aggr_id = found;
                }
            }
        }
        let aggr = self.tu.aggr(aggr_id);
        if !aggr.is_complete {
            let tag = aggr.tag.map(resolve).unwrap_or_default();
            let kind = aggr.kind.name();
            self.err(
                line,
                DiagKind::Lookup,
                format!(
                    "'{}' is an empty {}, '{}' is not its field",
                    tag,
                    kind,
                    resolve(name)
                ),
            );
            return None;
        }
        let field = aggr
            .fields
            .iter()
            .copied()
            .find(|&f| self.tu.decl(f).name() == Some(name));
        match field {
            Some(f) => Some((f, aggr_id)),
            None => {
                let tag = self.tu.aggr(aggr_id).tag.map(resolve).unwrap_or_default();
                let kind = self.tu.aggr(aggr_id).kind.name();
                self.err(
                    line,
                    DiagKind::Lookup,
                    format!("'{}' : is not a member of type '{} {}'", resolve(name), kind, tag),
                );
                None
            }
        }
    }
}

/// For brace-list children the element target is not tracked precisely;
/// descending with the same target keeps the walk total. Ordinary
/// expressions inside the list are typed on their own.
fn target_elem_for(target: &TypeName) -> TypeName {
    target.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::Parser;
    use crate::utils::intern::intern;

    fn analyze(source: &str) -> TranslationUnit {
        let mut parser = Parser::from_source(source).unwrap();
        parser.parse_translation_unit();
        let mut tu = parser.finish();
        type_transform(&mut tu);
        tu
    }

    fn analyze_ok(source: &str) -> TranslationUnit {
        let tu = analyze(source);
        assert_eq!(tu.diags.error_count(), 0, "errors: {:?}", tu.diags.errors());
        tu
    }

    /// Result type of the first expression statement in function `f`.
    fn first_expr_type(tu: &TranslationUnit, fun: &str) -> TypeName {
        let f = tu.find_decl_in_scope(tu.global_scope(), intern(fun)).unwrap();
        let body = tu.decl(f).body.unwrap();
        for stmt in &tu.scope(body).stmts {
            if let StmtKind::Expr(e) = &stmt.kind {
                return e.result_type.clone().expect("missing result type");
            }
        }
        panic!("no expression statement in '{}'", fun);
    }

    #[test]
    fn test_rank_rule() {
        assert_eq!(cvt_rank(SPEC_CHAR), 83);
        assert_eq!(cvt_rank(SPEC_SHORT), 84);
        assert_eq!(cvt_rank(SPEC_INT), 85);
        assert_eq!(cvt_rank(SPEC_ENUM), 85);
        assert_eq!(cvt_rank(SPEC_LONG), 87);
        assert_eq!(cvt_rank(SPEC_FLOAT), 88);
        assert_eq!(cvt_rank(SPEC_LONGLONG), 89);
        assert_eq!(cvt_rank(SPEC_DOUBLE), 90);
    }

    #[test]
    fn test_arith_promotion_picks_higher_rank() {
        let tu = analyze_ok("void f(void) { int i; double d; i + d; }");
        let ty = first_expr_type(&tu, "f");
        assert!(ty.spec.is_double());
    }

    #[test]
    fn test_tie_prefers_unsigned() {
        let tu = analyze_ok("void f(void) { int i; unsigned u; i + u; }");
        let ty = first_expr_type(&tu, "f");
        assert!(ty.spec.has(SPEC_UNSIGNED));
    }

    #[test]
    fn test_shift_keeps_lhs_type() {
        let tu = analyze_ok("void f(void) { char c; long long n; c << n; }");
        let ty = first_expr_type(&tu, "f");
        assert!(ty.spec.has(SPEC_CHAR));
    }

    #[test]
    fn test_relational_yields_unsigned_char() {
        let tu = analyze_ok("void f(void) { int a; int b; a < b; }");
        let ty = first_expr_type(&tu, "f");
        assert!(ty.spec.has(SPEC_UNSIGNED) && ty.spec.has(SPEC_CHAR));
    }

    #[test]
    fn test_deref_strips_pointer() {
        let tu = analyze_ok("void f(void) { int *p; *p; }");
        let ty = first_expr_type(&tu, "f");
        assert!(ty.is_scalar());
        assert!(ty.spec.has(SPEC_INT));
    }

    #[test]
    fn test_deref_typedef_pointer() {
        // After expansion, *x has result type int and assignment checks.
        let tu = analyze_ok("typedef int *INTP; void f(void) { INTP x; *x = 7; }");
        let ty = first_expr_type(&tu, "f");
        assert!(ty.spec.has(SPEC_INT));
        assert!(ty.is_scalar());
    }

    #[test]
    fn test_index_strips_one_level() {
        let tu = analyze_ok("void f(void) { int a[4][5]; a[1]; }");
        let ty = first_expr_type(&tu, "f");
        assert!(ty.is_array());
        assert_eq!(ty.chain.len(), 1);
    }

    #[test]
    fn test_addr_prepends_pointer() {
        let tu = analyze_ok("void f(void) { int x; &x; }");
        let ty = first_expr_type(&tu, "f");
        assert!(ty.is_pointer());
    }

    #[test]
    fn test_pointer_plus_int_and_commuted() {
        let tu = analyze_ok("void f(void) { int *p; p + 1; }");
        assert!(first_expr_type(&tu, "f").is_pointer());
        let tu = analyze_ok("void g(void) { int *p; 1 + p; }");
        assert!(first_expr_type(&tu, "g").is_pointer());
    }

    #[test]
    fn test_pointer_plus_pointer_rejected() {
        let tu = analyze("void f(void) { int *p; int *q; p + q; }");
        assert!(tu.diags.has_error_kind(DiagKind::Typing));
    }

    #[test]
    fn test_pointer_minus_pointer_is_unsigned_long() {
        let tu = analyze_ok("void f(void) { int *p; int *q; p - q; }");
        let ty = first_expr_type(&tu, "f");
        assert!(ty.spec.has(SPEC_UNSIGNED) && ty.spec.has(SPEC_LONG));
    }

    #[test]
    fn test_int_minus_pointer_rejected() {
        let tu = analyze("void f(void) { int *p; 1 - p; }");
        assert!(tu.diags.has_error_kind(DiagKind::Typing));
    }

    #[test]
    fn test_array_plus_int_decays_to_pointer() {
        let tu = analyze_ok("void f(void) { int a[3]; a + 2; }");
        assert!(first_expr_type(&tu, "f").is_pointer());
    }

    #[test]
    fn test_mod_requires_integers() {
        let tu = analyze("void f(void) { double d; d % 2; }");
        assert!(tu.diags.has_error_kind(DiagKind::Typing));
    }

    #[test]
    fn test_field_access() {
        let tu = analyze_ok("struct S { int v; }; void f(void) { struct S s; s.v; }");
        let ty = first_expr_type(&tu, "f");
        assert!(ty.spec.has(SPEC_INT));
    }

    #[test]
    fn test_arrow_on_value_rejected() {
        let tu = analyze("struct S { int v; }; void f(void) { struct S s; s->v; }");
        assert!(tu.diags.has_error_kind(DiagKind::Typing));
    }

    #[test]
    fn test_dot_on_pointer_rejected() {
        let tu = analyze("struct S { int v; }; void f(void) { struct S *p; p.v; }");
        assert!(tu.diags.has_error_kind(DiagKind::Typing));
    }

    #[test]
    fn test_forward_struct_field_after_completion() {
        let tu = analyze_ok(
            "struct L; struct L *p; struct L { int v; }; void f(void) { p->v; }",
        );
        let ty = first_expr_type(&tu, "f");
        assert!(ty.spec.has(SPEC_INT));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let tu = analyze("struct S { int v; }; void f(void) { struct S s; s.w; }");
        assert!(tu.diags.has_error_kind(DiagKind::Lookup));
    }

    #[test]
    fn test_sizeof_becomes_unsigned_imm() {
        let tu = analyze_ok("void f(void) { sizeof(int); }");
        let f = tu.find_decl_in_scope(tu.global_scope(), intern("f")).unwrap();
        let body = tu.decl(f).body.unwrap();
        match &tu.scope(body).stmts[0].kind {
            StmtKind::Expr(e) => {
                assert!(matches!(e.kind, ExprKind::Imm { value: 4, kind: ImmKind::UInt }));
                let ty = e.result_type.as_ref().unwrap();
                assert!(ty.spec.has(SPEC_UNSIGNED) && ty.spec.has(SPEC_INT));
            }
            other => panic!("expected expr stmt, got {:?}", other),
        }
    }

    #[test]
    fn test_sizeof_pointer_decl() {
        let tu = analyze_ok("void f(void) { int *(*p)[30]; sizeof(p); }");
        let f = tu.find_decl_in_scope(tu.global_scope(), intern("f")).unwrap();
        let body = tu.decl(f).body.unwrap();
        let sizes: Vec<u64> = tu
            .scope(body)
            .stmts
            .iter()
            .filter_map(|s| match &s.kind {
                StmtKind::Expr(e) => match e.kind {
                    ExprKind::Imm { value, .. } => Some(value),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![layout::BYTE_PER_POINTER as u64]);
    }

    #[test]
    fn test_assign_to_array_rejected() {
        let tu = analyze("void f(void) { int a[3]; int b[3]; a = b; }");
        assert!(tu.diags.has_error_kind(DiagKind::Typing));
    }

    #[test]
    fn test_assign_to_const_rejected() {
        let tu = analyze("void f(void) { const int x; x = 1; }");
        assert!(tu.diags.has_error_kind(DiagKind::Typing));

        let tu = analyze("void f(void) { int * const p; p = 0; }");
        assert!(tu.diags.has_error_kind(DiagKind::Typing));
    }

    #[test]
    fn test_assign_through_const_pointee_allowed_target() {
        // `int * const p` forbids p = ..., but *p = ... is fine.
        let tu = analyze_ok("void f(void) { int * const p; *p = 3; }");
        let _ = tu;
    }

    #[test]
    fn test_call_return_type() {
        let tu = analyze_ok("int g(void); void f(void) { g(); }");
        let ty = first_expr_type(&tu, "f");
        assert!(ty.is_scalar());
        assert!(ty.spec.has(SPEC_INT));
    }

    #[test]
    fn test_call_through_function_pointer() {
        let tu = analyze_ok("void f(void) { int (*fp)(int); fp(1); }");
        let ty = first_expr_type(&tu, "f");
        assert!(ty.is_scalar());
        assert!(ty.spec.has(SPEC_INT));
    }

    #[test]
    fn test_double_argument_truncated_to_float() {
        let tu = analyze_ok("void g(float x); void f(void) { double d; g(d); }");
        let f = tu.find_decl_in_scope(tu.global_scope(), intern("f")).unwrap();
        let body = tu.decl(f).body.unwrap();
        let found = tu.scope(body).stmts.iter().any(|s| match &s.kind {
            StmtKind::Expr(e) => match &e.kind {
                ExprKind::Call { args, .. } => {
                    matches!(args.first().map(|a| &a.kind), Some(ExprKind::Cvt { .. }))
                }
                _ => false,
            },
            _ => false,
        });
        assert!(found, "expected inserted CVT on the double argument");
    }

    #[test]
    fn test_fun_pointer_indirection_collapses() {
        let tu = analyze_ok("void f(void) { int (****fp)(void); fp; }");
        let ty = first_expr_type(&tu, "f");
        let ptrs = ty
            .chain
            .iter()
            .take_while(|d| matches!(d, DeclTy::Pointer { .. }))
            .count();
        assert_eq!(ptrs, 1);
        assert!(ty.is_fun_pointer());
    }

    #[test]
    fn test_cond_null_pointer_constant_ok() {
        let tu = analyze_ok("void f(void) { int *p; int c; c ? p : 0; }");
        let ty = first_expr_type(&tu, "f");
        assert!(ty.is_pointer());
    }

    #[test]
    fn test_cond_pointer_vs_nonzero_rejected() {
        let tu = analyze("void f(void) { int *p; int c; c ? p : 1; }");
        assert!(tu.diags.has_error_kind(DiagKind::Typing));
    }

    #[test]
    fn test_string_literal_type() {
        let tu = analyze_ok("void f(void) { \"abc\"; }");
        let ty = first_expr_type(&tu, "f");
        assert!(ty.spec.has(SPEC_CHAR) && ty.spec.is_const());
        assert!(matches!(ty.chain.first(), Some(DeclTy::Array { dim: 4, .. })));
    }

    #[test]
    fn test_enum_const_in_expression() {
        let tu = analyze_ok("enum E { A, B = 5, C }; void f(void) { B + 1; }");
        let _ = first_expr_type(&tu, "f");
        let e = tu.find_enum_tag_in_outer(tu.global_scope(), intern("E")).unwrap();
        let vals: Vec<i64> = tu.enum_def(e).items.iter().map(|i| i.value).collect();
        assert_eq!(vals, vec![0, 5, 6]);
    }

    #[test]
    fn test_every_expr_gets_result_type() {
        let tu = analyze_ok(
            "struct S { int v; };\n\
             int g(int x);\n\
             void f(void) {\n\
               int i; int *p; struct S s; double d;\n\
               i = g(i) + (int)d * s.v - p[0];\n\
             }",
        );
        fn check(e: &Expr) {
            assert!(e.result_type.is_some(), "missing result type: {:?}", e.kind);
            match &e.kind {
                ExprKind::Unary { operand, .. }
                | ExprKind::IncDec { operand, .. }
                | ExprKind::Addr(operand)
                | ExprKind::Deref(operand)
                | ExprKind::SizeofExpr(operand) => check(operand),
                ExprKind::Binary { lhs, rhs, .. } | ExprKind::Assign { lhs, rhs, .. } => {
                    check(lhs);
                    check(rhs);
                }
                ExprKind::Cond { cond, then_expr, else_expr } => {
                    check(cond);
                    check(then_expr);
                    check(else_expr);
                }
                ExprKind::Cast { expr, .. } | ExprKind::Cvt { expr, .. } => check(expr),
                ExprKind::Call { func, args } => {
                    check(func);
                    args.iter().for_each(check);
                }
                ExprKind::Index { base, index } => {
                    check(base);
                    check(index);
                }
                ExprKind::Field { base, .. } => check(base),
                ExprKind::InitList(elems) => elems.iter().for_each(check),
                _ => {}
            }
        }
        let f = tu.find_decl_in_scope(tu.global_scope(), intern("f")).unwrap();
        let body = tu.decl(f).body.unwrap();
        for stmt in &tu.scope(body).stmts {
            if let StmtKind::Expr(e) = &stmt.kind {
                check(e);
            }
        }
    }
}
