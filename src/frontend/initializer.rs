//! Initializer matching.
//!
//! Walks an initializer tree jointly with the declared type: arrays consume
//! element initializers (recursively, braced or flat), structs consume one
//! initializer per field in declaration order, unions match only their first
//! field, scalars and pointers consume a single expression. An open
//! outermost array dimension is back-filled with the number of initializers
//! consumed at that level.

use crate::frontend::ast::{Expr, ExprKind};
use crate::frontend::declarator::{DeclTy, TypeName};
use crate::frontend::parser::Parser;
use crate::frontend::scope::{AggrKind, DeclId};
use crate::utils::errors::DiagKind;
use crate::utils::intern::resolve;

/// Cursor over a sibling list of initializers.
struct InitCursor<'a> {
    items: &'a [Expr],
    pos: usize,
}

impl<'a> InitCursor<'a> {
    fn new(items: &'a [Expr]) -> Self {
        Self { items, pos: 0 }
    }

    fn peek(&self) -> Option<&'a Expr> {
        self.items.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Expr> {
        let item = self.items.get(self.pos);
        if item.is_some() {
            self.pos += 1;
        }
        item
    }
}

/// The element type of an array: the chain with its first ARRAY stripped.
fn array_elem_type(ty: &TypeName) -> TypeName {
    let mut chain: Vec<DeclTy> = ty.pure().to_vec();
    if let Some(pos) = chain.iter().position(|d| d.is_array()) {
        chain.remove(pos);
    }
    TypeName::with_chain(ty.spec.clone(), chain)
}

fn first_array_dim(ty: &TypeName) -> u64 {
    ty.pure()
        .iter()
        .find_map(|d| match d {
            DeclTy::Array { dim, .. } => Some(*dim),
            _ => None,
        })
        .unwrap_or(0)
}

impl Parser {
    /// Match the initializer of a freshly installed declaration and
    /// back-fill its outermost array dimension if it was left open.
    pub(crate) fn match_initializer(&mut self, id: DeclId) {
        let decl = self.tu.decl(id);
        let Some(init) = decl.init.clone() else { return };
        let line = decl.line;
        let name = decl.name().map(resolve).unwrap_or_default();
        let ty = decl.ty.to_abstract();

        if ty.is_pointer() {
            // Type compatibility of the value is the transform pass's job.
            return;
        }

        if ty.is_array() {
            let dim0 = first_array_dim(&ty);
            let elem = array_elem_type(&ty);
            match &init.kind {
                ExprKind::InitList(elems) => {
                    let mut cur = InitCursor::new(elems);
                    let mut count = 0u64;
                    while cur.peek().is_some() {
                        if dim0 > 0 && count >= dim0 {
                            break;
                        }
                        self.match_object(&elem, &mut cur, line);
                        count += 1;
                    }
                    if cur.peek().is_some() {
                        self.tu.diags.err(
                            line,
                            DiagKind::Initializer,
                            format!("there are too many initializers than var '{}' declared", name),
                        );
                    }
                    if dim0 == 0 {
                        self.backfill_array_dim(id, count);
                    }
                }
                ExprKind::Str(s) => {
                    let need = s.len() as u64 + 1;
                    if dim0 == 0 {
                        self.backfill_array_dim(id, need);
                    } else if need > dim0 {
                        self.tu.diags.err(
                            line,
                            DiagKind::Initializer,
                            format!("there are too many initializers than var '{}' declared", name),
                        );
                    }
                }
                _ => {
                    if dim0 == 0 {
                        self.backfill_array_dim(id, 1);
                    }
                }
            }
            return;
        }

        // Scalar or aggregate: the root initializer is one object.
        let root = [init];
        let mut cur = InitCursor::new(&root);
        self.match_object(&ty, &mut cur, line);
    }

    fn backfill_array_dim(&mut self, id: DeclId, count: u64) {
        let decl = self.tu.decl_mut(id);
        for node in decl.ty.chain.iter_mut() {
            if let DeclTy::Array { dim, .. } = node {
                *dim = count;
                return;
            }
        }
    }

    /// Consume one object of type `ty` from the cursor, descending into
    /// aggregates and arrays.
    fn match_object(&mut self, ty: &TypeName, cur: &mut InitCursor<'_>, line: u32) {
        if ty.is_pointer() {
            cur.next();
            return;
        }

        if ty.is_array() {
            let dim = first_array_dim(ty);
            let elem = array_elem_type(ty);
            match cur.peek().map(|e| &e.kind) {
                Some(ExprKind::InitList(elems)) => {
                    cur.next();
                    let mut sub = InitCursor::new(elems);
                    let mut count = 0u64;
                    while sub.peek().is_some() {
                        if dim > 0 && count >= dim {
                            break;
                        }
                        self.match_object(&elem, &mut sub, line);
                        count += 1;
                    }
                    if sub.peek().is_some() {
                        self.tu.diags.err(
                            line,
                            DiagKind::Initializer,
                            "there are too many initializers than declared",
                        );
                    }
                }
                Some(ExprKind::Str(_)) => {
                    cur.next();
                }
                Some(_) => {
                    // Flat sequence: the elements come straight from the
                    // enclosing list.
                    let mut count = 0u64;
                    while cur.peek().is_some() && (dim == 0 || count < dim) {
                        self.match_object(&elem, cur, line);
                        count += 1;
                    }
                }
                None => {}
            }
            return;
        }

        if ty.is_scalar() && ty.spec.is_aggr() {
            let Some(aggr_id) = ty.spec.aggr else {
                cur.next();
                return;
            };
            let aggr = self.tu.aggr(aggr_id);
            let kind = aggr.kind;
            let tag = aggr.tag.map(resolve).unwrap_or_default();
            if !aggr.is_complete {
                self.tu.diags.err(
                    line,
                    DiagKind::Incompleteness,
                    format!("uses incomplete {} {}", kind.name(), tag),
                );
                cur.next();
                return;
            }
            let fields: Vec<DeclId> = aggr.fields.clone();

            match cur.peek().map(|e| &e.kind) {
                Some(ExprKind::InitList(elems)) => {
                    cur.next();
                    let mut sub = InitCursor::new(elems);
                    match kind {
                        AggrKind::Struct => {
                            for &f in &fields {
                                if sub.peek().is_none() {
                                    // Trailing fields stay zero-initialized.
                                    break;
                                }
                                let fty = self.tu.decl(f).ty.to_abstract();
                                self.match_object(&fty, &mut sub, line);
                            }
                            if sub.peek().is_some() {
                                self.tu.diags.err(
                                    line,
                                    DiagKind::Initializer,
                                    "there are too many initializers than declared",
                                );
                            }
                        }
                        AggrKind::Union => {
                            if let Some(&f) = fields.first() {
                                if sub.peek().is_some() {
                                    let fty = self.tu.decl(f).ty.to_abstract();
                                    self.match_object(&fty, &mut sub, line);
                                }
                            }
                        }
                    }
                }
                Some(_) => {
                    self.tu.diags.err(
                        line,
                        DiagKind::Initializer,
                        format!("unmatch initial value type to {} {}", kind.name(), tag),
                    );
                    cur.next();
                }
                None => {}
            }
            return;
        }

        // Base scalar: one expression; a braced scalar like `{1}` is taken
        // whole.
        cur.next();
    }
}
