//! Scopes, tag registries, and the translation-unit arenas.
//!
//! Scopes form a tree rooted at the global scope (level 0); function bodies
//! are level 1 and nested blocks level 2 and up. Each scope owns its
//! declaration list, struct/union/enum tag registries, typedef list, label
//! tables, and statement list. All cross-references between scopes,
//! declarations, and aggregates are indices into the arenas held by
//! `TranslationUnit`, so the whole AST is dropped wholesale with it.

use crate::frontend::ast::Stmt;
use crate::frontend::declaration::Declaration;
use crate::utils::errors::DiagnosticList;
use crate::utils::intern::Symbol;
use serde::{Deserialize, Serialize};

/// Scope nesting level of the global scope.
pub const GLOBAL_SCOPE: i32 = 0;
/// Scope nesting level of a function body.
pub const FUNCTION_SCOPE: i32 = 1;
/// Scope nesting level of the outermost block/region inside a function.
pub const REGION_SCOPE: i32 = 2;

macro_rules! arena_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(
    /// Index of a scope in the translation unit's scope arena.
    ScopeId
);
arena_id!(
    /// Index of a struct/union in the aggregate arena.
    AggrId
);
arena_id!(
    /// Index of an enum in the enum arena.
    EnumId
);
arena_id!(
    /// Index of a declaration in the declaration arena.
    DeclId
);

/// A label defined in a function (`name:`).
#[derive(Debug, Clone)]
pub struct LabelInfo {
    pub name: Symbol,
    pub line: u32,
    /// Set when some goto referenced the label.
    pub used: bool,
}

/// A lexical scope.
#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    /// 0 global, 1 function, >=2 block
    pub level: i32,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    /// Created for a parameter-type-list; skipped by the dump and not part
    /// of lexical name lookup once the declarator closes.
    pub is_transient: bool,
    /// Declarations in source order.
    pub decls: Vec<DeclId>,
    /// Named struct tags declared in this scope.
    pub structs: Vec<AggrId>,
    /// Named union tags declared in this scope.
    pub unions: Vec<AggrId>,
    /// Enums whose constants are visible in this scope.
    pub enums: Vec<EnumId>,
    /// Declarations introduced with `typedef`.
    pub typedefs: Vec<DeclId>,
    /// Label definitions (function scope only).
    pub label_defs: Vec<LabelInfo>,
    /// Goto references (function scope only).
    pub label_refs: Vec<(Symbol, u32)>,
    /// Statement list of the block this scope belongs to.
    pub stmts: Vec<Stmt>,
    /// Identifier names first seen in this scope.
    pub syms: Vec<Symbol>,
}

impl Scope {
    fn new(id: ScopeId, level: i32, parent: Option<ScopeId>, is_transient: bool) -> Self {
        Self {
            id,
            level,
            parent,
            children: Vec::new(),
            is_transient,
            decls: Vec::new(),
            structs: Vec::new(),
            unions: Vec::new(),
            enums: Vec::new(),
            typedefs: Vec::new(),
            label_defs: Vec::new(),
            label_refs: Vec::new(),
            stmts: Vec::new(),
            syms: Vec::new(),
        }
    }
}

/// Struct or union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggrKind {
    Struct,
    Union,
}

impl AggrKind {
    pub fn name(self) -> &'static str {
        match self {
            AggrKind::Struct => "struct",
            AggrKind::Union => "union",
        }
    }
}

/// A struct or union type. Forward declarations create an incomplete
/// aggregate; the later body fills `fields` and flips `is_complete`, never
/// the other way.
#[derive(Debug)]
pub struct Aggr {
    pub kind: AggrKind,
    /// None for anonymous aggregates, which are never registered in a
    /// scope's tag list.
    pub tag: Option<Symbol>,
    /// Scope the tag was declared in.
    pub scope: ScopeId,
    pub fields: Vec<DeclId>,
    pub is_complete: bool,
    /// Alignment captured from the pragma state at definition time.
    pub align: u32,
    /// Explicit per-field alignment; 0 means natural alignment.
    pub field_align: u32,
    /// Non-zero once an explicit `#pragma align` governs this aggregate.
    pub pack_align: u32,
}

/// One enumerator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumItem {
    pub name: Symbol,
    pub value: i64,
    /// True when the value came from an explicit constant expression.
    pub explicit: bool,
}

/// An enum type: optional name plus ordered constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: Option<Symbol>,
    pub items: Vec<EnumItem>,
}

impl EnumDef {
    /// Back-fill missing enumerator values: the first defaults to 0, each
    /// later one to previous + 1; explicit values (including an explicit 0)
    /// are kept.
    pub fn backfill_values(&mut self) {
        let mut next = 0i64;
        for item in &mut self.items {
            if item.explicit {
                next = item.value;
            } else {
                item.value = next;
            }
            next += 1;
        }
    }
}

/// The product of parsing one C source file: all arenas plus diagnostics.
#[derive(Debug)]
pub struct TranslationUnit {
    pub scopes: Vec<Scope>,
    pub aggrs: Vec<Aggr>,
    pub enums: Vec<EnumDef>,
    pub decls: Vec<Declaration>,
    pub diags: DiagnosticList,
}

impl TranslationUnit {
    /// Create a translation unit holding only the global scope.
    pub fn new() -> Self {
        let mut tu = Self {
            scopes: Vec::new(),
            aggrs: Vec::new(),
            enums: Vec::new(),
            decls: Vec::new(),
            diags: DiagnosticList::new(),
        };
        let id = ScopeId(0);
        tu.scopes.push(Scope::new(id, GLOBAL_SCOPE, None, false));
        tu
    }

    pub fn global_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    pub fn aggr(&self, id: AggrId) -> &Aggr {
        &self.aggrs[id.index()]
    }

    pub fn aggr_mut(&mut self, id: AggrId) -> &mut Aggr {
        &mut self.aggrs[id.index()]
    }

    pub fn enum_def(&self, id: EnumId) -> &EnumDef {
        &self.enums[id.index()]
    }

    pub fn decl(&self, id: DeclId) -> &Declaration {
        &self.decls[id.index()]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Declaration {
        &mut self.decls[id.index()]
    }

    /// Open a child scope under `parent`.
    pub fn alloc_scope(&mut self, parent: ScopeId, is_transient: bool) -> ScopeId {
        let level = self.scope(parent).level + 1;
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new(id, level, Some(parent), is_transient));
        self.scope_mut(parent).children.push(id);
        id
    }

    pub fn alloc_aggr(&mut self, aggr: Aggr) -> AggrId {
        let id = AggrId(self.aggrs.len() as u32);
        self.aggrs.push(aggr);
        id
    }

    pub fn alloc_enum(&mut self, e: EnumDef) -> EnumId {
        let id = EnumId(self.enums.len() as u32);
        self.enums.push(e);
        id
    }

    pub fn alloc_decl(&mut self, decl: Declaration) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    /// Find a declaration by name in one scope.
    pub fn find_decl_in_scope(&self, scope: ScopeId, name: Symbol) -> Option<DeclId> {
        self.scope(scope)
            .decls
            .iter()
            .copied()
            .find(|&d| self.decl(d).name() == Some(name))
    }

    /// Find a declaration by name from `scope` outward through parents.
    pub fn find_decl_in_outer(&self, scope: ScopeId, name: Symbol) -> Option<DeclId> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            if let Some(d) = self.find_decl_in_scope(id, name) {
                return Some(d);
            }
            cur = self.scope(id).parent;
        }
        None
    }

    /// Find a typedef declaration by name from `scope` outward.
    pub fn find_typedef_in_outer(&self, scope: ScopeId, name: Symbol) -> Option<DeclId> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            if let Some(d) = self
                .scope(id)
                .typedefs
                .iter()
                .copied()
                .find(|&d| self.decl(d).name() == Some(name))
            {
                return Some(d);
            }
            cur = self.scope(id).parent;
        }
        None
    }

    /// Find a struct tag from `scope` outward.
    pub fn find_struct_in_outer(&self, scope: ScopeId, tag: Symbol) -> Option<AggrId> {
        self.find_aggr_in_outer(scope, tag, AggrKind::Struct)
    }

    /// Find a union tag from `scope` outward.
    pub fn find_union_in_outer(&self, scope: ScopeId, tag: Symbol) -> Option<AggrId> {
        self.find_aggr_in_outer(scope, tag, AggrKind::Union)
    }

    /// Find a struct or union tag from `scope` outward.
    pub fn find_aggr_in_outer(&self, scope: ScopeId, tag: Symbol, kind: AggrKind) -> Option<AggrId> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let list = match kind {
                AggrKind::Struct => &self.scope(id).structs,
                AggrKind::Union => &self.scope(id).unions,
            };
            if let Some(&a) = list.iter().find(|&&a| self.aggr(a).tag == Some(tag)) {
                return Some(a);
            }
            cur = self.scope(id).parent;
        }
        None
    }

    /// Find a complete struct/union with the given tag from `scope` outward,
    /// for back-filling references that were recorded while the tag was
    /// still incomplete.
    pub fn find_complete_aggr_in_outer(
        &self,
        scope: ScopeId,
        tag: Symbol,
        kind: AggrKind,
    ) -> Option<AggrId> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let list = match kind {
                AggrKind::Struct => &self.scope(id).structs,
                AggrKind::Union => &self.scope(id).unions,
            };
            if let Some(&a) = list
                .iter()
                .find(|&&a| self.aggr(a).tag == Some(tag) && self.aggr(a).is_complete)
            {
                return Some(a);
            }
            cur = self.scope(id).parent;
        }
        None
    }

    /// Find a named enum tag from `scope` outward.
    pub fn find_enum_tag_in_outer(&self, scope: ScopeId, name: Symbol) -> Option<EnumId> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            if let Some(&e) = self
                .scope(id)
                .enums
                .iter()
                .find(|&&e| self.enum_def(e).name == Some(name))
            {
                return Some(e);
            }
            cur = self.scope(id).parent;
        }
        None
    }

    /// Find an enum constant by name in one scope's enum list.
    pub fn find_enum_const_in_scope(&self, scope: ScopeId, name: Symbol) -> Option<(EnumId, usize)> {
        for &e in &self.scope(scope).enums {
            if let Some(idx) = self.enum_def(e).items.iter().position(|i| i.name == name) {
                return Some((e, idx));
            }
        }
        None
    }

    /// Find an enum constant by name from `scope` outward.
    pub fn find_enum_const_in_outer(&self, scope: ScopeId, name: Symbol) -> Option<(EnumId, usize)> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            if let Some(hit) = self.find_enum_const_in_scope(id, name) {
                return Some(hit);
            }
            cur = self.scope(id).parent;
        }
        None
    }

    /// Value of an enum constant.
    pub fn enum_const_value(&self, id: EnumId, index: usize) -> i64 {
        self.enum_def(id).items[index].value
    }

    /// The enclosing function-level scope of `scope`, if any.
    pub fn function_scope_of(&self, scope: ScopeId) -> Option<ScopeId> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            if self.scope(id).level == FUNCTION_SCOPE {
                return Some(id);
            }
            cur = self.scope(id).parent;
        }
        None
    }
}

impl Default for TranslationUnit {
    fn default() -> Self {
        Self::new()
    }
}
