//! Type specifier builder.
//!
//! C specifier syntax is order-free and multi-token (`unsigned long const
//! static x`), so the builder accumulates flag bits into a flat bitset as
//! each token is seen and validates the combination once when the specifier
//! is finished. The ancillary references (aggregate, enum, typedef target)
//! are co-valid with the corresponding base-kind bit.

use crate::frontend::parser::Parser;
use crate::frontend::scope::{AggrId, DeclId, EnumId};
use crate::frontend::token::TokenKind;
use crate::utils::errors::DiagKind;
use crate::utils::intern::intern;
use serde::{Deserialize, Serialize};

pub const SPEC_VOID: u32 = 1 << 0;
pub const SPEC_CHAR: u32 = 1 << 1;
pub const SPEC_SHORT: u32 = 1 << 2;
pub const SPEC_INT: u32 = 1 << 3;
pub const SPEC_LONG: u32 = 1 << 4;
pub const SPEC_LONGLONG: u32 = 1 << 5;
pub const SPEC_FLOAT: u32 = 1 << 6;
pub const SPEC_DOUBLE: u32 = 1 << 7;
pub const SPEC_BOOL: u32 = 1 << 8;
pub const SPEC_SIGNED: u32 = 1 << 9;
pub const SPEC_UNSIGNED: u32 = 1 << 10;
pub const SPEC_STRUCT: u32 = 1 << 11;
pub const SPEC_UNION: u32 = 1 << 12;
pub const SPEC_ENUM: u32 = 1 << 13;
pub const SPEC_USER_TYPE: u32 = 1 << 14;

pub const QUA_CONST: u32 = 1 << 15;
pub const QUA_VOLATILE: u32 = 1 << 16;
pub const QUA_RESTRICT: u32 = 1 << 17;

pub const STOR_AUTO: u32 = 1 << 18;
pub const STOR_REGISTER: u32 = 1 << 19;
pub const STOR_STATIC: u32 = 1 << 20;
pub const STOR_EXTERN: u32 = 1 << 21;
pub const STOR_INLINE: u32 = 1 << 22;
pub const STOR_TYPEDEF: u32 = 1 << 23;

/// Simple (non-tag, non-user) base kinds.
pub const SIMPLE_MASK: u32 = SPEC_VOID
    | SPEC_CHAR
    | SPEC_SHORT
    | SPEC_INT
    | SPEC_LONG
    | SPEC_LONGLONG
    | SPEC_FLOAT
    | SPEC_DOUBLE
    | SPEC_BOOL;
/// All base kinds (sign excluded).
pub const BASE_MASK: u32 = SIMPLE_MASK | SPEC_STRUCT | SPEC_UNION | SPEC_ENUM | SPEC_USER_TYPE;
pub const SIGN_MASK: u32 = SPEC_SIGNED | SPEC_UNSIGNED;
pub const QUA_MASK: u32 = QUA_CONST | QUA_VOLATILE | QUA_RESTRICT;
pub const STOR_MASK: u32 =
    STOR_AUTO | STOR_REGISTER | STOR_STATIC | STOR_EXTERN | STOR_INLINE | STOR_TYPEDEF;

/// A flat specifier bitset plus the references that accompany tag and
/// typedef base kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub des: u32,
    /// Referenced struct/union when STRUCT/UNION is set.
    pub aggr: Option<AggrId>,
    /// Referenced enum when ENUM is set.
    pub enum_id: Option<EnumId>,
    /// Referenced typedef declaration when USER_TYPE is set.
    pub user_type: Option<DeclId>,
}

impl TypeSpec {
    pub fn new(des: u32) -> Self {
        Self { des, ..Self::default() }
    }

    pub fn has(&self, flags: u32) -> bool {
        self.des & flags != 0
    }

    pub fn set(&mut self, flags: u32) {
        self.des |= flags;
    }

    pub fn clear(&mut self, flags: u32) {
        self.des &= !flags;
    }

    pub fn is_const(&self) -> bool {
        self.has(QUA_CONST)
    }

    pub fn is_volatile(&self) -> bool {
        self.has(QUA_VOLATILE)
    }

    pub fn is_typedef(&self) -> bool {
        self.has(STOR_TYPEDEF)
    }

    pub fn is_static(&self) -> bool {
        self.has(STOR_STATIC)
    }

    pub fn is_extern(&self) -> bool {
        self.has(STOR_EXTERN)
    }

    pub fn is_inline(&self) -> bool {
        self.has(STOR_INLINE)
    }

    pub fn is_void(&self) -> bool {
        self.has(SPEC_VOID)
    }

    pub fn is_struct(&self) -> bool {
        self.has(SPEC_STRUCT)
    }

    pub fn is_union(&self) -> bool {
        self.has(SPEC_UNION)
    }

    pub fn is_aggr(&self) -> bool {
        self.has(SPEC_STRUCT | SPEC_UNION)
    }

    pub fn is_enum(&self) -> bool {
        self.has(SPEC_ENUM)
    }

    pub fn is_user_type_ref(&self) -> bool {
        self.has(SPEC_USER_TYPE)
    }

    pub fn is_float(&self) -> bool {
        self.has(SPEC_FLOAT)
    }

    pub fn is_double(&self) -> bool {
        self.has(SPEC_DOUBLE)
    }

    /// Floating point (float or double).
    pub fn is_fp(&self) -> bool {
        self.has(SPEC_FLOAT | SPEC_DOUBLE)
    }

    /// Integer kinds; enums count as integers.
    pub fn is_integer(&self) -> bool {
        self.has(
            SPEC_CHAR
                | SPEC_SHORT
                | SPEC_INT
                | SPEC_LONG
                | SPEC_LONGLONG
                | SPEC_BOOL
                | SPEC_SIGNED
                | SPEC_UNSIGNED
                | SPEC_ENUM,
        )
    }

    /// Arithmetic = integer or floating point.
    pub fn is_arith(&self) -> bool {
        self.is_integer() || self.is_fp()
    }

    /// Non-tag, non-user base kind (or bare sign).
    pub fn is_simple_base(&self) -> bool {
        self.has(SIMPLE_MASK | SIGN_MASK)
    }

    /// Supply the implicit INT: a finished specifier with sign or storage
    /// bits but no base kind means `int` (`register x` is `register int x`).
    pub fn complement_int(&mut self) {
        let has_base = self.des & BASE_MASK != 0;
        let wants_int =
            self.des & (SIGN_MASK | STOR_AUTO | STOR_REGISTER | STOR_STATIC | STOR_EXTERN) != 0;
        if !has_base && wants_int {
            self.set(SPEC_INT);
        }
    }

    /// Validate the finished bitset: exactly one base kind, no contradictory
    /// category pairs, size/sign modifiers only where ANSI C allows them.
    pub fn check_legality(&self) -> Result<(), String> {
        let des = self.des;
        let aggr = des & (SPEC_STRUCT | SPEC_UNION) != 0;
        let en = des & SPEC_ENUM != 0;
        let user = des & SPEC_USER_TYPE != 0;
        let simple = des & SIMPLE_MASK != 0 || des & SIGN_MASK != 0;

        if des & SPEC_STRUCT != 0 && des & SPEC_UNION != 0 {
            return Err("struct cannot be combined with union".into());
        }
        if aggr && en {
            return Err("struct or union cannot be combined with enum".into());
        }
        if aggr && simple {
            return Err("struct or union cannot be combined with a base type".into());
        }
        if aggr && user {
            return Err("struct or union cannot be combined with a typedef name".into());
        }
        if en && simple {
            return Err("enum cannot be combined with a base type".into());
        }
        if en && user {
            return Err("enum cannot be combined with a typedef name".into());
        }
        if simple && user {
            return Err("typedef name cannot be combined with a base type".into());
        }

        if des & SIGN_MASK == SIGN_MASK {
            return Err("both signed and unsigned used".into());
        }
        if des & STOR_STATIC != 0 && des & STOR_EXTERN != 0 {
            return Err("static and extern cannot be specified meanwhile".into());
        }

        // Size/sign modifiers on simple bases.
        let size_bits = des & (SPEC_SHORT | SPEC_LONG | SPEC_LONGLONG);
        if size_bits != 0 {
            if des & SPEC_SHORT != 0 && des & (SPEC_LONG | SPEC_LONGLONG) != 0 {
                return Err("short cannot be combined with long".into());
            }
            let carrier = des & (SIMPLE_MASK & !(SPEC_SHORT | SPEC_LONG | SPEC_LONGLONG));
            let legal_carrier = match carrier {
                0 | SPEC_INT => true,
                SPEC_DOUBLE | SPEC_FLOAT => des & SPEC_SHORT == 0,
                _ => false,
            };
            if !legal_carrier {
                return Err("size modifier used with an incompatible base type".into());
            }
        }
        if des & SIGN_MASK != 0 {
            let carrier = des & SIMPLE_MASK & !(SPEC_SHORT | SPEC_LONG | SPEC_LONGLONG);
            if carrier & (SPEC_VOID | SPEC_FLOAT | SPEC_DOUBLE | SPEC_BOOL) != 0 {
                return Err("sign modifier used with an incompatible base type".into());
            }
        }

        // Exactly one remaining base kind among the mutually exclusive ones.
        let exclusive = des & (SPEC_VOID | SPEC_CHAR | SPEC_INT | SPEC_FLOAT | SPEC_DOUBLE | SPEC_BOOL);
        if exclusive.count_ones() > 1 {
            return Err("more than one base type in specifier".into());
        }
        if des & SPEC_VOID != 0 && size_bits != 0 {
            return Err("void cannot carry a size modifier".into());
        }
        if des & (SPEC_CHAR | SPEC_BOOL) != 0 && size_bits != 0 {
            return Err("size modifier used with an incompatible base type".into());
        }
        Ok(())
    }
}

impl Parser {
    /// declaration_specifiers:
    ///     storage-class / type-specifier / type-qualifier, repeated.
    /// Returns None when the current token cannot begin a specifier.
    pub(crate) fn parse_declaration_specifiers(&mut self) -> Option<TypeSpec> {
        self.parse_specifier_seq(true)
    }

    /// specifier_qualifier_list: like declaration_specifiers but without
    /// storage classes (struct fields, type names).
    pub(crate) fn parse_specifier_qualifier_list(&mut self) -> Option<TypeSpec> {
        self.parse_specifier_seq(false)
    }

    fn parse_specifier_seq(&mut self, allow_storage: bool) -> Option<TypeSpec> {
        let mut ty: Option<TypeSpec> = None;
        loop {
            match self.peek_kind() {
                TokenKind::Auto
                | TokenKind::Register
                | TokenKind::Static
                | TokenKind::Extern
                | TokenKind::Inline
                | TokenKind::Typedef => {
                    if !allow_storage {
                        break;
                    }
                    let spec = ty.get_or_insert_with(TypeSpec::default);
                    self.add_storage_class(spec);
                }
                TokenKind::Const | TokenKind::Volatile | TokenKind::Restrict => {
                    let spec = ty.get_or_insert_with(TypeSpec::default);
                    self.add_qualifier(spec);
                }
                TokenKind::Void
                | TokenKind::Char
                | TokenKind::Short
                | TokenKind::Int
                | TokenKind::Long
                | TokenKind::Float
                | TokenKind::Double
                | TokenKind::Bool
                | TokenKind::Signed
                | TokenKind::Unsigned => {
                    let spec = ty.get_or_insert_with(TypeSpec::default);
                    self.add_type_keyword(spec);
                }
                TokenKind::Struct | TokenKind::Union => {
                    let is_struct = self.peek_kind() == TokenKind::Struct;
                    let spec = ty.take().unwrap_or_default();
                    ty = Some(self.parse_aggr_spec(spec, is_struct));
                }
                TokenKind::Enum => {
                    let spec = ty.take().unwrap_or_default();
                    ty = Some(self.parse_enum_spec(spec));
                }
                TokenKind::Identifier => {
                    let (new_ty, done) = self.specifier_identifier(ty.take());
                    ty = new_ty;
                    if done {
                        break;
                    }
                }
                _ => break,
            }
        }

        if let Some(spec) = &ty {
            if let Err(msg) = spec.check_legality() {
                self.err_here(DiagKind::Specifier, msg);
            }
        }
        ty
    }

    fn add_storage_class(&mut self, spec: &mut TypeSpec) {
        let kind = self.peek_kind();
        let line = self.line();
        self.advance();
        match kind {
            TokenKind::Auto => {
                if spec.des & STOR_MASK & !STOR_AUTO != 0 {
                    self.tu.diags.err(
                        line,
                        DiagKind::Specifier,
                        "auto cannot be specified with another storage class",
                    );
                    return;
                }
                spec.set(STOR_AUTO);
            }
            TokenKind::Register => spec.set(STOR_REGISTER),
            TokenKind::Static => {
                if spec.is_extern() {
                    self.tu.diags.err(
                        line,
                        DiagKind::Specifier,
                        "static and extern cannot be specified meanwhile",
                    );
                    return;
                }
                spec.set(STOR_STATIC);
            }
            TokenKind::Extern => {
                if spec.is_static() {
                    self.tu.diags.err(
                        line,
                        DiagKind::Specifier,
                        "static and extern cannot be specified meanwhile",
                    );
                    return;
                }
                spec.set(STOR_EXTERN);
            }
            TokenKind::Inline => spec.set(STOR_INLINE),
            TokenKind::Typedef => spec.set(STOR_TYPEDEF),
            _ => unreachable!(),
        }
    }

    fn add_qualifier(&mut self, spec: &mut TypeSpec) {
        let kind = self.peek_kind();
        let line = self.line();
        self.advance();
        let flag = match kind {
            TokenKind::Const => QUA_CONST,
            TokenKind::Volatile => QUA_VOLATILE,
            TokenKind::Restrict => QUA_RESTRICT,
            _ => unreachable!(),
        };
        if spec.has(flag) && flag != QUA_RESTRICT {
            self.tu.diags.err(
                line,
                DiagKind::Specifier,
                "same type qualifier used more than once",
            );
            return;
        }
        spec.set(flag);
    }

    fn add_type_keyword(&mut self, spec: &mut TypeSpec) {
        let kind = self.peek_kind();
        let line = self.line();
        self.advance();
        match kind {
            TokenKind::Void => spec.set(SPEC_VOID),
            TokenKind::Char => spec.set(SPEC_CHAR),
            TokenKind::Short => spec.set(SPEC_SHORT),
            TokenKind::Int => spec.set(SPEC_INT),
            TokenKind::Long => {
                if spec.has(SPEC_LONG) {
                    // `long long` spelled as two tokens collapses once.
                    spec.clear(SPEC_LONG);
                    spec.set(SPEC_LONGLONG);
                } else if spec.has(SPEC_LONGLONG) {
                    self.tu.diags.err(line, DiagKind::Specifier, "type specifier is illegal");
                } else {
                    spec.set(SPEC_LONG);
                }
            }
            TokenKind::Float => spec.set(SPEC_FLOAT),
            TokenKind::Double => spec.set(SPEC_DOUBLE),
            TokenKind::Bool => spec.set(SPEC_BOOL),
            TokenKind::Signed => spec.set(SPEC_SIGNED),
            TokenKind::Unsigned => spec.set(SPEC_UNSIGNED),
            _ => unreachable!(),
        }
    }

    /// An identifier in specifier position: try typedef names, then struct
    /// tags, then union tags, walking outward through scopes. Returns the
    /// updated specifier and whether the specifier list is finished.
    fn specifier_identifier(&mut self, ty: Option<TypeSpec>) -> (Option<TypeSpec>, bool) {
        let name = intern(&self.peek().lexeme);

        if let Some(ut) = self.tu.find_typedef_in_outer(self.cur_scope, name) {
            if let Some(spec) = &ty {
                if spec.is_user_type_ref() || spec.is_aggr() {
                    self.err_here(DiagKind::Redefinition, "redeclared user defined type");
                    return (ty, true);
                }
            }
            self.advance();
            let mut spec = ty.unwrap_or_default();
            spec.set(SPEC_USER_TYPE);
            spec.user_type = Some(ut);
            return (Some(spec), false);
        }

        if let Some(s) = self.tu.find_struct_in_outer(self.cur_scope, name) {
            if let Some(spec) = &ty {
                if spec.is_user_type_ref() || spec.is_aggr() {
                    self.err_here(DiagKind::Redefinition, "redeclared struct type");
                    return (ty, true);
                }
            }
            self.advance();
            let mut spec = ty.unwrap_or_default();
            spec.set(SPEC_STRUCT);
            spec.aggr = Some(s);
            return (Some(spec), false);
        }

        if let Some(u) = self.tu.find_union_in_outer(self.cur_scope, name) {
            if let Some(spec) = &ty {
                if spec.is_user_type_ref() || spec.is_aggr() {
                    self.err_here(DiagKind::Redefinition, "redeclared union type");
                    return (ty, true);
                }
            }
            self.advance();
            let mut spec = ty.unwrap_or_default();
            spec.set(SPEC_UNION);
            spec.aggr = Some(u);
            return (Some(spec), false);
        }

        // Not a type: the identifier belongs to the declarator.
        (ty, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legality_accepts_common_combos() {
        for des in [
            SPEC_INT,
            SPEC_UNSIGNED | SPEC_INT,
            SPEC_SIGNED | SPEC_LONG | SPEC_INT,
            SPEC_LONGLONG,
            SPEC_UNSIGNED | SPEC_LONGLONG | SPEC_INT,
            SPEC_SHORT,
            SPEC_SHORT | SPEC_INT,
            SPEC_CHAR | SPEC_UNSIGNED,
            SPEC_DOUBLE | SPEC_LONG,
            SPEC_FLOAT,
            SPEC_VOID,
            QUA_CONST | QUA_VOLATILE | SPEC_INT,
        ] {
            assert!(TypeSpec::new(des).check_legality().is_ok(), "des {:#x}", des);
        }
    }

    #[test]
    fn test_legality_rejects_contradictions() {
        for des in [
            SPEC_STRUCT | SPEC_ENUM,
            SPEC_STRUCT | SPEC_INT,
            SPEC_ENUM | SPEC_CHAR,
            SPEC_USER_TYPE | SPEC_INT,
            SPEC_INT | SPEC_FLOAT,
            SPEC_SHORT | SPEC_LONG,
            SPEC_SHORT | SPEC_DOUBLE,
            SPEC_SIGNED | SPEC_UNSIGNED | SPEC_INT,
            SPEC_UNSIGNED | SPEC_DOUBLE,
            STOR_STATIC | STOR_EXTERN | SPEC_INT,
            SPEC_VOID | SPEC_LONG,
        ] {
            assert!(TypeSpec::new(des).check_legality().is_err(), "des {:#x}", des);
        }
    }

    #[test]
    fn test_complement_int() {
        let mut spec = TypeSpec::new(SPEC_UNSIGNED);
        spec.complement_int();
        assert!(spec.has(SPEC_INT));

        let mut spec = TypeSpec::new(STOR_REGISTER);
        spec.complement_int();
        assert!(spec.has(SPEC_INT));

        let mut spec = TypeSpec::new(SPEC_CHAR | SPEC_UNSIGNED);
        spec.complement_int();
        assert!(!spec.has(SPEC_INT));

        // Qualifiers alone do not imply int.
        let mut spec = TypeSpec::new(QUA_CONST);
        spec.complement_int();
        assert!(!spec.has(SPEC_INT));
    }
}
