//! Human-readable formatting of declarations, types, and the scope tree.
//!
//! Declarations are reconstructed in source-like syntax by walking the
//! canonical declarator chain from its outermost operator back toward the
//! identifier, re-inserting the parentheses recorded at parse time.

use crate::frontend::declaration::Declaration;
use crate::frontend::declarator::{DeclTy, TypeName};
use crate::frontend::layout;
use crate::frontend::scope::{AggrId, EnumId, ScopeId, TranslationUnit};
use crate::frontend::specifier::{
    TypeSpec, QUA_CONST, QUA_RESTRICT, QUA_VOLATILE, SPEC_CHAR, SPEC_DOUBLE, SPEC_FLOAT, SPEC_INT,
    SPEC_LONG, SPEC_LONGLONG, SPEC_SHORT, SPEC_SIGNED, SPEC_UNSIGNED, SPEC_VOID,
};
use crate::utils::intern::resolve;
use std::fmt::Write;

fn fmt_storage(spec: &TypeSpec, buf: &mut String) {
    if spec.has(crate::frontend::specifier::STOR_REGISTER) {
        buf.push_str("register ");
    }
    if spec.is_static() {
        buf.push_str("static ");
    }
    if spec.is_extern() {
        buf.push_str("extern ");
    }
    if spec.is_inline() {
        buf.push_str("inline ");
    }
    if spec.is_typedef() {
        buf.push_str("typedef ");
    }
}

fn fmt_qualifiers(des: u32, buf: &mut String) {
    if des & QUA_CONST != 0 {
        buf.push_str("const ");
    }
    if des & QUA_VOLATILE != 0 {
        buf.push_str("volatile ");
    }
    if des & QUA_RESTRICT != 0 {
        buf.push_str("restrict ");
    }
}

fn fmt_base(spec: &TypeSpec, buf: &mut String) {
    let des = spec.des;
    if des & SPEC_SIGNED != 0 {
        buf.push_str("signed ");
    }
    if des & SPEC_UNSIGNED != 0 {
        buf.push_str("unsigned ");
    }
    if des & SPEC_CHAR != 0 {
        buf.push_str("char ");
    }
    if des & SPEC_SHORT != 0 {
        buf.push_str("short ");
    }
    if des & SPEC_LONG != 0 {
        buf.push_str("long ");
    }
    if des & SPEC_INT != 0 {
        buf.push_str("int ");
    }
    if des & SPEC_LONGLONG != 0 {
        buf.push_str("long long ");
    }
    if des & SPEC_FLOAT != 0 {
        buf.push_str("float ");
    }
    if des & SPEC_DOUBLE != 0 {
        buf.push_str("double ");
    }
    if des & SPEC_VOID != 0 {
        buf.push_str("void ");
    }
    if des & crate::frontend::specifier::SPEC_BOOL != 0 {
        buf.push_str("_Bool ");
    }
}

fn fmt_enum(tu: &TranslationUnit, id: Option<EnumId>, buf: &mut String) {
    buf.push_str("enum ");
    let Some(id) = id else { return };
    let e = tu.enum_def(id);
    if let Some(name) = e.name {
        let _ = write!(buf, "{} ", resolve(name));
    }
    if !e.items.is_empty() {
        buf.push('{');
        for item in &e.items {
            let _ = write!(buf, "{} ", resolve(item.name));
        }
        buf.push_str("} ");
    }
}

fn fmt_aggr(tu: &TranslationUnit, id: Option<AggrId>, with_members: bool, buf: &mut String) {
    let Some(id) = id else {
        buf.push_str("struct ");
        return;
    };
    let aggr = tu.aggr(id);
    let _ = write!(buf, "{} ", aggr.kind.name());
    if let Some(tag) = aggr.tag {
        let _ = write!(buf, "{} ", resolve(tag));
    }
    if with_members && aggr.is_complete {
        buf.push('{');
        for &f in &aggr.fields {
            format_declaration_into(tu, tu.decl(f), buf);
            buf.push_str("; ");
        }
        buf.push('}');
    }
}

/// Format the specifier part. Aggregate members are spelled out only when
/// the declarator does not reach the aggregate through a pointer.
fn fmt_spec(tu: &TranslationUnit, spec: &TypeSpec, is_ptr: bool, buf: &mut String) {
    fmt_storage(spec, buf);
    fmt_qualifiers(spec.des, buf);
    if spec.is_aggr() {
        fmt_aggr(tu, spec.aggr, !is_ptr, buf);
    } else if spec.is_enum() {
        fmt_enum(tu, spec.enum_id, buf);
    } else if spec.is_user_type_ref() {
        if let Some(ut) = spec.user_type {
            format_declaration_into(tu, tu.decl(ut), buf);
        }
    } else {
        fmt_base(spec, buf);
    }
}

/// Format the chain from its outermost operator inward. `i` indexes the
/// node being printed; the previous node is everything it wraps.
fn fmt_chain_rev(tu: &TranslationUnit, chain: &[DeclTy], i: isize, buf: &mut String) {
    if i < 0 {
        return;
    }
    match &chain[i as usize] {
        DeclTy::Id { sym } => {
            let _ = write!(buf, "{} ", resolve(*sym));
        }
        DeclTy::Pointer { qua } => {
            fmt_qualifiers(*qua, buf);
            buf.push_str("* ");
            fmt_chain_rev(tu, chain, i - 1, buf);
        }
        DeclTy::Array { dim, paren, .. } => {
            if *paren {
                buf.push('(');
                fmt_chain_rev(tu, chain, i - 1, buf);
                buf.push(')');
            } else {
                fmt_chain_rev(tu, chain, i - 1, buf);
            }
            let _ = write!(buf, "[{}]", dim);
        }
        DeclTy::Fun { params, .. } => {
            let prev_is_pointer =
                i > 0 && matches!(chain[(i - 1) as usize], DeclTy::Pointer { .. });
            if prev_is_pointer {
                buf.push('(');
                fmt_chain_rev(tu, chain, i - 1, buf);
                buf.push(')');
            } else {
                fmt_chain_rev(tu, chain, i - 1, buf);
            }
            buf.push('(');
            for (k, p) in params.iter().enumerate() {
                if k > 0 {
                    buf.push(',');
                }
                format_declaration_into(tu, p, buf);
            }
            buf.push(')');
        }
        DeclTy::Variadic => {
            buf.push_str("...");
        }
    }
}

fn fmt_chain(tu: &TranslationUnit, chain: &[DeclTy], buf: &mut String) {
    if chain.is_empty() {
        return;
    }
    fmt_chain_rev(tu, chain, chain.len() as isize - 1, buf);
}

fn format_declaration_into(tu: &TranslationUnit, decl: &Declaration, buf: &mut String) {
    if decl.is_variadic_marker() {
        buf.push_str("...");
        return;
    }
    fmt_spec(tu, &decl.ty.spec, decl.is_pointer(), buf);
    fmt_chain(tu, &decl.ty.chain, buf);
    if decl.is_bit_field {
        let _ = write!(buf, ":{}", decl.bit_len);
    }
}

/// Reconstruct a declaration in source-like syntax (without the trailing
/// semicolon).
pub fn format_declaration(tu: &TranslationUnit, decl: &Declaration) -> String {
    let mut buf = String::new();
    format_declaration_into(tu, decl, &mut buf);
    buf.trim_end().to_string()
}

/// Format a stand-alone type (abstract declarator).
pub fn format_type_name(tu: &TranslationUnit, ty: &TypeName) -> String {
    let mut buf = String::new();
    fmt_spec(tu, &ty.spec, ty.is_pointer(), &mut buf);
    fmt_chain(tu, &ty.chain, &mut buf);
    if let Some(bits) = ty.bit_len {
        let _ = write!(buf, ":{}", bits);
    }
    buf.trim_end().to_string()
}

/// Normalize whitespace so formatted output compares stably.
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn dump_scope_into(tu: &TranslationUnit, scope: ScopeId, indent: usize, out: &mut String) {
    let sc = tu.scope(scope);
    let pad = " ".repeat(indent);
    let _ = writeln!(out, "{}SCOPE(id:{}, level:{})", pad, sc.id.0, sc.level);

    for &e in &sc.enums {
        let mut buf = String::new();
        fmt_enum(tu, Some(e), &mut buf);
        let _ = writeln!(out, "{}  ENUM: {}", pad, buf.trim_end());
    }
    for &s in sc.structs.iter().chain(sc.unions.iter()) {
        let mut buf = String::new();
        fmt_aggr(tu, Some(s), true, &mut buf);
        let aggr = tu.aggr(s);
        let size = if aggr.is_complete {
            layout::spec_size(
                tu,
                &{
                    let mut spec = TypeSpec::new(match aggr.kind {
                        crate::frontend::scope::AggrKind::Struct => {
                            crate::frontend::specifier::SPEC_STRUCT
                        }
                        crate::frontend::scope::AggrKind::Union => {
                            crate::frontend::specifier::SPEC_UNION
                        }
                    });
                    spec.aggr = Some(s);
                    spec
                },
            )
        } else {
            0
        };
        let _ = writeln!(out, "{}  TAG: {} (size:{})", pad, buf.trim_end(), size);
    }
    for &d in &sc.decls {
        let decl = tu.decl(d);
        let _ = writeln!(
            out,
            "{}  DECLARATION(line:{}): {}",
            pad,
            decl.line,
            format_declaration(tu, decl)
        );
        if let Some(body) = decl.body {
            dump_scope_into(tu, body, indent + 4, out);
        }
    }
    for &child in &sc.children {
        let c = tu.scope(child);
        // Transient parameter scopes and function bodies (dumped with
        // their declaration above) are skipped here.
        if c.is_transient {
            continue;
        }
        let owned_by_fun = sc
            .decls
            .iter()
            .any(|&d| tu.decl(d).body == Some(child));
        if owned_by_fun {
            continue;
        }
        dump_scope_into(tu, child, indent + 2, out);
    }
}

/// Dump the scope tree rooted at the global scope.
pub fn dump_translation_unit(tu: &TranslationUnit) -> String {
    let mut out = String::new();
    dump_scope_into(tu, tu.global_scope(), 0, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::Parser;
    use crate::utils::intern::intern;

    fn parse_tu(source: &str) -> TranslationUnit {
        let mut parser = Parser::from_source(source).unwrap();
        parser.parse_translation_unit();
        parser.finish()
    }

    fn fmt_of(source: &str, name: &str) -> String {
        let tu = parse_tu(source);
        assert_eq!(tu.diags.error_count(), 0, "{:?}", tu.diags.errors());
        let id = tu
            .find_decl_in_scope(tu.global_scope(), intern(name))
            .expect("decl not found");
        normalize_ws(&format_declaration(&tu, tu.decl(id)))
    }

    #[test]
    fn test_roundtrip_simple() {
        assert_eq!(fmt_of("int x;", "x"), "int x");
        assert_eq!(fmt_of("unsigned long u;", "u"), "unsigned long u");
        assert_eq!(fmt_of("char *s;", "s"), "char * s");
    }

    #[test]
    fn test_roundtrip_array_and_pointer() {
        assert_eq!(fmt_of("int a[10];", "a"), "int a [10]");
        assert_eq!(fmt_of("int (*q)[30];", "q"), "int ( * q )[30]");
    }

    #[test]
    fn test_roundtrip_function_pointer() {
        let s = fmt_of("int (*fp)(char c);", "fp");
        assert!(s.contains("( * fp )"), "{}", s);
        assert!(s.contains("(char c"), "{}", s);
    }

    #[test]
    fn test_bitfield_suffix() {
        let tu = parse_tu("struct S { int a : 3; };");
        let id = tu.find_struct_in_outer(tu.global_scope(), intern("S")).unwrap();
        let f = tu.aggr(id).fields[0];
        let s = normalize_ws(&format_declaration(&tu, tu.decl(f)));
        assert_eq!(s, "int a :3");
    }

    #[test]
    fn test_dump_contains_decls_and_tags() {
        let tu = parse_tu("struct S { int a; }; int x; void f(void) { int y; }");
        let dump = dump_translation_unit(&tu);
        assert!(dump.contains("SCOPE(id:0, level:0)"));
        assert!(dump.contains("struct S"));
        assert!(dump.contains("int x"));
        assert!(dump.contains("int y"));
    }
}
