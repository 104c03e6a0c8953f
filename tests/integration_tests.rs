//! End-to-end tests for the C front-end pipeline.

use cfront::frontend::declarator::DeclTy;
use cfront::frontend::layout::{self, BYTE_PER_INT, BYTE_PER_POINTER};
use cfront::frontend::{DeclId, StmtKind, TranslationUnit};
use cfront::prelude::*;
use cfront::utils::pretty::{format_declaration, normalize_ws};

fn analyze(source: &str) -> TranslationUnit {
    cfront::analyze(source).expect("fatal front-end error")
}

fn analyze_clean(source: &str) -> TranslationUnit {
    let tu = analyze(source);
    assert_eq!(tu.diags.error_count(), 0, "errors: {:?}", tu.diags.errors());
    tu
}

fn global(tu: &TranslationUnit, name: &str) -> DeclId {
    tu.find_decl_in_scope(tu.global_scope(), intern(name))
        .unwrap_or_else(|| panic!("no global declaration '{}'", name))
}

fn shape(chain: &[DeclTy]) -> String {
    chain
        .iter()
        .map(|d| match d {
            DeclTy::Id { .. } => "ID".to_string(),
            DeclTy::Pointer { .. } => "PTR".to_string(),
            DeclTy::Array { dim, .. } => format!("ARR({})", dim),
            DeclTy::Fun { .. } => "FUN".to_string(),
            DeclTy::Variadic => "VARIADIC".to_string(),
        })
        .collect::<Vec<_>>()
        .join("->")
}

// Scenario 1: int *(*p)[30];
#[test]
fn test_pointer_to_array_of_pointers() {
    let tu = analyze_clean("int *(*p)[30];");
    let p = tu.decl(global(&tu, "p"));
    assert_eq!(shape(&p.ty.chain), "ID->PTR->ARR(30)->PTR");
    assert!(p.ty.is_pointer());
    assert!(!p.ty.is_array());
    assert!(!p.ty.is_fun_decl());
    assert_eq!(layout::decl_size(&tu, p), BYTE_PER_POINTER);
}

// Scenario 2: bit-field packing.
#[test]
fn test_bitfield_layout() {
    let tu = analyze_clean("struct S { int a:3; int b:5; int c; } s;");
    let s = tu.decl(global(&tu, "s"));
    assert_eq!(layout::decl_size(&tu, s), 2 * BYTE_PER_INT);

    let id = tu
        .find_struct_in_outer(tu.global_scope(), intern("S"))
        .unwrap();
    let offsets = layout::field_offsets(&tu, id);
    assert_eq!(offsets[0].byte, 0);
    assert_eq!(offsets[0].bit, 0);
    assert_eq!(offsets[1].byte, 0);
    assert_eq!(offsets[1].bit, 3);
    assert_eq!(offsets[2].byte, BYTE_PER_INT);
    assert_eq!(offsets[2].bit, 0);
}

// Scenario 3: typedef expansion and use through deref.
#[test]
fn test_typedef_pointer_roundtrip() {
    let tu = analyze_clean("typedef int *INTP; INTP x = 0; void f(void) { *x = 7; }");
    let x = tu.decl(global(&tu, "x"));
    assert_eq!(shape(&x.ty.chain), "ID->PTR");
    assert!(!x.ty.spec.is_typedef());

    let f = tu.decl(global(&tu, "f"));
    let body = f.body.unwrap();
    let assign_ty = tu
        .scope(body)
        .stmts
        .iter()
        .find_map(|s| match &s.kind {
            StmtKind::Expr(e) => e.result_type.clone(),
            _ => None,
        })
        .expect("no typed expression");
    assert!(assign_ty.is_scalar());
    assert!(assign_ty.spec.has(cfront::frontend::specifier::SPEC_INT));
}

// Scenario 4: array dimension back-fill.
#[test]
fn test_array_backfill() {
    let tu = analyze_clean("int a[] = {1, 2, 3, 4};");
    let a = tu.decl(global(&tu, "a"));
    assert_eq!(shape(&a.ty.chain), "ID->ARR(4)");
    assert_eq!(layout::decl_size(&tu, a), 4 * BYTE_PER_INT);
}

// Scenario 5: forward declaration, use through pointer, later completion.
#[test]
fn test_forward_struct_completion() {
    let tu = analyze_clean(
        "struct L; struct L *p; struct L { int v; }; void f(void) { p->v; }",
    );
    let f = tu.decl(global(&tu, "f"));
    let body = f.body.unwrap();
    let field_ty = tu
        .scope(body)
        .stmts
        .iter()
        .find_map(|s| match &s.kind {
            StmtKind::Expr(e) => e.result_type.clone(),
            _ => None,
        })
        .expect("no typed expression");
    assert!(field_ty.is_scalar());
    assert!(field_ty.spec.has(cfront::frontend::specifier::SPEC_INT));
}

// Scenario 6: enum value assignment.
#[test]
fn test_enum_values() {
    let tu = analyze_clean("enum E { A, B = 5, C };");
    let e = tu
        .find_enum_tag_in_outer(tu.global_scope(), intern("E"))
        .unwrap();
    let values: Vec<i64> = tu.enum_def(e).items.iter().map(|i| i.value).collect();
    assert_eq!(values, vec![0, 5, 6]);
}

// Scenario 7: array parameter rewritten to pointer-to-array.
#[test]
fn test_array_param_decay() {
    let tu = analyze_clean("void foo(char p[][20]) { p; }");
    let foo = tu.decl(global(&tu, "foo"));
    let body = foo.body.unwrap();
    let p = tu
        .find_decl_in_scope(body, intern("p"))
        .expect("parameter not bound");
    let p = tu.decl(p);
    assert_eq!(shape(&p.ty.chain), "ID->PTR->ARR(20)");
    assert_eq!(layout::decl_size(&tu, p), BYTE_PER_POINTER);
}

#[test]
fn test_format_roundtrip_corpus() {
    for (src, name, expect) in [
        ("int x;", "x", "int x"),
        ("unsigned long ul;", "ul", "unsigned long ul"),
        ("char *s;", "s", "char * s"),
        ("int a[10];", "a", "int a [10]"),
        ("int (*q)[30];", "q", "int ( * q )[30]"),
        ("static const int k;", "k", "static const int k"),
    ] {
        let tu = analyze_clean(src);
        let d = tu.decl(global(&tu, name));
        assert_eq!(normalize_ws(&format_declaration(&tu, d)), expect, "source: {}", src);
    }
}

#[test]
fn test_struct_size_matches_manual_padding() {
    // (name, source, expected size)
    for (src, expect) in [
        ("struct A { char c; } v;", 1),
        ("struct B { char c; short s; } v;", 4),
        ("struct C { char c; int i; } v;", 8),
        ("struct D { char c; double d; } v;", 16),
        ("struct E { int i; char c; } v;", 8),
        ("struct F { char a; char b; char c; } v;", 3),
        ("struct G { short s; int i; char c; } v;", 12),
    ] {
        let tu = analyze_clean(src);
        let v = tu.decl(global(&tu, "v"));
        assert_eq!(layout::decl_size(&tu, v), expect, "source: {}", src);
    }
}

#[test]
fn test_diagnostics_do_not_stop_the_run() {
    let tu = analyze(
        "int x; int x;\n\
         struct S; struct S s;\n\
         int ok;\n",
    );
    assert!(tu.diags.error_count() >= 2);
    assert!(tu
        .find_decl_in_scope(tu.global_scope(), intern("ok"))
        .is_some());
}

#[test]
fn test_scope_shadowing() {
    let tu = analyze_clean(
        "int x;\n\
         void f(void) { char x; { double x; x; } x; }\n",
    );
    let f = tu.decl(global(&tu, "f"));
    let body = f.body.unwrap();
    // The statement after the block sees the char-typed x.
    let outer_ty = tu
        .scope(body)
        .stmts
        .iter()
        .rev()
        .find_map(|s| match &s.kind {
            StmtKind::Expr(e) => e.result_type.clone(),
            _ => None,
        })
        .unwrap();
    assert!(outer_ty.spec.has(cfront::frontend::specifier::SPEC_CHAR));
}

#[test]
fn test_goto_and_labels() {
    let tu = analyze_clean("void f(int n) { again: if (n) { n--; goto again; } }");
    assert_eq!(tu.diags.warning_count(), 0);

    let tu = analyze("void f(void) { goto nowhere; }");
    assert!(tu.diags.has_error_kind(DiagKind::Lookup));
}

#[test]
fn test_pragma_align_affects_subsequent_struct() {
    let tu = analyze_clean(
        "struct A { char c; double d; } a;\n\
         #pragma align (16)\n\
         struct B { char c; double d; } b;\n",
    );
    let a = tu
        .find_struct_in_outer(tu.global_scope(), intern("A"))
        .unwrap();
    let b = tu
        .find_struct_in_outer(tu.global_scope(), intern("B"))
        .unwrap();
    assert_eq!(tu.aggr(a).pack_align, 0);
    assert_eq!(tu.aggr(b).pack_align, 16);
}

#[test]
fn test_call_with_mixed_arguments() {
    let tu = analyze_clean(
        "int add(int a, float b); void f(void) { double d; add(1, d); }",
    );
    let f = tu.decl(global(&tu, "f"));
    let body = f.body.unwrap();
    let has_cvt = tu.scope(body).stmts.iter().any(|s| match &s.kind {
        StmtKind::Expr(e) => match &e.kind {
            ExprKind::Call { args, .. } => {
                matches!(args.get(1).map(|a| &a.kind), Some(ExprKind::Cvt { .. }))
            }
            _ => false,
        },
        _ => false,
    });
    assert!(has_cvt, "double argument against float formal must be converted");
}

#[test]
fn test_cli_smoke_through_library() {
    // The driver's pipeline, minus the process wrapper.
    let source = "int main(void) { return 0; }";
    let tu = analyze_clean(source);
    let dump = cfront::utils::pretty::dump_translation_unit(&tu);
    assert!(dump.contains("main"));
}
