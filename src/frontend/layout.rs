//! Byte sizes and field offsets.
//!
//! The target model is the 32-bit layout of the original front end:
//! 4-byte pointers, 4-byte long, 8-byte long long and double. `void` is
//! given size 1 so `void *` arithmetic behaves byte-wise.

use crate::frontend::declaration::{expand_user_type, Declaration};
use crate::frontend::declarator::{DeclTy, TypeName};
use crate::frontend::scope::{Aggr, AggrId, TranslationUnit};
use crate::frontend::specifier::{
    TypeSpec, SIGN_MASK, SIMPLE_MASK, SPEC_BOOL, SPEC_CHAR, SPEC_DOUBLE, SPEC_ENUM, SPEC_FLOAT,
    SPEC_INT, SPEC_LONG, SPEC_LONGLONG, SPEC_SHORT, SPEC_STRUCT, SPEC_UNION, SPEC_VOID,
};

pub const BIT_PER_BYTE: u32 = 8;
pub const BYTE_PER_CHAR: u32 = 1;
pub const BYTE_PER_SHORT: u32 = 2;
pub const BYTE_PER_INT: u32 = 4;
pub const BYTE_PER_LONG: u32 = 4;
pub const BYTE_PER_LONGLONG: u32 = 8;
pub const BYTE_PER_FLOAT: u32 = 4;
pub const BYTE_PER_DOUBLE: u32 = 8;
pub const BYTE_PER_POINTER: u32 = 4;
pub const BYTE_PER_ENUM: u32 = BYTE_PER_INT;

/// Default `#pragma align` value.
pub const DEFAULT_ALIGN: u32 = 4;

/// Largest accepted array dimension.
pub const MAX_ARRAY_DIM: i64 = u32::MAX as i64;

/// Round `size` up to a multiple of `align`.
pub fn pad_align(size: u32, align: u32) -> u32 {
    if align == 0 || size % align == 0 {
        size
    } else {
        (size / align + 1) * align
    }
}

/// Bit width of a scalar base kind, used for bit-field packing and width
/// validation.
pub fn scalar_bit_size(des: u32) -> u32 {
    scalar_byte_size(des) * BIT_PER_BYTE
}

fn scalar_byte_size(des: u32) -> u32 {
    if des & SPEC_LONGLONG != 0 {
        return BYTE_PER_LONGLONG;
    }
    if des & SPEC_VOID != 0 {
        return BYTE_PER_CHAR;
    }
    if des & (SPEC_CHAR | SPEC_BOOL) != 0 {
        return BYTE_PER_CHAR;
    }
    if des & SPEC_SHORT != 0 {
        return BYTE_PER_SHORT;
    }
    if des & SPEC_DOUBLE != 0 {
        return BYTE_PER_DOUBLE;
    }
    if des & SPEC_FLOAT != 0 {
        return BYTE_PER_FLOAT;
    }
    if des & SPEC_INT != 0 {
        return BYTE_PER_INT;
    }
    if des & SPEC_LONG != 0 {
        return BYTE_PER_LONG;
    }
    if des & SPEC_ENUM != 0 {
        return BYTE_PER_ENUM;
    }
    if des & SIGN_MASK != 0 {
        return BYTE_PER_INT;
    }
    0
}

/// Size of a specifier type: scalars by base kind, aggregates by layout,
/// enums as int. Typedef references size as their expansion.
pub fn spec_size(tu: &TranslationUnit, spec: &TypeSpec) -> u32 {
    if spec.is_user_type_ref() {
        let expanded = expand_user_type(tu, &TypeName::new(spec.clone()));
        return type_name_size(tu, &expanded);
    }
    if spec.has(SPEC_STRUCT) {
        return spec.aggr.map(|id| struct_size(tu, id)).unwrap_or(0);
    }
    if spec.has(SPEC_UNION) {
        return spec.aggr.map(|id| union_size(tu, id)).unwrap_or(0);
    }
    scalar_byte_size(spec.des)
}

/// Number of elements in the leading array run of a chain.
pub fn array_elem_count(ty: &TypeName) -> u32 {
    let mut count: u64 = 1;
    let mut seen = false;
    for node in ty.pure() {
        match node {
            DeclTy::Array { dim, .. } => {
                seen = true;
                count = count.saturating_mul(*dim);
            }
            _ => break,
        }
    }
    if seen {
        count.min(u32::MAX as u64) as u32
    } else {
        0
    }
}

/// Size of one element of the leading array run: the pointee is a pointer
/// when the run is followed by POINTER, otherwise the specifier type.
pub fn array_elem_size(tu: &TranslationUnit, ty: &TypeName) -> u32 {
    let mut rest = ty.pure();
    while let Some(DeclTy::Array { .. }) = rest.first() {
        rest = &rest[1..];
    }
    match rest.first() {
        Some(DeclTy::Pointer { .. }) => BYTE_PER_POINTER,
        Some(DeclTy::Fun { .. }) => 0,
        _ => spec_size(tu, &ty.spec),
    }
}

/// Byte size of a type name: the canonical chain decides (pointer, array,
/// function), falling back to the specifier for scalars.
pub fn type_name_size(tu: &TranslationUnit, ty: &TypeName) -> u32 {
    match ty.pure().first() {
        None => spec_size(tu, &ty.spec),
        Some(DeclTy::Pointer { .. }) => BYTE_PER_POINTER,
        Some(DeclTy::Array { .. }) => array_elem_count(ty) * array_elem_size(tu, ty),
        Some(DeclTy::Fun { .. }) => {
            // A function designator itself has no object size; through a
            // pointer it is BYTE_PER_POINTER, which is_pointer covers.
            0
        }
        Some(DeclTy::Id { .. }) | Some(DeclTy::Variadic) => 0,
    }
}

/// Byte size of a declaration.
pub fn decl_size(tu: &TranslationUnit, decl: &Declaration) -> u32 {
    type_name_size(tu, &decl.ty)
}

fn bitfield_base(des: u32) -> u32 {
    des & (SIMPLE_MASK | SIGN_MASK | SPEC_ENUM)
}

/// Size in bytes of a run of consecutive bit-fields that share one integer
/// base kind, starting at `fields[start]`. Returns the byte size and the
/// index of the first field past the group.
fn bitfield_group(tu: &TranslationUnit, fields: &[crate::frontend::scope::DeclId], start: usize) -> (u32, usize) {
    let base = bitfield_base(tu.decl(fields[start]).ty.spec.des);
    let unit_bits = scalar_bit_size(base).max(BIT_PER_BYTE);
    let mut bits = 0u32;
    let mut total_bits = unit_bits;
    let mut i = start;
    while i < fields.len() {
        let f = tu.decl(fields[i]);
        if !f.is_bit_field || bitfield_base(f.ty.spec.des) != base {
            break;
        }
        if bits + f.bit_len > unit_bits {
            total_bits += unit_bits;
            bits = 0;
        }
        bits += f.bit_len;
        i += 1;
    }
    (total_bits / BIT_PER_BYTE, i)
}

/// Advance a field offset: pad to the field's own size (or the aggregate's
/// explicit field alignment), then account for `count` elements.
fn field_ofst_padded(ofst: u32, field_size: u32, count: u32, field_align: u32) -> u32 {
    let align = if field_align != 0 { field_align } else { field_size };
    let padded = if align != 0 { pad_align(ofst, align) } else { ofst };
    padded + field_size * count.max(1)
}

fn aggr_aligned_size(aggr: &Aggr, size: u32, max_field: u32) -> u32 {
    let mut max_field = max_field;
    if aggr.align != 0 && aggr.align < max_field {
        max_field = pad_align(max_field, aggr.align);
    }
    if aggr.pack_align != 0 {
        pad_align(size, aggr.align.max(1))
    } else {
        pad_align(size, max_field.max(1))
    }
}

/// Total size of a struct, fields padded to their natural (or pragma)
/// alignment and consecutive same-kind bit-fields packed into shared
/// storage units.
pub fn struct_size(tu: &TranslationUnit, id: AggrId) -> u32 {
    let aggr = tu.aggr(id);
    if !aggr.is_complete {
        return 0;
    }
    let fields = &aggr.fields;
    let mut ofst = 0u32;
    let mut max_field = 0u32;
    let mut i = 0;
    while i < fields.len() {
        let f = tu.decl(fields[i]);
        if f.is_bit_field {
            let (bytes, next) = bitfield_group(tu, fields, i);
            ofst = field_ofst_padded(ofst, bytes, 1, aggr.field_align);
            max_field = max_field.max(bytes);
            i = next;
            continue;
        }
        if f.is_array() {
            let elem = array_elem_size(tu, &f.ty);
            let count = array_elem_count(&f.ty);
            ofst = field_ofst_padded(ofst, elem, count, aggr.field_align);
            max_field = max_field.max(elem);
        } else {
            let size = type_name_size(tu, &f.ty);
            ofst = field_ofst_padded(ofst, size, 1, aggr.field_align);
            max_field = max_field.max(size);
        }
        i += 1;
    }
    aggr_aligned_size(aggr, ofst, max_field)
}

/// Union size: the largest field, padded.
pub fn union_size(tu: &TranslationUnit, id: AggrId) -> u32 {
    let aggr = tu.aggr(id);
    if !aggr.is_complete {
        return 0;
    }
    let mut size = 0u32;
    for &f in &aggr.fields {
        size = size.max(type_name_size(tu, &tu.decl(f).ty));
    }
    aggr_aligned_size(aggr, size, size)
}

/// Byte and bit position of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOffset {
    /// Byte offset of the storage the field lives in.
    pub byte: u32,
    /// Bit offset within that storage for bit-fields; 0 otherwise.
    pub bit: u32,
}

/// Offsets for every field of a struct, in field order. Mirrors the layout
/// walk of `struct_size`.
pub fn field_offsets(tu: &TranslationUnit, id: AggrId) -> Vec<FieldOffset> {
    let aggr = tu.aggr(id);
    let fields = &aggr.fields;
    let mut out = Vec::with_capacity(fields.len());

    if aggr.kind == crate::frontend::scope::AggrKind::Union {
        out.resize(fields.len(), FieldOffset { byte: 0, bit: 0 });
        return out;
    }

    let mut ofst = 0u32;
    let mut i = 0;
    while i < fields.len() {
        let f = tu.decl(fields[i]);
        if f.is_bit_field {
            let base = bitfield_base(f.ty.spec.des);
            let unit_bits = scalar_bit_size(base).max(BIT_PER_BYTE);
            let unit_bytes = unit_bits / BIT_PER_BYTE;
            let group_start = pad_align(ofst, unit_bytes);
            let mut unit_ofst = group_start;
            let mut bits = 0u32;
            while i < fields.len() {
                let f = tu.decl(fields[i]);
                if !f.is_bit_field || bitfield_base(f.ty.spec.des) != base {
                    break;
                }
                if bits + f.bit_len > unit_bits {
                    unit_ofst += unit_bytes;
                    bits = 0;
                }
                out.push(FieldOffset { byte: unit_ofst, bit: bits });
                bits += f.bit_len;
                i += 1;
            }
            ofst = unit_ofst + unit_bytes;
            continue;
        }
        let (elem, count) = if f.is_array() {
            (array_elem_size(tu, &f.ty), array_elem_count(&f.ty))
        } else {
            (type_name_size(tu, &f.ty), 1)
        };
        let align = if aggr.field_align != 0 { aggr.field_align } else { elem };
        let here = if align != 0 { pad_align(ofst, align) } else { ofst };
        out.push(FieldOffset { byte: here, bit: 0 });
        ofst = here + elem * count.max(1);
        i += 1;
    }
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
        let tu = parser.finish();
        assert_eq!(tu.diags.error_count(), 0, "errors: {:?}", tu.diags.errors());
        tu
    }

    fn size_of(tu: &TranslationUnit, name: &str) -> u32 {
        let id = tu
            .find_decl_in_scope(tu.global_scope(), intern(name))
            .expect("decl not found");
        decl_size(tu, tu.decl(id))
    }

    #[test]
    fn test_pad_align() {
        assert_eq!(pad_align(0, 4), 0);
        assert_eq!(pad_align(1, 4), 4);
        assert_eq!(pad_align(4, 4), 4);
        assert_eq!(pad_align(5, 2), 6);
    }

    #[test]
    fn test_scalar_sizes() {
        let tu = parse_tu(
            "char c; short s; int i; long l; long long ll; float f; double d; unsigned u;",
        );
        assert_eq!(size_of(&tu, "c"), 1);
        assert_eq!(size_of(&tu, "s"), 2);
        assert_eq!(size_of(&tu, "i"), 4);
        assert_eq!(size_of(&tu, "l"), 4);
        assert_eq!(size_of(&tu, "ll"), 8);
        assert_eq!(size_of(&tu, "f"), 4);
        assert_eq!(size_of(&tu, "d"), 8);
        assert_eq!(size_of(&tu, "u"), 4);
    }

    #[test]
    fn test_pointer_and_array_sizes() {
        let tu = parse_tu("int *p; int a[10]; int m[3][4]; int *(*q)[30]; int (*r[3])[4];");
        assert_eq!(size_of(&tu, "p"), BYTE_PER_POINTER);
        assert_eq!(size_of(&tu, "a"), 40);
        assert_eq!(size_of(&tu, "m"), 48);
        assert_eq!(size_of(&tu, "q"), BYTE_PER_POINTER);
        assert_eq!(size_of(&tu, "r"), 3 * BYTE_PER_POINTER);
    }

    #[test]
    fn test_struct_padding() {
        // char at 0, pad to 4, int at 4..8 -> size 8
        let tu = parse_tu("struct S { char c; int i; } s;");
        assert_eq!(size_of(&tu, "s"), 8);
    }

    #[test]
    fn test_struct_bitfield_group() {
        let tu = parse_tu("struct S { int a:3; int b:5; int c; } s;");
        assert_eq!(size_of(&tu, "s"), 2 * BYTE_PER_INT);

        let id = tu.find_struct_in_outer(tu.global_scope(), intern("S")).unwrap();
        let offs = field_offsets(&tu, id);
        assert_eq!(offs[0], FieldOffset { byte: 0, bit: 0 });
        assert_eq!(offs[1], FieldOffset { byte: 0, bit: 3 });
        assert_eq!(offs[2], FieldOffset { byte: 4, bit: 0 });
    }

    #[test]
    fn test_bitfield_unit_overflow() {
        // 20 + 20 bits cannot share one int: two units, plus int -> 12
        let tu = parse_tu("struct S { int a:20; int b:20; int c; } s;");
        assert_eq!(size_of(&tu, "s"), 3 * BYTE_PER_INT);
    }

    #[test]
    fn test_bitfield_base_kind_change_ends_group() {
        let tu = parse_tu("struct S { int a:3; char b:2; } s;");
        // int unit (4) + char unit (1), padded to int alignment -> 8
        let id = tu.find_struct_in_outer(tu.global_scope(), intern("S")).unwrap();
        let offs = field_offsets(&tu, id);
        assert_eq!(offs[0], FieldOffset { byte: 0, bit: 0 });
        assert_eq!(offs[1], FieldOffset { byte: 4, bit: 0 });
        assert_eq!(size_of(&tu, "s"), 8);
    }

    #[test]
    fn test_union_size() {
        let tu = parse_tu("union U { char c; int i; double d; } u;");
        assert_eq!(size_of(&tu, "u"), 8);
    }

    #[test]
    fn test_empty_struct_has_placeholder_byte() {
        let tu = parse_tu("struct E {} e;");
        assert_eq!(size_of(&tu, "e"), 1);
    }

    #[test]
    fn test_nested_struct_field() {
        let tu = parse_tu("struct In { int a; int b; }; struct Out { char c; struct In i; } o;");
        // char at 0, pad to 8? inner struct size 8, aligned by its size -> offset 8? No:
        // field alignment is by field size (8): pad 1 -> 8, total 16.
        assert_eq!(size_of(&tu, "o"), 16);
    }

    #[test]
    fn test_enum_sized_as_int() {
        let tu = parse_tu("enum E { A, B } e;");
        assert_eq!(size_of(&tu, "e"), BYTE_PER_ENUM);
    }
}
