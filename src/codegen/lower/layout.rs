//! Semantic type to instruction-set type mapping, struct and union layouts.

use tracing::trace;

use crate::ir::{CastOp, FloatKind, IsaType, Operand, TypedValue};
use crate::sema::{PrimKind, SemType, TypeSubst};

use super::LowerContext;

/// Field layout of a user struct or class instance.
pub(crate) struct StructLayout {
    pub ty: IsaType,
    pub fields: Vec<(String, SemType)>,
    /// Index of the first user field; classes keep their vtable at 0.
    pub offset: u32,
}

impl StructLayout {
    pub fn field(&self, name: &str) -> Option<(u32, &SemType)> {
        self.fields
            .iter()
            .position(|(n, _)| n == name)
            .map(|i| (i as u32 + self.offset, &self.fields[i].1))
    }
}

pub(crate) fn prim_isa(kind: PrimKind) -> IsaType {
    match kind {
        PrimKind::Bool => IsaType::Bool,
        PrimKind::F32 => IsaType::Float(FloatKind::F32),
        PrimKind::F64 => IsaType::Float(FloatKind::F64),
        PrimKind::Str => IsaType::Ptr,
        PrimKind::Unit | PrimKind::Never => IsaType::Void,
        k => match k.bits() {
            Some(bits) if k.is_unsigned() => IsaType::uint(bits),
            Some(bits) => IsaType::int(bits),
            None => IsaType::i32(),
        },
    }
}

/// `{ ptr data, i64 len }`
pub(crate) fn slice_isa() -> IsaType {
    IsaType::Tuple(vec![IsaType::Ptr, IsaType::i64()])
}

/// `{ ptr data, ptr vtable }`
pub(crate) fn dyn_isa() -> IsaType {
    IsaType::Tuple(vec![IsaType::Ptr, IsaType::Ptr])
}

/// Shared block behind a reference-counted pointer: two counts, then the value.
pub(crate) fn shared_block_isa(inner: IsaType) -> IsaType {
    IsaType::Tuple(vec![IsaType::i64(), IsaType::i64(), inner])
}

pub(crate) fn is_smart_pointer(name: &str) -> bool {
    matches!(name, "Heap" | "Box" | "Shared" | "Arc" | "Rc")
}

pub(crate) fn is_refcounted(name: &str) -> bool {
    matches!(name, "Shared" | "Arc" | "Rc")
}

impl LowerContext<'_> {
    pub(crate) fn isa_of(&mut self, sem: &SemType) -> IsaType {
        let sem = sem.substitute(&self.type_subs);
        match &sem {
            SemType::Primitive(k) => prim_isa(*k),
            SemType::Named { name, type_args, .. } => self.named_isa(name, type_args),
            SemType::Ptr { .. } | SemType::Ref { .. } => IsaType::Ptr,
            SemType::Closure { .. } | SemType::Func { .. } => IsaType::Closure,
            SemType::Tuple(elems) => IsaType::Tuple(elems.iter().map(|e| self.isa_of(e)).collect()),
            SemType::Array { elem, len } => IsaType::Array(*len, Box::new(self.isa_of(elem))),
            SemType::Slice(_) => slice_isa(),
            SemType::Dyn(_) => dyn_isa(),
            SemType::Generic(name) => {
                trace!(param = %name, "unbound type parameter, using i32");
                IsaType::i32()
            }
        }
    }

    fn named_isa(&mut self, name: &str, args: &[SemType]) -> IsaType {
        let env = self.env;
        if args.is_empty() {
            if let Some(target) = self.type_subs.get(name).cloned() {
                return self.isa_of(&target);
            }
            if let Some(target) = env.resolve_alias(name) {
                return self.isa_of(target);
            }
            if let Some(kind) = PrimKind::from_name(name) {
                return prim_isa(kind);
            }
        }
        match name {
            "Maybe" => {
                let inner = args.first().cloned().unwrap_or_else(SemType::unit);
                self.union_layout("Maybe", args, &[inner])
            }
            "Outcome" => {
                let ok = args.first().cloned().unwrap_or_else(SemType::unit);
                let err = args.get(1).cloned().unwrap_or_else(SemType::unit);
                self.union_layout("Outcome", args, &[ok, err])
            }
            "Ordering" => self.ordering_isa(),
            "File" => {
                self.module.define_type("File", vec![IsaType::Ptr]);
                IsaType::Struct("File".to_string())
            }
            n if is_smart_pointer(n) => {
                let mangled = env.mangle_instance(n, args);
                self.module.define_type(&mangled, vec![IsaType::Ptr]);
                IsaType::Struct(mangled)
            }
            "List" | "Vec" => IsaType::Ptr,
            "Slice" | "MutSlice" => slice_isa(),
            _ => {
                let sem = SemType::named(name, args.to_vec());
                if let Some(layout) = self.struct_layout(&sem) {
                    // Class instances are handled by reference.
                    return if layout.offset > 0 { IsaType::Ptr } else { layout.ty };
                }
                if let Some(def) = env.lookup_enum(name) {
                    let subs: TypeSubst = def.type_params.iter().cloned().zip(args.iter().cloned()).collect();
                    let payloads: Vec<SemType> =
                        def.variants.iter().filter_map(|v| v.payload.as_ref()).map(|p| p.substitute(&subs)).collect();
                    if payloads.is_empty() {
                        let mangled = env.mangle_instance(name, args);
                        self.module.define_type(&mangled, vec![IsaType::i32()]);
                        return IsaType::Struct(mangled);
                    }
                    return self.union_layout(name, args, &payloads);
                }
                trace!(ty = %name, "unknown named type, using i32");
                IsaType::i32()
            }
        }
    }

    /// `%Ordering = type { i32 }`
    pub(crate) fn ordering_isa(&mut self) -> IsaType {
        self.module.define_type("Ordering", vec![IsaType::i32()]);
        IsaType::Struct("Ordering".to_string())
    }

    /// Instantiate a tagged union `{ i32 tag, payload }` whose payload slot
    /// can hold any of `payloads`.
    pub(crate) fn union_layout(&mut self, base: &str, args: &[SemType], payloads: &[SemType]) -> IsaType {
        let name = self.env.mangle_instance(base, args);
        if self.module.struct_fields(&name).is_none() {
            let slot = self.payload_slot(payloads);
            self.module.define_type(&name, vec![IsaType::i32(), slot]);
        }
        IsaType::Struct(name)
    }

    /// One `i64` when every payload is a scalar of at most 64 bits, else
    /// enough `i64` words for the largest payload.
    fn payload_slot(&mut self, payloads: &[SemType]) -> IsaType {
        let isas: Vec<IsaType> = payloads.iter().map(|p| self.isa_of(p)).collect();
        let small_scalar = |t: &IsaType| {
            t.is_void() || (!t.is_aggregate() && t.bits().is_some_and(|b| b <= 64))
        };
        if isas.iter().all(small_scalar) {
            return IsaType::i64();
        }
        let words = isas.iter().map(|t| self.module.size_words(t)).max().unwrap_or(1).max(1);
        IsaType::Array(words, Box::new(IsaType::i64()))
    }

    /// Layout of a user struct (instantiated with its type arguments) or
    /// class. None for every other type.
    pub(crate) fn struct_layout(&mut self, sem: &SemType) -> Option<StructLayout> {
        let SemType::Named { name, type_args, .. } = sem else {
            return None;
        };
        let env = self.env;
        if let Some(def) = env.lookup_struct(name) {
            let subs: TypeSubst = def.type_params.iter().cloned().zip(type_args.iter().cloned()).collect();
            let fields: Vec<(String, SemType)> =
                def.fields.iter().map(|f| (f.name.clone(), f.ty.substitute(&subs))).collect();
            let mangled = env.mangle_instance(name, type_args);
            if self.module.struct_fields(&mangled).is_none() {
                let isas = fields.iter().map(|(_, t)| self.isa_of(t)).collect();
                self.module.define_type(&mangled, isas);
            }
            return Some(StructLayout { ty: IsaType::Struct(mangled), fields, offset: 0 });
        }
        if env.lookup_class(name).is_some() {
            let fields = self.class_fields(name);
            if self.module.struct_fields(name).is_none() {
                let mut isas = vec![IsaType::Ptr];
                isas.extend(fields.iter().map(|(_, t)| self.isa_of(t)));
                self.module.define_type(name, isas);
            }
            return Some(StructLayout { ty: IsaType::Struct(name.clone()), fields, offset: 1 });
        }
        None
    }

    /// Fields of a class and its ancestors, base class first.
    fn class_fields(&self, name: &str) -> Vec<(String, SemType)> {
        let chain = self.class_chain(name);
        chain
            .iter()
            .rev()
            .filter_map(|c| self.env.lookup_class(c))
            .flat_map(|def| def.fields.iter().map(|f| (f.name.clone(), f.ty.clone())))
            .collect()
    }

    /// `name` followed by its ancestors.
    pub(crate) fn class_chain(&self, name: &str) -> Vec<String> {
        let mut chain = vec![name.to_string()];
        let mut cur = self.env.lookup_class(name).and_then(|c| c.extends.clone());
        while let Some(parent) = cur {
            if chain.contains(&parent) {
                break;
            }
            cur = self.env.lookup_class(&parent).and_then(|c| c.extends.clone());
            chain.push(parent);
        }
        chain
    }

    // ===== tagged unions =====

    /// Build a union value with `tag` and an optional payload.
    pub(crate) fn build_union(&mut self, union_ty: &IsaType, tag: u32, payload: Option<TypedValue>) -> TypedValue {
        let slot = self.builder.alloca(union_ty);
        let tag_ptr = self.builder.field_ptr(union_ty, slot.clone(), 0);
        self.builder.store(TypedValue::i32(i128::from(tag)), tag_ptr);
        if let Some(p) = payload {
            self.store_payload(slot.clone(), union_ty, p);
        }
        self.builder.load(union_ty, slot)
    }

    /// Narrow integers are widened to the `i64` slot; everything else is
    /// stored at its own type.
    pub(crate) fn store_payload(&mut self, union_ptr: Operand, union_ty: &IsaType, value: TypedValue) {
        if value.ty.is_void() {
            return;
        }
        let slot = self.builder.field_ptr(union_ty, union_ptr, 1);
        let value = match value.ty {
            IsaType::Int { bits, unsigned } if bits < 64 => {
                let op = if unsigned { CastOp::ZExt } else { CastOp::SExt };
                self.builder.cast(op, value, &IsaType::i64())
            }
            IsaType::Bool => self.builder.cast(CastOp::ZExt, value, &IsaType::i64()),
            _ => value,
        };
        self.builder.store(value, slot);
    }

    pub(crate) fn load_payload(&mut self, union_ptr: Operand, union_ty: &IsaType, payload_ty: &IsaType) -> TypedValue {
        if payload_ty.is_void() {
            return TypedValue::void();
        }
        let slot = self.builder.field_ptr(union_ty, union_ptr, 1);
        match payload_ty {
            IsaType::Int { bits, .. } if *bits < 64 => {
                let word = self.builder.load(&IsaType::i64(), slot);
                self.builder.cast(CastOp::Trunc, word, payload_ty)
            }
            IsaType::Bool => {
                let word = self.builder.load(&IsaType::i64(), slot);
                self.builder.cast(CastOp::Trunc, word, payload_ty)
            }
            _ => self.builder.load(payload_ty, slot),
        }
    }

    pub(crate) fn union_tag(&mut self, value: &TypedValue) -> TypedValue {
        self.builder.extract_value(value.clone(), 0, &IsaType::i32())
    }

    pub(crate) fn union_payload(&mut self, value: &TypedValue, payload_ty: &IsaType) -> TypedValue {
        let slot = self.spill(value.clone());
        self.load_payload(slot, &value.ty, payload_ty)
    }

    /// `icmp eq i32 tag, expected`
    pub(crate) fn tag_is(&mut self, value: &TypedValue, expected: u32) -> TypedValue {
        let tag = self.union_tag(value);
        self.builder.icmp(crate::ir::IntPred::Eq, &IsaType::i32(), tag.op, Operand::Int(i128::from(expected)))
    }

    /// Wrap an `i32` tag as an `Ordering` value.
    pub(crate) fn make_ordering(&mut self, tag: TypedValue) -> TypedValue {
        let ty = self.ordering_isa();
        self.builder.insert_value(TypedValue::undef(ty), tag, 0)
    }
}
