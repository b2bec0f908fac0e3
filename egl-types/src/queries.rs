//! Structural queries over the type registry (`spec.md` §4.1).

use crate::registry::{Method, TypeRegistry, NOT_FOUND, NOT_LAID_OUT};
use crate::ty::{Type, TypeId};

impl TypeRegistry {
    /// `are_same(a, b) → bool`: structural equality, not identity, so that
    /// two independently constructed pointer/array/function types compare
    /// equal when their shapes match (invariant 2, `spec.md` §8).
    pub fn are_same(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        let (ta, tb) = (self.get(a), self.get(b));
        match (&ta, &tb) {
            (
                Type::Pointer { to: ta, counted: ca, weak: wa, .. },
                Type::Pointer { to: tb, counted: cb, weak: wb, .. },
            ) => ca == cb && wa == wb && self.are_same(*ta, *tb),
            (Type::Array { of: oa, count: ca }, Type::Array { of: ob, count: cb }) => {
                ca == cb && self.are_same(*oa, *ob)
            }
            (
                Type::Function { ret: ra, params: pa, variadic: va, closure: cla, generator: ga },
                Type::Function { ret: rb, params: pb, variadic: vb, closure: clb, generator: gb },
            ) => {
                va == vb
                    && cla == clb
                    && ga == gb
                    && pa.len() == pb.len()
                    && self.are_same(*ra, *rb)
                    && pa.iter().zip(pb.iter()).all(|(x, y)| self.are_same(*x, *y))
            }
            (Type::Generator { yields: ya }, Type::Generator { yields: yb }) => {
                self.are_same(*ya, *yb)
            }
            (Type::Struct(na), Type::Struct(nb)) => na == nb,
            (Type::Class(na, _), Type::Class(nb, _)) => na == nb,
            (Type::Enum(na), Type::Enum(nb)) => na == nb,
            (Type::Interface(na), Type::Interface(nb)) => na == nb,
            _ => std::mem::discriminant(&ta) == std::mem::discriminant(&tb) && ta == tb,
        }
    }

    /// `promotion(a, b) → basic type`: the kind with the larger ordinal
    /// wins; `None`/`Void` poison the result to `None` (a downstream
    /// compile error).
    pub fn promotion(&self, a: TypeId, b: TypeId) -> TypeId {
        let (ta, tb) = (self.get(a), self.get(b));
        if matches!(ta, Type::None | Type::Void) || matches!(tb, Type::None | Type::Void) {
            return self.none_type();
        }
        match (ta.numeric_ordinal(), tb.numeric_ordinal()) {
            (Some(oa), Some(ob)) => {
                if oa >= ob {
                    a
                } else {
                    b
                }
            }
            _ => self.none_type(),
        }
    }

    /// How many `*`/pointer layers wrap the eventual non-pointer base.
    pub fn pointer_depth(&self, ty: TypeId) -> u32 {
        match self.get(ty) {
            Type::Pointer { to, .. } => 1 + self.pointer_depth(to),
            _ => 0,
        }
    }

    /// The non-pointer type at the bottom of a chain of pointer layers.
    pub fn base_of_pointer_chain(&self, ty: TypeId) -> TypeId {
        match self.get(ty) {
            Type::Pointer { to, .. } => self.base_of_pointer_chain(to),
            _ => ty,
        }
    }

    pub fn is_counted(&self, ty: TypeId) -> bool {
        matches!(self.get(ty), Type::Pointer { counted: true, .. })
    }

    pub fn is_weak(&self, ty: TypeId) -> bool {
        matches!(self.get(ty), Type::Pointer { weak: true, .. })
    }

    /// `needs_destructor(struct_type) → bool`: true if any field is
    /// counted/weak, is a struct that itself needs a destructor, or is an
    /// array containing counted pointers.
    pub fn needs_destructor(&self, ty: TypeId) -> bool {
        let name = match self.get(ty) {
            Type::Struct(name) => name,
            Type::Class(name, _) => name,
            _ => return false,
        };
        let fields = self
            .structs
            .get(&name)
            .map(|d| d.types)
            .or_else(|| self.classes.get(&name).map(|d| d.types))
            .unwrap_or_default();

        fields.into_iter().any(|field| self.field_needs_destructor(field))
    }

    fn field_needs_destructor(&self, field: TypeId) -> bool {
        match self.get(field) {
            Type::Pointer { counted, weak, .. } => counted || weak,
            Type::Struct(_) | Type::Class(_, _) => self.needs_destructor(field),
            Type::Array { of, .. } => self.array_has_counted(of),
            _ => false,
        }
    }

    fn array_has_counted(&self, of: TypeId) -> bool {
        match self.get(of) {
            Type::Pointer { counted, weak, .. } => counted || weak,
            Type::Array { of, .. } => self.array_has_counted(of),
            Type::Struct(_) | Type::Class(_, _) => self.needs_destructor(of),
            _ => false,
        }
    }

    /// `struct_member_index(type, name) → (index, field_type)`. For a
    /// class, the index is shifted by `+1` for the hidden vtable slot.
    /// Returns `NOT_FOUND` if the member does not exist, `NOT_LAID_OUT` if
    /// the named type has not been laid out yet.
    pub fn struct_member_index(&self, ty: TypeId, name: &str) -> (i64, Option<TypeId>) {
        match self.get(ty) {
            Type::Struct(struct_name) => match self.structs.get(&struct_name) {
                None => (NOT_LAID_OUT, None),
                Some(def) if !def.laid_out => (NOT_LAID_OUT, None),
                Some(def) => match def.names.iter().position(|n| n == name) {
                    Some(i) => (i as i64, Some(def.types[i])),
                    None => (NOT_FOUND, None),
                },
            },
            Type::Class(class_name, _) => match self.classes.get(&class_name) {
                None => (NOT_LAID_OUT, None),
                Some(def) if !def.laid_out => (NOT_LAID_OUT, None),
                Some(def) => match def.names.iter().position(|n| n == name) {
                    Some(i) => (i as i64 + 1, Some(def.types[i])),
                    None => (NOT_FOUND, None),
                },
            },
            _ => (NOT_FOUND, None),
        }
    }

    /// `interface_offset(interface, method) → int`: the method's position
    /// in the interface's ordered method list, used as the vtable index.
    pub fn interface_offset(&self, interface_name: &str, method: &str) -> Option<usize> {
        self.interfaces.get(&interface_name.to_string())?.methods.get_index_of(method)
    }

    pub fn interface_count(&self, interface_name: &str) -> usize {
        self.interfaces.get(&interface_name.to_string()).map(|i| i.methods.len()).unwrap_or(0)
    }

    /// The function type an interface declares for one of its methods, used
    /// to coerce arguments and type a call's result at an indirect call
    /// site where the static receiver type is the interface, not a class.
    pub fn interface_method_type(&self, interface_name: &str, method: &str) -> Option<TypeId> {
        self.interfaces.get(&interface_name.to_string())?.methods.get(method).map(|m| m.ty)
    }

    /// `class_implements_interface(class, interface) → bool`: true iff
    /// every name composed into the interface is in the class's interface
    /// set (`spec.md`:61), compared by name, not by incidental method-name
    /// overlap.
    pub fn class_implements_interface(&self, class_name: &str, interface_name: &str) -> bool {
        let Some(class) = self.classes.get(&class_name.to_string()) else { return false };
        let Some(interface) = self.interfaces.get(&interface_name.to_string()) else {
            return false;
        };
        interface.composed.iter().all(|composed_name| class.interfaces.contains(composed_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn idempotent_named_type_interning() {
        let reg = TypeRegistry::new();
        reg.add_struct_def("Foo", vec!["x".into()], vec![reg.int32()]);
        let a = reg.parse_type_name("Foo").unwrap();
        let b = reg.parse_type_name("Foo").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn counted_and_uncounted_pointers_differ() {
        let reg = TypeRegistry::new();
        let i32_ty = reg.int32();
        let counted = reg.pointer_type(i32_ty, true, false);
        let uncounted = reg.pointer_type(i32_ty, false, false);
        assert!(!reg.are_same(counted, uncounted));
        assert!(reg.are_same(counted, counted));
    }

    #[test]
    fn promotion_prefers_wider_operand() {
        let reg = TypeRegistry::new();
        assert_eq!(reg.promotion(reg.int32(), reg.int64()), reg.int64());
        assert_eq!(reg.promotion(reg.none_type(), reg.int64()), reg.none_type());
    }

    #[test]
    fn struct_member_index_sentinels() {
        let reg = TypeRegistry::new();
        reg.add_struct_def("Point", vec!["x".into(), "y".into()], vec![reg.int32(), reg.int32()]);
        let ty = reg.struct_type("Point");
        assert_eq!(reg.struct_member_index(ty, "x").0, 0);
        assert_eq!(reg.struct_member_index(ty, "z").0, NOT_FOUND);

        let unlaid = reg.struct_type("Ghost");
        assert_eq!(reg.struct_member_index(unlaid, "anything").0, NOT_LAID_OUT);
    }

    #[test]
    fn class_member_index_shifted_for_vtable() {
        let reg = TypeRegistry::new();
        reg.add_class_def(
            "C",
            vec!["x".into()],
            vec![reg.int32()],
            Vec::new(),
            Default::default(),
        );
        let ty = reg.class_type("C", Vec::new());
        assert_eq!(reg.struct_member_index(ty, "x").0, 1);
    }

    #[test]
    fn interface_offsets_follow_declaration_order() {
        let reg = TypeRegistry::new();
        let void = reg.void_type();
        let mut methods = indexmap::IndexMap::new();
        methods.insert("m0".to_string(), Method { name: "m0".into(), ty: void });
        methods.insert("m1".to_string(), Method { name: "m1".into(), ty: void });
        reg.add_interface_def("I", vec!["I".into()], methods);
        assert_eq!(reg.interface_offset("I", "m0"), Some(0));
        assert_eq!(reg.interface_offset("I", "m1"), Some(1));
        assert_eq!(reg.interface_count("I"), 2);
    }

    #[test]
    fn class_implements_interface_compares_composed_names() {
        let reg = TypeRegistry::new();
        reg.add_interface_def("Plain", vec!["Plain".into()], IndexMap::default());
        reg.add_interface_def("Combined", vec!["A".into(), "B".into()], IndexMap::default());
        reg.add_class_def("Impl", vec![], vec![], vec!["Plain".into()], IndexMap::default());
        reg.add_class_def(
            "Both",
            vec![],
            vec![],
            vec!["A".into(), "B".into()],
            IndexMap::default(),
        );

        assert!(reg.class_implements_interface("Impl", "Plain"));
        assert!(!reg.class_implements_interface("Impl", "Combined"));
        assert!(reg.class_implements_interface("Both", "Combined"));
        assert!(!reg.class_implements_interface("Both", "Plain"));
    }
}
