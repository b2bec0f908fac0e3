//! Named-type registries and the interning pool (`spec.md` §3.2, §4.1).

use crate::ty::{ClosureKind, Type, TypeId};
use egl_utils::store::{NamedStore, Store};
use indexmap::IndexMap;
use parking_lot::RwLock;

/// Sentinel returned by `struct_member_index` when the member does not
/// exist on an otherwise laid-out type.
pub const NOT_FOUND: i64 = -1;
/// Sentinel returned by `struct_member_index` when the named type has not
/// been laid out yet (declared but its body not yet compiled).
pub const NOT_LAID_OUT: i64 = -2;

/// A method entry in a class's method table: name to function type.
#[derive(Clone, Debug)]
pub struct Method {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Clone, Debug, Default)]
pub struct StructDef {
    pub names: Vec<String>,
    pub types: Vec<TypeId>,
    pub laid_out: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ClassDef {
    pub names: Vec<String>,
    pub types: Vec<TypeId>,
    pub interfaces: Vec<String>,
    pub methods: IndexMap<String, Method>,
    pub laid_out: bool,
}

#[derive(Clone, Debug, Default)]
pub struct InterfaceDef {
    /// Ordered method table; insertion position is the vtable offset, same
    /// convention as `ClassDef::methods`.
    pub methods: IndexMap<String, Method>,
    /// Names composed into this interface (`spec.md`:24's `Interface(
    /// composed_names: [name])`). A plain, non-composed interface's sole
    /// composed name is itself.
    pub composed: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct EnumDef {
    pub items: IndexMap<String, i64>,
}

/// Process-wide type state for the duration of one compilation. `spec.md`
/// §5 requires this to be reset between compilations rather than leaked as
/// true process-global state; [`TypeRegistry::new`] constructs a fresh one
/// and the pipeline crate owns its lifetime.
pub struct TypeRegistry {
    pool: Store<TypeId, Type>,
    base_cache: RwLock<std::collections::HashMap<&'static str, TypeId>>,
    named_type_cache: NamedStore<String, TypeId>,

    pub structs: NamedStore<String, StructDef>,
    pub classes: NamedStore<String, ClassDef>,
    pub interfaces: NamedStore<String, InterfaceDef>,
    pub enums: NamedStore<String, EnumDef>,
    pub typedefs: NamedStore<String, TypeId>,

    counted_header_cache: NamedStore<String, egl_ir::IrType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            pool: Store::new(),
            base_cache: RwLock::new(std::collections::HashMap::new()),
            named_type_cache: NamedStore::new(),
            structs: NamedStore::new(),
            classes: NamedStore::new(),
            interfaces: NamedStore::new(),
            enums: NamedStore::new(),
            typedefs: NamedStore::new(),
            counted_header_cache: NamedStore::new(),
        }
    }

    /// Reset every piece of process-wide type state. Required between
    /// compilations by `spec.md` §5's teardown contract.
    pub fn teardown(&self) {
        self.pool.clear();
        self.base_cache.write().clear();
        self.named_type_cache.clear();
        self.structs.clear();
        self.classes.clear();
        self.interfaces.clear();
        self.enums.clear();
        self.typedefs.clear();
        self.counted_header_cache.clear();
    }

    pub fn get(&self, id: TypeId) -> Type {
        self.pool.map_fast(id, Clone::clone)
    }

    /// Base types are interned singletons (invariant 1, `spec.md` §8): the
    /// same request always returns the same [`TypeId`].
    fn base(&self, key: &'static str, ty: Type) -> TypeId {
        if let Some(id) = self.base_cache.read().get(key) {
            return *id;
        }
        let mut cache = self.base_cache.write();
        *cache.entry(key).or_insert_with(|| self.pool.create(ty))
    }

    pub fn none_type(&self) -> TypeId {
        self.base("none", Type::None)
    }
    pub fn any_type(&self) -> TypeId {
        self.base("any", Type::Any)
    }
    pub fn auto_type(&self) -> TypeId {
        self.base("auto", Type::Auto)
    }
    pub fn nil_type(&self) -> TypeId {
        self.base("nil", Type::Nil)
    }
    pub fn void_type(&self) -> TypeId {
        self.base("void", Type::Void)
    }
    pub fn int1(&self) -> TypeId {
        self.base("i1", Type::Int1)
    }
    pub fn int8(&self) -> TypeId {
        self.base("i8", Type::Int8)
    }
    pub fn int16(&self) -> TypeId {
        self.base("i16", Type::Int16)
    }
    pub fn int32(&self) -> TypeId {
        self.base("i32", Type::Int32)
    }
    pub fn int64(&self) -> TypeId {
        self.base("i64", Type::Int64)
    }
    pub fn uint8(&self) -> TypeId {
        self.base("u8", Type::UInt8)
    }
    pub fn uint16(&self) -> TypeId {
        self.base("u16", Type::UInt16)
    }
    pub fn uint32(&self) -> TypeId {
        self.base("u32", Type::UInt32)
    }
    pub fn uint64(&self) -> TypeId {
        self.base("u64", Type::UInt64)
    }
    pub fn float(&self) -> TypeId {
        self.base("float", Type::Float)
    }
    pub fn double(&self) -> TypeId {
        self.base("double", Type::Double)
    }
    pub fn cstring(&self) -> TypeId {
        self.base("cstring", Type::CString)
    }

    /// For a basic type kind, return its interned singleton.
    pub fn basic(&self, ty: &Type) -> TypeId {
        match ty {
            Type::None => self.none_type(),
            Type::Any => self.any_type(),
            Type::Auto => self.auto_type(),
            Type::Nil => self.nil_type(),
            Type::Void => self.void_type(),
            Type::Int1 => self.int1(),
            Type::Int8 => self.int8(),
            Type::Int16 => self.int16(),
            Type::Int32 => self.int32(),
            Type::Int64 => self.int64(),
            Type::UInt8 => self.uint8(),
            Type::UInt16 => self.uint16(),
            Type::UInt32 => self.uint32(),
            Type::UInt64 => self.uint64(),
            Type::Float => self.float(),
            Type::Double => self.double(),
            Type::CString => self.cstring(),
            other => self.pool.create(other.clone()),
        }
    }

    /// Aggregate type constructors always mint a fresh handle (they are
    /// not interned singletons, `spec.md` §3.1), but the pointee they wrap
    /// may itself be a named type's cached handle.
    pub fn pointer_type(&self, to: TypeId, counted: bool, weak: bool) -> TypeId {
        self.pool.create(Type::Pointer { to, counted, weak, closed: false })
    }

    pub fn closed_pointer_type(&self, to: TypeId) -> TypeId {
        self.pool.create(Type::Pointer { to, counted: false, weak: false, closed: true })
    }

    pub fn array_type(&self, of: TypeId, count: Option<u64>) -> TypeId {
        self.pool.create(Type::Array { of, count })
    }

    pub fn function_type(
        &self,
        ret: TypeId,
        params: Vec<TypeId>,
        variadic: bool,
        closure: ClosureKind,
        generator: bool,
    ) -> TypeId {
        self.pool.create(Type::Function { ret, params, variadic, closure, generator })
    }

    pub fn generator_type(&self, yields: TypeId) -> TypeId {
        self.pool.create(Type::Generator { yields })
    }

    /// Named types are interned by name: the second request for the same
    /// name returns the same instance (invariant 1, `spec.md` §8).
    fn named(&self, kind_prefix: &str, name: &str, make: impl FnOnce() -> Type) -> TypeId {
        let key = format!("{kind_prefix}:{name}");
        if let Some(id) = self.named_type_cache.get(&key) {
            return id;
        }
        let id = self.pool.create(make());
        self.named_type_cache.insert(key, id);
        id
    }

    pub fn struct_type(&self, name: &str) -> TypeId {
        self.named("struct", name, || Type::Struct(name.to_string()))
    }

    pub fn class_type(&self, name: &str, interfaces: Vec<String>) -> TypeId {
        self.named("class", name, || Type::Class(name.to_string(), interfaces))
    }

    pub fn interface_type(&self, name: &str, composed: Vec<String>) -> TypeId {
        self.named("interface", name, || Type::Interface(composed))
    }

    pub fn enum_type(&self, name: &str) -> TypeId {
        self.named("enum", name, || Type::Enum(name.to_string()))
    }

    /// `parse_type_name(text) → Type | null` (`spec.md` §4.1): reserved
    /// words first, then a registered typedef target, then whichever
    /// class/interface/enum/struct registry the name appears in.
    pub fn parse_type_name(&self, text: &str) -> Option<TypeId> {
        let reserved = match text {
            "bool" => Some(self.int1()),
            "byte" => Some(self.int8()),
            "ubyte" => Some(self.uint8()),
            "short" => Some(self.int16()),
            "ushort" => Some(self.uint16()),
            "int" => Some(self.int32()),
            "uint" => Some(self.uint32()),
            "long" => Some(self.int64()),
            "ulong" => Some(self.uint64()),
            "float" => Some(self.float()),
            "double" => Some(self.double()),
            "void" => Some(self.void_type()),
            "any" => Some(self.any_type()),
            "auto" => Some(self.auto_type()),
            _ => None,
        };
        if reserved.is_some() {
            return reserved;
        }

        if let Some(target) = self.typedefs.get(&text.to_string()) {
            return Some(target);
        }

        if self.classes.contains(&text.to_string()) {
            let def = self.classes.get(&text.to_string()).unwrap();
            return Some(self.class_type(text, def.interfaces.clone()));
        }
        if let Some(def) = self.interfaces.get(&text.to_string()) {
            return Some(self.interface_type(text, def.composed.clone()));
        }
        if self.enums.contains(&text.to_string()) {
            return Some(self.enum_type(text));
        }
        if self.structs.contains(&text.to_string()) {
            return Some(self.struct_type(text));
        }

        None
    }

    pub fn add_typedef(&self, name: &str, target: TypeId) {
        self.typedefs.insert(name.to_string(), target);
    }

    pub fn add_struct_def(&self, name: &str, names: Vec<String>, types: Vec<TypeId>) {
        self.structs.insert(name.to_string(), StructDef { names, types, laid_out: true });
    }

    pub fn add_class_def(
        &self,
        name: &str,
        names: Vec<String>,
        types: Vec<TypeId>,
        interfaces: Vec<String>,
        methods: IndexMap<String, Method>,
    ) {
        self.classes.insert(
            name.to_string(),
            ClassDef { names, types, interfaces, methods, laid_out: true },
        );
    }

    pub fn add_interface_def(&self, name: &str, composed: Vec<String>, methods: IndexMap<String, Method>) {
        self.interfaces.insert(name.to_string(), InterfaceDef { methods, composed });
    }

    pub fn add_enum_def(&self, name: &str, items: IndexMap<String, i64>) {
        self.enums.insert(name.to_string(), EnumDef { items });
    }

    pub fn counted_header_cache_get_or_insert(
        &self,
        payload: &egl_ir::IrType,
        make: impl FnOnce() -> egl_ir::IrType,
    ) -> egl_ir::IrType {
        let key = payload.to_string();
        self.counted_header_cache.get_or_insert_with(key, make)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
