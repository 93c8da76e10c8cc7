use std::any::{Any, TypeId};
use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::MeshError;

/// One field of a compound (record) type's layout, as supplied at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: &'static str,
    pub offset: usize,
    pub primitive: &'static str,
}

/// The wire-format descriptor the registry hands back for a registered element type.
#[derive(Debug, Clone)]
pub struct WireDescriptor {
    /// Stable identifier, distinct per compound record type; built-ins use their Rust type name.
    pub id: &'static str,
    /// Size in bytes of one element's native (unpacked) representation, where fixed.
    pub size_hint: usize,
    pub fields: Option<Vec<FieldLayout>>,
}

/// Elements exchanged through collectives/exchange patterns must be `WireElement`: cheaply
/// cloned, (de)serialisable, and safe to move across ranks.
pub trait WireElement: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}
impl<T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static> WireElement for T {}

/// §4.2: maps a payload element type to its [`WireDescriptor`], failing with
/// [`MeshError::UnregisteredType`] for anything not registered. Built-in primitives are
/// pre-registered by [`TypeRegistry::new`]; compound records register once via
/// [`TypeRegistry::register_compound`]. First-touch registration of the same type twice is
/// idempotent (the second call is a no-op, not an error).
pub struct TypeRegistry {
    descriptors: RwLock<HashMap<TypeId, WireDescriptor>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let registry = Self {
            descriptors: RwLock::new(HashMap::new()),
        };
        registry.register_builtins();
        registry
    }

    fn register_builtins(&self) {
        macro_rules! builtin {
            ($t:ty, $name:literal) => {
                self.register_primitive::<$t>($name)
            };
        }
        builtin!(u8, "u8");
        builtin!(i8, "i8");
        builtin!(u16, "u16");
        builtin!(i16, "i16");
        builtin!(u32, "u32");
        builtin!(i32, "i32");
        builtin!(u64, "u64");
        builtin!(i64, "i64");
        builtin!(usize, "usize");
        builtin!(f32, "f32");
        builtin!(f64, "f64");
        builtin!(bool, "bool");
    }

    pub fn register_primitive<T: Any + 'static>(&self, name: &'static str) {
        let descriptor = WireDescriptor {
            id: name,
            size_hint: std::mem::size_of::<T>(),
            fields: None,
        };
        self.descriptors
            .write()
            .entry(TypeId::of::<T>())
            .or_insert(descriptor);
    }

    /// Register a compound record type with an explicit field layout and stable identifier.
    pub fn register_compound<T: Any + 'static>(&self, id: &'static str, fields: Vec<FieldLayout>) {
        let descriptor = WireDescriptor {
            id,
            size_hint: std::mem::size_of::<T>(),
            fields: Some(fields),
        };
        self.descriptors
            .write()
            .entry(TypeId::of::<T>())
            .or_insert(descriptor);
    }

    pub fn descriptor_for<T: Any + 'static>(&self) -> Result<WireDescriptor, MeshError> {
        self.descriptors
            .read()
            .get(&TypeId::of::<T>())
            .cloned()
            .ok_or(MeshError::UnregisteredType(std::any::type_name::<T>()))
    }

    pub fn is_registered<T: Any + 'static>(&self) -> bool {
        self.descriptors.read().contains_key(&TypeId::of::<T>())
    }
}
