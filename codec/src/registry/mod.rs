//! # Type Registry
//!
//! Two tables, both filled at startup and read on every encode/decode:
//!
//! - **Concrete types**: Rust type → wire name, tag, shape and options.
//!   Indexed by `TypeId` (encode), by full tag and by tag prefix (decode),
//!   and by wire name (duplicate detection).
//! - **Interface contracts**: `dyn Trait` → its member concrete types, each
//!   with a constructor that rebuilds the concrete value and upcasts it to
//!   `Box<dyn Trait>`.
//!
//! ## Locking
//!
//! Everything sits behind one `parking_lot::RwLock`. Encode and decode take
//! the read side; registration takes the write side. Constructors are
//! `Arc`-cloned out of the table before they run, so a constructor decoding
//! a nested interface never re-enters a held lock.
//!
//! ## Tag forms
//!
//! Full tags are unique across the whole registry, which is checked when a
//! concrete type is registered. Prefixes are not: when two members of the
//! same scope share a prefix, the binary engine switches to the full tag for
//! them. Decoding accepts either form.

pub mod tag;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::codec::Codec;
use crate::config::TagLayout;
use crate::error::{CodecError, CodecResult};
use crate::poly::Registered;
use crate::shape::{Shape, TypeRef};
use crate::value::Value;
use crate::wire::Wire;

pub use tag::Tag;

/// Rebuilds a concrete value and upcasts it to the contract's trait object.
pub type Constructor<I> = Arc<dyn Fn(Value, &Codec) -> CodecResult<Box<I>> + Send + Sync>;

type ErasedConstructor = Box<dyn Any + Send + Sync>;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Per-concrete registration options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConcreteOptions {
    /// Tag the value when it is passed directly to a top-level marshal call,
    /// not just when it sits behind an interface.
    pub tag_top_level: bool,
}

impl Default for ConcreteOptions {
    fn default() -> Self {
        Self {
            tag_top_level: true,
        }
    }
}

/// Per-contract registration options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct InterfaceOptions {
    /// Always send the full tag in binary, even while the prefix alone is
    /// unambiguous. Use this when later registrations may add members whose
    /// prefixes collide, so data written today stays readable tomorrow.
    pub always_disambiguate: bool,
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Public view of a registered concrete type.
#[derive(Debug, Clone)]
pub struct ConcreteInfo {
    pub ty: TypeRef,
    pub name: String,
    pub tag: Tag,
    pub options: ConcreteOptions,
    pub shape: fn() -> Shape,
}

/// Public view of a registered interface contract.
#[derive(Debug, Clone)]
pub struct ContractInfo {
    pub ty: TypeRef,
    pub options: InterfaceOptions,
    pub members: Vec<TypeRef>,
}

struct ConcreteEntry {
    info: ConcreteInfo,
    /// `Constructor<dyn Registered>`, for the catch-all contract.
    any_constructor: ErasedConstructor,
    contracts: Vec<TypeRef>,
}

struct ContractEntry {
    ty: TypeRef,
    options: InterfaceOptions,
    /// Concrete `TypeId` → `Constructor<I>`.
    members: HashMap<TypeId, ErasedConstructor>,
    by_prefix: HashMap<Vec<u8>, Vec<TypeId>>,
}

#[derive(Default)]
struct RegistryState {
    concretes: HashMap<TypeId, ConcreteEntry>,
    by_name: HashMap<String, TypeId>,
    by_tag: HashMap<Vec<u8>, TypeId>,
    by_prefix: HashMap<Vec<u8>, Vec<TypeId>>,
    contracts: HashMap<TypeId, ContractEntry>,
}

/// Where a tag is looked up.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Scope {
    /// Every registered concrete type. Used for top-level values and the
    /// catch-all interface.
    Global,
    Contract(TypeRef),
}

impl Scope {
    pub(crate) fn for_contract(contract: TypeRef) -> Self {
        if is_catch_all(contract.id) {
            Scope::Global
        } else {
            Scope::Contract(contract)
        }
    }
}

fn is_catch_all(contract: TypeId) -> bool {
    contract == TypeId::of::<dyn Registered>()
}

fn downcast_constructor<I: ?Sized + 'static>(
    erased: &(dyn Any + Send + Sync),
) -> Option<Constructor<I>> {
    erased.downcast_ref::<Constructor<I>>().cloned()
}

// ---------------------------------------------------------------------------
// TypeRegistry
// ---------------------------------------------------------------------------

/// Concrete types and interface contracts known to a codec.
pub struct TypeRegistry {
    layout: TagLayout,
    state: RwLock<RegistryState>,
}

impl TypeRegistry {
    pub fn new(layout: TagLayout) -> Self {
        Self {
            layout,
            state: RwLock::new(RegistryState::default()),
        }
    }

    pub fn layout(&self) -> TagLayout {
        self.layout
    }

    // -- Registration -------------------------------------------------------

    /// Register `C` under `name`. Fails if the name, the derived tag, or the
    /// type itself is already taken.
    pub fn register_concrete<C: Wire + Send + Sync>(
        &self,
        name: &str,
        options: ConcreteOptions,
    ) -> CodecResult<Tag> {
        let ty = TypeRef::of::<C>();
        let tag = Tag::derive(name, self.layout)?;
        let mut state = self.state.write();

        if state.concretes.contains_key(&ty.id) {
            return Err(CodecError::DuplicateType { type_name: ty.name });
        }
        if state.by_name.contains_key(name) {
            return Err(CodecError::DuplicateName { name: name.into() });
        }
        if let Some(existing) = state.by_tag.get(tag.as_bytes()) {
            let existing = state
                .concretes
                .get(existing)
                .map(|e| e.info.name.clone())
                .unwrap_or_default();
            return Err(CodecError::DuplicateTag {
                name: name.into(),
                existing,
                tag: tag.to_hex(),
            });
        }

        let any_constructor: Constructor<dyn Registered> =
            Arc::new(|value: Value, codec: &Codec| -> CodecResult<Box<dyn Registered>> {
                let concrete: Box<dyn Registered> = Box::new(C::from_value(value, codec)?);
                Ok(concrete)
            });

        let sharing = state.by_prefix.entry(tag.prefix().to_vec()).or_default();
        sharing.push(ty.id);
        if sharing.len() > 1 {
            warn!(
                wire_name = name,
                prefix = %hex::encode(tag.prefix()),
                "tag prefix shared with another concrete type; top-level values use the full tag"
            );
        }
        state.by_tag.insert(tag.as_bytes().to_vec(), ty.id);
        state.by_name.insert(name.to_string(), ty.id);
        state.concretes.insert(
            ty.id,
            ConcreteEntry {
                info: ConcreteInfo {
                    ty,
                    name: name.to_string(),
                    tag: tag.clone(),
                    options,
                    shape: C::shape,
                },
                any_constructor: Box::new(any_constructor),
                contracts: Vec::new(),
            },
        );

        debug!(wire_name = name, tag = %tag, rust_type = ty.name, "registered concrete type");
        Ok(tag)
    }

    /// Register the interface contract `I` (a `dyn Trait`).
    pub fn register_interface<I: ?Sized + Registered>(
        &self,
        options: InterfaceOptions,
    ) -> CodecResult<()> {
        let ty = TypeRef::of::<I>();
        if is_catch_all(ty.id) {
            return Err(CodecError::DuplicateContract { contract: ty.name });
        }
        let mut state = self.state.write();
        if state.contracts.contains_key(&ty.id) {
            return Err(CodecError::DuplicateContract { contract: ty.name });
        }
        state.contracts.insert(
            ty.id,
            ContractEntry {
                ty,
                options,
                members: HashMap::new(),
                by_prefix: HashMap::new(),
            },
        );
        debug!(contract = ty.name, ?options, "registered interface");
        Ok(())
    }

    /// Make the registered concrete `C` a member of the registered contract
    /// `I`. `upcast` turns a decoded `C` into the trait object.
    pub fn register_implementation<I, C>(&self, upcast: fn(C) -> Box<I>) -> CodecResult<()>
    where
        I: ?Sized + Registered,
        C: Wire + Send + Sync,
    {
        let contract_ty = TypeRef::of::<I>();
        let concrete_ty = TypeRef::of::<C>();
        let mut state = self.state.write();

        let prefix = match state.concretes.get(&concrete_ty.id) {
            Some(entry) => entry.info.tag.prefix().to_vec(),
            None => {
                return Err(CodecError::UnknownConcrete {
                    type_name: concrete_ty.name,
                })
            }
        };
        let contract = state
            .contracts
            .get_mut(&contract_ty.id)
            .ok_or(CodecError::UnknownContract {
                contract: contract_ty.name,
            })?;
        if contract.members.contains_key(&concrete_ty.id) {
            return Err(CodecError::DuplicateImplementation {
                contract: contract_ty.name,
                concrete: concrete_ty.name,
            });
        }

        let constructor: Constructor<I> =
            Arc::new(move |value: Value, codec: &Codec| -> CodecResult<Box<I>> {
                Ok(upcast(C::from_value(value, codec)?))
            });
        contract.members.insert(concrete_ty.id, Box::new(constructor));

        let sharing = contract.by_prefix.entry(prefix.clone()).or_default();
        sharing.push(concrete_ty.id);
        if sharing.len() > 1 {
            warn!(
                contract = contract_ty.name,
                prefix = %hex::encode(&prefix),
                "tag prefix shared inside contract; binary encoding uses the full tag"
            );
        }

        if let Some(entry) = state.concretes.get_mut(&concrete_ty.id) {
            entry.contracts.push(contract_ty);
        }
        debug!(
            contract = contract_ty.name,
            concrete = concrete_ty.name,
            "registered implementation"
        );
        Ok(())
    }

    // -- Lookup ---------------------------------------------------------------

    pub fn concrete_by_type(&self, id: TypeId) -> Option<ConcreteInfo> {
        self.state.read().concretes.get(&id).map(|e| e.info.clone())
    }

    pub fn concrete_by_tag(&self, tag: &Tag) -> Option<ConcreteInfo> {
        let state = self.state.read();
        let id = state.by_tag.get(tag.as_bytes())?;
        state.concretes.get(id).map(|e| e.info.clone())
    }

    pub fn concrete_by_name(&self, name: &str) -> Option<ConcreteInfo> {
        let state = self.state.read();
        let id = state.by_name.get(name)?;
        state.concretes.get(id).map(|e| e.info.clone())
    }

    pub fn tag_of<T: 'static>(&self) -> Option<Tag> {
        self.concrete_by_type(TypeId::of::<T>()).map(|info| info.tag)
    }

    /// Contracts `C` has been registered against.
    pub fn contracts_of<C: 'static>(&self) -> Vec<TypeRef> {
        self.state
            .read()
            .concretes
            .get(&TypeId::of::<C>())
            .map(|e| e.contracts.clone())
            .unwrap_or_default()
    }

    pub fn contract<I: ?Sized + 'static>(&self) -> Option<ContractInfo> {
        let state = self.state.read();
        let entry = state.contracts.get(&TypeId::of::<I>())?;
        let mut members: Vec<TypeRef> = entry
            .members
            .keys()
            .filter_map(|id| state.concretes.get(id).map(|e| e.info.ty))
            .collect();
        members.sort_by_key(|ty| ty.name);
        Some(ContractInfo {
            ty: entry.ty,
            options: entry.options,
            members,
        })
    }

    pub fn len(&self) -> usize {
        self.state.read().concretes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -- Engine Support -------------------------------------------------------

    /// Resolve the concrete type behind an interface position for encoding.
    /// Returns the entry and whether the binary engine must send the full
    /// tag.
    pub(crate) fn resolve_member(
        &self,
        scope: Scope,
        concrete: TypeId,
        concrete_name: &'static str,
    ) -> CodecResult<(ConcreteInfo, bool)> {
        let state = self.state.read();
        let entry = state
            .concretes
            .get(&concrete)
            .ok_or(CodecError::UnregisteredType {
                type_name: concrete_name,
            })?;
        let prefix = entry.info.tag.prefix();
        let long_form = match scope {
            Scope::Global => state.by_prefix.get(prefix).map_or(0, Vec::len) > 1,
            Scope::Contract(contract) => {
                let c = state
                    .contracts
                    .get(&contract.id)
                    .ok_or(CodecError::UnregisteredType {
                        type_name: contract.name,
                    })?;
                if !c.members.contains_key(&concrete) {
                    return Err(CodecError::NotImplemented {
                        contract: contract.name,
                        concrete: concrete_name,
                    });
                }
                c.options.always_disambiguate || c.by_prefix.get(prefix).map_or(0, Vec::len) > 1
            }
        };
        Ok((entry.info.clone(), long_form))
    }

    /// Resolve a tag read off the wire. `raw` may be the full tag or just the
    /// prefix.
    pub(crate) fn resolve_tag(&self, scope: Scope, raw: &[u8]) -> CodecResult<ConcreteInfo> {
        let state = self.state.read();
        let id = if raw.len() == self.layout.full_len() {
            *state
                .by_tag
                .get(raw)
                .ok_or_else(|| CodecError::UnregisteredTag { tag: hex::encode(raw) })?
        } else if raw.len() == self.layout.prefix_len {
            let candidates = match scope {
                Scope::Global => state.by_prefix.get(raw),
                Scope::Contract(contract) => state
                    .contracts
                    .get(&contract.id)
                    .and_then(|c| c.by_prefix.get(raw)),
            };
            match candidates.map(Vec::as_slice) {
                Some([only]) => *only,
                Some([_, _, ..]) => {
                    return Err(CodecError::Malformed(format!(
                        "tag prefix {} is ambiguous",
                        hex::encode(raw)
                    )))
                }
                _ => return Err(CodecError::UnregisteredTag { tag: hex::encode(raw) }),
            }
        } else {
            return Err(CodecError::Malformed(format!(
                "tag length {} matches neither the prefix ({}) nor the full tag ({})",
                raw.len(),
                self.layout.prefix_len,
                self.layout.full_len()
            )));
        };

        let entry = state
            .concretes
            .get(&id)
            .ok_or_else(|| CodecError::UnregisteredTag { tag: hex::encode(raw) })?;
        if let Scope::Contract(contract) = scope {
            let member = state
                .contracts
                .get(&contract.id)
                .is_some_and(|c| c.members.contains_key(&id));
            if !member {
                return Err(CodecError::NotImplemented {
                    contract: contract.name,
                    concrete: entry.info.ty.name,
                });
            }
        }
        Ok(entry.info.clone())
    }

    /// Constructor for `concrete` as a member of contract `I`.
    pub(crate) fn constructor<I: ?Sized + 'static>(
        &self,
        concrete: TypeId,
        concrete_name: &'static str,
    ) -> CodecResult<Constructor<I>> {
        let state = self.state.read();
        let contract = TypeRef::of::<I>();
        let erased: &(dyn Any + Send + Sync) = if is_catch_all(contract.id) {
            let entry = state
                .concretes
                .get(&concrete)
                .ok_or(CodecError::UnregisteredType {
                    type_name: concrete_name,
                })?;
            &*entry.any_constructor
        } else {
            let entry = state
                .contracts
                .get(&contract.id)
                .ok_or(CodecError::UnregisteredType {
                    type_name: contract.name,
                })?;
            entry
                .members
                .get(&concrete)
                .map(|boxed| &**boxed)
                .ok_or(CodecError::NotImplemented {
                    contract: contract.name,
                    concrete: concrete_name,
                })?
        };
        downcast_constructor::<I>(erased).ok_or(CodecError::NotImplemented {
            contract: contract.name,
            concrete: concrete_name,
        })
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("TypeRegistry")
            .field("layout", &self.layout)
            .field("concretes", &state.concretes.len())
            .field("contracts", &state.contracts.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
