//! # Field Plans
//!
//! The first time a struct type is encoded or decoded, its declared fields
//! are turned into a [`FieldPlan`]: only `pub` fields, each with its wire
//! name, `omitempty` flag, pointer depth and leaf shape. The plan is cached
//! for the life of the codec and shared by both engines.
//!
//! ## Promotion
//!
//! An embedded field (`[embed]`) whose leaf is a struct and which has no
//! explicit wire name is promoted: in JSON its fields are spliced into the
//! parent object instead of nesting. The descriptor keeps a reference to the
//! embedded type's own plan. Binary is positional and ignores promotion.
//!
//! A promoted name is visible only from the shallowest embedding that
//! provides it. A direct field always wins. Two embeddings offering the same
//! name at the same depth hide it from both, so neither engine writes or
//! reads it.
//!
//! ## Build-once guarantee
//!
//! Lookups hit a `DashMap` without locking. A miss takes a reentrant build
//! lock, checks the map again, builds, and publishes. Building a promoted
//! field's plan re-enters the lock on the same thread; a type that embeds
//! itself shows up on the in-progress stack and is rejected.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::ReentrantMutex;
use tracing::trace;

use crate::error::{CodecError, CodecResult};
use crate::shape::{Shape, StructShape, TypeRef};

/// How one exported field travels on the wire.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Position of the field in the struct's `Value::Struct` slots.
    pub slot: usize,
    /// Declared Rust field name.
    pub name: &'static str,
    pub wire_name: &'static str,
    pub omit_empty: bool,
    /// Pointer levels between the field and its leaf.
    pub depth: usize,
    pub leaf: Shape,
    /// Plan of an embedded struct whose fields are promoted into the parent.
    pub promoted: Option<Arc<FieldPlan>>,
    /// Promoted names this embedding must not expose: taken by a direct
    /// field, by a shallower embedding, or ambiguous at equal depth.
    pub hidden: HashSet<&'static str>,
}

/// Ordered wire description of a struct type.
#[derive(Debug)]
pub struct FieldPlan {
    pub ty: TypeRef,
    /// Number of declared fields, exported or not.
    pub slots: usize,
    pub fields: Vec<FieldDescriptor>,
    /// Wire names of the non-promoted fields. These shadow promoted fields
    /// with the same name.
    pub direct_names: HashSet<&'static str>,
}

impl FieldPlan {
    pub fn field(&self, wire_name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.wire_name == wire_name)
    }

    /// Every wire name this plan can read or write in JSON, promoted ones
    /// included.
    pub fn json_names(&self) -> Vec<&'static str> {
        self.visible_names().into_iter().map(|(name, _)| name).collect()
    }

    /// Visible wire names with their embedding depth, 0 for direct fields.
    fn visible_names(&self) -> Vec<(&'static str, usize)> {
        let mut names = Vec::new();
        self.collect_names(&HashSet::new(), 0, &mut names);
        names
    }

    fn collect_names(
        &self,
        shadow: &HashSet<&'static str>,
        depth: usize,
        out: &mut Vec<(&'static str, usize)>,
    ) {
        for field in &self.fields {
            match &field.promoted {
                Some(sub) => {
                    let inner: HashSet<&'static str> =
                        shadow.union(&field.hidden).copied().collect();
                    sub.collect_names(&inner, depth + 1, out);
                }
                None if shadow.contains(field.wire_name) => {}
                None => out.push((field.wire_name, depth)),
            }
        }
    }
}

/// Fill in `hidden` for every promoted field of one plan.
fn hide_conflicts(fields: &mut [FieldDescriptor], direct_names: &HashSet<&'static str>) {
    let offered: Vec<Vec<(&'static str, usize)>> = fields
        .iter()
        .map(|f| f.promoted.as_ref().map(|sub| sub.visible_names()).unwrap_or_default())
        .collect();

    // name -> (shallowest depth, fields offering it there)
    let mut best: HashMap<&'static str, (usize, Vec<usize>)> = HashMap::new();
    for (index, names) in offered.iter().enumerate() {
        for &(name, depth) in names {
            let entry = best.entry(name).or_insert((depth, Vec::new()));
            if depth < entry.0 {
                *entry = (depth, vec![index]);
            } else if depth == entry.0 && !entry.1.contains(&index) {
                entry.1.push(index);
            }
        }
    }

    for (index, names) in offered.iter().enumerate() {
        for &(name, _) in names {
            let wins = !direct_names.contains(name)
                && best
                    .get(name)
                    .is_some_and(|(_, owners)| owners.as_slice() == [index]);
            if !wins {
                fields[index].hidden.insert(name);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PlanCache
// ---------------------------------------------------------------------------

/// Per-codec cache of field plans, keyed by struct type.
pub struct PlanCache {
    plans: DashMap<TypeId, Arc<FieldPlan>>,
    building: ReentrantMutex<RefCell<Vec<TypeId>>>,
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanCache {
    pub fn new() -> Self {
        Self {
            plans: DashMap::new(),
            building: ReentrantMutex::new(RefCell::new(Vec::new())),
        }
    }

    /// Cached plan for `shape`, building it on first use.
    pub fn plan_for(&self, shape: &StructShape) -> CodecResult<Arc<FieldPlan>> {
        let id = shape.ty.id;
        if let Some(plan) = self.plans.get(&id) {
            return Ok(Arc::clone(plan.value()));
        }

        let in_progress = self.building.lock();
        if let Some(plan) = self.plans.get(&id) {
            return Ok(Arc::clone(plan.value()));
        }
        if in_progress.borrow().contains(&id) {
            return Err(CodecError::Unsupported(format!(
                "{} embeds itself",
                shape.ty.name
            )));
        }

        in_progress.borrow_mut().push(id);
        let built = self.build(shape);
        in_progress.borrow_mut().pop();

        let plan = Arc::new(built?);
        self.plans.insert(id, Arc::clone(&plan));
        trace!(
            rust_type = shape.ty.name,
            fields = plan.fields.len(),
            "built field plan"
        );
        Ok(plan)
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    fn build(&self, shape: &StructShape) -> CodecResult<FieldPlan> {
        let specs = (shape.fields)();
        let mut fields = Vec::new();
        let mut direct_names = HashSet::new();

        for (slot, spec) in specs.iter().enumerate() {
            if !spec.exported {
                continue;
            }
            let field_shape = (spec.shape)();
            let (depth, leaf) = field_shape.peel();

            if depth > 0 && matches!(leaf, Shape::Interface(_)) {
                return Err(CodecError::Unsupported(format!(
                    "field {}.{} is a pointer to an interface",
                    shape.ty.name, spec.name
                )));
            }

            let promoted = match leaf {
                Shape::Struct(inner) if spec.embedded && spec.rename.is_none() => {
                    Some(self.plan_for(inner)?)
                }
                _ => None,
            };
            if promoted.is_none() {
                direct_names.insert(spec.wire_name());
            }

            fields.push(FieldDescriptor {
                slot,
                name: spec.name,
                wire_name: spec.wire_name(),
                omit_empty: spec.omit_empty,
                depth,
                leaf: leaf.clone(),
                promoted,
                hidden: HashSet::new(),
            });
        }
        hide_conflicts(&mut fields, &direct_names);

        Ok(FieldPlan {
            ty: shape.ty,
            slots: specs.len(),
            fields,
            direct_names,
        })
    }
}

impl std::fmt::Debug for PlanCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanCache")
            .field("plans", &self.plans.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
