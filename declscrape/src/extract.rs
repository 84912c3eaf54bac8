//! Discovery — walks the clang cursor tree, materializing declarations and
//! types while recording dependency edges in the graph.
//!
//! The walk is a single depth-first pass. Each declaration id is investigated
//! exactly once: the graph node check short-circuits re-encounters, and the
//! declaration slot is reserved in the arena before any child recursion, so
//! self-referential records resolve against the in-progress record instead of
//! recursing forever. Shaking runs afterwards on the finished graph.

use std::collections::{HashMap, HashSet};

use clang::{Entity, EntityKind, TemplateArgument, Type as ClangType, TypeKind as ClangTypeKind};
use tracing::{debug, trace};

use crate::filter::FilterSet;
use crate::graph::ROOT_ID;
use crate::model::{
    CallingConvention, Decl, DeclData, DeclIdx, DeclKind, Location, StorageClass,
    TemplateArgumentKind, Translation, Type, TypeCategory, TypeData, TypeIdx, TypeKind,
};
use crate::shake;

/// Extract the declaration model from a parsed translation unit entity.
pub fn extract_entity(root: Entity<'_>, filter: &FilterSet, diagnostics: bool) -> Translation {
    let mut walker = Walker::new(filter);
    for child in root.get_children() {
        walker.visit(child);
    }
    let mut translation = walker.finish();

    translation.registry = shake::shake(&translation.graph, diagnostics);
    translation.expose_included();

    debug!(
        decls = translation.decls.len(),
        types = translation.types.len(),
        exposed = translation.exposed.len(),
        "extraction complete"
    );
    translation
}

struct Walker<'tu, 'f> {
    filter: &'f FilterSet,
    translation: Translation,
    /// Canonicalization: fully-qualified spelling → types already built for
    /// it, compared by front-end equality. Registered before recursing into
    /// subtypes so cyclic records close their loops here.
    type_registry: HashMap<String, Vec<(ClangType<'tu>, TypeIdx)>>,
    /// The declaration about to own any edge drawn; top is the current
    /// parent. Starts and ends as just the root.
    parents: Vec<String>,
}

impl<'tu, 'f> Walker<'tu, 'f> {
    fn new(filter: &'f FilterSet) -> Self {
        Self {
            filter,
            translation: Translation::new(),
            type_registry: HashMap::new(),
            parents: vec![ROOT_ID.to_string()],
        }
    }

    fn finish(self) -> Translation {
        assert_eq!(self.parents.len(), 1, "parent link stack out of balance");
        self.translation
    }

    // -----------------------------------------------------------------------
    // Parent-link stack
    // -----------------------------------------------------------------------

    fn parent_link(&self) -> &str {
        self.parents.last().expect("parent link stack underflow")
    }

    fn push_link(&mut self, id: &str) {
        self.parents.push(id.to_string());
    }

    fn push_root_link(&mut self) {
        self.parents.push(ROOT_ID.to_string());
    }

    fn pop_link(&mut self) {
        self.parents.pop().expect("parent link stack underflow");
    }

    // -----------------------------------------------------------------------
    // Cursor dispatch
    // -----------------------------------------------------------------------

    /// Visit one entity. Non-declaration kinds (namespaces, linkage specs,
    /// references, attributes, statements, expressions) are recursed through
    /// without materializing, so declarations buried in `extern "C"` blocks
    /// and similar wrappers are still found.
    fn visit(&mut self, entity: Entity<'tu>) -> Option<DeclIdx> {
        let kind = entity.get_kind();
        let Some(decl_kind) = DeclKind::from_entity_kind(kind) else {
            self.visit_children(entity);
            return None;
        };

        // A function template declared inside a record is a member like any
        // other method.
        let decl_kind = if kind == EntityKind::FunctionTemplate
            && entity
                .get_semantic_parent()
                .and_then(|p| DeclKind::from_entity_kind(p.get_kind()))
                .is_some_and(DeclKind::is_record)
        {
            DeclKind::Method
        } else {
            decl_kind
        };

        // Forward declarations are resolved up front so only the definition
        // is ever materialized.
        if !entity.is_definition() {
            if let Some(definition) = entity.get_definition() {
                if definition != entity {
                    return self.visit(definition);
                }
            }
        }

        // Fields and parameters sometimes surface parented to the
        // translation unit itself; those carry no usable context.
        if matches!(
            decl_kind,
            DeclKind::Field | DeclKind::Parameter | DeclKind::TemplateParameter
        ) && entity
            .get_semantic_parent()
            .is_some_and(|p| p.get_kind() == EntityKind::TranslationUnit)
        {
            self.visit_children(entity);
            return None;
        }

        self.investigate(entity, decl_kind)
    }

    fn visit_children(&mut self, entity: Entity<'tu>) {
        for child in entity.get_children() {
            self.visit(child);
        }
    }

    /// Register the declaration in the graph and, on first encounter,
    /// materialize it. Re-encounters only contribute the parent edge.
    fn investigate(&mut self, entity: Entity<'tu>, kind: DeclKind) -> Option<DeclIdx> {
        let decl_id = entity.get_usr().map(|u| u.0).filter(|u| !u.is_empty())?;
        let qualified_name = qualified_name(&entity);
        let location = Location::of(&entity);
        let source = location.file.display().to_string();

        let status = self.filter.classify(&qualified_name, &source);
        let parent_id = self.parent_link().to_string();

        let node_existed = self.translation.graph.has_node(&decl_id);
        if !node_existed {
            self.translation.graph.add_node(&decl_id, status);
            self.translation.graph.adopt(ROOT_ID, &decl_id);
        }
        self.translation.graph.adopt(&parent_id, &decl_id);

        if node_existed {
            return self.translation.decl_table.get(&decl_id).copied();
        }

        trace!(kind = %kind, name = %qualified_name, status = ?status, "discovered decl");
        self.push_link(&decl_id);
        let idx = self.materialize(entity, kind, decl_id, qualified_name, location);
        self.pop_link();
        Some(idx)
    }

    // -----------------------------------------------------------------------
    // Declaration materialization — one arm per kind
    // -----------------------------------------------------------------------

    fn materialize(
        &mut self,
        entity: Entity<'tu>,
        kind: DeclKind,
        decl_id: String,
        qualified_name: String,
        location: Location,
    ) -> DeclIdx {
        // Reserve the slot before recursing so cyclic references resolve to
        // the in-progress declaration.
        let idx = self.translation.reserve_decl(Decl {
            id: decl_id,
            kind,
            name: entity.get_name().unwrap_or_default(),
            qualified_name,
            location,
            comment: entity.get_comment(),
            ty: None,
            owner: None,
            data: DeclData::None,
        });

        let ty = entity.get_type().and_then(|t| self.investigate_type(t));
        self.translation.decl_mut(idx).ty = ty;

        match kind {
            DeclKind::Struct | DeclKind::Union | DeclKind::Class => self.init_record(idx, entity),
            DeclKind::Enum => self.init_enum(idx, entity),
            DeclKind::EnumConstant => {
                let (value, unsigned_value) = entity.get_enum_constant_value().unwrap_or((0, 0));
                self.translation.decl_mut(idx).data = DeclData::EnumConstant {
                    value,
                    unsigned_value,
                };
            }
            DeclKind::Function | DeclKind::Method => self.init_function(idx, entity),
            DeclKind::Typedef => self.init_typedef(idx, entity),
            DeclKind::Field => self.init_field(idx, entity),
            DeclKind::Parameter
            | DeclKind::Variable
            | DeclKind::TemplateParameter
            | DeclKind::Unknown => {}
        }

        // A specialization depends on its template arguments and, always, on
        // the primary template it was instantiated from.
        if let Some(primary) = entity.get_template() {
            self.investigate_template_arguments(entity);
            self.visit(primary);
        }

        idx
    }

    fn init_record(&mut self, idx: DeclIdx, entity: Entity<'tu>) {
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        for child in entity.get_children() {
            match child.get_kind() {
                EntityKind::FieldDecl => {
                    if let Some(field_idx) = self.visit(child) {
                        if self.translation.decl(field_idx).kind == DeclKind::Field {
                            self.translation.decl_mut(field_idx).owner = Some(idx);
                            fields.push(field_idx);
                        }
                    }
                }
                EntityKind::Method
                | EntityKind::Constructor
                | EntityKind::Destructor
                | EntityKind::ConversionFunction
                | EntityKind::FunctionTemplate => {
                    if let Some(method_idx) = self.visit(child) {
                        self.translation.decl_mut(method_idx).owner = Some(idx);
                        methods.push(method_idx);
                    }
                }
                EntityKind::BaseSpecifier => {
                    if let Some(base) = child.get_type() {
                        self.investigate_type(base);
                    }
                }
                _ => {
                    // Nested declarations are not requirements of the record;
                    // they hang off the root on their own.
                    self.push_root_link();
                    self.visit(child);
                    self.pop_link();
                }
            }
        }
        self.translation.decl_mut(idx).data = DeclData::Record { fields, methods };
    }

    fn init_enum(&mut self, idx: DeclIdx, entity: Entity<'tu>) {
        let underlying = entity
            .get_enum_underlying_type()
            .and_then(|t| self.investigate_type(t));

        let mut constants = Vec::new();
        for child in entity.get_children() {
            if child.get_kind() == EntityKind::EnumConstantDecl {
                if let Some(constant_idx) = self.visit(child) {
                    if self.translation.decl(constant_idx).kind == DeclKind::EnumConstant {
                        self.translation.decl_mut(constant_idx).owner = Some(idx);
                        constants.push(constant_idx);
                    }
                }
            } else {
                self.visit(child);
            }
        }
        self.translation.decl_mut(idx).data = DeclData::Enum {
            constants,
            underlying,
        };
    }

    fn init_function(&mut self, idx: DeclIdx, entity: Entity<'tu>) {
        let fn_type = entity.get_type();
        let variadic = entity.is_variadic();
        let storage_class = StorageClass::from_clang(entity.get_storage_class());
        let calling_convention = fn_type
            .and_then(|t| t.get_calling_convention())
            .map(CallingConvention::from_clang)
            .unwrap_or_default();
        let return_type = fn_type
            .and_then(|t| t.get_result_type())
            .and_then(|t| self.investigate_type(t));

        let mut params = Vec::new();
        for child in entity.get_children() {
            if child.get_kind() == EntityKind::ParmDecl {
                if let Some(param_idx) = self.visit(child) {
                    if self.translation.decl(param_idx).kind == DeclKind::Parameter {
                        self.translation.decl_mut(param_idx).owner = Some(idx);
                        params.push(param_idx);
                    }
                }
            }
        }
        self.translation.decl_mut(idx).data = DeclData::Function {
            return_type,
            params,
            variadic,
            storage_class,
            calling_convention,
        };
    }

    fn init_typedef(&mut self, idx: DeclIdx, entity: Entity<'tu>) {
        let aliased = entity
            .get_typedef_underlying_type()
            .and_then(|t| self.investigate_type(t));
        self.translation.decl_mut(idx).data = DeclData::Typedef { aliased };
    }

    fn init_field(&mut self, idx: DeclIdx, entity: Entity<'tu>) {
        let offset = entity.get_offset_of_field().map(|v| v as i64).unwrap_or(-1);
        let bitfield = entity.is_bit_field();
        let width = entity.get_bit_field_width().map(|w| w as i64).unwrap_or(-1);
        self.translation.decl_mut(idx).data = DeclData::Field {
            offset,
            bitfield,
            width,
        };
    }

    fn investigate_template_arguments(&mut self, entity: Entity<'tu>) {
        let Some(arguments) = entity.get_template_arguments() else {
            return;
        };
        for argument in &arguments {
            match TemplateArgumentKind::from_clang(argument) {
                TemplateArgumentKind::Type => {
                    if let TemplateArgument::Type(ty) = argument {
                        self.investigate_type(*ty);
                    }
                }
                kind => trace!(kind = ?kind, "skipping non-type template argument"),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Type materialization
    // -----------------------------------------------------------------------

    /// Build (or find) the canonical model type for a front-end type, visiting
    /// its declaration and structural dependencies so the graph records them
    /// against the current parent link.
    fn investigate_type(&mut self, cl: ClangType<'tu>) -> Option<TypeIdx> {
        // Sugar is unwrapped before classification: elaborated types to their
        // named type, attributed types to the modified type, unexposed types
        // to their canonical form (unless that is itself unexposed).
        match cl.get_kind() {
            ClangTypeKind::Elaborated => {
                if let Some(named) = cl.get_elaborated_type() {
                    return self.investigate_type(named);
                }
            }
            ClangTypeKind::Attributed => {
                if let Some(modified) = cl.get_modified_type() {
                    return self.investigate_type(modified);
                }
            }
            ClangTypeKind::Unexposed => {
                let canonical = cl.get_canonical_type();
                if canonical.get_kind() != ClangTypeKind::Unexposed {
                    return self.investigate_type(canonical);
                }
            }
            _ => {}
        }

        let name = cl.get_display_name();
        if let Some(existing) = self.find_type(&name, cl) {
            // The type is already built, but this occurrence still makes its
            // declarations requirements of the current parent.
            self.relink_type(existing);
            return Some(existing);
        }

        let kind = TypeKind::from_clang(cl.get_kind());
        let category = kind.category();
        let idx = self.translation.reserve_type(Type {
            kind,
            category,
            name: name.clone(),
            size: cl.get_sizeof().map(|v| v as i64).unwrap_or(-1),
            alignment: cl.get_alignof().map(|v| v as i64).unwrap_or(-1),
            decl: None,
            fields: Vec::new(),
            data: TypeData::None,
        });
        self.register_type(name, cl, idx);

        let decl = cl.get_declaration().and_then(|d| self.visit(d));
        self.translation.type_mut(idx).decl = decl;

        // Members as enumerated through the type, under the record's link.
        if let Some(decl_idx) = decl {
            if self.translation.decl(decl_idx).kind.is_record() {
                if let Some(field_entities) = cl.get_fields() {
                    let record_id = self.translation.decl(decl_idx).id.clone();
                    self.push_link(&record_id);
                    let fields = field_entities
                        .into_iter()
                        .filter_map(|f| self.visit(f))
                        .collect();
                    self.pop_link();
                    self.translation.type_mut(idx).fields = fields;
                }
            }
        }

        if matches!(kind, TypeKind::FunctionPrototype | TypeKind::FunctionNoPrototype) {
            let result = cl.get_result_type().and_then(|t| self.investigate_type(t));
            let arguments = cl
                .get_argument_types()
                .unwrap_or_default()
                .into_iter()
                .filter_map(|t| self.investigate_type(t))
                .collect();
            self.translation.type_mut(idx).data = TypeData::Function { result, arguments };
        } else {
            match category {
                TypeCategory::Pointer | TypeCategory::Reference => {
                    if let Some(pointee_type) = cl.get_pointee_type() {
                        let pointee = self.investigate_type(pointee_type);
                        self.translation.type_mut(idx).data = TypeData::Pointer { pointee };
                    }
                }
                TypeCategory::Array => {
                    let element = cl.get_element_type().and_then(|t| self.investigate_type(t));
                    let size = cl.get_size().map(|v| v as i64).unwrap_or(0);
                    self.translation.type_mut(idx).data = TypeData::Array { element, size };
                }
                _ => {}
            }
        }

        if let Some(arguments) = cl.get_template_argument_types() {
            for argument in arguments.into_iter().flatten() {
                self.investigate_type(argument);
            }
        }

        Some(idx)
    }

    /// Re-draw the dependency edges a type contributes, from the current
    /// parent to every declaration in the type's structural closure. Used
    /// when the type registry returns an already-built type.
    fn relink_type(&mut self, idx: TypeIdx) {
        let parent_id = self.parent_link().to_string();
        let mut seen = HashSet::new();
        self.relink_type_under(&parent_id, idx, &mut seen);
    }

    fn relink_type_under(&mut self, parent_id: &str, idx: TypeIdx, seen: &mut HashSet<TypeIdx>) {
        if !seen.insert(idx) {
            return;
        }
        if let Some(decl_idx) = self.translation.ty(idx).decl {
            let decl_id = self.translation.decl(decl_idx).id.clone();
            self.translation.graph.adopt(parent_id, &decl_id);
        }
        let subtypes: Vec<TypeIdx> = match &self.translation.ty(idx).data {
            TypeData::Pointer { pointee } => pointee.iter().copied().collect(),
            TypeData::Array { element, .. } => element.iter().copied().collect(),
            TypeData::Function { result, arguments } => {
                result.iter().copied().chain(arguments.iter().copied()).collect()
            }
            TypeData::None => Vec::new(),
        };
        for subtype in subtypes {
            self.relink_type_under(parent_id, subtype, seen);
        }
    }

    fn find_type(&self, name: &str, cl: ClangType<'tu>) -> Option<TypeIdx> {
        self.type_registry
            .get(name)?
            .iter()
            .find(|(registered, _)| *registered == cl)
            .map(|(_, idx)| *idx)
    }

    fn register_type(&mut self, name: String, cl: ClangType<'tu>, idx: TypeIdx) {
        self.type_registry.entry(name).or_default().push((cl, idx));
    }
}

/// "::"-joined path of named semantic ancestors plus the entity's own
/// spelling. Anonymous ancestors contribute nothing.
fn qualified_name(entity: &Entity) -> String {
    let mut parts = Vec::new();
    let mut current = Some(*entity);
    while let Some(e) = current {
        if e.get_kind() == EntityKind::TranslationUnit {
            break;
        }
        if let Some(name) = e.get_name() {
            if !name.is_empty() {
                parts.push(name);
            }
        }
        current = e.get_semantic_parent();
    }
    parts.reverse();
    parts.join("::")
}
