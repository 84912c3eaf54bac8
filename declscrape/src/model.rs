//! Declaration and type model — libclang entities re-materialized as
//! arena-indexed, front-end-independent records.
//!
//! Every [`Decl`] and [`Type`] lives in an arena owned by a [`Translation`]
//! and is referred to by index, so cyclic shapes (a record whose field points
//! back at the record) need no special ownership handling: the arena is
//! dropped as a whole when the translation goes away.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use clang::{
    CallingConvention as ClangCallingConvention, Entity, EntityKind,
    StorageClass as ClangStorageClass, TemplateArgument, TypeKind as ClangTypeKind,
};

use crate::graph::DeclGraph;
use crate::shake::InclusionRegistry;

/// Index of a [`Decl`] in its translation's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclIdx(u32);

impl DeclIdx {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a [`Type`] in its translation's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeIdx(u32);

impl TypeIdx {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Spelling location of a declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn of(entity: &Entity) -> Self {
        match entity.get_location() {
            Some(location) => {
                let spelling = location.get_spelling_location();
                Self {
                    file: spelling.file.map(|f| f.get_path()).unwrap_or_default(),
                    line: spelling.line,
                    column: spelling.column,
                }
            }
            None => Self::default(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// Kind of a materialized declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Struct,
    Union,
    Class,
    Enum,
    EnumConstant,
    Field,
    Function,
    Method,
    Parameter,
    Typedef,
    Variable,
    TemplateParameter,
    Unknown,
}

impl DeclKind {
    /// Maps an entity kind to the declaration kind the walker materializes,
    /// or `None` for kinds that are only recursed through (statements,
    /// expressions, references, attributes, namespaces and other containers).
    pub fn from_entity_kind(kind: EntityKind) -> Option<Self> {
        match kind {
            EntityKind::StructDecl => Some(Self::Struct),
            EntityKind::UnionDecl => Some(Self::Union),
            EntityKind::ClassDecl
            | EntityKind::ClassTemplate
            | EntityKind::ClassTemplatePartialSpecialization => Some(Self::Class),
            EntityKind::EnumDecl => Some(Self::Enum),
            EntityKind::EnumConstantDecl => Some(Self::EnumConstant),
            EntityKind::FieldDecl => Some(Self::Field),
            EntityKind::FunctionDecl | EntityKind::FunctionTemplate => Some(Self::Function),
            EntityKind::Method
            | EntityKind::Constructor
            | EntityKind::Destructor
            | EntityKind::ConversionFunction => Some(Self::Method),
            EntityKind::ParmDecl => Some(Self::Parameter),
            EntityKind::TypedefDecl | EntityKind::TypeAliasDecl => Some(Self::Typedef),
            EntityKind::VarDecl => Some(Self::Variable),
            EntityKind::TemplateTypeParameter
            | EntityKind::NonTypeTemplateParameter
            | EntityKind::TemplateTemplateParameter => Some(Self::TemplateParameter),
            // Still identities worth graph-registering, just with no payload.
            EntityKind::MacroDefinition
            | EntityKind::UsingDeclaration
            | EntityKind::UsingDirective
            | EntityKind::NamespaceAlias => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn is_record(self) -> bool {
        matches!(self, Self::Struct | Self::Union | Self::Class)
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Struct => "STRUCT",
            Self::Union => "UNION",
            Self::Class => "CLASS",
            Self::Enum => "ENUM",
            Self::EnumConstant => "ENUM_CONSTANT",
            Self::Field => "FIELD",
            Self::Function => "FUNCTION",
            Self::Method => "METHOD",
            Self::Parameter => "PARAMETER",
            Self::Typedef => "TYPEDEF",
            Self::Variable => "VARIABLE",
            Self::TemplateParameter => "TEMPLATE_PARAMETER",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Storage class of a function or variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageClass {
    #[default]
    None,
    Extern,
    Static,
    PrivateExtern,
    Auto,
    Register,
    Unknown,
}

impl StorageClass {
    pub fn from_clang(storage_class: Option<ClangStorageClass>) -> Self {
        match storage_class {
            Some(ClangStorageClass::None) | None => Self::None,
            Some(ClangStorageClass::Extern) => Self::Extern,
            Some(ClangStorageClass::Static) => Self::Static,
            Some(ClangStorageClass::PrivateExtern) => Self::PrivateExtern,
            Some(ClangStorageClass::Auto) => Self::Auto,
            Some(ClangStorageClass::Register) => Self::Register,
            Some(_) => Self::Unknown,
        }
    }
}

/// Calling convention of a function or function-prototype type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CallingConvention {
    #[default]
    C,
    X86StdCall,
    X86FastCall,
    X86ThisCall,
    X86Pascal,
    X86RegCall,
    X86VectorCall,
    X86Win64,
    X86_64SysV,
    Aapcs,
    AapcsVfp,
    IntelOclBicc,
    Swift,
    PreserveMost,
    PreserveAll,
    Unknown,
}

impl CallingConvention {
    pub fn from_clang(calling_convention: ClangCallingConvention) -> Self {
        match calling_convention {
            ClangCallingConvention::Cdecl => Self::C,
            ClangCallingConvention::Stdcall => Self::X86StdCall,
            ClangCallingConvention::Fastcall => Self::X86FastCall,
            ClangCallingConvention::Thiscall => Self::X86ThisCall,
            ClangCallingConvention::Pascal => Self::X86Pascal,
            ClangCallingConvention::RegCall => Self::X86RegCall,
            ClangCallingConvention::Vectorcall => Self::X86VectorCall,
            ClangCallingConvention::Win64 => Self::X86Win64,
            ClangCallingConvention::SysV64 => Self::X86_64SysV,
            ClangCallingConvention::Aapcs => Self::Aapcs,
            ClangCallingConvention::AapcsVfp => Self::AapcsVfp,
            ClangCallingConvention::IntelOcl => Self::IntelOclBicc,
            ClangCallingConvention::Swift => Self::Swift,
            ClangCallingConvention::PreserveMost => Self::PreserveMost,
            ClangCallingConvention::PreserveAll => Self::PreserveAll,
            _ => Self::Unknown,
        }
    }
}

/// Kind of a template argument, as far as the model distinguishes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateArgumentKind {
    Type,
    Declaration,
    Integral,
    Template,
    TemplateExpansion,
    Expression,
    Pack,
    Null,
    Nullptr,
}

impl TemplateArgumentKind {
    pub fn from_clang(argument: &TemplateArgument) -> Self {
        match argument {
            TemplateArgument::Type(_) => Self::Type,
            TemplateArgument::Declaration => Self::Declaration,
            TemplateArgument::Integral(..) => Self::Integral,
            TemplateArgument::Template => Self::Template,
            TemplateArgument::TemplateExpansion => Self::TemplateExpansion,
            TemplateArgument::Expression => Self::Expression,
            TemplateArgument::Pack => Self::Pack,
            TemplateArgument::Null => Self::Null,
            TemplateArgument::Nullptr => Self::Nullptr,
        }
    }
}

/// Kind of a type, converted from the front-end enumeration so the rest of
/// the model never sees libclang's ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Void,
    Bool,
    CharU,
    UChar,
    Char16,
    Char32,
    UShort,
    UInt,
    ULong,
    ULongLong,
    UInt128,
    CharS,
    SChar,
    WChar,
    Short,
    Int,
    Long,
    LongLong,
    Int128,
    Half,
    Float,
    Double,
    LongDouble,
    Float128,
    Complex,
    Pointer,
    BlockPointer,
    MemberPointer,
    LValueReference,
    RValueReference,
    Record,
    Enum,
    Typedef,
    FunctionPrototype,
    FunctionNoPrototype,
    ConstantArray,
    IncompleteArray,
    VariableArray,
    DependentSizedArray,
    Vector,
    ExtVector,
    Nullptr,
    Overload,
    Dependent,
    Auto,
    Elaborated,
    Attributed,
    Unknown,
}

impl TypeKind {
    pub fn from_clang(kind: ClangTypeKind) -> Self {
        match kind {
            ClangTypeKind::Void => Self::Void,
            ClangTypeKind::Bool => Self::Bool,
            ClangTypeKind::CharU => Self::CharU,
            ClangTypeKind::UChar => Self::UChar,
            ClangTypeKind::Char16 => Self::Char16,
            ClangTypeKind::Char32 => Self::Char32,
            ClangTypeKind::UShort => Self::UShort,
            ClangTypeKind::UInt => Self::UInt,
            ClangTypeKind::ULong => Self::ULong,
            ClangTypeKind::ULongLong => Self::ULongLong,
            ClangTypeKind::UInt128 => Self::UInt128,
            ClangTypeKind::CharS => Self::CharS,
            ClangTypeKind::SChar => Self::SChar,
            ClangTypeKind::WChar => Self::WChar,
            ClangTypeKind::Short => Self::Short,
            ClangTypeKind::Int => Self::Int,
            ClangTypeKind::Long => Self::Long,
            ClangTypeKind::LongLong => Self::LongLong,
            ClangTypeKind::Int128 => Self::Int128,
            ClangTypeKind::Half => Self::Half,
            ClangTypeKind::Float => Self::Float,
            ClangTypeKind::Double => Self::Double,
            ClangTypeKind::LongDouble => Self::LongDouble,
            ClangTypeKind::Float128 => Self::Float128,
            ClangTypeKind::Complex => Self::Complex,
            ClangTypeKind::Pointer => Self::Pointer,
            ClangTypeKind::BlockPointer => Self::BlockPointer,
            ClangTypeKind::MemberPointer => Self::MemberPointer,
            ClangTypeKind::LValueReference => Self::LValueReference,
            ClangTypeKind::RValueReference => Self::RValueReference,
            ClangTypeKind::Record => Self::Record,
            ClangTypeKind::Enum => Self::Enum,
            ClangTypeKind::Typedef => Self::Typedef,
            ClangTypeKind::FunctionPrototype => Self::FunctionPrototype,
            ClangTypeKind::FunctionNoPrototype => Self::FunctionNoPrototype,
            ClangTypeKind::ConstantArray => Self::ConstantArray,
            ClangTypeKind::IncompleteArray => Self::IncompleteArray,
            ClangTypeKind::VariableArray => Self::VariableArray,
            ClangTypeKind::DependentSizedArray => Self::DependentSizedArray,
            ClangTypeKind::Vector => Self::Vector,
            ClangTypeKind::ExtVector => Self::ExtVector,
            ClangTypeKind::Nullptr => Self::Nullptr,
            ClangTypeKind::Overload => Self::Overload,
            ClangTypeKind::Dependent => Self::Dependent,
            ClangTypeKind::Auto => Self::Auto,
            ClangTypeKind::Elaborated => Self::Elaborated,
            ClangTypeKind::Attributed => Self::Attributed,
            _ => Self::Unknown,
        }
    }

    /// The category drives traversal: leaves are not recursed into, pointer
    /// and array kinds recurse into their pointee/element, unique kinds carry
    /// a declaration.
    pub fn category(self) -> TypeCategory {
        match self {
            Self::Bool
            | Self::CharU
            | Self::UChar
            | Self::Char16
            | Self::Char32
            | Self::UShort
            | Self::UInt
            | Self::ULong
            | Self::ULongLong
            | Self::UInt128
            | Self::CharS
            | Self::SChar
            | Self::WChar
            | Self::Short
            | Self::Int
            | Self::Long
            | Self::LongLong
            | Self::Int128
            | Self::Half
            | Self::Float
            | Self::Double
            | Self::LongDouble
            | Self::Float128
            | Self::Complex => TypeCategory::Arithmetic,
            Self::Void
            | Self::Nullptr
            | Self::Overload
            | Self::Dependent
            | Self::Auto
            | Self::Elaborated
            | Self::Attributed => TypeCategory::Aux,
            Self::Pointer | Self::BlockPointer | Self::MemberPointer => TypeCategory::Pointer,
            Self::LValueReference | Self::RValueReference => TypeCategory::Reference,
            Self::Record
            | Self::Enum
            | Self::Typedef
            | Self::FunctionPrototype
            | Self::FunctionNoPrototype => TypeCategory::Unique,
            Self::ConstantArray
            | Self::IncompleteArray
            | Self::VariableArray
            | Self::DependentSizedArray
            | Self::Vector
            | Self::ExtVector => TypeCategory::Array,
            Self::Unknown => TypeCategory::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Arithmetic,
    Aux,
    Pointer,
    Reference,
    Unique,
    Array,
    Unknown,
}

/// Kind-specific declaration payload, written once by the walker.
#[derive(Debug, Default)]
pub enum DeclData {
    #[default]
    None,
    Record {
        fields: Vec<DeclIdx>,
        methods: Vec<DeclIdx>,
    },
    Enum {
        constants: Vec<DeclIdx>,
        underlying: Option<TypeIdx>,
    },
    EnumConstant {
        value: i64,
        unsigned_value: u64,
    },
    Function {
        return_type: Option<TypeIdx>,
        params: Vec<DeclIdx>,
        variadic: bool,
        storage_class: StorageClass,
        calling_convention: CallingConvention,
    },
    Field {
        /// Offset within the record, in bits; -1 when unavailable.
        offset: i64,
        bitfield: bool,
        /// Bitfield width in bits; -1 when this is not a bitfield.
        width: i64,
    },
    Typedef {
        aliased: Option<TypeIdx>,
    },
}

/// One materialized declaration. Exactly one exists per declaration id.
#[derive(Debug)]
pub struct Decl {
    pub id: String,
    pub kind: DeclKind,
    pub name: String,
    pub qualified_name: String,
    pub location: Location,
    pub comment: Option<String>,
    pub ty: Option<TypeIdx>,
    pub owner: Option<DeclIdx>,
    pub data: DeclData,
}

impl Decl {
    /// Fields of a record declaration, in source order.
    pub fn record_fields(&self) -> &[DeclIdx] {
        match &self.data {
            DeclData::Record { fields, .. } => fields,
            _ => &[],
        }
    }

    /// Methods (including constructors and destructors) of a record.
    pub fn record_methods(&self) -> &[DeclIdx] {
        match &self.data {
            DeclData::Record { methods, .. } => methods,
            _ => &[],
        }
    }

    /// Constants of an enum declaration, in source order.
    pub fn enum_constants(&self) -> &[DeclIdx] {
        match &self.data {
            DeclData::Enum { constants, .. } => constants,
            _ => &[],
        }
    }

    /// Underlying integer type of an enum declaration.
    pub fn enum_underlying_type(&self) -> Option<TypeIdx> {
        match &self.data {
            DeclData::Enum { underlying, .. } => *underlying,
            _ => None,
        }
    }

    pub fn enum_constant_value(&self) -> Option<i64> {
        match &self.data {
            DeclData::EnumConstant { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Parameters of a function or method declaration, in source order.
    pub fn function_params(&self) -> &[DeclIdx] {
        match &self.data {
            DeclData::Function { params, .. } => params,
            _ => &[],
        }
    }

    pub fn function_return_type(&self) -> Option<TypeIdx> {
        match &self.data {
            DeclData::Function { return_type, .. } => *return_type,
            _ => None,
        }
    }

    pub fn is_variadic(&self) -> bool {
        matches!(&self.data, DeclData::Function { variadic: true, .. })
    }

    pub fn storage_class(&self) -> StorageClass {
        match &self.data {
            DeclData::Function { storage_class, .. } => *storage_class,
            _ => StorageClass::None,
        }
    }

    pub fn calling_convention(&self) -> CallingConvention {
        match &self.data {
            DeclData::Function {
                calling_convention, ..
            } => *calling_convention,
            _ => CallingConvention::Unknown,
        }
    }

    /// The type a typedef aliases.
    pub fn aliased_type(&self) -> Option<TypeIdx> {
        match &self.data {
            DeclData::Typedef { aliased } => *aliased,
            _ => None,
        }
    }

    pub fn field_offset(&self) -> Option<i64> {
        match &self.data {
            DeclData::Field { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    pub fn is_bitfield(&self) -> bool {
        matches!(&self.data, DeclData::Field { bitfield: true, .. })
    }

    pub fn bitfield_width(&self) -> Option<i64> {
        match &self.data {
            DeclData::Field {
                bitfield: true,
                width,
                ..
            } => Some(*width),
            _ => None,
        }
    }
}

/// Category-specific type payload.
#[derive(Debug, Default)]
pub enum TypeData {
    #[default]
    None,
    Pointer {
        pointee: Option<TypeIdx>,
    },
    Array {
        element: Option<TypeIdx>,
        /// Constant element count; 0 for incomplete/variable arrays.
        size: i64,
    },
    Function {
        result: Option<TypeIdx>,
        arguments: Vec<TypeIdx>,
    },
}

/// One canonicalized type.
#[derive(Debug)]
pub struct Type {
    pub kind: TypeKind,
    pub category: TypeCategory,
    pub name: String,
    /// Size in bytes; -1 when the front-end cannot compute it.
    pub size: i64,
    /// Alignment in bytes; -1 when the front-end cannot compute it.
    pub alignment: i64,
    pub decl: Option<DeclIdx>,
    pub fields: Vec<DeclIdx>,
    pub data: TypeData,
}

impl Type {
    pub fn pointee(&self) -> Option<TypeIdx> {
        match &self.data {
            TypeData::Pointer { pointee } => *pointee,
            _ => None,
        }
    }

    pub fn element_type(&self) -> Option<TypeIdx> {
        match &self.data {
            TypeData::Array { element, .. } => *element,
            _ => None,
        }
    }

    pub fn array_size(&self) -> Option<i64> {
        match &self.data {
            TypeData::Array { size, .. } => Some(*size),
            _ => None,
        }
    }

    /// Return type of a function-prototype type.
    pub fn result_type(&self) -> Option<TypeIdx> {
        match &self.data {
            TypeData::Function { result, .. } => *result,
            _ => None,
        }
    }

    /// Parameter types of a function-prototype type.
    pub fn argument_types(&self) -> &[TypeIdx] {
        match &self.data {
            TypeData::Function { arguments, .. } => arguments,
            _ => &[],
        }
    }
}

/// The extracted model of one translation unit: the declaration and type
/// arenas, the dependency graph, the shaking verdicts, and the ordered
/// sequence of exposed declarations.
#[derive(Debug)]
pub struct Translation {
    pub(crate) decls: Vec<Decl>,
    pub(crate) types: Vec<Type>,
    pub(crate) decl_table: HashMap<String, DeclIdx>,
    pub(crate) graph: DeclGraph,
    pub(crate) registry: InclusionRegistry,
    pub(crate) exposed: Vec<DeclIdx>,
}

impl Translation {
    pub(crate) fn new() -> Self {
        Self {
            decls: Vec::new(),
            types: Vec::new(),
            decl_table: HashMap::new(),
            graph: DeclGraph::new(),
            registry: InclusionRegistry::default(),
            exposed: Vec::new(),
        }
    }

    pub fn decl(&self, idx: DeclIdx) -> &Decl {
        &self.decls[idx.index()]
    }

    pub fn ty(&self, idx: TypeIdx) -> &Type {
        &self.types[idx.index()]
    }

    /// Look a declaration up by id.
    pub fn find_decl(&self, id: &str) -> Option<&Decl> {
        self.decl_table.get(id).map(|idx| self.decl(*idx))
    }

    /// Look a declaration up by its fully qualified name. Ids are the stable
    /// key; this is a convenience for callers that only know the spelling.
    pub fn find_decl_by_name(&self, qualified_name: &str) -> Option<&Decl> {
        self.decls.iter().find(|d| d.qualified_name == qualified_name)
    }

    /// All materialized declarations, in discovery order.
    pub fn decls(&self) -> impl Iterator<Item = &Decl> {
        self.decls.iter()
    }

    /// Declarations that survived shaking, in discovery order.
    pub fn exposed(&self) -> impl Iterator<Item = &Decl> {
        self.exposed.iter().map(|idx| self.decl(*idx))
    }

    pub fn graph(&self) -> &DeclGraph {
        &self.graph
    }

    pub fn registry(&self) -> &InclusionRegistry {
        &self.registry
    }

    pub(crate) fn reserve_decl(&mut self, decl: Decl) -> DeclIdx {
        let idx = DeclIdx::new(self.decls.len());
        self.decl_table.insert(decl.id.clone(), idx);
        self.decls.push(decl);
        idx
    }

    pub(crate) fn reserve_type(&mut self, ty: Type) -> TypeIdx {
        let idx = TypeIdx::new(self.types.len());
        self.types.push(ty);
        idx
    }

    pub(crate) fn decl_mut(&mut self, idx: DeclIdx) -> &mut Decl {
        &mut self.decls[idx.index()]
    }

    pub(crate) fn type_mut(&mut self, idx: TypeIdx) -> &mut Type {
        &mut self.types[idx.index()]
    }

    pub(crate) fn expose_included(&mut self) {
        self.exposed = self
            .decls
            .iter()
            .enumerate()
            .filter(|(_, decl)| self.registry.is_included(&decl.id))
            .map(|(index, _)| DeclIdx::new(index))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_kinds_are_leaves() {
        for kind in [TypeKind::Int, TypeKind::Bool, TypeKind::Double, TypeKind::WChar] {
            assert_eq!(kind.category(), TypeCategory::Arithmetic);
        }
    }

    #[test]
    fn traversal_categories() {
        assert_eq!(TypeKind::Pointer.category(), TypeCategory::Pointer);
        assert_eq!(TypeKind::LValueReference.category(), TypeCategory::Reference);
        assert_eq!(TypeKind::ConstantArray.category(), TypeCategory::Array);
        assert_eq!(TypeKind::IncompleteArray.category(), TypeCategory::Array);
        assert_eq!(TypeKind::ExtVector.category(), TypeCategory::Array);
        assert_eq!(TypeKind::Record.category(), TypeCategory::Unique);
        assert_eq!(TypeKind::Typedef.category(), TypeCategory::Unique);
        assert_eq!(TypeKind::FunctionPrototype.category(), TypeCategory::Unique);
        assert_eq!(TypeKind::Void.category(), TypeCategory::Aux);
        assert_eq!(TypeKind::Unknown.category(), TypeCategory::Unknown);
    }

    #[test]
    fn unhandled_entity_kinds_are_not_materialized() {
        assert_eq!(DeclKind::from_entity_kind(EntityKind::Namespace), None);
        assert_eq!(DeclKind::from_entity_kind(EntityKind::TypeRef), None);
        assert_eq!(DeclKind::from_entity_kind(EntityKind::LinkageSpec), None);
    }

    #[test]
    fn record_kinds() {
        assert!(DeclKind::Struct.is_record());
        assert!(DeclKind::Union.is_record());
        assert!(DeclKind::Class.is_record());
        assert!(!DeclKind::Enum.is_record());
    }
}
