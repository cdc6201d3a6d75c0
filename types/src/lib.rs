//! Resolved declarations of the object model.
//!
//! The types in this crate describe classes, categories, protocols, methods,
//! properties and the C types of instance variables, as produced by semantic
//! analysis. Declarations are stored in a `Database` and referred to using
//! small copyable IDs, such that emitters can pass them around freely.
pub mod body;
pub mod encoding;

use crate::body::Body;
use indexmap::IndexMap;
use std::collections::HashMap;

/// The name of the implicit receiver argument.
pub const SELF_NAME: &str = "self";

/// The name of the implicit selector argument.
pub const SELECTOR_NAME: &str = "_cmd";

/// The ownership qualifier of a type, as written in the source or inferred by
/// automatic reference counting.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// No qualifier is present.
    None,
    Strong,
    Weak,
    Autoreleasing,

    /// The `__unsafe_unretained` qualifier.
    ExplicitNone,
}

/// The garbage collection attribute of a type (`__strong` or `__weak` in GC
/// mode).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GcAttribute {
    None,
    Strong,
    Weak,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Void,
    Bool,
    Int { bytes: u32, signed: bool },
    Float(u32),

    /// The `id` type.
    Id,

    /// A pointer to an instance of a class, such as `Foo *`.
    Instance(ClassId),

    /// The `Class` type.
    Class,

    /// The `SEL` type.
    Selector,

    /// A block pointer.
    Block,

    /// A `char *`.
    CString,
    Pointer(Box<Type>),
    Record(RecordId),
    Array(Box<Type>, u64),

    /// A type that has no type encoding, such as a vector type.
    Unencodable,
}

/// A fully resolved C or Objective-C type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Type {
    pub kind: TypeKind,
    pub ownership: Ownership,
    pub gc: GcAttribute,
}

impl Type {
    pub fn new(kind: TypeKind) -> Type {
        Type { kind, ownership: Ownership::None, gc: GcAttribute::None }
    }

    pub fn void() -> Type {
        Type::new(TypeKind::Void)
    }

    pub fn bool() -> Type {
        Type::new(TypeKind::Bool)
    }

    pub fn int(bytes: u32, signed: bool) -> Type {
        Type::new(TypeKind::Int { bytes, signed })
    }

    pub fn float(bytes: u32) -> Type {
        Type::new(TypeKind::Float(bytes))
    }

    pub fn id() -> Type {
        Type::new(TypeKind::Id)
    }

    pub fn instance(class: ClassId) -> Type {
        Type::new(TypeKind::Instance(class))
    }

    pub fn class() -> Type {
        Type::new(TypeKind::Class)
    }

    pub fn selector() -> Type {
        Type::new(TypeKind::Selector)
    }

    pub fn block() -> Type {
        Type::new(TypeKind::Block)
    }

    pub fn c_string() -> Type {
        Type::new(TypeKind::CString)
    }

    pub fn pointer(to: Type) -> Type {
        Type::new(TypeKind::Pointer(Box::new(to)))
    }

    pub fn record(id: RecordId) -> Type {
        Type::new(TypeKind::Record(id))
    }

    pub fn array(of: Type, length: u64) -> Type {
        Type::new(TypeKind::Array(Box::new(of), length))
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Type {
        self.ownership = ownership;
        self
    }

    pub fn with_gc(mut self, gc: GcAttribute) -> Type {
        self.gc = gc;
        self
    }

    /// Returns `true` for `id`, `Class` and class instance pointers.
    pub fn is_object_pointer(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Id | TypeKind::Instance(_) | TypeKind::Class
        )
    }

    pub fn is_block_pointer(&self) -> bool {
        matches!(self.kind, TypeKind::Block)
    }

    /// Returns `true` if values of this type are retainable object
    /// references.
    pub fn is_retainable(&self) -> bool {
        self.is_object_pointer() || self.is_block_pointer()
    }

    /// Returns `true` if the type is represented as a pointer at the machine
    /// level.
    pub fn is_pointer_like(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Id
                | TypeKind::Instance(_)
                | TypeKind::Class
                | TypeKind::Block
                | TypeKind::Selector
                | TypeKind::CString
                | TypeKind::Pointer(_)
        )
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Void)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.kind, TypeKind::Int { .. } | TypeKind::Bool)
    }

    pub fn is_record(&self) -> bool {
        matches!(self.kind, TypeKind::Record(_))
    }

    /// Returns the pointee of a plain data pointer.
    pub fn pointee(&self) -> Option<&Type> {
        match &self.kind {
            TypeKind::Pointer(to) => Some(to),
            _ => None,
        }
    }

    /// Returns the size in bytes of this type, given the width of a pointer in
    /// bytes.
    pub fn size(&self, db: &Database, word: u32) -> u64 {
        match &self.kind {
            TypeKind::Void => 0,
            TypeKind::Bool => 1,
            TypeKind::Int { bytes, .. } => *bytes as u64,
            TypeKind::Float(bytes) => *bytes as u64,
            TypeKind::Record(id) => id.size(db),
            TypeKind::Array(of, len) => of.size(db, word) * len,
            _ => word as u64,
        }
    }

    /// Returns the alignment in bytes of this type.
    pub fn align(&self, db: &Database, word: u32) -> u64 {
        match &self.kind {
            TypeKind::Void | TypeKind::Bool => 1,
            TypeKind::Int { bytes, .. } => (*bytes as u64).min(word as u64 * 2),
            TypeKind::Float(bytes) => (*bytes as u64).min(word as u64 * 2),
            TypeKind::Record(id) => id.align(db),
            TypeKind::Array(of, _) => of.align(db, word),
            _ => word as u64,
        }
    }
}

/// The kind of an aggregate C type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Struct,
    Union,
}

/// A field of a struct or union, or an instance variable of a class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    /// The name of the field, or `None` for unnamed (padding) fields.
    pub name: Option<String>,
    pub typ: Type,

    /// The offset in bytes from the start of the containing aggregate.
    ///
    /// For instance variables this is the absolute offset in the object.
    pub offset: u64,

    /// The width in bits for bitfields.
    pub bit_width: Option<u32>,
}

impl Field {
    pub fn new(name: &str, typ: Type, offset: u64) -> Field {
        Field { name: Some(name.to_string()), typ, offset, bit_width: None }
    }

    pub fn unnamed(typ: Type, offset: u64) -> Field {
        Field { name: None, typ, offset, bit_width: None }
    }

    pub fn bitfield(name: &str, typ: Type, offset: u64, bits: u32) -> Field {
        Field {
            name: Some(name.to_string()),
            typ,
            offset,
            bit_width: Some(bits),
        }
    }

    pub fn is_bitfield(&self) -> bool {
        self.bit_width.is_some()
    }
}

/// Instance variables use the same representation as record fields.
pub type Ivar = Field;

/// A struct or union type with a computed layout.
pub struct Record {
    /// The tag of the record, or `None` for anonymous records.
    pub name: Option<String>,
    pub kind: RecordKind,
    pub fields: Vec<Field>,
    pub size: u64,
    pub align: u64,
}

impl Record {
    pub fn alloc(
        db: &mut Database,
        name: Option<String>,
        kind: RecordKind,
        fields: Vec<Field>,
        size: u64,
        align: u64,
    ) -> RecordId {
        let id = db.records.len() as u32;

        db.records.push(Record { name, kind, fields, size, align });
        RecordId(id)
    }

    /// Allocates a record and computes its layout using the C rules for
    /// naturally aligned fields.
    pub fn alloc_c_layout(
        db: &mut Database,
        name: Option<String>,
        kind: RecordKind,
        members: Vec<(Option<String>, Type)>,
        word: u32,
    ) -> RecordId {
        let mut fields = Vec::with_capacity(members.len());
        let mut offset = 0_u64;
        let mut size = 0;
        let mut align = 1;

        for (name, typ) in members {
            let field_size = typ.size(db, word);
            let field_align = typ.align(db, word).max(1);

            align = align.max(field_align);

            let field_offset = match kind {
                RecordKind::Struct => {
                    offset = offset.next_multiple_of(field_align);

                    let start = offset;

                    offset += field_size;
                    size = offset;
                    start
                }
                RecordKind::Union => {
                    size = size.max(field_size);
                    0
                }
            };

            fields.push(Field {
                name,
                typ,
                offset: field_offset,
                bit_width: None,
            });
        }

        let size = size.next_multiple_of(align);

        Record::alloc(db, name, kind, fields, size, align)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordId(pub u32);

impl RecordId {
    pub fn name(self, db: &Database) -> Option<&str> {
        self.get(db).name.as_deref()
    }

    pub fn kind(self, db: &Database) -> RecordKind {
        self.get(db).kind
    }

    pub fn is_union(self, db: &Database) -> bool {
        self.get(db).kind == RecordKind::Union
    }

    pub fn fields(self, db: &Database) -> &[Field] {
        &self.get(db).fields
    }

    pub fn size(self, db: &Database) -> u64 {
        self.get(db).size
    }

    pub fn align(self, db: &Database) -> u64 {
        self.get(db).align
    }

    fn get(self, db: &Database) -> &Record {
        &db.records[self.0 as usize]
    }
}

/// The kind of a method.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MethodKind {
    /// A method declared using `-`.
    Instance,

    /// A method declared using `+`.
    Class,
}

impl MethodKind {
    pub fn sigil(self) -> char {
        match self {
            MethodKind::Instance => '-',
            MethodKind::Class => '+',
        }
    }
}

/// A formal parameter of a method, excluding `self` and `_cmd`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub typ: Type,

    /// If ownership of the argument is transferred to the callee
    /// (`ns_consumed`).
    pub consumed: bool,
}

impl Parameter {
    pub fn new(name: &str, typ: Type) -> Parameter {
        Parameter { name: name.to_string(), typ, consumed: false }
    }

    pub fn consumed(name: &str, typ: Type) -> Parameter {
        Parameter { name: name.to_string(), typ, consumed: true }
    }
}

pub struct Method {
    pub selector: String,
    pub kind: MethodKind,
    pub parameters: Vec<Parameter>,
    pub return_type: Type,
    pub variadic: bool,

    /// The body of the method, if it's implemented.
    pub body: Option<Body>,
}

impl Method {
    pub fn alloc(
        db: &mut Database,
        selector: String,
        kind: MethodKind,
        parameters: Vec<Parameter>,
        return_type: Type,
    ) -> MethodId {
        let id = db.methods.len() as u32;

        db.methods.push(Method {
            selector,
            kind,
            parameters,
            return_type,
            variadic: false,
            body: None,
        });

        MethodId(id)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodId(pub u32);

impl MethodId {
    pub fn selector(self, db: &Database) -> &str {
        &self.get(db).selector
    }

    pub fn kind(self, db: &Database) -> MethodKind {
        self.get(db).kind
    }

    pub fn is_instance_method(self, db: &Database) -> bool {
        self.get(db).kind == MethodKind::Instance
    }

    pub fn parameters(self, db: &Database) -> &[Parameter] {
        &self.get(db).parameters
    }

    pub fn return_type(self, db: &Database) -> &Type {
        &self.get(db).return_type
    }

    pub fn is_variadic(self, db: &Database) -> bool {
        self.get(db).variadic
    }

    pub fn set_variadic(self, db: &mut Database) {
        self.get_mut(db).variadic = true;
    }

    pub fn body(self, db: &Database) -> Option<&Body> {
        self.get(db).body.as_ref()
    }

    pub fn set_body(self, db: &mut Database, body: Body) {
        self.get_mut(db).body = Some(body);
    }

    /// Returns `true` if any parameter is marked as consumed.
    pub fn has_consumed_parameters(self, db: &Database) -> bool {
        self.get(db).parameters.iter().any(|p| p.consumed)
    }

    fn get(self, db: &Database) -> &Method {
        &db.methods[self.0 as usize]
    }

    fn get_mut(self, db: &mut Database) -> &mut Method {
        &mut db.methods[self.0 as usize]
    }
}

/// The attributes of a property declaration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertyAttributes {
    pub readonly: bool,
    pub copy: bool,
    pub retain: bool,
    pub nonatomic: bool,
    pub weak: bool,

    /// A custom getter selector.
    pub getter: Option<String>,

    /// A custom setter selector.
    pub setter: Option<String>,
}

pub struct Property {
    pub name: String,
    pub typ: Type,
    pub attributes: PropertyAttributes,

    /// The instance variable backing a synthesized property.
    pub ivar: Option<String>,

    /// The getter and setter methods, if these are implemented.
    pub getter: Option<MethodId>,
    pub setter: Option<MethodId>,

    /// If the accessors are synthesized by the compiler.
    pub synthesized: bool,
}

impl Property {
    pub fn alloc(
        db: &mut Database,
        name: String,
        typ: Type,
        attributes: PropertyAttributes,
    ) -> PropertyId {
        let id = db.properties.len() as u32;

        db.properties.push(Property {
            name,
            typ,
            attributes,
            ivar: None,
            getter: None,
            setter: None,
            synthesized: false,
        });

        PropertyId(id)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropertyId(pub u32);

impl PropertyId {
    pub fn name(self, db: &Database) -> &str {
        &self.get(db).name
    }

    pub fn value_type(self, db: &Database) -> &Type {
        &self.get(db).typ
    }

    pub fn attributes(self, db: &Database) -> &PropertyAttributes {
        &self.get(db).attributes
    }

    pub fn ivar(self, db: &Database) -> Option<&str> {
        self.get(db).ivar.as_deref()
    }

    pub fn is_synthesized(self, db: &Database) -> bool {
        self.get(db).synthesized
    }

    pub fn getter(self, db: &Database) -> Option<MethodId> {
        self.get(db).getter
    }

    pub fn setter(self, db: &Database) -> Option<MethodId> {
        self.get(db).setter
    }

    pub fn getter_selector(self, db: &Database) -> String {
        let prop = self.get(db);

        prop.attributes.getter.clone().unwrap_or_else(|| prop.name.clone())
    }

    pub fn setter_selector(self, db: &Database) -> String {
        let prop = self.get(db);

        prop.attributes.setter.clone().unwrap_or_else(|| {
            let mut chars = prop.name.chars();
            let first = chars.next().map(|c| c.to_ascii_uppercase());

            format!(
                "set{}{}:",
                first.map(String::from).unwrap_or_default(),
                chars.as_str()
            )
        })
    }

    /// Marks the property as synthesized, backed by the given instance
    /// variable and using the given accessor implementations.
    pub fn synthesize(
        self,
        db: &mut Database,
        ivar: String,
        getter: Option<MethodId>,
        setter: Option<MethodId>,
    ) {
        let prop = self.get_mut(db);

        prop.synthesized = true;
        prop.ivar = Some(ivar);
        prop.getter = getter;
        prop.setter = setter;
    }

    fn get(self, db: &Database) -> &Property {
        &db.properties[self.0 as usize]
    }

    fn get_mut(self, db: &mut Database) -> &mut Property {
        &mut db.properties[self.0 as usize]
    }
}

/// The methods declared by a class, category or protocol, in declaration
/// order and keyed by their selectors.
#[derive(Default)]
pub struct Methods {
    pub instance: IndexMap<String, MethodId>,
    pub class: IndexMap<String, MethodId>,
}

impl Methods {
    fn add(&mut self, db: &Database, method: MethodId) {
        let name = method.selector(db).to_string();

        match method.kind(db) {
            MethodKind::Instance => self.instance.insert(name, method),
            MethodKind::Class => self.class.insert(name, method),
        };
    }
}

pub struct Class {
    pub name: String,
    pub superclass: Option<ClassId>,
    pub ivars: Vec<Ivar>,

    /// The size in bytes of an instance, including the ivars of all
    /// superclasses.
    pub instance_size: u64,
    pub protocols: Vec<ProtocolId>,
    pub properties: Vec<PropertyId>,
    pub methods: Methods,
}

impl Class {
    pub fn alloc(
        db: &mut Database,
        name: String,
        superclass: Option<ClassId>,
    ) -> ClassId {
        let id = ClassId(db.classes.len() as u32);

        db.class_mapping.insert(name.clone(), id);
        db.classes.push(Class {
            name,
            superclass,
            ivars: Vec::new(),
            instance_size: 0,
            protocols: Vec::new(),
            properties: Vec::new(),
            methods: Methods::default(),
        });

        id
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassId(pub u32);

impl ClassId {
    pub fn name(self, db: &Database) -> &str {
        &self.get(db).name
    }

    pub fn superclass(self, db: &Database) -> Option<ClassId> {
        self.get(db).superclass
    }

    pub fn ivars(self, db: &Database) -> &[Ivar] {
        &self.get(db).ivars
    }

    pub fn add_ivar(self, db: &mut Database, ivar: Ivar) {
        self.get_mut(db).ivars.push(ivar);
    }

    /// Returns the ivar with the given name, searching superclasses as well.
    pub fn ivar<'a>(self, db: &'a Database, name: &str) -> Option<&'a Ivar> {
        let mut current = Some(self);

        while let Some(id) = current {
            let found = id
                .get(db)
                .ivars
                .iter()
                .find(|i| i.name.as_deref() == Some(name));

            if found.is_some() {
                return found;
            }

            current = id.superclass(db);
        }

        None
    }

    pub fn instance_size(self, db: &Database) -> u64 {
        self.get(db).instance_size
    }

    pub fn set_instance_size(self, db: &mut Database, size: u64) {
        self.get_mut(db).instance_size = size;
    }

    pub fn protocols(self, db: &Database) -> &[ProtocolId] {
        &self.get(db).protocols
    }

    pub fn add_protocol(self, db: &mut Database, protocol: ProtocolId) {
        self.get_mut(db).protocols.push(protocol);
    }

    pub fn properties(self, db: &Database) -> &[PropertyId] {
        &self.get(db).properties
    }

    pub fn add_property(self, db: &mut Database, property: PropertyId) {
        self.get_mut(db).properties.push(property);
    }

    pub fn instance_methods(self, db: &Database) -> Vec<MethodId> {
        self.get(db).methods.instance.values().cloned().collect()
    }

    pub fn class_methods(self, db: &Database) -> Vec<MethodId> {
        self.get(db).methods.class.values().cloned().collect()
    }

    pub fn add_method(self, db: &mut Database, method: MethodId) {
        let mut methods = std::mem::take(&mut self.get_mut(db).methods);

        methods.add(db, method);
        self.get_mut(db).methods = methods;
    }

    /// Looks up a method by its selector, searching superclasses as well.
    pub fn method(
        self,
        db: &Database,
        kind: MethodKind,
        selector: &str,
    ) -> Option<MethodId> {
        let mut current = Some(self);

        while let Some(id) = current {
            let methods = &id.get(db).methods;
            let found = match kind {
                MethodKind::Instance => methods.instance.get(selector),
                MethodKind::Class => methods.class.get(selector),
            };

            if let Some(&method) = found {
                return Some(method);
            }

            current = id.superclass(db);
        }

        None
    }

    fn get(self, db: &Database) -> &Class {
        &db.classes[self.0 as usize]
    }

    fn get_mut(self, db: &mut Database) -> &mut Class {
        &mut db.classes[self.0 as usize]
    }
}

pub struct Category {
    pub name: String,
    pub class: ClassId,
    pub protocols: Vec<ProtocolId>,
    pub properties: Vec<PropertyId>,
    pub methods: Methods,
}

impl Category {
    pub fn alloc(
        db: &mut Database,
        name: String,
        class: ClassId,
    ) -> CategoryId {
        let id = CategoryId(db.categories.len() as u32);

        db.categories.push(Category {
            name,
            class,
            protocols: Vec::new(),
            properties: Vec::new(),
            methods: Methods::default(),
        });

        id
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CategoryId(pub u32);

impl CategoryId {
    pub fn name(self, db: &Database) -> &str {
        &self.get(db).name
    }

    pub fn class(self, db: &Database) -> ClassId {
        self.get(db).class
    }

    /// Returns the name used for category symbols, in the form
    /// `Class_Category`.
    pub fn extended_name(self, db: &Database) -> String {
        format!("{}_{}", self.class(db).name(db), self.name(db))
    }

    pub fn protocols(self, db: &Database) -> &[ProtocolId] {
        &self.get(db).protocols
    }

    pub fn add_protocol(self, db: &mut Database, protocol: ProtocolId) {
        self.get_mut(db).protocols.push(protocol);
    }

    pub fn properties(self, db: &Database) -> &[PropertyId] {
        &self.get(db).properties
    }

    pub fn add_property(self, db: &mut Database, property: PropertyId) {
        self.get_mut(db).properties.push(property);
    }

    pub fn instance_methods(self, db: &Database) -> Vec<MethodId> {
        self.get(db).methods.instance.values().cloned().collect()
    }

    pub fn class_methods(self, db: &Database) -> Vec<MethodId> {
        self.get(db).methods.class.values().cloned().collect()
    }

    pub fn add_method(self, db: &mut Database, method: MethodId) {
        let mut methods = std::mem::take(&mut self.get_mut(db).methods);

        methods.add(db, method);
        self.get_mut(db).methods = methods;
    }

    fn get(self, db: &Database) -> &Category {
        &db.categories[self.0 as usize]
    }

    fn get_mut(self, db: &mut Database) -> &mut Category {
        &mut db.categories[self.0 as usize]
    }
}

pub struct Protocol {
    pub name: String,

    /// The protocols this protocol inherits from.
    pub protocols: Vec<ProtocolId>,
    pub properties: Vec<PropertyId>,
    pub methods: Methods,
}

impl Protocol {
    pub fn alloc(db: &mut Database, name: String) -> ProtocolId {
        let id = ProtocolId(db.protocols.len() as u32);

        db.protocol_mapping.insert(name.clone(), id);
        db.protocols.push(Protocol {
            name,
            protocols: Vec::new(),
            properties: Vec::new(),
            methods: Methods::default(),
        });

        id
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProtocolId(pub u32);

impl ProtocolId {
    pub fn name(self, db: &Database) -> &str {
        &self.get(db).name
    }

    pub fn protocols(self, db: &Database) -> &[ProtocolId] {
        &self.get(db).protocols
    }

    pub fn add_protocol(self, db: &mut Database, protocol: ProtocolId) {
        self.get_mut(db).protocols.push(protocol);
    }

    pub fn properties(self, db: &Database) -> &[PropertyId] {
        &self.get(db).properties
    }

    pub fn add_property(self, db: &mut Database, property: PropertyId) {
        self.get_mut(db).properties.push(property);
    }

    pub fn add_method(self, db: &mut Database, method: MethodId) {
        let mut methods = std::mem::take(&mut self.get_mut(db).methods);

        methods.add(db, method);
        self.get_mut(db).methods = methods;
    }

    pub fn instance_methods(self, db: &Database) -> Vec<MethodId> {
        self.get(db).methods.instance.values().cloned().collect()
    }

    pub fn class_methods(self, db: &Database) -> Vec<MethodId> {
        self.get(db).methods.class.values().cloned().collect()
    }

    fn get(self, db: &Database) -> &Protocol {
        &db.protocols[self.0 as usize]
    }

    fn get_mut(self, db: &mut Database) -> &mut Protocol {
        &mut db.protocols[self.0 as usize]
    }
}

/// A database of all resolved declarations of a translation unit.
pub struct Database {
    classes: Vec<Class>,
    class_mapping: HashMap<String, ClassId>,
    categories: Vec<Category>,
    protocols: Vec<Protocol>,
    protocol_mapping: HashMap<String, ProtocolId>,
    methods: Vec<Method>,
    properties: Vec<Property>,
    records: Vec<Record>,
}

impl Database {
    pub fn new() -> Self {
        Self {
            classes: Vec::new(),
            class_mapping: HashMap::new(),
            categories: Vec::new(),
            protocols: Vec::new(),
            protocol_mapping: HashMap::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn class(&self, name: &str) -> Option<ClassId> {
        self.class_mapping.get(name).cloned()
    }

    pub fn protocol(&self, name: &str) -> Option<ProtocolId> {
        self.protocol_mapping.get(name).cloned()
    }

    pub fn number_of_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn number_of_methods(&self) -> usize {
        self.methods.len()
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}
