use inkwell::attributes::Attribute;
use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::module::Module;
use inkwell::types::{
    AnyTypeEnum, BasicType, BasicTypeEnum, FloatType, IntType, PointerType,
    StructType, VoidType,
};
use inkwell::values::FunctionValue;
use inkwell::{context, AddressSpace};
use types::{Database, Type, TypeKind};

/// A wrapper around an LLVM Context that provides some additional methods.
pub(crate) struct Context {
    pub(crate) inner: context::Context,
}

impl Context {
    pub(crate) fn new() -> Self {
        Self { inner: context::Context::create() }
    }

    pub(crate) fn pointer_type(&self) -> PointerType<'_> {
        self.inner.ptr_type(AddressSpace::default())
    }

    pub(crate) fn bool_type(&self) -> IntType {
        self.inner.bool_type()
    }

    pub(crate) fn i8_type(&self) -> IntType {
        self.inner.i8_type()
    }

    pub(crate) fn i16_type(&self) -> IntType {
        self.inner.i16_type()
    }

    pub(crate) fn i32_type(&self) -> IntType {
        self.inner.i32_type()
    }

    pub(crate) fn i64_type(&self) -> IntType {
        self.inner.i64_type()
    }

    pub(crate) fn f32_type(&self) -> FloatType {
        self.inner.f32_type()
    }

    pub(crate) fn f64_type(&self) -> FloatType {
        self.inner.f64_type()
    }

    pub(crate) fn void_type(&self) -> VoidType {
        self.inner.void_type()
    }

    /// Returns the type of a C `long` (and thus of identifier hashes) for a
    /// target with the given pointer width in bytes.
    pub(crate) fn word_type(&self, word: u32) -> IntType {
        self.inner.custom_width_int_type(word * 8)
    }

    pub(crate) fn opaque_struct<'a>(&'a self, name: &str) -> StructType<'a> {
        self.inner.opaque_struct_type(name)
    }

    pub(crate) fn struct_type<'a>(
        &'a self,
        fields: &[BasicTypeEnum<'a>],
    ) -> StructType<'a> {
        self.inner.struct_type(fields, false)
    }

    pub(crate) fn named_struct<'a>(
        &'a self,
        name: &str,
        fields: &[BasicTypeEnum<'a>],
    ) -> StructType<'a> {
        let typ = self.opaque_struct(name);

        typ.set_body(fields, false);
        typ
    }

    pub(crate) fn append_basic_block<'a>(
        &'a self,
        function: FunctionValue<'a>,
        name: &str,
    ) -> BasicBlock<'a> {
        self.inner.append_basic_block(function, name)
    }

    pub(crate) fn create_builder(&self) -> Builder {
        self.inner.create_builder()
    }

    pub(crate) fn create_module(&self, name: &str) -> Module {
        self.inner.create_module(name)
    }

    pub(crate) fn enum_attribute(&self, name: &str, value: u64) -> Attribute {
        let id = Attribute::get_named_enum_kind_id(name);

        self.inner.create_enum_attribute(id, value)
    }

    pub(crate) fn type_attribute<'a>(
        &'a self,
        name: &str,
        typ: AnyTypeEnum<'a>,
    ) -> Attribute {
        let id = Attribute::get_named_enum_kind_id(name);

        self.inner.create_type_attribute(id, typ)
    }

    /// Returns the LLVM type used for values of the given type.
    ///
    /// Records are represented as arrays of bytes, as they are only ever
    /// copied around as a whole. A `None` is returned for `void` and types
    /// that have no machine representation.
    pub(crate) fn value_type<'a>(
        &'a self,
        db: &Database,
        typ: &Type,
        word: u32,
    ) -> Option<BasicTypeEnum<'a>> {
        let typ = match &typ.kind {
            TypeKind::Void | TypeKind::Unencodable => return None,
            TypeKind::Bool => self.i8_type().as_basic_type_enum(),
            TypeKind::Int { bytes, .. } => self
                .inner
                .custom_width_int_type(bytes * 8)
                .as_basic_type_enum(),
            TypeKind::Float(4) => self.f32_type().as_basic_type_enum(),
            TypeKind::Float(8) => self.f64_type().as_basic_type_enum(),
            TypeKind::Float(_) => self.inner.f128_type().as_basic_type_enum(),
            TypeKind::Selector => self.word_type(word).as_basic_type_enum(),
            TypeKind::Id
            | TypeKind::Instance(_)
            | TypeKind::Class
            | TypeKind::Block
            | TypeKind::CString
            | TypeKind::Pointer(_) => self.pointer_type().as_basic_type_enum(),
            TypeKind::Record(id) => self
                .i8_type()
                .array_type(id.size(db) as u32)
                .as_basic_type_enum(),
            TypeKind::Array(of, len) => {
                self.value_type(db, of, word)?.array_type(*len as u32).into()
            }
        };

        Some(typ)
    }
}
