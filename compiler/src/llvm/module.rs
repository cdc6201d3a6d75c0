use crate::config::Config;
use crate::hash::{Collision, IdentifierHasher};
use crate::llvm::constants::STRINGS_SECTION;
use crate::llvm::context::Context;
use crate::llvm::layouts::Layouts;
use crate::llvm::runtime_function::RuntimeFunction;
use indexmap::IndexSet;
use inkwell::module::{self, Linkage};
use inkwell::types::{BasicType, FunctionType};
use inkwell::values::{
    BasicValue, BasicValueEnum, FunctionValue, GlobalValue, IntValue,
    PointerValue,
};
use inkwell::AddressSpace;
use std::collections::HashMap;
use std::ops::Deref;
use tracing::trace;
use types::{Database, MethodId};

/// The kinds of strings stored in the string pool.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum StringKind {
    ClassName,
    MethodName,
    MethodType,
    PropertyName,
}

impl StringKind {
    fn symbol(self) -> &'static str {
        match self {
            StringKind::ClassName => "OBJC_CLASS_NAME_",
            StringKind::MethodName => "OBJC_METH_VAR_NAME_",
            StringKind::MethodType => "OBJC_METH_VAR_TYPE_",
            StringKind::PropertyName => "OBJC_PROP_NAME_ATTR_",
        }
    }
}

/// Returns the symbol name of the function implementing a method.
pub(crate) fn method_symbol_name(
    db: &Database,
    method: MethodId,
    class: &str,
    category: Option<&str>,
) -> String {
    let container = match category {
        Some(cat) => format!("{}({})", class, cat),
        None => class.to_string(),
    };

    format!(
        "\x01{}[{} {}]",
        method.kind(db).sigil(),
        container,
        method.selector(db)
    )
}

/// A wrapper around an LLVM Module that provides some additional methods.
///
/// Besides the LLVM module this type owns the state shared by all emitters of
/// a translation unit: the string pool, the identifier hashes, and the
/// registries of defined classes, categories and referenced symbols.
pub(crate) struct Module<'a, 'ctx> {
    pub(crate) inner: module::Module<'ctx>,
    pub(crate) context: &'ctx Context,
    pub(crate) layouts: &'a Layouts<'ctx>,
    pub(crate) db: &'a Database,
    pub(crate) config: &'a Config,
    hasher: IdentifierHasher,
    strings: HashMap<(StringKind, String), GlobalValue<'ctx>>,

    /// The names of classes referenced by the generated code.
    pub(crate) lazy_symbols: IndexSet<String>,

    /// The names of classes defined by this module.
    pub(crate) defined_symbols: IndexSet<String>,

    /// The class descriptors, in the order they are defined.
    pub(crate) classes: Vec<GlobalValue<'ctx>>,

    /// The category descriptors, in the order they are defined.
    pub(crate) categories: Vec<GlobalValue<'ctx>>,

    /// The functions of methods that have a body.
    pub(crate) methods: HashMap<MethodId, FunctionValue<'ctx>>,

    /// Globals the linker isn't allowed to strip.
    pub(crate) used: Vec<GlobalValue<'ctx>>,

    /// The human readable descriptions of the layouts computed so far.
    pub(crate) layouts_described: Vec<String>,
}

impl<'a, 'ctx> Module<'a, 'ctx> {
    pub(crate) fn new(
        context: &'ctx Context,
        layouts: &'a Layouts<'ctx>,
        db: &'a Database,
        config: &'a Config,
        name: &str,
    ) -> Self {
        Self {
            inner: context.create_module(name),
            context,
            layouts,
            db,
            config,
            hasher: IdentifierHasher::new(layouts.word_size),
            strings: HashMap::new(),
            lazy_symbols: IndexSet::new(),
            defined_symbols: IndexSet::new(),
            classes: Vec::new(),
            categories: Vec::new(),
            methods: HashMap::new(),
            used: Vec::new(),
            layouts_described: Vec::new(),
        }
    }

    /// Returns the size of a word in bytes.
    pub(crate) fn word(&self) -> u32 {
        self.layouts.word_size
    }

    pub(crate) fn add_global<T: BasicType<'ctx>>(
        &self,
        typ: T,
        name: &str,
    ) -> GlobalValue<'ctx> {
        self.inner.add_global(typ, Some(AddressSpace::default()), name)
    }

    /// Adds a private constant that must survive until link time, such as
    /// the tables read by the runtime.
    pub(crate) fn add_metadata(
        &mut self,
        name: &str,
        value: BasicValueEnum<'ctx>,
        section: &str,
        align: u32,
    ) -> GlobalValue<'ctx> {
        let global = self.add_global(value.get_type(), name);

        global.set_initializer(&value);
        global.set_linkage(Linkage::Private);
        global.set_section(Some(section));
        global.set_alignment(align);
        self.used.push(global);
        global
    }

    /// Returns the pool entry for a string, creating it if needed.
    ///
    /// Each distinct string is stored only once per kind, as a NUL terminated
    /// array of bytes.
    pub(crate) fn intern(
        &mut self,
        kind: StringKind,
        value: &str,
    ) -> GlobalValue<'ctx> {
        let key = (kind, value.to_string());

        if let Some(&global) = self.strings.get(&key) {
            return global;
        }

        let bytes = self.context.inner.const_string(value.as_bytes(), true);
        let global = self.add_global(bytes.get_type(), kind.symbol());

        global.set_initializer(&bytes);
        global.set_linkage(Linkage::Private);
        global.set_constant(true);
        global.set_section(Some(STRINGS_SECTION));
        global.set_alignment(1);
        global.set_unnamed_addr(true);

        self.used.push(global);
        self.strings.insert(key, global);
        global
    }

    /// Returns a pointer to a pooled string.
    pub(crate) fn string_pointer(
        &mut self,
        kind: StringKind,
        value: &str,
    ) -> PointerValue<'ctx> {
        self.intern(kind, value).as_pointer_value()
    }

    pub(crate) fn number_of_strings(&self) -> usize {
        self.strings.len()
    }

    pub(crate) fn hash(&mut self, name: &str) -> u64 {
        self.hasher.hash(name)
    }

    /// Returns the identifier hash of a name as a word sized constant.
    pub(crate) fn identifier(&mut self, name: &str) -> IntValue<'ctx> {
        let hash = self.hash(name);

        self.layouts.word.const_int(hash, false)
    }

    pub(crate) fn collisions(&self) -> &[Collision] {
        self.hasher.collisions()
    }

    /// Records that the generated code refers to the given class.
    pub(crate) fn add_lazy_symbol(&mut self, name: &str) {
        self.lazy_symbols.insert(name.to_string());
    }

    pub(crate) fn add_defined_symbol(&mut self, name: &str) {
        self.defined_symbols.insert(name.to_string());
    }

    /// Returns the names of the classes referred to but not defined.
    pub(crate) fn undefined_symbols(&self) -> Vec<String> {
        self.lazy_symbols
            .iter()
            .filter(|name| !self.defined_symbols.contains(*name))
            .cloned()
            .collect()
    }

    pub(crate) fn null_pointer(&self) -> BasicValueEnum<'ctx> {
        self.context.pointer_type().const_null().as_basic_value_enum()
    }

    pub(crate) fn word_value(&self, value: u64) -> IntValue<'ctx> {
        self.layouts.word.const_int(value, false)
    }

    /// Returns the descriptor global of a class, declaring it if needed.
    ///
    /// Classes referred to before they are defined get a placeholder of the
    /// same type, which is filled in when the class is defined.
    pub(crate) fn class_global(&self, name: &str) -> GlobalValue<'ctx> {
        let symbol = format!("OBJC_CLASS_{}", name);

        self.inner
            .get_global(&symbol)
            .unwrap_or_else(|| self.add_global(self.layouts.class, &symbol))
    }

    /// Returns the type of every method function.
    ///
    /// Methods take the receiver, the selector hash and a pointer to the
    /// block of parameters, and return a pointer sized value.
    pub(crate) fn method_type(&self) -> FunctionType<'ctx> {
        let ptr = self.context.pointer_type();

        ptr.fn_type(
            &[ptr.into(), self.layouts.word.into(), ptr.into()],
            false,
        )
    }

    /// Returns the function implementing a method, declaring it if needed.
    pub(crate) fn add_method(
        &mut self,
        method: MethodId,
        class: &str,
        category: Option<&str>,
    ) -> FunctionValue<'ctx> {
        if let Some(&func) = self.methods.get(&method) {
            return func;
        }

        let name = method_symbol_name(self.db, method, class, category);
        let func = self.inner.add_function(
            &name,
            self.method_type(),
            Some(Linkage::Internal),
        );

        self.methods.insert(method, func);
        func
    }

    pub(crate) fn runtime_function(
        &self,
        function: RuntimeFunction,
    ) -> FunctionValue<'ctx> {
        self.inner
            .get_function(function.name())
            .unwrap_or_else(|| function.build(self))
    }

    /// Records the human readable description of a layout.
    pub(crate) fn describe_layout(&mut self, description: String) {
        trace!(layout = description.trim(), "computed layout");

        if self.config.print_layouts {
            self.layouts_described.push(description);
        }
    }
}

impl<'a, 'ctx> Deref for Module<'a, 'ctx> {
    type Target = module::Module<'ctx>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
