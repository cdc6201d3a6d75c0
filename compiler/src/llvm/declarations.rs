//! Emitting of the metadata describing classes, categories and blocks.
//!
//! The runtime loads classes and categories from constant descriptors that
//! refer to tables of methods and protocol hashes. Empty tables are stored
//! as NULL pointers. Besides the descriptors, each class comes with side
//! tables describing its instance variables, properties and the layouts
//! used by the collector.
use crate::layout::gc::{self, Selection};
use crate::layout::rc::{self, RcLayout};
use crate::layout::BlockInfo;
use crate::llvm::constants::{
    CATEGORY_CLASS_METHODS_SECTION, CATEGORY_INSTANCE_METHODS_SECTION,
    CATEGORY_SECTION, CLASS_EXTENSION_SECTION, CLASS_METHODS_SECTION,
    CLASS_SECTION, INSTANCE_METHODS_SECTION, IVARS_SECTION, LAYOUT_SECTION,
    PROPERTIES_SECTION, PROTOCOLS_SECTION,
};
use crate::llvm::module::{Module, StringKind};
use inkwell::module::Linkage;
use inkwell::values::{GlobalValue, PointerValue, StructValue};
use fnv::FnvHashSet;
use tracing::debug;
use types::encoding::{ivar_encoding, method_encoding, property_encoding};
use types::{
    CategoryId, ClassId, Database, MethodId, PropertyId, ProtocolId, Type,
};

/// The alignment of the descriptors and tables.
const ALIGNMENT: u32 = 4;

/// Returns the method table entry of a method, or `None` if the method
/// isn't implemented by the module.
fn method_entry<'ctx>(
    module: &mut Module<'_, 'ctx>,
    method: MethodId,
) -> Option<StructValue<'ctx>> {
    let db = module.db;
    let func = *module.methods.get(&method)?;
    let selector = method.selector(db);
    let hash = module.identifier(selector);
    let name = module.string_pointer(StringKind::MethodName, selector);
    let signature = match method_encoding(db, method, module.word()) {
        Some(enc) => module.string_pointer(StringKind::MethodType, &enc),
        None => module.context.pointer_type().const_null(),
    };
    let bits = module.context.i32_type().const_zero();
    let imp = func.as_global_value().as_pointer_value();

    Some(module.layouts.method.const_named_struct(&[
        hash.into(),
        name.into(),
        signature.into(),
        bits.into(),
        imp.into(),
    ]))
}

fn method_list<'ctx>(
    module: &mut Module<'_, 'ctx>,
    name: &str,
    section: &str,
    methods: &[MethodId],
) -> Option<PointerValue<'ctx>> {
    let entries: Vec<_> =
        methods.iter().filter_map(|&m| method_entry(module, m)).collect();

    if entries.is_empty() {
        return None;
    }

    let ctx = module.context;
    let value = ctx.inner.const_struct(
        &[
            ctx.pointer_type().const_null().into(),
            ctx.i32_type().const_int(entries.len() as u64, false).into(),
            module.layouts.method.const_array(&entries).into(),
        ],
        false,
    );

    Some(
        module
            .add_metadata(name, value.into(), section, ALIGNMENT)
            .as_pointer_value(),
    )
}

/// Emits the NULL terminated list of the hashes of the given protocols.
fn protocol_list<'ctx>(
    module: &mut Module<'_, 'ctx>,
    name: &str,
    protocols: &[ProtocolId],
) -> Option<PointerValue<'ctx>> {
    if protocols.is_empty() {
        return None;
    }

    let db = module.db;
    let mut ids: Vec<_> =
        protocols.iter().map(|p| module.identifier(p.name(db))).collect();

    ids.push(module.word_value(0));

    let array = module.layouts.word.const_array(&ids);
    let value = module.context.inner.const_struct(&[array.into()], false);

    Some(
        module
            .add_metadata(name, value.into(), PROTOCOLS_SECTION, ALIGNMENT)
            .as_pointer_value(),
    )
}

fn protocol_properties(
    db: &Database,
    protocol: ProtocolId,
    seen: &mut FnvHashSet<String>,
    properties: &mut Vec<PropertyId>,
) {
    for &parent in protocol.protocols(db) {
        protocol_properties(db, parent, seen, properties);
    }

    for &prop in protocol.properties(db) {
        if seen.insert(prop.name(db).to_string()) {
            properties.push(prop);
        }
    }
}

/// Returns the properties declared by a class or category, followed by
/// those of the protocols it adopts that it doesn't declare itself.
///
/// Protocols are searched depth-first, with the properties of inherited
/// protocols coming before those of the protocol itself.
pub(crate) fn all_properties(
    db: &Database,
    own: &[PropertyId],
    protocols: &[ProtocolId],
) -> Vec<PropertyId> {
    let mut seen = FnvHashSet::default();
    let mut properties = Vec::new();

    for &prop in own {
        seen.insert(prop.name(db).to_string());
        properties.push(prop);
    }

    for &protocol in protocols {
        protocol_properties(db, protocol, &mut seen, &mut properties);
    }

    properties
}

fn property_list<'ctx>(
    module: &mut Module<'_, 'ctx>,
    name: &str,
    properties: &[PropertyId],
) -> Option<PointerValue<'ctx>> {
    if properties.is_empty() {
        return None;
    }

    let db = module.db;
    let null = module.context.pointer_type().const_null();
    let entries: Vec<_> = properties
        .iter()
        .map(|&prop| {
            let name =
                module.string_pointer(StringKind::PropertyName, prop.name(db));
            let attrs = match property_encoding(db, prop, module.word()) {
                Some(enc) => {
                    module.string_pointer(StringKind::PropertyName, &enc)
                }
                None => null,
            };

            module
                .layouts
                .property
                .const_named_struct(&[name.into(), attrs.into()])
        })
        .collect();
    let ctx = module.context;
    let entry_size = (module.word() * 2) as u64;
    let value = ctx.inner.const_struct(
        &[
            ctx.i32_type().const_int(entry_size, false).into(),
            ctx.i32_type().const_int(entries.len() as u64, false).into(),
            module.layouts.property.const_array(&entries).into(),
        ],
        false,
    );

    Some(
        module
            .add_metadata(name, value.into(), PROPERTIES_SECTION, ALIGNMENT)
            .as_pointer_value(),
    )
}

/// Emits the list of the named instance variables declared by a class.
fn ivar_list<'ctx>(
    module: &mut Module<'_, 'ctx>,
    class: ClassId,
) -> Option<PointerValue<'ctx>> {
    let db = module.db;
    let null = module.context.pointer_type().const_null();
    let int = module.context.i32_type();
    let entries: Vec<_> = class
        .ivars(db)
        .iter()
        .filter_map(|ivar| {
            let name = ivar.name.as_deref()?;
            let name = module.string_pointer(StringKind::MethodName, name);
            let typ = match ivar_encoding(db, ivar, module.word()) {
                Some(enc) => {
                    module.string_pointer(StringKind::MethodType, &enc)
                }
                None => null,
            };
            let offset = int.const_int(ivar.offset, false);

            Some(module.layouts.ivar.const_named_struct(&[
                name.into(),
                typ.into(),
                offset.into(),
            ]))
        })
        .collect();

    if entries.is_empty() {
        return None;
    }

    let value = module.context.inner.const_struct(
        &[
            int.const_int(entries.len() as u64, false).into(),
            module.layouts.ivar.const_array(&entries).into(),
        ],
        false,
    );
    let name = format!("OBJC_INSTANCE_VARIABLES_{}", class.name(db));

    Some(
        module
            .add_metadata(&name, value.into(), IVARS_SECTION, ALIGNMENT)
            .as_pointer_value(),
    )
}

/// Stores the bytes of a layout, returning a pointer to the first byte.
fn layout_bytes<'ctx>(
    module: &mut Module<'_, 'ctx>,
    name: &str,
    bytes: &[u8],
) -> PointerValue<'ctx> {
    let value = module.context.inner.const_string(bytes, false);
    let global = module.add_metadata(name, value.into(), LAYOUT_SECTION, 1);

    global.set_constant(true);
    global.as_pointer_value()
}

/// Emits the strong or weak ivar layout of a class, if it has one.
fn ivar_layout<'ctx>(
    module: &mut Module<'_, 'ctx>,
    class: ClassId,
    selection: Selection,
) -> Option<PointerValue<'ctx>> {
    let db = module.db;
    let config = module.config;
    let name = class.name(db);
    let bitmap = gc::ivar_layout(
        db,
        class,
        module.word(),
        selection,
        config.gc,
        config.arc,
    )?;

    module.describe_layout(gc::describe_ivar_layout(name, selection, &bitmap));

    let symbol = match selection {
        Selection::Strong => format!("OBJC_IVAR_LAYOUT_{}", name),
        Selection::Weak => format!("OBJC_WEAK_IVAR_LAYOUT_{}", name),
    };

    Some(layout_bytes(module, &symbol, &bitmap))
}

/// Emits the class extension, which is only needed if the class has a weak
/// ivar layout or properties.
fn class_extension<'ctx>(
    module: &mut Module<'_, 'ctx>,
    class: ClassId,
    weak_layout: Option<PointerValue<'ctx>>,
    properties: Option<PointerValue<'ctx>>,
) -> Option<GlobalValue<'ctx>> {
    if weak_layout.is_none() && properties.is_none() {
        return None;
    }

    let null = module.context.pointer_type().const_null();
    let size = module.context.i32_type().const_int(
        module.word() as u64 * 3,
        false,
    );
    let value = module.layouts.class_extension.const_named_struct(&[
        size.into(),
        weak_layout.unwrap_or(null).into(),
        properties.unwrap_or(null).into(),
    ]);
    let name = format!("OBJC_CLASSEXT_{}", class.name(module.db));

    Some(module.add_metadata(
        &name,
        value.into(),
        CLASS_EXTENSION_SECTION,
        ALIGNMENT,
    ))
}

/// Emits the descriptor of a class and its side tables.
///
/// The `accessors` argument lists the synthesized accessors, which are added
/// to the instance methods.
pub(crate) fn define_class<'ctx>(
    module: &mut Module<'_, 'ctx>,
    class: ClassId,
    accessors: &[MethodId],
) -> GlobalValue<'ctx> {
    let db = module.db;
    let name = class.name(db);
    let null = module.context.pointer_type().const_null();
    let mut instance_methods = class.instance_methods(db);

    for &method in accessors {
        if !instance_methods.contains(&method) {
            instance_methods.push(method);
        }
    }

    debug!(
        class = name,
        instance_methods = instance_methods.len(),
        "defining class"
    );

    module.add_defined_symbol(name);

    let class_methods = method_list(
        module,
        &format!("OBJC_CLASS_METHODS_{}", name),
        CLASS_METHODS_SECTION,
        &class.class_methods(db),
    );
    let instance_methods = method_list(
        module,
        &format!("OBJC_INSTANCE_METHODS_{}", name),
        INSTANCE_METHODS_SECTION,
        &instance_methods,
    );
    let protocols = protocol_list(
        module,
        &format!("OBJC_CLASS_PROTOCOLS_{}", name),
        class.protocols(db),
    );

    ivar_list(module, class);
    ivar_layout(module, class, Selection::Strong);

    let weak_layout = ivar_layout(module, class, Selection::Weak);
    let properties = property_list(
        module,
        &format!("OBJC_$_PROP_LIST_{}", name),
        &all_properties(db, class.properties(db), class.protocols(db)),
    );

    class_extension(module, class, weak_layout, properties);

    let (super_hash, super_name) = match class.superclass(db) {
        Some(id) => (
            module.identifier(id.name(db)),
            module.string_pointer(StringKind::ClassName, id.name(db)),
        ),
        None => (module.word_value(0), null),
    };
    let value = module.layouts.class.const_named_struct(&[
        module.identifier(name).into(),
        module.string_pointer(StringKind::ClassName, name).into(),
        super_hash.into(),
        super_name.into(),
        module.word_value(class.instance_size(db)).into(),
        class_methods.unwrap_or(null).into(),
        instance_methods.unwrap_or(null).into(),
        protocols.unwrap_or(null).into(),
    ]);

    // Classes referred to before their definition already have a global of
    // the same type.
    let global = module.class_global(name);

    global.set_initializer(&value);
    global.set_linkage(Linkage::Private);
    global.set_section(Some(CLASS_SECTION));
    global.set_alignment(ALIGNMENT);
    module.used.push(global);
    module.classes.push(global);
    global
}

/// Emits the descriptor of a category and its property list.
pub(crate) fn define_category<'ctx>(
    module: &mut Module<'_, 'ctx>,
    category: CategoryId,
) -> GlobalValue<'ctx> {
    let db = module.db;
    let class = category.class(db);
    let name = category.extended_name(db);
    let null = module.context.pointer_type().const_null();

    debug!(
        class = class.name(db),
        category = category.name(db),
        "defining category"
    );

    module.add_lazy_symbol(class.name(db));

    let class_methods = method_list(
        module,
        &format!("OBJC_CATEGORY_CLASS_METHODS_{}", name),
        CATEGORY_CLASS_METHODS_SECTION,
        &category.class_methods(db),
    );
    let instance_methods = method_list(
        module,
        &format!("OBJC_CATEGORY_INSTANCE_METHODS_{}", name),
        CATEGORY_INSTANCE_METHODS_SECTION,
        &category.instance_methods(db),
    );
    let protocols = protocol_list(
        module,
        &format!("OBJC_CATEGORY_PROTOCOLS_{}", name),
        category.protocols(db),
    );

    property_list(
        module,
        &format!("OBJC_$_PROP_LIST_{}", name),
        &all_properties(db, category.properties(db), category.protocols(db)),
    );

    let value = module.layouts.category.const_named_struct(&[
        module.identifier(category.name(db)).into(),
        module.string_pointer(StringKind::ClassName, category.name(db)).into(),
        module.identifier(class.name(db)).into(),
        module.string_pointer(StringKind::ClassName, class.name(db)).into(),
        class_methods.unwrap_or(null).into(),
        instance_methods.unwrap_or(null).into(),
        protocols.unwrap_or(null).into(),
    ]);
    let global = module.add_metadata(
        &format!("OBJC_CATEGORY_{}", name),
        value.into(),
        CATEGORY_SECTION,
        ALIGNMENT,
    );

    module.categories.push(global);
    global
}

/// Records a protocol, returning its hash.
///
/// Protocols have no descriptor of their own, the runtime only ever sees
/// their hashes.
pub(crate) fn define_protocol(
    module: &mut Module<'_, '_>,
    protocol: ProtocolId,
) -> u64 {
    let name = protocol.name(module.db);
    let hash = module.hash(name);

    debug!(protocol = name, hash, "defining protocol");
    hash
}

fn rc_layout<'ctx>(
    module: &mut Module<'_, 'ctx>,
    layout: &RcLayout,
    byref: bool,
) -> PointerValue<'ctx> {
    module.describe_layout(rc::describe_layout(layout, byref));

    match layout {
        // Small layouts are stored in the pointer itself.
        RcLayout::Inline(value) => module
            .word_value(*value)
            .const_to_pointer(module.context.pointer_type()),
        RcLayout::Bytes(bytes) => {
            layout_bytes(module, "OBJC_BLOCK_LAYOUT_", bytes)
        }
    }
}

/// Emits the layout of the variables captured by a block.
///
/// With garbage collection the skip/scan layout is used, otherwise the
/// run/skip layout is used. A NULL pointer is returned if there's nothing
/// to describe.
pub(crate) fn block_layout<'ctx>(
    module: &mut Module<'_, 'ctx>,
    block: &BlockInfo,
) -> PointerValue<'ctx> {
    let db = module.db;
    let config = module.config;
    let word = module.word();
    let null = module.context.pointer_type().const_null();

    if config.gc.is_enabled() {
        let Some(bitmap) =
            gc::block_layout(db, block, word, config.gc, config.arc)
        else {
            return null;
        };

        module.describe_layout(gc::describe_block_layout(&bitmap));
        return layout_bytes(module, "OBJC_BLOCK_LAYOUT_", &bitmap);
    }

    match rc::block_layout(db, block, word, config.arc) {
        Some(layout) => rc_layout(module, &layout, false),
        None => null,
    }
}

/// Emits the layout of a `__block` variable of the given type.
pub(crate) fn byref_layout<'ctx>(
    module: &mut Module<'_, 'ctx>,
    typ: &Type,
) -> PointerValue<'ctx> {
    let null = module.context.pointer_type().const_null();

    if module.config.gc.is_enabled() {
        return null;
    }

    let layout =
        rc::byref_layout(module.db, typ, module.word(), module.config.arc);

    match layout {
        Some(layout) => rc_layout(module, &layout, true),
        None => null,
    }
}
