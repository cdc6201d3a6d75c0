//! Bodies of the accessors of synthesized properties.
use crate::layout::gc::gc_attribute;
use crate::llvm::builder::Builder;
use crate::llvm::dispatch::ParameterBlock;
use crate::llvm::helpers::{
    assign, copy_struct, ivar_address, read_weak, record_has_objects, Barrier,
};
use crate::llvm::methods::{load_argument, return_value};
use crate::llvm::module::Module;
use crate::llvm::runtime_function::RuntimeFunction;
use tracing::trace;
use types::{ClassId, GcAttribute, Ivar, MethodId, PropertyId, TypeKind};

/// Generates the accessors of the synthesized properties of a class,
/// returning the methods defined.
///
/// Accessors that are implemented explicitly are left as-is.
pub(crate) fn synthesize(
    module: &mut Module<'_, '_>,
    class: ClassId,
) -> Vec<MethodId> {
    let db = module.db;
    let mut methods = Vec::new();

    for &prop in class.properties(db) {
        if !prop.is_synthesized(db) {
            continue;
        }

        let Some(ivar) = prop.ivar(db).and_then(|name| class.ivar(db, name))
        else {
            continue;
        };

        if let Some(method) = prop.getter(db).filter(|m| m.body(db).is_none())
        {
            getter(module, class, prop, ivar, method);
            methods.push(method);
        }

        if prop.attributes(db).readonly {
            continue;
        }

        if let Some(method) = prop.setter(db).filter(|m| m.body(db).is_none())
        {
            setter(module, class, prop, ivar, method);
            methods.push(method);
        }
    }

    methods
}

fn getter(
    module: &mut Module<'_, '_>,
    class: ClassId,
    property: PropertyId,
    ivar: &Ivar,
    method: MethodId,
) {
    let db = module.db;
    let attrs = property.attributes(db);
    let atomic = !attrs.nonatomic;
    let gc = module.config.gc.is_enabled();
    let func = module.add_method(method, class.name(db), None);
    let builder = Builder::new(module.context, func);
    let entry = builder.add_block("entry");

    trace!(
        class = class.name(db),
        property = property.name(db),
        atomic,
        "synthesizing getter"
    );

    builder.switch_to_block(entry);

    let recv = builder.argument(0).into_pointer_value();
    let addr = ivar_address(&builder, recv, ivar.offset);

    if let (TypeKind::Record(id), true) = (&ivar.typ.kind, atomic) {
        let params = builder.argument(2).into_pointer_value();
        let strong = gc && record_has_objects(db, *id);

        copy_struct(module, &builder, params, addr, id.size(db), true, strong);
        builder.return_value(Some(&params));
        return;
    }

    if atomic && (attrs.retain || attrs.copy) && ivar.typ.is_retainable() {
        let func = module.runtime_function(RuntimeFunction::GetProperty);
        let sel = builder.argument(1);
        let offset = module.word_value(ivar.offset);
        let res = builder.call_value(
            func,
            &[
                recv.into(),
                sel.into(),
                offset.into(),
                builder.u8_literal(1).into(),
            ],
        );

        builder.return_value(Some(&res));
        return;
    }

    let weak = attrs.weak || gc_attribute(&ivar.typ) == GcAttribute::Weak;
    let value = if gc && weak {
        Some(read_weak(module, &builder, addr).into())
    } else {
        module
            .context
            .value_type(db, &ivar.typ, module.word())
            .map(|typ| builder.load(typ, addr))
    };

    return_value(module, &builder, method, value);
}

fn setter(
    module: &mut Module<'_, '_>,
    class: ClassId,
    property: PropertyId,
    ivar: &Ivar,
    method: MethodId,
) {
    let db = module.db;
    let attrs = property.attributes(db);
    let atomic = !attrs.nonatomic;
    let gc = module.config.gc.is_enabled();
    let layout = ParameterBlock::new(db, method, module.word());
    let func = module.add_method(method, class.name(db), None);
    let builder = Builder::new(module.context, func);
    let entry = builder.add_block("entry");

    trace!(
        class = class.name(db),
        property = property.name(db),
        atomic,
        "synthesizing setter"
    );

    builder.switch_to_block(entry);

    let recv = builder.argument(0).into_pointer_value();
    let addr = ivar_address(&builder, recv, ivar.offset);

    if let (TypeKind::Record(id), true) = (&ivar.typ.kind, atomic) {
        let params = builder.argument(2).into_pointer_value();
        let offset = layout.offsets.first().copied().unwrap_or(0);
        let src = builder.byte_address(params, offset);
        let strong = gc && record_has_objects(db, *id);

        copy_struct(module, &builder, addr, src, id.size(db), true, strong);
        return_value(module, &builder, method, None);
        return;
    }

    let Some(value) = load_argument(module, &builder, method, &layout, 0)
    else {
        return_value(module, &builder, method, None);
        return;
    };

    if (attrs.retain || attrs.copy) && ivar.typ.is_retainable() {
        let sel = builder.argument(1);
        let offset = module.word_value(ivar.offset);

        if gc {
            let func = module.runtime_function(RuntimeFunction::SetProperty);

            builder.call(
                func,
                &[
                    recv.into(),
                    sel.into(),
                    offset.into(),
                    value.into(),
                    builder.u8_literal(atomic as u8).into(),
                    builder.u8_literal(attrs.copy as u8).into(),
                ],
            );
        } else {
            let func = module.runtime_function(match (atomic, attrs.copy) {
                (true, true) => RuntimeFunction::SetPropertyAtomicCopy,
                (true, false) => RuntimeFunction::SetPropertyAtomic,
                (false, true) => RuntimeFunction::SetPropertyNonatomicCopy,
                (false, false) => RuntimeFunction::SetPropertyNonatomic,
            });

            builder.call(
                func,
                &[recv.into(), sel.into(), value.into(), offset.into()],
            );
        }
    } else if gc {
        let weak = attrs.weak || gc_attribute(&ivar.typ) == GcAttribute::Weak;

        if weak {
            assign(module, &builder, Barrier::Weak, value, addr);
        } else if gc_attribute(&ivar.typ) == GcAttribute::Strong {
            let barrier = Barrier::Ivar(recv, ivar.offset);

            assign(module, &builder, barrier, value, addr);
        } else {
            builder.store(addr, value);
        }
    } else {
        builder.store(addr, value);
    }

    return_value(module, &builder, method, None);
}
