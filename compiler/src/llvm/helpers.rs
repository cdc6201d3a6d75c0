//! Calls into the object runtime shared by the various code generators.
use crate::llvm::builder::Builder;
use crate::llvm::module::Module;
use crate::llvm::runtime_function::RuntimeFunction;
use inkwell::values::{BasicValueEnum, PointerValue};
use types::{Database, RecordId, Type, TypeKind};

/// The write barrier to use when storing an object pointer while garbage
/// collection is enabled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Barrier<'ctx> {
    Weak,
    Global,
    ThreadLocal,

    /// A store through a pointer of unknown origin.
    StrongCast,

    /// A store into an instance variable at the given offset.
    Ivar(PointerValue<'ctx>, u64),
}

/// Returns a reference to the class object of a class.
///
/// The class is looked up at runtime by its hash, and recorded as referenced
/// such that the runtime can verify it's loaded.
pub(crate) fn class_reference<'ctx>(
    module: &mut Module<'_, 'ctx>,
    builder: &Builder<'ctx>,
    name: &str,
) -> PointerValue<'ctx> {
    let id = module.identifier(name);
    let func = module.runtime_function(RuntimeFunction::GetClass);

    module.add_lazy_symbol(name);
    builder.call_value(func, &[id.into()]).into_pointer_value()
}

/// Returns the address of the instance variable at the given offset.
pub(crate) fn ivar_address<'ctx>(
    builder: &Builder<'ctx>,
    object: PointerValue<'ctx>,
    offset: u64,
) -> PointerValue<'ctx> {
    builder.byte_address(object, offset)
}

/// Returns `true` if a record contains object pointers, including those of
/// nested records.
pub(crate) fn record_has_objects(db: &Database, record: RecordId) -> bool {
    record.fields(db).iter().any(|f| type_has_objects(db, &f.typ))
}

fn type_has_objects(db: &Database, typ: &Type) -> bool {
    match &typ.kind {
        TypeKind::Record(id) => record_has_objects(db, *id),
        TypeKind::Array(of, _) => type_has_objects(db, of),
        _ => typ.is_retainable(),
    }
}

/// Converts a value to the pointer passed to the write barriers.
///
/// Values that aren't pointers are first converted to an integer of the same
/// width.
fn barrier_value<'ctx>(
    module: &Module<'_, 'ctx>,
    builder: &Builder<'ctx>,
    value: BasicValueEnum<'ctx>,
) -> PointerValue<'ctx> {
    let word = module.layouts.word;

    match value {
        BasicValueEnum::PointerValue(val) => val,
        BasicValueEnum::IntValue(val) => {
            builder.int_to_pointer(builder.int_to_int(val, word, false))
        }
        BasicValueEnum::FloatValue(val) => {
            let typ = if val.get_type() == module.context.f32_type() {
                module.context.i32_type()
            } else {
                module.context.i64_type()
            };
            let int = builder.bit_cast(val.into(), typ).into_int_value();

            builder.int_to_pointer(builder.int_to_int(int, word, false))
        }
        _ => module.context.pointer_type().const_null(),
    }
}

/// Stores a value using one of the write barriers of the collector.
pub(crate) fn assign<'ctx>(
    module: &Module<'_, 'ctx>,
    builder: &Builder<'ctx>,
    barrier: Barrier<'ctx>,
    value: BasicValueEnum<'ctx>,
    address: PointerValue<'ctx>,
) {
    let value = barrier_value(module, builder, value);

    match barrier {
        Barrier::Ivar(object, offset) => {
            let func = module.runtime_function(RuntimeFunction::AssignIvar);
            let offset = module.word_value(offset);

            builder.call(func, &[value.into(), object.into(), offset.into()]);
        }
        Barrier::Weak => {
            let func = module.runtime_function(RuntimeFunction::AssignWeak);

            builder.call(func, &[value.into(), address.into()]);
        }
        Barrier::Global => {
            let func = module.runtime_function(RuntimeFunction::AssignGlobal);

            builder.call(func, &[value.into(), address.into()]);
        }
        Barrier::ThreadLocal => {
            let func =
                module.runtime_function(RuntimeFunction::AssignThreadLocal);

            builder.call(func, &[value.into(), address.into()]);
        }
        Barrier::StrongCast => {
            let func =
                module.runtime_function(RuntimeFunction::AssignStrongCast);

            builder.call(func, &[value.into(), address.into()]);
        }
    }
}

/// Reads a `__weak` object pointer through the collector's read barrier.
pub(crate) fn read_weak<'ctx>(
    module: &Module<'_, 'ctx>,
    builder: &Builder<'ctx>,
    address: PointerValue<'ctx>,
) -> PointerValue<'ctx> {
    let func = module.runtime_function(RuntimeFunction::ReadWeak);

    builder.call_value(func, &[address.into()]).into_pointer_value()
}

/// Copies memory that may contain object pointers, such that the collector
/// sees the copy.
pub(crate) fn memmove_collectable<'ctx>(
    module: &Module<'_, 'ctx>,
    builder: &Builder<'ctx>,
    destination: PointerValue<'ctx>,
    source: PointerValue<'ctx>,
    size: u64,
) {
    let func = module.runtime_function(RuntimeFunction::MemmoveCollectable);
    let size = module.word_value(size);

    builder.call(func, &[destination.into(), source.into(), size.into()]);
}

/// Copies a struct, optionally using a lock to make the copy atomic.
pub(crate) fn copy_struct<'ctx>(
    module: &Module<'_, 'ctx>,
    builder: &Builder<'ctx>,
    destination: PointerValue<'ctx>,
    source: PointerValue<'ctx>,
    size: u64,
    atomic: bool,
    has_strong: bool,
) {
    let func = module.runtime_function(RuntimeFunction::CopyStruct);
    let size = module.word_value(size);
    let atomic = builder.u8_literal(atomic as u8);
    let strong = builder.u8_literal(has_strong as u8);

    builder.call(
        func,
        &[
            destination.into(),
            source.into(),
            size.into(),
            atomic.into(),
            strong.into(),
        ],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{count, setup, with_function};
    use types::{Field, Record, RecordKind};

    #[test]
    fn test_class_reference() {
        setup(|module| {
            with_function(module, |module, builder| {
                let class = class_reference(module, builder, "Foo");

                builder.return_value(Some(&class));
            });

            let ir = module.print_to_string().to_string();
            let hash = crate::hash::identifier_hash("Foo", 8) as i64;

            assert!(ir.contains(&format!(
                "call ptr @mulle_objc_unfailing_get_class(i64 {})",
                hash
            )));
            assert!(module.lazy_symbols.contains("Foo"));
        });
    }

    #[test]
    fn test_assign_converts_integers() {
        setup(|module| {
            with_function(module, |module, builder| {
                let recv = builder.argument(0).into_pointer_value();
                let value = module.context.i32_type().const_int(4, false);

                assign(
                    module,
                    builder,
                    Barrier::Ivar(recv, 16),
                    value.into(),
                    builder.byte_address(recv, 16),
                );
                assign(
                    module,
                    builder,
                    Barrier::StrongCast,
                    recv.into(),
                    recv,
                );
                builder.return_value(Some(&module.null_pointer()));
            });

            let ir = module.print_to_string().to_string();

            assert!(ir.contains("@objc_assign_ivar(ptr inttoptr"));
            assert!(ir.contains(", ptr %0, i64 16)"));
            assert!(ir.contains("@objc_assign_strongCast(ptr %0, ptr %0)"));
        });
    }

    #[test]
    fn test_assign_converts_floats() {
        setup(|module| {
            with_function(module, |module, builder| {
                let recv = builder.argument(0).into_pointer_value();
                let value = builder.load(module.context.f64_type(), recv);

                assign(module, builder, Barrier::Global, value, recv);
                builder.return_value(Some(&module.null_pointer()));
            });

            let ir = module.print_to_string().to_string();

            assert!(ir.contains("bitcast double"));
            assert!(ir.contains("inttoptr i64"));
            assert_eq!(count(&ir, "call ptr @objc_assign_global("), 1);
        });
    }

    #[test]
    fn test_read_weak_and_copies() {
        setup(|module| {
            with_function(module, |module, builder| {
                let recv = builder.argument(0).into_pointer_value();
                let addr = ivar_address(builder, recv, 8);

                read_weak(module, builder, addr);
                memmove_collectable(module, builder, recv, addr, 24);
                copy_struct(module, builder, recv, addr, 16, true, false);
                builder.return_value(Some(&module.null_pointer()));
            });

            let ir = module.print_to_string().to_string();

            assert!(ir.contains("call ptr @objc_read_weak(ptr"));
            assert!(ir.contains("@objc_memmove_collectable(ptr %0, ptr"));
            assert!(ir.contains(", i64 24)"));
            assert!(ir.contains("i64 16, i8 1, i8 0)"));
        });
    }

    #[test]
    fn test_record_has_objects() {
        let mut db = Database::new();
        let inner = Record::alloc(
            &mut db,
            None,
            RecordKind::Struct,
            vec![Field::new("a", Type::id(), 0)],
            8,
            8,
        );
        let outer = Record::alloc(
            &mut db,
            None,
            RecordKind::Struct,
            vec![Field::new("b", Type::record(inner), 0)],
            8,
            8,
        );
        let plain = Record::alloc(
            &mut db,
            None,
            RecordKind::Struct,
            vec![Field::new("c", Type::int(4, true), 0)],
            4,
            4,
        );

        assert!(record_has_objects(&db, outer));
        assert!(!record_has_objects(&db, plain));
    }
}
