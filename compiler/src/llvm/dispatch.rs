//! Message sends using the parameter block calling convention.
//!
//! Every method takes the receiver, the selector hash and a pointer to a
//! block of memory holding the arguments, laid out like a C struct. Results
//! that fit in a pointer are returned directly; other results are written to
//! the start of the parameter block by the callee.
use crate::llvm::builder::Builder;
use crate::llvm::module::Module;
use crate::llvm::runtime_function::RuntimeFunction;
use inkwell::types::{BasicType, BasicTypeEnum};
use inkwell::values::{
    BasicMetadataValueEnum, BasicValueEnum, CallSiteValue, PointerValue,
};
use tracing::trace;
use types::{Database, MethodId, Type, TypeKind};

/// The alignment of the stack slot holding the parameter block.
pub(crate) const PARAMETER_BLOCK_ALIGNMENT: u32 = 16;

fn round_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        value
    } else {
        value.div_ceil(align) * align
    }
}

/// The way the result of a method is passed back to the caller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ReturnConvention {
    Void,

    /// The result is a pointer and returned as-is.
    Pointer,

    /// The result is an integer that fits in a pointer, and is returned as a
    /// pointer.
    Integer,

    /// The result is written to the start of the parameter block.
    InParameters,
}

impl ReturnConvention {
    pub(crate) fn of(db: &Database, typ: &Type, word: u32) -> Self {
        match &typ.kind {
            TypeKind::Void | TypeKind::Unencodable => ReturnConvention::Void,
            TypeKind::Bool | TypeKind::Selector => ReturnConvention::Integer,
            TypeKind::Int { bytes, .. } if *bytes <= word => {
                ReturnConvention::Integer
            }
            _ if typ.is_pointer_like() => ReturnConvention::Pointer,
            _ if typ.size(db, word) == 0 => ReturnConvention::Void,
            _ => ReturnConvention::InParameters,
        }
    }
}

/// The layout of the parameter block of a method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ParameterBlock {
    /// The offset of every fixed parameter.
    pub(crate) offsets: Vec<u64>,

    /// The size of the block, rounded up to a multiple of the word size.
    pub(crate) size: u64,
}

impl ParameterBlock {
    pub(crate) fn new(db: &Database, method: MethodId, word: u32) -> Self {
        let mut offsets = Vec::new();
        let mut end = 0;

        for param in method.parameters(db) {
            let offset = round_up(end, param.typ.align(db, word));

            offsets.push(offset);
            end = offset + param.typ.size(db, word);
        }

        let ret = method.return_type(db);

        if ReturnConvention::of(db, ret, word)
            == ReturnConvention::InParameters
        {
            end = end.max(ret.size(db, word));
        }

        ParameterBlock { offsets, size: round_up(end, word as u64) }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Returns `true` if a send of the given method must check for a `nil`
/// receiver.
///
/// The check is needed when the result is written to the parameter block
/// (which a `nil` receiver never does), or when consumed arguments must be
/// released because the method isn't going to do so.
pub(crate) fn needs_null_guard(
    db: &Database,
    method: MethodId,
    word: u32,
    arc: bool,
) -> bool {
    ReturnConvention::of(db, method.return_type(db), word)
        == ReturnConvention::InParameters
        || (arc && method.has_consumed_parameters(db))
}

/// A message to send.
pub(crate) struct MessageSend<'ctx> {
    pub(crate) receiver: PointerValue<'ctx>,

    /// The method that provides the signature of the send.
    pub(crate) method: MethodId,

    /// The arguments, including any variadic arguments after the fixed
    /// ones.
    pub(crate) arguments: Vec<BasicValueEnum<'ctx>>,

    /// The name of the class to start the method lookup at, for sends to
    /// `super`.
    pub(crate) lookup_class: Option<String>,
}

pub(crate) struct SendResult<'ctx> {
    /// The result of the send, or `None` for methods returning `void`.
    pub(crate) value: Option<BasicValueEnum<'ctx>>,

    /// The call of the messenger.
    pub(crate) call: CallSiteValue<'ctx>,
}

/// Generates the code for sending a message.
pub(crate) fn send<'ctx>(
    module: &mut Module<'_, 'ctx>,
    builder: &Builder<'ctx>,
    message: MessageSend<'ctx>,
) -> SendResult<'ctx> {
    let db = module.db;
    let word = module.word();
    let method = message.method;
    let ret = method.return_type(db);
    let conv = ReturnConvention::of(db, ret, word);
    let layout = ParameterBlock::new(db, method, word);
    let guard = needs_null_guard(db, method, word, module.config.arc);
    let selector = module.identifier(method.selector(db));

    trace!(
        selector = method.selector(db),
        super_send = message.lookup_class.is_some(),
        guard,
        "sending message"
    );

    let null_block = if guard {
        let null_block = builder.add_block("msgSend.null-receiver");
        let call_block = builder.add_block("msgSend.call");
        let is_null = builder.pointer_is_null(message.receiver);

        builder.branch(is_null, null_block, call_block);
        builder.switch_to_block(call_block);
        Some(null_block)
    } else {
        None
    };

    let params = if layout.is_empty() {
        module.context.pointer_type().const_null()
    } else {
        let typ = module.context.i8_type().array_type(layout.size as u32);
        let slot = builder.new_aligned_stack_slot(
            typ,
            PARAMETER_BLOCK_ALIGNMENT,
            "params",
        );

        for (&offset, &arg) in layout.offsets.iter().zip(&message.arguments) {
            builder.store(builder.byte_address(slot, offset), arg);
        }

        slot
    };

    let mut args: Vec<BasicMetadataValueEnum> =
        vec![message.receiver.into(), selector.into(), params.into()];

    let function = if let Some(name) = &message.lookup_class {
        module.add_lazy_symbol(name);
        args.push(module.identifier(name).into());
        RuntimeFunction::CallClass
    } else {
        RuntimeFunction::InlineCall
    };

    for &arg in message.arguments.iter().skip(layout.offsets.len()) {
        args.push(arg.into());
    }

    let func = module.runtime_function(function);
    let call = builder.call(func, &args);
    let raw =
        call.try_as_basic_value().left().map(|v| v.into_pointer_value());
    let value_type = module.context.value_type(db, ret, word);
    let value = match (conv, raw, value_type) {
        (ReturnConvention::Pointer, Some(raw), _) => Some(raw.into()),
        (ReturnConvention::Integer, Some(raw), Some(typ)) => {
            let int = builder.pointer_to_int(raw, module.layouts.word);
            let typ = typ.into_int_type();

            Some(builder.int_to_int(int, typ, false).into())
        }
        (ReturnConvention::InParameters, _, Some(typ)) => {
            Some(builder.load(typ, params))
        }
        _ => None,
    };

    let Some(null_block) = null_block else {
        return SendResult { value, call };
    };

    let call_end = builder.current_block();
    let cont_block = builder.add_block("msgSend.cont");

    builder.jump(cont_block);
    builder.switch_to_block(null_block);

    if module.config.arc {
        let release = module.runtime_function(RuntimeFunction::Release);
        let formal = method.parameters(db);

        for (param, &arg) in formal.iter().zip(&message.arguments) {
            if param.consumed && arg.is_pointer_value() {
                builder.call_void(release, &[arg.into()]);
            }
        }
    }

    builder.jump(cont_block);
    builder.switch_to_block(cont_block);

    let value = value.map(|val| {
        let typ: BasicTypeEnum = val.get_type();

        builder.phi(
            typ,
            &[(val, call_end), (typ.const_zero(), null_block)],
        )
    });

    SendResult { value, call }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::identifier_hash;
    use crate::test::{config, count, method, with_function, with_module};
    use types::{Parameter, Record, RecordKind};

    #[test]
    fn test_return_convention() {
        let db = Database::new();

        assert_eq!(
            ReturnConvention::of(&db, &Type::void(), 8),
            ReturnConvention::Void
        );
        assert_eq!(
            ReturnConvention::of(&db, &Type::id(), 8),
            ReturnConvention::Pointer
        );
        assert_eq!(
            ReturnConvention::of(&db, &Type::int(4, true), 8),
            ReturnConvention::Integer
        );
        assert_eq!(
            ReturnConvention::of(&db, &Type::int(8, true), 4),
            ReturnConvention::InParameters
        );
        assert_eq!(
            ReturnConvention::of(&db, &Type::float(8), 8),
            ReturnConvention::InParameters
        );
    }

    #[test]
    fn test_parameter_block() {
        let mut db = Database::new();
        let m = method(
            &mut db,
            "a:b:c:",
            vec![
                Parameter::new("a", Type::int(1, true)),
                Parameter::new("b", Type::float(8)),
                Parameter::new("c", Type::id()),
            ],
            Type::void(),
        );
        let layout = ParameterBlock::new(&db, m, 8);

        assert_eq!(layout.offsets, vec![0, 8, 16]);
        assert_eq!(layout.size, 24);
    }

    #[test]
    fn test_parameter_block_with_result() {
        let mut db = Database::new();
        let rec = Record::alloc_c_layout(
            &mut db,
            Some("Rect".to_string()),
            RecordKind::Struct,
            vec![
                (None, Type::float(8)),
                (None, Type::float(8)),
                (None, Type::float(8)),
                (None, Type::float(8)),
            ],
            8,
        );
        let small = method(&mut db, "value", Vec::new(), Type::float(8));
        let large = method(
            &mut db,
            "rect:",
            vec![Parameter::new("a", Type::id())],
            Type::record(rec),
        );
        let none = method(&mut db, "foo", Vec::new(), Type::id());

        assert_eq!(ParameterBlock::new(&db, small, 8).size, 8);
        assert_eq!(ParameterBlock::new(&db, large, 8).size, 32);
        assert!(ParameterBlock::new(&db, none, 8).is_empty());
    }

    #[test]
    fn test_send_without_guard() {
        let mut db = Database::new();
        let m = method(
            &mut db,
            "setValue:",
            vec![Parameter::new("value", Type::id())],
            Type::id(),
        );
        let mut cfg = config();

        cfg.arc = true;

        with_module(&db, &cfg, |module| {
            with_function(module, |module, builder| {
                let recv = builder.argument(0).into_pointer_value();
                let arg = builder.argument(2);
                let res = send(
                    module,
                    builder,
                    MessageSend {
                        receiver: recv,
                        method: m,
                        arguments: vec![arg],
                        lookup_class: None,
                    },
                );

                builder.return_value(Some(&res.value.unwrap()));
            });

            let ir = module.print_to_string().to_string();
            let hash = identifier_hash("setValue:", 8) as i64;

            assert!(!ir.contains("msgSend.null-receiver"));
            assert!(ir.contains(&format!(
                "call ptr (ptr, i64, ptr, ...) \
                 @mulle_objc_object_inline_call(ptr %0, i64 {}, ptr",
                hash
            )));
            assert!(!ir.contains("@objc_release"));
        });
    }

    #[test]
    fn test_send_with_consumed_argument() {
        let mut db = Database::new();
        let m = method(
            &mut db,
            "take:and:",
            vec![
                Parameter::consumed("a", Type::id()),
                Parameter::new("b", Type::id()),
            ],
            Type::id(),
        );
        let mut cfg = config();

        cfg.arc = true;

        with_module(&db, &cfg, |module| {
            with_function(module, |module, builder| {
                let recv = builder.argument(0).into_pointer_value();
                let a = builder.argument(2);
                let b = builder.new_stack_slot(
                    module.context.pointer_type(),
                    "b",
                );
                let res = send(
                    module,
                    builder,
                    MessageSend {
                        receiver: recv,
                        method: m,
                        arguments: vec![a, b.into()],
                        lookup_class: None,
                    },
                );

                builder.return_value(Some(&res.value.unwrap()));
            });

            let ir = module.print_to_string().to_string();

            assert!(ir.contains("msgSend.null-receiver:"));
            assert!(ir.contains("msgSend.cont:"));
            assert_eq!(count(&ir, "call void @objc_release(ptr %2)"), 1);
            assert_eq!(count(&ir, "call void @objc_release("), 1);
            assert!(ir.contains("phi ptr"));
        });
    }

    #[test]
    fn test_send_with_consumed_argument_without_arc() {
        let mut db = Database::new();
        let m = method(
            &mut db,
            "take:",
            vec![Parameter::consumed("a", Type::id())],
            Type::void(),
        );

        with_module(&db, &config(), |module| {
            with_function(module, |module, builder| {
                let recv = builder.argument(0).into_pointer_value();
                let a = builder.argument(2);

                send(
                    module,
                    builder,
                    MessageSend {
                        receiver: recv,
                        method: m,
                        arguments: vec![a],
                        lookup_class: None,
                    },
                );
                builder.return_value(Some(&module.null_pointer()));
            });

            let ir = module.print_to_string().to_string();

            assert!(!ir.contains("msgSend.null-receiver"));
        });
    }

    #[test]
    fn test_send_with_result_in_parameters() {
        let mut db = Database::new();
        let m = method(&mut db, "value", Vec::new(), Type::float(8));

        with_module(&db, &config(), |module| {
            with_function(module, |module, builder| {
                let recv = builder.argument(0).into_pointer_value();
                let res = send(
                    module,
                    builder,
                    MessageSend {
                        receiver: recv,
                        method: m,
                        arguments: Vec::new(),
                        lookup_class: None,
                    },
                );

                assert_eq!(
                    res.value.map(|v| v.get_type()),
                    Some(module.context.f64_type().into())
                );
                builder.return_value(Some(&module.null_pointer()));
            });

            let ir = module.print_to_string().to_string();

            assert!(ir.contains("msgSend.null-receiver:"));
            assert!(ir.contains("phi double"));
            assert!(ir.contains("%params = alloca [8 x i8], align 16"));
            assert!(!ir.contains("@objc_release"));
        });
    }

    #[test]
    fn test_send_to_super() {
        let mut db = Database::new();
        let m = method(&mut db, "init", Vec::new(), Type::id());

        with_module(&db, &config(), |module| {
            with_function(module, |module, builder| {
                let recv = builder.argument(0).into_pointer_value();
                let res = send(
                    module,
                    builder,
                    MessageSend {
                        receiver: recv,
                        method: m,
                        arguments: Vec::new(),
                        lookup_class: Some("Base".to_string()),
                    },
                );

                builder.return_value(Some(&res.value.unwrap()));
            });

            let ir = module.print_to_string().to_string();
            let sel = identifier_hash("init", 8) as i64;
            let class = identifier_hash("Base", 8) as i64;

            assert!(ir.contains(&format!(
                "@mulle_objc_object_call_class_id(ptr %0, i64 {}, \
                 ptr null, i64 {})",
                sel, class
            )));
            assert!(module.lazy_symbols.contains("Base"));
        });
    }

    #[test]
    fn test_send_with_integer_result() {
        let mut db = Database::new();
        let m = method(&mut db, "count", Vec::new(), Type::int(4, false));

        with_module(&db, &config(), |module| {
            with_function(module, |module, builder| {
                let recv = builder.argument(0).into_pointer_value();
                let res = send(
                    module,
                    builder,
                    MessageSend {
                        receiver: recv,
                        method: m,
                        arguments: Vec::new(),
                        lookup_class: None,
                    },
                );

                assert_eq!(
                    res.value.map(|v| v.get_type()),
                    Some(module.context.i32_type().into())
                );
                builder.return_value(Some(&module.null_pointer()));
            });

            let ir = module.print_to_string().to_string();

            assert!(ir.contains("ptrtoint ptr"));
            assert!(ir.contains("trunc i64"));
        });
    }
}
