use crate::llvm::module::Module;
use inkwell::attributes::AttributeLoc;
use inkwell::values::FunctionValue;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum RuntimeFunction {
    AssignGlobal,
    AssignIvar,
    AssignStrongCast,
    AssignThreadLocal,
    AssignWeak,
    CallClass,
    CopyStruct,
    ExceptionExtract,
    ExceptionMatch,
    ExceptionRethrow,
    ExceptionThrow,
    ExceptionTryEnter,
    ExceptionTryExit,
    GetClass,
    GetProperty,
    InlineCall,
    MemmoveCollectable,
    ReadWeak,
    Release,
    SetJmp,
    SetProperty,
    SetPropertyAtomic,
    SetPropertyAtomicCopy,
    SetPropertyNonatomic,
    SetPropertyNonatomicCopy,
    SyncEnter,
    SyncExit,
}

impl RuntimeFunction {
    pub(crate) fn name(self) -> &'static str {
        match self {
            RuntimeFunction::AssignGlobal => "objc_assign_global",
            RuntimeFunction::AssignIvar => "objc_assign_ivar",
            RuntimeFunction::AssignStrongCast => "objc_assign_strongCast",
            RuntimeFunction::AssignThreadLocal => "objc_assign_threadlocal",
            RuntimeFunction::AssignWeak => "objc_assign_weak",
            RuntimeFunction::CallClass => "mulle_objc_object_call_class_id",
            RuntimeFunction::CopyStruct => "objc_copyStruct",
            RuntimeFunction::ExceptionExtract => "objc_exception_extract",
            RuntimeFunction::ExceptionMatch => "objc_exception_match",
            RuntimeFunction::ExceptionRethrow => "objc_exception_rethrow",
            RuntimeFunction::ExceptionThrow => "objc_exception_throw",
            RuntimeFunction::ExceptionTryEnter => "objc_exception_try_enter",
            RuntimeFunction::ExceptionTryExit => "objc_exception_try_exit",
            RuntimeFunction::GetClass => "mulle_objc_unfailing_get_class",
            RuntimeFunction::GetProperty => "mulle_objc_class_get_property",
            RuntimeFunction::InlineCall => "mulle_objc_object_inline_call",
            RuntimeFunction::MemmoveCollectable => "objc_memmove_collectable",
            RuntimeFunction::ReadWeak => "objc_read_weak",
            RuntimeFunction::Release => "objc_release",
            RuntimeFunction::SetJmp => "_setjmp",
            RuntimeFunction::SetProperty => "mulle_objc_class_set_property",
            RuntimeFunction::SetPropertyAtomic => "objc_setProperty_atomic",
            RuntimeFunction::SetPropertyAtomicCopy => {
                "objc_setProperty_atomic_copy"
            }
            RuntimeFunction::SetPropertyNonatomic => {
                "objc_setProperty_nonatomic"
            }
            RuntimeFunction::SetPropertyNonatomicCopy => {
                "objc_setProperty_nonatomic_copy"
            }
            RuntimeFunction::SyncEnter => "objc_sync_enter",
            RuntimeFunction::SyncExit => "objc_sync_exit",
        }
    }

    /// Returns `true` if the function never unwinds.
    fn is_nounwind(self) -> bool {
        matches!(
            self,
            RuntimeFunction::AssignGlobal
                | RuntimeFunction::AssignIvar
                | RuntimeFunction::AssignStrongCast
                | RuntimeFunction::AssignThreadLocal
                | RuntimeFunction::AssignWeak
                | RuntimeFunction::ExceptionExtract
                | RuntimeFunction::ExceptionMatch
                | RuntimeFunction::ExceptionTryEnter
                | RuntimeFunction::ExceptionTryExit
                | RuntimeFunction::MemmoveCollectable
                | RuntimeFunction::GetClass
                | RuntimeFunction::ReadWeak
                | RuntimeFunction::SetJmp
        )
    }

    /// Returns `true` if calling the function may throw an exception.
    pub(crate) fn may_throw(self) -> bool {
        !self.is_nounwind()
    }

    pub(crate) fn build<'ctx>(
        self,
        module: &Module<'_, 'ctx>,
    ) -> FunctionValue<'ctx> {
        let context = module.context;
        let word = module.layouts.word;
        let fn_type = match self {
            RuntimeFunction::InlineCall => {
                let obj = context.pointer_type().into();
                let sel = word.into();
                let params = context.pointer_type().into();
                let ret = context.pointer_type();

                ret.fn_type(&[obj, sel, params], true)
            }
            RuntimeFunction::CallClass => {
                let obj = context.pointer_type().into();
                let sel = word.into();
                let params = context.pointer_type().into();
                let class = word.into();
                let ret = context.pointer_type();

                ret.fn_type(&[obj, sel, params, class], true)
            }
            RuntimeFunction::GetClass => {
                let class = word.into();
                let ret = context.pointer_type();

                ret.fn_type(&[class], false)
            }
            RuntimeFunction::ReadWeak
            | RuntimeFunction::ExceptionExtract => {
                let obj = context.pointer_type().into();
                let ret = context.pointer_type();

                ret.fn_type(&[obj], false)
            }
            RuntimeFunction::GetProperty => {
                let obj = context.pointer_type().into();
                let sel = word.into();
                let offset = word.into();
                let atomic = context.i8_type().into();
                let ret = context.pointer_type();

                ret.fn_type(&[obj, sel, offset, atomic], false)
            }
            RuntimeFunction::SetProperty => {
                let obj = context.pointer_type().into();
                let sel = word.into();
                let offset = word.into();
                let val = context.pointer_type().into();
                let atomic = context.i8_type().into();
                let copy = context.i8_type().into();
                let ret = context.void_type();

                ret.fn_type(&[obj, sel, offset, val, atomic, copy], false)
            }
            RuntimeFunction::SetPropertyAtomic
            | RuntimeFunction::SetPropertyAtomicCopy
            | RuntimeFunction::SetPropertyNonatomic
            | RuntimeFunction::SetPropertyNonatomicCopy => {
                let obj = context.pointer_type().into();
                let sel = word.into();
                let val = context.pointer_type().into();
                let offset = word.into();
                let ret = context.void_type();

                ret.fn_type(&[obj, sel, val, offset], false)
            }
            RuntimeFunction::CopyStruct => {
                let dst = context.pointer_type().into();
                let src = context.pointer_type().into();
                let size = word.into();
                let atomic = context.i8_type().into();
                let strong = context.i8_type().into();
                let ret = context.void_type();

                ret.fn_type(&[dst, src, size, atomic, strong], false)
            }
            RuntimeFunction::ExceptionThrow
            | RuntimeFunction::ExceptionTryEnter
            | RuntimeFunction::ExceptionTryExit
            | RuntimeFunction::Release => {
                let obj = context.pointer_type().into();
                let ret = context.void_type();

                ret.fn_type(&[obj], false)
            }
            RuntimeFunction::ExceptionRethrow => {
                context.void_type().fn_type(&[], false)
            }
            RuntimeFunction::AssignGlobal
            | RuntimeFunction::AssignStrongCast
            | RuntimeFunction::AssignThreadLocal
            | RuntimeFunction::AssignWeak => {
                let val = context.pointer_type().into();
                let dst = context.pointer_type().into();
                let ret = context.pointer_type();

                ret.fn_type(&[val, dst], false)
            }
            RuntimeFunction::AssignIvar => {
                let val = context.pointer_type().into();
                let obj = context.pointer_type().into();
                let offset = word.into();
                let ret = context.pointer_type();

                ret.fn_type(&[val, obj, offset], false)
            }
            RuntimeFunction::MemmoveCollectable => {
                let dst = context.pointer_type().into();
                let src = context.pointer_type().into();
                let size = word.into();
                let ret = context.pointer_type();

                ret.fn_type(&[dst, src, size], false)
            }
            RuntimeFunction::ExceptionMatch => {
                let class = context.pointer_type().into();
                let obj = context.pointer_type().into();
                let ret = context.i32_type();

                ret.fn_type(&[class, obj], false)
            }
            RuntimeFunction::SyncEnter | RuntimeFunction::SyncExit => {
                let obj = context.pointer_type().into();
                let ret = context.i32_type();

                ret.fn_type(&[obj], false)
            }
            RuntimeFunction::SetJmp => {
                let buf = context.pointer_type().into();
                let ret = context.i32_type();

                ret.fn_type(&[buf], false)
            }
        };

        let func = module.add_function(self.name(), fn_type, None);

        if self.is_nounwind() {
            let attr = context.enum_attribute("nounwind", 0);

            func.add_attribute(AttributeLoc::Function, attr);
        }

        match self {
            RuntimeFunction::InlineCall | RuntimeFunction::CallClass => {
                let attr = context.enum_attribute("nonlazybind", 0);

                func.add_attribute(AttributeLoc::Function, attr);
            }
            RuntimeFunction::ExceptionThrow
            | RuntimeFunction::ExceptionRethrow => {
                let attr = context.enum_attribute("noreturn", 0);

                func.add_attribute(AttributeLoc::Function, attr);
            }
            RuntimeFunction::SetJmp => {
                let attr = context.enum_attribute("returns_twice", 0);

                func.add_attribute(AttributeLoc::Function, attr);
            }
            _ => {}
        }

        func
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::setup;

    #[test]
    fn test_runtime_function_signatures() {
        setup(|module| {
            module.runtime_function(RuntimeFunction::InlineCall);
            module.runtime_function(RuntimeFunction::SetJmp);
            module.runtime_function(RuntimeFunction::ExceptionThrow);

            let ir = module.print_to_string().to_string();

            assert!(ir.contains(
                "declare ptr @mulle_objc_object_inline_call(\
                 ptr, i64, ptr, ...)"
            ));
            assert!(ir.contains("declare i32 @_setjmp(ptr)"));
            assert!(ir.contains("declare void @objc_exception_throw(ptr)"));
        });
    }

    #[test]
    fn test_runtime_function_is_reused() {
        setup(|module| {
            let a = module.runtime_function(RuntimeFunction::GetClass);
            let b = module.runtime_function(RuntimeFunction::GetClass);

            assert_eq!(a, b);
        });
    }

    #[test]
    fn test_may_throw() {
        assert!(RuntimeFunction::InlineCall.may_throw());
        assert!(RuntimeFunction::ExceptionThrow.may_throw());
        assert!(!RuntimeFunction::ExceptionTryEnter.may_throw());
        assert!(!RuntimeFunction::SetJmp.may_throw());
        assert!(!RuntimeFunction::GetClass.may_throw());
    }
}
