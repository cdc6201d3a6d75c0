use crate::llvm::context::Context;
use inkwell::basic_block::BasicBlock;
use inkwell::builder;
use inkwell::types::{BasicType, BasicTypeEnum, FunctionType, IntType};
use inkwell::values::{
    BasicMetadataValueEnum, BasicValue, BasicValueEnum, CallSiteValue,
    FunctionValue, InstructionValue, IntValue, PointerValue,
};
use inkwell::IntPredicate;

/// A wrapper around an LLVM Builder that provides some additional methods.
pub(crate) struct Builder<'ctx> {
    inner: builder::Builder<'ctx>,
    pub(crate) function: FunctionValue<'ctx>,
    pub(crate) context: &'ctx Context,
}

impl<'ctx> Builder<'ctx> {
    pub(crate) fn new(
        context: &'ctx Context,
        function: FunctionValue<'ctx>,
    ) -> Self {
        Self { inner: context.create_builder(), context, function }
    }

    pub(crate) fn argument(&self, index: u32) -> BasicValueEnum<'ctx> {
        self.function.get_nth_param(index).unwrap()
    }

    pub(crate) fn field_address<T: BasicType<'ctx>>(
        &self,
        receiver_type: T,
        receiver: PointerValue<'ctx>,
        index: u32,
    ) -> PointerValue<'ctx> {
        let typ = receiver_type.as_basic_type_enum().into_struct_type();

        self.inner.build_struct_gep(typ, receiver, index, "").unwrap()
    }

    /// Returns a pointer to the byte at the given offset from a pointer.
    pub(crate) fn byte_address(
        &self,
        pointer: PointerValue<'ctx>,
        offset: u64,
    ) -> PointerValue<'ctx> {
        if offset == 0 {
            return pointer;
        }

        let index = self.context.i64_type().const_int(offset, false);

        unsafe {
            self.inner
                .build_gep(self.context.i8_type(), pointer, &[index], "")
                .unwrap()
        }
    }

    pub(crate) fn store<V: BasicValue<'ctx>>(
        &self,
        variable: PointerValue<'ctx>,
        value: V,
    ) {
        self.inner.build_store(variable, value).unwrap();
    }

    pub(crate) fn load<T: BasicType<'ctx>>(
        &self,
        typ: T,
        variable: PointerValue<'ctx>,
    ) -> BasicValueEnum<'ctx> {
        self.inner.build_load(typ, variable, "").unwrap()
    }

    pub(crate) fn load_pointer(
        &self,
        variable: PointerValue<'ctx>,
    ) -> PointerValue<'ctx> {
        self.load(self.context.pointer_type(), variable).into_pointer_value()
    }

    pub(crate) fn load_int(
        &self,
        typ: IntType<'ctx>,
        variable: PointerValue<'ctx>,
    ) -> IntValue<'ctx> {
        self.load(typ, variable).into_int_value()
    }

    pub(crate) fn call(
        &self,
        function: FunctionValue<'ctx>,
        arguments: &[BasicMetadataValueEnum<'ctx>],
    ) -> CallSiteValue<'ctx> {
        self.inner.build_call(function, arguments, "").unwrap()
    }

    /// Calls a function that returns a value, and returns that value.
    pub(crate) fn call_value(
        &self,
        function: FunctionValue<'ctx>,
        arguments: &[BasicMetadataValueEnum<'ctx>],
    ) -> BasicValueEnum<'ctx> {
        self.call(function, arguments).try_as_basic_value().left().unwrap()
    }

    pub(crate) fn call_void(
        &self,
        function: FunctionValue<'ctx>,
        arguments: &[BasicMetadataValueEnum<'ctx>],
    ) {
        self.call(function, arguments);
    }

    pub(crate) fn indirect_call(
        &self,
        typ: FunctionType<'ctx>,
        func: PointerValue<'ctx>,
        args: &[BasicMetadataValueEnum<'ctx>],
    ) -> CallSiteValue<'ctx> {
        self.inner.build_indirect_call(typ, func, args, "").unwrap()
    }

    pub(crate) fn pointer_to_int(
        &self,
        value: PointerValue<'ctx>,
        typ: IntType<'ctx>,
    ) -> IntValue<'ctx> {
        self.inner.build_ptr_to_int(value, typ, "").unwrap()
    }

    pub(crate) fn int_to_pointer(
        &self,
        value: IntValue<'ctx>,
    ) -> PointerValue<'ctx> {
        self.inner
            .build_int_to_ptr(value, self.context.pointer_type(), "")
            .unwrap()
    }

    /// Truncates or extends an integer to the given type.
    pub(crate) fn int_to_int(
        &self,
        value: IntValue<'ctx>,
        typ: IntType<'ctx>,
        signed: bool,
    ) -> IntValue<'ctx> {
        if value.get_type() == typ {
            return value;
        }

        self.inner.build_int_cast_sign_flag(value, typ, signed, "").unwrap()
    }

    pub(crate) fn bit_cast<T: BasicType<'ctx>>(
        &self,
        value: BasicValueEnum<'ctx>,
        typ: T,
    ) -> BasicValueEnum<'ctx> {
        self.inner.build_bit_cast(value, typ, "").unwrap()
    }

    pub(crate) fn bool_literal(&self, value: bool) -> IntValue<'ctx> {
        self.context.bool_type().const_int(value as u64, false)
    }

    pub(crate) fn u8_literal(&self, value: u8) -> IntValue<'ctx> {
        self.context.i8_type().const_int(value as u64, false)
    }

    pub(crate) fn u32_literal(&self, value: u32) -> IntValue<'ctx> {
        self.context.i32_type().const_int(value as u64, false)
    }

    pub(crate) fn int_is_zero(&self, value: IntValue<'ctx>) -> IntValue<'ctx> {
        let zero = value.get_type().const_zero();

        self.inner
            .build_int_compare(IntPredicate::EQ, value, zero, "")
            .unwrap()
    }

    pub(crate) fn pointer_is_null(
        &self,
        value: PointerValue<'ctx>,
    ) -> IntValue<'ctx> {
        self.inner.build_is_null(value, "").unwrap()
    }

    pub(crate) fn phi(
        &self,
        typ: BasicTypeEnum<'ctx>,
        incoming: &[(BasicValueEnum<'ctx>, BasicBlock<'ctx>)],
    ) -> BasicValueEnum<'ctx> {
        let phi = self.inner.build_phi(typ, "").unwrap();

        for (value, block) in incoming {
            phi.add_incoming(&[(value as &dyn BasicValue, *block)]);
        }

        phi.as_basic_value()
    }

    pub(crate) fn first_block(&self) -> BasicBlock<'ctx> {
        self.function.get_first_basic_block().unwrap()
    }

    pub(crate) fn add_block(&self, name: &str) -> BasicBlock<'ctx> {
        self.context.append_basic_block(self.function, name)
    }

    pub(crate) fn switch_to_block(&self, block: BasicBlock<'ctx>) {
        self.inner.position_at_end(block);
    }

    pub(crate) fn current_block(&self) -> BasicBlock<'ctx> {
        self.inner.get_insert_block().unwrap()
    }

    /// Returns `true` if the current block doesn't have a terminator yet.
    pub(crate) fn is_open(&self) -> bool {
        self.inner
            .get_insert_block()
            .map_or(false, |b| b.get_terminator().is_none())
    }

    pub(crate) fn position_before(&self, instruction: &InstructionValue<'ctx>) {
        self.inner.position_before(instruction);
    }

    pub(crate) fn new_temporary<T: BasicType<'ctx>>(
        &self,
        typ: T,
        name: &str,
    ) -> PointerValue<'ctx> {
        self.inner.build_alloca(typ, name).unwrap()
    }

    pub(crate) fn jump(&self, block: BasicBlock<'ctx>) {
        self.inner.build_unconditional_branch(block).unwrap();
    }

    pub(crate) fn return_value(&self, val: Option<&dyn BasicValue<'ctx>>) {
        self.inner.build_return(val).unwrap();
    }

    pub(crate) fn branch(
        &self,
        condition: IntValue<'ctx>,
        true_block: BasicBlock<'ctx>,
        false_block: BasicBlock<'ctx>,
    ) {
        self.inner
            .build_conditional_branch(condition, true_block, false_block)
            .unwrap();
    }

    pub(crate) fn switch(
        &self,
        value: IntValue<'ctx>,
        cases: &[(IntValue<'ctx>, BasicBlock<'ctx>)],
        fallback: BasicBlock<'ctx>,
    ) {
        self.inner.build_switch(value, fallback, cases).unwrap();
    }

    pub(crate) fn unreachable(&self) {
        self.inner.build_unreachable().unwrap();
    }

    /// Allocates a stack slot at the start of the function, such that it's
    /// allocated once regardless of where it's used.
    pub(crate) fn new_stack_slot<T: BasicType<'ctx>>(
        &self,
        value_type: T,
        name: &str,
    ) -> PointerValue<'ctx> {
        let builder = Builder::new(self.context, self.function);
        let block = self.first_block();

        if let Some(ins) = block.get_first_instruction() {
            builder.inner.position_before(&ins);
        } else {
            builder.switch_to_block(block);
        }

        builder.new_temporary(value_type, name)
    }

    pub(crate) fn new_aligned_stack_slot<T: BasicType<'ctx>>(
        &self,
        value_type: T,
        align: u32,
        name: &str,
    ) -> PointerValue<'ctx> {
        let slot = self.new_stack_slot(value_type, name);

        if let Some(ins) = slot.as_instruction() {
            ins.set_alignment(align).unwrap();
        }

        slot
    }
}
