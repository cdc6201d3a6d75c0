//! Lowering of method bodies into LLVM functions.
use crate::layout::gc::gc_attribute;
use crate::llvm::builder::Builder;
use crate::llvm::dispatch::{
    send, MessageSend, ParameterBlock, ReturnConvention,
};
use crate::llvm::exceptions::ExceptionScope;
use crate::llvm::helpers::{
    assign, class_reference, ivar_address, memmove_collectable, read_weak,
    record_has_objects, Barrier,
};
use crate::llvm::module::Module;
use inkwell::basic_block::BasicBlock;
use inkwell::types::{BasicType, BasicTypeEnum};
use inkwell::values::{
    BasicValue, BasicValueEnum, CallSiteValue, FunctionValue,
    InstructionValue, PointerValue,
};
use tracing::{trace, warn};
use types::body::{Body, Expression, Send, Statement};
use types::{CategoryId, ClassId, GcAttribute, MethodId, TypeKind};

/// Loads a fixed argument of a method from its parameter block.
pub(crate) fn load_argument<'ctx>(
    module: &Module<'_, 'ctx>,
    builder: &Builder<'ctx>,
    method: MethodId,
    layout: &ParameterBlock,
    index: usize,
) -> Option<BasicValueEnum<'ctx>> {
    let db = module.db;
    let param = method.parameters(db).get(index)?;
    let typ = module.context.value_type(db, &param.typ, module.word())?;
    let params = builder.argument(2).into_pointer_value();
    let address = builder.byte_address(params, layout.offsets[index]);

    Some(builder.load(typ, address))
}

/// Converts the result of a method into the pointer returned by its
/// function.
pub(crate) fn encode_result<'ctx>(
    module: &Module<'_, 'ctx>,
    builder: &Builder<'ctx>,
    method: MethodId,
    value: Option<BasicValueEnum<'ctx>>,
) -> PointerValue<'ctx> {
    let db = module.db;
    let typ = method.return_type(db);
    let word = module.layouts.word;
    let null = module.context.pointer_type().const_null();
    let Some(value) = value else { return null };

    match (ReturnConvention::of(db, typ, module.word()), value) {
        (ReturnConvention::Void, _) => null,
        (ReturnConvention::InParameters, val) => {
            let params = builder.argument(2).into_pointer_value();

            builder.store(params, val);
            params
        }
        (_, BasicValueEnum::PointerValue(val)) => val,
        (_, BasicValueEnum::IntValue(val)) => {
            let signed =
                matches!(typ.kind, TypeKind::Int { signed: true, .. });

            builder.int_to_pointer(builder.int_to_int(val, word, signed))
        }
        _ => null,
    }
}

/// Returns from a method function.
pub(crate) fn return_value<'ctx>(
    module: &Module<'_, 'ctx>,
    builder: &Builder<'ctx>,
    method: MethodId,
    value: Option<BasicValueEnum<'ctx>>,
) {
    let result = encode_result(module, builder, method, value);

    builder.return_value(Some(&result));
}

/// A pass that lowers the body of a single method into an LLVM function.
pub(crate) struct LowerMethod<'a, 'b, 'ctx> {
    pub(super) module: &'b mut Module<'a, 'ctx>,
    pub(super) builder: Builder<'ctx>,
    method: MethodId,

    /// The class the method is defined on or added to.
    class: ClassId,
    body: &'a Body,
    layout: ParameterBlock,

    /// The stack slots of the local variables, and the types of the values
    /// stored in them.
    locals: Vec<(PointerValue<'ctx>, BasicTypeEnum<'ctx>)>,

    /// The stack slots whose values must survive a non-local return.
    pub(super) hazard_slots: Vec<(PointerValue<'ctx>, BasicTypeEnum<'ctx>)>,

    /// The `@try` and `@synchronized` statements currently being lowered,
    /// innermost last.
    pub(super) scopes: Vec<ExceptionScope<'ctx>>,

    /// Calls generated so far that may throw an exception.
    pub(super) throwing_calls: Vec<InstructionValue<'ctx>>,

    /// The exceptions caught by the `@catch` clauses being lowered.
    pub(super) caught: Vec<PointerValue<'ctx>>,

    return_slot: Option<PointerValue<'ctx>>,
    return_block: Option<BasicBlock<'ctx>>,
}

impl<'a, 'b, 'ctx> LowerMethod<'a, 'b, 'ctx> {
    /// Prepares the lowering of a method, returning `None` if the method
    /// doesn't have a body.
    pub(crate) fn new(
        module: &'b mut Module<'a, 'ctx>,
        method: MethodId,
        class: ClassId,
        category: Option<CategoryId>,
    ) -> Option<Self> {
        let db = module.db;
        let body = method.body(db)?;
        let function = module.add_method(
            method,
            class.name(db),
            category.map(|c| c.name(db)),
        );
        let builder = Builder::new(module.context, function);
        let layout = ParameterBlock::new(db, method, module.word());

        Some(LowerMethod {
            module,
            builder,
            method,
            class,
            body,
            layout,
            locals: Vec::new(),
            hazard_slots: Vec::new(),
            scopes: Vec::new(),
            throwing_calls: Vec::new(),
            caught: Vec::new(),
            return_slot: None,
            return_block: None,
        })
    }

    pub(crate) fn run(mut self) -> FunctionValue<'ctx> {
        let entry = self.builder.add_block("entry");

        trace!(
            selector = self.method.selector(self.module.db),
            class = self.class.name(self.module.db),
            "lowering method"
        );

        let body = self.body;

        self.builder.switch_to_block(entry);
        self.define_locals();
        self.statements(&body.statements);

        if self.builder.is_open() {
            return_value(self.module, &self.builder, self.method, None);
        }

        if let (Some(block), Some(slot)) = (self.return_block, self.return_slot)
        {
            self.builder.switch_to_block(block);

            let result = self.builder.load_pointer(slot);

            self.builder.return_value(Some(&result));
        }

        self.builder.function
    }

    fn define_locals(&mut self) {
        let db = self.module.db;
        let word = self.module.word();
        let body = self.body;

        for typ in &body.locals {
            let typ = self
                .module
                .context
                .value_type(db, typ, word)
                .unwrap_or_else(|| {
                    self.module.context.pointer_type().as_basic_type_enum()
                });
            let slot = self.builder.new_stack_slot(typ, "local");

            self.locals.push((slot, typ));
        }

        self.hazard_slots = self.locals.clone();
    }

    /// Records a call that may throw, such that hazards can be inserted
    /// before it.
    pub(super) fn record_call(&mut self, call: CallSiteValue<'ctx>) {
        let result = call.try_as_basic_value();
        let ins = match result.left() {
            Some(val) => val.as_instruction_value(),
            None => result.right(),
        };

        if let Some(ins) = ins {
            self.throwing_calls.push(ins);
        }
    }

    pub(super) fn statements(&mut self, statements: &'a [Statement]) {
        for statement in statements {
            // Code following a return or throw is unreachable.
            if !self.builder.is_open() {
                break;
            }

            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: &'a Statement) {
        match statement {
            Statement::Expression(expr) => {
                self.expression(expr);
            }
            Statement::Assign(id, expr) => {
                if let Some(val) = self.expression(expr) {
                    let (slot, _) = self.locals[id.0 as usize];

                    self.builder.store(slot, val);
                }
            }
            Statement::AssignIvar(name, expr) => self.assign_ivar(name, expr),
            Statement::AssignGlobal { name, value, thread_local } => {
                self.assign_global(name, value, *thread_local)
            }
            Statement::AssignIndirect { address, value } => {
                self.assign_indirect(address, value)
            }
            Statement::Return(expr) => self.return_statement(expr.as_ref()),
            Statement::Try { body, catches, finally } => {
                self.lower_try(body, catches, finally.as_deref())
            }
            Statement::Synchronized { lock, body } => {
                self.lower_synchronized(lock, body)
            }
            Statement::Throw(expr) => self.throw(expr.as_ref()),
        }
    }

    pub(super) fn expression(
        &mut self,
        expression: &'a Expression,
    ) -> Option<BasicValueEnum<'ctx>> {
        let db = self.module.db;

        match expression {
            Expression::SelfObject => Some(self.builder.argument(0)),
            Expression::Nil => Some(self.module.null_pointer()),
            Expression::Int(val, typ) => {
                let typ = match self.module.context.value_type(
                    db,
                    typ,
                    self.module.word(),
                ) {
                    Some(BasicTypeEnum::IntType(typ)) => typ,
                    _ => self.module.layouts.word,
                };

                Some(typ.const_int(*val as u64, true).into())
            }
            Expression::Argument(index) => load_argument(
                self.module,
                &self.builder,
                self.method,
                &self.layout,
                *index,
            ),
            Expression::Local(id) => {
                let (slot, typ) = self.locals[id.0 as usize];

                Some(self.builder.load(typ, slot))
            }
            Expression::Class(id) => {
                let name = id.name(db);

                Some(class_reference(self.module, &self.builder, name).into())
            }
            Expression::Ivar(name) => self.ivar(name),
            Expression::Send(send) => self.send(send),
        }
    }

    /// Evaluates an expression that produces an object pointer.
    pub(super) fn object(
        &mut self,
        expression: &'a Expression,
    ) -> PointerValue<'ctx> {
        match self.expression(expression) {
            Some(BasicValueEnum::PointerValue(val)) => val,
            _ => self.module.context.pointer_type().const_null(),
        }
    }

    fn send(&mut self, send_expr: &'a Send) -> Option<BasicValueEnum<'ctx>> {
        let lookup_class = if send_expr.to_super {
            Some(self.superclass_name()?)
        } else {
            None
        };
        let receiver = if send_expr.to_super {
            self.builder.argument(0).into_pointer_value()
        } else {
            self.object(&send_expr.receiver)
        };

        // Arguments without a value are passed as NULL, such that the
        // remaining arguments keep their positions.
        let arguments = send_expr
            .arguments
            .iter()
            .map(|arg| {
                self.expression(arg)
                    .unwrap_or_else(|| self.module.null_pointer())
            })
            .collect();
        let result = send(
            self.module,
            &self.builder,
            MessageSend {
                receiver,
                method: send_expr.method,
                arguments,
                lookup_class,
            },
        );

        self.record_call(result.call);
        result.value
    }

    /// Returns the name of the superclass to start the lookup of a send to
    /// `super` at, or `None` for a root class.
    fn superclass_name(&self) -> Option<String> {
        let db = self.module.db;
        let superclass = self.class.superclass(db);

        if superclass.is_none() {
            warn!(
                class = self.class.name(db),
                selector = self.method.selector(db),
                "ignoring a message to super in a root class"
            );
        }

        superclass.map(|id| id.name(db).to_string())
    }

    fn ivar(&mut self, name: &str) -> Option<BasicValueEnum<'ctx>> {
        let db = self.module.db;
        let ivar = self.class.ivar(db, name)?;
        let typ =
            self.module.context.value_type(db, &ivar.typ, self.module.word())?;
        let recv = self.builder.argument(0).into_pointer_value();
        let addr = ivar_address(&self.builder, recv, ivar.offset);

        if self.module.config.gc.is_enabled()
            && gc_attribute(&ivar.typ) == GcAttribute::Weak
        {
            return Some(read_weak(self.module, &self.builder, addr).into());
        }

        Some(self.builder.load(typ, addr))
    }

    fn assign_ivar(&mut self, name: &str, value: &'a Expression) {
        let Some(val) = self.expression(value) else { return };
        let db = self.module.db;
        let Some(ivar) = self.class.ivar(db, name) else { return };
        let recv = self.builder.argument(0).into_pointer_value();
        let addr = ivar_address(&self.builder, recv, ivar.offset);

        if self.module.config.gc.is_enabled() {
            let barrier = match gc_attribute(&ivar.typ) {
                GcAttribute::Weak => Some(Barrier::Weak),
                GcAttribute::Strong => Some(Barrier::Ivar(recv, ivar.offset)),
                GcAttribute::None => None,
            };

            if let Some(barrier) = barrier {
                assign(self.module, &self.builder, barrier, val, addr);
                return;
            }

            if let TypeKind::Record(id) = ivar.typ.kind {
                if record_has_objects(db, id) {
                    let tmp = self.builder.new_stack_slot(val.get_type(), "");

                    self.builder.store(tmp, val);
                    memmove_collectable(
                        self.module,
                        &self.builder,
                        addr,
                        tmp,
                        id.size(db),
                    );
                    return;
                }
            }
        }

        self.builder.store(addr, val);
    }

    fn assign_global(
        &mut self,
        name: &str,
        value: &'a Expression,
        thread_local: bool,
    ) {
        let Some(val) = self.expression(value) else { return };
        let global = self.module.get_global(name).unwrap_or_else(|| {
            let global = self.module.add_global(val.get_type(), name);

            global.set_thread_local(thread_local);
            global
        });
        let addr = global.as_pointer_value();

        if self.module.config.gc.is_enabled() && val.is_pointer_value() {
            let barrier = if thread_local {
                Barrier::ThreadLocal
            } else {
                Barrier::Global
            };

            assign(self.module, &self.builder, barrier, val, addr);
        } else {
            self.builder.store(addr, val);
        }
    }

    fn assign_indirect(
        &mut self,
        address: &'a Expression,
        value: &'a Expression,
    ) {
        let addr = self.object(address);
        let Some(val) = self.expression(value) else { return };

        if self.module.config.gc.is_enabled() && val.is_pointer_value() {
            assign(self.module, &self.builder, Barrier::StrongCast, val, addr);
        } else {
            self.builder.store(addr, val);
        }
    }

    fn return_statement(&mut self, value: Option<&'a Expression>) {
        let value = value.and_then(|expr| self.expression(expr));

        if self.scopes.is_empty() {
            return_value(self.module, &self.builder, self.method, value);
            return;
        }

        // Returning from inside a protected region first runs the cleanups
        // of all enclosing regions.
        let result =
            encode_result(self.module, &self.builder, self.method, value);
        let slot = match self.return_slot {
            Some(slot) => slot,
            None => {
                let typ = self.module.context.pointer_type();
                let slot = self.builder.new_stack_slot(typ, "retval");

                self.return_slot = Some(slot);
                slot
            }
        };
        let block = match self.return_block {
            Some(block) => block,
            None => {
                let block = self.builder.add_block("return");

                self.return_block = Some(block);
                block
            }
        };

        self.builder.store(slot, result);
        self.jump_through(block, 0);
    }

    pub(super) fn bind(&mut self, variable: Option<types::body::LocalId>) {
        let (Some(id), Some(&caught)) = (variable, self.caught.last()) else {
            return;
        };
        let (slot, _) = self.locals[id.0 as usize];

        self.builder.store(slot, caught);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::hash::identifier_hash;
    use crate::test::{class, config, count, method, with_module};
    use types::body::LocalId;
    use types::{Database, Field, Ownership, Parameter, Type};

    fn lower(db: &Database, cfg: &Config, m: MethodId) -> String {
        let class = db.class("Foo").unwrap();
        let mut ir = String::new();

        with_module(db, cfg, |module| {
            LowerMethod::new(module, m, class, None).unwrap().run();

            assert!(module.verify().is_ok());
            ir = module.print_to_string().to_string();
        });

        ir
    }

    #[test]
    fn test_method_without_body() {
        let mut db = Database::new();
        let foo = class(&mut db, "Foo");
        let m = method(&mut db, "run", Vec::new(), Type::void());

        with_module(&db, &config(), |module| {
            assert!(LowerMethod::new(module, m, foo, None).is_none());
        });
    }

    #[test]
    fn test_method_function() {
        let mut db = Database::new();

        class(&mut db, "Foo");

        let m = method(&mut db, "run", Vec::new(), Type::void());

        m.set_body(&mut db, Body::new());

        let ir = lower(&db, &config(), m);

        assert!(ir.contains(
            "define internal ptr @\"\\01-[Foo run]\"(ptr %0, i64 %1, ptr %2)"
        ));
        assert!(ir.contains("ret ptr null"));
    }

    #[test]
    fn test_return_integer() {
        let mut db = Database::new();

        class(&mut db, "Foo");

        let m = method(&mut db, "value", Vec::new(), Type::int(4, true));
        let mut body = Body::new();

        body.push(Statement::Return(Some(Expression::Int(
            -2,
            Type::int(4, true),
        ))));
        m.set_body(&mut db, body);

        let ir = lower(&db, &config(), m);

        assert!(ir.contains("ret ptr inttoptr (i64 -2 to ptr)"));
    }

    #[test]
    fn test_return_in_parameters() {
        let mut db = Database::new();

        class(&mut db, "Foo");

        let m = method(
            &mut db,
            "scale:",
            vec![Parameter::new("by", Type::float(8))],
            Type::float(8),
        );
        let mut body = Body::new();

        body.push(Statement::Return(Some(Expression::Argument(0))));
        m.set_body(&mut db, body);

        let ir = lower(&db, &config(), m);

        assert!(ir.contains("load double, ptr %2"));
        assert!(ir.contains("store double"));
        assert!(ir.contains("ret ptr %2"));
    }

    #[test]
    fn test_locals_and_dead_code() {
        let mut db = Database::new();

        class(&mut db, "Foo");

        let m = method(&mut db, "run", Vec::new(), Type::id());
        let mut body = Body::new();
        let local = body.add_local(Type::id());

        body.push(Statement::Assign(local, Expression::SelfObject));
        body.push(Statement::Return(Some(Expression::Local(local))));
        body.push(Statement::Return(Some(Expression::Nil)));
        m.set_body(&mut db, body);

        let ir = lower(&db, &config(), m);

        assert!(ir.contains("%local = alloca ptr"));
        assert!(ir.contains("store ptr %0, ptr %local"));
        assert_eq!(count(&ir, "ret ptr"), 1);
    }

    #[test]
    fn test_send_to_super() {
        let mut db = Database::new();

        class(&mut db, "Base");
        class(&mut db, "Foo");

        let init = method(&mut db, "init", Vec::new(), Type::id());
        let mut body = Body::new();

        body.push(Statement::Return(Some(Expression::Send(Box::new(
            Send::to_super(init, Vec::new()),
        )))));
        init.set_body(&mut db, body);

        let ir = lower(&db, &config(), init);
        let base = identifier_hash("Base", 8) as i64;

        assert!(ir.contains("@mulle_objc_object_call_class_id(ptr %0"));
        assert!(ir.contains(&format!("ptr null, i64 {})", base)));
    }

    #[test]
    fn test_send_to_super_in_root_class() {
        let mut db = Database::new();

        class(&mut db, "Foo");

        let init = method(&mut db, "init", Vec::new(), Type::id());
        let mut body = Body::new();

        body.push(Statement::Return(Some(Expression::Send(Box::new(
            Send::to_super(init, Vec::new()),
        )))));
        init.set_body(&mut db, body);

        let ir = lower(&db, &config(), init);

        assert!(!ir.contains("@mulle_objc_object_call_class_id"));
        assert!(ir.contains("ret ptr null"));
    }

    #[test]
    fn test_send_keeps_argument_positions() {
        let mut db = Database::new();

        class(&mut db, "Foo");

        let pair = method(
            &mut db,
            "first:second:",
            vec![
                Parameter::new("first", Type::id()),
                Parameter::new("second", Type::id()),
            ],
            Type::void(),
        );
        let run = method(&mut db, "run", Vec::new(), Type::void());
        let mut body = Body::new();

        body.push(Statement::Expression(Expression::Send(Box::new(
            Send::new(
                Expression::SelfObject,
                pair,
                vec![
                    Expression::Ivar("missing".to_string()),
                    Expression::SelfObject,
                ],
            ),
        ))));
        run.set_body(&mut db, body);

        let ir = lower(&db, &config(), run);

        assert!(ir.contains("store ptr null, ptr %params"));
        assert!(!ir.contains("store ptr %0, ptr %params"));
        assert!(ir.contains("getelementptr i8, ptr %params, i64 8"));
    }

    #[test]
    fn test_gc_barriers() {
        let mut db = Database::new();
        let foo = class(&mut db, "Foo");
        let weak = Type::id().with_ownership(Ownership::Weak);

        foo.add_ivar(&mut db, Field::new("obj", Type::id(), 8));
        foo.add_ivar(&mut db, Field::new("link", weak, 16));
        foo.add_ivar(&mut db, Field::new("count", Type::int(4, true), 24));

        let m = method(&mut db, "run", Vec::new(), Type::id());
        let mut body = Body::new();
        let local = body.add_local(Type::id());

        body.push(Statement::AssignIvar("obj".to_string(), Expression::Nil));
        body.push(Statement::AssignIvar(
            "count".to_string(),
            Expression::Int(1, Type::int(4, true)),
        ));
        body.push(Statement::Assign(
            local,
            Expression::Ivar("link".to_string()),
        ));
        body.push(Statement::AssignGlobal {
            name: "shared".to_string(),
            value: Expression::SelfObject,
            thread_local: false,
        });
        body.push(Statement::AssignGlobal {
            name: "current".to_string(),
            value: Expression::SelfObject,
            thread_local: true,
        });
        body.push(Statement::AssignIndirect {
            address: Expression::Local(local),
            value: Expression::SelfObject,
        });
        body.push(Statement::Return(Some(Expression::Local(LocalId(0)))));
        m.set_body(&mut db, body);

        let mut cfg = config();

        cfg.set_gc("only").unwrap();

        let ir = lower(&db, &cfg, m);

        assert!(ir.contains("@objc_assign_ivar(ptr null, ptr %0, i64 8)"));
        assert!(ir.contains("store i32 1"));
        assert!(ir.contains("call ptr @objc_read_weak("));
        assert!(ir.contains("@objc_assign_global(ptr %0, ptr @shared)"));
        assert!(
            ir.contains("@objc_assign_threadlocal(ptr %0, ptr @current)")
        );
        assert!(ir.contains("@objc_assign_strongCast(ptr %0, ptr"));
        assert!(ir.contains("@current = external thread_local global ptr"));
    }

    #[test]
    fn test_stores_without_gc() {
        let mut db = Database::new();
        let foo = class(&mut db, "Foo");

        foo.add_ivar(&mut db, Field::new("obj", Type::id(), 8));

        let m = method(&mut db, "run", Vec::new(), Type::void());
        let mut body = Body::new();

        body.push(Statement::AssignIvar("obj".to_string(), Expression::Nil));
        m.set_body(&mut db, body);

        let ir = lower(&db, &config(), m);

        assert!(!ir.contains("@objc_assign_ivar"));
        assert!(ir.contains("store ptr null"));
    }
}
