//! Lowering of `@try`, `@synchronized` and `@throw` using `setjmp`.
//!
//! A protected region pushes an exception frame (`objc_exception_try_enter`)
//! and saves a checkpoint using `_setjmp`. Throwing an exception pops the
//! frame and returns to the checkpoint a second time, after which the
//! handler runs the matching `@catch` clause.
//!
//! Every way of leaving a region runs its cleanup: popping the frame (if
//! still pushed), followed by the `@finally` body or the unlocking of the
//! `@synchronized` object. The cleanup is generated once per region. Paths
//! leaving the region store the index of their destination in a stack slot,
//! after which the cleanup jumps to the destination.
//!
//! Values of local variables may be kept in registers that `longjmp` doesn't
//! restore. To prevent this, empty inline assembly statements that read or
//! write all local variables ("hazards") are inserted around the
//! checkpoints and before every call that may throw.
use crate::llvm::builder::Builder;
use crate::llvm::constants::EXCEPTION_DATA_BUFFER_INDEX;
use crate::llvm::helpers::class_reference;
use crate::llvm::methods::LowerMethod;
use crate::llvm::module::Module;
use crate::llvm::runtime_function::RuntimeFunction;
use inkwell::attributes::AttributeLoc;
use inkwell::basic_block::BasicBlock;
use inkwell::types::{AnyType, BasicMetadataTypeEnum, BasicTypeEnum};
use inkwell::values::{BasicMetadataValueEnum, IntValue, PointerValue};
use tracing::trace;
use types::body::{Catch, Expression, Statement};

/// A protected region being lowered.
pub(crate) struct ExceptionScope<'ctx> {
    /// The block running the cleanup of the region.
    cleanup: BasicBlock<'ctx>,

    /// The slot storing the index of the exit to take after the cleanup.
    destination: PointerValue<'ctx>,

    /// The exits of the region: the final destination, and the block the
    /// cleanup continues at to reach it.
    exits: Vec<(BasicBlock<'ctx>, BasicBlock<'ctx>)>,
}

/// Compiler barriers that force local variables to live in memory.
struct Hazards<'ctx> {
    slots: Vec<(PointerValue<'ctx>, BasicTypeEnum<'ctx>)>,
}

impl<'ctx> Hazards<'ctx> {
    /// Emits a barrier that acts as if all locals are read, such that
    /// pending stores are written to memory.
    fn read(&self, module: &Module<'_, 'ctx>, builder: &Builder<'ctx>) {
        self.emit(module, builder, "*m");
    }

    /// Emits a barrier that acts as if all locals are written, such that
    /// values cached in registers are loaded again.
    fn write(&self, module: &Module<'_, 'ctx>, builder: &Builder<'ctx>) {
        self.emit(module, builder, "=*m");
    }

    fn emit(
        &self,
        module: &Module<'_, 'ctx>,
        builder: &Builder<'ctx>,
        constraint: &str,
    ) {
        if self.slots.is_empty() {
            return;
        }

        let ctx = module.context;
        let params: Vec<BasicMetadataTypeEnum> =
            self.slots.iter().map(|_| ctx.pointer_type().into()).collect();
        let args: Vec<BasicMetadataValueEnum> =
            self.slots.iter().map(|(slot, _)| (*slot).into()).collect();
        let fn_type = ctx.void_type().fn_type(&params, false);
        let constraints = vec![constraint; self.slots.len()].join(",");
        let asm = ctx.inner.create_inline_asm(
            fn_type,
            String::new(),
            constraints,
            true,
            false,
            None,
            false,
        );
        let call = builder.indirect_call(fn_type, asm, &args);

        for (index, (_, typ)) in self.slots.iter().enumerate() {
            let attr =
                ctx.type_attribute("elementtype", typ.as_any_type_enum());

            call.add_attribute(AttributeLoc::Param(index as u32), attr);
        }

        call.add_attribute(
            AttributeLoc::Function,
            ctx.enum_attribute("nounwind", 0),
        );
    }
}

/// The parts of a `@try` or `@synchronized` statement.
struct Region<'a, 'ctx> {
    body: &'a [Statement],
    catches: &'a [Catch],
    finally: Option<&'a [Statement]>,

    /// The slot holding the object locked by `@synchronized`.
    lock: Option<PointerValue<'ctx>>,
}

/// The stack slots of a single protected region.
struct Frame<'ctx> {
    data: PointerValue<'ctx>,

    /// If the frame is still pushed and must be popped by the cleanup.
    call_exit: PointerValue<'ctx>,

    /// The exception thrown by a `@catch` clause, to rethrow after the
    /// `@finally` body.
    propagating: Option<PointerValue<'ctx>>,

    /// The block following the statement.
    end: BasicBlock<'ctx>,

    /// The block rethrowing the exception, created when first needed.
    rethrow: Option<BasicBlock<'ctx>>,

    /// The number of regions enclosing this one.
    depth: usize,
}

impl<'a, 'b, 'ctx> LowerMethod<'a, 'b, 'ctx> {
    pub(super) fn lower_try(
        &mut self,
        body: &'a [Statement],
        catches: &'a [Catch],
        finally: Option<&'a [Statement]>,
    ) {
        self.protected(Region { body, catches, finally, lock: None });
    }

    pub(super) fn lower_synchronized(
        &mut self,
        lock: &'a Expression,
        body: &'a [Statement],
    ) {
        let obj = self.object(lock);
        let enter = self.module.runtime_function(RuntimeFunction::SyncEnter);
        let call = self.builder.call(enter, &[obj.into()]);
        let typ = self.module.context.pointer_type();

        self.record_call(call);

        // The object is read back from memory when unlocking, as its value
        // may not survive a non-local return in a register.
        let slot = self.builder.new_stack_slot(typ, "sync.arg");

        self.builder.store(slot, obj);
        self.hazard_slots.push((slot, typ.into()));
        self.protected(Region {
            body,
            catches: &[],
            finally: None,
            lock: Some(slot),
        });
    }

    pub(super) fn throw(&mut self, value: Option<&'a Expression>) {
        let call = match (value, self.caught.last().cloned()) {
            (Some(expr), _) => {
                let exn = self.object(expr);
                let func = self
                    .module
                    .runtime_function(RuntimeFunction::ExceptionThrow);

                self.builder.call(func, &[exn.into()])
            }
            // `@throw;` rethrows the exception caught by the enclosing
            // `@catch` clause.
            (None, Some(exn)) => {
                let func = self
                    .module
                    .runtime_function(RuntimeFunction::ExceptionThrow);

                self.builder.call(func, &[exn.into()])
            }
            (None, None) => {
                let func = self
                    .module
                    .runtime_function(RuntimeFunction::ExceptionRethrow);

                self.builder.call(func, &[])
            }
        };

        self.record_call(call);
        self.builder.unreachable();
    }

    /// Jumps to a block outside of one or more protected regions, running
    /// the cleanups of the regions left.
    ///
    /// The `depth` argument is the number of regions enclosing the target.
    pub(super) fn jump_through(
        &mut self,
        target: BasicBlock<'ctx>,
        depth: usize,
    ) {
        let level = self.scopes.len();

        self.jump_from(target, depth, level);
    }

    fn jump_from(
        &mut self,
        target: BasicBlock<'ctx>,
        depth: usize,
        level: usize,
    ) {
        if level <= depth {
            self.builder.jump(target);
            return;
        }

        let index = level - 1;
        let existing =
            self.scopes[index].exits.iter().position(|(t, _)| *t == target);
        let exit = match existing {
            Some(exit) => exit,
            None => {
                let next = if index == depth {
                    target
                } else {
                    // The cleanup continues at a block that in turn runs
                    // the cleanup of the enclosing region.
                    let current = self.builder.current_block();
                    let through = self.builder.add_block("cleanup.through");

                    self.builder.switch_to_block(through);
                    self.jump_from(target, depth, index);
                    self.builder.switch_to_block(current);
                    through
                };

                self.scopes[index].exits.push((target, next));
                self.scopes[index].exits.len() - 1
            }
        };
        let scope = &self.scopes[index];

        self.builder
            .store(scope.destination, self.builder.u32_literal(exit as u32));
        self.builder.jump(scope.cleanup);
    }

    fn protected(&mut self, region: Region<'a, 'ctx>) {
        let ctx = self.module.context;
        let layouts = self.module.layouts;
        let depth = self.scopes.len();
        let data = self
            .builder
            .new_stack_slot(layouts.exception_data, "exceptiondata.ptr");
        let hazards = Hazards { slots: self.hazard_slots.clone() };
        let call_exit =
            self.builder.new_stack_slot(ctx.bool_type(), "_call_try_exit");
        let has_catches = region.lock.is_none() && !region.catches.is_empty();
        let propagating = (has_catches && region.finally.is_some()).then(|| {
            let typ = ctx.pointer_type();

            self.builder.new_stack_slot(typ, "propagating_exception")
        });
        let mut frame = Frame {
            data,
            call_exit,
            propagating,
            end: self.builder.add_block("finally.end"),
            rethrow: None,
            depth,
        };
        let mark = self.throwing_calls.len();

        trace!(
            depth,
            catches = region.catches.len(),
            finally = region.finally.is_some(),
            synchronized = region.lock.is_some(),
            "entering protected region"
        );

        self.scopes.push(ExceptionScope {
            cleanup: self.builder.add_block("finally.cleanup"),
            destination: self
                .builder
                .new_stack_slot(ctx.i32_type(), "cleanup.dest"),
            exits: Vec::new(),
        });

        let protected = self.builder.add_block("try");
        let handler = self.builder.add_block("try.handler");
        let normal = self.checkpoint(&frame, &hazards);

        self.builder.branch(normal, protected, handler);

        // The body of the region.
        self.builder.switch_to_block(protected);
        self.builder.store(call_exit, self.builder.bool_literal(true));
        self.statements(region.body);

        if self.builder.is_open() {
            self.builder.store(call_exit, self.builder.bool_literal(true));
            self.jump_through(frame.end, depth);
        }

        // The checkpoint is reached again when an exception is thrown, in
        // which case the frame has already been popped.
        self.builder.switch_to_block(handler);
        hazards.write(self.module, &self.builder);

        if has_catches {
            self.catches(&region, &mut frame, &hazards);
        } else {
            trace!(depth, "rethrowing after cleanup");
            self.builder.store(call_exit, self.builder.bool_literal(false));

            let rethrow = self.rethrow_block(&mut frame);

            self.jump_through(rethrow, depth);
        }

        for call in &self.throwing_calls[mark..] {
            self.builder.position_before(call);
            hazards.read(self.module, &self.builder);
        }

        let Some(scope) = self.scopes.pop() else { return };

        self.cleanup(&region, &frame, scope);

        if let Some(block) = frame.rethrow {
            self.builder.switch_to_block(block);

            let exn = match frame.propagating {
                Some(slot) => self.builder.load_pointer(slot),
                None => self.extract(&frame),
            };
            let func =
                self.module.runtime_function(RuntimeFunction::ExceptionThrow);
            let call = self.builder.call(func, &[exn.into()]);

            self.record_call(call);
            self.builder.unreachable();
        }

        trace!(depth, "leaving protected region");
        self.builder.switch_to_block(frame.end);
    }

    /// Pushes an exception frame and saves a checkpoint, returning `true`
    /// when the checkpoint is reached for the first time.
    fn checkpoint(
        &mut self,
        frame: &Frame<'ctx>,
        hazards: &Hazards<'ctx>,
    ) -> IntValue<'ctx> {
        let enter =
            self.module.runtime_function(RuntimeFunction::ExceptionTryEnter);
        let setjmp = self.module.runtime_function(RuntimeFunction::SetJmp);

        self.builder.call(enter, &[frame.data.into()]);
        hazards.read(self.module, &self.builder);

        let buffer = self.builder.field_address(
            self.module.layouts.exception_data,
            frame.data,
            EXCEPTION_DATA_BUFFER_INDEX,
        );
        let result = self.builder.call_value(setjmp, &[buffer.into()]);

        self.builder.int_is_zero(result.into_int_value())
    }

    fn extract(&mut self, frame: &Frame<'ctx>) -> PointerValue<'ctx> {
        let func =
            self.module.runtime_function(RuntimeFunction::ExceptionExtract);

        self.builder.call_value(func, &[frame.data.into()]).into_pointer_value()
    }

    fn rethrow_block(&self, frame: &mut Frame<'ctx>) -> BasicBlock<'ctx> {
        *frame
            .rethrow
            .get_or_insert_with(|| self.builder.add_block("finally.rethrow"))
    }

    fn catches(
        &mut self,
        region: &Region<'a, 'ctx>,
        frame: &mut Frame<'ctx>,
        hazards: &Hazards<'ctx>,
    ) {
        let db = self.module.db;
        let depth = frame.depth;
        let caught = self.extract(frame);
        let nested = if let Some(slot) = frame.propagating {
            // A second checkpoint catches exceptions thrown by the @catch
            // clauses, such that these are rethrown after the @finally body.
            let body = self.builder.add_block("catch");
            let nested = self.builder.add_block("catch_for_catch");

            self.builder.store(slot, caught);

            let normal = self.checkpoint(frame, hazards);

            self.builder.branch(normal, body, nested);
            self.builder.switch_to_block(body);
            Some(nested)
        } else {
            None
        };

        // The frame is only pushed again if a second checkpoint is used.
        self.builder.store(
            frame.call_exit,
            self.builder.bool_literal(nested.is_some()),
        );
        self.caught.push(caught);

        let mut matched_all = false;

        for clause in region.catches {
            let Some(class) = clause.class else {
                trace!(depth, "catching all exceptions");
                self.bind(clause.variable);
                self.statements(&clause.body);

                if self.builder.is_open() {
                    self.jump_through(frame.end, depth);
                }

                matched_all = true;
                break;
            };

            trace!(depth, class = class.name(db), "catching exception");

            let class_ref =
                class_reference(self.module, &self.builder, class.name(db));
            let func =
                self.module.runtime_function(RuntimeFunction::ExceptionMatch);
            let matches = self
                .builder
                .call_value(func, &[class_ref.into(), caught.into()])
                .into_int_value();
            let body = self.builder.add_block("match");
            let next = self.builder.add_block("catch.next");

            self.builder.branch(self.builder.int_is_zero(matches), next, body);
            self.builder.switch_to_block(body);
            self.bind(clause.variable);
            self.statements(&clause.body);

            if self.builder.is_open() {
                self.jump_through(frame.end, depth);
            }

            self.builder.switch_to_block(next);
        }

        self.caught.pop();

        if !matched_all {
            let rethrow = self.rethrow_block(frame);

            self.jump_through(rethrow, depth);
        }

        let (Some(nested), Some(slot)) = (nested, frame.propagating) else {
            return;
        };

        // An exception thrown by a @catch clause popped the second frame,
        // so the cleanup mustn't pop it again.
        self.builder.switch_to_block(nested);

        let exn = self.extract(frame);

        self.builder.store(slot, exn);
        self.builder.store(frame.call_exit, self.builder.bool_literal(false));

        let rethrow = self.rethrow_block(frame);

        self.jump_through(rethrow, depth);
    }

    fn cleanup(
        &mut self,
        region: &Region<'a, 'ctx>,
        frame: &Frame<'ctx>,
        scope: ExceptionScope<'ctx>,
    ) {
        let ctx = self.module.context;
        let exit = self.builder.add_block("finally.call_exit");
        let no_exit = self.builder.add_block("finally.no_call_exit");

        self.builder.switch_to_block(scope.cleanup);

        let pushed = self
            .builder
            .load_int(ctx.bool_type(), frame.call_exit);

        self.builder.branch(pushed, exit, no_exit);
        self.builder.switch_to_block(exit);

        let func =
            self.module.runtime_function(RuntimeFunction::ExceptionTryExit);

        self.builder.call(func, &[frame.data.into()]);
        self.builder.jump(no_exit);
        self.builder.switch_to_block(no_exit);

        if let Some(slot) = region.lock {
            let obj = self.builder.load_pointer(slot);
            let func = self.module.runtime_function(RuntimeFunction::SyncExit);
            let call = self.builder.call(func, &[obj.into()]);

            self.record_call(call);
        } else if let Some(body) = region.finally {
            self.statements(body);
        }

        if !self.builder.is_open() {
            return;
        }

        match scope.exits.as_slice() {
            [] => self.builder.unreachable(),
            [(_, next)] => self.builder.jump(*next),
            exits => {
                let index =
                    self.builder.load_int(ctx.i32_type(), scope.destination);
                let cases: Vec<_> = exits
                    .iter()
                    .enumerate()
                    .skip(1)
                    .map(|(i, (_, next))| {
                        (self.builder.u32_literal(i as u32), *next)
                    })
                    .collect();

                self.builder.switch(index, &cases, exits[0].1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::hash::identifier_hash;
    use crate::llvm::methods::LowerMethod;
    use crate::test::{class, config, count, method, with_module};
    use types::body::{Body, Catch, Expression, Send, Statement};
    use types::{Database, MethodId, Type};

    fn lower(db: &Database, m: MethodId) -> String {
        let class = db.class("Foo").unwrap();
        let mut ir = String::new();

        with_module(db, &config(), |module| {
            LowerMethod::new(module, m, class, None).unwrap().run();
            ir = module.print_to_string().to_string();

            if let Err(err) = module.verify() {
                panic!("invalid module: {}\n\n{}", err.to_string(), ir);
            }
        });

        ir
    }

    fn send(receiver: Expression, method: MethodId) -> Statement {
        Statement::Expression(Expression::Send(Box::new(Send::new(
            receiver,
            method,
            Vec::new(),
        ))))
    }

    fn selector_calls(ir: &str, selector: &str) -> usize {
        let hash = identifier_hash(selector, 8) as i64;

        count(ir, &format!("i64 {}, ptr null)", hash))
    }

    #[test]
    fn test_try_catch_finally() {
        let mut db = Database::new();

        class(&mut db, "Foo");

        let type_a = class(&mut db, "TypeA");
        let work = method(&mut db, "work", Vec::new(), Type::void());
        let handle = method(&mut db, "handle", Vec::new(), Type::void());
        let clean = method(&mut db, "cleanup", Vec::new(), Type::void());
        let run = method(&mut db, "run", Vec::new(), Type::void());
        let mut body = Body::new();
        let a = body.add_local(Type::instance(type_a));

        body.push(Statement::Try {
            body: vec![send(Expression::SelfObject, work)],
            catches: vec![
                Catch {
                    class: Some(type_a),
                    variable: Some(a),
                    body: vec![
                        send(Expression::Local(a), handle),
                        Statement::Throw(None),
                    ],
                },
                Catch { class: None, variable: None, body: Vec::new() },
            ],
            finally: Some(vec![send(Expression::SelfObject, clean)]),
        });
        run.set_body(&mut db, body);

        let ir = lower(&db, run);
        let type_a_hash = identifier_hash("TypeA", 8) as i64;

        // The @finally body is generated once, and shared by all paths.
        assert_eq!(selector_calls(&ir, "cleanup"), 1);
        assert_eq!(count(&ir, "call void @objc_exception_try_enter("), 2);
        assert_eq!(count(&ir, "call i32 @_setjmp(ptr"), 2);
        assert_eq!(count(&ir, "call void @objc_exception_try_exit("), 1);
        assert!(ir.contains(&format!(
            "@mulle_objc_unfailing_get_class(i64 {})",
            type_a_hash
        )));
        assert_eq!(count(&ir, "call i32 @objc_exception_match("), 1);
        assert!(ir.contains("%propagating_exception = alloca ptr"));
        assert!(ir.contains("catch_for_catch:"));
        assert!(ir.contains("finally.rethrow:"));
        assert!(ir.contains("load ptr, ptr %propagating_exception"));
        assert!(!ir.contains("@objc_exception_rethrow"));
        assert!(ir.contains("asm sideeffect \"\", \"=*m\""));
        assert!(ir.contains("asm sideeffect \"\", \"*m\""));
        assert!(ir.contains("elementtype(ptr)"));
    }

    #[test]
    fn test_try_without_catches() {
        let mut db = Database::new();

        class(&mut db, "Foo");

        let work = method(&mut db, "work", Vec::new(), Type::void());
        let clean = method(&mut db, "cleanup", Vec::new(), Type::void());
        let run = method(&mut db, "run", Vec::new(), Type::void());
        let mut body = Body::new();

        body.push(Statement::Try {
            body: vec![send(Expression::SelfObject, work)],
            catches: Vec::new(),
            finally: Some(vec![send(Expression::SelfObject, clean)]),
        });
        run.set_body(&mut db, body);

        let ir = lower(&db, run);

        assert_eq!(selector_calls(&ir, "cleanup"), 1);
        assert_eq!(count(&ir, "call i32 @_setjmp(ptr"), 1);
        assert!(!ir.contains("propagating_exception"));
        assert!(!ir.contains("@objc_exception_match"));
        assert!(ir.contains("finally.rethrow:"));
        assert!(ir.contains("call ptr @objc_exception_extract("));

        // Without any locals there is nothing to protect.
        assert!(!ir.contains("asm sideeffect"));
    }

    #[test]
    fn test_synchronized() {
        let mut db = Database::new();

        class(&mut db, "Foo");

        let work = method(&mut db, "work", Vec::new(), Type::void());
        let run = method(&mut db, "run", Vec::new(), Type::void());
        let mut body = Body::new();

        body.push(Statement::Synchronized {
            lock: Expression::SelfObject,
            body: vec![send(Expression::SelfObject, work)],
        });
        run.set_body(&mut db, body);

        let ir = lower(&db, run);

        assert!(ir.contains("call i32 @objc_sync_enter(ptr %0)"));
        assert!(ir.contains("%sync.arg = alloca ptr"));
        assert_eq!(count(&ir, "call i32 @objc_sync_exit("), 1);
        assert!(ir.contains("finally.rethrow:"));
        assert!(!ir.contains("@objc_exception_match"));
        assert!(ir.contains("\"*m\"(ptr elementtype(ptr) %sync.arg)"));
    }

    #[test]
    fn test_return_inside_nested_regions() {
        let mut db = Database::new();

        class(&mut db, "Foo");

        let inner = method(&mut db, "inner", Vec::new(), Type::void());
        let outer = method(&mut db, "outer", Vec::new(), Type::void());
        let run = method(&mut db, "run", Vec::new(), Type::id());
        let mut body = Body::new();

        body.push(Statement::Try {
            body: vec![Statement::Try {
                body: vec![Statement::Return(Some(Expression::SelfObject))],
                catches: Vec::new(),
                finally: Some(vec![send(Expression::SelfObject, inner)]),
            }],
            catches: Vec::new(),
            finally: Some(vec![send(Expression::SelfObject, outer)]),
        });
        body.push(Statement::Return(Some(Expression::Nil)));
        run.set_body(&mut db, body);

        let ir = lower(&db, run);

        assert!(ir.contains("%retval = alloca ptr"));
        assert!(ir.contains("store ptr %0, ptr %retval"));
        assert!(ir.contains("cleanup.through:"));
        assert!(ir.contains("return:"));
        assert_eq!(selector_calls(&ir, "inner"), 1);
        assert_eq!(selector_calls(&ir, "outer"), 1);
        assert!(ir.contains("switch i32"));
    }

    #[test]
    fn test_throw() {
        let mut db = Database::new();

        class(&mut db, "Foo");

        let run = method(&mut db, "run", Vec::new(), Type::void());
        let mut body = Body::new();

        body.push(Statement::Throw(Some(Expression::SelfObject)));
        body.push(Statement::Throw(None));
        run.set_body(&mut db, body);

        let ir = lower(&db, run);

        assert!(ir.contains("call void @objc_exception_throw(ptr %0)"));
        assert!(ir.contains("unreachable"));

        // Code after a throw is never reached.
        assert!(!ir.contains("@objc_exception_rethrow"));
    }

    #[test]
    fn test_rethrow_outside_catch() {
        let mut db = Database::new();

        class(&mut db, "Foo");

        let run = method(&mut db, "run", Vec::new(), Type::void());
        let mut body = Body::new();

        body.push(Statement::Throw(None));
        run.set_body(&mut db, body);

        let ir = lower(&db, run);

        assert!(ir.contains("call void @objc_exception_rethrow()"));
    }

    #[test]
    fn test_rethrow_inside_catch() {
        let mut db = Database::new();

        class(&mut db, "Foo");

        let type_a = class(&mut db, "TypeA");
        let work = method(&mut db, "work", Vec::new(), Type::void());
        let run = method(&mut db, "run", Vec::new(), Type::void());
        let mut body = Body::new();
        let a = body.add_local(Type::instance(type_a));

        body.push(Statement::Try {
            body: vec![send(Expression::SelfObject, work)],
            catches: vec![
                Catch {
                    class: Some(type_a),
                    variable: Some(a),
                    body: vec![Statement::Throw(None)],
                },
                Catch { class: None, variable: None, body: Vec::new() },
            ],
            finally: None,
        });
        run.set_body(&mut db, body);

        let ir = lower(&db, run);
        let extracted: Vec<&str> = ir
            .lines()
            .filter(|l| l.contains("= call ptr @objc_exception_extract("))
            .filter_map(|l| l.trim().split(' ').next())
            .collect();

        // The caught exception is thrown again as-is.
        assert_eq!(extracted.len(), 1);
        assert_eq!(count(&ir, "call void @objc_exception_throw("), 1);
        assert!(ir.contains(&format!(
            "call void @objc_exception_throw(ptr {})",
            extracted[0]
        )));
        assert!(!ir.contains("@objc_exception_rethrow"));
    }
}
