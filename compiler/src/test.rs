//! Various test helper functions and types.
use crate::config::Config;
use crate::llvm::builder::Builder;
use crate::llvm::context::Context;
use crate::llvm::layouts::Layouts;
use crate::llvm::module::Module;
use types::{
    Class, ClassId, Database, Method, MethodId, MethodKind, Parameter, Type,
};

/// The target used by tests that produce LLVM IR.
pub(crate) const TARGET: &str = "amd64-linux-gnu";

pub(crate) fn config() -> Config {
    let mut config = Config::new();

    config.set_target(TARGET).unwrap();
    config
}

/// Runs a closure with a module for the given database and configuration.
pub(crate) fn with_module<F>(db: &Database, config: &Config, func: F)
where
    F: FnOnce(&mut Module),
{
    let ctx = Context::new();
    let layouts = Layouts::new(&ctx, &config.target);
    let mut module = Module::new(&ctx, &layouts, db, config, "test");

    func(&mut module);
}

/// Runs a closure with a module for an empty database.
pub(crate) fn setup<F>(func: F)
where
    F: FnOnce(&mut Module),
{
    let db = Database::new();

    with_module(&db, &config(), func);
}

/// Runs a closure with a builder positioned at the start of a method
/// function named `test`.
pub(crate) fn with_function<'a, 'ctx, F>(
    module: &mut Module<'a, 'ctx>,
    func: F,
)
where
    F: FnOnce(&mut Module<'a, 'ctx>, &Builder<'ctx>),
{
    let typ = module.method_type();
    let function = module.add_function("test", typ, None);
    let builder = Builder::new(module.context, function);
    let entry = builder.add_block("entry");

    builder.switch_to_block(entry);
    func(module, &builder);
}

pub(crate) fn class(db: &mut Database, name: &str) -> ClassId {
    let superclass = db.class("Base");

    Class::alloc(db, name.to_string(), superclass)
}

pub(crate) fn method(
    db: &mut Database,
    selector: &str,
    parameters: Vec<Parameter>,
    returns: Type,
) -> MethodId {
    Method::alloc(
        db,
        selector.to_string(),
        MethodKind::Instance,
        parameters,
        returns,
    )
}

/// Returns the number of times `pattern` occurs in `input`.
pub(crate) fn count(input: &str, pattern: &str) -> usize {
    input.matches(pattern).count()
}
