//! Lowering of declarations and method bodies into LLVM IR.

pub(crate) mod accessors;
pub(crate) mod builder;
pub(crate) mod constants;
pub(crate) mod context;
pub(crate) mod declarations;
pub(crate) mod dispatch;
pub(crate) mod exceptions;
pub(crate) mod helpers;
pub(crate) mod layouts;
pub(crate) mod methods;
pub(crate) mod module;
pub(crate) mod passes;
pub(crate) mod runtime_function;
