//! Resolved method bodies.
//!
//! Bodies are small trees of statements and expressions, limited to the
//! constructs that need the object runtime: message sends, exception
//! handling, synchronization and the values flowing between these.
use crate::{ClassId, MethodId, Type};

/// A local variable of a method body.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LocalId(pub u32);

#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    /// The receiver of the current method.
    SelfObject,

    /// A null object pointer.
    Nil,
    Int(i64, Type),

    /// A formal parameter of the current method, by its index.
    Argument(usize),
    Local(LocalId),

    /// A reference to the class object of a class.
    Class(ClassId),

    /// An instance variable of the receiver, by its name.
    Ivar(String),
    Send(Box<Send>),
}

/// A message sent to an object.
#[derive(Clone, Debug, PartialEq)]
pub struct Send {
    pub receiver: Expression,

    /// The method that provides the static signature of the send.
    pub method: MethodId,
    pub arguments: Vec<Expression>,

    /// If the send targets `super`, in which case the receiver is ignored and
    /// `self` is used instead.
    pub to_super: bool,
}

impl Send {
    pub fn new(
        receiver: Expression,
        method: MethodId,
        arguments: Vec<Expression>,
    ) -> Send {
        Send { receiver, method, arguments, to_super: false }
    }

    pub fn to_super(method: MethodId, arguments: Vec<Expression>) -> Send {
        Send {
            receiver: Expression::SelfObject,
            method,
            arguments,
            to_super: true,
        }
    }
}

/// A `@catch` clause.
#[derive(Clone, Debug, PartialEq)]
pub struct Catch {
    /// The class of exceptions to catch, or `None` for `@catch (id e)` and
    /// `@catch (...)`.
    pub class: Option<ClassId>,

    /// The variable to bind the exception to.
    pub variable: Option<LocalId>,
    pub body: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Expression(Expression),
    Assign(LocalId, Expression),

    /// An assignment to an instance variable of the receiver.
    AssignIvar(String, Expression),

    /// An assignment to a global variable defined elsewhere.
    AssignGlobal {
        name: String,
        value: Expression,
        thread_local: bool,
    },

    /// An assignment through a pointer to memory of unknown origin.
    AssignIndirect {
        address: Expression,
        value: Expression,
    },
    Return(Option<Expression>),
    Try {
        body: Vec<Statement>,
        catches: Vec<Catch>,
        finally: Option<Vec<Statement>>,
    },
    Synchronized {
        lock: Expression,
        body: Vec<Statement>,
    },

    /// A `@throw`, or a `@throw;` if no value is given.
    Throw(Option<Expression>),
}

/// The body of a method.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Body {
    /// The types of the local variables, indexed by their IDs.
    pub locals: Vec<Type>,
    pub statements: Vec<Statement>,
}

impl Body {
    pub fn new() -> Body {
        Body::default()
    }

    pub fn add_local(&mut self, typ: Type) -> LocalId {
        let id = LocalId(self.locals.len() as u32);

        self.locals.push(typ);
        id
    }

    pub fn local_type(&self, id: LocalId) -> &Type {
        &self.locals[id.0 as usize]
    }

    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_add_local() {
        let mut body = Body::new();
        let a = body.add_local(Type::id());
        let b = body.add_local(Type::int(4, true));

        assert_eq!(a, LocalId(0));
        assert_eq!(b, LocalId(1));
        assert_eq!(body.local_type(b), &Type::int(4, true));
    }
}
