//! Generating code for the declarations of a translation unit.
use crate::config::Config;
use crate::layout::BlockInfo;
use crate::llvm::context::Context;
use crate::llvm::layouts::Layouts;
use crate::llvm::module::Module;
use crate::llvm::passes::{write_output, LowerModule};
use std::io::{stdout, Write as _};
use std::time::Instant;
use tracing::debug;
use types::{CategoryId, ClassId, Database, ProtocolId, Type};

/// The declarations of a translation unit to generate code for.
#[derive(Default)]
pub struct Unit {
    /// The classes implemented, in declaration order.
    pub classes: Vec<ClassId>,

    /// The categories implemented, in declaration order.
    pub categories: Vec<CategoryId>,

    pub protocols: Vec<ProtocolId>,

    /// The block literals whose capture layouts are needed.
    pub blocks: Vec<BlockInfo>,

    /// The types of `__block` variables whose layouts are needed.
    pub byrefs: Vec<Type>,
}

/// The result of compiling a translation unit.
#[derive(Debug)]
pub struct Summary {
    /// The number of classes defined.
    pub classes: usize,

    /// The number of categories defined.
    pub categories: usize,

    /// The names of the classes referred to but not defined by the unit.
    pub undefined: Vec<String>,

    /// The number of identifier hash collisions found.
    pub collisions: usize,

    /// The number of distinct strings in the string pool.
    pub strings: usize,

    /// The descriptions of the layouts computed, if these were requested.
    pub layouts: Vec<String>,
}

/// A type for generating the runtime metadata and method bodies of
/// translation units.
pub struct Compiler<'a> {
    db: &'a Database,
    config: Config,
}

impl<'a> Compiler<'a> {
    pub fn new(db: &'a Database, config: Config) -> Compiler<'a> {
        Compiler { db, config }
    }

    /// Compiles a translation unit, writing the output files requested by
    /// the configuration.
    pub fn compile(&self, name: &str, unit: &Unit) -> Result<Summary, String> {
        let start = Instant::now();
        let context = Context::new();
        let layouts = Layouts::new(&context, &self.config.target);
        let mut module =
            Module::new(&context, &layouts, self.db, &self.config, name);
        let summary = LowerModule::new(unit, &mut module).run()?;

        write_output(&module, &self.config)?;

        if self.config.print_layouts {
            let mut out = stdout().lock();

            for layout in &summary.layouts {
                out.write_all(layout.as_bytes()).map_err(|e| e.to_string())?;
            }
        }

        debug!(
            module = name,
            duration = format!("{:?}", start.elapsed()).as_str(),
            "compiled translation unit"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{class, config, method};
    use types::body::Body;
    use types::Category;

    #[test]
    fn test_compile() {
        let mut db = Database::new();
        let base = class(&mut db, "Base");
        let foo = class(&mut db, "Foo");
        let cat = Category::alloc(&mut db, "Extra".to_string(), base);
        let bar = method(&mut db, "bar", Vec::new(), Type::void());

        bar.set_body(&mut db, Body::new());
        foo.add_method(&mut db, bar);

        let mut cfg = config();

        cfg.verify_llvm = true;

        let unit = Unit {
            classes: vec![foo],
            categories: vec![cat],
            ..Default::default()
        };
        let summary = Compiler::new(&db, cfg).compile("foo", &unit).unwrap();

        assert_eq!(summary.classes, 1);
        assert_eq!(summary.categories, 1);
        assert_eq!(summary.undefined, vec!["Base".to_string()]);
        assert_eq!(summary.collisions, 0);
        assert!(summary.strings > 0);
        assert!(summary.layouts.is_empty());
    }

    #[test]
    fn test_compile_with_layouts() {
        let mut db = Database::new();
        let foo = class(&mut db, "Foo");

        foo.add_ivar(&mut db, types::Field::new("obj", Type::id(), 8));
        foo.set_instance_size(&mut db, 16);

        let mut cfg = config();

        cfg.set_gc("only").unwrap();
        cfg.print_layouts = true;

        let unit = Unit { classes: vec![foo], ..Default::default() };
        let summary = Compiler::new(&db, cfg).compile("foo", &unit).unwrap();

        assert_eq!(summary.layouts.len(), 1);
        assert!(summary.layouts[0].starts_with("\nstrong ivar layout"));
    }
}
