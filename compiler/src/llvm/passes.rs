use crate::compiler::{Summary, Unit};
use crate::config::{CollisionPolicy, Config, GcMode};
use crate::llvm::accessors;
use crate::llvm::constants::{
    IMAGE_GC, IMAGE_GC_ONLY, IMAGE_INFO_SECTION, IMAGE_SIMULATED,
    METADATA_SECTION, MODULE_SECTION, MODULE_VERSION, SYMBOLS_SECTION,
};
use crate::llvm::declarations::{
    block_layout, byref_layout, define_category, define_class,
    define_protocol,
};
use crate::llvm::methods::LowerMethod;
use crate::llvm::module::{Module, StringKind};
use crate::target::{Architecture, Target as TargetSpec};
use inkwell::module::{FlagBehavior, Linkage};
use inkwell::passes::PassBuilderOptions;
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target,
    TargetMachine, TargetTriple,
};
use inkwell::values::PointerValue;
use inkwell::OptimizationLevel;
use tracing::{debug, warn};
use types::{CategoryId, ClassId, MethodId};

/// The version of the object ABI recorded in the image info.
const OBJC_ABI: u64 = 1;

/// A pass that lowers a translation unit into an LLVM module.
pub(crate) struct LowerModule<'u, 'a, 'b, 'ctx> {
    unit: &'u Unit,
    module: &'b mut Module<'a, 'ctx>,
}

impl<'u, 'a, 'b, 'ctx> LowerModule<'u, 'a, 'b, 'ctx> {
    pub(crate) fn new(
        unit: &'u Unit,
        module: &'b mut Module<'a, 'ctx>,
    ) -> Self {
        LowerModule { unit, module }
    }

    pub(crate) fn run(mut self) -> Result<Summary, String> {
        let db = self.module.db;

        for &class in &self.unit.classes {
            self.methods(class, None, class_methods(db, class));

            let accessors = accessors::synthesize(self.module, class);

            define_class(self.module, class, &accessors);
        }

        for &category in &self.unit.categories {
            let class = category.class(db);
            let mut methods = category.instance_methods(db);

            methods.extend(category.class_methods(db));
            self.methods(class, Some(category), methods);
            define_category(self.module, category);
        }

        for &protocol in &self.unit.protocols {
            define_protocol(self.module, protocol);
        }

        for block in &self.unit.blocks {
            block_layout(self.module, block);
        }

        for typ in &self.unit.byrefs {
            byref_layout(self.module, typ);
        }

        finalize(self.module)
    }

    fn methods(
        &mut self,
        class: ClassId,
        category: Option<CategoryId>,
        methods: Vec<MethodId>,
    ) {
        for method in methods {
            if let Some(lower) =
                LowerMethod::new(self.module, method, class, category)
            {
                lower.run();
            }
        }
    }
}

fn class_methods(db: &types::Database, class: ClassId) -> Vec<MethodId> {
    let mut methods = class.instance_methods(db);

    methods.extend(class.class_methods(db));
    methods
}

/// Adds the module level flags describing the image to the runtime.
fn image_info(module: &Module) {
    let ctx = module.context;
    let int = ctx.i32_type();
    let inner = &module.inner;

    inner.add_basic_value_flag(
        "Objective-C Version",
        FlagBehavior::Error,
        int.const_int(OBJC_ABI, false),
    );
    inner.add_basic_value_flag(
        "Objective-C Image Info Version",
        FlagBehavior::Error,
        int.const_zero(),
    );
    inner.add_metadata_flag(
        "Objective-C Image Info Section",
        FlagBehavior::Error,
        ctx.inner.metadata_string(IMAGE_INFO_SECTION),
    );

    match module.config.gc {
        GcMode::None => {
            inner.add_basic_value_flag(
                "Objective-C Garbage Collection",
                FlagBehavior::Override,
                int.const_zero(),
            );
        }
        mode => {
            inner.add_basic_value_flag(
                "Objective-C Garbage Collection",
                FlagBehavior::Error,
                int.const_int(IMAGE_GC, false),
            );

            if mode == GcMode::Only {
                let gc = int.const_int(IMAGE_GC, false);
                let node = ctx.inner.metadata_node(&[
                    ctx.inner
                        .metadata_string("Objective-C Garbage Collection")
                        .into(),
                    gc.into(),
                ]);

                inner.add_basic_value_flag(
                    "Objective-C GC Only",
                    FlagBehavior::Error,
                    int.const_int(IMAGE_GC_ONLY, false),
                );
                inner.add_metadata_flag(
                    "Objective-C GC Only",
                    FlagBehavior::Require,
                    node,
                );
            }
        }
    }

    if module.config.target.is_simulator() {
        inner.add_basic_value_flag(
            "Objective-C Is Simulated",
            FlagBehavior::Error,
            int.const_int(IMAGE_SIMULATED, false),
        );
    }
}

/// Emits the table of the classes and categories defined by the module,
/// returning NULL if it doesn't define any.
fn symbol_table<'ctx>(module: &mut Module<'_, 'ctx>) -> PointerValue<'ctx> {
    let classes = module.classes.len();
    let categories = module.categories.len();

    if classes == 0 && categories == 0 {
        return module.context.pointer_type().const_null();
    }

    let ctx = module.context;
    let short = ctx.i16_type();
    let symbols: Vec<_> = module
        .classes
        .iter()
        .chain(module.categories.iter())
        .map(|global| global.as_pointer_value())
        .collect();
    let value = ctx.inner.const_struct(
        &[
            module.word_value(0).into(),
            module.word_value(0).into(),
            short.const_int(classes as u64, false).into(),
            short.const_int(categories as u64, false).into(),
            ctx.pointer_type().const_array(&symbols).into(),
        ],
        false,
    );

    module
        .add_metadata("OBJC_SYMBOLS", value.into(), SYMBOLS_SECTION, 4)
        .as_pointer_value()
}

/// Marks all the runtime tables as used, such that neither the optimizer
/// nor the linker removes them.
fn compiler_used(module: &Module) {
    if module.used.is_empty() {
        return;
    }

    let ptr = module.context.pointer_type();
    let values: Vec<_> =
        module.used.iter().map(|global| global.as_pointer_value()).collect();
    let array = ptr.const_array(&values);
    let global = module.add_global(array.get_type(), "llvm.compiler.used");

    global.set_initializer(&array);
    global.set_linkage(Linkage::Appending);
    global.set_section(Some(METADATA_SECTION));
}

/// Writes the module descriptor and image info of a translation unit.
///
/// This must be done once, after every class and category is defined.
pub(crate) fn finalize(module: &mut Module) -> Result<Summary, String> {
    for collision in module.collisions() {
        match module.config.collisions {
            CollisionPolicy::Ignore => {}
            CollisionPolicy::Warn => {
                warn!(
                    hash = format!("{:#x}", collision.hash).as_str(),
                    existing = collision.existing.as_str(),
                    new = collision.new.as_str(),
                    "identifier hash collision"
                );
            }
            CollisionPolicy::Error => {
                return Err(format!(
                    "The names '{}' and '{}' produce the same identifier \
                    hash ({:#x})",
                    collision.existing, collision.new, collision.hash
                ));
            }
        }
    }

    let symtab = symbol_table(module);
    let name = module.string_pointer(StringKind::ClassName, "");
    let size = module.word_value(module.word() as u64 * 4);
    let value = module.layouts.module.const_named_struct(&[
        module.word_value(MODULE_VERSION).into(),
        size.into(),
        name.into(),
        symtab.into(),
    ]);

    module.add_metadata("OBJC_MODULES", value.into(), MODULE_SECTION, 4);
    image_info(module);
    compiler_used(module);

    let summary = Summary {
        classes: module.classes.len(),
        categories: module.categories.len(),
        undefined: module.undefined_symbols(),
        collisions: module.collisions().len(),
        strings: module.number_of_strings(),
        layouts: module.layouts_described.clone(),
    };

    debug!(
        classes = summary.classes,
        categories = summary.categories,
        undefined = summary.undefined.len(),
        "finalized module"
    );

    Ok(summary)
}

/// Returns a machine for generating code for the given target.
pub(crate) fn target_machine(
    target: &TargetSpec,
) -> Result<TargetMachine, String> {
    let config = InitializationConfig::default();

    match target.arch {
        Architecture::Amd64 | Architecture::I386 => {
            Target::initialize_x86(&config);
        }
        Architecture::Arm64 => Target::initialize_aarch64(&config),
        Architecture::Arm => Target::initialize_arm(&config),
    }

    let triple = TargetTriple::create(&target.llvm_triple());
    let reloc = RelocMode::PIC;
    let model = CodeModel::Default;
    let level = OptimizationLevel::None;

    Target::from_triple(&triple)
        .map_err(|e| {
            format!("The target '{}' isn't available: {}", target, e)
        })?
        .create_target_machine(&triple, "", "", level, reloc, model)
        .ok_or_else(|| {
            format!("Failed to create a target machine for '{}'", target)
        })
}

/// Writes the textual IR and object file of a module, if requested.
pub(crate) fn write_output(
    module: &Module,
    config: &Config,
) -> Result<(), String> {
    if config.llvm_ir.is_none() && config.output.is_none() {
        return if config.verify_llvm { verify(module) } else { Ok(()) };
    }

    let machine = target_machine(&config.target)?;
    let layout = machine.get_target_data().get_data_layout();

    module.set_data_layout(&layout);
    module.set_triple(&machine.get_triple());

    if let Some(path) = &config.llvm_ir {
        module.print_to_file(path).map_err(|e| {
            format!("Failed to write LLVM IR to {}: {}", path.display(), e)
        })?;
    }

    // The module is verified after writing the IR such that one can inspect
    // the IR when it's invalid.
    if config.verify_llvm {
        verify(module)?;
    }

    let Some(path) = &config.output else { return Ok(()) };

    module
        .run_passes("mem2reg", &machine, PassBuilderOptions::create())
        .map_err(|e| format!("Failed to optimize the module: {}", e))?;

    machine
        .write_to_file(&module.inner, FileType::Object, path)
        .map_err(|e| {
            format!("Failed to write object file {}: {}", path.display(), e)
        })
}

fn verify(module: &Module) -> Result<(), String> {
    module.verify().map_err(|e| {
        format!(
            "The LLVM module '{}' is invalid:\n\n{}\n",
            module.get_name().to_string_lossy(),
            e.to_string()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::identifier_hash;
    use crate::test::{class, config, count, method, with_module};
    use similar_asserts::assert_eq;
    use types::body::Body;
    use types::{Category, Database, Type};

    fn hash(name: &str) -> i64 {
        identifier_hash(name, 8) as i64
    }

    fn finalize_ir(db: &Database, cfg: &Config, unit: &Unit) -> String {
        let mut ir = String::new();

        with_module(db, cfg, |module| {
            LowerModule::new(unit, module).run().unwrap();
            ir = module.print_to_string().to_string();

            if let Err(err) = module.verify() {
                panic!("invalid module: {}\n\n{}", err.to_string(), ir);
            }
        });

        ir
    }

    #[test]
    fn test_finalize_empty_module() {
        let db = Database::new();
        let mut summary = None;

        with_module(&db, &config(), |module| {
            summary = Some(finalize(module).unwrap());

            let ir = module.print_to_string().to_string();

            assert!(ir.contains(
                "@OBJC_MODULES = private global %struct._objc_module \
                 { i64 7, i64 32, ptr @OBJC_CLASS_NAME_, ptr null }, \
                 section \"__DATA,__module_info,regular,no_dead_strip\", \
                 align 4"
            ));
            assert!(!ir.contains("OBJC_SYMBOLS"));
            assert!(ir.contains(
                "@llvm.compiler.used = appending global [2 x ptr] \
                 [ptr @OBJC_CLASS_NAME_, ptr @OBJC_MODULES], \
                 section \"llvm.metadata\""
            ));
            assert!(ir.contains("!\"Objective-C Version\", i32 1}"));
            assert!(ir.contains(
                "!{i32 4, !\"Objective-C Garbage Collection\", i32 0}"
            ));
            assert!(!ir.contains("Objective-C Is Simulated"));
        });

        let summary = summary.unwrap();

        assert_eq!(summary.classes, 0);
        assert_eq!(summary.categories, 0);
        assert!(summary.undefined.is_empty());
    }

    #[test]
    fn test_finalize_with_classes_and_categories() {
        let mut db = Database::new();
        let base = class(&mut db, "Base");
        let foo = class(&mut db, "Foo");
        let other = class(&mut db, "Other");
        let cat = Category::alloc(&mut db, "Extra".to_string(), other);
        let run = method(&mut db, "run", Vec::new(), Type::void());

        run.set_body(&mut db, Body::new());
        foo.add_method(&mut db, run);

        let unit = Unit {
            classes: vec![base, foo],
            categories: vec![cat],
            ..Default::default()
        };
        let mut summary = None;

        with_module(&db, &config(), |module| {
            summary = Some(LowerModule::new(&unit, module).run().unwrap());

            let ir = module.print_to_string().to_string();

            assert!(ir.contains(
                "@OBJC_SYMBOLS = private global \
                 { i64, i64, i16, i16, [3 x ptr] } \
                 { i64 0, i64 0, i16 2, i16 1, [3 x ptr] \
                 [ptr @OBJC_CLASS_Base, ptr @OBJC_CLASS_Foo, \
                 ptr @OBJC_CATEGORY_Other_Extra] }"
            ));
            assert!(ir.contains("ptr @OBJC_SYMBOLS }"));
            assert!(ir.contains("define internal ptr @\"\\01-[Foo run]\""));
            assert!(module.verify().is_ok());
        });

        let summary = summary.unwrap();

        assert_eq!(summary.classes, 2);
        assert_eq!(summary.categories, 1);
        assert_eq!(summary.undefined, vec!["Other".to_string()]);
        assert_eq!(summary.collisions, 0);
    }

    #[test]
    fn test_garbage_collection_flags() {
        let db = Database::new();
        let mut cfg = config();

        cfg.set_gc("only").unwrap();

        let ir = finalize_ir(&db, &cfg, &Unit::default());

        assert!(ir.contains(
            "!{i32 1, !\"Objective-C Garbage Collection\", i32 2}"
        ));
        assert!(ir.contains("!{i32 1, !\"Objective-C GC Only\", i32 4}"));
        assert!(ir.contains("!{i32 3, !\"Objective-C GC Only\", !"));
        assert!(ir.contains("!{!\"Objective-C Garbage Collection\", i32 2}"));
    }

    #[test]
    fn test_mixed_garbage_collection_flags() {
        let db = Database::new();
        let mut cfg = config();

        cfg.set_gc("mixed").unwrap();

        let ir = finalize_ir(&db, &cfg, &Unit::default());

        assert!(ir.contains(
            "!{i32 1, !\"Objective-C Garbage Collection\", i32 2}"
        ));
        assert!(!ir.contains("Objective-C GC Only"));
    }

    #[test]
    fn test_simulator_flag() {
        let db = Database::new();
        let mut cfg = config();

        cfg.set_target("amd64-ios-native").unwrap();

        let ir = finalize_ir(&db, &cfg, &Unit::default());

        assert!(
            ir.contains("!{i32 1, !\"Objective-C Is Simulated\", i32 32}")
        );
    }

    #[test]
    fn test_lower_module_with_blocks_and_protocols() {
        let mut db = Database::new();
        let proto = types::Protocol::alloc(&mut db, "Copying".to_string());
        let mut cfg = config();

        cfg.print_layouts = true;

        let unit = Unit {
            protocols: vec![proto],
            blocks: vec![crate::layout::BlockInfo::new(vec![
                crate::layout::Capture::new(32, Type::id()),
            ])],
            byrefs: vec![Type::id()],
            ..Default::default()
        };
        let mut summary = None;

        with_module(&db, &cfg, |module| {
            summary = Some(LowerModule::new(&unit, module).run().unwrap());
        });

        let summary = summary.unwrap();

        assert_eq!(summary.layouts.len(), 1);
        assert!(summary.layouts[0].contains("Inline instruction"));
    }

    #[test]
    fn test_compiler_used_contains_every_table() {
        let mut db = Database::new();
        let foo = class(&mut db, "Foo");
        let ir = finalize_ir(&db, &config(), &Unit {
            classes: vec![foo],
            ..Default::default()
        });

        assert_eq!(count(&ir, "@llvm.compiler.used = appending global"), 1);
        assert!(ir.contains("ptr @OBJC_CLASS_Foo"));
        assert!(ir.contains(&format!("i64 {}", hash("Foo"))));
    }

    #[test]
    fn test_write_output() {
        let db = Database::new();
        let dir = std::env::temp_dir().join(format!(
            "mulle-passes-{}",
            std::process::id()
        ));
        let mut cfg = config();

        std::fs::create_dir_all(&dir).unwrap();
        cfg.verify_llvm = true;
        cfg.llvm_ir = Some(dir.join("test.ll"));
        cfg.output = Some(dir.join("test.o"));

        with_module(&db, &cfg, |module| {
            finalize(module).unwrap();
            write_output(module, &cfg).unwrap();
        });

        let ir = std::fs::read_to_string(dir.join("test.ll")).unwrap();

        assert!(ir.contains("target triple = \"x86_64-linux-gnu\""));
        assert!(dir.join("test.o").is_file());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
