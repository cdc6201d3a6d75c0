pub(crate) const CLASS_SECTION: &str = "__DATA,__class,regular,no_dead_strip";
pub(crate) const CATEGORY_SECTION: &str =
    "__DATA,__category,regular,no_dead_strip";
pub(crate) const CLASS_METHODS_SECTION: &str =
    "__DATA,__cls_meth,regular,no_dead_strip";
pub(crate) const INSTANCE_METHODS_SECTION: &str =
    "__DATA,__inst_meth,regular,no_dead_strip";
pub(crate) const CATEGORY_CLASS_METHODS_SECTION: &str =
    "__DATA,__cat_cls_meth,regular,no_dead_strip";
pub(crate) const CATEGORY_INSTANCE_METHODS_SECTION: &str =
    "__DATA,__cat_inst_meth,regular,no_dead_strip";
pub(crate) const IVARS_SECTION: &str =
    "__DATA,__instance_vars,regular,no_dead_strip";
pub(crate) const PROTOCOLS_SECTION: &str = "__DATA,regular,no_dead_strip";
pub(crate) const PROPERTIES_SECTION: &str =
    "__DATA,__property,regular,no_dead_strip";
pub(crate) const CLASS_EXTENSION_SECTION: &str =
    "__DATA,__class_ext,regular,no_dead_strip";
pub(crate) const SYMBOLS_SECTION: &str =
    "__DATA,__symbols,regular,no_dead_strip";
pub(crate) const MODULE_SECTION: &str =
    "__DATA,__module_info,regular,no_dead_strip";
pub(crate) const STRINGS_SECTION: &str = "__TEXT,__cstring,cstring_literals";
pub(crate) const LAYOUT_SECTION: &str =
    "__TEXT,__objc_classname,cstring_literals";
pub(crate) const IMAGE_INFO_SECTION: &str = "__DATA, __image_info,regular";
pub(crate) const METADATA_SECTION: &str = "llvm.metadata";

/// The version of the module descriptor understood by the runtime.
pub(crate) const MODULE_VERSION: u64 = 7;

pub(crate) const EXCEPTION_DATA_BUFFER_INDEX: u32 = 0;

/// The value of the "Objective-C Garbage Collection" flag when collection is
/// enabled.
pub(crate) const IMAGE_GC: u64 = 2;

/// The value of the "Objective-C GC Only" flag.
pub(crate) const IMAGE_GC_ONLY: u64 = 4;

/// The value of the "Objective-C Is Simulated" flag.
pub(crate) const IMAGE_SIMULATED: u64 = 32;
