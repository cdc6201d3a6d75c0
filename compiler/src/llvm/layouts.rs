use crate::llvm::context::Context;
use crate::target::Target;
use inkwell::types::{BasicType, IntType, StructType};

/// The number of reserved pointers at the end of the exception data.
const EXCEPTION_DATA_RESERVED: u32 = 4;

/// The layouts of the data structures shared with the object runtime.
///
/// These layouts are part of the ABI, and thus must never change for a given
/// pointer width.
pub(crate) struct Layouts<'ctx> {
    /// The size of a word (pointer) in bytes.
    pub(crate) word_size: u32,

    /// The type of a C `long`, used for identifier hashes and sizes.
    pub(crate) word: IntType<'ctx>,

    /// The receiver and class pair of a message sent to `super`.
    pub(crate) super_ref: StructType<'ctx>,

    /// The name and attribute string of a property.
    pub(crate) property: StructType<'ctx>,

    pub(crate) property_list: StructType<'ctx>,

    /// A method table entry: the selector hash, its name and type encoding,
    /// flag bits and the implementation.
    pub(crate) method: StructType<'ctx>,

    pub(crate) method_list: StructType<'ctx>,

    pub(crate) method_description: StructType<'ctx>,

    pub(crate) method_description_list: StructType<'ctx>,

    pub(crate) protocol: StructType<'ctx>,

    pub(crate) protocol_list: StructType<'ctx>,

    pub(crate) protocol_extension: StructType<'ctx>,

    pub(crate) ivar: StructType<'ctx>,

    pub(crate) ivar_list: StructType<'ctx>,

    /// The size, weak ivar layout and properties of a class.
    pub(crate) class_extension: StructType<'ctx>,

    /// The descriptor of a class as loaded by the runtime.
    pub(crate) class: StructType<'ctx>,

    /// The descriptor of a category as loaded by the runtime.
    pub(crate) category: StructType<'ctx>,

    pub(crate) symtab: StructType<'ctx>,

    pub(crate) module: StructType<'ctx>,

    /// The jump buffer and reserved slots used by `@try` and
    /// `@synchronized`.
    pub(crate) exception_data: StructType<'ctx>,
}

impl<'ctx> Layouts<'ctx> {
    pub(crate) fn new(context: &'ctx Context, target: &Target) -> Self {
        let word_size = target.pointer_width();
        let word = context.word_type(word_size);
        let ptr = context.pointer_type().as_basic_type_enum();
        let int = context.i32_type().as_basic_type_enum();
        let long = word.as_basic_type_enum();
        let short = context.i16_type().as_basic_type_enum();

        let super_ref = context.named_struct(
            "struct._objc_super",
            &[
                ptr, // Receiver
                ptr, // Class
            ],
        );

        let property =
            context.named_struct("struct._prop_t", &[ptr, ptr]);

        let property_list = context.named_struct(
            "struct._prop_list_t",
            &[
                int, // Size of an entry
                int, // Number of properties
                property.array_type(0).into(),
            ],
        );

        let method = context.named_struct(
            "struct._mulle_objc_method",
            &[
                long, // Selector hash
                ptr,  // Name
                ptr,  // Signature
                int,  // Bits
                ptr,  // Implementation
            ],
        );

        let method_list = context.named_struct(
            "struct._mulle_objc_method_list",
            &[
                ptr, // Unused, always NULL
                int, // Number of methods
                method.array_type(0).into(),
            ],
        );

        let method_description = context.named_struct(
            "struct._objc_method_description",
            &[
                long, // Selector hash
                ptr,  // Type encoding
            ],
        );

        let method_description_list = context.named_struct(
            "struct._objc_method_description_list",
            &[int, method_description.array_type(0).into()],
        );

        let protocol_extension = context.named_struct(
            "struct._objc_protocol_extension",
            &[
                int, // Size
                ptr, // Optional instance methods
                ptr, // Optional class methods
                ptr, // Properties
                ptr, // Extended method types
            ],
        );

        // Protocols and protocol lists refer to each other, so both are
        // declared before either gets a body.
        let protocol = context.opaque_struct("struct._objc_protocol");
        let protocol_list = context.opaque_struct("struct._objc_protocol_list");

        protocol.set_body(
            &[
                ptr, // Extension
                ptr, // Name
                ptr, // Protocol list
                ptr, // Instance methods
                ptr, // Class methods
            ],
            false,
        );

        protocol_list.set_body(
            &[
                ptr,  // Next
                long, // Number of protocols
                protocol.array_type(0).into(),
            ],
            false,
        );

        let ivar = context.named_struct(
            "struct._objc_ivar",
            &[
                ptr, // Name
                ptr, // Type encoding
                int, // Offset
            ],
        );

        let ivar_list = context.named_struct(
            "struct._objc_ivar_list",
            &[int, ivar.array_type(0).into()],
        );

        let class_extension = context.named_struct(
            "struct._objc_class_extension",
            &[
                int, // Size
                ptr, // Weak ivar layout
                ptr, // Properties
            ],
        );

        let class = context.named_struct(
            "struct._mulle_objc_load_class",
            &[
                long, // Class hash
                ptr,  // Class name
                long, // Superclass hash
                ptr,  // Superclass name
                long, // Instance size
                ptr,  // Class methods
                ptr,  // Instance methods
                ptr,  // Protocol hashes
            ],
        );

        let category = context.named_struct(
            "struct._mulle_objc_load_category",
            &[
                long, // Category hash
                ptr,  // Category name
                long, // Class hash
                ptr,  // Class name
                ptr,  // Class methods
                ptr,  // Instance methods
                ptr,  // Protocol hashes
            ],
        );

        let symtab = context.named_struct(
            "struct._objc_symtab",
            &[
                long,  // Number of selector references
                long,  // Selector references
                short, // Number of classes
                short, // Number of categories
                context.pointer_type().array_type(0).into(),
            ],
        );

        let module = context.named_struct(
            "struct._objc_module",
            &[
                long, // Version
                long, // Size
                ptr,  // Name
                ptr,  // Symbol table
            ],
        );

        let exception_data = context.named_struct(
            "struct._objc_exception_data",
            &[
                context.i32_type().array_type(target.jmp_buf_size()).into(),
                context
                    .pointer_type()
                    .array_type(EXCEPTION_DATA_RESERVED)
                    .into(),
            ],
        );

        Layouts {
            word_size,
            word,
            super_ref,
            property,
            property_list,
            method,
            method_list,
            method_description,
            method_description_list,
            protocol,
            protocol_list,
            protocol_extension,
            ivar,
            ivar_list,
            class_extension,
            class,
            category,
            symtab,
            module,
            exception_data,
        }
    }

    /// Returns the size in bytes of a property table entry.
    pub(crate) fn property_size(&self) -> u64 {
        self.word_size as u64 * 2
    }

    /// Returns the size in bytes of the module descriptor.
    pub(crate) fn module_size(&self) -> u64 {
        self.word_size as u64 * 4
    }

    /// Returns the size in bytes of the class extension.
    pub(crate) fn class_extension_size(&self) -> u64 {
        self.word_size as u64 * 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts_field_order() {
        let ctx = Context::new();
        let target = Target::parse("amd64-linux-gnu").unwrap();
        let layouts = Layouts::new(&ctx, &target);

        assert_eq!(layouts.class.count_fields(), 8);
        assert_eq!(layouts.category.count_fields(), 7);
        assert_eq!(layouts.method.count_fields(), 5);
        assert_eq!(
            layouts.class.get_field_type_at_index(0),
            Some(ctx.i64_type().as_basic_type_enum())
        );
        assert_eq!(
            layouts.method.get_field_type_at_index(3),
            Some(ctx.i32_type().as_basic_type_enum())
        );
        assert!(!layouts.protocol.is_opaque());
        assert!(!layouts.protocol_list.is_opaque());
    }

    #[test]
    fn test_layouts_word_size() {
        let ctx = Context::new();
        let target = Target::parse("i386-linux-gnu").unwrap();
        let layouts = Layouts::new(&ctx, &target);

        assert_eq!(layouts.word.get_bit_width(), 32);
        assert_eq!(
            layouts.class.get_field_type_at_index(2),
            Some(ctx.i32_type().as_basic_type_enum())
        );
        assert_eq!(layouts.property_size(), 8);
        assert_eq!(layouts.module_size(), 16);
    }

    #[test]
    fn test_layouts_exception_data() {
        let ctx = Context::new();
        let target = Target::parse("amd64-linux-gnu").unwrap();
        let layouts = Layouts::new(&ctx, &target);
        let buf = layouts
            .exception_data
            .get_field_type_at_index(0)
            .unwrap()
            .into_array_type();

        assert_eq!(buf.len(), 50);
    }
}
