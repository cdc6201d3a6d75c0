//! Objective-C type encodings.
//!
//! Type encodings are the strings stored in method, ivar and property
//! tables describing the C type of a value, such as `i` for `int` and `@` for
//! `id`. Types that can't be encoded produce a `None`, which emitters treat as
//! a signal to leave the declaration out.
use crate::{Database, Field, MethodId, PropertyId, RecordKind, Type, TypeKind};
use std::fmt::Write as _;

/// The size of a C `int`, used for promoting smaller integer arguments.
const INT_SIZE: u64 = 4;

#[derive(Copy, Clone)]
struct Options {
    /// Emit `@"Name"` instead of `@` for class instance pointers.
    class_names: bool,

    /// Expand the fields of records, instead of only writing the tag.
    expand_records: bool,
}

/// Returns the type encoding of a type, as used for method signatures.
pub fn type_encoding(db: &Database, typ: &Type, word: u32) -> Option<String> {
    let mut out = String::new();
    let opts = Options { class_names: false, expand_records: true };

    encode(db, typ, word, opts, &mut out)?;
    Some(out)
}

/// Returns the type encoding of an instance variable.
pub fn ivar_encoding(db: &Database, ivar: &Field, word: u32) -> Option<String> {
    if let Some(bits) = ivar.bit_width {
        return Some(format!("b{}", bits));
    }

    let mut out = String::new();
    let opts = Options { class_names: true, expand_records: true };

    encode(db, &ivar.typ, word, opts, &mut out)?;
    Some(out)
}

/// Returns the type encoding of a method, including the size of the argument
/// frame and the offset of each argument.
///
/// For a method `- (void)bar` on a 64 bits target this produces `v16@0:8`.
pub fn method_encoding(
    db: &Database,
    method: MethodId,
    word: u32,
) -> Option<String> {
    let word_size = word as u64;
    let mut params = String::new();
    let mut offset = word_size * 2;

    for param in method.parameters(db) {
        let enc = type_encoding(db, &param.typ, word)?;
        let mut size = param.typ.size(db, word);

        if param.typ.is_integer() && size < INT_SIZE {
            size = INT_SIZE;
        }

        let _ = write!(params, "{}{}", enc, offset);

        offset += size;
    }

    let ret = type_encoding(db, method.return_type(db), word)?;

    Some(format!("{}{}@0:{}{}", ret, offset, word_size, params))
}

/// Returns the attribute string of a property, such as `T@"NSString",C,N`.
pub fn property_encoding(
    db: &Database,
    property: PropertyId,
    word: u32,
) -> Option<String> {
    let typ = property.value_type(db);
    let attrs = property.attributes(db);
    let mut out = String::from("T");
    let opts = Options { class_names: true, expand_records: true };

    encode(db, typ, word, opts, &mut out)?;

    if attrs.readonly {
        out.push_str(",R");
    }

    if attrs.copy {
        out.push_str(",C");
    } else if attrs.retain {
        out.push_str(",&");
    } else if attrs.weak || typ.ownership == crate::Ownership::Weak {
        out.push_str(",W");
    }

    if attrs.nonatomic {
        out.push_str(",N");
    }

    if let Some(getter) = &attrs.getter {
        let _ = write!(out, ",G{}", getter);
    }

    if let Some(setter) = &attrs.setter {
        let _ = write!(out, ",S{}", setter);
    }

    if property.is_synthesized(db) {
        if let Some(ivar) = property.ivar(db) {
            let _ = write!(out, ",V{}", ivar);
        }
    }

    Some(out)
}

fn encode(
    db: &Database,
    typ: &Type,
    word: u32,
    opts: Options,
    out: &mut String,
) -> Option<()> {
    match &typ.kind {
        TypeKind::Void => out.push('v'),
        TypeKind::Bool => out.push('B'),
        TypeKind::Int { bytes, signed } => {
            let chr = match (bytes, signed) {
                (1, true) => 'c',
                (1, false) => 'C',
                (2, true) => 's',
                (2, false) => 'S',
                (4, true) => 'i',
                (4, false) => 'I',
                (8, true) => 'q',
                (8, false) => 'Q',
                (16, true) => 't',
                (16, false) => 'T',
                _ => return None,
            };

            out.push(chr);
        }
        TypeKind::Float(4) => out.push('f'),
        TypeKind::Float(8) => out.push('d'),
        TypeKind::Float(16) => out.push('D'),
        TypeKind::Float(_) => return None,
        TypeKind::Id => out.push('@'),
        TypeKind::Instance(class) if opts.class_names => {
            let _ = write!(out, "@\"{}\"", class.name(db));
        }
        TypeKind::Instance(_) => out.push('@'),
        TypeKind::Class => out.push('#'),
        TypeKind::Selector => out.push(':'),
        TypeKind::Block => out.push_str("@?"),
        TypeKind::CString => out.push('*'),
        TypeKind::Pointer(to) => {
            out.push('^');

            // Records behind pointers only encode their tag, which also
            // prevents infinite recursion for self-referential records.
            let opts = Options { expand_records: false, ..opts };

            encode(db, to, word, opts, out)?;
        }
        TypeKind::Array(of, len) => {
            let _ = write!(out, "[{}", len);

            encode(db, of, word, opts, out)?;
            out.push(']');
        }
        TypeKind::Record(id) => {
            let (open, close) = match id.kind(db) {
                RecordKind::Struct => ('{', '}'),
                RecordKind::Union => ('(', ')'),
            };

            out.push(open);
            out.push_str(id.name(db).unwrap_or("?"));

            if opts.expand_records {
                out.push('=');

                for field in id.fields(db) {
                    if let Some(bits) = field.bit_width {
                        let _ = write!(out, "b{}", bits);
                    } else {
                        encode(db, &field.typ, word, opts, out)?;
                    }
                }
            }

            out.push(close);
        }
        TypeKind::Unencodable => return None,
    }

    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Class, Method, MethodKind, Parameter, Property, PropertyAttributes,
        Record,
    };
    use similar_asserts::assert_eq;

    fn method(
        db: &mut Database,
        name: &str,
        params: Vec<Parameter>,
        ret: Type,
    ) -> MethodId {
        Method::alloc(db, name.to_string(), MethodKind::Instance, params, ret)
    }

    #[test]
    fn test_type_encoding_scalars() {
        let db = Database::new();

        assert_eq!(type_encoding(&db, &Type::void(), 8), Some("v".into()));
        assert_eq!(
            type_encoding(&db, &Type::int(4, true), 8),
            Some("i".into())
        );
        assert_eq!(
            type_encoding(&db, &Type::int(8, false), 8),
            Some("Q".into())
        );
        assert_eq!(type_encoding(&db, &Type::float(8), 8), Some("d".into()));
        assert_eq!(type_encoding(&db, &Type::block(), 8), Some("@?".into()));
        assert_eq!(
            type_encoding(&db, &Type::pointer(Type::void()), 8),
            Some("^v".into())
        );
        assert_eq!(
            type_encoding(&db, &Type::new(TypeKind::Unencodable), 8),
            None
        );
    }

    #[test]
    fn test_type_encoding_records() {
        let mut db = Database::new();
        let rec = Record::alloc_c_layout(
            &mut db,
            Some("Point".to_string()),
            RecordKind::Struct,
            vec![
                (Some("x".to_string()), Type::float(8)),
                (Some("y".to_string()), Type::float(8)),
            ],
            8,
        );

        assert_eq!(
            type_encoding(&db, &Type::record(rec), 8),
            Some("{Point=dd}".into())
        );
        assert_eq!(
            type_encoding(&db, &Type::pointer(Type::record(rec)), 8),
            Some("^{Point}".into())
        );
        assert_eq!(
            type_encoding(&db, &Type::array(Type::record(rec), 2), 8),
            Some("[2{Point=dd}]".into())
        );
    }

    #[test]
    fn test_ivar_encoding() {
        let mut db = Database::new();
        let foo = Class::alloc(&mut db, "Foo".to_string(), None);
        let obj = Field::new("obj", Type::instance(foo), 8);
        let bits = Field::bitfield("flags", Type::int(4, false), 16, 3);

        assert_eq!(ivar_encoding(&db, &obj, 8), Some("@\"Foo\"".into()));
        assert_eq!(ivar_encoding(&db, &bits, 8), Some("b3".into()));
    }

    #[test]
    fn test_method_encoding() {
        let mut db = Database::new();
        let bar = method(&mut db, "bar", Vec::new(), Type::void());
        let set = method(
            &mut db,
            "setX:y:",
            vec![
                Parameter::new("x", Type::int(2, true)),
                Parameter::new("y", Type::id()),
            ],
            Type::id(),
        );

        assert_eq!(method_encoding(&db, bar, 8), Some("v16@0:8".into()));
        assert_eq!(method_encoding(&db, bar, 4), Some("v8@0:4".into()));
        assert_eq!(
            method_encoding(&db, set, 8),
            Some("@28@0:8s16@20".into())
        );
    }

    #[test]
    fn test_method_encoding_unencodable() {
        let mut db = Database::new();
        let vec = method(
            &mut db,
            "take:",
            vec![Parameter::new("v", Type::new(TypeKind::Unencodable))],
            Type::void(),
        );

        assert_eq!(method_encoding(&db, vec, 8), None);
    }

    #[test]
    fn test_property_encoding() {
        let mut db = Database::new();
        let string = Class::alloc(&mut db, "NSString".to_string(), None);
        let name = Property::alloc(
            &mut db,
            "name".to_string(),
            Type::instance(string),
            PropertyAttributes {
                copy: true,
                nonatomic: true,
                ..PropertyAttributes::default()
            },
        );
        let count = Property::alloc(
            &mut db,
            "count".to_string(),
            Type::int(4, true),
            PropertyAttributes {
                readonly: true,
                getter: Some("numberOfItems".to_string()),
                ..PropertyAttributes::default()
            },
        );

        name.synthesize(&mut db, "_name".to_string(), None, None);

        assert_eq!(
            property_encoding(&db, name, 8),
            Some("T@\"NSString\",C,N,V_name".into())
        );
        assert_eq!(
            property_encoding(&db, count, 8),
            Some("Ti,R,GnumberOfItems".into())
        );
    }
}
