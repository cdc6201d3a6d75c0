use crate::error::Error;
use crate::options::print_usage;
use compiler::config::Config;
use compiler::layout::gc::{self, Selection};
use compiler::layout::rc;
use compiler::layout::{BlockInfo, Capture};
use getopts::Options;
use types::{Class, Database, Field, Ownership, Record, RecordKind, Type};

const USAGE: &str = "Usage: mulle layout [OPTIONS] FIELD...

Print the layout of the variables captured by a block, of a __block
variable, or of the instance variables of an object.

Fields are written as TYPE@OFFSET, with the offset in bytes. The available
types are:

    id, block       Strong object pointers
    weak            A __weak object pointer
    unretained      An __unsafe_unretained object pointer
    byref           A captured __block variable
    char, short, int, long, pointer

Examples:

    mulle layout id@32 block@40            # The layout of a block
    mulle layout --kind byref id@0 int@8   # The layout of a __block struct
    mulle layout --kind ivars --gc only id@8 weak@16";

/// The kinds of layouts that can be printed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Kind {
    Block,
    Byref,
    Ivars,
}

impl Kind {
    fn from_str(input: &str) -> Option<Kind> {
        match input {
            "block" => Some(Kind::Block),
            "byref" => Some(Kind::Byref),
            "ivars" => Some(Kind::Ivars),
            _ => None,
        }
    }
}

/// A field parsed from the command line.
#[derive(Clone, Debug, PartialEq)]
struct Input {
    typ: Type,
    offset: u64,
    byref: bool,
}

fn parse_type(name: &str, word: u32) -> Option<Type> {
    let typ = match name {
        "id" => Type::id().with_ownership(Ownership::Strong),
        "block" => Type::block().with_ownership(Ownership::Strong),
        "weak" => Type::id().with_ownership(Ownership::Weak),
        "unretained" => Type::id().with_ownership(Ownership::ExplicitNone),
        "byref" => Type::id(),
        "char" => Type::int(1, true),
        "short" => Type::int(2, true),
        "int" => Type::int(4, true),
        "long" => Type::int(word, true),
        "pointer" => Type::pointer(Type::void()),
        _ => return None,
    };

    Some(typ)
}

fn parse_field(input: &str, word: u32) -> Result<Input, String> {
    let invalid = || format!("The field '{}' is invalid", input);
    let (name, offset) = input.split_once('@').ok_or_else(invalid)?;
    let typ = parse_type(name, word)
        .ok_or_else(|| format!("The type '{}' isn't supported", name))?;
    let offset = offset.parse::<u64>().map_err(|_| invalid())?;

    Ok(Input { typ, offset, byref: name == "byref" })
}

/// Returns the size of the aggregate containing the fields, rounded up to
/// the word size.
fn aggregate_size(db: &Database, fields: &[Input], word: u32) -> u64 {
    let word = word as u64;
    let end = fields
        .iter()
        .map(|f| f.offset + f.typ.size(db, word as u32))
        .max()
        .unwrap_or(0);

    end.div_ceil(word) * word
}

fn fields(inputs: &[Input]) -> Vec<Field> {
    inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            Field::new(&format!("f{}", index), input.typ.clone(), input.offset)
        })
        .collect()
}

fn block(db: &Database, config: &Config, inputs: &[Input]) -> Vec<String> {
    let word = config.word_size();
    let captures = inputs
        .iter()
        .map(|input| {
            if input.byref {
                Capture::byref(input.offset, input.typ.clone())
            } else {
                Capture::new(input.offset, input.typ.clone())
            }
        })
        .collect();
    let info = BlockInfo::new(captures);

    if config.gc.is_enabled() {
        gc::block_layout(db, &info, word, config.gc, config.arc)
            .map(|bitmap| vec![gc::describe_block_layout(&bitmap)])
            .unwrap_or_default()
    } else {
        rc::block_layout(db, &info, word, config.arc)
            .map(|layout| vec![rc::describe_layout(&layout, false)])
            .unwrap_or_default()
    }
}

fn byref(db: &mut Database, config: &Config, inputs: &[Input]) -> Vec<String> {
    let word = config.word_size();
    let size = aggregate_size(db, inputs, word);
    let record = Record::alloc(
        db,
        None,
        RecordKind::Struct,
        fields(inputs),
        size,
        word as u64,
    );

    rc::byref_layout(db, &Type::record(record), word, config.arc)
        .map(|layout| vec![rc::describe_layout(&layout, true)])
        .unwrap_or_default()
}

fn ivars(db: &mut Database, config: &Config, inputs: &[Input]) -> Vec<String> {
    let word = config.word_size();
    let name = "Object";
    let class = Class::alloc(db, name.to_string(), None);
    let size = aggregate_size(db, inputs, word);

    for field in fields(inputs) {
        class.add_ivar(db, field);
    }

    class.set_instance_size(db, size);

    let db = &*db;

    [Selection::Strong, Selection::Weak]
        .into_iter()
        .filter_map(|selection| {
            gc::ivar_layout(db, class, word, selection, config.gc, config.arc)
                .map(|bitmap| {
                    gc::describe_ivar_layout(name, selection, &bitmap)
                })
        })
        .collect()
}

pub(crate) fn run(arguments: &[String]) -> Result<i32, Error> {
    let mut options = Options::new();

    options.optflag("h", "help", "Show this help message");
    options.optopt(
        "k",
        "kind",
        "The kind of layout to print (block, byref or ivars)",
        "KIND",
    );
    options.optopt(
        "t",
        "target",
        "The target to compute the layout for",
        "TARGET",
    );
    options.optopt(
        "",
        "gc",
        "The garbage collection mode (none, mixed or only)",
        "MODE",
    );
    options.optflag("", "arc", "Enable automatic reference counting");

    let matches = options.parse(arguments)?;

    if matches.opt_present("h") {
        print_usage(&options, USAGE);
        return Ok(0);
    }

    let mut config = Config::new();

    if let Some(val) = matches.opt_str("t") {
        config.set_target(&val)?;
    }

    if let Some(val) = matches.opt_str("gc") {
        config.set_gc(&val)?;
    }

    config.arc = matches.opt_present("arc");

    let kind = match matches.opt_str("k") {
        Some(val) => Kind::from_str(&val).ok_or_else(|| {
            format!("The layout kind '{}' is invalid", val)
        })?,
        None => Kind::Block,
    };

    if matches.free.is_empty() {
        return Err(Error::from(
            "You must specify at least one field".to_string(),
        ));
    }

    let word = config.word_size();
    let inputs = matches
        .free
        .iter()
        .map(|field| parse_field(field, word))
        .collect::<Result<Vec<_>, _>>()?;

    if kind != Kind::Block && inputs.iter().any(|i| i.byref) {
        return Err(Error::from(
            "The 'byref' type can only be used for blocks".to_string(),
        ));
    }

    let mut db = Database::new();
    let layouts = match kind {
        Kind::Block => block(&db, &config, &inputs),
        Kind::Byref => byref(&mut db, &config, &inputs),
        Kind::Ivars => ivars(&mut db, &config, &inputs),
    };

    if layouts.is_empty() {
        println!("No layout is needed");
    }

    for layout in layouts {
        print!("{}", layout);
    }

    Ok(0)
}
