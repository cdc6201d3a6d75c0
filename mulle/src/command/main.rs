use crate::command::hash;
use crate::command::layout;
use crate::command::targets;
use crate::error::Error;
use crate::options::print_usage;
use getopts::{Options, ParsingStyle};
use std::env;

const USAGE: &str = "Usage: mulle [OPTIONS] [COMMAND]

Commands:

    hash     Print the identifier hashes of names
    layout   Print the layout of an object, block or __block variable
    targets  List the supported targets

Examples:

    mulle hash init alloc      # Print the hashes of two selectors
    mulle layout id@32 int@40  # Print the layout of a block
    mulle layout --help        # Print the help message for a command";

pub(crate) fn run() -> Result<i32, Error> {
    let args: Vec<String> = env::args().collect();
    let mut options = Options::new();

    options.parsing_style(ParsingStyle::StopAtFirstFree);
    options.optflag("h", "help", "Show this help message");
    options.optflag("v", "version", "Print the version number");

    let matches = options.parse(&args[1..])?;

    if matches.opt_present("h") {
        print_usage(&options, USAGE);
        return Ok(0);
    }

    if matches.opt_present("v") {
        println!("mulle {}", env!("CARGO_PKG_VERSION"));
        return Ok(0);
    }

    match matches.free.first().map(|s| s.as_str()) {
        Some("hash") => hash::run(&matches.free[1..]),
        Some("layout") => layout::run(&matches.free[1..]),
        Some("targets") => targets::run(&matches.free[1..]),
        Some(cmd) => {
            Err(Error::generic(format!("The command '{}' is invalid", cmd)))
        }
        None => {
            print_usage(&options, USAGE);
            Ok(0)
        }
    }
}
