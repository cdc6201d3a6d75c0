use crate::error::Error;
use crate::options::print_usage;
use compiler::target::Target;
use getopts::{Options, ParsingStyle};
use std::io::{stdout, IsTerminal as _};

const USAGE: &str = "mulle targets [OPTIONS]

List the supported target triples, along with their word size.

Examples:

    mulle targets";

pub(crate) fn run(arguments: &[String]) -> Result<i32, Error> {
    let mut options = Options::new();

    options.parsing_style(ParsingStyle::StopAtFirstFree);
    options.optflag("h", "help", "Show this help message");

    let matches = options.parse(arguments)?;
    let is_term = stdout().is_terminal();

    if matches.opt_present("h") {
        print_usage(&options, USAGE);
        return Ok(0);
    }

    for target in Target::supported() {
        let bits = target.pointer_width() * 8;
        let mut line = format!("{} ({} bits", target, bits);

        if target.is_simulator() {
            line.push_str(", simulator");
        }

        line.push(')');

        if target.is_native() {
            line.push_str(" (native)");

            if is_term {
                println!("\x1b[1m{}\x1b[0m", line);
                continue;
            }
        }

        println!("{}", line);
    }

    Ok(0)
}
