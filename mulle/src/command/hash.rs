use crate::error::Error;
use crate::options::print_usage;
use compiler::config::Config;
use compiler::hash::identifier_hash;
use getopts::Options;

const USAGE: &str = "Usage: mulle hash [OPTIONS] NAME...

Print the identifier hashes of class names, selectors, protocols or
categories, as computed by the compiler and the runtime.

Examples:

    mulle hash NSObject                      # Hash a class name
    mulle hash -t i386-linux-gnu initWith:  # Hash for a 32 bits target";

/// Formats a hash as a zero padded hexadecimal number for the given word
/// size in bytes.
fn format_hash(hash: u64, word: u32) -> String {
    format!("{:#0width$x}", hash, width = word as usize * 2 + 2)
}

pub(crate) fn run(arguments: &[String]) -> Result<i32, Error> {
    let mut options = Options::new();

    options.optflag("h", "help", "Show this help message");
    options.optopt(
        "t",
        "target",
        "The target to compute the hashes for",
        "TARGET",
    );

    let matches = options.parse(arguments)?;

    if matches.opt_present("h") {
        print_usage(&options, USAGE);
        return Ok(0);
    }

    let mut config = Config::new();

    if let Some(val) = matches.opt_str("t") {
        config.set_target(&val)?;
    }

    if matches.free.is_empty() {
        return Err(Error::from(
            "You must specify at least one name to hash".to_string(),
        ));
    }

    let word = config.word_size();

    for name in &matches.free {
        let hash = identifier_hash(name, word);

        println!("{}  {}", format_hash(hash, word), name);
    }

    Ok(0)
}
