use std::env;
use std::process;

use reprise::{logger, parse_args, run, USAGE};

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    let args = match parse_args(&args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", USAGE);
            process::exit(e.exit_code());
        }
    };

    if args.help {
        println!("{}", USAGE);
        return;
    }

    logger::init(args.verbosity);

    match run(&args) {
        Ok(output) => print!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}
