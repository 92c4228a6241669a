//! Hide a message in an image, then read it back.
//!
//! Usage:
//! ```sh
//! cargo run --example embed_text -- input.png output.png "secret text" 12345
//! ```

use std::env;
use std::process;

use shadowmark::{embed_file, extract_file, CodecOptions, Password};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 5 {
        eprintln!("Usage: {} <input> <output> <text> <password>", args[0]);
        process::exit(1);
    }

    let (input, output, text) = (&args[1], &args[2], &args[3]);
    let password: Password = match args[4].parse() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let opts = CodecOptions::default();
    let bits = match embed_file(input.as_ref(), output.as_ref(), text, password, &opts) {
        Ok(bits) => bits,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };
    println!("Embedded {bits} bits into {output}");

    match extract_file(output.as_ref(), bits, password, &opts) {
        Ok(recovered) => println!("Read back: {recovered}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
