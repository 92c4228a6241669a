use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;

use shadowmark::{
    default_output_path, embed_file, extract_file, load_image, CodecOptions, Password,
    TextEncoding, WatermarkCodec,
};

#[derive(Parser)]
#[command(
    name = "shadowmark",
    about = "Hide text in images with a password-seeded blind watermark",
    version,
    after_help = "The bit length printed by `embed` is NOT stored in the image.\n\
                  Keep it: `extract` needs it together with the password.\n\n\
                  NOTE: Save stego images losslessly (PNG). Re-saving as JPEG\n\
                  will probably destroy the watermark."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Hide text in a carrier image
    Embed {
        /// Carrier image file
        input: PathBuf,

        /// Text to hide
        #[arg(short, long)]
        text: String,

        /// Integer password
        #[arg(short, long, allow_hyphen_values = true)]
        password: Password,

        /// Output file (default: {name}_marked.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        codec: CodecArgs,
    },

    /// Recover text from a stego image
    Extract {
        /// Stego image file
        input: PathBuf,

        /// Payload length in bits, as printed by `embed`
        #[arg(short, long)]
        bits: usize,

        /// Integer password
        #[arg(short, long, allow_hyphen_values = true)]
        password: Password,

        #[command(flatten)]
        codec: CodecArgs,
    },

    /// Show how much text an image can hold
    Capacity {
        /// Image file
        input: PathBuf,
    },
}

#[derive(Args)]
struct CodecArgs {
    /// Embedding strength (QIM step, 8-128)
    #[arg(short, long, default_value = "24.0")]
    strength: f64,

    /// Store each bit once instead of repeating it over spare blocks
    #[arg(long)]
    no_redundancy: bool,

    /// Reject text that is not plain ASCII
    #[arg(long)]
    ascii: bool,
}

impl CodecArgs {
    fn options(&self) -> CodecOptions {
        CodecOptions {
            strength: self.strength,
            redundancy: !self.no_redundancy,
            encoding: if self.ascii {
                TextEncoding::Ascii
            } else {
                TextEncoding::Utf8
            },
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        LevelFilter::Error
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("Warning: failed to initialize logger: {e}");
    }

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> shadowmark::Result<()> {
    match &cli.command {
        Command::Embed {
            input,
            text,
            password,
            output,
            codec,
        } => {
            let output = output
                .clone()
                .unwrap_or_else(|| default_output_path(input));
            let bits = embed_file(input, &output, text, *password, &codec.options())?;
            if cli.quiet {
                println!("{bits}");
            } else {
                println!("[OK] {}", display_name(&output));
                println!("Bit length: {bits} (required for extraction)");
            }
        }
        Command::Extract {
            input,
            bits,
            password,
            codec,
        } => {
            let text = extract_file(input, *bits, *password, &codec.options())?;
            println!("{text}");
        }
        Command::Capacity { input } => {
            let img = load_image(input)?;
            let blocks = WatermarkCodec::default().capacity(&img)?;
            if cli.quiet {
                println!("{blocks}");
            } else {
                println!(
                    "{}: {}x{}, {blocks} bits ({} ASCII characters)",
                    display_name(input),
                    img.width(),
                    img.height(),
                    shadowmark::schedule::capacity_bytes(blocks)
                );
            }
        }
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}
