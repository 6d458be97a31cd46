use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap_stdin::FileOrStdin;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Source file to compile ("-" reads from stdin).
    input_file: FileOrStdin,

    /// Write the generated IR to FILE instead of standard output.
    #[arg(short, long, value_name = "FILE")]
    output_file: Option<PathBuf>,

    /// Trace grammar productions and tokens to standard error.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let source = match cli.input_file.contents() {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let ir = match tplc::compile(&source, cli.verbose) {
        Ok(ir) => ir,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match cli.output_file {
        Some(path) => {
            if let Err(err) = fs::write(&path, ir) {
                eprintln!("{err}");
                return ExitCode::FAILURE;
            }
        }
        None => print!("{ir}"),
    }
    ExitCode::SUCCESS
}
