use std::io::Read;
use std::process;

use clap::Parser;

use mgc_common::file_provider::FsFileProvider;
use mgc_common::Code;
use mgc_lang::CompileConfig;

/// Compiler for the mg game scripting language.
///
/// Reads source from stdin and writes the lowered module to stdout;
/// diagnostics go to stderr.
#[derive(Parser)]
#[command(name = "mgc")]
struct Opt {
    /// Print the parsed syntax tree and stop
    #[arg(short = 'a', conflicts_with_all = ["lower", "check"])]
    ast: bool,
    /// Print the lowered module, skipping the final validation
    #[arg(short = 'l', conflicts_with = "check")]
    lower: bool,
    /// Validate the lowered module before printing (the default)
    #[arg(short = 'c')]
    check: bool,
}

fn main() {
    process::exit(run());
}

fn run() -> i32 {
    let opt = Opt::parse();

    let mut source = String::new();
    if let Err(error) = std::io::stdin().read_to_string(&mut source) {
        eprintln!("Could not read stdin: {error}");
        return 1;
    }

    let root = std::env::current_dir().unwrap_or_default();
    let mut config = CompileConfig::new(Box::new(FsFileProvider::new(root)));
    let input = config.add_source(Code {
        path: None,
        source: source.into(),
    });

    let program = match config.compute_ast(input) {
        Ok(program) => program,
        Err(error) => {
            eprintln!("{}", error.format(&config.compile_context));
            return 1;
        }
    };
    if opt.ast {
        print!("{}", program.display());
        return 0;
    }

    let analysis = match config.compute_analysis(&program) {
        Ok(analysis) => analysis,
        Err(error) => {
            eprintln!("{}", error.format(&config.compile_context));
            return 1;
        }
    };
    let module = config.compute_ir(&analysis);

    if !opt.lower {
        if let Err(error) = mgc_ir::validate(&module) {
            eprintln!("{error}");
            return 1;
        }
    }
    print!("{module}");
    0
}
