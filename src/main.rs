//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI.

use anyhow::{anyhow, bail, Context};
use clap::{crate_version, Arg, Command};
use minicc::{
    error::Diagnostics,
    link::{LinkOptions, Linker},
    source::Source,
    target::{self, Syntax},
};

use std::{
    fs::File,
    io::{self, Write},
    process,
    str::FromStr,
};

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = Command::new("minicc")
        .version(crate_version!())
        .about("Compiles arithmetic expression programs to x86-64 assembly")
        .arg(
            Arg::new("source")
                .value_name("SOURCE")
                .required(true)
                .help("Program text, e.g. 'a=3;b=4;a+b;'"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .default_value("-")
                .help("Output file ('-' for stdout)"),
        )
        .arg(
            Arg::new("syntax")
                .long("syntax")
                .takes_value(true)
                .value_name("DIALECT")
                .default_value("intel")
                .possible_values(["intel", "att"])
                .help("Assembler dialect"),
        )
        .arg(
            Arg::new("executable")
                .short('x')
                .long("executable")
                .help("Assemble and link an executable instead of emitting assembly"),
        )
        .arg(Arg::new("strip").short('s').help("Strip executables"))
        .arg(
            Arg::new("eval")
                .long("eval")
                .conflicts_with("executable")
                .help("Print the program's result instead of compiling it"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .multiple_occurrences(true)
                .help("Log compiler stages to stderr (repeat for more detail)"),
        )
        .get_matches();

    init_logging(args.occurrences_of("verbose"));

    // Se extraen argumentos necesarios
    let text = args.value_of("source").unwrap();
    let syntax = args.value_of("syntax").unwrap();
    let syntax = Syntax::from_str(syntax).expect("main.rs allowed a bad syntax");
    let output = args.value_of("output").unwrap();

    // Errores de compilación se reportan como diagnósticos y no como
    // fallos del driver
    let source = Source::new("<arg>", text);
    let ast = match minicc::frontend(&source) {
        Ok(ast) => ast,
        Err(diagnostics) => fail(diagnostics),
    };

    if args.is_present("eval") {
        match ast.evaluate() {
            Ok(value) => println!("{}", value),
            Err(error) => fail(Diagnostics::from(error).kind("Evaluation error")),
        }

        return Ok(());
    }

    // Nada se escribe a la salida hasta que la rutina esté completa
    let mut asm = Vec::new();
    target::emit(&ast, syntax, &mut asm)
        .map_err(|error| anyhow!("Code generation failed: {}", error))?;

    match (args.is_present("executable"), output) {
        // Salida a stdout sin enlazado
        (false, "-") => {
            let stdout = io::stdout();
            let mut stdout = stdout.lock();

            stdout
                .write_all(&asm)
                .and_then(|()| stdout.flush())
                .context("Failed to emit to stdout")?;
        }

        // Salida a archivo sin enlazado
        (false, path) => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to open for writing: {}", path))?;

            file.write_all(&asm)
                .with_context(|| format!("Failed to emit to file: {}", path))?;
        }

        // Salida a stdout con enlazado
        (true, "-") => bail!("Refusing to write executable to stdout"),

        // Salida a archivo con enlazado
        (true, path) => {
            let mut options = LinkOptions::empty();
            if args.is_present("strip") {
                options |= LinkOptions::STRIP;
            }

            let mut linker = Linker::spawn(path, options).context("Failed to link")?;
            linker
                .stdin()
                .write_all(&asm)
                .context("Failed to emit assembly to assembler")?;

            linker
                .finish()
                .with_context(|| format!("Failed to generate executable: {}", path))?;
        }
    };

    Ok(())
}

fn fail(diagnostics: Diagnostics) -> ! {
    eprint!("{}", diagnostics);
    process::exit(1)
}

fn init_logging(verbosity: u64) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };

    // `RUST_LOG` tiene prioridad sobre `-v`
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .with_target(false)
        .init();
}
