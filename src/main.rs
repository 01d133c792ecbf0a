use std::{
    io::Write,
    path::{Path, PathBuf},
    process::ExitCode,
};

use aml::tokenizer::{TokenKind, Tokenizer};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Scan, parse and run AML programs")]
struct Cli {
    /// Log to stderr, repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Repl)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a program and print its trace
    Run(RunArgs),
    /// Run every entered line as a separate program
    Repl,
    /// Print the token stream of a program
    Tokens(SourceArgs),
    /// Print the parsed program and its syntax errors
    Ast(SourceArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    file: PathBuf,

    #[arg(long, value_enum, default_value_t = Format::Trace)]
    format: Format,
}

#[derive(Debug, Args)]
struct SourceArgs {
    file: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// Events in the order they happened
    Trace,
    /// Events grouped by compiler phase
    Phases,
    /// The whole report as JSON
    Json,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let args = Cli::parse();
    init_logging(args.verbose);

    let result = match args.command() {
        Command::Repl => repl_command(),
        Command::Run(args) => run_command(args),
        Command::Tokens(args) => tokens_command(args),
        Command::Ast(args) => ast_command(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

fn read_source(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn exit_code(failed: bool) -> ExitCode {
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn repl_command() -> Result<ExitCode, CliError> {
    println!("Welcome to the AML REPL!");
    println!("Every line runs as its own program.");
    println!("EOF to exit. (Ctrl+D on *nix, Ctrl+Z on Windows)");

    let mut input = String::new();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        input.clear();
        let read = std::io::stdin().read_line(&mut input)?;
        if read == 0 {
            break;
        }

        let source = input.trim();
        if source.is_empty() {
            continue;
        }
        println!("{}", aml::parse_and_run(source).trace);
    }

    Ok(ExitCode::SUCCESS)
}

fn run_command(args: &RunArgs) -> Result<ExitCode, CliError> {
    let source = read_source(&args.file)?;
    let report = aml::parse_and_run(&source);

    let mut stdout = std::io::stdout().lock();
    match args.format {
        Format::Trace => writeln!(stdout, "{}", report.trace)?,
        Format::Phases => writeln!(stdout, "{}", report.phases())?,
        Format::Json => {
            serde_json::to_writer_pretty(&mut stdout, &report)?;
            writeln!(stdout)?;
        }
    }

    Ok(exit_code(report.error_count() > 0))
}

fn tokens_command(args: &SourceArgs) -> Result<ExitCode, CliError> {
    let source = read_source(&args.file)?;
    let mut tokenizer = Tokenizer::new(&source);
    let mut failed = false;
    let mut line = 0;

    loop {
        let token = match tokenizer.token() {
            Ok(token) => token,
            Err(e) => {
                println!("{e}");
                failed = true;
                tokenizer.recover()
            }
        };

        if token.position.line != line {
            print!("{:4} ", token.position.line);
            line = token.position.line;
        } else {
            print!("   | ");
        }
        println!("{:<12} {}", token.kind, token.lexeme);

        if token.kind == TokenKind::EndOfInput {
            break;
        }
    }

    Ok(exit_code(failed))
}

fn ast_command(args: &SourceArgs) -> Result<ExitCode, CliError> {
    let source = read_source(&args.file)?;
    let (program, events) = aml::parser::program(&source);

    print!("{program}");
    let mut failed = false;
    for event in events.iter().filter(|event| event.is_error()) {
        println!("{event}");
        failed = true;
    }

    Ok(exit_code(failed))
}
