use std::io::Read;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use regexinter::batch::{self, ParseError};
use regexinter::{Config, DfaError, IntersectionError, Intersector};

#[derive(Parser)]
#[command(name = "regexinter")]
#[command(about = "Decide whether two regular expressions match a common string")]
struct Cli {
    /// Largest count accepted in a repetition like a{n}
    #[arg(long, global = true, default_value_t = Config::DEFAULT_MAX_REPETITION)]
    max_repetition: u32,
    /// Give up when one expression needs more NFA states than this
    #[arg(long, global = true, default_value_t = Config::DEFAULT_MAX_NFA_STATES)]
    max_nfa_states: usize,
    /// Give up when one expression needs more DFA states than this
    #[arg(long, global = true)]
    max_dfa_states: Option<usize>,
    /// Give up when the search visits more product states than this
    #[arg(long, global = true)]
    max_product_states: Option<usize>,
    /// Print automaton sizes to stderr
    #[arg(long, global = true)]
    stats: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check two expressions; exits successfully iff they intersect
    Check { first: String, second: String },
    /// Print the DFA built for an expression
    Dfa { expr: String },
    /// Check every case of a batch file read from stdin
    Batch,
}

fn read_stdin() -> std::io::Result<String> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    Ok(input)
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Intersection(#[from] IntersectionError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Dfa(#[from] DfaError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Batch(#[from] ParseError),
    #[error("failed to read from stdin")]
    #[diagnostic(code(regexinter::io))]
    Io(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let intersector = Intersector::new(
        Config::new()
            .max_repetition(cli.max_repetition)
            .max_nfa_states(cli.max_nfa_states)
            .max_dfa_states(cli.max_dfa_states)
            .max_product_states(cli.max_product_states),
    );

    let result: Result<ExitCode, CliError> = (|| match &cli.command {
        Commands::Check { first, second } => {
            let outcome = intersector.check(first, second)?;
            println!("{}", outcome.intersects);
            if cli.stats {
                eprint!("{}", outcome.stats);
            }
            if outcome.intersects {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Dfa { expr } => {
            let dfa = intersector.dfa(expr)?;
            print!("{}", dfa);
            if cli.stats {
                eprintln!("DFA states:     {}", dfa.len());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Batch => {
            let input = read_stdin()?;
            let cases = batch::parse(&input, "<stdin>")?;
            let report = batch::run(&cases, &intersector);
            print!("{}", report);
            if cli.stats {
                eprint!("{}", report.stats());
            }
            if report.is_success() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    })();

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            ExitCode::FAILURE
        }
    }
}
