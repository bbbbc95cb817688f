/// Module representing high-level entry-point of the REPL.
pub mod repl;

pub mod run {

    /// Module that holds implementation detail of [`crate::run::run`].
    /// It glues [`malus::interpreter`] and [`crate::repl`] together.
    mod glue {
        use super::{Mode, Opts};
        use crate::repl;
        use malus::interpreter::{self, Interpreter};
        use std::{fs::File, io};
        use thiserror::Error;

        #[derive(Error, Debug)]
        pub enum Error {
            #[error(transparent)]
            Run(#[from] interpreter::Error),
            #[error(transparent)]
            Repl(#[from] rustyline::error::ReadlineError),
        }

        pub type Result<T = ()> = std::result::Result<T, Error>;

        fn open_file(path: &std::path::Path) -> std::result::Result<File, interpreter::Error> {
            File::open(path).map_err(interpreter::Error::from)
        }

        /// Scripts and stdin are evaluated for their effects, the final value is dropped.
        pub fn run(opts: Opts) -> Result {
            match opts.mode {
                Mode::Script(path) => {
                    let file = open_file(&path)?;
                    Interpreter::with_args(opts.args)?.run(file)?;
                }
                Mode::Stdin => {
                    Interpreter::with_args(opts.args)?.run(io::stdin())?;
                }
                Mode::Repl => {
                    repl::greet();
                    repl::run(Interpreter::with_args(opts.args)?)?;
                }
            }
            Ok(())
        }
    }

    use std::{path::PathBuf, process::exit};
    use tracing::debug;

    #[derive(Debug)]
    pub enum Mode {
        Script(PathBuf),
        Repl,
        Stdin,
    }

    impl Mode {
        /// REPL when a user sits at the terminal, otherwise stdin holds a script.
        pub fn stdin_or_repl() -> Self {
            if atty::is(atty::Stream::Stdin) {
                Self::Repl
            } else {
                Self::Stdin
            }
        }
    }

    #[derive(Debug)]
    pub struct Opts {
        pub mode: Mode,
        /// bound to `*ARGV*`
        pub args: Vec<String>,
    }

    pub fn run(opts: Opts) {
        debug!(?opts, "starting");
        if let Err(err) = glue::run(opts) {
            eprintln!("Error -- {}", err);
            exit(1);
        }
    }
}

pub mod parse {
    use itertools::Itertools;
    use malus::{expr::Expression, parser};
    use std::{fs, io, path::PathBuf};
    use thiserror::Error;

    #[derive(Error, Debug)]
    enum Error {
        #[error(transparent)]
        ParseErr(#[from] parser::ParseError),
        #[error(transparent)]
        IOErr(#[from] io::Error),
    }

    fn inner(file: PathBuf) -> Result<Vec<Expression>, Error> {
        Ok(parser::parse_script(&fs::read_to_string(file)?)?)
    }

    pub fn run(file: PathBuf) {
        match inner(file) {
            Ok(x) => println!("{}", x.iter().join("\n")),
            Err(e) => eprintln!("Error -- {}", e),
        }
    }
}

pub mod lex {
    use itertools::Itertools;
    use malus::lexer;
    use std::{fs, io, path::PathBuf};

    fn inner(file: PathBuf) -> Result<Vec<lexer::Token>, io::Error> {
        Ok(lexer::tokenize(&fs::read_to_string(file)?))
    }

    fn to_str(tok: &lexer::Token) -> String {
        match tok {
            lexer::Token::Atom(s) => format!("Atom({s})"),
            tok => format!("{:?}", tok),
        }
    }

    pub fn run(file: PathBuf) {
        match inner(file) {
            Ok(x) => println!("{}", x.iter().map(to_str).join("\n")),
            Err(e) => eprintln!("Error -- {}", e),
        }
    }
}

use clap::{Parser, Subcommand};
use std::{io, path::PathBuf};
use tracing_subscriber::EnvFilter;

/// environment variable holding the log filter, e.g. `MALUS_LOG=malus=trace`
pub const LOG_ENV: &str = "MALUS_LOG";

#[derive(Parser, Debug)]
/// An interpreter for mal, a small Clojure-flavoured Lisp, written in Rust.
pub struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run program from a script file.
    Run {
        /// Program to run.
        file: PathBuf,
        /// Arguments passed to the program as `*ARGV*`.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Parse program from a script file.
    Parse {
        /// Program to parse.
        file: PathBuf,
    },

    /// Lex (tokenize) program from a script file.
    Lex {
        /// Program to lex.
        file: PathBuf,
    },
}

/// Logs go to stderr so program output stays clean.
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

pub fn run() {
    init_logging();
    let args = Args::parse();
    let Some(command) = args.command else {
        return run::run(run::Opts {
            mode: run::Mode::stdin_or_repl(),
            args: vec![],
        });
    };
    match command {
        Commands::Run { file, args } => {
            run::run(run::Opts {
                mode: run::Mode::Script(file),
                args,
            });
        }
        Commands::Parse { file } => parse::run(file),
        Commands::Lex { file } => lex::run(file),
    }
}
