use malus::interpreter::Interpreter;
use rustyline::{error::ReadlineError, history::History, Editor, Helper};
use tracing::debug;

const HISTORY_FILE: &str = ".malushistory";

const PROMPT: &str = "user> ";

pub fn greet() {
    eprintln!("Welcome to the malus REPL. Ctrl-D exits.")
}

pub type Error = ReadlineError;

fn run_line(ip: &mut Interpreter, line: &str) {
    match ip.rep(line) {
        Ok(Some(out)) => println!("{}", out),
        Ok(None) => {}
        Err(err) => eprintln!("Error -- {}", err),
    }
}

/// Reads lines until end of input; Ctrl-C only drops the current line.
fn run_loop<H: Helper, I: History>(
    ip: &mut Interpreter,
    editor: &mut Editor<H, I>,
) -> Result<(), Error> {
    loop {
        match editor.readline(PROMPT) {
            Ok(line) => run_line(ip, &line),
            Err(ReadlineError::Interrupted) => debug!("line interrupted"),
            Err(ReadlineError::Eof) => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}

pub fn run(mut ip: Interpreter) -> Result<(), Error> {
    let mut editor = {
        let config = rustyline::Config::builder()
            .auto_add_history(true)
            .completion_type(rustyline::CompletionType::List)
            .build();
        rustyline::Editor::<(), _>::with_config(config)?
    };
    _ = editor.load_history(HISTORY_FILE);
    let res = run_loop(&mut ip, &mut editor);
    _ = editor.save_history(HISTORY_FILE);
    res
}
