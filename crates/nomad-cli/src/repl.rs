//! Interactive read-eval-print loop (`nomad repl`).
//!
//! One line in, one reaction out: a `print` inside the line is echoed,
//! a pipeline error is printed and the loop continues rather than
//! aborting the session on a single bad line.

use nomad::{Diagnostic, Interpreter, Limits};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

const PROMPT: &str = "(nomad) > ";

pub fn run(limits: Limits) {
    let mut interp = Interpreter::new();
    interp.limit(limits);

    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("nomad: could not start REPL: {err}");
            return;
        }
    };

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed == "exit" || trimmed == "quit" {
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(trimmed);
                match interp.capture(trimmed) {
                    Ok(output) => {
                        for line in output.output {
                            println!("{line}");
                        }
                    }
                    Err(err) => eprintln!("{}", Diagnostic::from_error(&err, trimmed)),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("nomad: readline error: {err}");
                break;
            }
        }
    }
}
