use lci::evaluator::{Report, Session, StepDecision, StepObserver};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::Ordering;

const RC_FILE: &str = ".lcirc";
const HISTORY_FILE: &str = ".lci_history";

fn main() {
    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The interpreter encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

/// Asks on the terminal whether to go on while tracing
struct Terminal {
    rl: DefaultEditor,
}

impl StepObserver for Terminal {
    fn on_trace(&mut self, term: &str) -> StepDecision {
        println!("{term}");
        loop {
            match self.rl.readline("  ?> ") {
                Ok(answer) => match answer.trim() {
                    "" | "s" | "step" => return StepDecision::Step,
                    "c" | "continue" => return StepDecision::Continue,
                    "a" | "abort" => return StepDecision::Abort,
                    _ => println!("(s)tep, (c)ontinue, (a)bort"),
                },
                Err(_) => return StepDecision::Abort,
            }
        }
    }

    fn on_show(&mut self, term: &str) {
        println!("{term}");
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Print what a program produced. Returns false once `Quit` was seen.
fn print_reports(reports: Vec<Report>) -> bool {
    for report in reports {
        match report {
            Report::Declared(_) => {}
            Report::Normalized {
                rendered,
                steps,
                elapsed,
            } => {
                println!("{rendered}");
                println!("({steps} reductions, {:.2}s)", elapsed.as_secs_f64());
            }
            Report::Aborted => println!("Aborted."),
            Report::Output(text) => println!("{text}"),
            Report::Failed(e) => eprintln!("Error: {e}"),
            Report::Quit => return false,
        }
    }
    true
}

/// Consult `./.lcirc` and `~/.lcirc`, whichever exist
fn load_rc_files(session: &mut Session, terminal: &mut Terminal) -> bool {
    let mut candidates = vec![PathBuf::from(RC_FILE)];
    if let Some(home) = home_dir() {
        candidates.push(home.join(RC_FILE));
    }

    let mut loaded = false;
    for path in candidates.into_iter().filter(|p| p.is_file()) {
        match session.consult(&path, terminal) {
            Ok(reports) => {
                loaded = true;
                if !print_reports(reports) {
                    return false;
                }
            }
            Err(e) => eprintln!("Error: {e}"),
        }
    }
    if !loaded {
        eprintln!("Warning: no {RC_FILE} found, starting without predefined aliases.");
    }
    true
}

fn run_repl() {
    println!("lci - A lambda calculus interpreter");
    println!("Type a lambda term like (\\x.x) a, or Help for the system commands.");
    println!("Press Ctrl+C to interrupt an evaluation, Ctrl+D to exit.");
    println!();

    let rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Could not initialize the line editor: {e}");
            return;
        }
    };
    let mut terminal = Terminal { rl };
    let mut session = Session::new();

    // Ctrl-C during a reduction switches it to tracing, where it can be aborted
    let interrupt = session.trace_handle();
    if let Err(e) = ctrlc::set_handler(move || interrupt.store(true, Ordering::Relaxed)) {
        eprintln!("Warning: Ctrl-C cannot interrupt evaluation: {e}");
    }

    let history = home_dir().map(|home| home.join(HISTORY_FILE));
    if let Some(path) = &history {
        let _ = terminal.rl.load_history(path);
    }

    if load_rc_files(&mut session, &mut terminal) {
        loop {
            match terminal.rl.readline("lci> ") {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = terminal.rl.add_history_entry(line);

                    let reports = session.run_source(line, &mut terminal);
                    if !print_reports(reports) {
                        break;
                    }
                }

                Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
                Err(err) => {
                    eprintln!("Error: {err:?}");
                    break;
                }
            }
        }
    }

    if let Some(path) = &history {
        let _ = terminal.rl.save_history(path);
    }
    println!("Goodbye!");
}
