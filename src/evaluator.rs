use crate::Error;
use crate::commands::{Invocation, Setting, help_text, recognise};
use crate::decls::Declarations;
use crate::fixpoint::eliminate_cycles;
use crate::freevars::set_closed_flags;
use crate::intern::{Interner, Name};
use crate::operators::{Assoc, OperatorTable};
use crate::reduce::{Reducer, remove_operators};
use crate::render::{RenderOptions, render};
use crate::term::{TermId, TermPool};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[cfg(feature = "parser")]
use crate::parser::{Command, parse_command, parse_term};
#[cfg(feature = "parser")]
use std::path::Path;

/// Interpreter options, changed with `Set option on|off`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Ask the observer before every reduction step
    pub trace: bool,
    /// Show the term before every reduction step
    pub show_exec: bool,
    pub show_parens: bool,
    pub greek_lambda: bool,
    pub readable: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            trace: false,
            show_exec: false,
            show_parens: false,
            greek_lambda: false,
            readable: true,
        }
    }
}

impl Options {
    pub fn set(&mut self, setting: Setting, enabled: bool) {
        match setting {
            Setting::Trace => self.trace = enabled,
            Setting::ShowExec => self.show_exec = enabled,
            Setting::ShowParens => self.show_parens = enabled,
            Setting::GreekLambda => self.greek_lambda = enabled,
            Setting::Readable => self.readable = enabled,
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            show_parens: self.show_parens,
            greek_lambda: self.greek_lambda,
            readable: self.readable,
        }
    }
}

/// Answer of a [`StepObserver`] while tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDecision {
    /// Perform one step and ask again
    Step,
    /// Stop tracing and run to the normal form
    Continue,
    /// Give up on this term
    Abort,
}

/// Hook into the reduction loop.
///
/// Both methods receive the current term, rendered with the session options,
/// before each step.
pub trait StepObserver {
    /// Called while tracing is on
    fn on_trace(&mut self, term: &str) -> StepDecision;

    /// Called when `showexec` is on and tracing is off
    fn on_show(&mut self, _term: &str) {}
}

/// Observer that never stops a reduction
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrace;

impl StepObserver for NoTrace {
    fn on_trace(&mut self, _term: &str) -> StepDecision {
        StepDecision::Continue
    }
}

/// Result of evaluating one term
#[derive(Debug, PartialEq)]
pub enum EvalOutcome {
    /// The term reached its normal form. The caller owns `term`.
    Normalized { term: TermId, steps: usize },
    /// The observer aborted; the term has been released
    Aborted,
    /// Reduction failed; the term has been released
    Error(Error),
}

/// What one command of a program produced
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    /// A declaration was registered
    Declared(String),
    Normalized {
        rendered: String,
        steps: usize,
        elapsed: Duration,
    },
    Aborted,
    /// Text printed by a system command
    Output(String),
    Failed(Error),
    /// `Quit` was requested; nothing after it ran
    Quit,
}

/// How a program run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Done,
    /// A syntax error stopped the program
    Stopped,
    Quit,
}

/// One interpreter instance: terms, declarations, operators and options
#[derive(Debug)]
pub struct Session {
    pool: TermPool,
    names: Interner,
    decls: Declarations,
    ops: OperatorTable,
    options: Options,
    trace: Arc<AtomicBool>,
    consulting: Vec<PathBuf>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            pool: TermPool::new(),
            names: Interner::new(),
            decls: Declarations::new(),
            ops: OperatorTable::new(),
            options: Options::default(),
            trace: Arc::new(AtomicBool::new(false)),
            consulting: Vec::new(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    /// Flag polled before every reduction step. Setting it from another thread
    /// (a Ctrl-C handler, say) switches the running evaluation to tracing.
    pub fn trace_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.trace)
    }

    pub fn pool(&self) -> &TermPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut TermPool {
        &mut self.pool
    }

    pub fn declarations(&self) -> &Declarations {
        &self.decls
    }

    pub fn operators(&self) -> &OperatorTable {
        &self.ops
    }

    pub fn intern(&mut self, s: &str) -> Name {
        self.names.intern(s)
    }

    pub fn resolve(&self, name: Name) -> &str {
        self.names.resolve(name)
    }

    pub fn define_operator(&mut self, name: Name, precedence: u8, assoc: Assoc) {
        self.ops.define(name, precedence, assoc);
    }

    /// Render `term` with the current print options
    pub fn render(&self, term: TermId) -> String {
        render(&self.pool, &self.names, term, &self.options.render_options())
    }

    pub fn release(&mut self, term: TermId) {
        self.pool.release(term);
    }

    /// Desugar operators in `term`, then store it under `name`.
    ///
    /// A term with free variables is released and refused.
    pub fn register_declaration(&mut self, name: Name, term: TermId) -> Result<(), Error> {
        remove_operators(&mut self.pool, &self.names, term);
        set_closed_flags(&mut self.pool, term);
        self.decls
            .add(&mut self.pool, &self.names, name, term)
            .inspect_err(|_| self.pool.release(term))
    }

    /// Reduce `term` to normal form
    pub fn evaluate(&mut self, term: TermId) -> EvalOutcome {
        self.evaluate_with(term, &mut NoTrace)
    }

    pub fn evaluate_with(&mut self, term: TermId, observer: &mut dyn StepObserver) -> EvalOutcome {
        remove_operators(&mut self.pool, &self.names, term);
        set_closed_flags(&mut self.pool, term);
        self.reduce(term, observer)
    }

    /// The reduction loop. Operators must be desugared and closed flags set.
    fn reduce(&mut self, term: TermId, observer: &mut dyn StepObserver) -> EvalOutcome {
        self.trace.store(self.options.trace, Ordering::Relaxed);
        let mut steps = 0;
        loop {
            if self.trace.load(Ordering::Relaxed) {
                match observer.on_trace(&self.render(term)) {
                    StepDecision::Step => {}
                    StepDecision::Continue => self.trace.store(false, Ordering::Relaxed),
                    StepDecision::Abort => {
                        self.pool.release(term);
                        return EvalOutcome::Aborted;
                    }
                }
            } else if self.options.show_exec {
                observer.on_show(&self.render(term));
            }

            let mut reducer = Reducer {
                pool: &mut self.pool,
                names: &mut self.names,
                decls: &self.decls,
            };
            match reducer.step(term) {
                Ok(true) => steps += 1,
                Ok(false) => return EvalOutcome::Normalized { term, steps },
                Err(e) => {
                    self.pool.release(term);
                    return EvalOutcome::Error(e);
                }
            }
        }
    }

    /// Rewrite recursive declarations with the `Y` combinator. Returns the
    /// number of cycles removed.
    pub fn run_fixed_point_elimination(&mut self) -> Result<usize, Error> {
        eliminate_cycles(&mut self.pool, &mut self.names, &mut self.decls)
    }

    /// Declarations in declaration order, or just `only` if given
    pub fn declarations_for_print(
        &self,
        only: Option<Name>,
    ) -> impl Iterator<Item = (Name, TermId)> + '_ {
        self.decls
            .iter()
            .filter(move |&(name, _)| only.is_none_or(|o| o == name))
    }

    /// `id = term` lines for `ShowAlias`
    fn show_aliases(&self, only: Option<Name>) -> Result<Vec<String>, Error> {
        if let Some(name) = only
            && !self.decls.contains(name)
        {
            return Err(Error::UndeclaredAlias(self.resolve(name).to_owned()));
        }
        Ok(self
            .declarations_for_print(only)
            .map(|(name, term)| format!("{} = {}", self.resolve(name), self.render(term)))
            .collect())
    }

    /// Run a system command. `Print` refers into the command term, which the
    /// caller releases afterwards.
    fn run_command(
        &mut self,
        invocation: Invocation,
        observer: &mut dyn StepObserver,
        reports: &mut Vec<Report>,
    ) -> Flow {
        match invocation {
            Invocation::DefOp {
                name,
                precedence,
                assoc,
            } => self.define_operator(name, precedence, assoc),
            Invocation::ShowAlias(only) => match self.show_aliases(only) {
                Ok(lines) => reports.extend(lines.into_iter().map(Report::Output)),
                Err(e) => reports.push(Report::Failed(e)),
            },
            Invocation::Print(term) => reports.push(Report::Output(self.render(term))),
            Invocation::FixedPoint => reports.push(match self.run_fixed_point_elimination() {
                Ok(0) => Report::Output("No cycles found".into()),
                Ok(n) => Report::Output(format!(
                    "{n} cycles removed using fixed point combinator Y."
                )),
                Err(e) => Report::Failed(e),
            }),
            Invocation::Consult(file) => {
                if self.consult_command(file, observer, reports) == Flow::Quit {
                    return Flow::Quit;
                }
            }
            Invocation::Set { setting, enabled } => self.options.set(setting, enabled),
            Invocation::Help => reports.push(Report::Output(help_text())),
            Invocation::Quit => {
                reports.push(Report::Quit);
                return Flow::Quit;
            }
        }
        Flow::Done
    }

    #[cfg(not(feature = "parser"))]
    fn consult_command(
        &mut self,
        file: String,
        _observer: &mut dyn StepObserver,
        reports: &mut Vec<Report>,
    ) -> Flow {
        reports.push(Report::Failed(Error::ConsultFailed {
            path: file,
            reason: "built without the parser".into(),
        }));
        Flow::Done
    }

    /// Evaluate `term` as a top-level command: a system command if its head
    /// names one, an ordinary reduction otherwise
    fn execute(
        &mut self,
        term: TermId,
        observer: &mut dyn StepObserver,
        reports: &mut Vec<Report>,
    ) -> Flow {
        remove_operators(&mut self.pool, &self.names, term);
        set_closed_flags(&mut self.pool, term);

        match recognise(&self.pool, &self.names, term) {
            Some(Ok(invocation)) => {
                let flow = self.run_command(invocation, observer, reports);
                self.pool.release(term);
                flow
            }
            Some(Err(e)) => {
                self.pool.release(term);
                reports.push(Report::Failed(e));
                Flow::Done
            }
            None => {
                let start = Instant::now();
                reports.push(match self.reduce(term, observer) {
                    EvalOutcome::Normalized { term, steps } => {
                        let rendered = self.render(term);
                        self.pool.release(term);
                        Report::Normalized {
                            rendered,
                            steps,
                            elapsed: start.elapsed(),
                        }
                    }
                    EvalOutcome::Aborted => Report::Aborted,
                    EvalOutcome::Error(e) => Report::Failed(e),
                });
                Flow::Done
            }
        }
    }
}

#[cfg(feature = "parser")]
impl Session {
    /// Parse a term with the session's operator table
    pub fn parse_term(&mut self, src: &str) -> Result<TermId, Error> {
        parse_term(src, &mut self.pool, &mut self.names, &self.ops)
    }

    /// Run every command of `src` in order.
    ///
    /// Errors in one command are reported and the next command runs. A syntax
    /// error or `Quit` stops the program.
    pub fn run_source(&mut self, src: &str, observer: &mut dyn StepObserver) -> Vec<Report> {
        let mut reports = Vec::new();
        self.run_program(src, observer, &mut reports);
        reports
    }

    /// Read and run a program file
    pub fn consult(
        &mut self,
        path: impl AsRef<Path>,
        observer: &mut dyn StepObserver,
    ) -> Result<Vec<Report>, Error> {
        let mut reports = Vec::new();
        self.consult_into(path.as_ref(), observer, &mut reports)?;
        Ok(reports)
    }

    fn consult_command(
        &mut self,
        file: String,
        observer: &mut dyn StepObserver,
        reports: &mut Vec<Report>,
    ) -> Flow {
        match self.consult_into(Path::new(&file), observer, reports) {
            Ok(Flow::Done) => {
                reports.push(Report::Output(format!("Successfully consulted {file}")));
                Flow::Done
            }
            Ok(flow) => flow,
            Err(e) => {
                reports.push(Report::Failed(e));
                Flow::Done
            }
        }
    }

    fn consult_into(
        &mut self,
        path: &Path,
        observer: &mut dyn StepObserver,
        reports: &mut Vec<Report>,
    ) -> Result<Flow, Error> {
        let failed = |reason: String| Error::ConsultFailed {
            path: path.display().to_string(),
            reason,
        };
        if self.consulting.iter().any(|p| p == path) {
            return Err(failed("file is already being consulted".into()));
        }
        let source = std::fs::read_to_string(path).map_err(|e| failed(e.to_string()))?;

        self.consulting.push(path.to_path_buf());
        let flow = self.run_program(&source, observer, reports);
        self.consulting.pop();
        Ok(flow)
    }

    fn run_program(
        &mut self,
        src: &str,
        observer: &mut dyn StepObserver,
        reports: &mut Vec<Report>,
    ) -> Flow {
        let mut rest = src;
        loop {
            self.pool.drain();
            let parsed = parse_command(rest, &mut self.pool, &mut self.names, &self.ops);
            let (command, after) = match parsed {
                Ok(Some(next)) => next,
                Ok(None) => return Flow::Done,
                Err(e) => {
                    reports.push(Report::Failed(e));
                    return Flow::Stopped;
                }
            };
            rest = after;

            let flow = match command {
                Command::Declaration { name, term } => {
                    reports.push(match self.register_declaration(name, term) {
                        Ok(()) => Report::Declared(self.resolve(name).to_owned()),
                        Err(e) => Report::Failed(e),
                    });
                    Flow::Done
                }
                Command::Evaluate(term) => self.execute(term, observer, reports),
            };
            if flow != Flow::Done {
                return flow;
            }
        }
    }
}
