//! System commands.
//!
//! A term whose left-most head is one of the aliases below is run as a command
//! instead of being reduced. The remaining terms of the application spine are
//! its arguments:
//!
//! ```text
//! DefOp '+' 150 yfx
//! ShowAlias K
//! Set trace on
//! ```
//!
//! Any other head, including undeclared aliases, is an ordinary term.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::Error;
use crate::intern::{Interner, Name};
use crate::numeral::number_of;
use crate::operators::Assoc;
use crate::term::{TermId, TermKind, TermPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    DefOp,
    ShowAlias,
    Print,
    FixedPoint,
    Consult,
    Set,
    Help,
    Quit,
}

/// Accepted number of arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    /// Inclusive bounds
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::Range(lo, hi) => (lo..=hi).contains(&count),
        }
    }
}

/// Registry entry for one command
#[derive(Debug, Clone)]
pub struct SystemCommand {
    pub name: &'static str,
    pub kind: CommandKind,
    pub arity: Arity,
    /// Argument synopsis shown by `Help` and in error messages
    pub usage: &'static str,
    pub summary: &'static str,
}

impl SystemCommand {
    fn malformed(&self) -> Error {
        Error::MalformedSystemCommand(format!("usage: {}", self.usage))
    }
}

static SYSTEM_COMMANDS: LazyLock<Vec<SystemCommand>> = LazyLock::new(|| {
    vec![
        SystemCommand {
            name: "FixedPoint",
            kind: CommandKind::FixedPoint,
            arity: Arity::Exact(0),
            usage: "FixedPoint",
            summary: "Removes recursion using fixed point comb. Y",
        },
        SystemCommand {
            name: "DefOp",
            kind: CommandKind::DefOp,
            arity: Arity::Exact(3),
            usage: "DefOp name prec ass",
            summary: "Defines an operator",
        },
        SystemCommand {
            name: "ShowAlias",
            kind: CommandKind::ShowAlias,
            arity: Arity::Range(0, 1),
            usage: "ShowAlias [name]",
            summary: "List the specified or all stored aliases",
        },
        SystemCommand {
            name: "Print",
            kind: CommandKind::Print,
            arity: Arity::Exact(1),
            usage: "Print term",
            summary: "Displays the term",
        },
        SystemCommand {
            name: "Consult",
            kind: CommandKind::Consult,
            arity: Arity::Exact(1),
            usage: "Consult file",
            summary: "Reads and interprets the specified file",
        },
        SystemCommand {
            name: "Set",
            kind: CommandKind::Set,
            arity: Arity::Exact(2),
            usage: "Set option (on|off)",
            summary: "Changes one of the following options:\n\t\t\ttrace, showexec, showpar, greeklambda, readable",
        },
        SystemCommand {
            name: "Help",
            kind: CommandKind::Help,
            arity: Arity::Exact(0),
            usage: "Help",
            summary: "Displays this message",
        },
        SystemCommand {
            name: "Quit",
            kind: CommandKind::Quit,
            arity: Arity::Exact(0),
            usage: "Quit",
            summary: "Quit the program (same as Ctrl-D)",
        },
    ]
});

static BY_NAME: LazyLock<HashMap<&'static str, &'static SystemCommand>> = LazyLock::new(|| {
    let commands: &'static [SystemCommand] = SYSTEM_COMMANDS.as_slice();
    commands.iter().map(|c| (c.name, c)).collect()
});

pub fn system_commands() -> &'static [SystemCommand] {
    SYSTEM_COMMANDS.as_slice()
}

pub fn find_command(name: &str) -> Option<&'static SystemCommand> {
    BY_NAME.get(name).copied()
}

/// Interpreter options that `Set` can change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Trace,
    ShowExec,
    ShowParens,
    GreekLambda,
    Readable,
}

impl Setting {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "trace" => Some(Setting::Trace),
            "showexec" => Some(Setting::ShowExec),
            "showpar" => Some(Setting::ShowParens),
            "greeklambda" => Some(Setting::GreekLambda),
            "readable" => Some(Setting::Readable),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Setting::Trace => "trace",
            Setting::ShowExec => "showexec",
            Setting::ShowParens => "showpar",
            Setting::GreekLambda => "greeklambda",
            Setting::Readable => "readable",
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A recognised command with decoded arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    DefOp {
        name: Name,
        precedence: u8,
        assoc: Assoc,
    },
    ShowAlias(Option<Name>),
    /// The argument, still owned by the command term
    Print(TermId),
    FixedPoint,
    Consult(String),
    Set {
        setting: Setting,
        enabled: bool,
    },
    Help,
    Quit,
}

/// Decide whether `term` is a system command.
///
/// Returns `None` for ordinary terms. Operators must already be desugared, so
/// that `DefOp` sees its arguments as a plain application spine.
pub fn recognise(
    pool: &TermPool,
    names: &Interner,
    term: TermId,
) -> Option<Result<Invocation, Error>> {
    let mut args = Vec::new();
    let mut head = term;
    while let TermKind::Appl { func, arg, .. } = pool.kind(head) {
        args.push(arg);
        head = func;
    }
    args.reverse();

    let TermKind::Alias(name) = pool.kind(head) else {
        return None;
    };
    let command = find_command(names.resolve(name))?;
    if !command.arity.accepts(args.len()) {
        return Some(Err(command.malformed()));
    }
    Some(decode(pool, names, command, &args).ok_or_else(|| command.malformed()))
}

/// Name carried by an alias or variable argument
fn word(pool: &TermPool, term: TermId) -> Option<Name> {
    match pool.kind(term) {
        TermKind::Alias(name) | TermKind::Var(name) => Some(name),
        _ => None,
    }
}

fn decode(
    pool: &TermPool,
    names: &Interner,
    command: &SystemCommand,
    args: &[TermId],
) -> Option<Invocation> {
    let invocation = match (command.kind, args) {
        (CommandKind::DefOp, &[op, precedence, assoc]) => {
            let TermKind::Alias(name) = pool.kind(op) else {
                return None;
            };
            let precedence = number_of(pool, &names.well_known(), precedence)?;
            let assoc = Assoc::from_prolog(names.resolve(word(pool, assoc)?))?;
            Invocation::DefOp {
                name,
                precedence: u8::try_from(precedence).ok()?,
                assoc,
            }
        }
        (CommandKind::ShowAlias, &[]) => Invocation::ShowAlias(None),
        (CommandKind::ShowAlias, &[id]) => match pool.kind(id) {
            TermKind::Alias(name) => Invocation::ShowAlias(Some(name)),
            _ => return None,
        },
        (CommandKind::Print, &[term]) => Invocation::Print(term),
        (CommandKind::FixedPoint, _) => Invocation::FixedPoint,
        (CommandKind::Consult, &[file]) => {
            Invocation::Consult(names.resolve(word(pool, file)?).to_owned())
        }
        (CommandKind::Set, &[option, value]) => {
            let TermKind::Var(option) = pool.kind(option) else {
                return None;
            };
            let setting = Setting::from_name(names.resolve(option))?;
            let enabled = match names.resolve(word(pool, value)?) {
                "on" => true,
                "off" => false,
                _ => return None,
            };
            Invocation::Set { setting, enabled }
        }
        (CommandKind::Help, _) => Invocation::Help,
        (CommandKind::Quit, _) => Invocation::Quit,
        _ => return None,
    };
    Some(invocation)
}

/// Text printed by `Help`
pub fn help_text() -> String {
    let mut text = String::from(
        "\nlci - A lambda calculus interpreter\n\n\
         Type a lambda term to compute its normal form\n\
         or enter one of the following system commands:\n\n",
    );
    for command in system_commands() {
        let pad = if command.usage.len() < 8 {
            "\t\t\t"
        } else if command.usage.len() < 16 {
            "\t\t"
        } else {
            "\t"
        };
        text.push_str(command.usage);
        text.push_str(pad);
        text.push_str(command.summary);
        text.push('\n');
    }
    text
}
