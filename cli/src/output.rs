//! Terminal output helpers shared by the commands

use colored::{ColoredString, Colorize};
use std::fmt::Display;

#[derive(Debug, Clone, Copy)]
enum Status {
    Success,
    Failure,
    Note,
    Caution,
}

impl Status {
    fn marker(self) -> ColoredString {
        match self {
            Status::Success => "✓".green(),
            Status::Failure => "✗".red(),
            Status::Note => "ℹ".blue(),
            Status::Caution => "⚠".yellow(),
        }
    }
}

fn status(kind: Status, msg: &str) {
    match kind {
        Status::Failure => eprintln!("{} {}", kind.marker(), msg),
        _ => println!("{} {}", kind.marker(), msg),
    }
}

pub fn success(msg: &str) {
    status(Status::Success, msg);
}

/// Printed to stderr
pub fn error(msg: &str) {
    status(Status::Failure, msg);
}

pub fn info(msg: &str) {
    status(Status::Note, msg);
}

pub fn warning(msg: &str) {
    status(Status::Caution, msg);
}

pub fn heading(title: &str) {
    println!("{}", title.bold().underline());
}

/// Aligned `label: value` line under a heading
pub fn field(label: &str, value: impl Display) {
    println!("  {:<16} {}", format!("{}:", label).bold(), value);
}
