//! The produced program's only I/O surface: a console-like sink.
//!
//! The interpreter wires a `console` global (`debug`/`log`/`info`/`warn`/
//! `error`) to a [`ConsoleSink`]. The CLI uses [`StdoutSink`]; tests use
//! [`RecordingSink`] to assert on the exact side effects a run produced.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::value::{NativeFn, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Log,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Log => "log",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

pub trait ConsoleSink {
    fn write(&self, level: LogLevel, message: &str);
}

/// Writes messages to stdout, warnings and errors to stderr.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl ConsoleSink for StdoutSink {
    fn write(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Warn | LogLevel::Error => eprintln!("{}", message),
            _ => println!("{}", message),
        }
    }
}

/// Captures every console write for later inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: RefCell<Vec<(LogLevel, String)>>,
}

impl RecordingSink {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Every message, in write order, regardless of level.
    pub fn messages(&self) -> Vec<String> {
        self.records
            .borrow()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn records(&self) -> Vec<(LogLevel, String)> {
        self.records.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}

impl ConsoleSink for RecordingSink {
    fn write(&self, level: LogLevel, message: &str) {
        self.records.borrow_mut().push((level, message.to_string()));
    }
}

/// Build the `console` global backed by `sink`.
pub fn console_object(sink: Rc<dyn ConsoleSink>) -> Value {
    let console = Value::object();
    let methods = [
        ("debug", LogLevel::Debug),
        ("log", LogLevel::Log),
        ("info", LogLevel::Info),
        ("warn", LogLevel::Warn),
        ("error", LogLevel::Error),
    ];

    for (name, level) in methods {
        let sink = Rc::clone(&sink);
        let native = NativeFn {
            name,
            call: Box::new(move |args| {
                let message = args
                    .iter()
                    .map(Value::display_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                sink.write(level, &message);
                Ok(Value::Undefined)
            }),
        };
        console.set_prop(name, Value::Native(Rc::new(native)));
    }

    console
}
