//! Leveled, colorized console handed to scripts.
//!
//! The console never touches the process-wide stdout/stderr of the host; it
//! only formats lines and forwards them to the sink it was built with. Every
//! call is synchronous and produces exactly one sink write.

use std::fmt;
use std::sync::Arc;

use rhai::Dynamic;

use super::serialize::serialize;

pub const RESET: &str = "\x1b[0m";
pub const DIM: &str = "\x1b[2m";
pub const RED: &str = "\x1b[31m";
pub const YELLOW: &str = "\x1b[33m";
pub const BLUE: &str = "\x1b[34m";

/// Receiver of fully formatted console lines.
pub type ConsoleSink = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl ConsoleLevel {
    pub const ALL: [ConsoleLevel; 5] = [
        ConsoleLevel::Log,
        ConsoleLevel::Info,
        ConsoleLevel::Warn,
        ConsoleLevel::Error,
        ConsoleLevel::Debug,
    ];

    /// Method name exposed to scripts.
    pub fn as_str(self) -> &'static str {
        match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
            ConsoleLevel::Debug => "debug",
        }
    }

    /// ANSI color prefix; `log` stays neutral.
    pub fn color(self) -> Option<&'static str> {
        match self {
            ConsoleLevel::Log => None,
            ConsoleLevel::Info => Some(BLUE),
            ConsoleLevel::Warn => Some(YELLOW),
            ConsoleLevel::Error => Some(RED),
            ConsoleLevel::Debug => Some(DIM),
        }
    }
}

#[derive(Clone)]
pub struct ColoredConsole {
    sink: ConsoleSink,
}

impl fmt::Debug for ColoredConsole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColoredConsole").finish_non_exhaustive()
    }
}

impl ColoredConsole {
    pub fn new(sink: ConsoleSink) -> Self {
        Self { sink }
    }

    pub fn from_fn(sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self::new(Arc::new(sink))
    }

    /// Console writing to the host stdout, used when interception is disabled.
    pub fn stdout() -> Self {
        Self::from_fn(|line| println!("{line}"))
    }

    /// Join serialized arguments with single spaces and wrap them in the level color.
    pub fn format_line(level: ConsoleLevel, args: &[Dynamic]) -> String {
        paint(level, &join_args(args))
    }

    pub fn emit(&self, level: ConsoleLevel, args: &[Dynamic]) {
        (self.sink)(&Self::format_line(level, args));
    }

    /// Emit text that is already rendered, such as child process output.
    pub fn emit_text(&self, level: ConsoleLevel, text: &str) {
        (self.sink)(&paint(level, text));
    }

    pub fn log(&self, args: &[Dynamic]) {
        self.emit(ConsoleLevel::Log, args);
    }

    pub fn info(&self, args: &[Dynamic]) {
        self.emit(ConsoleLevel::Info, args);
    }

    pub fn warn(&self, args: &[Dynamic]) {
        self.emit(ConsoleLevel::Warn, args);
    }

    pub fn error(&self, args: &[Dynamic]) {
        self.emit(ConsoleLevel::Error, args);
    }

    pub fn debug(&self, args: &[Dynamic]) {
        self.emit(ConsoleLevel::Debug, args);
    }
}

/// Serialized arguments joined with single spaces.
pub fn join_args(args: &[Dynamic]) -> String {
    args.iter().map(serialize).collect::<Vec<_>>().join(" ")
}

fn paint(level: ConsoleLevel, text: &str) -> String {
    match level.color() {
        Some(color) => format!("{color}{text}{RESET}"),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording() -> (ColoredConsole, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink_lines = lines.clone();
        let console = ColoredConsole::from_fn(move |line| {
            sink_lines.lock().expect("lock").push(line.to_string());
        });
        (console, lines)
    }

    #[test]
    fn each_level_wraps_its_color() {
        let (console, lines) = recording();
        let args = [Dynamic::from("hi")];
        console.log(&args);
        console.info(&args);
        console.warn(&args);
        console.error(&args);
        console.debug(&args);

        let lines = lines.lock().expect("lock");
        assert_eq!(
            *lines,
            vec![
                "hi".to_string(),
                format!("{BLUE}hi{RESET}"),
                format!("{YELLOW}hi{RESET}"),
                format!("{RED}hi{RESET}"),
                format!("{DIM}hi{RESET}"),
            ]
        );
    }

    #[test]
    fn arguments_join_with_single_space() {
        let (console, lines) = recording();
        console.log(&[
            Dynamic::from("count"),
            Dynamic::from(3_i64),
            Dynamic::from_array(vec![Dynamic::from(true)]),
        ]);
        assert_eq!(lines.lock().expect("lock")[0], "count 3 [true]");
    }

    #[test]
    fn no_arguments_still_writes_one_line() {
        let (console, lines) = recording();
        console.warn(&[]);
        assert_eq!(lines.lock().expect("lock").len(), 1);
    }
}
