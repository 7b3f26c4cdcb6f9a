//! Call stack frame descriptors
//!
//! Frames are produced fresh for each guarded call and never persisted. Paths are
//! kept in the same normalized form as allowed paths so they compare textually.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::Location;

/// Path recorded for frames whose source file is not known
pub const UNKNOWN_PATH: &str = "<unknown>";

/// One frame of a call stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStackFrame {
    /// Source file, normalized
    pub path: String,
    /// Line within `path`, when known
    pub line: Option<u32>,
    /// Demangled function name, when known
    pub function: Option<String>,
}

impl CallStackFrame {
    pub fn new(path: impl AsRef<str>) -> Self {
        Self {
            path: normalize_path(path.as_ref()),
            line: None,
            function: None,
        }
    }

    /// Frame for a frame with no source information
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_PATH)
    }

    /// Frame for a `#[track_caller]` call-site token
    pub fn from_location(location: &Location<'_>) -> Self {
        Self::new(location.file()).with_line(location.line())
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    pub fn is_unknown(&self) -> bool {
        self.path == UNKNOWN_PATH
    }
}

impl fmt::Display for CallStackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
        }
        if let Some(function) = &self.function {
            write!(f, " in {}", function)?;
        }
        Ok(())
    }
}

/// Normalize a source path for comparison.
///
/// Backslashes become forward slashes and a leading `./` is dropped, so
/// `.\src\lib.rs`, `./src/lib.rs` and `src/lib.rs` are the same path.
pub fn normalize_path(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let mut path = path.as_str();
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    path.to_string()
}

/// Ordered call trace, innermost (the caller) first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTrace {
    frames: Vec<CallStackFrame>,
}

impl CallTrace {
    pub fn new(frames: Vec<CallStackFrame>) -> Self {
        Self { frames }
    }

    /// Trace rooted at `caller`, followed by its ancestors.
    ///
    /// A leading ancestor describing the same file as `caller` is the caller's own
    /// backtrace frame; its function name is folded into `caller` instead of
    /// being listed twice.
    pub fn rooted_at(mut caller: CallStackFrame, ancestors: Vec<CallStackFrame>) -> Self {
        let mut ancestors = ancestors.into_iter().peekable();
        if let Some(first) = ancestors.peek() {
            if first.path == caller.path {
                if caller.function.is_none() {
                    caller.function = first.function.clone();
                }
                ancestors.next();
            }
        }

        let mut frames = vec![caller];
        frames.extend(ancestors);
        Self { frames }
    }

    /// The violating caller
    pub fn caller(&self) -> Option<&CallStackFrame> {
        self.frames.first()
    }

    pub fn frames(&self) -> &[CallStackFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl fmt::Display for CallTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, frame) in self.frames.iter().enumerate() {
            writeln!(f, "{:>4}: {}", index, frame)?;
        }
        Ok(())
    }
}
