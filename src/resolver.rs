//! Caller Resolution
//!
//! Resolves ancestor frames of a guarded call. The immediate caller of a guarded
//! operation comes from its `#[track_caller]` call-site token; resolvers supply
//! the wider window used for debugger detection and violation traces.

use crate::frame::CallStackFrame;
use regex::Regex;
use std::backtrace::Backtrace;
use std::fmt;
use std::sync::OnceLock;

/// Source of ancestor frames
///
/// `skip = 0` is the first frame outside the enforcement machinery, i.e. the
/// caller of the guarded operation. Implementations never fail: a shallow or
/// unavailable stack yields fewer frames, possibly none.
pub trait CallerResolver: Send + Sync + fmt::Debug {
    /// Up to `count` frames, starting `skip` levels above the caller
    fn frames_in_window(&self, skip: usize, count: usize) -> Vec<CallStackFrame>;

    /// The single frame `skip` levels above the caller
    fn frame_at(&self, skip: usize) -> Option<CallStackFrame> {
        self.frames_in_window(skip, 1).into_iter().next()
    }
}

/// Resolver backed by `std::backtrace::Backtrace`
///
/// Captures unconditionally, ignoring `RUST_BACKTRACE`. Builds without debug
/// info produce frames with unknown paths, or none at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct BacktraceResolver;

impl BacktraceResolver {
    pub fn new() -> Self {
        Self
    }
}

impl CallerResolver for BacktraceResolver {
    fn frames_in_window(&self, skip: usize, count: usize) -> Vec<CallStackFrame> {
        if count == 0 {
            return Vec::new();
        }
        let rendered = Backtrace::force_capture().to_string();
        strip_machinery(parse_backtrace(&rendered))
            .into_iter()
            .skip(skip)
            .take(count)
            .collect()
    }
}

/// Resolver returning a fixed, synthetic stack
#[derive(Debug, Default, Clone)]
pub struct FixedResolver {
    frames: Vec<CallStackFrame>,
}

impl FixedResolver {
    pub fn new(frames: Vec<CallStackFrame>) -> Self {
        Self { frames }
    }
}

impl CallerResolver for FixedResolver {
    fn frames_in_window(&self, skip: usize, count: usize) -> Vec<CallStackFrame> {
        self.frames.iter().skip(skip).take(count).cloned().collect()
    }
}

fn frame_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*\d+:\s+(?P<function>.+?)\s*$").expect("frame line pattern is valid")
    })
}

fn location_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*at\s+(?P<path>.+?):(?P<line>\d+)(?::\d+)?\s*$")
            .expect("location line pattern is valid")
    })
}

/// Parse the rendering of a captured `std::backtrace::Backtrace`.
///
/// Each frame is a numbered function line, optionally followed by an
/// `at path:line:column` line. Anything else (disabled or unsupported
/// backtraces, "note:" lines) is ignored.
pub fn parse_backtrace(rendered: &str) -> Vec<CallStackFrame> {
    let mut frames: Vec<CallStackFrame> = Vec::new();

    for line in rendered.lines() {
        if let Some(captures) = location_line_pattern().captures(line) {
            if let Some(frame) = frames.last_mut() {
                if frame.is_unknown() {
                    let function = frame.function.take();
                    let mut located = CallStackFrame::new(&captures["path"]);
                    located.line = captures["line"].parse().ok();
                    located.function = function;
                    *frame = located;
                }
            }
            continue;
        }

        if let Some(captures) = frame_line_pattern().captures(line) {
            let function = &captures["function"];
            let mut frame = CallStackFrame::unknown();
            if function != "<unknown>" && !function.starts_with("0x") {
                frame.function = Some(function.to_string());
            }
            frames.push(frame);
        }
    }

    frames
}

const CAPTURE_PREFIXES: &[&str] = &["std::backtrace", "backtrace::"];

const SHIM_PREFIXES: &[&str] = &[
    "core::ops::function::",
    "alloc::boxed::",
    "__rust_begin_short_backtrace",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    /// Backtrace capture or this crate's enforcement code
    Machinery,
    /// Call shims and unresolved frames, which may also host an inlined caller
    Shim,
    Caller,
}

/// Test modules of this crate count as callers.
fn frame_kind(frame: &CallStackFrame) -> FrameKind {
    let function = match &frame.function {
        Some(function) => function.trim_start_matches('<'),
        None => return FrameKind::Shim,
    };

    let own_prefix = concat!(env!("CARGO_CRATE_NAME"), "::");
    if CAPTURE_PREFIXES.iter().any(|prefix| function.starts_with(prefix))
        || (function.starts_with(own_prefix) && !function.contains("::tests::"))
    {
        FrameKind::Machinery
    } else if SHIM_PREFIXES.iter().any(|prefix| function.starts_with(prefix)) {
        FrameKind::Shim
    } else {
        FrameKind::Caller
    }
}

/// Drop the frames above the guarded operation's caller.
///
/// Everything up to the last machinery frame of the leading run goes. Shims
/// after that frame are kept: in optimized builds the caller may be inlined
/// into one.
fn strip_machinery(frames: Vec<CallStackFrame>) -> Vec<CallStackFrame> {
    let mut start = 0;
    for (index, frame) in frames.iter().enumerate() {
        match frame_kind(frame) {
            FrameKind::Machinery => start = index + 1,
            FrameKind::Shim => {}
            FrameKind::Caller => break,
        }
    }
    frames.into_iter().skip(start).collect()
}
