//! Provide-origin capture
//!
//! An [`Origin`] records where a value was provided: the exact call site
//! (via `#[track_caller]`) and, depending on [`CaptureMode`], the call stack
//! at that moment with the carrier's own frames removed.
//!
//! Backtraces are taken with [`std::backtrace::Backtrace`] and parsed from
//! its rendered form on first use, since the frame API is not stable.
//! Symbol resolution depends on debug info being available; without it
//! frames come back with no function name and only the call site is
//! reliable.

use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;
use std::sync::{Arc, OnceLock};

use crate::{CaptureMode, CarrierConfig};

/// Frames whose function path starts with one of these are never reported.
const BUILTIN_INTERNAL: &[&str] = &[
    "std::backtrace",
    "std::backtrace_rs",
    "backtrace::",
    concat!(module_path!(), "::Origin"),
];

/// One entry of a captured call stack
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Frame {
    function: Option<String>,
    file: Option<String>,
    line: Option<u32>,
    column: Option<u32>,
}

impl Frame {
    /// Frame describing a source location with no known function
    pub fn from_location(location: &Location<'_>) -> Self {
        Frame {
            function: None,
            file: Some(location.file().to_string()),
            line: Some(location.line()),
            column: Some(location.column()),
        }
    }

    /// Demangled function path, without the trailing symbol hash
    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn column(&self) -> Option<u32> {
        self.column
    }

    /// Whether this frame's function belongs to one of `prefixes`.
    ///
    /// Generic impl paths render as `<krate::Type<T>>::method` under v0
    /// mangling, so a leading `<` is ignored.
    pub fn is_within(&self, prefixes: &[&str]) -> bool {
        match &self.function {
            Some(name) => {
                let name = name.trim_start_matches('<');
                prefixes.iter().any(|prefix| name.starts_with(prefix))
            }
            None => false,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function.as_deref().unwrap_or("<unknown>"))?;
        if let Some(file) = &self.file {
            write!(f, " at {}", file)?;
            if let Some(line) = self.line {
                write!(f, ":{}", line)?;
                if let Some(column) = self.column {
                    write!(f, ":{}", column)?;
                }
            }
        }
        Ok(())
    }
}

/// Where a value was provided.
///
/// The call site is recorded eagerly. The call stack is captured at provide
/// time but only symbolized and parsed the first time [`Origin::frames`],
/// [`Origin::caller`] or [`Origin::mentions`] is called; clones share that
/// work.
#[derive(Clone)]
pub struct Origin {
    call_site: &'static Location<'static>,
    stack: Arc<Stack>,
}

struct Stack {
    backtrace: Option<Backtrace>,
    internal: &'static [&'static str],
    max_frames: Option<usize>,
    frames: OnceLock<Vec<Frame>>,
}

impl Stack {
    fn resolve(&self, call_site: &'static Location<'static>) -> Vec<Frame> {
        let mut frames = match &self.backtrace {
            Some(backtrace) => {
                let mut frames = parse_backtrace(&backtrace.to_string());
                let skip = frames
                    .iter()
                    .take_while(|frame| {
                        frame.is_within(BUILTIN_INTERNAL) || frame.is_within(self.internal)
                    })
                    .count();
                frames.drain(..skip);
                if let Some(max) = self.max_frames {
                    frames.truncate(max.max(1));
                }
                frames
            }
            None => Vec::new(),
        };

        if frames.is_empty() {
            frames.push(Frame::from_location(call_site));
        }
        frames
    }
}

impl Origin {
    /// Record the current call stack.
    ///
    /// `internal` lists additional function-path prefixes to drop from the
    /// top of the stack (the caller's own wrapper frames). `frames()` is
    /// never empty: when no backtrace is available, or in
    /// [`CaptureMode::CallSite`], it holds a single frame built from
    /// `call_site`.
    #[inline(never)]
    pub fn capture(
        call_site: &'static Location<'static>,
        config: &CarrierConfig,
        internal: &'static [&'static str],
    ) -> Origin {
        let backtrace = match config.capture {
            CaptureMode::Full => Some(Backtrace::force_capture()),
            CaptureMode::CallSite => None,
        };

        Origin {
            call_site,
            stack: Arc::new(Stack {
                backtrace,
                internal,
                max_frames: config.max_frames,
                frames: OnceLock::new(),
            }),
        }
    }

    /// The source location of the `provide` call
    pub fn call_site(&self) -> &'static Location<'static> {
        self.call_site
    }

    /// Captured frames, innermost (the provide caller) first
    pub fn frames(&self) -> &[Frame] {
        self.stack
            .frames
            .get_or_init(|| self.stack.resolve(self.call_site))
    }

    /// The innermost non-internal frame
    pub fn caller(&self) -> Option<&Frame> {
        self.frames().first()
    }

    /// Whether any captured frame's function path contains `needle`
    pub fn mentions(&self, needle: &str) -> bool {
        self.frames()
            .iter()
            .filter_map(Frame::function)
            .any(|function| function.contains(needle))
    }

    fn is_resolved(&self) -> bool {
        self.stack.frames.get().is_some()
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Origin")
            .field("call_site", &self.call_site)
            .field("backtrace", &self.stack.backtrace.is_some())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "provided at {}", self.call_site)?;
        for (index, frame) in self.frames().iter().enumerate() {
            writeln!(f, "{:>4}: {}", index, frame)?;
        }
        Ok(())
    }
}

/// Parse the rendered form of a [`Backtrace`] into frames.
///
/// Accepts both the short style (`N: path::to::fn` followed by
/// `at file:line:col`) and the full style, which adds an instruction
/// address and a `::h<hash>` suffix. Lines that are not frames are ignored.
pub fn parse_backtrace(rendered: &str) -> Vec<Frame> {
    let mut frames: Vec<Frame> = Vec::new();

    for line in rendered.lines() {
        let line = line.trim();
        if line.is_empty()
            || line.starts_with("note:")
            || line == "stack backtrace:"
            || line == "unsupported backtrace"
            || line == "disabled backtrace"
        {
            continue;
        }

        if let Some(location) = line.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                if frame.file.is_none() {
                    apply_location(frame, location);
                }
            }
            continue;
        }

        let symbol = strip_address(strip_index(line));
        frames.push(Frame {
            function: normalize_symbol(symbol),
            ..Frame::default()
        });
    }

    frames
}

fn strip_index(line: &str) -> &str {
    match line.split_once(": ") {
        Some((index, rest)) if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) => {
            rest.trim_start()
        }
        _ => line,
    }
}

fn strip_address(symbol: &str) -> &str {
    if symbol.starts_with("0x") {
        match symbol.split_once(" - ") {
            Some((_, rest)) => rest,
            None => "",
        }
    } else {
        symbol
    }
}

fn normalize_symbol(symbol: &str) -> Option<String> {
    let symbol = symbol.trim();
    if symbol.is_empty() || symbol == "<unknown>" {
        return None;
    }

    // Legacy mangling leaves a `::h0123456789abcdef` disambiguator.
    let symbol = match symbol.rsplit_once("::h") {
        Some((path, hash)) if hash.len() == 16 && hash.bytes().all(|b| b.is_ascii_hexdigit()) => path,
        _ => symbol,
    };

    Some(symbol.to_string())
}

fn apply_location(frame: &mut Frame, location: &str) {
    let mut parts = location.rsplitn(3, ':');
    let last = parts.next();
    let middle = parts.next();
    let rest = parts.next();

    match (rest, middle, last) {
        (Some(file), Some(line), Some(column)) if line.parse::<u32>().is_ok() => {
            frame.file = Some(file.to_string());
            frame.line = line.parse().ok();
            frame.column = column.parse().ok();
        }
        (rest, Some(before), Some(line)) if line.parse::<u32>().is_ok() => {
            let file = match rest {
                Some(rest) => format!("{}:{}", rest, before),
                None => before.to_string(),
            };
            frame.file = Some(file);
            frame.line = line.parse().ok();
        }
        _ => frame.file = Some(location.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SHORT: &str = "   0: my_app::handlers::serve
             at ./src/handlers.rs:42:9
   1: core::ops::function::FnOnce::call_once
             at /rustc/abc/library/core/src/ops/function.rs:250:5
   2: <unknown>
";

    const FULL: &str = "   0:     0x55d0c1a2b3c4 - std::backtrace_rs::backtrace::libunwind::trace::h5a5b8284f2d0c266
                               at /rustc/abc/library/std/src/../../backtrace/src/backtrace/libunwind.rs:116:5
   1:     0x55d0c1a2b3c5 - my_app::main::h0123456789abcdef
                               at ./src/main.rs:7:13
";

    #[test]
    fn test_parse_short_style() {
        let frames = parse_backtrace(SHORT);
        assert_eq!(frames.len(), 3);

        assert_eq!(frames[0].function(), Some("my_app::handlers::serve"));
        assert_eq!(frames[0].file(), Some("./src/handlers.rs"));
        assert_eq!(frames[0].line(), Some(42));
        assert_eq!(frames[0].column(), Some(9));

        assert_eq!(frames[1].function(), Some("core::ops::function::FnOnce::call_once"));
        assert_eq!(frames[2].function(), None);
        assert_eq!(frames[2].file(), None);
    }

    #[test]
    fn test_parse_full_style_strips_address_and_hash() {
        let frames = parse_backtrace(FULL);
        assert_eq!(frames.len(), 2);
        assert_eq!(
            frames[0].function(),
            Some("std::backtrace_rs::backtrace::libunwind::trace")
        );
        assert_eq!(frames[1].function(), Some("my_app::main"));
        assert_eq!(frames[1].line(), Some(7));
    }

    #[test]
    fn test_parse_ignores_non_frame_lines() {
        let frames = parse_backtrace("disabled backtrace");
        assert!(frames.is_empty());

        let frames = parse_backtrace("note: Some details are omitted\n");
        assert!(frames.is_empty());
    }

    #[test]
    fn test_location_without_column() {
        let frames = parse_backtrace("0: a::b\n at C:\\src\\lib.rs:12\n");
        assert_eq!(frames[0].file(), Some("C:\\src\\lib.rs"));
        assert_eq!(frames[0].line(), Some(12));
        assert_eq!(frames[0].column(), None);
    }

    #[test]
    fn test_is_within_ignores_impl_bracket() {
        let frame = Frame {
            function: Some("<threadscope::carrier::Carrier<i32>>::provide".to_string()),
            ..Frame::default()
        };
        assert!(frame.is_within(&["threadscope::carrier::Carrier"]));
        assert!(!frame.is_within(&["threadscope::slots"]));
        assert!(!Frame::default().is_within(&["threadscope"]));
    }

    #[test]
    fn test_call_site_mode_records_single_frame() {
        let call_site = Location::caller();
        let origin = Origin::capture(call_site, &CarrierConfig::call_site_only(), &[]);

        assert_eq!(origin.frames().len(), 1);
        let frame = origin.caller().unwrap();
        assert_eq!(frame.file(), Some(call_site.file()));
        assert_eq!(frame.line(), Some(call_site.line()));
        assert_eq!(origin.call_site(), call_site);
    }

    #[inline(never)]
    fn capture_from_named_function() -> Origin {
        Origin::capture(Location::caller(), &CarrierConfig::default(), &[])
    }

    #[test]
    fn test_full_capture_drops_own_frames() {
        let origin = capture_from_named_function();

        assert!(!origin.frames().is_empty());
        assert!(origin.frames().len() <= 64);
        for frame in origin.frames().iter().take(1) {
            assert!(!frame.is_within(BUILTIN_INTERNAL));
        }
    }

    #[test]
    fn test_full_capture_resolves_on_first_use() {
        let origin = capture_from_named_function();
        let shared = origin.clone();
        assert!(!origin.is_resolved());
        assert_eq!(origin.call_site().file(), file!());
        assert!(!origin.is_resolved());

        let caller = origin.caller().cloned();
        assert!(caller.is_some());
        assert!(shared.is_resolved());
        assert_eq!(shared.caller(), caller.as_ref());
        assert!(format!("{:?}", shared).contains("resolved: true"));
    }

    #[test]
    fn test_max_frames_is_respected() {
        let config = CarrierConfig {
            capture: CaptureMode::Full,
            max_frames: Some(2),
        };
        let origin = Origin::capture(Location::caller(), &config, &[]);
        assert!(!origin.frames().is_empty());
        assert!(origin.frames().len() <= 2);
    }

    #[test]
    fn test_origin_display() {
        let origin = Origin::capture(Location::caller(), &CarrierConfig::call_site_only(), &[]);
        let rendered = origin.to_string();
        assert!(rendered.starts_with("provided at "));
        assert!(rendered.contains(file!()));
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(input in ".{0,512}") {
            let frames = parse_backtrace(&input);
            let lines = input.lines().filter(|l| !l.trim().is_empty()).count();
            prop_assert!(frames.len() <= lines);
        }

        #[test]
        fn prop_hash_suffix_removed(path in "[a-z_]{1,8}(::[a-z_]{1,8}){0,3}", hash in "[0-9a-f]{16}") {
            let rendered = format!("   0: {}::h{}\n", path, hash);
            let frames = parse_backtrace(&rendered);
            prop_assert_eq!(frames.len(), 1);
            prop_assert_eq!(frames[0].function(), Some(path.as_str()));
        }
    }
}
