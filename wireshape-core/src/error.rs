//! Error taxonomy and read/write context, shared by every format codec.

use std::fmt;

/// Exhaustive (but growable) classification of everything that can go wrong
/// while writing, reading, or navigating a wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Placeholder used internally; never observed on a returned `Error`.
    None,

    // Structural
    SyntaxError,
    InvalidHeader,
    InvalidBody,
    VersionMismatch,
    InvalidPartialKey,
    UnexpectedEnd,
    ExceededMaxRecursiveDepth,

    // Lookup
    UnknownKey,
    MethodNotFound,
    KeyNotFound,

    // Semantic
    GetWrongType,
    ParseError,
    NoReadInput,

    // Output
    InsufficientOutputBuffer,
    ExceededStaticArraySize,

    // Configuration
    MissingKey,
    FileOpenFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::None => "none",
            ErrorKind::SyntaxError => "syntax_error",
            ErrorKind::InvalidHeader => "invalid_header",
            ErrorKind::InvalidBody => "invalid_body",
            ErrorKind::VersionMismatch => "version_mismatch",
            ErrorKind::InvalidPartialKey => "invalid_partial_key",
            ErrorKind::UnexpectedEnd => "unexpected_end",
            ErrorKind::ExceededMaxRecursiveDepth => "exceeded_max_recursive_depth",
            ErrorKind::UnknownKey => "unknown_key",
            ErrorKind::MethodNotFound => "method_not_found",
            ErrorKind::KeyNotFound => "key_not_found",
            ErrorKind::GetWrongType => "get_wrong_type",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::NoReadInput => "no_read_input",
            ErrorKind::InsufficientOutputBuffer => "insufficient_output_buffer",
            ErrorKind::ExceededStaticArraySize => "exceeded_static_array_size",
            ErrorKind::MissingKey => "missing_key",
            ErrorKind::FileOpenFailure => "file_open_failure",
        };
        f.write_str(s)
    }
}

/// A single failure surfaced to the caller: what went wrong, where in the
/// source buffer it happened (when known), and an optional human message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub byte_index: Option<usize>,
    /// 1-based (line, column), set by text codecs that can recover a
    /// position more useful than a raw byte offset. Takes precedence over
    /// `byte_index` in `Display` when present.
    pub line_col: Option<(u32, u32)>,
    pub message: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            byte_index: None,
            line_col: None,
            message: None,
        }
    }

    pub fn at(kind: ErrorKind, byte_index: usize) -> Self {
        Self {
            kind,
            byte_index: Some(byte_index),
            line_col: None,
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_byte_index(mut self, byte_index: usize) -> Self {
        self.byte_index = Some(byte_index);
        self
    }

    #[must_use]
    pub fn with_line_col(mut self, line: u32, col: u32) -> Self {
        self.line_col = Some((line, col));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line_col, self.byte_index) {
            (Some((line, col)), _) => write!(f, "{line}:{col}: {}", self.kind)?,
            (None, Some(idx)) => write!(f, "byte {idx}: {}", self.kind)?,
            (None, None) => write!(f, "{}", self.kind)?,
        }
        if let Some(msg) = &self.message {
            write!(f, " [ {msg} ]")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

/// Per-call scratch threaded through nested encode/decode calls.
///
/// Rust propagates the first error via `?` rather than an imperative
/// `ctx.error` side channel, so the only state this still needs to carry
/// is the recursion-depth guard.
pub struct Context {
    depth: u32,
    max_depth: u32,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Context {
    pub fn new(max_depth: u32) -> Self {
        Self { depth: 0, max_depth }
    }

    /// Enter one more level of nesting, returning an error if the
    /// configured maximum has been exceeded.
    pub fn enter(&mut self) -> Result<DepthGuard<'_>, Error> {
        if self.depth >= self.max_depth {
            return Err(Error::new(ErrorKind::ExceededMaxRecursiveDepth));
        }
        self.depth += 1;
        Ok(DepthGuard { ctx: self })
    }

    /// Non-RAII equivalent of [`Context::enter`], for call sites that need
    /// to keep using `ctx` for other `&mut` borrows afterward. Must be
    /// paired with exactly one [`Context::leave`] call on every exit path.
    pub(crate) fn check_depth(&mut self) -> Result<(), Error> {
        if self.depth >= self.max_depth {
            return Err(Error::new(ErrorKind::ExceededMaxRecursiveDepth));
        }
        self.depth += 1;
        Ok(())
    }

    /// Pairs with [`Context::check_depth`].
    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }
}

/// RAII guard decrementing `Context::depth` on drop, so every early return
/// via `?` inside a nested call still unwinds the depth counter correctly.
pub struct DepthGuard<'a> {
    ctx: &'a mut Context,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.ctx.depth -= 1;
    }
}
