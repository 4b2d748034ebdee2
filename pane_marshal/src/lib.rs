use std::str::Utf8Error;
use thiserror::*;

pub use crate::codes::*;
pub use crate::memory::*;
pub use crate::table::*;

mod codes;
mod memory;
mod table;

/// An opaque, module-visible integer that identifies a host object.
/// The value `0` is reserved and never refers to a live object.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Handle(u32);

impl Handle {
    /// The reserved handle, which is always absent.
    pub const NULL: Self = Self(0);

    /// Reinterprets the given integer as a handle.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Gets the integer that the module sees for this handle.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether this is the reserved handle.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Handle {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Handle> for u32 {
    fn from(value: Handle) -> Self {
        value.0
    }
}

impl From<Handle> for i32 {
    fn from(value: Handle) -> Self {
        value.0 as i32
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Describes everything that can go wrong while servicing a call made by a module.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Handle {0} does not refer to a live object")]
    InvalidHandle(Handle),
    #[error("Handle {handle} refers to a {found}, but a {expected} was required")]
    KindMismatch {
        handle: Handle,
        expected: &'static str,
        found: &'static str
    },
    #[error("Offset {offset} lies outside linear memory of {len} bytes")]
    InvalidOffset {
        offset: usize,
        len: usize
    },
    #[error("Range of {size} bytes at offset {offset} exceeds linear memory of {len} bytes")]
    OutOfBounds {
        offset: usize,
        size: usize,
        len: usize
    },
    #[error("Text at offset {offset} was not valid UTF-8: {source}")]
    MalformedText {
        offset: usize,
        source: Utf8Error
    },
    #[error("Shader failed to compile: {0}")]
    CompileFailed(String),
    #[error("Program failed to link: {0}")]
    LinkFailed(String),
    #[error("Attribute '{name}' does not exist in program {program}")]
    AttributeNotFound {
        name: String,
        program: Handle
    },
    #[error("Handle {0} refers to an object that failed to build")]
    UnusableObject(Handle),
    #[error("Value {value:#x} is not a valid {kind}")]
    InvalidEnum {
        kind: &'static str,
        value: u32
    },
    #[error("{0}")]
    InvalidArgument(String),
    #[error("No more handles can be allocated")]
    HandleSpaceExhausted,
    #[error("The module does not export a linear memory")]
    MissingMemory,
    #[error("The graphics backend failed: {0}")]
    Host(String),
    #[error("Module raised a fatal error: {0}")]
    Fatal(String)
}

impl BridgeError {
    /// Creates an invalid argument error from the given message.
    pub fn invalid_argument(x: impl std::fmt::Display) -> Self {
        Self::InvalidArgument(x.to_string())
    }

    /// Creates a backend failure from the given message.
    pub fn from_host(x: impl std::fmt::Display) -> Self {
        Self::Host(x.to_string())
    }

    /// Whether this error was raised deliberately by the module rather than
    /// detected by the bridge.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}
