//! Typed error hierarchy for the interpreter core.
//!
//! Every fatal condition named by the error-handling design is a variant here
//! rather than an ad-hoc `String`; callers match on `ZError` instead of
//! parsing messages.

use thiserror::Error;

pub type ZResult<T> = Result<T, ZError>;

#[derive(Debug, Error)]
pub enum ZError {
    #[error("format error: {0}")]
    Format(String),

    #[error("address {addr:#06x} out of range (image length {len:#06x})")]
    Address { addr: u32, len: u32 },

    #[error("write to protected memory at {addr:#06x} (static/high region)")]
    Protection { addr: u32 },

    #[error("illegal instruction: opcode {opcode:#04x} not valid in version {version}")]
    IllegalInstruction { opcode: u8, version: u8 },

    #[error("illegal object number: {0}")]
    IllegalObjectNumber(u16),

    #[error("illegal attribute number: {0}")]
    IllegalAttributeNumber(u16),

    #[error("no such property {prop} on object {obj}")]
    NoSuchProperty { obj: u16, prop: u16 },

    #[error("division by zero")]
    DivisionByZero,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("invalid variable number {0}")]
    InvalidVariable(u16),

    #[error("io error: {0}")]
    Io(String),

    #[error("file error: {0}")]
    FileIo(#[from] std::io::Error),
}

impl ZError {
    pub fn format(msg: impl Into<String>) -> Self {
        ZError::Format(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        ZError::Io(msg.into())
    }
}
