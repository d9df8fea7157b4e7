use thiserror::Error;

/// Failures reported by the paging subsystem.
///
/// Every variant maps to a distinct nonzero dispatcher status through [`MemError::status`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemError {
    #[error("out of memory: no free region and the area could not grow")]
    OutOfMemory,
    #[error("region handle {0} is outside the symbol table")]
    InvalidHandle(usize),
    #[error("region handle {0} is still in use")]
    HandleInUse(usize),
    #[error("invalid access: {0}")]
    InvalidAccess(String),
    #[error("physical device has no free frame")]
    FrameExhausted,
    #[error("page fault on page {0} could not be resolved")]
    FaultFailure(usize),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("value {value} does not fit the {field} field of a page table entry")]
    EncodingOverflow { field: &'static str, value: usize },
    #[error("bad syscall frame: {0}")]
    BadSyscall(String),
}

pub type MemResult<T> = Result<T, MemError>;

impl MemError {
    /// Status code handed back to the instruction dispatcher. Success is `0`.
    pub fn status(&self) -> i32 {
        match self {
            MemError::OutOfMemory => 1,
            MemError::InvalidHandle(_) => 2,
            MemError::HandleInUse(_) => 3,
            MemError::InvalidAccess(_) => 4,
            MemError::FrameExhausted => 5,
            MemError::FaultFailure(_) => 6,
            MemError::InvalidConfig(_) => 7,
            MemError::EncodingOverflow { .. } => 8,
            MemError::BadSyscall(_) => 9,
        }
    }

    pub(crate) fn access(msg: impl Into<String>) -> Self {
        MemError::InvalidAccess(msg.into())
    }
}

/// Collapse an operation result into the dispatcher's 0/nonzero convention.
pub fn status_code<T>(result: &MemResult<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.status(),
    }
}
