// Exit codes for the droppy CLI.
//
//   0 = success
//   1 = any failure: bad invocation, kill failure, collaborator error

use std::process;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
}

impl ExitCode {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_result<T>(result: &anyhow::Result<T>) -> Self {
        if result.is_ok() {
            Self::Success
        } else {
            Self::Error
        }
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code())
    }
}
