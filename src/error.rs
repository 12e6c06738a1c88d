use std::env;
use std::fmt::Debug;

// Codes 1..=99 are infrastructure failures, 100 and up are domain
// rejections that leave the snapshot untouched.
#[derive(Debug)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

impl Error {
    pub fn is_not_found_error(&self) -> bool {
        self.code == 100
    }

    pub fn is_precondition_failed_error(&self) -> bool {
        self.code == 101
    }

    pub fn is_rejection(&self) -> bool {
        self.code >= 100
    }
}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        env_var_error(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        io_error(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        encoding_error(err)
    }
}

pub fn not_found_error() -> Error {
    Error {
        code: 100,
        message: "not found".into(),
    }
}

pub fn precondition_failed_error() -> Error {
    Error {
        code: 101,
        message: "precondition failed".into(),
    }
}

pub fn env_var_error(_: env::VarError) -> Error {
    Error {
        code: 1,
        message: "environment variable error".into(),
    }
}

pub fn io_error<T: Debug>(_: T) -> Error {
    Error {
        code: 2,
        message: "io error".into(),
    }
}

pub fn encoding_error<T: Debug>(_: T) -> Error {
    Error {
        code: 3,
        message: "encoding error".into(),
    }
}

pub fn invalid_config_error(message: &str) -> Error {
    Error {
        code: 4,
        message: format!("invalid config: {}", message),
    }
}
