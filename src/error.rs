use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the simulator
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("Failed to load assembly program: {0}")]
    ParseError(#[from] ParseError),

    #[error("Invalid configuration: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors related to parsing an assembly source file
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("{path}:{line}: unknown mnemonic '{token}'")]
    UnknownMnemonic { path: PathBuf, line: usize, token: String },

    #[error("{path}:{line}: malformed operand '{token}' for {mnemonic}")]
    MalformedOperand { path: PathBuf, line: usize, mnemonic: String, token: String },

    #[error("{path}:{line}: reference to undefined label '{label}'")]
    UndefinedLabel { path: PathBuf, line: usize, label: String },

    #[error("{path}: expected at least one instruction")]
    EmptyProgram { path: PathBuf },
}

/// Errors related to simulator configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "no functional unit is configured to execute opcode {opcode:?}; call init_exec_unit before run"
    )]
    NoFunctionalUnit { opcode: crate::instruction::Opcode },
}

/// Type alias for Result with SimulatorError
pub type SimulatorResult<T> = Result<T, SimulatorError>;
