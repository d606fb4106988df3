//! Top-level error type and the three exit codes the application reports
//! (§6: "Exit codes from the application: 0 normal, 1 model load failed,
//! 2 firmware service missing").

use alloc::string::String;

use llmk_firmware::file::FileError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("gguf: {0}")]
    Gguf(#[from] llmk_gguf::GgufError),

    #[error("engine: {0}")]
    Engine(#[from] llmk_engine::EngineError),

    #[error("firmware service unavailable: {0}")]
    Firmware(String),

    #[error("tokenizer: {0}")]
    Tokenizer(String),
}

impl From<FileError> for AppError {
    fn from(e: FileError) -> Self {
        AppError::Firmware(match e {
            FileError::NotFound => "file not found".into(),
            FileError::NotAFile => "not a regular file".into(),
            FileError::Io => "I/O error".into(),
        })
    }
}

impl AppError {
    /// §6 exit code mapping. `Firmware` is the only kind that represents a
    /// missing/broken firmware service rather than a bad model file.
    pub fn exit_code(&self) -> usize {
        match self {
            AppError::Firmware(_) => 2,
            _ => 1,
        }
    }
}
