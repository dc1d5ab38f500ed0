use thiserror::Error;

#[derive(Error, Debug)]
pub enum PiperError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка uinput: {0}")]
    Uinput(#[from] uinput::Error),

    #[error("Ошибка сериализации: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Недостаточно прав доступа: {0}")]
    Permission(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl PiperError {
    pub fn internal(msg: impl Into<String>) -> Self {
        PiperError::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PiperError>;
