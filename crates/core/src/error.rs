#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid value for {key}: {message}")]
    InvalidSetting { key: &'static str, message: String },
}
