use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserPoolError {
    #[error(transparent)]
    Browserless(#[from] browserless_client::BrowserlessError),

    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, BrowserPoolError>;
