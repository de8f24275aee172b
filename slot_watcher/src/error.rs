use shared::error::{FetchError, InitializationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("missing SMTP setting `{0}`")]
    MissingSetting(&'static str),
    #[error("no notification recipients configured")]
    NoRecipients,
    #[error("invalid email address {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },
    #[error("failed to build email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error(transparent)]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("no valid locations configured")]
    NoLocations,
}

#[derive(Debug, Error)]
pub enum MainError {
    #[error(transparent)]
    Init(#[from] InitializationError),
    #[error("failed to set up availability client: {0}")]
    Client(#[from] FetchError),
    #[error("failed to set up email notifier: {0}")]
    Notifier(#[from] NotifyError),
    #[error(transparent)]
    Cycle(#[from] CycleError),
}
