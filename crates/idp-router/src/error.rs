use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("message body is not a JSON object")]
    InvalidBody,
    #[error("document descriptor is missing an object key")]
    MissingObjectKey,
}
