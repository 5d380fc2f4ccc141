use thiserror::Error;

/// Errors raised while parsing data-model values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("unknown {kind} label: {label}")]
    UnknownLabel { kind: &'static str, label: String },
}
