//! Errors raised while turning configuration entries into providers

/// A source, target or strategy entry could not be constructed
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("No provider given for '{0}'")]
    MissingProvider(String),

    #[error("Unknown provider '{kind}' for '{name}'")]
    UnknownProvider { kind: String, name: String },

    #[error("'{0}' has no source or target location")]
    MissingLocation(String),

    #[error("'{name}' is missing the '{key}' setting")]
    MissingSetting { name: String, key: String },
}
