use thiserror::Error;

/// Error values returned by the conversion pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error("scene root object {0} does not exist")]
    MissingRoot(u64),

    #[error("invalid option `{name}`: {reason}")]
    InvalidOption {
        name: &'static str,
        reason: String,
    },

    /// Returned when welding produced an index the 16-bit index buffer cannot hold.
    #[error("mesh part {part} needs vertex index {index}, above the 16-bit index space")]
    IndexOverflow { part: String, index: usize },
}
