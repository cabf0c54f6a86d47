use thiserror::Error;

/// The error type for `cspdarknet-burn` operations.
///
/// Every variant is raised while the backbone is being constructed; a built
/// `CspDarknet` has no failure modes of its own.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DarknetError {
    /// A convolution block was configured without a name.
    #[error("Layer name is required for {layer}")]
    MissingLayerName {
        /// Description of the unnamed layer.
        layer: String,
    },

    /// A branch index does not address any of the produced branches.
    #[error("Branch index {index} is out of range for {len} branches")]
    BranchIndexOutOfRange {
        /// The requested index, possibly negative.
        index: isize,
        /// Number of branches available for selection.
        len: usize,
    },

    /// The branch selection is empty, so there is nothing to concatenate.
    #[error("Branch selection for {block} is empty")]
    EmptyBranchSelection {
        /// Name of the aggregation block.
        block: String,
    },

    /// Two learnable layers ended up with the same name.
    #[error("Duplicate layer name: {name}")]
    DuplicateLayerName {
        /// The colliding name.
        name: String,
    },

    /// Configuration parameters are logically inconsistent.
    #[error("Invalid model configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// The input spatial size cannot flow through every stage.
    #[error("Invalid input tensor shape: expected {expected}, got {actual}")]
    InvalidInputShape {
        /// The expected shape.
        expected: String,
        /// The actual shape.
        actual: String,
    },

    /// Loading pretrained weights failed.
    #[error("Failed to load weights: {reason}")]
    WeightLoadingFailed {
        /// The reason for the weight loading failure.
        reason: String,
    },
}

/// A specialized `Result` type for `cspdarknet-burn` operations.
pub type DarknetResult<T> = Result<T, DarknetError>;
