use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, covering every error this library can return.
///
/// Most of the engine never fails: unsupported operations are treated as no-ops and an
/// exhausted step budget is reported through
/// [`WalkOutcome::completed`](crate::analysis::symbolic::WalkOutcome::completed). Errors
/// are reserved for inputs the embedding code got wrong, such as a control flow graph
/// whose branches point at blocks that do not exist.
///
/// # Error Categories
///
/// ## Graph Construction Errors
/// - [`Error::Malformed`] - The control flow graph or operation tree is structurally invalid
/// - [`Error::GraphError`] - Low-level graph storage error (dangling node references)
///
/// ## API Contract Errors
/// - [`Error::InvalidArgument`] - The caller passed a value that violates an API contract
/// - [`Error::NotSupported`] - The requested construct has no lowering
///
/// ## Execution Errors
/// - [`Error::Cancelled`] - A driver run was cancelled before it could start a root
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
///
/// use symscope::{
///     analysis::cfg::ControlFlowGraphBuilder,
///     operation::{OperationTree, SymbolTable},
///     Error,
/// };
///
/// let builder = ControlFlowGraphBuilder::new();
/// match builder.build(Arc::new(OperationTree::new()), Arc::new(SymbolTable::new())) {
///     Err(Error::Malformed { message, .. }) => assert!(message.contains("entry")),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The control flow graph or operation tree is damaged.
    ///
    /// Produced by the graph builders when a branch targets a missing block, a region
    /// is left open, or an operation references an operation outside its tree. The
    /// error includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A value passed to the public API violates its contract.
    ///
    /// These are programming errors in the embedding rule code, for example asking a
    /// [`SymbolicContext`](crate::analysis::symbolic::SymbolicContext) for a symbol of a
    /// different compilation.
    #[error("Invalid argument - {0}")]
    InvalidArgument(String),

    /// The construct cannot be represented.
    #[error("This construct is not supported - {0}")]
    NotSupported(String),

    /// A driver run was cancelled before the root was analyzed.
    #[error("The analysis was cancelled")]
    Cancelled,

    /// Low-level graph storage error.
    #[error("{0}")]
    GraphError(String),
}
