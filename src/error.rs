use miette::Diagnostic;
use thiserror::Error;

/// The one hard-stop failure in the crate. Parsing never errors (malformed
/// input collapses to null data) and opaque-value dispatch degrades to a
/// textual fallback, so serializing an unsafe document is the only operation
/// that refuses to proceed.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum SerializeError {
    #[error("Serialization aborted: the document contains a circular reference")]
    #[diagnostic(
        code(serialize::circular_reference),
        help(
            "A container in the document embeds itself, directly or through nesting. \
             Break the cycle before serializing, or disable the check with \
             `ignore_circular_reference` (rendering a cyclic document does not terminate)."
        )
    )]
    CircularReference,
}
