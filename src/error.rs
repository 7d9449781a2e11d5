use crate::datamodel::Kind;
use libipld::Cid;
use std::convert::Infallible;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Lookup of an absent, unknown or wrong-shape field, or of an index out of range.
    #[error("not found: {0}")]
    NotFound(String),

    /// The node does not have the kind required by the operation.
    #[error("expected {expected} node, found {actual}")]
    WrongKind { expected: Kind, actual: Kind },

    /// An assembler was driven outside of its call grammar.
    ///
    /// This is a defect of the caller, not of the data.
    #[error("assembler misuse: {0}")]
    Misuse(&'static str),

    /// The assembled tree does not conform to the DAG-JOSE schema.
    #[error("schema violation: {0}")]
    Schema(String),

    /// Payload bytes viewed as a link are not a valid CID.
    #[error(transparent)]
    Link(#[from] libipld::cid::Error),

    #[error(transparent)]
    Decode(#[from] minicbor::decode::Error),

    #[error(transparent)]
    Encode(#[from] minicbor::encode::Error<Infallible>),

    /// The CBOR item has no counterpart in the IPLD data model.
    #[error("unsupported CBOR item: {0}")]
    Unsupported(&'static str),

    /// Maps and lists are nested deeper than the given limit.
    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),

    #[error("{0} trailing bytes after CBOR item")]
    TrailingData(usize),

    #[error("integer {0} does not fit in CBOR")]
    IntegerRange(i128),

    #[error("no codec registered for {0:#x}")]
    UnknownCodec(u64),

    #[error("unexpected codec {0:#x}")]
    UnexpectedCodec(u64),

    #[error("block not found: {0}")]
    BlockNotFound(Cid),

    #[error("block store: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub(crate) fn schema(message: impl Into<String>) -> Self {
        let message = message.into();
        log::trace!("rejecting tree: {message}");
        Self::Schema(message)
    }

    pub(crate) fn misuse(message: &'static str) -> Self {
        log::trace!("assembler misuse: {message}");
        Self::Misuse(message)
    }

    pub(crate) fn wrong_kind(expected: Kind, actual: Kind) -> Self {
        Self::WrongKind { expected, actual }
    }
}
