//! The DAG-JOSE codec stores [JSON Web Signatures][jws] and
//! [JSON Web Encryption][jwe] objects as content-addressable IPLD blocks
//! (multicodec `0x85`).
//!
//! The crate has two sides around one domain model, [`DagJose`]:
//! - a read side, [`JoseNode`], exposing an object as a generic tree [`Node`]
//!   whose map fields always come in the same order; and
//! - a write side, [`DagJoseBuilder`], an [`Assembler`] that rebuilds an
//!   object from generic tree calls and rejects anything that is not a
//!   well-formed JWS or JWE.
//!
//! The [`codec`] module joins the two to CBOR. Encoding always goes through
//! the builder first, so two semantically equal trees produce the same
//! bytes and therefore the same CID.
//!
//! Byte fields hold decoded bytes. Turning the base64url members of the
//! general JSON serialization into those bytes, and back, is left to the
//! caller.
//!
//! [jws]: <https://www.rfc-editor.org/rfc/rfc7515>
//! [jwe]: <https://www.rfc-editor.org/rfc/rfc7516>
//!
//! # Basic Usage
//!
//! ```
//! use dag_jose::{codec, DagJose, Node, Signature};
//!
//! let jose = DagJose::jws(
//!     b"payload".to_vec(),
//!     vec![Signature {
//!         protected: Some(vec![0x01, 0x05, 0xb5, 0x0f]),
//!         ..Signature::new(vec![0xff])
//!     }],
//! );
//!
//! let block = codec::encode_jose(&jose).unwrap();
//! let decoded = codec::decode_jose(&block).unwrap();
//! assert_eq!(decoded, jose);
//!
//! let node = decoded.as_node();
//! let keys: Vec<_> = node.entries().unwrap().map(|(key, _)| key).collect();
//! assert_eq!(keys, ["payload", "signatures"]);
//! ```
pub mod builder;
pub mod cbor;
pub mod codec;
pub mod datamodel;
pub mod error;
pub mod jose;
pub mod view;

pub use builder::{DagJoseBuilder, HeaderAssembler};
pub use codec::{BlockStore, Registry, DAG_JOSE};
pub use datamodel::{copy, Assembler, Kind, Node};
pub use error::Error;
pub use jose::{DagJose, Header, Jwe, Jws, Recipient, Shape, Signature};
pub use view::JoseNode;
