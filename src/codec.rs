//! DAG-JOSE codec, multicodec `0x85`.
//!
//! Decoding is plain CBOR decoding into whatever [`Assembler`] the caller
//! provides. Encoding first copies the node through [`DagJoseBuilder`], which
//! validates it and fixes the field order, then writes the resulting object
//! as CBOR. Semantically equal trees therefore always encode to the same
//! bytes.
use crate::builder::DagJoseBuilder;
use crate::datamodel::{copy, Assembler, Node};
use crate::jose::DagJose;
use crate::{cbor, Error};
use libipld::Cid;
use std::collections::HashMap;

/// Multicodec code of DAG-JOSE.
pub const DAG_JOSE: u64 = 0x85;

pub type DecodeFn = fn(&mut dyn Assembler, &[u8]) -> Result<(), Error>;

pub type EncodeFn = fn(&dyn Node, &mut Vec<u8>) -> Result<(), Error>;

/// Decodes a DAG-JOSE block into `assembler`.
pub fn decode(assembler: &mut dyn Assembler, bytes: &[u8]) -> Result<(), Error> {
    log::debug!("decoding {} byte DAG-JOSE block", bytes.len());
    cbor::decode(assembler, bytes)
}

/// Encodes any DAG-JOSE conformant node, appending the block to `out`.
pub fn encode(node: &dyn Node, out: &mut Vec<u8>) -> Result<(), Error> {
    let mut builder = DagJoseBuilder::new();
    copy(node, &mut builder)?;
    let jose = builder.build()?;
    encode_jose_into(&jose, out)
}

/// Decodes a DAG-JOSE block into a validated [`DagJose`].
pub fn decode_jose(bytes: &[u8]) -> Result<DagJose, Error> {
    let mut builder = DagJoseBuilder::new();
    decode(&mut builder, bytes)?;
    builder.build()
}

pub fn encode_jose(jose: &DagJose) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    encode(&jose.as_node(), &mut out)?;
    Ok(out)
}

fn encode_jose_into(jose: &DagJose, out: &mut Vec<u8>) -> Result<(), Error> {
    let start = out.len();
    cbor::encode(&jose.as_node(), out)?;
    log::debug!("encoded {} byte DAG-JOSE block", out.len() - start);
    Ok(())
}

/// Table of codecs by multicodec code.
///
/// Nothing is registered globally: the host builds a registry with the
/// codecs it supports and passes it where blocks are read or written.
///
/// ```
/// use dag_jose::codec::{Registry, DAG_JOSE};
///
/// let mut registry = Registry::new();
/// registry.register_dag_jose();
/// assert!(registry.decoder(DAG_JOSE).is_ok());
/// assert!(registry.encoder(0x71).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Registry {
    decoders: HashMap<u64, DecodeFn>,
    encoders: HashMap<u64, EncodeFn>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `decoder` for `code`, returning the one it replaces.
    pub fn register_decoder(&mut self, code: u64, decoder: DecodeFn) -> Option<DecodeFn> {
        self.decoders.insert(code, decoder)
    }

    /// Registers `encoder` for `code`, returning the one it replaces.
    pub fn register_encoder(&mut self, code: u64, encoder: EncodeFn) -> Option<EncodeFn> {
        self.encoders.insert(code, encoder)
    }

    /// Registers [`decode`] and [`encode`] under [`DAG_JOSE`].
    pub fn register_dag_jose(&mut self) {
        self.register_decoder(DAG_JOSE, decode);
        self.register_encoder(DAG_JOSE, encode);
    }

    pub fn decoder(&self, code: u64) -> Result<DecodeFn, Error> {
        log::debug!("looking up decoder {code:#x}");
        self.decoders
            .get(&code)
            .copied()
            .ok_or(Error::UnknownCodec(code))
    }

    pub fn encoder(&self, code: u64) -> Result<EncodeFn, Error> {
        log::debug!("looking up encoder {code:#x}");
        self.encoders
            .get(&code)
            .copied()
            .ok_or(Error::UnknownCodec(code))
    }
}

/// Content-addressed block storage.
///
/// The store owns hashing: `put` returns the CID of the stored block.
pub trait BlockStore {
    /// Returns the block `cid` refers to, or [`Error::BlockNotFound`].
    fn get(&self, cid: &Cid) -> Result<Vec<u8>, Error>;

    /// Stores a block encoded with `codec`.
    fn put(&mut self, codec: u64, block: Vec<u8>) -> Result<Cid, Error>;
}

/// Encodes `jose` and stores it, returning its CID.
pub fn store_jose<S: BlockStore + ?Sized>(store: &mut S, jose: &DagJose) -> Result<Cid, Error> {
    let block = encode_jose(jose)?;
    let cid = store.put(DAG_JOSE, block)?;
    log::debug!("stored DAG-JOSE block {cid}");
    Ok(cid)
}

/// Loads and decodes the DAG-JOSE block `cid` refers to.
///
/// Fails with [`Error::UnexpectedCodec`] if `cid` is not a DAG-JOSE CID.
pub fn load_jose<S: BlockStore + ?Sized>(store: &S, cid: &Cid) -> Result<DagJose, Error> {
    if cid.codec() != DAG_JOSE {
        return Err(Error::UnexpectedCodec(cid.codec()));
    }
    log::debug!("loading DAG-JOSE block {cid}");
    let block = store.get(cid)?;
    decode_jose(&block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::IpldBuilder;
    use crate::jose::Signature;
    use libipld::Ipld;
    use std::collections::BTreeMap;

    fn jws() -> DagJose {
        DagJose::jws(
            vec![1, 2, 3],
            vec![Signature {
                signature: vec![0xff],
                protected: Some(vec![0x3f]),
                header: None,
            }],
        )
    }

    // {"payload": h'010203', "signatures": [{"signature": h'ff', "protected": h'3f'}]}
    const JWS_CBOR: &[u8] = &[
        0xa2, 0x67, b'p', b'a', b'y', b'l', b'o', b'a', b'd', 0x43, 0x01, 0x02, 0x03, 0x6a, b's',
        b'i', b'g', b'n', b'a', b't', b'u', b'r', b'e', b's', 0x81, 0xa2, 0x69, b's', b'i', b'g',
        b'n', b'a', b't', b'u', b'r', b'e', 0x41, 0xff, 0x69, b'p', b'r', b'o', b't', b'e', b'c',
        b't', b'e', b'd', 0x41, 0x3f,
    ];

    #[test]
    fn encodes_in_field_order() {
        assert_eq!(encode_jose(&jws()).unwrap(), JWS_CBOR);
    }

    #[test]
    fn decodes_typed_object() {
        assert_eq!(decode_jose(JWS_CBOR).unwrap(), jws());
    }

    #[test]
    fn decodes_into_generic_tree() {
        let mut builder = IpldBuilder::new();
        decode(&mut builder, JWS_CBOR).unwrap();
        let tree = builder.build().unwrap();
        assert_eq!(
            tree.lookup_by_key("payload").unwrap().as_bytes().unwrap(),
            &[1, 2, 3]
        );
    }

    #[test]
    fn encode_normalizes_generic_trees() {
        // BTreeMap puts "protected" before "signature".
        let mut signature = BTreeMap::new();
        signature.insert("signature".to_owned(), Ipld::Bytes(vec![0xff]));
        signature.insert("protected".to_owned(), Ipld::Bytes(vec![0x3f]));
        let mut map = BTreeMap::new();
        map.insert(
            "signatures".to_owned(),
            Ipld::List(vec![Ipld::Map(signature)]),
        );
        map.insert("payload".to_owned(), Ipld::Bytes(vec![1, 2, 3]));

        let mut out = Vec::new();
        encode(&Ipld::Map(map), &mut out).unwrap();
        assert_eq!(out, JWS_CBOR);
    }

    #[test]
    fn encode_rejects_non_jose_trees() {
        let mut map = BTreeMap::new();
        map.insert("hello".to_owned(), Ipld::Bytes(vec![]));
        let mut out = Vec::new();
        assert!(matches!(
            encode(&Ipld::Map(map), &mut out),
            Err(Error::Schema(_))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn decode_rejects_schema_violations() {
        // {"payload": "x"}
        let bytes = [
            0xa1, 0x67, b'p', b'a', b'y', b'l', b'o', b'a', b'd', 0x61, b'x',
        ];
        assert!(matches!(decode_jose(&bytes), Err(Error::Schema(_))));
        assert!(matches!(decode_jose(&JWS_CBOR[..20]), Err(Error::Decode(_))));
    }

    #[test]
    fn decodes_half_and_single_precision_header_floats() {
        // {"ciphertext": h'01', "unprotected": {"a": f16(1.5), "b": f32(1.5)}}
        let mut bytes = vec![0xa2, 0x6a];
        bytes.extend_from_slice(b"ciphertext");
        bytes.extend_from_slice(&[0x41, 0x01, 0x6b]);
        bytes.extend_from_slice(b"unprotected");
        bytes.extend_from_slice(&[0xa2, 0x61, b'a', 0xf9, 0x3e, 0x00]);
        bytes.extend_from_slice(&[0x61, b'b', 0xfa, 0x3f, 0xc0, 0x00, 0x00]);

        let jose = decode_jose(&bytes).unwrap();
        let unprotected = jose.unprotected.as_ref().unwrap();
        assert_eq!(unprotected["a"], Ipld::Float(1.5));
        assert_eq!(unprotected["b"], Ipld::Float(1.5));
        assert_eq!(jose.ciphertext, Some(vec![0x01]));

        // Re-encoded as 64-bit floats.
        let block = encode_jose(&jose).unwrap();
        assert_ne!(block, bytes);
        assert_eq!(decode_jose(&block).unwrap(), jose);
    }

    #[test]
    fn registry_lookup() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.decoder(DAG_JOSE),
            Err(Error::UnknownCodec(DAG_JOSE))
        ));
        registry.register_dag_jose();

        let mut out = Vec::new();
        registry.encoder(DAG_JOSE).unwrap()(&jws().as_node(), &mut out).unwrap();
        assert_eq!(out, JWS_CBOR);

        let mut builder = DagJoseBuilder::new();
        registry.decoder(DAG_JOSE).unwrap()(&mut builder, &out).unwrap();
        assert_eq!(builder.build().unwrap(), jws());
    }

    struct Blocks(HashMap<Cid, Vec<u8>>);

    impl BlockStore for Blocks {
        fn get(&self, cid: &Cid) -> Result<Vec<u8>, Error> {
            self.0.get(cid).cloned().ok_or(Error::BlockNotFound(*cid))
        }

        fn put(&mut self, codec: u64, block: Vec<u8>) -> Result<Cid, Error> {
            use libipld::multihash::{Code, MultihashDigest};
            let cid = Cid::new_v1(codec, Code::Sha2_256.digest(&block));
            self.0.insert(cid, block);
            Ok(cid)
        }
    }

    #[test]
    fn store_and_load() {
        let mut store = Blocks(HashMap::new());
        let cid = store_jose(&mut store, &jws()).unwrap();
        assert_eq!(cid.codec(), DAG_JOSE);
        assert_eq!(store.0[&cid], JWS_CBOR);
        assert_eq!(load_jose(&store, &cid).unwrap(), jws());

        let raw = Cid::new_v1(0x55, *cid.hash());
        assert!(matches!(
            load_jose(&store, &raw),
            Err(Error::UnexpectedCodec(0x55))
        ));
        let missing = Cid::new_v1(DAG_JOSE, *raw.hash());
        store.0.clear();
        assert!(matches!(
            load_jose(&store, &missing),
            Err(Error::BlockNotFound(_))
        ));
    }
}
