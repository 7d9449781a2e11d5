use dag_jose::codec::{self, BlockStore, Registry, DAG_JOSE};
use dag_jose::datamodel::{IpldBuilder, MAX_DEPTH};
use dag_jose::{cbor, DagJose, Error, Kind, Node};
use libipld::multihash::{Code, MultihashDigest};
use libipld::{Cid, Ipld};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

const BYTE_FIELDS: &[&str] = &[
    "payload",
    "protected",
    "signature",
    "iv",
    "aad",
    "ciphertext",
    "tag",
    "encrypted_key",
];

const HEADER_FIELDS: &[&str] = &["header", "unprotected"];

#[derive(Deserialize)]
struct Vectors {
    valid: Vec<Vector>,
    invalid: Vec<Vector>,
}

#[derive(Deserialize)]
struct Vector {
    comment: String,
    jose: Value,
}

fn vectors() -> Vectors {
    serde_json::from_str(include_str!("dag-jose-vectors.json")).unwrap()
}

fn b64(s: &str) -> Vec<u8> {
    base64::decode_config(s, base64::URL_SAFE_NO_PAD).unwrap()
}

/// Plain JSON to IPLD.
fn json_to_ipld(value: &Value) -> Ipld {
    match value {
        Value::Null => Ipld::Null,
        Value::Bool(b) => Ipld::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ipld::Integer(i.into())
            } else if let Some(u) = n.as_u64() {
                Ipld::Integer(u.into())
            } else {
                Ipld::Float(n.as_f64().unwrap())
            }
        }
        Value::String(s) => Ipld::String(s.clone()),
        Value::Array(items) => Ipld::List(items.iter().map(json_to_ipld).collect()),
        Value::Object(map) => Ipld::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_ipld(v)))
                .collect(),
        ),
    }
}

/// General JSON serialization to a generic tree, with base64url members
/// decoded to bytes.
fn to_tree(value: &Value) -> Ipld {
    match value {
        Value::Object(map) => Ipld::Map(
            map.iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) if BYTE_FIELDS.contains(&k.as_str()) => {
                            Ipld::Bytes(b64(s))
                        }
                        v if HEADER_FIELDS.contains(&k.as_str()) => json_to_ipld(v),
                        v => to_tree(v),
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Ipld::List(items.iter().map(to_tree).collect()),
        other => json_to_ipld(other),
    }
}

fn raw_cbor(tree: &Ipld) -> Vec<u8> {
    let mut out = Vec::new();
    cbor::encode(tree, &mut out).unwrap();
    out
}

#[test]
fn signature_bytes_are_decoded() {
    let vectors = vectors();
    let tree = to_tree(&vectors.valid[0].jose);
    let jose = DagJose::from_node(&tree).unwrap();

    let jws = jose.as_jws().unwrap();
    assert_eq!(jws.signatures.len(), 1);
    assert_eq!(jws.signatures[0].protected, Some(b64("AQW1Dw")));
    assert_eq!(jws.signatures[0].protected, Some(vec![0x01, 0x05, 0xb5, 0x0f]));
    assert_eq!(jws.signatures[0].signature, b64("_w"));
    assert_eq!(jws.signatures[0].signature, vec![0xff]);
    assert_eq!(jws.signatures[0].header, None);

    let block = codec::encode_jose(&jose).unwrap();
    let decoded = codec::decode_jose(&block).unwrap();
    assert_eq!(decoded, jose);
    assert_eq!(codec::encode_jose(&decoded).unwrap(), block);
}

#[test]
fn payload_is_viewable_as_link() {
    let vectors = vectors();
    let jose = DagJose::from_node(&to_tree(&vectors.valid[0].jose)).unwrap();
    let node = jose.as_node();

    let link = node.lookup_by_key("link").unwrap();
    assert_eq!(link.kind(), Kind::Link);
    let cid = link.as_link().unwrap();
    assert_eq!(cid, jose.payload_link().unwrap());
    assert_eq!(cid.codec(), 0x55);
    assert_eq!(
        node.lookup_by_key("payload").unwrap().as_bytes().unwrap(),
        cid.to_bytes().as_slice()
    );
}

#[test]
fn valid_vectors_round_trip() {
    for vector in vectors().valid {
        let tree = to_tree(&vector.jose);
        let jose = match DagJose::from_node(&tree) {
            Ok(jose) => jose,
            Err(e) => panic!("{}: {}", vector.comment, e),
        };

        let block = codec::encode_jose(&jose).unwrap();
        assert_eq!(codec::decode_jose(&block).unwrap(), jose, "{}", vector.comment);

        // Any tree with the same content encodes to the same block.
        let mut from_tree = Vec::new();
        codec::encode(&tree, &mut from_tree).unwrap();
        assert_eq!(from_tree, block, "{}", vector.comment);

        let mut generic = IpldBuilder::new();
        codec::decode(&mut generic, &block).unwrap();
        let mut reencoded = Vec::new();
        codec::encode(&generic.build().unwrap(), &mut reencoded).unwrap();
        assert_eq!(reencoded, block, "{}", vector.comment);
    }
}

#[test]
fn key_order_does_not_change_the_block() {
    let vectors = vectors();
    let tree = to_tree(&vectors.valid[1].jose);
    // Sorted keys put `protected` before `signature`.
    let unordered = raw_cbor(&tree);
    let jose = codec::decode_jose(&unordered).unwrap();
    let block = codec::encode_jose(&jose).unwrap();
    assert_ne!(unordered, block);

    let mut normalized = Vec::new();
    let mut generic = IpldBuilder::new();
    codec::decode(&mut generic, &unordered).unwrap();
    codec::encode(&generic.build().unwrap(), &mut normalized).unwrap();
    assert_eq!(normalized, block);

    let mut prefix = vec![0xa2, 0x67];
    prefix.extend_from_slice(b"payload");
    assert!(block.starts_with(&prefix));
}

#[test]
fn nested_headers_survive() {
    let vectors = vectors();
    let jose = DagJose::from_node(&to_tree(&vectors.valid[1].jose)).unwrap();
    let signatures = jose.signatures.as_ref().unwrap();
    assert_eq!(signatures.len(), 7);

    let header = signatures[1].header.as_ref().unwrap();
    assert_eq!(header["x"], Ipld::Integer(-34913));
    assert_eq!(header["q"], Ipld::Null);
    assert_eq!(header["flag"], Ipld::Bool(true));
    let list = match &header[""] {
        Ipld::List(list) => list,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(list.len(), 4);
    let inner = match &list[2] {
        Ipld::List(inner) => inner,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(inner[4], Ipld::Float(-0.14566001789073013));
    match &inner[2] {
        Ipld::Map(map) => {
            assert_eq!(map["n"], Ipld::Integer(-2844));
            assert_eq!(map["f"], Ipld::Float(-1.0452552527236051e-299));
        }
        other => panic!("unexpected {:?}", other),
    }

    let decoded = codec::decode_jose(&codec::encode_jose(&jose).unwrap()).unwrap();
    assert_eq!(decoded.signatures.unwrap()[1].header.as_ref(), Some(header));
}

#[test]
fn jwe_fields_in_order() {
    let vectors = vectors();
    let jose = DagJose::from_node(&to_tree(&vectors.valid[2].jose)).unwrap();
    let keys: Vec<_> = jose
        .as_node()
        .entries()
        .unwrap()
        .map(|(key, _)| key.to_owned())
        .collect();
    assert_eq!(
        keys,
        [
            "protected",
            "unprotected",
            "iv",
            "aad",
            "ciphertext",
            "tag",
            "recipients"
        ]
    );

    let jwe = jose.as_jwe().unwrap();
    assert_eq!(jwe.protected, Some(&b"{\"enc\":\"A256GCM\"}"[..]));
    assert_eq!(jwe.ciphertext, b64("KGh5RHhFCBUP").as_slice());
    assert_eq!(jwe.recipients.len(), 2);
    assert_eq!(jwe.recipients[0].encrypted_key, Some(b64("5vbBr8vDvMXVxe7Q4CQ")));
    assert_eq!(jwe.recipients[1].encrypted_key, None);
    assert_eq!(
        jwe.unprotected.unwrap()["typ"],
        Ipld::String("JWE".to_owned())
    );
    assert!(jose.as_jws().is_none());

    let node = jose.as_node();
    let recipients = node.lookup_by_key("recipients").unwrap();
    let first = recipients.lookup_by_index(0).unwrap();
    let keys: Vec<_> = first.entries().unwrap().map(|(key, _)| key).collect();
    assert_eq!(keys, ["header", "encrypted_key"]);
    assert!(matches!(
        recipients.lookup_by_index(2),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn invalid_vectors_are_rejected() {
    for vector in vectors().invalid {
        let tree = to_tree(&vector.jose);
        assert!(
            matches!(DagJose::from_node(&tree), Err(Error::Schema(_))),
            "{}",
            vector.comment
        );

        let mut out = Vec::new();
        assert!(
            matches!(codec::encode(&tree, &mut out), Err(Error::Schema(_))),
            "{}",
            vector.comment
        );
        assert!(out.is_empty());

        assert!(
            matches!(codec::decode_jose(&raw_cbor(&tree)), Err(Error::Schema(_))),
            "{}",
            vector.comment
        );
    }
}

/// `{"unprotected": {"a": [[...0...]]}, "ciphertext": h'01'}` with `lists`
/// nested arrays.
fn deep_header_block(lists: usize) -> Vec<u8> {
    let mut block = vec![0xa2, 0x6b];
    block.extend_from_slice(b"unprotected");
    block.extend_from_slice(&[0xa1, 0x61, b'a']);
    block.extend(std::iter::repeat(0x81).take(lists));
    block.extend_from_slice(&[0x00, 0x6a]);
    block.extend_from_slice(b"ciphertext");
    block.extend_from_slice(&[0x41, 0x01]);
    block
}

fn deep_header_jose(lists: usize) -> DagJose {
    let value = (0..lists).fold(Ipld::Integer(0), |inner, _| Ipld::List(vec![inner]));
    let mut unprotected = BTreeMap::new();
    unprotected.insert("a".to_owned(), value);
    DagJose {
        ciphertext: Some(vec![0x01]),
        unprotected: Some(unprotected),
        ..DagJose::default()
    }
}

#[test]
fn deep_headers_are_rejected_not_fatal() {
    // The object and the header count as two levels.
    let fits = MAX_DEPTH - 2;

    let block = deep_header_block(fits);
    let jose = codec::decode_jose(&block).unwrap();
    assert_eq!(jose, deep_header_jose(fits));
    assert_eq!(codec::encode_jose(&jose).unwrap(), block);
    assert!(codec::decode_jose(&deep_header_block(fits - 1)).is_ok());

    for lists in [fits + 1, 500] {
        assert!(matches!(
            codec::decode_jose(&deep_header_block(lists)),
            Err(Error::TooDeep(MAX_DEPTH))
        ));
    }

    for lists in [fits + 1, 2_000] {
        let jose = deep_header_jose(lists);
        assert!(matches!(
            codec::encode_jose(&jose),
            Err(Error::TooDeep(MAX_DEPTH))
        ));
        let mut out = Vec::new();
        assert!(matches!(
            codec::encode(&jose.as_node(), &mut out),
            Err(Error::TooDeep(MAX_DEPTH))
        ));
        assert!(out.is_empty());
    }
}

#[test]
fn registry_drives_the_codec() {
    let mut registry = Registry::new();
    registry.register_dag_jose();
    assert!(matches!(
        registry.decoder(0x71),
        Err(Error::UnknownCodec(0x71))
    ));

    let vectors = vectors();
    let tree = to_tree(&vectors.valid[0].jose);
    let mut block = Vec::new();
    registry.encoder(DAG_JOSE).unwrap()(&tree, &mut block).unwrap();

    let mut generic = IpldBuilder::new();
    registry.decoder(DAG_JOSE).unwrap()(&mut generic, &block).unwrap();
    assert_eq!(generic.build().unwrap(), tree);
}

#[derive(Default)]
struct MemoryStore {
    blocks: HashMap<Cid, Vec<u8>>,
}

impl BlockStore for MemoryStore {
    fn get(&self, cid: &Cid) -> Result<Vec<u8>, Error> {
        self.blocks
            .get(cid)
            .cloned()
            .ok_or(Error::BlockNotFound(*cid))
    }

    fn put(&mut self, codec: u64, block: Vec<u8>) -> Result<Cid, Error> {
        let cid = Cid::new_v1(codec, Code::Sha2_256.digest(&block));
        self.blocks.insert(cid, block);
        Ok(cid)
    }
}

#[test]
fn store_and_load_blocks() {
    let mut store = MemoryStore::default();
    let mut cids = Vec::new();
    for vector in vectors().valid {
        let jose = DagJose::from_node(&to_tree(&vector.jose)).unwrap();
        let cid = codec::store_jose(&mut store, &jose).unwrap();
        assert_eq!(cid.codec(), DAG_JOSE);
        assert_eq!(codec::load_jose(&store, &cid).unwrap(), jose);
        cids.push(cid);
    }
    cids.dedup();
    assert_eq!(cids.len(), 4);

    // Storing the same object twice yields the same CID.
    let jose = DagJose::from_node(&to_tree(&vectors().valid[3].jose)).unwrap();
    assert_eq!(codec::store_jose(&mut store, &jose).unwrap(), cids[3]);
}
