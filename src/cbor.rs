//! CBOR encoding of the generic data model.
//!
//! [`decode`] drives any [`Assembler`] from CBOR bytes and [`encode`] writes
//! any [`Node`] as CBOR. Neither knows about DAG-JOSE. Only the subset of
//! CBOR that maps onto the IPLD data model is accepted: definite lengths,
//! string map keys and tag 42 for links. Map entries are written in the
//! node's own order, so the node decides what is canonical.
use crate::datamodel::{check_depth, Assembler, Kind, Node};
use crate::Error;
use libipld::Cid;
use minicbor::data::{Int, Tag, Type};
use minicbor::{Decoder, Encoder};
use std::convert::TryFrom;

/// CBOR tag of a CID.
pub const CID_TAG: u64 = 42;

/// Decodes a single CBOR item from `bytes` into `assembler`.
///
/// The whole input must be consumed. Items nested in more than
/// [`MAX_DEPTH`](crate::datamodel::MAX_DEPTH) maps and lists fail with
/// [`Error::TooDeep`].
pub fn decode(assembler: &mut dyn Assembler, bytes: &[u8]) -> Result<(), Error> {
    let mut decoder = Decoder::new(bytes);
    decode_item(&mut decoder, assembler, 0)?;
    match bytes.len() - decoder.position() {
        0 => Ok(()),
        rest => Err(Error::TrailingData(rest)),
    }
}

fn decode_item(
    d: &mut Decoder<'_>,
    a: &mut dyn Assembler,
    depth: usize,
) -> Result<(), Error> {
    match d.datatype()? {
        Type::Null => {
            d.null()?;
            a.assign_null()
        }
        Type::Bool => a.assign_bool(d.bool()?),
        Type::U8 | Type::U16 | Type::U32 | Type::U64 => a.assign_int(i128::from(d.u64()?)),
        Type::I8 | Type::I16 | Type::I32 | Type::I64 => a.assign_int(i128::from(d.i64()?)),
        Type::Int => a.assign_int(i128::from(d.int()?)),
        Type::F16 => a.assign_float(f64::from(d.f16()?)),
        Type::F32 => a.assign_float(f64::from(d.f32()?)),
        Type::F64 => a.assign_float(d.f64()?),
        Type::Bytes => a.assign_bytes(d.bytes()?),
        Type::String => a.assign_string(d.str()?),
        Type::Array => {
            check_depth(depth)?;
            let len = d
                .array()?
                .ok_or(Error::Unsupported("indefinite-length array"))?;
            a.begin_list(usize::try_from(len).ok())?;
            for _ in 0..len {
                a.assemble_value()?;
                decode_item(d, a, depth + 1)?;
            }
            a.finish()
        }
        Type::Map => {
            check_depth(depth)?;
            let len = d.map()?.ok_or(Error::Unsupported("indefinite-length map"))?;
            a.begin_map(usize::try_from(len).ok())?;
            for _ in 0..len {
                if !matches!(d.datatype()?, Type::String) {
                    return Err(Error::Unsupported("map key that is not a string"));
                }
                a.assemble_key()?;
                a.assign_string(d.str()?)?;
                a.assemble_value()?;
                decode_item(d, a, depth + 1)?;
            }
            a.finish()
        }
        Type::Tag => {
            if d.tag()?.as_u64() != CID_TAG {
                return Err(Error::Unsupported("tag other than 42"));
            }
            if !matches!(d.datatype()?, Type::Bytes) {
                return Err(Error::Unsupported("tag 42 over a non-bytes item"));
            }
            a.assign_link(decode_link(d.bytes()?)?)
        }
        Type::BytesIndef | Type::StringIndef => {
            Err(Error::Unsupported("indefinite-length string"))
        }
        Type::ArrayIndef => Err(Error::Unsupported("indefinite-length array")),
        Type::MapIndef => Err(Error::Unsupported("indefinite-length map")),
        Type::Undefined => Err(Error::Unsupported("undefined")),
        _ => Err(Error::Unsupported("simple value")),
    }
}

/// Parses the content of a tag 42 item: a zero byte then the binary CID.
fn decode_link(bytes: &[u8]) -> Result<Cid, Error> {
    match bytes.split_first() {
        Some((0, cid)) => Ok(Cid::try_from(cid)?),
        _ => Err(Error::Unsupported("link without identity multibase prefix")),
    }
}

/// Writes `node` as a single CBOR item at the end of `out`.
pub fn encode(node: &dyn Node, out: &mut Vec<u8>) -> Result<(), Error> {
    let mut encoder = Encoder::new(Vec::new());
    encode_node(node, &mut encoder, 0)?;
    out.extend_from_slice(&encoder.into_writer());
    Ok(())
}

fn encode_node(node: &dyn Node, e: &mut Encoder<Vec<u8>>, depth: usize) -> Result<(), Error> {
    match node.kind() {
        Kind::Null => {
            e.null()?;
        }
        Kind::Bool => {
            e.bool(node.as_bool()?)?;
        }
        Kind::Integer => encode_int(e, node.as_int()?)?,
        Kind::Float => {
            e.f64(node.as_float()?)?;
        }
        Kind::String => {
            e.str(node.as_str()?)?;
        }
        Kind::Bytes => {
            e.bytes(node.as_bytes()?)?;
        }
        Kind::Link => {
            let mut bytes = vec![0];
            bytes.extend(node.as_link()?.to_bytes());
            e.tag(Tag::new(CID_TAG))?.bytes(&bytes)?;
        }
        Kind::List => {
            check_depth(depth)?;
            let items: Vec<_> = node.elements()?.collect();
            e.array(items.len() as u64)?;
            for item in &items {
                encode_node(&**item, e, depth + 1)?;
            }
        }
        Kind::Map => {
            check_depth(depth)?;
            let entries: Vec<_> = node.entries()?.collect();
            e.map(entries.len() as u64)?;
            for (key, value) in &entries {
                e.str(key)?;
                encode_node(&**value, e, depth + 1)?;
            }
        }
    }
    Ok(())
}

/// Writes an integer in the smallest major type 0 or 1 form.
fn encode_int(e: &mut Encoder<Vec<u8>>, value: i128) -> Result<(), Error> {
    if let Ok(value) = u64::try_from(value) {
        e.u64(value)?;
    } else if let Ok(value) = i64::try_from(value) {
        e.i64(value)?;
    } else {
        let int = Int::try_from(value).map_err(|_| Error::IntegerRange(value))?;
        e.int(int)?;
    }
    Ok(())
}
