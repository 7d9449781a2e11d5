use crate::Error;
use libipld::{Cid, Ipld};
use std::collections::BTreeMap;
use std::convert::TryFrom;

// RFC 7515 - JSON Web Signature (JWS), general JSON serialization
// RFC 7516 - JSON Web Encryption (JWE), general JSON serialization
// https://ipld.io/specs/codecs/dag-jose/spec/

/// Free-form header parameters, as found in `header` and `unprotected`.
pub type Header = BTreeMap<String, Ipld>;

/// A JWS or a JWE.
///
/// The two shapes are told apart by which fields are present: a JWS has
/// `payload` and `signatures`, a JWE has `ciphertext` and optionally the other
/// encryption fields. Byte fields hold decoded bytes, not base64url text.
/// Absent fields are `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DagJose {
    pub payload: Option<Vec<u8>>,
    pub signatures: Option<Vec<Signature>>,
    pub protected: Option<Vec<u8>>,
    pub unprotected: Option<Header>,
    pub iv: Option<Vec<u8>>,
    pub aad: Option<Vec<u8>>,
    pub ciphertext: Option<Vec<u8>>,
    pub tag: Option<Vec<u8>>,
    pub recipients: Option<Vec<Recipient>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    /// Always present, possibly empty.
    pub signature: Vec<u8>,
    pub protected: Option<Vec<u8>>,
    pub header: Option<Header>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Recipient {
    pub header: Option<Header>,
    pub encrypted_key: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Jws,
    Jwe,
}

/// Borrowed JWS fields of a [`DagJose`].
#[derive(Debug, Clone, Copy)]
pub struct Jws<'a> {
    pub payload: &'a [u8],
    pub signatures: &'a [Signature],
}

/// Borrowed JWE fields of a [`DagJose`].
#[derive(Debug, Clone, Copy)]
pub struct Jwe<'a> {
    pub protected: Option<&'a [u8]>,
    pub unprotected: Option<&'a Header>,
    pub iv: Option<&'a [u8]>,
    pub aad: Option<&'a [u8]>,
    pub ciphertext: &'a [u8],
    pub tag: Option<&'a [u8]>,
    pub recipients: &'a [Recipient],
}

impl DagJose {
    pub fn jws(payload: Vec<u8>, signatures: Vec<Signature>) -> Self {
        Self {
            payload: Some(payload),
            signatures: Some(signatures),
            ..Default::default()
        }
    }

    pub fn jwe(ciphertext: Vec<u8>) -> Self {
        Self {
            ciphertext: Some(ciphertext),
            ..Default::default()
        }
    }

    /// Returns the JWS fields if this object carries a payload and signatures.
    pub fn as_jws(&self) -> Option<Jws<'_>> {
        Some(Jws {
            payload: self.payload.as_deref()?,
            signatures: self.signatures.as_deref()?,
        })
    }

    /// Returns the JWE fields if this object carries a ciphertext.
    pub fn as_jwe(&self) -> Option<Jwe<'_>> {
        Some(Jwe {
            protected: self.protected.as_deref(),
            unprotected: self.unprotected.as_ref(),
            iv: self.iv.as_deref(),
            aad: self.aad.as_deref(),
            ciphertext: self.ciphertext.as_deref()?,
            tag: self.tag.as_deref(),
            recipients: self.recipients.as_deref().unwrap_or(&[]),
        })
    }

    /// Shape of the object, `None` if it is neither a JWS nor a JWE.
    ///
    /// Objects produced by the builder or the codec always have one.
    pub fn shape(&self) -> Option<Shape> {
        let jws = self.payload.is_some() || self.signatures.is_some();
        let jwe = self.protected.is_some()
            || self.unprotected.is_some()
            || self.iv.is_some()
            || self.aad.is_some()
            || self.ciphertext.is_some()
            || self.tag.is_some()
            || self.recipients.is_some();
        match (jws, jwe) {
            (true, false) if self.as_jws().is_some() => Some(Shape::Jws),
            (false, true) if self.as_jwe().is_some() => Some(Shape::Jwe),
            _ => None,
        }
    }

    /// Interprets the payload bytes as a CID.
    pub fn payload_link(&self) -> Result<Cid, Error> {
        let payload = self
            .payload
            .as_deref()
            .ok_or_else(|| Error::NotFound("payload".to_owned()))?;
        Ok(Cid::try_from(payload)?)
    }
}

impl Signature {
    pub fn new(signature: Vec<u8>) -> Self {
        Self {
            signature,
            ..Default::default()
        }
    }
}
