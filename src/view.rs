//! Read-only tree view of a [`DagJose`].
//!
//! Map nodes list their present fields in a fixed order, which is what makes
//! the encoded form canonical. Byte fields and headers are borrowed, never
//! copied.
use crate::datamodel::{BytesNode, Kind, ListIter, MapIter, MapNode, Node, NodeBox};
use crate::jose::{DagJose, Header, Recipient, Signature};
use crate::Error;
use libipld::Ipld;

pub(crate) const JOSE_FIELDS: &[&str] = &[
    "payload",
    "signatures",
    "protected",
    "unprotected",
    "iv",
    "aad",
    "ciphertext",
    "tag",
    "recipients",
];

pub(crate) const SIGNATURE_FIELDS: &[&str] = &["signature", "protected", "header"];

pub(crate) const RECIPIENT_FIELDS: &[&str] = &["header", "encrypted_key"];

/// Node view over a JOSE object or one of its parts.
#[derive(Debug, Clone, Copy)]
pub enum JoseNode<'a> {
    Object(&'a DagJose),
    Signature(&'a Signature),
    Recipient(&'a Recipient),
    Signatures(&'a [Signature]),
    Recipients(&'a [Recipient]),
}

impl DagJose {
    pub fn as_node(&self) -> JoseNode<'_> {
        JoseNode::Object(self)
    }
}

fn bytes(b: &[u8]) -> NodeBox<'_> {
    Box::new(BytesNode(b))
}

fn header(h: &Header) -> NodeBox<'_> {
    Box::new(MapNode(h))
}

impl<'a> JoseNode<'a> {
    /// Keys of a map node, in canonical order.
    fn fields(self) -> &'a [&'a str] {
        match self {
            Self::Object(_) => JOSE_FIELDS,
            Self::Signature(_) => SIGNATURE_FIELDS,
            Self::Recipient(_) => RECIPIENT_FIELDS,
            Self::Signatures(_) | Self::Recipients(_) => &[],
        }
    }

    /// Value of a present field.
    fn field(self, key: &str) -> Option<NodeBox<'a>> {
        match self {
            Self::Object(jose) => match key {
                "payload" => jose.payload.as_deref().map(bytes),
                "signatures" => jose
                    .signatures
                    .as_deref()
                    .map(|s| Box::new(Self::Signatures(s)) as NodeBox<'a>),
                "protected" => jose.protected.as_deref().map(bytes),
                "unprotected" => jose.unprotected.as_ref().map(header),
                "iv" => jose.iv.as_deref().map(bytes),
                "aad" => jose.aad.as_deref().map(bytes),
                "ciphertext" => jose.ciphertext.as_deref().map(bytes),
                "tag" => jose.tag.as_deref().map(bytes),
                "recipients" => jose
                    .recipients
                    .as_deref()
                    .map(|r| Box::new(Self::Recipients(r)) as NodeBox<'a>),
                _ => None,
            },
            Self::Signature(signature) => match key {
                "signature" => Some(bytes(&signature.signature)),
                "protected" => signature.protected.as_deref().map(bytes),
                "header" => signature.header.as_ref().map(header),
                _ => None,
            },
            Self::Recipient(recipient) => match key {
                "header" => recipient.header.as_ref().map(header),
                "encrypted_key" => recipient.encrypted_key.as_deref().map(bytes),
                _ => None,
            },
            Self::Signatures(_) | Self::Recipients(_) => None,
        }
    }

    fn present_fields(self) -> impl Iterator<Item = (&'a str, NodeBox<'a>)> + 'a {
        self.fields()
            .iter()
            .filter_map(move |&key| self.field(key).map(|value| (key, value)))
    }

    fn get(self, key: &str) -> Result<NodeBox<'a>, Error> {
        match self {
            // `link` shares the payload bytes, read as a CID.
            Self::Object(jose) if key == "link" => {
                Ok(Box::new(Ipld::Link(jose.payload_link()?)) as NodeBox<'a>)
            }
            Self::Signatures(_) | Self::Recipients(_) => match key.parse() {
                Ok(index) => self.item(index),
                Err(_) => Err(Error::NotFound(key.to_owned())),
            },
            _ => self
                .field(key)
                .ok_or_else(|| Error::NotFound(key.to_owned())),
        }
    }

    fn item(self, index: usize) -> Result<NodeBox<'a>, Error> {
        let item = match self {
            Self::Signatures(signatures) => signatures
                .get(index)
                .map(|s| Box::new(Self::Signature(s)) as NodeBox<'a>),
            Self::Recipients(recipients) => recipients
                .get(index)
                .map(|r| Box::new(Self::Recipient(r)) as NodeBox<'a>),
            _ => return Err(Error::wrong_kind(Kind::List, self.kind())),
        };
        item.ok_or_else(|| Error::NotFound(index.to_string()))
    }
}

impl Node for JoseNode<'_> {
    fn kind(&self) -> Kind {
        match self {
            Self::Object(_) | Self::Signature(_) | Self::Recipient(_) => Kind::Map,
            Self::Signatures(_) | Self::Recipients(_) => Kind::List,
        }
    }

    fn lookup_by_key(&self, key: &str) -> Result<NodeBox<'_>, Error> {
        self.get(key)
    }

    fn lookup_by_index(&self, index: usize) -> Result<NodeBox<'_>, Error> {
        self.item(index)
    }

    fn entries(&self) -> Result<MapIter<'_>, Error> {
        match self.kind() {
            Kind::Map => Ok(Box::new(self.present_fields())),
            actual => Err(Error::wrong_kind(Kind::Map, actual)),
        }
    }

    fn elements(&self) -> Result<ListIter<'_>, Error> {
        match *self {
            Self::Signatures(signatures) => Ok(Box::new(
                signatures
                    .iter()
                    .map(|s| Box::new(Self::Signature(s)) as NodeBox<'_>),
            )),
            Self::Recipients(recipients) => Ok(Box::new(
                recipients
                    .iter()
                    .map(|r| Box::new(Self::Recipient(r)) as NodeBox<'_>),
            )),
            _ => Err(Error::wrong_kind(Kind::List, self.kind())),
        }
    }

    fn length(&self) -> Option<usize> {
        match *self {
            Self::Signatures(signatures) => Some(signatures.len()),
            Self::Recipients(recipients) => Some(recipients.len()),
            node => Some(
                node.fields()
                    .iter()
                    .filter(|key| node.field(key).is_some())
                    .count(),
            ),
        }
    }
}
