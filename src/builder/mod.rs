//! Write side: building a [`DagJose`] from assembler calls.
//!
//! [`DagJoseBuilder`] checks every call against the closed DAG-JOSE schema.
//! Free-form headers go through [`HeaderAssembler`], the `signatures` and
//! `recipients` lists through typed entry assemblers.
use crate::datamodel::{copy, Call, MapState, Node};
use crate::jose::{DagJose, Recipient, Shape, Signature};
use crate::view::JOSE_FIELDS;
use crate::Error;

mod entry;
pub mod header;

use entry::EntryList;
pub use header::HeaderAssembler;

/// Top-level key of a DAG-JOSE object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoseField {
    Payload,
    Signatures,
    Protected,
    Unprotected,
    Iv,
    Aad,
    Ciphertext,
    Tag,
    Recipients,
}

impl JoseField {
    /// Every field, in the order of [`JOSE_FIELDS`].
    const ALL: [Self; 9] = [
        Self::Payload,
        Self::Signatures,
        Self::Protected,
        Self::Unprotected,
        Self::Iv,
        Self::Aad,
        Self::Ciphertext,
        Self::Tag,
        Self::Recipients,
    ];

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.key() == key)
    }

    fn key(self) -> &'static str {
        JOSE_FIELDS[self as usize]
    }

    fn shape(self) -> Shape {
        match self {
            Self::Payload | Self::Signatures => Shape::Jws,
            _ => Shape::Jwe,
        }
    }
}

/// Assembler of a composite top-level field.
#[derive(Debug)]
enum FieldAssembler {
    Signatures(EntryList<Signature>),
    Recipients(EntryList<Recipient>),
    Unprotected(HeaderAssembler),
}

impl FieldAssembler {
    fn for_field(field: JoseField) -> Option<Self> {
        match field {
            JoseField::Signatures => Some(Self::Signatures(EntryList::new())),
            JoseField::Recipients => Some(Self::Recipients(EntryList::new())),
            JoseField::Unprotected => Some(Self::Unprotected(HeaderAssembler::new("unprotected"))),
            _ => None,
        }
    }

    fn step(&mut self, call: Call<'_>) -> Result<(), Error> {
        match self {
            Self::Signatures(list) => list.step(call),
            Self::Recipients(list) => list.step(call),
            Self::Unprotected(header) => header.step(call),
        }
    }

    fn is_finished(&self) -> bool {
        match self {
            Self::Signatures(list) => list.is_finished(),
            Self::Recipients(list) => list.is_finished(),
            Self::Unprotected(header) => header.is_finished(),
        }
    }

    fn store(self, jose: &mut DagJose) -> Result<(), Error> {
        match self {
            Self::Signatures(list) => jose.signatures = Some(list.build()?),
            Self::Recipients(list) => jose.recipients = Some(list.build()?),
            Self::Unprotected(header) => jose.unprotected = Some(header.build()?),
        }
        Ok(())
    }
}

/// Builds a [`DagJose`] from the calls of a decoder or of [`copy`].
///
/// One builder assembles one object. After any error the builder is
/// poisoned and rejects every further call, so a half-built object is never
/// returned.
///
/// ```
/// use dag_jose::{Assembler, DagJoseBuilder};
///
/// let mut builder = DagJoseBuilder::new();
/// builder.begin_map(Some(1)).unwrap();
/// builder.assemble_key().unwrap();
/// builder.assign_string("ciphertext").unwrap();
/// builder.assemble_value().unwrap();
/// builder.assign_bytes(&[0xca, 0xfe]).unwrap();
/// builder.finish().unwrap();
///
/// let jose = builder.build().unwrap();
/// assert_eq!(jose.ciphertext, Some(vec![0xca, 0xfe]));
/// ```
#[derive(Debug, Default)]
pub struct DagJoseBuilder {
    jose: DagJose,
    state: Option<MapState>,
    field: Option<JoseField>,
    value: Option<FieldAssembler>,
    seen: Vec<JoseField>,
    closed: bool,
    poisoned: bool,
}

impl DagJoseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the top-level map has been closed successfully.
    pub fn is_finished(&self) -> bool {
        self.closed && !self.poisoned
    }

    /// Returns the assembled object.
    ///
    /// Fails with [`Error::Misuse`] if the object was not finished or if an
    /// earlier call failed.
    pub fn build(self) -> Result<DagJose, Error> {
        if self.poisoned {
            Err(Error::misuse("builder failed earlier"))
        } else if !self.closed {
            Err(Error::misuse("object built before it was finished"))
        } else {
            Ok(self.jose)
        }
    }

    pub(crate) fn step(&mut self, call: Call<'_>) -> Result<(), Error> {
        if self.poisoned {
            return Err(Error::misuse("builder failed earlier"));
        }
        let result = self.advance(call);
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    fn advance(&mut self, call: Call<'_>) -> Result<(), Error> {
        if self.closed {
            return Err(Error::misuse("object already finished"));
        }
        let state = match self.state {
            Some(state) => state,
            None => {
                return match call {
                    Call::BeginMap(_) => {
                        self.state = Some(MapState::Initial);
                        Ok(())
                    }
                    other => match other.kind() {
                        Some(kind) => Err(Error::schema(format!(
                            "a DAG-JOSE object must be a map, found {kind}"
                        ))),
                        None => Err(Error::misuse("object must start with begin_map")),
                    },
                };
            }
        };
        match state {
            MapState::Initial => match call {
                Call::AssembleKey => {
                    self.state = Some(MapState::MidKey);
                    Ok(())
                }
                Call::Finish => {
                    self.validate()?;
                    self.closed = true;
                    Ok(())
                }
                _ => Err(Error::misuse("object expects a key or finish")),
            },
            MapState::MidKey => match call {
                Call::String(key) => {
                    let field = JoseField::from_key(key)
                        .ok_or_else(|| Error::schema(format!("unknown key `{key}`")))?;
                    if self.seen.contains(&field) {
                        return Err(Error::schema(format!("duplicate key `{key}`")));
                    }
                    self.seen.push(field);
                    self.field = Some(field);
                    self.state = Some(MapState::ExpectValue);
                    Ok(())
                }
                _ => Err(Error::misuse("object key must be assigned as a string")),
            },
            MapState::ExpectValue => match call {
                Call::AssembleValue => {
                    self.value = self.field.and_then(FieldAssembler::for_field);
                    self.state = Some(MapState::MidValue);
                    Ok(())
                }
                _ => Err(Error::misuse("object expects assemble_value after a key")),
            },
            MapState::MidValue => self.value_step(call),
        }
    }

    fn value_step(&mut self, call: Call<'_>) -> Result<(), Error> {
        if let Some(value) = self.value.as_mut() {
            value.step(call)?;
            if value.is_finished() {
                if let Some(value) = self.value.take() {
                    value.store(&mut self.jose)?;
                }
                self.field = None;
                self.state = Some(MapState::Initial);
            }
            return Ok(());
        }
        let field = self
            .field
            .ok_or_else(|| Error::misuse("object value without a key"))?;
        let bytes = match call {
            Call::Bytes(bytes) => bytes.to_vec(),
            Call::Link(cid) if field == JoseField::Payload => cid.to_bytes(),
            other => {
                return match other.kind() {
                    Some(kind) => Err(Error::schema(format!(
                        "`{}` must be bytes, found {kind}",
                        field.key()
                    ))),
                    None => Err(Error::misuse("object expects a value")),
                }
            }
        };
        let slot = match field {
            JoseField::Payload => &mut self.jose.payload,
            JoseField::Protected => &mut self.jose.protected,
            JoseField::Iv => &mut self.jose.iv,
            JoseField::Aad => &mut self.jose.aad,
            JoseField::Ciphertext => &mut self.jose.ciphertext,
            JoseField::Tag => &mut self.jose.tag,
            JoseField::Signatures | JoseField::Recipients | JoseField::Unprotected => {
                return Err(Error::misuse("composite field without an assembler"))
            }
        };
        *slot = Some(bytes);
        self.field = None;
        self.state = Some(MapState::Initial);
        Ok(())
    }

    /// Checks that the fields seen form exactly one of the two shapes.
    fn validate(&self) -> Result<(), Error> {
        let jws = self.seen.iter().any(|f| f.shape() == Shape::Jws);
        let jwe = self.seen.iter().any(|f| f.shape() == Shape::Jwe);
        match (jws, jwe) {
            (true, true) => Err(Error::schema("object mixes JWS and JWE fields")),
            (false, false) => Err(Error::schema("object has neither JWS nor JWE fields")),
            (true, false) => {
                for field in [JoseField::Payload, JoseField::Signatures] {
                    if !self.seen.contains(&field) {
                        return Err(Error::schema(format!("JWS without `{}`", field.key())));
                    }
                }
                Ok(())
            }
            (false, true) => {
                if self.seen.contains(&JoseField::Ciphertext) {
                    Ok(())
                } else {
                    Err(Error::schema("JWE without `ciphertext`"))
                }
            }
        }
    }
}

crate::datamodel::assembler_via_step!(DagJoseBuilder);

impl DagJose {
    /// Copies any conformant tree into a new object, validating it on the way.
    pub fn from_node(node: &dyn Node) -> Result<Self, Error> {
        let mut builder = DagJoseBuilder::new();
        copy(node, &mut builder)?;
        builder.build()
    }
}
