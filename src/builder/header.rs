use crate::datamodel::{Call, IpldBuilder, MapState};
use crate::jose::Header;
use crate::Error;
use libipld::Ipld;

/// Assembler of a free-form header map.
///
/// Used for `Signature::header`, `Recipient::header` and the top-level
/// `unprotected` field. Scalar values are stored directly; maps and lists are
/// handed to a child [`IpldBuilder`] until it completes, so values may nest
/// to any depth.
#[derive(Debug)]
pub struct HeaderAssembler {
    field: &'static str,
    header: Header,
    state: MapState,
    key: Option<String>,
    child: Option<IpldBuilder>,
    opened: bool,
    closed: bool,
}

impl HeaderAssembler {
    /// Creates an assembler for the header stored under `field`, which is
    /// only used in error messages.
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            header: Header::new(),
            state: MapState::Initial,
            key: None,
            child: None,
            opened: false,
            closed: false,
        }
    }

    /// Whether the header map has been closed with `finish`.
    pub fn is_finished(&self) -> bool {
        self.closed
    }

    /// Entries assembled so far.
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn build(self) -> Result<Header, Error> {
        if self.closed {
            Ok(self.header)
        } else {
            Err(Error::misuse("header built before it was finished"))
        }
    }

    pub(crate) fn step(&mut self, call: Call<'_>) -> Result<(), Error> {
        if self.closed {
            return Err(Error::misuse("header already finished"));
        }
        if !self.opened {
            return match call {
                Call::BeginMap(_) => {
                    self.opened = true;
                    Ok(())
                }
                other => match other.kind() {
                    Some(kind) => Err(Error::schema(format!(
                        "`{}` must be a map, found {kind}",
                        self.field
                    ))),
                    None => Err(Error::misuse("header value must start with begin_map")),
                },
            };
        }
        match self.state {
            MapState::Initial => match call {
                Call::AssembleKey => {
                    self.state = MapState::MidKey;
                    Ok(())
                }
                Call::Finish => {
                    self.closed = true;
                    Ok(())
                }
                _ => Err(Error::misuse("header expects a key or finish")),
            },
            MapState::MidKey => match call {
                Call::String(key) => {
                    if self.header.contains_key(key) {
                        return Err(Error::schema(format!(
                            "duplicate key `{key}` in `{}`",
                            self.field
                        )));
                    }
                    self.key = Some(key.to_owned());
                    self.state = MapState::ExpectValue;
                    Ok(())
                }
                _ => Err(Error::misuse("header key must be assigned as a string")),
            },
            MapState::ExpectValue => match call {
                Call::AssembleValue => {
                    self.state = MapState::MidValue;
                    Ok(())
                }
                _ => Err(Error::misuse("header expects assemble_value after a key")),
            },
            MapState::MidValue => self.value_step(call),
        }
    }

    fn value_step(&mut self, call: Call<'_>) -> Result<(), Error> {
        if let Some(child) = self.child.as_mut() {
            child.step(call)?;
            if !child.is_complete() {
                return Ok(());
            }
            return match self.child.take() {
                Some(child) => {
                    let value = child.build()?;
                    self.store(value)
                }
                None => Ok(()),
            };
        }
        match call {
            Call::BeginMap(_) | Call::BeginList(_) => {
                let mut child = IpldBuilder::new();
                child.step(call)?;
                self.child = Some(child);
                Ok(())
            }
            scalar => match scalar.scalar() {
                Some(value) => self.store(value),
                None => Err(Error::misuse("header expects a value")),
            },
        }
    }

    fn store(&mut self, value: Ipld) -> Result<(), Error> {
        let key = self
            .key
            .take()
            .ok_or_else(|| Error::misuse("header value without a key"))?;
        self.header.insert(key, value);
        self.state = MapState::Initial;
        Ok(())
    }
}

crate::datamodel::assembler_via_step!(HeaderAssembler);
