//! Assemblers for the `signatures` and `recipients` lists.
use super::header::HeaderAssembler;
use crate::datamodel::{Call, MapState};
use crate::jose::{Header, Recipient, Signature};
use crate::view::{RECIPIENT_FIELDS, SIGNATURE_FIELDS};
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryField {
    Signature,
    Protected,
    EncryptedKey,
    Header,
}

/// Element of a `signatures` or `recipients` list.
pub(crate) trait Entry: Default {
    /// Name of the enclosing list, for error messages.
    const LIST: &'static str;

    /// Keys of the entry, shared with the read side.
    const KEYS: &'static [&'static str];

    /// Field of each key in [`Entry::KEYS`], at the same position.
    const FIELDS: &'static [EntryField];

    fn set_bytes(&mut self, field: EntryField, value: Vec<u8>);

    fn set_header(&mut self, header: Header);

    /// Fields without which the entry is invalid.
    fn required() -> &'static [EntryField] {
        &[]
    }

    fn field(key: &str) -> Option<EntryField> {
        Self::KEYS
            .iter()
            .zip(Self::FIELDS)
            .find(|(k, _)| **k == key)
            .map(|(_, field)| *field)
    }

    fn key(field: EntryField) -> &'static str {
        Self::KEYS
            .iter()
            .zip(Self::FIELDS)
            .find(|(_, f)| **f == field)
            .map_or("?", |(key, _)| *key)
    }
}

impl Entry for Signature {
    const LIST: &'static str = "signatures";
    const KEYS: &'static [&'static str] = SIGNATURE_FIELDS;
    const FIELDS: &'static [EntryField] = &[
        EntryField::Signature,
        EntryField::Protected,
        EntryField::Header,
    ];

    fn set_bytes(&mut self, field: EntryField, value: Vec<u8>) {
        match field {
            EntryField::Signature => self.signature = value,
            EntryField::Protected => self.protected = Some(value),
            EntryField::EncryptedKey | EntryField::Header => (),
        }
    }

    fn set_header(&mut self, header: Header) {
        self.header = Some(header);
    }

    fn required() -> &'static [EntryField] {
        &[EntryField::Signature]
    }
}

impl Entry for Recipient {
    const LIST: &'static str = "recipients";
    const KEYS: &'static [&'static str] = RECIPIENT_FIELDS;
    const FIELDS: &'static [EntryField] = &[EntryField::Header, EntryField::EncryptedKey];

    fn set_bytes(&mut self, field: EntryField, value: Vec<u8>) {
        if field == EntryField::EncryptedKey {
            self.encrypted_key = Some(value);
        }
    }

    fn set_header(&mut self, header: Header) {
        self.header = Some(header);
    }
}

/// Assembler of a single signature or recipient map.
#[derive(Debug)]
pub(crate) struct EntryAssembler<T> {
    entry: T,
    state: MapState,
    field: Option<EntryField>,
    header: Option<HeaderAssembler>,
    seen: Vec<EntryField>,
    closed: bool,
}

impl<T: Entry> EntryAssembler<T> {
    /// Starts from `begin_map`, already received by the caller.
    fn new() -> Self {
        Self {
            entry: T::default(),
            state: MapState::Initial,
            field: None,
            header: None,
            seen: Vec::new(),
            closed: false,
        }
    }

    fn step(&mut self, call: Call<'_>) -> Result<(), Error> {
        match self.state {
            MapState::Initial => match call {
                Call::AssembleKey => {
                    self.state = MapState::MidKey;
                    Ok(())
                }
                Call::Finish => {
                    for field in T::required() {
                        if !self.seen.contains(field) {
                            return Err(Error::schema(format!(
                                "missing `{}` in `{}` entry",
                                T::key(*field),
                                T::LIST
                            )));
                        }
                    }
                    self.closed = true;
                    Ok(())
                }
                _ => Err(Error::misuse("entry expects a key or finish")),
            },
            MapState::MidKey => match call {
                Call::String(key) => {
                    let field = T::field(key).ok_or_else(|| {
                        Error::schema(format!("unknown key `{key}` in `{}` entry", T::LIST))
                    })?;
                    if self.seen.contains(&field) {
                        return Err(Error::schema(format!(
                            "duplicate key `{key}` in `{}` entry",
                            T::LIST
                        )));
                    }
                    self.seen.push(field);
                    self.field = Some(field);
                    self.state = MapState::ExpectValue;
                    Ok(())
                }
                _ => Err(Error::misuse("entry key must be assigned as a string")),
            },
            MapState::ExpectValue => match call {
                Call::AssembleValue => {
                    if self.field == Some(EntryField::Header) {
                        self.header = Some(HeaderAssembler::new("header"));
                    }
                    self.state = MapState::MidValue;
                    Ok(())
                }
                _ => Err(Error::misuse("entry expects assemble_value after a key")),
            },
            MapState::MidValue => self.value_step(call),
        }
    }

    fn value_step(&mut self, call: Call<'_>) -> Result<(), Error> {
        if let Some(header) = self.header.as_mut() {
            header.step(call)?;
            if !header.is_finished() {
                return Ok(());
            }
            if let Some(header) = self.header.take() {
                self.entry.set_header(header.build()?);
            }
            self.field = None;
            self.state = MapState::Initial;
            return Ok(());
        }
        let field = self
            .field
            .take()
            .ok_or_else(|| Error::misuse("entry value without a key"))?;
        match call {
            Call::Bytes(bytes) => {
                self.entry.set_bytes(field, bytes.to_vec());
                self.state = MapState::Initial;
                Ok(())
            }
            other => {
                self.field = Some(field);
                match other.kind() {
                    Some(kind) => Err(Error::schema(format!(
                        "`{}` in `{}` entry must be bytes, found {kind}",
                        T::key(field),
                        T::LIST
                    ))),
                    None => Err(Error::misuse("entry expects a value")),
                }
            }
        }
    }
}

/// Assembler of a `signatures` or `recipients` list.
#[derive(Debug)]
pub(crate) struct EntryList<T> {
    items: Vec<T>,
    current: Option<EntryAssembler<T>>,
    opened: bool,
    expecting: bool,
    closed: bool,
}

impl<T: Entry> EntryList<T> {
    pub(crate) fn new() -> Self {
        Self {
            items: Vec::new(),
            current: None,
            opened: false,
            expecting: false,
            closed: false,
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.closed
    }

    pub(crate) fn build(self) -> Result<Vec<T>, Error> {
        if self.closed {
            Ok(self.items)
        } else {
            Err(Error::misuse("list built before it was finished"))
        }
    }

    pub(crate) fn step(&mut self, call: Call<'_>) -> Result<(), Error> {
        if self.closed {
            return Err(Error::misuse("list already finished"));
        }
        if !self.opened {
            return match call {
                Call::BeginList(_) => {
                    self.opened = true;
                    Ok(())
                }
                other => Err(kind_error(other, T::LIST, "a list")),
            };
        }
        if let Some(current) = self.current.as_mut() {
            current.step(call)?;
            if current.closed {
                if let Some(current) = self.current.take() {
                    self.items.push(current.entry);
                }
            }
            return Ok(());
        }
        if self.expecting {
            return match call {
                Call::BeginMap(_) => {
                    self.current = Some(EntryAssembler::new());
                    self.expecting = false;
                    Ok(())
                }
                other => Err(kind_error(other, T::LIST, "a list of maps")),
            };
        }
        match call {
            Call::AssembleValue => {
                self.expecting = true;
                Ok(())
            }
            Call::Finish => {
                self.closed = true;
                Ok(())
            }
            _ => Err(Error::misuse("list expects assemble_value or finish")),
        }
    }
}

/// Error for a call that is not the value `field` requires.
fn kind_error(call: Call<'_>, field: &str, expected: &str) -> Error {
    match call.kind() {
        Some(kind) => Error::schema(format!("`{field}` must be {expected}, found {kind}")),
        None => Error::misuse("expected a value"),
    }
}
