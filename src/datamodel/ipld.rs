use super::{Call, Kind, ListIter, MapIter, MapState, Node, NodeBox};
use crate::Error;
use libipld::{Cid, Ipld};
use std::collections::BTreeMap;

/// Borrowed map of generic values.
#[derive(Debug, Clone, Copy)]
pub struct MapNode<'a>(pub &'a BTreeMap<String, Ipld>);

impl<'a> MapNode<'a> {
    fn get(self, key: &str) -> Result<NodeBox<'a>, Error> {
        match self.0.get(key) {
            Some(value) => Ok(Box::new(value) as NodeBox<'a>),
            None => Err(Error::NotFound(key.to_owned())),
        }
    }

    fn iter(self) -> MapIter<'a> {
        Box::new(
            self.0
                .iter()
                .map(|(key, value)| (key.as_str(), Box::new(value) as NodeBox<'a>)),
        )
    }
}

impl Node for MapNode<'_> {
    fn kind(&self) -> Kind {
        Kind::Map
    }

    fn lookup_by_key(&self, key: &str) -> Result<NodeBox<'_>, Error> {
        self.get(key)
    }

    fn entries(&self) -> Result<MapIter<'_>, Error> {
        Ok(self.iter())
    }

    fn length(&self) -> Option<usize> {
        Some(self.0.len())
    }
}

/// Borrowed list of generic values.
#[derive(Debug, Clone, Copy)]
pub struct ListNode<'a>(pub &'a [Ipld]);

impl<'a> ListNode<'a> {
    fn get(self, index: usize) -> Result<NodeBox<'a>, Error> {
        match self.0.get(index) {
            Some(value) => Ok(Box::new(value) as NodeBox<'a>),
            None => Err(Error::NotFound(index.to_string())),
        }
    }

    fn iter(self) -> ListIter<'a> {
        Box::new(self.0.iter().map(|value| Box::new(value) as NodeBox<'a>))
    }
}

impl Node for ListNode<'_> {
    fn kind(&self) -> Kind {
        Kind::List
    }

    fn lookup_by_index(&self, index: usize) -> Result<NodeBox<'_>, Error> {
        self.get(index)
    }

    fn elements(&self) -> Result<ListIter<'_>, Error> {
        Ok(self.iter())
    }

    fn length(&self) -> Option<usize> {
        Some(self.0.len())
    }
}

/// Borrowed byte string.
#[derive(Debug, Clone, Copy)]
pub struct BytesNode<'a>(pub &'a [u8]);

impl Node for BytesNode<'_> {
    fn kind(&self) -> Kind {
        Kind::Bytes
    }

    fn as_bytes(&self) -> Result<&[u8], Error> {
        Ok(self.0)
    }
}

impl Node for Ipld {
    fn kind(&self) -> Kind {
        match self {
            Ipld::Null => Kind::Null,
            Ipld::Bool(_) => Kind::Bool,
            Ipld::Integer(_) => Kind::Integer,
            Ipld::Float(_) => Kind::Float,
            Ipld::String(_) => Kind::String,
            Ipld::Bytes(_) => Kind::Bytes,
            Ipld::List(_) => Kind::List,
            Ipld::Map(_) => Kind::Map,
            Ipld::Link(_) => Kind::Link,
        }
    }

    fn lookup_by_key(&self, key: &str) -> Result<NodeBox<'_>, Error> {
        match self {
            Ipld::Map(map) => MapNode(map).get(key),
            other => Err(Error::wrong_kind(Kind::Map, other.kind())),
        }
    }

    fn lookup_by_index(&self, index: usize) -> Result<NodeBox<'_>, Error> {
        match self {
            Ipld::List(list) => ListNode(list).get(index),
            other => Err(Error::wrong_kind(Kind::List, other.kind())),
        }
    }

    fn entries(&self) -> Result<MapIter<'_>, Error> {
        match self {
            Ipld::Map(map) => Ok(MapNode(map).iter()),
            other => Err(Error::wrong_kind(Kind::Map, other.kind())),
        }
    }

    fn elements(&self) -> Result<ListIter<'_>, Error> {
        match self {
            Ipld::List(list) => Ok(ListNode(list).iter()),
            other => Err(Error::wrong_kind(Kind::List, other.kind())),
        }
    }

    fn length(&self) -> Option<usize> {
        match self {
            Ipld::Map(map) => Some(map.len()),
            Ipld::List(list) => Some(list.len()),
            _ => None,
        }
    }

    fn as_bool(&self) -> Result<bool, Error> {
        match self {
            Ipld::Bool(b) => Ok(*b),
            other => Err(Error::wrong_kind(Kind::Bool, other.kind())),
        }
    }

    fn as_int(&self) -> Result<i128, Error> {
        match self {
            Ipld::Integer(i) => Ok(*i),
            other => Err(Error::wrong_kind(Kind::Integer, other.kind())),
        }
    }

    fn as_float(&self) -> Result<f64, Error> {
        match self {
            Ipld::Float(f) => Ok(*f),
            other => Err(Error::wrong_kind(Kind::Float, other.kind())),
        }
    }

    fn as_str(&self) -> Result<&str, Error> {
        match self {
            Ipld::String(s) => Ok(s.as_str()),
            other => Err(Error::wrong_kind(Kind::String, other.kind())),
        }
    }

    fn as_bytes(&self) -> Result<&[u8], Error> {
        match self {
            Ipld::Bytes(b) => Ok(b.as_slice()),
            other => Err(Error::wrong_kind(Kind::Bytes, other.kind())),
        }
    }

    fn as_link(&self) -> Result<Cid, Error> {
        match self {
            Ipld::Link(cid) => Ok(*cid),
            other => Err(Error::wrong_kind(Kind::Link, other.kind())),
        }
    }
}

// Decoders announce lengths before content; never trust them for more than this.
const MAX_PREALLOCATION: usize = 1024;

#[derive(Debug)]
enum Frame {
    Map {
        entries: BTreeMap<String, Ipld>,
        state: MapState,
        key: Option<String>,
    },
    List {
        items: Vec<Ipld>,
        expecting: bool,
    },
}

/// Assembler of arbitrary generic values.
///
/// Open maps and lists are kept on an explicit stack, so nesting depth is only
/// bounded by memory.
#[derive(Debug, Default)]
pub struct IpldBuilder {
    stack: Vec<Frame>,
    root: Option<Ipld>,
}

impl IpldBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a complete value has been assembled.
    pub fn is_complete(&self) -> bool {
        self.stack.is_empty() && self.root.is_some()
    }

    pub fn build(self) -> Result<Ipld, Error> {
        if !self.stack.is_empty() {
            return Err(Error::misuse("build called with an unfinished map or list"));
        }
        self.root
            .ok_or_else(|| Error::misuse("build called before any value was assembled"))
    }

    pub(crate) fn step(&mut self, call: Call<'_>) -> Result<(), Error> {
        match call {
            Call::AssembleKey => match self.stack.last_mut() {
                Some(Frame::Map { state, .. }) if *state == MapState::Initial => {
                    *state = MapState::MidKey;
                    Ok(())
                }
                _ => Err(Error::misuse("assemble_key outside of a map awaiting a key")),
            },
            Call::AssembleValue => match self.stack.last_mut() {
                Some(Frame::Map { state, .. }) if *state == MapState::ExpectValue => {
                    *state = MapState::MidValue;
                    Ok(())
                }
                Some(Frame::List { expecting, .. }) if !*expecting => {
                    *expecting = true;
                    Ok(())
                }
                _ => Err(Error::misuse("assemble_value while no value can start")),
            },
            Call::String(s) if self.awaits_key() => self.set_key(s),
            Call::BeginMap(_) => {
                self.check_value_position()?;
                self.stack.push(Frame::Map {
                    entries: BTreeMap::new(),
                    state: MapState::Initial,
                    key: None,
                });
                Ok(())
            }
            Call::BeginList(size_hint) => {
                self.check_value_position()?;
                let capacity = size_hint.unwrap_or(0).min(MAX_PREALLOCATION);
                self.stack.push(Frame::List {
                    items: Vec::with_capacity(capacity),
                    expecting: false,
                });
                Ok(())
            }
            Call::Finish => {
                let value = match self.stack.pop() {
                    Some(Frame::Map {
                        entries,
                        state: MapState::Initial,
                        ..
                    }) => Ipld::Map(entries),
                    Some(Frame::List {
                        items,
                        expecting: false,
                    }) => Ipld::List(items),
                    Some(frame) => {
                        self.stack.push(frame);
                        return Err(Error::misuse("finish called in the middle of an entry"));
                    }
                    None => return Err(Error::misuse("finish called with no open map or list")),
                };
                self.place(value)
            }
            scalar => match scalar.scalar() {
                Some(value) => {
                    self.check_value_position()?;
                    self.place(value)
                }
                None => Err(Error::misuse("unexpected assembler call")),
            },
        }
    }

    fn awaits_key(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(Frame::Map {
                state: MapState::MidKey,
                ..
            })
        )
    }

    fn set_key(&mut self, s: &str) -> Result<(), Error> {
        if let Some(Frame::Map {
            entries,
            state,
            key,
        }) = self.stack.last_mut()
        {
            if entries.contains_key(s) {
                return Err(Error::schema(format!("duplicate map key `{s}`")));
            }
            *key = Some(s.to_owned());
            *state = MapState::ExpectValue;
        }
        Ok(())
    }

    fn check_value_position(&self) -> Result<(), Error> {
        let ready = match self.stack.last() {
            None => self.root.is_none(),
            Some(Frame::Map { state, .. }) => *state == MapState::MidValue,
            Some(Frame::List { expecting, .. }) => *expecting,
        };
        if ready {
            Ok(())
        } else {
            Err(Error::misuse("value assigned where no value was expected"))
        }
    }

    fn place(&mut self, value: Ipld) -> Result<(), Error> {
        match self.stack.last_mut() {
            None if self.root.is_none() => {
                self.root = Some(value);
                Ok(())
            }
            Some(Frame::Map {
                entries,
                state,
                key,
            }) if *state == MapState::MidValue => {
                let key = key
                    .take()
                    .ok_or_else(|| Error::misuse("map value without a key"))?;
                entries.insert(key, value);
                *state = MapState::Initial;
                Ok(())
            }
            Some(Frame::List { items, expecting }) if *expecting => {
                items.push(value);
                *expecting = false;
                Ok(())
            }
            _ => Err(Error::misuse("value assigned where no value was expected")),
        }
    }
}

crate::datamodel::assembler_via_step!(IpldBuilder);
