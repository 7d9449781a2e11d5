//! Generic, schema-agnostic tree data model.
//!
//! Two seams meet here: [`Node`], a read-only view over any tree-shaped value,
//! and [`Assembler`], the call grammar a decoder uses to build one. Any node
//! can drive any assembler through [`copy`].
use crate::Error;
use core::fmt;
use libipld::{Cid, Ipld};

pub use ipld::{BytesNode, IpldBuilder, ListNode, MapNode};

/// Kind of a node in the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Bool,
    Integer,
    Float,
    String,
    Bytes,
    List,
    Map,
    Link,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::List => "list",
            Self::Map => "map",
            Self::Link => "link",
        };
        f.write_str(name)
    }
}

/// Maximum number of nested maps and lists that [`copy`] and the CBOR codec
/// accept. Deeper trees fail with [`Error::TooDeep`].
pub const MAX_DEPTH: usize = 64;

pub type NodeBox<'a> = Box<dyn Node + 'a>;

/// Map entries, in the order the node defines.
pub type MapIter<'a> = Box<dyn Iterator<Item = (&'a str, NodeBox<'a>)> + 'a>;

pub type ListIter<'a> = Box<dyn Iterator<Item = NodeBox<'a>> + 'a>;

/// Read-only view of a tree node.
///
/// Every method but [`Node::kind`] has a default implementation failing with
/// [`Error::WrongKind`], so an implementation only provides what its kind
/// supports.
pub trait Node {
    fn kind(&self) -> Kind;

    /// Returns the value stored under `key`.
    ///
    /// Absent keys fail with [`Error::NotFound`], never with a null node.
    fn lookup_by_key(&self, key: &str) -> Result<NodeBox<'_>, Error> {
        let _ = key;
        Err(Error::wrong_kind(Kind::Map, self.kind()))
    }

    fn lookup_by_index(&self, index: usize) -> Result<NodeBox<'_>, Error> {
        let _ = index;
        Err(Error::wrong_kind(Kind::List, self.kind()))
    }

    fn entries(&self) -> Result<MapIter<'_>, Error> {
        Err(Error::wrong_kind(Kind::Map, self.kind()))
    }

    fn elements(&self) -> Result<ListIter<'_>, Error> {
        Err(Error::wrong_kind(Kind::List, self.kind()))
    }

    /// Number of entries of a map or elements of a list, `None` for scalars.
    fn length(&self) -> Option<usize> {
        None
    }

    fn as_bool(&self) -> Result<bool, Error> {
        Err(Error::wrong_kind(Kind::Bool, self.kind()))
    }

    fn as_int(&self) -> Result<i128, Error> {
        Err(Error::wrong_kind(Kind::Integer, self.kind()))
    }

    fn as_float(&self) -> Result<f64, Error> {
        Err(Error::wrong_kind(Kind::Float, self.kind()))
    }

    fn as_str(&self) -> Result<&str, Error> {
        Err(Error::wrong_kind(Kind::String, self.kind()))
    }

    fn as_bytes(&self) -> Result<&[u8], Error> {
        Err(Error::wrong_kind(Kind::Bytes, self.kind()))
    }

    fn as_link(&self) -> Result<Cid, Error> {
        Err(Error::wrong_kind(Kind::Link, self.kind()))
    }
}

impl<T: Node + ?Sized> Node for &T {
    fn kind(&self) -> Kind {
        (**self).kind()
    }

    fn lookup_by_key(&self, key: &str) -> Result<NodeBox<'_>, Error> {
        (**self).lookup_by_key(key)
    }

    fn lookup_by_index(&self, index: usize) -> Result<NodeBox<'_>, Error> {
        (**self).lookup_by_index(index)
    }

    fn entries(&self) -> Result<MapIter<'_>, Error> {
        (**self).entries()
    }

    fn elements(&self) -> Result<ListIter<'_>, Error> {
        (**self).elements()
    }

    fn length(&self) -> Option<usize> {
        (**self).length()
    }

    fn as_bool(&self) -> Result<bool, Error> {
        (**self).as_bool()
    }

    fn as_int(&self) -> Result<i128, Error> {
        (**self).as_int()
    }

    fn as_float(&self) -> Result<f64, Error> {
        (**self).as_float()
    }

    fn as_str(&self) -> Result<&str, Error> {
        (**self).as_str()
    }

    fn as_bytes(&self) -> Result<&[u8], Error> {
        (**self).as_bytes()
    }

    fn as_link(&self) -> Result<Cid, Error> {
        (**self).as_link()
    }
}

/// Incremental construction of a tree, driven by a decoder or by [`copy`].
///
/// The grammar is the one of a pull parser:
/// - a map is `begin_map`, then for each entry `assemble_key`,
///   `assign_string(key)`, `assemble_value` and the value, then `finish`;
/// - a list is `begin_list`, then for each element `assemble_value` and the
///   value, then `finish`;
/// - a scalar is a single `assign_*` call.
///
/// `finish` closes the innermost open map or list. Calls out of this grammar
/// fail with [`Error::Misuse`]; values of the wrong shape for a typed
/// assembler fail with [`Error::Schema`].
pub trait Assembler {
    fn begin_map(&mut self, size_hint: Option<usize>) -> Result<(), Error>;

    fn begin_list(&mut self, size_hint: Option<usize>) -> Result<(), Error>;

    fn assemble_key(&mut self) -> Result<(), Error>;

    fn assemble_value(&mut self) -> Result<(), Error>;

    fn assign_null(&mut self) -> Result<(), Error>;

    fn assign_bool(&mut self, value: bool) -> Result<(), Error>;

    fn assign_int(&mut self, value: i128) -> Result<(), Error>;

    fn assign_float(&mut self, value: f64) -> Result<(), Error>;

    fn assign_string(&mut self, value: &str) -> Result<(), Error>;

    fn assign_bytes(&mut self, value: &[u8]) -> Result<(), Error>;

    fn assign_link(&mut self, value: Cid) -> Result<(), Error>;

    fn finish(&mut self) -> Result<(), Error>;
}

/// Drives `assembler` with the content of `node`.
///
/// Map entries are emitted in the node's own iteration order. Trees with
/// more than [`MAX_DEPTH`] nested maps and lists fail with
/// [`Error::TooDeep`].
pub fn copy(node: &dyn Node, assembler: &mut dyn Assembler) -> Result<(), Error> {
    copy_at(node, assembler, 0)
}

fn copy_at(node: &dyn Node, assembler: &mut dyn Assembler, depth: usize) -> Result<(), Error> {
    match node.kind() {
        Kind::Null => assembler.assign_null(),
        Kind::Bool => assembler.assign_bool(node.as_bool()?),
        Kind::Integer => assembler.assign_int(node.as_int()?),
        Kind::Float => assembler.assign_float(node.as_float()?),
        Kind::String => assembler.assign_string(node.as_str()?),
        Kind::Bytes => assembler.assign_bytes(node.as_bytes()?),
        Kind::Link => assembler.assign_link(node.as_link()?),
        Kind::List => {
            check_depth(depth)?;
            assembler.begin_list(node.length())?;
            for item in node.elements()? {
                assembler.assemble_value()?;
                copy_at(&*item, assembler, depth + 1)?;
            }
            assembler.finish()
        }
        Kind::Map => {
            check_depth(depth)?;
            assembler.begin_map(node.length())?;
            for (key, value) in node.entries()? {
                assembler.assemble_key()?;
                assembler.assign_string(key)?;
                assembler.assemble_value()?;
                copy_at(&*value, assembler, depth + 1)?;
            }
            assembler.finish()
        }
    }
}

/// Fails if a map or list opened inside `depth` others exceeds [`MAX_DEPTH`].
pub(crate) fn check_depth(depth: usize) -> Result<(), Error> {
    if depth >= MAX_DEPTH {
        log::trace!("rejecting tree nested deeper than {MAX_DEPTH} levels");
        return Err(Error::TooDeep(MAX_DEPTH));
    }
    Ok(())
}

/// Progress of an assembler through one map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MapState {
    /// Ready for the next key, or for `finish`.
    Initial,
    /// `assemble_key` was called, the key string is expected.
    MidKey,
    /// The key is fixed, `assemble_value` is expected.
    ExpectValue,
    /// The value is being assembled.
    MidValue,
}

/// One call of the [`Assembler`] grammar, as a value.
///
/// Nested assemblers are driven by forwarding calls, so they implement a
/// single `step` method and get their [`Assembler`] impl from
/// [`assembler_via_step`].
#[derive(Debug, Clone, Copy)]
pub(crate) enum Call<'v> {
    BeginMap(Option<usize>),
    BeginList(Option<usize>),
    AssembleKey,
    AssembleValue,
    Null,
    Bool(bool),
    Int(i128),
    Float(f64),
    String(&'v str),
    Bytes(&'v [u8]),
    Link(Cid),
    Finish,
}

impl Call<'_> {
    /// Kind of the value this call starts or assigns.
    pub(crate) fn kind(&self) -> Option<Kind> {
        match self {
            Self::BeginMap(_) => Some(Kind::Map),
            Self::BeginList(_) => Some(Kind::List),
            Self::Null => Some(Kind::Null),
            Self::Bool(_) => Some(Kind::Bool),
            Self::Int(_) => Some(Kind::Integer),
            Self::Float(_) => Some(Kind::Float),
            Self::String(_) => Some(Kind::String),
            Self::Bytes(_) => Some(Kind::Bytes),
            Self::Link(_) => Some(Kind::Link),
            Self::AssembleKey | Self::AssembleValue | Self::Finish => None,
        }
    }

    /// The scalar assigned by this call, if it is a scalar assignment.
    pub(crate) fn scalar(&self) -> Option<Ipld> {
        match *self {
            Self::Null => Some(Ipld::Null),
            Self::Bool(b) => Some(Ipld::Bool(b)),
            Self::Int(i) => Some(Ipld::Integer(i)),
            Self::Float(f) => Some(Ipld::Float(f)),
            Self::String(s) => Some(Ipld::String(s.to_owned())),
            Self::Bytes(b) => Some(Ipld::Bytes(b.to_vec())),
            Self::Link(cid) => Some(Ipld::Link(cid)),
            _ => None,
        }
    }
}

macro_rules! assembler_via_step {
    ($ty:ty) => {
        impl $crate::datamodel::Assembler for $ty {
            fn begin_map(&mut self, size_hint: Option<usize>) -> Result<(), $crate::Error> {
                self.step($crate::datamodel::Call::BeginMap(size_hint))
            }

            fn begin_list(&mut self, size_hint: Option<usize>) -> Result<(), $crate::Error> {
                self.step($crate::datamodel::Call::BeginList(size_hint))
            }

            fn assemble_key(&mut self) -> Result<(), $crate::Error> {
                self.step($crate::datamodel::Call::AssembleKey)
            }

            fn assemble_value(&mut self) -> Result<(), $crate::Error> {
                self.step($crate::datamodel::Call::AssembleValue)
            }

            fn assign_null(&mut self) -> Result<(), $crate::Error> {
                self.step($crate::datamodel::Call::Null)
            }

            fn assign_bool(&mut self, value: bool) -> Result<(), $crate::Error> {
                self.step($crate::datamodel::Call::Bool(value))
            }

            fn assign_int(&mut self, value: i128) -> Result<(), $crate::Error> {
                self.step($crate::datamodel::Call::Int(value))
            }

            fn assign_float(&mut self, value: f64) -> Result<(), $crate::Error> {
                self.step($crate::datamodel::Call::Float(value))
            }

            fn assign_string(&mut self, value: &str) -> Result<(), $crate::Error> {
                self.step($crate::datamodel::Call::String(value))
            }

            fn assign_bytes(&mut self, value: &[u8]) -> Result<(), $crate::Error> {
                self.step($crate::datamodel::Call::Bytes(value))
            }

            fn assign_link(&mut self, value: libipld::Cid) -> Result<(), $crate::Error> {
                self.step($crate::datamodel::Call::Link(value))
            }

            fn finish(&mut self) -> Result<(), $crate::Error> {
                self.step($crate::datamodel::Call::Finish)
            }
        }
    };
}

pub(crate) use assembler_via_step;

mod ipld;
