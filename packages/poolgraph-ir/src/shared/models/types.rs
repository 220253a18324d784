//! Element types
//!
//! The transform only needs enough of a type system to size pool elements
//! and to notice when the shape analysis collapsed a node to "opaque".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type attached to values and heap nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Void,
    /// Integer with the given bit width
    Int(u32),
    Ptr(Box<Type>),
    Struct(Vec<Type>),
    /// Nominal type with a known byte size
    Named(String, u32),
    /// Collapsed: the element type is unknown
    Opaque,
    /// Handle to a pool descriptor, injected as a leading parameter
    PoolHandle,
}

impl Type {
    /// Shorthand for a pointer to `inner`
    #[inline]
    pub fn ptr_to(inner: Type) -> Self {
        Type::Ptr(Box::new(inner))
    }

    /// Size in bytes, `None` when the type carries no size (`Void`, `Opaque`)
    pub fn byte_size(&self) -> Option<u32> {
        match self {
            Type::Void | Type::Opaque => None,
            Type::Int(bits) => Some(bits.div_ceil(8)),
            Type::Ptr(_) | Type::PoolHandle => Some(8),
            Type::Struct(fields) => fields.iter().map(|f| f.byte_size()).sum(),
            Type::Named(_, size) => Some(*size),
        }
    }

    /// True when no element size can be derived
    #[inline]
    pub fn is_collapsed(&self) -> bool {
        self.byte_size().is_none()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{bits}"),
            Type::Ptr(inner) => write!(f, "{inner}*"),
            Type::Struct(fields) => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, "}}")
            }
            Type::Named(name, _) => write!(f, "%{name}"),
            Type::Opaque => write!(f, "opaque"),
            Type::PoolHandle => write!(f, "pool*"),
        }
    }
}
