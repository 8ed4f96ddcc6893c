//! The declared-type grammar the classifier consumes.
//!
//! [`RawType`] is the structural form a source parser (an external
//! collaborator, out of scope here) produces for each field declaration.
//! It deliberately represents more than the supported taxonomy — inline
//! structs, maps, interfaces, variadic and multi-dimensional arrays are
//! all expressible so the classifier can reject them with a useful error
//! instead of the parser silently dropping them.

/// Declared size of a fixed array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArrayLen {
    /// A concrete element count.
    Fixed(usize),
    /// A variadic declaration (`[...]T`); always rejected.
    Variadic,
}

/// An inline (anonymous) type that can never be classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InlineKind {
    /// An anonymous record literal in field position.
    Struct,
    /// An interface / trait-object type.
    Interface,
    /// A map / dictionary type.
    Map,
}

/// The declared type of a field, as parsed from source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawType {
    /// A named type: a built-in scalar, a string, or a record reference.
    Named(String),
    /// A single level of indirection.
    Pointer(Box<RawType>),
    /// A fixed-size array.
    Array {
        /// Declared element count.
        len: ArrayLen,
        /// Declared element type.
        elem: Box<RawType>,
    },
    /// A dynamically sized array.
    Slice(Box<RawType>),
    /// An inline anonymous type (always rejected by the classifier).
    Inline(InlineKind),
}

impl RawType {
    /// Shorthand for a named type.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Shorthand for a pointer to `inner`.
    pub fn pointer(inner: RawType) -> Self {
        Self::Pointer(Box::new(inner))
    }

    /// Shorthand for a fixed array of `len` × `elem`.
    pub fn array(len: usize, elem: RawType) -> Self {
        Self::Array {
            len: ArrayLen::Fixed(len),
            elem: Box::new(elem),
        }
    }

    /// Shorthand for a slice of `elem`.
    pub fn slice(elem: RawType) -> Self {
        Self::Slice(Box::new(elem))
    }

    /// A human-readable rendering for error messages and passthrough
    /// metadata (`*[4]u8`, `[]*Point`, ...).
    pub fn display_name(&self) -> String {
        match self {
            Self::Named(name) => name.clone(),
            Self::Pointer(inner) => format!("*{}", inner.display_name()),
            Self::Array {
                len: ArrayLen::Fixed(n),
                elem,
            } => format!("[{}]{}", n, elem.display_name()),
            Self::Array {
                len: ArrayLen::Variadic,
                elem,
            } => format!("[...]{}", elem.display_name()),
            Self::Slice(elem) => format!("[]{}", elem.display_name()),
            Self::Inline(InlineKind::Struct) => "struct{..}".to_string(),
            Self::Inline(InlineKind::Interface) => "interface{..}".to_string(),
            Self::Inline(InlineKind::Map) => "map[..]..".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_compositions() {
        let t = RawType::pointer(RawType::array(4, RawType::pointer(RawType::named("Point"))));
        assert_eq!(t.display_name(), "*[4]*Point");
        assert_eq!(
            RawType::slice(RawType::named("str")).display_name(),
            "[]str"
        );
        assert_eq!(
            RawType::Array {
                len: ArrayLen::Variadic,
                elem: Box::new(RawType::named("u8")),
            }
            .display_name(),
            "[...]u8"
        );
    }
}
