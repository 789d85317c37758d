use alloc::{sync::Arc, vec::Vec};
use core::fmt;

/// Object key in a [`Path`].
pub type Key = Arc<str>;
/// Array index in a [`Path`].
pub type Index = usize;

/// A component in the path to a JSON value.
///
/// Paths are sequences of keys or indices (for objects and arrays,
/// respectively) used in [`ValidationError`](crate::ValidationError) to
/// point at the value that failed a schema constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathComponent {
    /// Member of an object.
    Key(Key),
    /// Element of an array.
    Index(Index),
}

impl From<&str> for PathComponent {
    fn from(s: &str) -> Self {
        Self::Key(s.into())
    }
}

impl From<usize> for PathComponent {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

#[doc(hidden)]
pub trait PathComponentFrom<T> {
    fn from_path_component(value: T) -> PathComponent;
}

macro_rules! impl_integer_as_path_component {
    ($($t:ty),+) => {
        $(
            impl PathComponentFrom<$t> for PathComponent {
                fn from_path_component(value: $t) -> Self {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    PathComponent::Index(value as Index)
                }
            }
        )+
    };
}
impl_integer_as_path_component!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl PathComponentFrom<&str> for PathComponent {
    fn from_path_component(value: &str) -> Self {
        PathComponent::Key(value.into())
    }
}

/// Location of a value inside a document, rendered as `a.b[0].c`.
///
/// The empty path denotes the root and renders as `$`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path(pub Vec<PathComponent>);

impl Path {
    /// The empty path.
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Whether this is the empty path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new path extended by `component`.
    #[must_use]
    pub fn join(&self, component: impl Into<PathComponent>) -> Self {
        let mut components = Vec::with_capacity(self.0.len() + 1);
        components.extend_from_slice(&self.0);
        components.push(component.into());
        Self(components)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("$");
        }
        for (i, component) in self.0.iter().enumerate() {
            match component {
                PathComponent::Key(key) if i == 0 => f.write_str(key)?,
                PathComponent::Key(key) => write!(f, ".{key}")?,
                PathComponent::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

// A path serializes as e.g. `["foo", 0, "bar"]`.
#[cfg(feature = "serde")]
mod serde_impls {
    use serde::{Serialize, Serializer, ser::SerializeSeq};

    use super::{Path, PathComponent};

    impl Serialize for PathComponent {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match self {
                PathComponent::Key(k) => serializer.serialize_str(k),
                PathComponent::Index(i) => serializer.serialize_u64(*i as u64),
            }
        }
    }

    impl Serialize for Path {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
            for component in &self.0 {
                seq.serialize_element(component)?;
            }
            seq.end()
        }
    }
}
