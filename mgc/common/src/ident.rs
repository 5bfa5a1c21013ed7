use std::fmt;

use smol_str::SmolStr;

/// The name of a value, function, object, namespace or type
///
/// Idents are cloned freely throughout the compiler, so the backing
/// storage is a `SmolStr` which is stack-allocated for the majority of
/// practical names.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Ident(SmolStr);

impl Ident {
    pub fn new(value: impl AsRef<str>) -> Self {
        Ident(SmolStr::new(value))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Ident {
    fn from(value: &str) -> Self {
        Ident::new(value)
    }
}

impl PartialEq<&str> for Ident {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl PartialEq<Ident> for &str {
    fn eq(&self, other: &Ident) -> bool {
        other == self
    }
}
