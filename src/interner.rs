use std::{borrow::Borrow, fmt, rc::Rc};

use indexmap::IndexSet;

/// A member or identifier name. Clones share one allocation; equality and hashing
/// go by content so names from different interners still compare correctly.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Rc<str>);

impl Name {
    pub fn new(text: &str) -> Self {
        Self(Rc::from(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(text: &str) -> Self {
        Name::new(text)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

/// Deduplicating name table owned by a `Runtime`.
#[derive(Debug, Default)]
pub struct Interner {
    names: IndexSet<Rc<str>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, text: &str) -> Name {
        if let Some(existing) = self.names.get(text) {
            return Name(Rc::clone(existing));
        }
        let name: Rc<str> = Rc::from(text);
        self.names.insert(Rc::clone(&name));
        Name(name)
    }
}

