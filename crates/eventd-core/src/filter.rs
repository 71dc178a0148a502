//! Class filters for subscriptions and polls.

use std::collections::HashSet;

use eventd_proto::WILDCARD_CLASS;

use crate::error::Error;

/// A set of managed-object class names, with `*` matching every class
/// including ones unknown at filter creation time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassFilter {
    classes: HashSet<String>,
    wildcard: bool,
}

impl ClassFilter {
    /// An empty filter that matches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A wildcard filter that matches every class.
    pub fn all() -> Self {
        Self {
            classes: HashSet::new(),
            wildcard: true,
        }
    }

    /// Build a filter from class names, validating them.
    ///
    /// Fails with [`Error::InvalidClassSet`] on an empty set or an empty
    /// class name. `*` anywhere in the set makes the filter match all.
    pub fn from_classes<I, S>(classes: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::empty();
        let mut seen = 0usize;
        for class in classes {
            let class = class.as_ref();
            seen += 1;
            if class.is_empty() {
                return Err(Error::InvalidClassSet("empty class name".to_string()));
            }
            if class == WILDCARD_CLASS {
                filter.wildcard = true;
            } else {
                filter.classes.insert(class.to_string());
            }
        }
        if seen == 0 {
            return Err(Error::InvalidClassSet("empty class set".to_string()));
        }
        Ok(filter)
    }

    /// Whether a record of the given class passes this filter.
    pub fn matches(&self, class: &str) -> bool {
        self.wildcard || self.classes.contains(class)
    }

    /// Union another filter into this one.
    pub fn union_with(&mut self, other: &ClassFilter) {
        self.wildcard |= other.wildcard;
        for class in &other.classes {
            self.classes.insert(class.clone());
        }
    }

    /// Subtract another filter's classes from this one.
    ///
    /// Removing `*` clears the whole filter. Removing named classes from a
    /// wildcard filter leaves the wildcard in place: `*` is a grant over
    /// all classes, not shorthand for the currently known ones.
    pub fn subtract(&mut self, other: &ClassFilter) {
        if other.wildcard {
            self.classes.clear();
            self.wildcard = false;
            return;
        }
        for class in &other.classes {
            self.classes.remove(class);
        }
    }

    /// Intersection of this filter with another.
    pub fn intersect(&self, other: &ClassFilter) -> ClassFilter {
        if self.wildcard {
            return other.clone();
        }
        if other.wildcard {
            return self.clone();
        }
        ClassFilter {
            classes: self.classes.intersection(&other.classes).cloned().collect(),
            wildcard: false,
        }
    }

    /// Whether the filter matches nothing.
    pub fn is_empty(&self) -> bool {
        !self.wildcard && self.classes.is_empty()
    }

    /// Class names for the boundary (token payload, logs). A wildcard
    /// filter renders as `["*"]`.
    pub fn class_names(&self) -> Vec<String> {
        if self.wildcard {
            return vec![WILDCARD_CLASS.to_string()];
        }
        let mut names: Vec<String> = self.classes.iter().cloned().collect();
        names.sort();
        names
    }
}
