//! Resolved collection values
//!
//! [`CollectionResults`] is what a consumed collection hands back: an ordered
//! sequence of primary keys or instances. It compares against literal
//! sequences (ordered) and sets (unordered), and renders as a bracketed
//! listing that truncates past a configurable threshold.

use std::collections::HashSet;
use std::fmt;

use crate::model::Instance;
use crate::store::Store;

/// One resolved element, shaped by the collection's output mode.
pub enum ResultItem<'a, S: Store> {
    /// A primary key
    Pk(String),
    /// A materialized instance handle
    Instance(Instance<'a, S>),
}

// Manual impls: the store type itself carries no equality or debug shape.
impl<S: Store> Clone for ResultItem<'_, S> {
    fn clone(&self) -> Self {
        match self {
            ResultItem::Pk(pk) => ResultItem::Pk(pk.clone()),
            ResultItem::Instance(instance) => ResultItem::Instance(instance.clone()),
        }
    }
}

impl<S: Store> fmt::Debug for ResultItem<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultItem::Pk(pk) => f.debug_tuple("Pk").field(pk).finish(),
            ResultItem::Instance(instance) => f.debug_tuple("Instance").field(instance).finish(),
        }
    }
}

impl<S: Store> PartialEq for ResultItem<'_, S> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ResultItem::Pk(a), ResultItem::Pk(b)) => a == b,
            (ResultItem::Instance(a), ResultItem::Instance(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a, S: Store> ResultItem<'a, S> {
    /// The element's primary key, whatever its shape
    pub fn pk(&self) -> &str {
        match self {
            ResultItem::Pk(pk) => pk,
            ResultItem::Instance(instance) => instance.pk(),
        }
    }

    /// The instance, when one was materialized
    pub fn instance(&self) -> Option<&Instance<'a, S>> {
        match self {
            ResultItem::Pk(_) => None,
            ResultItem::Instance(instance) => Some(instance),
        }
    }

    /// Consumes the element into its instance, when one was materialized
    pub fn into_instance(self) -> Option<Instance<'a, S>> {
        match self {
            ResultItem::Pk(_) => None,
            ResultItem::Instance(instance) => Some(instance),
        }
    }
}

/// Ordered result of one collection resolution.
pub struct CollectionResults<'a, S: Store> {
    items: Vec<ResultItem<'a, S>>,
    truncate_at: usize,
}

impl<S: Store> Clone for CollectionResults<'_, S> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            truncate_at: self.truncate_at,
        }
    }
}

impl<S: Store> fmt::Debug for CollectionResults<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}

impl<'a, S: Store> CollectionResults<'a, S> {
    pub(crate) fn new(items: Vec<ResultItem<'a, S>>, truncate_at: usize) -> Self {
        Self { items, truncate_at }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing matched
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Element by position
    pub fn get(&self, index: usize) -> Option<&ResultItem<'a, S>> {
        self.items.get(index)
    }

    /// Iterates the elements in order
    pub fn iter(&self) -> std::slice::Iter<'_, ResultItem<'a, S>> {
        self.items.iter()
    }

    /// Primary keys in resolution order
    pub fn pks(&self) -> Vec<String> {
        self.items.iter().map(|item| item.pk().to_string()).collect()
    }

    /// Primary keys as a set
    pub fn pk_set(&self) -> HashSet<String> {
        self.items.iter().map(|item| item.pk().to_string()).collect()
    }

    /// Materialized instances, in order. Empty for pk-mode results.
    pub fn into_instances(self) -> Vec<Instance<'a, S>> {
        self.items
            .into_iter()
            .filter_map(ResultItem::into_instance)
            .collect()
    }
}

impl<'a, S: Store> IntoIterator for CollectionResults<'a, S> {
    type Item = ResultItem<'a, S>;
    type IntoIter = std::vec::IntoIter<ResultItem<'a, S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, 'b, S: Store> IntoIterator for &'b CollectionResults<'a, S> {
    type Item = &'b ResultItem<'a, S>;
    type IntoIter = std::slice::Iter<'b, ResultItem<'a, S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<S: Store> fmt::Display for CollectionResults<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        let shown = self.items.len().min(self.truncate_at);
        for (position, item) in self.items.iter().take(shown).enumerate() {
            if position > 0 {
                write!(f, ", ")?;
            }
            match item {
                ResultItem::Pk(pk) => write!(f, "\"{}\"", pk)?,
                ResultItem::Instance(instance) => write!(f, "{:?}", instance)?,
            }
        }
        let remaining = self.items.len() - shown;
        if remaining > 0 {
            if shown > 0 {
                write!(f, ", ")?;
            }
            write!(f, "\"... ({} remaining elements truncated)...\"", remaining)?;
        }
        write!(f, "]")
    }
}

// Ordered comparison against literal sequences
impl<S: Store> PartialEq<Vec<&str>> for CollectionResults<'_, S> {
    fn eq(&self, other: &Vec<&str>) -> bool {
        self.items.len() == other.len()
            && self.items.iter().zip(other).all(|(item, pk)| item.pk() == *pk)
    }
}

impl<S: Store> PartialEq<&[&str]> for CollectionResults<'_, S> {
    fn eq(&self, other: &&[&str]) -> bool {
        self.items.len() == other.len()
            && self.items.iter().zip(*other).all(|(item, pk)| item.pk() == *pk)
    }
}

impl<S: Store, const N: usize> PartialEq<[&str; N]> for CollectionResults<'_, S> {
    fn eq(&self, other: &[&str; N]) -> bool {
        self == &other.as_slice()
    }
}

impl<S: Store> PartialEq<Vec<String>> for CollectionResults<'_, S> {
    fn eq(&self, other: &Vec<String>) -> bool {
        self.items.len() == other.len()
            && self
                .items
                .iter()
                .zip(other)
                .all(|(item, pk)| item.pk() == pk.as_str())
    }
}

// Unordered comparison against literal sets
impl<S: Store> PartialEq<HashSet<&str>> for CollectionResults<'_, S> {
    fn eq(&self, other: &HashSet<&str>) -> bool {
        if self.items.len() != other.len() {
            return false;
        }
        let own: HashSet<&str> = self.items.iter().map(ResultItem::pk).collect();
        own.len() == other.len() && other.iter().all(|pk| own.contains(pk))
    }
}
