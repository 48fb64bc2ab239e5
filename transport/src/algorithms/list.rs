//! Defines a list to hold all algorithms of the same type in order of preference.

use super::helpers::validate_algorithm_name;
use crate::errors::InvalidNameError;

/// A trait to abstract over algorithms being named.
///
/// This is mainly used to identify and find algorithms by their name.
pub trait Nameable {
    /// Returns the name of `self`.
    ///
    /// The assigned name of a value must remain the same for the algorithm list to work correctly.
    fn name(&self) -> &'static str;
}

macro_rules! impl_nameable {
    ($($entry:ty),*) => {
        $(
            impl Nameable for $entry {
                fn name(&self) -> &'static str {
                    self.name
                }
            }
        )*
    };
}

impl_nameable!(
    super::KeyExchangeAlgorithmEntry,
    super::HostKeyAlgorithmEntry,
    super::EncryptionAlgorithmEntry,
    super::MacAlgorithmEntry
);

/// Specifies where to add an algorithm into the list.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ListPosition {
    /// Adds an algorithm to the front of the list, giving it priority over existing algorithms.
    Front,
    /// Adds an algorithm to the back of the list, giving existing algorithms priority over it.
    Back,
    /// Replaces an algorithm of the same name in the list at its position.
    ///
    /// If no such algorithm exists, the algorithm is not inserted into the list.
    CurrentPosition,
}

/// A list holding all algorithms of the same type, the first one being the most preferred.
#[derive(Debug)]
pub struct AlgorithmList<Entry: Nameable> {
    /// The list of algorithm entries.
    list: Vec<Entry>,
}

impl<Entry: Nameable> Default for AlgorithmList<Entry> {
    fn default() -> AlgorithmList<Entry> {
        AlgorithmList::new()
    }
}

impl<Entry: Nameable> AlgorithmList<Entry> {
    /// Creates a new empty algorithm list.
    pub fn new() -> AlgorithmList<Entry> {
        AlgorithmList { list: Vec::new() }
    }

    /// Adds an entry describing an algorithm into the list.
    ///
    /// Read the documentation of [`ListPosition`] to learn more about where the entry can be
    /// added into the list.
    pub fn add_raw(
        &mut self,
        entry: Entry,
        position: ListPosition,
    ) -> Result<&mut Self, InvalidNameError> {
        validate_algorithm_name(entry.name())?;

        match position {
            ListPosition::Front => {
                self.remove(entry.name());
                self.list.insert(0, entry);
            }
            ListPosition::Back => {
                self.remove(entry.name());
                self.list.push(entry);
            }
            ListPosition::CurrentPosition => {
                if let Some(idx) = self.find_index(entry.name()) {
                    self.list[idx] = entry;
                }
            }
        }

        Ok(self)
    }

    /// Adds a new algorithm to the list.
    ///
    /// If another algorithm with the same name is already present in the list, it is removed prior
    /// to adding the new algorithm, unless `position` is [`ListPosition::CurrentPosition`].
    pub fn add<Alg: Into<Entry>>(
        &mut self,
        new_alg: Alg,
        position: ListPosition,
    ) -> Result<&mut Self, InvalidNameError> {
        self.add_raw(new_alg.into(), position)
    }

    /// Removes the algorithm with the given name and returns `true` if it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.find_index(name) {
            Some(idx) => {
                self.list.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Returns `true` if and only if the list doesn't contain any items.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Clears all algorithms from the list.
    pub fn clear(&mut self) {
        self.list.clear();
    }

    /// Returns `true` if and only if an algorithm named `name` is contained in the list.
    pub fn contains_algorithm(&self, name: &str) -> bool {
        self.find_index(name).is_some()
    }

    /// Finds the index of the algorithm with the given name, if it is present in the list.
    fn find_index(&self, name: &str) -> Option<usize> {
        self.list.iter().position(|entry| entry.name() == name)
    }

    /// Returns a reference to the algorithm named `name`, if it exists in the list.
    pub(crate) fn algorithm(&self, name: &str) -> Option<&Entry> {
        self.find_index(name).map(|idx| &self.list[idx])
    }

    /// Iterates over the algorithms in order of preference.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.list.iter()
    }

    /// Returns the names of all algorithms in order of preference.
    pub fn names(&self) -> Vec<&'static str> {
        self.list.iter().map(Nameable::name).collect()
    }
}
