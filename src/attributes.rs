use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

pub struct AttributeKey<T> {
    name: &'static str,
    _value: PhantomData<fn() -> T>,
}

impl<T> AttributeKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _value: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for AttributeKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AttributeKey<T> {}

impl<T> fmt::Debug for AttributeKey<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_tuple("AttributeKey").field(&self.name).finish()
    }
}

struct Entry {
    name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

#[derive(Default)]
pub struct Attributes {
    entries: Vec<Entry>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T>(&mut self, key: AttributeKey<T>, value: T) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        for entry in &mut self.entries {
            if entry.name == key.name {
                if let Some(slot) = entry.value.downcast_mut::<T>() {
                    return Some(std::mem::replace(slot, value));
                }
            }
        }
        self.entries.push(Entry {
            name: key.name,
            value: Box::new(value),
        });
        None
    }

    pub fn get<T>(&self, key: AttributeKey<T>) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.entries
            .iter()
            .find(|entry| entry.name == key.name && entry.value.is::<T>())
            .and_then(|entry| entry.value.downcast_ref::<T>())
    }

    pub fn get_mut<T>(&mut self, key: AttributeKey<T>) -> Option<&mut T>
    where
        T: Send + Sync + 'static,
    {
        self.entries
            .iter_mut()
            .find(|entry| entry.name == key.name && entry.value.is::<T>())
            .and_then(|entry| entry.value.downcast_mut::<T>())
    }

    pub fn remove<T>(&mut self, key: AttributeKey<T>) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.name == key.name && entry.value.is::<T>())?;
        let entry = self.entries.remove(index);
        entry.value.downcast::<T>().ok().map(|value| *value)
    }

    pub fn contains<T>(&self, key: AttributeKey<T>) -> bool
    where
        T: Send + Sync + 'static,
    {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|entry| entry.name)
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{AttributeKey, Attributes};

    const NAME: AttributeKey<String> = AttributeKey::new("test.name");
    const COUNT: AttributeKey<u32> = AttributeKey::new("test.count");
    const SHADOW: AttributeKey<u32> = AttributeKey::new("test.name");

    #[test]
    fn set_then_get_recovers_typed_value() {
        let mut attributes = Attributes::new();
        assert!(attributes.set(NAME, "alpha".to_owned()).is_none());
        assert_eq!(attributes.get(NAME).map(String::as_str), Some("alpha"));
    }

    #[test]
    fn replacing_a_value_returns_the_previous_one_and_keeps_order() {
        let mut attributes = Attributes::new();
        attributes.set(NAME, "alpha".to_owned());
        attributes.set(COUNT, 1);
        let previous = attributes.set(NAME, "beta".to_owned());
        assert_eq!(previous.as_deref(), Some("alpha"));
        let names: Vec<_> = attributes.names().collect();
        assert_eq!(names, vec!["test.name", "test.count"]);
    }

    #[test]
    fn same_name_different_type_addresses_a_separate_slot() {
        let mut attributes = Attributes::new();
        attributes.set(NAME, "alpha".to_owned());
        attributes.set(SHADOW, 7);
        assert_eq!(attributes.get(NAME).map(String::as_str), Some("alpha"));
        assert_eq!(attributes.get(SHADOW), Some(&7));
    }

    #[test]
    fn remove_takes_the_value_out() {
        let mut attributes = Attributes::new();
        attributes.set(COUNT, 3);
        assert_eq!(attributes.remove(COUNT), Some(3));
        assert!(!attributes.contains(COUNT));
        assert!(attributes.is_empty());
    }
}
