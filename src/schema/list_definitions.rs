use indexmap::IndexMap;

use super::{InkList, ListItem};

/// A `LIST` declaration: a named set of items, each with an integer value.
#[derive(Clone, Debug, PartialEq)]
pub struct ListDefinition {
    pub(crate) name: String,
    pub(crate) items: IndexMap<String, i32>,
}

impl ListDefinition {
    pub fn new<S: Into<String>>(name: S, items: IndexMap<String, i32>) -> Self {
        Self { name: name.into(), items }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every item of this definition, paired with its value.
    pub fn items(&self) -> impl Iterator<Item = (ListItem, i32)> + '_ {
        self.items
            .iter()
            .map(move |(item_name, value)| (ListItem::new(self.name.clone(), item_name.clone()), *value))
    }

    pub(crate) fn item_with_value(&self, value: i32) -> Option<ListItem> {
        self.items
            .iter()
            .find(|(_, item_value)| **item_value == value)
            .map(|(item_name, _)| ListItem::new(self.name.clone(), item_name.clone()))
    }
}

/// All the list definitions of a story, with a lookup cache for bare item names.
#[derive(Clone, Debug, Default)]
pub struct ListDefinitions {
    list_definitions: IndexMap<String, ListDefinition>,
    list_entry_lookup_cache: IndexMap<String, (ListItem, i32)>,
}

impl ListDefinitions {
    pub(crate) fn new(list_definitions: Vec<ListDefinition>) -> Self {
        let list_definitions = list_definitions
            .into_iter()
            .map(|def| (def.name.to_string(), def))
            .collect::<IndexMap<_, _>>();

        // Ambiguous bare names overwrite each other; the compiler rejects those stories anyway.
        let mut list_entry_lookup_cache = IndexMap::new();
        for def in list_definitions.values() {
            for (item, value) in def.items() {
                list_entry_lookup_cache.insert(item.item_name.clone(), (item.clone(), value));
                list_entry_lookup_cache.insert(item.full_name(), (item, value));
            }
        }

        Self {
            list_definitions,
            list_entry_lookup_cache,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.list_definitions.is_empty()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ListDefinition> {
        self.list_definitions.values()
    }

    pub(crate) fn list_definition_by_name(&self, name: &str) -> Option<&ListDefinition> {
        self.list_definitions.get(name)
    }

    /// The single item list named either `item` or `origin.item`.
    pub(crate) fn find_single_item_list_with_name(&self, name: &str) -> Option<InkList> {
        self.list_entry_lookup_cache
            .get(name)
            .map(|(item, value)| InkList::from_single(item.clone(), *value))
    }

    pub(crate) fn all_from_origins<'a, I: IntoIterator<Item = &'a String>>(&self, origins: I) -> InkList {
        let mut list = InkList::new();
        for def in origins.into_iter().filter_map(|origin| self.list_definition_by_name(origin)) {
            for (item, value) in def.items() {
                list.insert(item, value);
            }
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colours() -> ListDefinitions {
        let items = [("red", 1), ("green", 2), ("blue", 3)]
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect();
        ListDefinitions::new(vec![ListDefinition::new("colours", items)])
    }

    #[test]
    fn finds_items_by_bare_and_full_name() {
        let defs = colours();
        let bare = defs.find_single_item_list_with_name("green").unwrap();
        let full = defs.find_single_item_list_with_name("colours.green").unwrap();
        assert_eq!(bare, full);
        assert_eq!(bare.max_item().map(|(_, value)| value), Some(2));
        assert!(defs.find_single_item_list_with_name("purple").is_none());
    }

    #[test]
    fn looks_up_items_by_value() {
        let defs = colours();
        let def = defs.list_definition_by_name("colours").unwrap();
        assert_eq!(def.item_with_value(3).map(|item| item.item_name), Some("blue".to_string()));
        assert!(def.item_with_value(4).is_none());
    }
}
