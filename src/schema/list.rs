use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;

use super::{ListDefinitions, Value};

/// One item of a list, identified by the list it was declared in and its own name.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ListItem {
    pub(crate) origin_name: Option<String>,
    pub(crate) item_name: String,
}

impl ListItem {
    pub fn new<O: Into<String>, I: Into<String>>(origin_name: O, item_name: I) -> Self {
        Self {
            origin_name: Some(origin_name.into()),
            item_name: item_name.into(),
        }
    }

    /// Parses `origin.item`. A name without a dot has no known origin.
    pub fn from_full_name(full_name: &str) -> Self {
        match full_name.split_once('.') {
            Some(("?", item)) => Self { origin_name: None, item_name: item.to_owned() },
            Some((origin, item)) => Self::new(origin, item),
            None => Self { origin_name: None, item_name: full_name.to_owned() },
        }
    }

    pub fn origin_name(&self) -> Option<&str> {
        self.origin_name.as_deref()
    }

    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.origin_name.as_deref().unwrap_or("?"), self.item_name)
    }
}

/// The value of an ink `LIST` variable: a set of items, each carrying an integer value.
///
/// Storage keeps insertion order so that iteration is deterministic, but every
/// ordering operation sorts by value and then by origin name.
#[derive(Clone, Debug, Default)]
pub struct InkList {
    pub(crate) items: IndexMap<ListItem, i32>,
    /// Origins remembered for an empty list, so that e.g. `LIST_ALL` still works on it.
    pub(crate) initial_origin_names: Vec<String>,
}

impl PartialEq for InkList {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl InkList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_single(item: ListItem, value: i32) -> Self {
        let mut list = Self::new();
        list.insert(item, value);
        list
    }

    /// An empty list that knows it belongs to the named definition.
    pub fn with_origin<S: Into<String>>(origin: S) -> Self {
        Self {
            items: IndexMap::new(),
            initial_origin_names: vec![origin.into()],
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn insert(&mut self, item: ListItem, value: i32) {
        self.items.insert(item, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ListItem, i32)> {
        self.items.iter().map(|(item, value)| (item, *value))
    }

    pub fn contains_item(&self, item: &ListItem) -> bool {
        self.items.contains_key(item)
    }

    pub fn contains_item_named(&self, item_name: &str) -> bool {
        self.items.keys().any(|item| item.item_name == item_name)
    }

    /// The origin names of the items, or the remembered origins when empty.
    pub fn origin_names(&self) -> Vec<String> {
        if self.items.is_empty() {
            return self.initial_origin_names.clone();
        }
        let mut names: Vec<String> = vec![];
        for origin in self.items.keys().filter_map(|item| item.origin_name.as_ref()) {
            if !names.contains(origin) {
                names.push(origin.clone());
            }
        }
        names
    }

    pub(crate) fn set_initial_origin_names(&mut self, names: Vec<String>) {
        self.initial_origin_names = names;
    }

    pub fn ordered_items(&self) -> Vec<(&ListItem, i32)> {
        let mut ordered: Vec<_> = self.iter().collect();
        ordered.sort_by(|(a, a_value), (b, b_value)| {
            a_value
                .cmp(b_value)
                .then_with(|| a.origin_name.cmp(&b.origin_name))
        });
        ordered
    }

    pub fn min_item(&self) -> Option<(&ListItem, i32)> {
        self.ordered_items().into_iter().next()
    }

    pub fn max_item(&self) -> Option<(&ListItem, i32)> {
        self.ordered_items().into_iter().last()
    }

    fn min_value(&self) -> Option<i32> {
        self.min_item().map(|(_, value)| value)
    }

    fn max_value(&self) -> Option<i32> {
        self.max_item().map(|(_, value)| value)
    }

    fn derived(&self) -> Self {
        Self {
            items: IndexMap::new(),
            initial_origin_names: self.origin_names(),
        }
    }

    pub fn union(&self, other: &InkList) -> InkList {
        let mut union = self.clone();
        for (item, value) in other.iter() {
            union.items.insert(item.clone(), value);
        }
        union
    }

    pub fn intersect(&self, other: &InkList) -> InkList {
        let mut intersection = InkList::new();
        for (item, value) in self.iter().filter(|(item, _)| other.contains_item(item)) {
            intersection.insert(item.clone(), value);
        }
        intersection
    }

    pub fn without(&self, other: &InkList) -> InkList {
        let mut result = self.derived();
        for (item, value) in self.iter().filter(|(item, _)| !other.contains_item(item)) {
            result.insert(item.clone(), value);
        }
        result
    }

    /// Whether every item of `other` is in this list.
    pub fn contains(&self, other: &InkList) -> bool {
        other.items.keys().all(|item| self.contains_item(item))
    }

    /// True when every item here has a greater value than every item of `other`.
    pub fn greater_than(&self, other: &InkList) -> bool {
        match (self.min_value(), other.max_value()) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(min), Some(other_max)) => min > other_max,
        }
    }

    pub fn greater_than_or_equals(&self, other: &InkList) -> bool {
        if self.is_empty() {
            return false;
        }
        if other.is_empty() {
            return true;
        }
        self.min_value() >= other.min_value() && self.max_value() >= other.max_value()
    }

    pub fn less_than(&self, other: &InkList) -> bool {
        match (self.max_value(), other.min_value()) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(max), Some(other_min)) => max < other_min,
        }
    }

    pub fn less_than_or_equals(&self, other: &InkList) -> bool {
        if other.is_empty() {
            return false;
        }
        if self.is_empty() {
            return true;
        }
        self.max_value() <= other.max_value() && self.min_value() <= other.min_value()
    }

    pub fn min_as_list(&self) -> InkList {
        match self.min_item() {
            Some((item, value)) => InkList::from_single(item.clone(), value),
            None => self.derived(),
        }
    }

    pub fn max_as_list(&self) -> InkList {
        match self.max_item() {
            Some((item, value)) => InkList::from_single(item.clone(), value),
            None => self.derived(),
        }
    }

    /// Every item of this list's origins that is not in the list itself.
    pub fn inverse(&self, definitions: &ListDefinitions) -> InkList {
        let mut inverse = self.derived();
        for (item, value) in definitions.all_from_origins(&self.origin_names()).items {
            if !self.contains_item(&item) {
                inverse.insert(item, value);
            }
        }
        inverse
    }

    /// Every item of this list's origins.
    pub fn all(&self, definitions: &ListDefinitions) -> InkList {
        let mut all = definitions.all_from_origins(&self.origin_names());
        all.initial_origin_names = self.origin_names();
        all
    }

    /// The items whose values fall within the bounds, inclusive.
    ///
    /// Bounds are either integers, or lists whose minimum (for the lower
    /// bound) or maximum (for the upper bound) is used.
    pub fn sub_range(&self, min_bound: &Value, max_bound: &Value) -> InkList {
        if self.is_empty() {
            return InkList::new();
        }
        let min = match min_bound {
            Value::Int(value) => *value,
            Value::List(list) => list.min_value().unwrap_or(0),
            _ => 0,
        };
        let max = match max_bound {
            Value::Int(value) => *value,
            Value::List(list) => list.max_value().unwrap_or(i32::MAX),
            _ => i32::MAX,
        };
        let mut sub_list = self.derived();
        for (item, value) in self.ordered_items() {
            if value >= min && value <= max {
                sub_list.insert(item.clone(), value);
            }
        }
        sub_list
    }

    /// Adopts the origins of the previous value when an empty list is assigned over it.
    pub(crate) fn retain_origins_for_assignment(&mut self, old: &InkList) {
        if self.is_empty() {
            self.initial_origin_names = old.origin_names();
        }
    }
}

impl Display for InkList {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let names = self.ordered_items()
            .into_iter()
            .map(|(item, _)| item.item_name.as_str())
            .collect::<Vec<_>>();
        write!(f, "{}", names.join(", "))
    }
}

impl FromIterator<(ListItem, i32)> for InkList {
    fn from_iter<T: IntoIterator<Item = (ListItem, i32)>>(iter: T) -> Self {
        let mut list = InkList::new();
        for (item, value) in iter {
            list.insert(item, value);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ListDefinition;
    use proptest::prelude::*;

    const NAMES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

    fn letters() -> ListDefinitions {
        let items = NAMES
            .iter()
            .enumerate()
            .map(|(index, name)| (name.to_string(), index as i32 + 1))
            .collect();
        ListDefinitions::new(vec![ListDefinition::new("letters", items)])
    }

    fn list_of(mask: u8) -> InkList {
        let mut list = InkList::with_origin("letters");
        for (index, name) in NAMES.iter().enumerate() {
            if mask & (1 << index) != 0 {
                list.insert(ListItem::new("letters", *name), index as i32 + 1);
            }
        }
        list
    }

    #[test]
    fn orders_by_value_then_origin() {
        let mut list = InkList::new();
        list.insert(ListItem::new("zed", "z"), 1);
        list.insert(ListItem::new("alpha", "a"), 1);
        list.insert(ListItem::new("alpha", "b"), 0);
        let names: Vec<_> = list.ordered_items().into_iter().map(|(item, _)| item.full_name()).collect();
        assert_eq!(names, vec!["alpha.b", "alpha.a", "zed.z"]);
        assert_eq!(list.max_item().unwrap().0.full_name(), "zed.z");
        assert_eq!(list.to_string(), "b, a, z");
    }

    #[test]
    fn comparisons_use_bounds() {
        let low = list_of(0b000011);
        let high = list_of(0b001100);
        let overlapping = list_of(0b000110);
        assert!(high.greater_than(&low));
        assert!(!overlapping.greater_than(&low));
        assert!(overlapping.greater_than_or_equals(&low));
        assert!(low.less_than(&high));
        assert!(low.less_than_or_equals(&overlapping));
        assert!(!InkList::new().greater_than(&low));
        assert!(low.greater_than(&InkList::new()));
    }

    #[test]
    fn sub_range_by_ints_and_lists() {
        let all = list_of(0b111111);
        let ranged = all.sub_range(&Value::Int(2), &Value::Int(4));
        assert_eq!(ranged, list_of(0b001110));
        let by_lists = all.sub_range(&Value::List(list_of(0b000100)), &Value::List(list_of(0b010000)));
        assert_eq!(by_lists, list_of(0b011100));
    }

    #[test]
    fn empty_results_keep_origins() {
        let defs = letters();
        let some = list_of(0b000011);
        let nothing = some.without(&some);
        assert!(nothing.is_empty());
        assert_eq!(nothing.all(&defs), list_of(0b111111));
        assert_eq!(InkList::with_origin("letters").inverse(&defs).len(), 6);
    }

    proptest! {
        #[test]
        fn union_is_superset(a in 0u8..64, b in 0u8..64) {
            let (a, b) = (list_of(a), list_of(b));
            prop_assert!(a.union(&b).contains(&a));
        }

        #[test]
        fn intersection_is_subset(a in 0u8..64, b in 0u8..64) {
            let (a, b) = (list_of(a), list_of(b));
            prop_assert!(a.contains(&a.intersect(&b)));
        }

        #[test]
        fn difference_is_disjoint(a in 0u8..64, b in 0u8..64) {
            let (a, b) = (list_of(a), list_of(b));
            prop_assert!(a.without(&b).intersect(&b).is_empty());
        }

        #[test]
        fn list_contains_itself(a in 0u8..64) {
            let a = list_of(a);
            prop_assert!(a.contains(&a));
        }

        #[test]
        fn inverse_holds_exactly_missing_items(a in 0u8..64) {
            let defs = letters();
            let a = list_of(a);
            let inverse = a.inverse(&defs);
            for (item, _) in defs.list_definition_by_name("letters").unwrap().items() {
                prop_assert_eq!(inverse.contains_item(&item), !a.contains_item(&item));
            }
        }
    }
}
