//! The value accumulation tree: what has been read for objects whose
//! elements are still open.

use std::collections::BTreeMap;

use crate::{ClassId, ClassMetadata, ObjectRef, PropertyMetadata, Value};

/// What has been read for one property.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Slot {
    /// Nothing yet.
    #[default]
    Unset,
    /// The property's element was present but empty.
    ExplicitNull,
    /// A value.
    Value(Value),
}

impl Slot {
    /// Whether the document said anything about the property.
    pub fn is_set(&self) -> bool {
        !matches!(self, Slot::Unset)
    }
}

/// Collected value of one property. Composed properties hold their
/// children's values instead of a value of their own.
#[derive(Debug)]
pub(crate) struct PropertyValue {
    property: usize,
    slot: Slot,
    children: Vec<PropertyValue>,
}

impl PropertyValue {
    fn new(property: usize) -> Self {
        Self {
            property,
            slot: Slot::Unset,
            children: Vec::new(),
        }
    }

    pub(crate) fn property(&self) -> usize {
        self.property
    }

    pub(crate) fn slot(&self) -> &Slot {
        &self.slot
    }

    pub(crate) fn into_parts(self) -> (Slot, Vec<PropertyValue>) {
        (self.slot, self.children)
    }
}

/// Values collected for one object, plus its custom properties.
#[derive(Debug)]
pub(crate) struct ObjectValues {
    class: ClassId,
    values: Vec<PropertyValue>,
    custom: Option<BTreeMap<String, String>>,
}

impl ObjectValues {
    pub(crate) fn new(class: ClassId) -> Self {
        Self {
            class,
            values: Vec::new(),
            custom: None,
        }
    }

    pub(crate) fn class(&self) -> ClassId {
        self.class
    }

    /// Whether no property has been touched. Captured custom properties
    /// alone do not make an object.
    pub(crate) fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn slot(&self, class: &ClassMetadata, property: usize) -> Option<&Slot> {
        let chain = class.chain(property);
        let mut level = &self.values;
        let mut found = None;
        for index in chain {
            let entry = level.iter().find(|v| v.property == index)?;
            level = &entry.children;
            found = Some(&entry.slot);
        }
        found
    }

    fn entry(&mut self, class: &ClassMetadata, property: usize) -> &mut PropertyValue {
        let chain = class.chain(property);
        let (first, rest) = chain.split_first().unwrap_or((&property, &[]));
        entry_in(&mut self.values, *first, rest)
    }

    /// Records a leaf value. The first value wins, except for collections of
    /// leaf values, which append.
    pub(crate) fn store(
        &mut self,
        class: &ClassMetadata,
        property: &PropertyMetadata,
        value: Value,
    ) {
        let entry = self.entry(class, property.index());
        if property.is_collection() {
            append_item(&mut entry.slot, value);
        } else if value.is_null() {
            if entry.slot == Slot::Unset {
                entry.slot = Slot::ExplicitNull;
            }
        } else if entry.slot == Slot::Unset {
            entry.slot = Slot::Value(value);
        }
    }

    /// Records that a property element was present but empty. For a
    /// collection of leaf values that is one null item.
    pub(crate) fn store_null(&mut self, class: &ClassMetadata, property: &PropertyMetadata) {
        let entry = self.entry(class, property.index());
        if property.is_collection() && property.nested().is_none() {
            append_item(&mut entry.slot, Value::Null);
        } else if entry.slot == Slot::Unset {
            entry.slot = Slot::ExplicitNull;
        }
    }

    /// Appends an item to a collection of nested objects. Items that carried
    /// no values are dropped, but the collection still exists.
    pub(crate) fn push_item(
        &mut self,
        class: &ClassMetadata,
        property: &PropertyMetadata,
        item: Option<ObjectRef>,
    ) {
        let entry = self.entry(class, property.index());
        if !matches!(entry.slot, Slot::Value(Value::List(_))) {
            entry.slot = Slot::Value(Value::List(Vec::new()));
        }
        if let (Slot::Value(Value::List(items)), Some(item)) = (&mut entry.slot, item) {
            items.push(Value::Object(item));
        }
    }

    pub(crate) fn set_custom(&mut self, pairs: BTreeMap<String, String>) {
        self.custom = Some(pairs);
    }

    pub(crate) fn into_parts(self) -> (Vec<PropertyValue>, Option<BTreeMap<String, String>>) {
        (self.values, self.custom)
    }

    /// Non-null values keyed by dotted property path.
    pub(crate) fn flatten(&self, class: &ClassMetadata) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        flatten_into(class, &self.values, &mut out);
        out
    }

    /// Renders the values as `graph[element=value, ...]`.
    pub(crate) fn describe(&self, class: &ClassMetadata) -> String {
        let mut parts = Vec::new();
        describe_into(class, &self.values, &mut parts);
        format!("{}[{}]", class.name(), parts.join(", "))
    }
}

/// A lone empty item reads as a null collection until a second item shows
/// up, at which point it becomes the first null item of the list.
fn append_item(slot: &mut Slot, item: Value) {
    if let Slot::Value(Value::List(items)) = slot {
        items.push(item);
        return;
    }
    *slot = match slot {
        Slot::Unset if item.is_null() => Slot::ExplicitNull,
        Slot::ExplicitNull => Slot::Value(Value::List(vec![Value::Null, item])),
        _ => Slot::Value(Value::List(vec![item])),
    };
}

fn entry_in<'v>(
    values: &'v mut Vec<PropertyValue>,
    property: usize,
    rest: &[usize],
) -> &'v mut PropertyValue {
    let position = match values.iter().position(|v| v.property == property) {
        Some(position) => position,
        None => {
            values.push(PropertyValue::new(property));
            values.len() - 1
        }
    };
    let value = &mut values[position];
    match rest.split_first() {
        None => value,
        Some((next, rest)) => entry_in(&mut value.children, *next, rest),
    }
}

fn flatten_into(
    class: &ClassMetadata,
    values: &[PropertyValue],
    out: &mut BTreeMap<String, Value>,
) {
    for value in values {
        if let Slot::Value(v) = &value.slot {
            out.insert(class.property(value.property).path().to_string(), v.clone());
        }
        flatten_into(class, &value.children, out);
    }
}

fn describe_into(class: &ClassMetadata, values: &[PropertyValue], parts: &mut Vec<String>) {
    for value in values {
        let property = class.property(value.property);
        match &value.slot {
            Slot::Value(v) => parts.push(format!("{}={v}", property.element_name())),
            Slot::ExplicitNull => parts.push(format!("{}=null", property.element_name())),
            Slot::Unset => {}
        }
        describe_into(class, &value.children, parts);
    }
}
