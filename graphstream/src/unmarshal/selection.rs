//! The selection stack: which class or property each open element maps to.

use crate::ClassId;

/// What an open element maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeSelection {
    /// The element of an object of this class.
    Class(ClassId),
    /// The element of a property of `class`. `populated` turns true once
    /// the element received text or nested content.
    Property {
        class: ClassId,
        property: usize,
        populated: bool,
    },
}

#[derive(Debug, Default)]
pub(crate) struct SelectionStack {
    stack: Vec<NodeSelection>,
}

impl SelectionStack {
    pub(crate) fn top(&self) -> Option<NodeSelection> {
        self.stack.last().copied()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub(crate) fn push_class(&mut self, class: ClassId) {
        self.stack.push(NodeSelection::Class(class));
    }

    pub(crate) fn push_property(&mut self, class: ClassId, property: usize) {
        self.stack.push(NodeSelection::Property {
            class,
            property,
            populated: false,
        });
    }

    pub(crate) fn pop(&mut self) -> Option<NodeSelection> {
        self.stack.pop()
    }

    /// Marks the innermost property element as populated.
    pub(crate) fn mark_populated(&mut self) {
        if let Some(NodeSelection::Property { populated, .. }) = self.stack.last_mut() {
            *populated = true;
        }
    }
}
