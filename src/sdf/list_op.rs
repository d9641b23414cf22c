/// Value type representing a list-edit operation.
///
/// A list op either replaces a list outright (`explicit`) or edits a weaker
/// opinion by deleting, adding, prepending, appending and reordering items.
#[derive(Debug, Clone, PartialEq)]
pub struct ListOp<T> {
    pub explicit: bool,
    pub explicit_items: Vec<T>,
    pub added_items: Vec<T>,
    pub prepended_items: Vec<T>,
    pub appended_items: Vec<T>,
    pub deleted_items: Vec<T>,
    pub ordered_items: Vec<T>,
}

impl<T> Default for ListOp<T> {
    fn default() -> Self {
        ListOp {
            explicit: false,
            explicit_items: Vec::new(),
            added_items: Vec::new(),
            prepended_items: Vec::new(),
            appended_items: Vec::new(),
            deleted_items: Vec::new(),
            ordered_items: Vec::new(),
        }
    }
}

impl<T: Clone + PartialEq> ListOp<T> {
    /// Explicit list op holding `items`.
    pub fn explicit(items: Vec<T>) -> Self {
        ListOp {
            explicit: true,
            explicit_items: items,
            ..Default::default()
        }
    }

    pub fn prepended(items: Vec<T>) -> Self {
        ListOp {
            prepended_items: items,
            ..Default::default()
        }
    }

    /// True if the op doesn't edit anything.
    pub fn is_empty(&self) -> bool {
        !self.explicit
            && self.added_items.is_empty()
            && self.prepended_items.is_empty()
            && self.appended_items.is_empty()
            && self.deleted_items.is_empty()
            && self.ordered_items.is_empty()
    }

    /// Fold a later statement of the same layer into this op, e.g.
    /// `prepend references = ...` followed by `delete references = ...`.
    pub fn absorb(&mut self, later: ListOp<T>) {
        if later.explicit {
            *self = later;
            return;
        }
        for (mine, theirs) in [
            (&mut self.added_items, later.added_items),
            (&mut self.prepended_items, later.prepended_items),
            (&mut self.appended_items, later.appended_items),
            (&mut self.deleted_items, later.deleted_items),
            (&mut self.ordered_items, later.ordered_items),
        ] {
            if !theirs.is_empty() {
                *mine = theirs;
            }
        }
    }

    /// Apply the op to `items`.
    pub fn apply_operations(&self, items: &[T]) -> Vec<T> {
        if self.explicit {
            let mut out = Vec::with_capacity(self.explicit_items.len());
            for item in &self.explicit_items {
                if !out.contains(item) {
                    out.push(item.clone());
                }
            }
            return out;
        }

        let mut out: Vec<T> = items
            .iter()
            .filter(|item| !self.deleted_items.contains(item))
            .cloned()
            .collect();

        for item in &self.added_items {
            if !out.contains(item) {
                out.push(item.clone());
            }
        }

        if !self.prepended_items.is_empty() {
            out.retain(|item| !self.prepended_items.contains(item));
            let mut head = Vec::with_capacity(self.prepended_items.len() + out.len());
            for item in &self.prepended_items {
                if !head.contains(item) {
                    head.push(item.clone());
                }
            }
            head.extend(out);
            out = head;
        }

        if !self.appended_items.is_empty() {
            out.retain(|item| !self.appended_items.contains(item));
            for item in &self.appended_items {
                if !out.contains(item) {
                    out.push(item.clone());
                }
            }
        }

        if !self.ordered_items.is_empty() {
            out = Self::reorder(out, &self.ordered_items);
        }

        out
    }

    // Items named in `order` move to the front in that order, the rest keep
    // their relative position after them.
    fn reorder(items: Vec<T>, order: &[T]) -> Vec<T> {
        let mut head = Vec::new();
        for item in order {
            if items.contains(item) && !head.contains(item) {
                head.push(item.clone());
            }
        }
        let tail: Vec<T> = items.into_iter().filter(|item| !head.contains(item)).collect();
        head.extend(tail);
        head
    }

    /// Resolve the op against an empty weaker opinion.
    pub fn flatten(&self) -> Vec<T> {
        self.apply_operations(&[])
    }

    /// Compose `self` (stronger) over `weaker` into a single op.
    pub fn compose_over(&self, weaker: &ListOp<T>) -> ListOp<T> {
        if self.explicit {
            return self.clone();
        }
        if weaker.explicit {
            return ListOp::explicit(self.apply_operations(&weaker.explicit_items));
        }

        let mut out = ListOp::default();

        out.deleted_items = weaker.deleted_items.clone();
        push_unique(&mut out.deleted_items, &self.deleted_items);

        out.prepended_items = self.prepended_items.clone();
        push_unique(&mut out.prepended_items, &weaker.prepended_items);

        out.appended_items = weaker
            .appended_items
            .iter()
            .filter(|item| !self.appended_items.contains(item))
            .cloned()
            .collect();
        out.appended_items.extend(self.appended_items.iter().cloned());

        out.added_items = weaker.added_items.clone();
        push_unique(&mut out.added_items, &self.added_items);

        out.ordered_items = if self.ordered_items.is_empty() {
            weaker.ordered_items.clone()
        } else {
            self.ordered_items.clone()
        };

        out
    }

    /// Every item mentioned by a non-delete operation.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.explicit_items
            .iter()
            .chain(self.prepended_items.iter())
            .chain(self.appended_items.iter())
            .chain(self.added_items.iter())
            .chain(self.ordered_items.iter())
    }

    /// Rewrite every item (deleted ones included) with `f`.
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> ListOp<U> {
        ListOp {
            explicit: self.explicit,
            explicit_items: self.explicit_items.iter().map(&mut f).collect(),
            added_items: self.added_items.iter().map(&mut f).collect(),
            prepended_items: self.prepended_items.iter().map(&mut f).collect(),
            appended_items: self.appended_items.iter().map(&mut f).collect(),
            deleted_items: self.deleted_items.iter().map(&mut f).collect(),
            ordered_items: self.ordered_items.iter().map(&mut f).collect(),
        }
    }
}

fn push_unique<T: Clone + PartialEq>(into: &mut Vec<T>, items: &[T]) {
    for item in items {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}
