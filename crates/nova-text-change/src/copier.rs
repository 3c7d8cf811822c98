use std::collections::HashMap;

use crate::tree::{EditId, EditNode, EditTree, TreeId};

/// Original → copy correspondence produced by an [`EditTreeCopier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyMap {
    source: TreeId,
    target: TreeId,
    copies: HashMap<u32, u32>,
}

impl CopyMap {
    pub fn source_tree(&self) -> TreeId {
        self.source
    }

    pub fn target_tree(&self) -> TreeId {
        self.target
    }

    /// The copy of `original`, or `None` if `original` was not part of the
    /// copied tree.
    pub fn copy_of(&self, original: EditId) -> Option<EditId> {
        if original.tree() != self.source {
            return None;
        }
        let index = *self.copies.get(&(original.index() as u32))?;
        Some(EditId::from_parts(self.target, index))
    }

    pub fn len(&self) -> usize {
        self.copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }
}

/// Deep-copies an edit tree (or one of its subtrees) and remembers which copy
/// belongs to which original.
///
/// The copy is an independent [`EditTree`] with its own [`TreeId`]; executing
/// or mutating it never touches the source.
pub struct EditTreeCopier<'a> {
    source: &'a EditTree,
    start: EditId,
    map: Option<CopyMap>,
}

impl<'a> EditTreeCopier<'a> {
    pub fn new(source: &'a EditTree) -> Self {
        Self::copy_subtree(source, source.root())
    }

    /// Copier for the subtree rooted at `start`.
    ///
    /// # Panics
    ///
    /// If `start` does not belong to `source`.
    pub fn copy_subtree(source: &'a EditTree, start: EditId) -> Self {
        assert!(
            source.contains(start),
            "edit {start:?} does not belong to the copied tree"
        );
        Self {
            source,
            start,
            map: None,
        }
    }

    pub fn perform(&mut self) -> EditTree {
        let (copy, map) = self.build();
        self.map = Some(map);
        copy
    }

    fn build(&self) -> (EditTree, CopyMap) {
        let nodes_to_copy = self.source.pre_order(self.start);
        let mut copies = HashMap::with_capacity(nodes_to_copy.len());
        for (new_index, original) in nodes_to_copy.iter().enumerate() {
            copies.insert(original.index() as u32, new_index as u32);
        }

        let nodes = nodes_to_copy
            .iter()
            .map(|original| {
                let node = &self.source.nodes[original.index()];
                EditNode {
                    range: node.range,
                    kind: node.kind.clone(),
                    parent: if *original == self.start {
                        None
                    } else {
                        node.parent.and_then(|parent| copies.get(&parent).copied())
                    },
                    children: node
                        .children
                        .iter()
                        .filter_map(|child| copies.get(child).copied())
                        .collect(),
                    deleted: node.deleted,
                }
            })
            .collect();

        let copy = EditTree::from_nodes(nodes);
        let map = CopyMap {
            source: self.source.id(),
            target: copy.id(),
            copies,
        };
        (copy, map)
    }

    /// The copy of `original` made by the last [`EditTreeCopier::perform`].
    pub fn copy(&self, original: EditId) -> Option<EditId> {
        self.map.as_ref()?.copy_of(original)
    }

    pub fn into_map(self) -> Option<CopyMap> {
        self.map
    }
}

/// Copies the whole tree and returns the copy together with its map.
pub fn copy_tree(source: &EditTree) -> (EditTree, CopyMap) {
    EditTreeCopier::new(source).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::processor::{EditProcessor, ProcessorFlags};
    use text_size::TextRange;

    fn range(start: u32, end: u32) -> TextRange {
        TextRange::new(start.into(), end.into())
    }

    fn sample() -> (EditTree, EditId, EditId, EditId) {
        let mut tree = EditTree::multi(range(0, 20));
        let root = tree.root();
        let group = tree.add_multi(root, range(2, 10)).unwrap();
        let a = tree.add_replace(group, range(5, 8), "xy").unwrap();
        let b = tree.add_insert(root, 12.into(), "!!").unwrap();
        (tree, group, a, b)
    }

    #[test]
    fn copy_is_isomorphic_and_maps_every_node() {
        let (tree, group, a, b) = sample();
        let (copy, map) = copy_tree(&tree);

        assert_eq!(copy.len(), tree.len());
        assert_eq!(map.len(), tree.len());
        assert_ne!(copy.id(), tree.id());
        for original in [tree.root(), group, a, b] {
            let copied = map.copy_of(original).expect("every node is mapped");
            assert_eq!(copy.range(copied), tree.range(original));
            assert_eq!(copy.node(copied).unwrap().kind(), tree.node(original).unwrap().kind());
        }
        assert_eq!(copy.parent(map.copy_of(a).unwrap()), map.copy_of(group));
    }

    #[test]
    fn mutating_the_copy_leaves_original_untouched() {
        let (tree, _group, a, _b) = sample();
        let (mut copy, map) = copy_tree(&tree);

        let mut doc = Document::new("01234567890123456789");
        EditProcessor::new(&mut doc, &mut copy, ProcessorFlags::UPDATE_REGIONS)
            .perform()
            .unwrap();

        assert_eq!(tree.range(a), Some(range(5, 8)));
        assert_eq!(copy.range(map.copy_of(a).unwrap()), Some(range(5, 7)));
    }

    #[test]
    fn subtree_copy_only_maps_the_subtree() {
        let (tree, group, a, b) = sample();
        let mut copier = EditTreeCopier::copy_subtree(&tree, group);
        let copy = copier.perform();

        assert_eq!(copy.len(), 2);
        assert_eq!(copier.copy(group), Some(copy.root()));
        assert!(copier.copy(a).is_some());
        assert_eq!(copier.copy(b), None);
        assert_eq!(copy.parent(copy.root()), None);
    }

    #[test]
    fn lookup_before_perform_is_none() {
        let (tree, ..) = sample();
        let copier = EditTreeCopier::new(&tree);
        assert_eq!(copier.copy(tree.root()), None);
    }

    #[test]
    fn ids_from_the_copy_do_not_map_back() {
        let (tree, ..) = sample();
        let (copy, map) = copy_tree(&tree);
        assert_eq!(map.copy_of(copy.root()), None);
    }
}
