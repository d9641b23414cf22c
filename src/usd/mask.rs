use crate::sdf::Path;

/// Restricts a stage to a set of subtrees.
///
/// A prim is populated when it is a mask path, an ancestor of one, or a
/// descendant of one. Ancestors are needed to reach the masked subtrees,
/// so they are always included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationMask {
    paths: Vec<Path>,
}

impl PopulationMask {
    pub fn new(paths: impl IntoIterator<Item = Path>) -> Self {
        let mut mask = Self::default();
        for path in paths {
            mask.add(path);
        }
        mask
    }

    /// Add a subtree. Paths already covered by the mask are ignored and paths
    /// under the new one are dropped.
    pub fn add(&mut self, path: Path) {
        if self.includes_subtree(&path) {
            return;
        }
        self.paths.retain(|existing| !existing.has_prefix(&path));
        self.paths.push(path);
        self.paths.sort();
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// True if `path` is populated: inside a masked subtree or on the way
    /// to one.
    pub fn includes(&self, path: &Path) -> bool {
        self.paths
            .iter()
            .any(|masked| path.has_prefix(masked) || masked.has_prefix(path))
    }

    /// True if `path` and everything below it is populated.
    pub fn includes_subtree(&self, path: &Path) -> bool {
        self.paths.iter().any(|masked| path.has_prefix(masked))
    }
}
