use crate::sdf::Path;

/// Drop every selected path that lies under another selected path.
///
/// Ancestors win; survivors keep their selection order, duplicates collapse
/// to their first occurrence.
pub fn remove_descendant_paths(paths: &[Path]) -> Vec<Path> {
    Path::remove_descendant_paths(paths)
}
