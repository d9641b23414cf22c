//! Scene description paths.
//!
//! A path addresses a spec inside a layer:
//! - `/` - the pseudo-root
//! - `/World/Chair` - a prim
//! - `/World/Chair{lod=high}Seat` - a prim authored inside a variant
//! - `/World/Chair{lod=}` - the `lod` variant set of `/World/Chair`
//! - `/World/Chair.xformOp:translate` - a property

use anyhow::{bail, ensure, Context, Result};
use std::collections::HashSet;
use std::fmt;

/// Single element of a prim path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Element {
    Child(String),
    Variant { set: String, selection: String },
}

/// Scene description path.
///
/// The empty path (`Path::default()`) is distinct from the absolute root `/`
/// and is used where a path is optional, such as the prim path of a
/// reference to another asset's default prim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    absolute: bool,
    elements: Vec<Element>,
    property: Option<String>,
}

/// Returns true if `name` is a valid prim name or variant identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Returns true if `name` is a valid (possibly namespaced) property name.
pub fn is_valid_property_name(name: &str) -> bool {
    !name.is_empty() && name.split(':').all(is_valid_identifier)
}

fn is_valid_variant_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '|' | '-'))
}

impl Path {
    /// Parse a path from its text form.
    pub fn new(text: &str) -> Result<Self> {
        parse(text).with_context(|| format!("Invalid path: {text:?}"))
    }

    /// The pseudo-root path `/`.
    pub fn abs_root() -> Self {
        Path {
            absolute: true,
            elements: Vec::new(),
            property: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.absolute
    }

    pub fn is_absolute_root(&self) -> bool {
        self.absolute && self.elements.is_empty() && self.property.is_none()
    }

    pub fn is_property_path(&self) -> bool {
        self.property.is_some()
    }

    /// True for paths naming a prim (including prims authored inside variants).
    pub fn is_prim_path(&self) -> bool {
        self.property.is_none() && matches!(self.elements.last(), Some(Element::Child(_)))
    }

    /// True for `/Prim{set=selection}` paths, including variant set paths `/Prim{set=}`.
    pub fn is_prim_variant_selection_path(&self) -> bool {
        self.property.is_none() && matches!(self.elements.last(), Some(Element::Variant { .. }))
    }

    /// True for `/Prim{set=}` paths.
    pub fn is_variant_set_path(&self) -> bool {
        self.property.is_none()
            && matches!(self.elements.last(), Some(Element::Variant { selection, .. }) if selection.is_empty())
    }

    pub fn contains_variant_selection(&self) -> bool {
        self.elements.iter().any(|e| matches!(e, Element::Variant { .. }))
    }

    /// Number of prim-level elements (children and variant selections).
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Name of the last element: the property name, the prim name or the
    /// variant selection.
    pub fn name(&self) -> &str {
        if let Some(property) = &self.property {
            return property;
        }
        match self.elements.last() {
            Some(Element::Child(name)) => name,
            Some(Element::Variant { selection, .. }) => selection,
            None => "",
        }
    }

    /// Variant set and selection of a `/Prim{set=selection}` path.
    pub fn variant_selection(&self) -> Option<(&str, &str)> {
        if self.property.is_some() {
            return None;
        }
        match self.elements.last() {
            Some(Element::Variant { set, selection }) => Some((set, selection)),
            _ => None,
        }
    }

    /// Parent path. The pseudo-root and the empty path have no parent.
    pub fn parent(&self) -> Option<Path> {
        if self.is_empty() {
            return None;
        }
        if self.property.is_some() {
            return Some(self.prim_path());
        }
        if self.elements.is_empty() {
            return None;
        }
        let mut parent = self.clone();
        parent.elements.pop();
        Some(parent)
    }

    /// Strips the property part, if any.
    pub fn prim_path(&self) -> Path {
        Path {
            absolute: self.absolute,
            elements: self.elements.clone(),
            property: None,
        }
    }

    pub fn append_child(&self, name: &str) -> Result<Path> {
        ensure!(!self.is_empty(), "Can't append child {name:?} to an empty path");
        ensure!(self.property.is_none(), "Can't append child {name:?} to property path {self}");
        ensure!(is_valid_identifier(name), "Invalid prim name: {name:?}");
        ensure!(!self.is_variant_set_path(), "Can't append child {name:?} to variant set path {self}");

        let mut path = self.clone();
        path.elements.push(Element::Child(name.to_owned()));
        Ok(path)
    }

    pub fn append_property(&self, name: &str) -> Result<Path> {
        ensure!(self.property.is_none(), "Can't append property {name:?} to property path {self}");
        ensure!(
            !self.elements.is_empty(),
            "Can't append property {name:?} to the pseudo-root"
        );
        ensure!(is_valid_property_name(name), "Invalid property name: {name:?}");

        let mut path = self.clone();
        path.property = Some(name.to_owned());
        Ok(path)
    }

    /// Appends `{set=selection}`. An empty selection yields the variant set path.
    pub fn append_variant_selection(&self, set: &str, selection: &str) -> Result<Path> {
        ensure!(
            self.is_prim_path() || (self.is_prim_variant_selection_path() && !self.is_variant_set_path()),
            "Can't append variant selection to {self}"
        );
        ensure!(is_valid_identifier(set), "Invalid variant set name: {set:?}");
        ensure!(is_valid_variant_name(selection), "Invalid variant name: {selection:?}");

        let mut path = self.clone();
        path.elements.push(Element::Variant {
            set: set.to_owned(),
            selection: selection.to_owned(),
        });
        Ok(path)
    }

    /// Appends a relative path such as `Child`, `A/B.attr`, `.attr` or `../Sibling`.
    pub fn append_path(&self, relative: &str) -> Result<Path> {
        ensure!(
            !relative.starts_with('/'),
            "Expected a relative path, got {relative:?}"
        );

        let mut base = self.clone();
        let mut rest = relative;
        loop {
            if let Some(stripped) = rest.strip_prefix("../") {
                base = base
                    .parent()
                    .with_context(|| format!("{relative:?} escapes the root from {self}"))?;
                rest = stripped;
            } else if rest == ".." {
                base = base
                    .parent()
                    .with_context(|| format!("{relative:?} escapes the root from {self}"))?;
                rest = "";
            } else if let Some(stripped) = rest.strip_prefix("./") {
                rest = stripped;
            } else {
                break;
            }
        }

        if rest.is_empty() || rest == "." {
            return Ok(base);
        }
        if let Some(property) = rest.strip_prefix('.') {
            return base.append_property(property);
        }

        let tail = parse(&format!("/{rest}"))?;
        ensure!(base.property.is_none(), "Can't append {relative:?} to property path {self}");
        base.elements.extend(tail.elements);
        base.property = tail.property;
        Ok(base)
    }

    /// True if `prefix` is this path or one of its ancestors.
    pub fn has_prefix(&self, prefix: &Path) -> bool {
        if prefix.is_empty() || self.absolute != prefix.absolute {
            return false;
        }
        if prefix.property.is_some() {
            return self.property == prefix.property && self.elements == prefix.elements;
        }
        self.elements.starts_with(&prefix.elements)
    }

    /// Replaces `old` with `new` if `old` is a prefix of this path.
    pub fn replace_prefix(&self, old: &Path, new: &Path) -> Option<Path> {
        if !self.has_prefix(old) {
            return None;
        }
        let mut elements = new.elements.clone();
        elements.extend(self.elements[old.elements.len()..].iter().cloned());
        let property = if old.property.is_some() {
            new.property.clone()
        } else {
            self.property.clone()
        };
        Some(Path {
            absolute: new.absolute,
            elements,
            property,
        })
    }

    /// Relative path from `anchor` to this path, e.g. `Child/Leaf`, `../Other` or `.`.
    pub fn make_relative_path(&self, anchor: &Path) -> Result<String> {
        ensure!(
            self.absolute && anchor.absolute,
            "Both paths must be absolute ({self}, {anchor})"
        );
        ensure!(anchor.property.is_none(), "Anchor must be a prim path, got {anchor}");

        let common = self
            .elements
            .iter()
            .zip(anchor.elements.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut out = "../".repeat(anchor.elements.len() - common);
        let tail = &self.elements[common..];
        if !tail.is_empty() {
            let mut text = String::new();
            write_elements(&mut text, tail, false);
            out.push_str(&text);
        } else if out.is_empty() {
            out.push('.');
        } else {
            out.truncate(out.len() - 1);
        }

        if let Some(property) = &self.property {
            if out == "." {
                out.clear();
            }
            out.push('.');
            out.push_str(property);
        }
        Ok(out)
    }

    /// Removes every `{set=selection}` element, e.g. `/A{v=x}B` becomes `/A/B`.
    pub fn strip_variant_selections(&self) -> Path {
        Path {
            absolute: self.absolute,
            elements: self
                .elements
                .iter()
                .filter(|e| matches!(e, Element::Child(_)))
                .cloned()
                .collect(),
            property: self.property.clone(),
        }
    }

    /// Removes every path that has another path of the list as a prefix.
    ///
    /// Duplicates collapse to their first occurrence; surviving paths keep
    /// their original order.
    pub fn remove_descendant_paths(paths: &[Path]) -> Vec<Path> {
        let mut seen = HashSet::new();
        let unique: Vec<&Path> = paths.iter().filter(|p| seen.insert(*p)).collect();

        unique
            .iter()
            .filter(|path| {
                !unique
                    .iter()
                    .any(|other| other != *path && path.has_prefix(other))
            })
            .map(|p| (*p).clone())
            .collect()
    }
}

fn write_elements(out: &mut String, elements: &[Element], leading_slash: bool) {
    // Children directly after a variant selection take no separator.
    let mut after_variant = false;
    for (index, element) in elements.iter().enumerate() {
        match element {
            Element::Child(name) => {
                if !after_variant && (index > 0 || leading_slash) {
                    out.push('/');
                }
                out.push_str(name);
                after_variant = false;
            }
            Element::Variant { set, selection } => {
                out.push('{');
                out.push_str(set);
                out.push('=');
                out.push_str(selection);
                out.push('}');
                after_variant = true;
            }
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.absolute {
            return Ok(());
        }
        if self.elements.is_empty() {
            f.write_str("/")?;
        } else {
            let mut text = String::new();
            write_elements(&mut text, &self.elements, true);
            f.write_str(&text)?;
        }
        if let Some(property) = &self.property {
            write!(f, ".{property}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Path {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Path::new(s)
    }
}

fn parse(text: &str) -> Result<Path> {
    if text.is_empty() {
        return Ok(Path::default());
    }

    let Some(mut rest) = text.strip_prefix('/') else {
        bail!("Path must be absolute");
    };

    let mut path = Path::abs_root();
    if rest.is_empty() {
        return Ok(path);
    }

    // A child name may follow `/` or directly follow a variant selection.
    let mut expect_child = true;
    loop {
        if expect_child {
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            let name = &rest[..end];
            ensure!(is_valid_identifier(name), "Invalid prim name {name:?}");
            path.elements.push(Element::Child(name.to_owned()));
            rest = &rest[end..];
        }

        match rest.chars().next() {
            None => break,
            Some('/') => {
                ensure!(
                    !path.is_variant_set_path(),
                    "Variant set path can't have children"
                );
                rest = &rest[1..];
                expect_child = true;
            }
            Some('{') => {
                let close = rest.find('}').context("Unterminated variant selection")?;
                let (set, selection) = rest[1..close]
                    .split_once('=')
                    .context("Variant selection must be {set=selection}")?;
                let (set, selection) = (set.trim(), selection.trim());
                ensure!(is_valid_identifier(set), "Invalid variant set name {set:?}");
                ensure!(is_valid_variant_name(selection), "Invalid variant name {selection:?}");
                path.elements.push(Element::Variant {
                    set: set.to_owned(),
                    selection: selection.to_owned(),
                });
                rest = &rest[close + 1..];
                expect_child = matches!(rest.chars().next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
            }
            Some('.') => {
                let property = &rest[1..];
                ensure!(is_valid_property_name(property), "Invalid property name {property:?}");
                ensure!(!path.is_variant_set_path(), "Variant set path can't have properties");
                path.property = Some(property.to_owned());
                break;
            }
            Some(other) => bail!("Unexpected character {other:?}"),
        }
    }

    Ok(path)
}
