//! Table and column naming.
//!
//! Every source file gets a table name derived from its file stem (the
//! *base name*). When two or more files share a base name, all of them fall
//! back to their *full name*: the path relative to the watched root, folded
//! into a single identifier. The policy is symmetric, so a root-level
//! `x.csv` also becomes a full name as soon as `sub/x.csv` appears.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Identifier used for columns whose header cell sanitizes to nothing.
pub const PLACEHOLDER_COLUMN: &str = "column";

/// Mapping of source path to resolved table name.
pub type NameMap = BTreeMap<PathBuf, String>;

/// Fold a raw string into a table identifier.
///
/// Separators, hyphens, spaces and dots become underscores, a leading digit
/// gets an underscore prefix, and the result is lower-cased.
#[must_use]
pub fn fold_identifier(raw: &str) -> String {
    let mut name: String = raw
        .chars()
        .map(|c| match c {
            '/' | '\\' | '-' | ' ' | '.' => '_',
            other => other,
        })
        .collect();

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }

    name.to_lowercase()
}

/// Table name derived from the file name alone.
#[must_use]
pub fn base_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    fold_identifier(&stem)
}

/// Table name derived from the path relative to `root`.
///
/// Paths outside `root` fall back to their file name.
#[must_use]
pub fn full_name(path: &Path, root: &Path) -> String {
    let relative = path
        .strip_prefix(root)
        .ok()
        .or_else(|| path.file_name().map(Path::new))
        .unwrap_or(path)
        .with_extension("");

    let joined = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("_");

    fold_identifier(&joined)
}

/// Resolve table names for a set of source files.
///
/// Pure and deterministic: the same set of paths always yields the same map,
/// whatever order the paths arrive in.
#[must_use]
pub fn resolve<P: AsRef<Path>>(paths: &[P], root: &Path) -> NameMap {
    let unique: BTreeSet<&Path> = paths.iter().map(AsRef::as_ref).collect();

    let mut groups: HashMap<String, Vec<&Path>> = HashMap::new();
    for &path in &unique {
        groups.entry(base_name(path)).or_default().push(path);
    }

    let mut names = NameMap::new();
    for (base, members) in groups {
        if let [only] = members.as_slice() {
            names.insert(only.to_path_buf(), base);
        } else {
            for path in members {
                names.insert(path.to_path_buf(), full_name(path, root));
            }
        }
    }

    names
}

/// Names claimed by more than one path after resolution.
///
/// Only possible when two different relative paths fold to the same full
/// name, e.g. `a/x.csv` and `a-x.csv`.
#[must_use]
pub fn find_collisions(names: &NameMap) -> BTreeMap<String, Vec<PathBuf>> {
    let mut owners: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for (path, name) in names {
        owners.entry(name.clone()).or_default().push(path.clone());
    }
    owners.retain(|_, paths| paths.len() > 1);
    owners
}

/// Fail with [`Error::NameConflict`] if `path` shares its name with another path.
///
/// # Errors
///
/// Returns an error naming every path that claims the same table name.
pub fn ensure_unique(names: &NameMap, path: &Path) -> Result<()> {
    let Some(name) = names.get(path) else {
        return Ok(());
    };

    let claimants: Vec<String> = names
        .iter()
        .filter(|(_, other)| *other == name)
        .map(|(p, _)| p.display().to_string())
        .collect();

    if claimants.len() > 1 {
        return Err(Error::NameConflict {
            name: name.clone(),
            paths: claimants,
        });
    }

    Ok(())
}

/// Sanitize one header cell into a column identifier.
#[must_use]
pub fn sanitize_column_name(raw: &str) -> String {
    let mut name: String = raw
        .chars()
        .filter(|c| !matches!(c, '(' | ')'))
        .map(|c| {
            if c.is_whitespace() || c == '-' || c == '.' {
                '_'
            } else {
                c
            }
        })
        .collect();

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }

    if name.is_empty() {
        name.push_str(PLACEHOLDER_COLUMN);
    }

    name.to_lowercase()
}

/// Sanitize a header row, suffixing repeated names with `_1`, `_2`, ...
///
/// Repeats are counted only against earlier columns of the same row.
#[must_use]
pub fn column_names(headers: &[String]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::with_capacity(headers.len());

    for header in headers {
        let base = sanitize_column_name(header);
        let mut name = base.clone();
        let mut counter = 1;
        for earlier in &columns {
            if *earlier == name {
                name = format!("{base}_{counter}");
                counter += 1;
            }
        }
        columns.push(name);
    }

    columns
}
