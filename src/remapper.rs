//! Resolves class names, string literals and resource paths against the remap index.

use std::collections::HashMap;

use tracing::{trace, warn};

use crate::classfile::Remapper;
use crate::names::{self, CLASS_SUFFIX};
use crate::remap_index::{Candidate, RemapIndex, SymbolKind};
use crate::rename::Rename;

/// Memoized answers, kept for a whole sweep so each name is resolved (and any ambiguity
/// reported) once.
#[derive(Debug, Default)]
pub struct RemapCache {
    names: HashMap<String, Option<String>>,
    values: HashMap<String, Option<String>>,
    packages: HashMap<String, Option<String>>,
}

impl RemapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.names.len() + self.values.len() + self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct SymbolRemapper<'a> {
    index: &'a RemapIndex,
    cache: &'a mut RemapCache,
}

impl<'a> SymbolRemapper<'a> {
    pub fn new(index: &'a RemapIndex, cache: &'a mut RemapCache) -> Self {
        Self { index, cache }
    }

    /// Class lookup only: `name` is a binary class name without `.class`.
    fn resolve_class(&self, name: &str) -> Option<String> {
        let path = format!("{name}{CLASS_SUFFIX}");
        self.first_match(
            name,
            self.index.candidates(&path, SymbolKind::Class),
            |rule| rule.rename_class_name(name, true),
        )
    }

    fn resolve_resource(&self, path: &str) -> Option<String> {
        self.first_match(
            path,
            self.index.candidates(path, SymbolKind::Resource),
            |rule| rule.rename_path(path),
        )
    }

    fn resolve_package(&self, package: &str) -> Option<String> {
        self.first_match(
            package,
            self.index.package_candidates(package),
            |rule| rule.rename_path(package),
        )
    }

    /// Applies each archive's rules in order; the first archive that produces a rewrite wins.
    fn first_match(
        &self,
        subject: &str,
        candidates: Vec<Candidate<'_>>,
        apply: impl Fn(&Rename) -> Option<String>,
    ) -> Option<String> {
        let mut chosen: Option<(usize, String)> = None;
        for candidate in candidates {
            let Some(result) = candidate.renames.iter().find_map(&apply) else {
                continue;
            };
            match &chosen {
                None => chosen = Some((candidate.element, result)),
                Some((first, kept)) if *kept != result => {
                    warn!(
                        name = subject,
                        kept = %kept,
                        ignored = %result,
                        first = %self.archive(*first),
                        other = %self.archive(candidate.element),
                        "ambiguous relocation, first archive wins"
                    );
                }
                Some(_) => {}
            }
        }
        chosen.map(|(_, result)| result)
    }

    fn archive(&self, ordinal: usize) -> String {
        self.index
            .archive_id(ordinal)
            .map(|id| id.to_string())
            .unwrap_or_else(|| format!("#{ordinal}"))
    }

    fn resolve_value(&mut self, value: &str) -> Option<String> {
        if value.starts_with('[') {
            return self.map_array_descriptor(value);
        }
        if value.contains('/') {
            return self.map_path_value(value);
        }
        if value.contains('.') && looks_like_class_name(value) {
            return self.map_dotted(value);
        }
        None
    }

    /// `[Lcom/acme/Widget;` or `[[Lcom.acme.Widget;`
    fn map_array_descriptor(&mut self, value: &str) -> Option<String> {
        let dims = value.bytes().take_while(|b| *b == b'[').count();
        let inner = value[dims..].strip_prefix('L')?.strip_suffix(';')?;
        if inner.is_empty() || inner.chars().any(char::is_whitespace) {
            return None;
        }
        let dotted = !inner.contains('/');
        let internal = if dotted {
            names::to_path(inner)
        } else {
            inner.to_string()
        };
        let mapped = self.map(&internal)?;
        let mapped = if dotted {
            names::to_package(&mapped)
        } else {
            mapped
        };
        Some(format!("{}L{mapped};", &value[..dims]))
    }

    fn map_path_value(&mut self, value: &str) -> Option<String> {
        if value.chars().any(char::is_whitespace) {
            return None;
        }
        let (lead, path) = match value.strip_prefix('/') {
            Some(rest) => ("/", rest),
            None => ("", value),
        };
        if path.is_empty() {
            return None;
        }
        let mapped = match names::strip_class_suffix(path) {
            Some(stem) => format!("{}{CLASS_SUFFIX}", self.map(stem)?),
            None => self.map(path)?,
        };
        Some(format!("{lead}{mapped}"))
    }

    fn map_dotted(&mut self, value: &str) -> Option<String> {
        let path = names::to_path(value);
        if let Some(mapped) = self.resolve_class(&path) {
            return Some(names::to_package(&mapped));
        }
        if let Some(mapped) = self.resolve_package(&path) {
            return Some(names::to_package(&mapped));
        }
        // `pkg.Cls.FIELD` and friends: shorter prefixes, as classes only
        let segs: Vec<&str> = path.split('/').collect();
        for end in (1..segs.len()).rev() {
            let prefix = segs[..end].join("/");
            if let Some(mapped) = self.resolve_class(&prefix) {
                let rest = segs[end..].join(".");
                return Some(format!("{}.{rest}", names::to_package(&mapped)));
            }
        }
        None
    }
}

impl Remapper for SymbolRemapper<'_> {
    fn map(&mut self, internal_name: &str) -> Option<String> {
        if let Some(hit) = self.cache.names.get(internal_name) {
            return hit.clone();
        }
        let result = self
            .resolve_class(internal_name)
            .or_else(|| self.resolve_resource(internal_name));
        trace!(name = internal_name, mapped = ?result, "map");
        self.cache
            .names
            .insert(internal_name.to_string(), result.clone());
        result
    }

    fn map_value(&mut self, value: &str) -> Option<String> {
        if let Some(hit) = self.cache.values.get(value) {
            return hit.clone();
        }
        let result = self.resolve_value(value).filter(|mapped| mapped != value);
        trace!(value, mapped = ?result, "map_value");
        self.cache.values.insert(value.to_string(), result.clone());
        result
    }

    fn map_package(&mut self, package: &str) -> Option<String> {
        if let Some(hit) = self.cache.packages.get(package) {
            return hit.clone();
        }
        let result = self.resolve_package(package);
        self.cache
            .packages
            .insert(package.to_string(), result.clone());
        result
    }
}

/// Cheap screen for dotted strings that could be class or package names.
///
/// The value must start like a Java identifier, hold no whitespace, and more than 70% of
/// its characters must be identifier characters.
pub fn looks_like_class_name(value: &str) -> bool {
    let Some(first) = value.chars().next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_' || first == '$') {
        return false;
    }
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let total = value.chars().count();
    let legal = value
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
        .count();
    legal * 10 > total * 7
}
