use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// One relocation rule: names under `source` move under `destination`.
///
/// Matching is by whole segments. A rule only fires when the source is a strict prefix
/// of the name, so it can move a class or resource but never rewrite its own package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rename {
    #[serde(rename = "from", serialize_with = "dotted")]
    source: Vec<String>,
    #[serde(rename = "to", serialize_with = "dotted")]
    destination: Vec<String>,
    hide_classes: bool,
}

fn dotted<S: Serializer>(segments: &[String], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&segments.join("."))
}

fn split_any(name: &str) -> Vec<String> {
    let sep = if name.contains('/') { '/' } else { '.' };
    name.split(sep)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Rename {
    /// Parses a rule from dotted (`com.acme`) or slashed (`com/acme`) names.
    pub fn new(source: &str, destination: &str, hide_classes: bool) -> Result<Self> {
        let source_segs = split_any(source);
        let destination_segs = split_any(destination);
        if source_segs.is_empty() || destination_segs.is_empty() {
            return Err(Error::Config(format!(
                "rename needs a non-empty source and destination: {source:?} -> {destination:?}"
            )));
        }
        Ok(Self::from_segments(source_segs, destination_segs, hide_classes))
    }

    pub fn from_segments(source: Vec<String>, destination: Vec<String>, hide_classes: bool) -> Self {
        Self {
            source,
            destination,
            hide_classes,
        }
    }

    pub fn source(&self) -> &[String] {
        &self.source
    }

    pub fn destination(&self) -> &[String] {
        &self.destination
    }

    pub fn hide_classes(&self) -> bool {
        self.hide_classes
    }

    /// Rewrites a slash-separated entry path. A trailing `/` is preserved.
    pub fn rename_path(&self, path: &str) -> Option<String> {
        let (body, trailing) = match path.strip_suffix('/') {
            Some(body) => (body, "/"),
            None => (path, ""),
        };
        let segs: Vec<&str> = body.split('/').collect();
        let rest = self.strip_source(&segs)?;

        let mut out = self.destination.join("/");
        for seg in rest {
            out.push('/');
            out.push_str(seg);
        }
        out.push_str(trailing);
        Some(out)
    }

    /// Rewrites a class name in either binary (`a/b/C`) or dotted (`a.b.C`) form,
    /// answering in the form it was given.
    ///
    /// With `hide` set and a hiding rule, the simple name gains a `$` prefix.
    pub fn rename_class_name(&self, name: &str, hide: bool) -> Option<String> {
        let sep = if name.contains('/') { "/" } else { "." };
        let segs: Vec<&str> = name.split(sep).collect();
        let rest = self.strip_source(&segs)?;

        let mut out: Vec<String> = self.destination.clone();
        out.extend(rest.iter().map(|s| s.to_string()));
        if hide && self.hide_classes {
            if let Some(leaf) = out.last_mut() {
                if !leaf.starts_with('$') {
                    leaf.insert(0, '$');
                }
            }
        }
        Some(out.join(sep))
    }

    fn strip_source<'a>(&self, segs: &'a [&'a str]) -> Option<&'a [&'a str]> {
        if segs.len() <= self.source.len() {
            return None;
        }
        let matches = segs.iter().zip(&self.source).all(|(seg, src)| *seg == src.as_str());
        matches.then(|| &segs[self.source.len()..])
    }
}

impl fmt::Display for Rename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source.join("."), self.destination.join("."))?;
        if self.hide_classes {
            write!(f, " (hidden)")?;
        }
        Ok(())
    }
}
