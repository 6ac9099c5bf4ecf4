//! Name relocation over parsed class files.
//!
//! Parsing and re-assembly are done by `krakatau2`. This module only decides which
//! constant-pool UTF-8 entries hold class names, descriptors, signatures, string literals
//! or package names, and rewrites them through a [`Remapper`].
//!
//! Roles come from the pool itself: `Class`, `String`, `NameAndType`, `MethodType` and
//! `Package` constants say how their UTF-8 operand is read. Entries no constant points at
//! are used by the class body (member descriptors, `Signature`, local variable tables,
//! annotation values). Those are rewritten as signatures when they parse as one, and as
//! class-shaped values otherwise.
//!
//! A string literal can share its UTF-8 entry with a class name or descriptor that maps
//! differently. The entry is then rewritten in place for the name, and the `String`
//! constants are pointed at a new entry appended to the pool.

use std::collections::HashMap;

use krakatau2::lib::classfile::cpool::{BStr, Const};
use krakatau2::lib::classfile::parse::Class;
use krakatau2::lib::{AssemblerOptions, DisassemblerOptions, ParserOptions, assemble, classfile, parse_utf8};
use tracing::debug;

use crate::error::{Result, malformed_error};
use crate::signature;

const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

/// Callbacks used while rewriting a class. Each returns `None` to keep the input.
pub trait Remapper {
    /// Maps an internal class name (`com/acme/Widget`).
    fn map(&mut self, internal_name: &str) -> Option<String>;

    /// Maps a string constant that may name a class or a resource.
    fn map_value(&mut self, value: &str) -> Option<String>;

    /// Maps an internal package name (`com/acme`) from a `module-info` package entry.
    fn map_package(&mut self, _package: &str) -> Option<String> {
        None
    }
}

/// What a class file refers to, for diagnostics and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassSummary {
    pub name: String,
    /// Every `CONSTANT_Class` name, in pool order.
    pub class_refs: Vec<String>,
    /// Every `CONSTANT_String` value, in pool order.
    pub strings: Vec<String>,
    /// Member descriptors and signatures used by the class body.
    pub descriptors: Vec<String>,
}

/// How the constant pool refers to one UTF-8 entry.
#[derive(Debug, Default)]
struct Uses {
    class: bool,
    signature: bool,
    package: bool,
    /// Member names and module names, never rewritten.
    pinned: bool,
    strings: Vec<usize>,
}

impl Uses {
    fn body_only(&self) -> bool {
        !(self.class || self.signature || self.package || self.pinned) && self.strings.is_empty()
    }
}

#[derive(Debug, Default)]
struct Plan {
    /// UTF-8 entries rewritten in place.
    rewrites: Vec<(usize, String)>,
    /// String constants moved to a new entry holding the value.
    repoints: Vec<(Vec<usize>, String)>,
}

impl Plan {
    fn is_empty(&self) -> bool {
        self.rewrites.is_empty() && self.repoints.is_empty()
    }
}

/// Rewrites `bytes` through `remapper`. Returns `Ok(None)` when nothing changed.
pub fn remap(bytes: &[u8], remapper: &mut dyn Remapper) -> Result<Option<Vec<u8>>> {
    // Holds the new UTF-8 payloads; the parsed class borrows from it.
    let mut storage: Vec<Vec<u8>> = Vec::new();
    let mut class = parse(bytes)?;

    let plan = plan(&class, remapper)?;
    if plan.is_empty() {
        return Ok(None);
    }
    for (_, value) in &plan.rewrites {
        storage.push(encode(value)?);
    }
    for (_, value) in &plan.repoints {
        storage.push(encode(value)?);
    }

    let (rewritten, appended) = storage.split_at(plan.rewrites.len());
    for ((index, _), payload) in plan.rewrites.iter().zip(rewritten) {
        class.cp.0[*index] = Const::Utf8(BStr(payload.as_slice()));
    }
    for ((strings, _), payload) in plan.repoints.iter().zip(appended) {
        let index = class.cp.0.len();
        if index >= usize::from(u16::MAX) {
            return Err(malformed_error!("constant pool overflow"));
        }
        class.cp.0.push(Const::Utf8(BStr(payload.as_slice())));
        for string in strings {
            class.cp.0[*string] = Const::Str(index as u16);
        }
    }

    reassemble(&class).map(Some)
}

/// Reads the name of the class defined by `bytes`, in binary form.
pub fn class_name(bytes: &[u8]) -> Result<String> {
    let class = parse(bytes)?;
    class
        .cp
        .clsutf(class.this)
        .and_then(parse_utf8)
        .ok_or_else(|| malformed_error!("this_class does not name a class"))
}

/// Lists the names, strings and descriptors a class file refers to.
pub fn inspect(bytes: &[u8]) -> Result<ClassSummary> {
    let class = parse(bytes)?;
    let mut summary = ClassSummary {
        name: class
            .cp
            .clsutf(class.this)
            .and_then(parse_utf8)
            .ok_or_else(|| malformed_error!("this_class does not name a class"))?,
        ..ClassSummary::default()
    };

    let uses = collect_uses(&class.cp.0)?;
    for entry in &class.cp.0 {
        match entry {
            Const::Class(i) => summary.class_refs.extend(text(&class.cp.0, usize::from(*i))),
            Const::Str(i) => summary.strings.extend(text(&class.cp.0, usize::from(*i))),
            _ => {}
        }
    }
    for (index, uses) in &uses {
        if !uses.body_only() {
            continue;
        }
        let Some(value) = text(&class.cp.0, *index).filter(|v| !v.is_empty()) else {
            continue;
        };
        if signature::map_signature(&value, &mut Unchanged).is_ok() {
            summary.descriptors.push(value);
        }
    }
    Ok(summary)
}

fn parse(bytes: &[u8]) -> Result<Class<'_>> {
    if !bytes.starts_with(&MAGIC) {
        return Err(malformed_error!("missing class file magic"));
    }
    classfile::parse(bytes, ParserOptions { no_short_code_attr: true })
        .map_err(|err| malformed_error!("{err:?}"))
}

fn reassemble(class: &Class<'_>) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    krakatau2::lib::disassemble::disassemble(&mut out, class, DisassemblerOptions { roundtrip: true })
        .map_err(|err| malformed_error!("disassembly failed: {err:?}"))?;
    let source = std::str::from_utf8(&out).map_err(|err| malformed_error!("{err}"))?;
    let mut assembled =
        assemble(source, AssemblerOptions {}).map_err(|err| malformed_error!("assembly failed: {err:?}"))?;
    assembled
        .pop()
        .map(|(_, data)| data)
        .ok_or_else(|| malformed_error!("assembler produced no class"))
}

/// Every UTF-8 entry in the pool, keyed by index, with the constants that point at it.
fn collect_uses(pool: &[Const<'_>]) -> Result<Vec<(usize, Uses)>> {
    let mut uses: HashMap<usize, Uses> = pool
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, Const::Utf8(_)))
        .map(|(i, _)| (i, Uses::default()))
        .collect();

    for (at, entry) in pool.iter().enumerate() {
        match *entry {
            Const::Class(i) => use_of(&mut uses, at, i)?.class = true,
            Const::Str(i) => use_of(&mut uses, at, i)?.strings.push(at),
            Const::MethodType(i) => use_of(&mut uses, at, i)?.signature = true,
            Const::Package(i) => use_of(&mut uses, at, i)?.package = true,
            Const::Module(i) => use_of(&mut uses, at, i)?.pinned = true,
            Const::NameAndType(name, descriptor) => {
                use_of(&mut uses, at, name)?.pinned = true;
                use_of(&mut uses, at, descriptor)?.signature = true;
            }
            _ => {}
        }
    }

    let mut sorted: Vec<_> = uses.into_iter().collect();
    sorted.sort_unstable_by_key(|(i, _)| *i);
    Ok(sorted)
}

fn use_of(uses: &mut HashMap<usize, Uses>, at: usize, index: u16) -> Result<&mut Uses> {
    uses.get_mut(&usize::from(index))
        .ok_or_else(|| malformed_error!("constant {at} points at non-utf8 entry {index}"))
}

fn plan(class: &Class<'_>, remapper: &mut dyn Remapper) -> Result<Plan> {
    let pool = &class.cp.0;
    let mut plan = Plan::default();
    let mut appended: HashMap<String, usize> = HashMap::new();

    for (index, uses) in collect_uses(pool)? {
        let Some(original) = text(pool, index) else {
            debug!(index, "skipping undecodable utf8 constant");
            continue;
        };

        let primary = if uses.class && original.starts_with('[') {
            descriptor(&original, remapper)
        } else if uses.class {
            remapper.map(&original)
        } else if uses.signature {
            descriptor(&original, remapper)
        } else if uses.package {
            remapper.map_package(&original)
        } else if uses.pinned {
            None
        } else {
            body_value(&original, remapper)
        };
        let primary = primary.filter(|mapped| *mapped != original);

        if !uses.strings.is_empty() {
            let literal = remapper.map_value(&original).unwrap_or_else(|| original.clone());
            if literal != *primary.as_ref().unwrap_or(&original) {
                match appended.get(&literal) {
                    Some(slot) => plan.repoints[*slot].0.extend(&uses.strings),
                    None => {
                        appended.insert(literal.clone(), plan.repoints.len());
                        plan.repoints.push((uses.strings.clone(), literal));
                    }
                }
            }
        }
        if let Some(mapped) = primary {
            plan.rewrites.push((index, mapped));
        }
    }
    Ok(plan)
}

/// Rewrites a body-only entry: a descriptor or signature if it parses as one, otherwise a
/// class-shaped value. Plain identifiers are left alone.
fn body_value(original: &str, remapper: &mut dyn Remapper) -> Option<String> {
    match signature::map_signature(original, remapper) {
        Ok(mapped) => mapped,
        Err(_) if original.contains(['.', '/']) => remapper.map_value(original),
        Err(_) => None,
    }
}

fn descriptor(original: &str, remapper: &mut dyn Remapper) -> Option<String> {
    match signature::map_signature(original, remapper) {
        Ok(mapped) => mapped,
        Err(err) => {
            debug!(descriptor = original, error = %err, "leaving unparseable descriptor as is");
            None
        }
    }
}

fn text(pool: &[Const<'_>], index: usize) -> Option<String> {
    match pool.get(index)? {
        Const::Utf8(BStr(bytes)) => parse_utf8(bytes),
        _ => None,
    }
}

/// Standard UTF-8 matches the class file encoding unless the text holds NUL or
/// supplementary characters; those are refused rather than re-encoded.
fn encode(value: &str) -> Result<Vec<u8>> {
    if value.chars().any(|c| c == '\0' || u32::from(c) > 0xFFFF) {
        return Err(malformed_error!("cannot store {value:?} in the constant pool"));
    }
    if value.len() > usize::from(u16::MAX) {
        return Err(malformed_error!("constant of {} bytes exceeds the pool limit", value.len()));
    }
    Ok(value.as_bytes().to_vec())
}

struct Unchanged;

impl Remapper for Unchanged {
    fn map(&mut self, _name: &str) -> Option<String> {
        None
    }

    fn map_value(&mut self, _value: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UTF8: u8 = 1;
    const CLASS: u8 = 7;
    const STRING: u8 = 8;
    const LONG: u8 = 5;

    /// Hand-assembled class: `class com/acme/Widget extends java/lang/Object` with a field
    /// `Lcom/acme/Gadget; gadget`, a string constant and a shared utf8 entry.
    fn sample_class() -> Vec<u8> {
        let mut pool: Vec<Vec<u8>> = Vec::new();
        let utf8 = |s: &str| {
            let mut e = vec![UTF8];
            e.extend_from_slice(&(s.len() as u16).to_be_bytes());
            e.extend_from_slice(s.as_bytes());
            e
        };
        let reference = |tag: u8, i: u16| {
            let mut e = vec![tag];
            e.extend_from_slice(&i.to_be_bytes());
            e
        };
        pool.push(utf8("com/acme/Widget")); // 1
        pool.push(reference(CLASS, 1)); // 2
        pool.push(utf8("java/lang/Object")); // 3
        pool.push(reference(CLASS, 3)); // 4
        pool.push(utf8("gadget")); // 5
        pool.push(utf8("Lcom/acme/Gadget;")); // 6
        pool.push(reference(STRING, 1)); // 7, shares entry 1 with the class
        pool.push(utf8("com.acme.Gadget")); // 8
        pool.push(reference(STRING, 8)); // 9
        pool.push(vec![LONG, 0, 0, 0, 0, 0, 0, 0, 42]); // 10, 11

        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&[0, 0, 0, 52]);
        out.extend_from_slice(&12u16.to_be_bytes());
        for e in pool {
            out.extend_from_slice(&e);
        }
        out.extend_from_slice(&[0x00, 0x21, 0, 2, 0, 4, 0, 0]);
        // one field
        out.extend_from_slice(&[0, 1, 0, 0x02, 0, 5, 0, 6, 0, 0]);
        // no methods, no attributes
        out.extend_from_slice(&[0, 0, 0, 0]);
        out
    }

    struct Acme;

    impl Remapper for Acme {
        fn map(&mut self, name: &str) -> Option<String> {
            name.strip_prefix("com/acme/").map(|rest| format!("v/com/acme/{rest}"))
        }

        fn map_value(&mut self, value: &str) -> Option<String> {
            value.strip_prefix("com.acme.").map(|rest| format!("v.com.acme.{rest}"))
        }
    }

    #[test]
    fn inspect_reads_names_and_constants() {
        let summary = inspect(&sample_class()).unwrap();
        assert_eq!(summary.name, "com/acme/Widget");
        assert_eq!(summary.class_refs, vec!["com/acme/Widget", "java/lang/Object"]);
        assert_eq!(summary.strings, vec!["com/acme/Widget", "com.acme.Gadget"]);
        assert_eq!(summary.descriptors, vec!["Lcom/acme/Gadget;"]);
    }

    #[test]
    fn unchanged_classes_report_none() {
        assert!(remap(&sample_class(), &mut Unchanged).unwrap().is_none());
    }

    #[test]
    fn remap_rewrites_every_name_role() {
        let out = remap(&sample_class(), &mut Acme).unwrap().unwrap();
        let summary = inspect(&out).unwrap();
        assert_eq!(summary.name, "v/com/acme/Widget");
        assert!(summary.class_refs.contains(&"java/lang/Object".to_string()));
        assert_eq!(summary.descriptors, vec!["Lv/com/acme/Gadget;"]);
        // the literal sharing the class name keeps its text
        assert_eq!(summary.strings, vec!["com/acme/Widget", "v.com.acme.Gadget"]);
        assert_eq!(class_name(&out).unwrap(), "v/com/acme/Widget");
    }

    #[test]
    fn remap_is_idempotent_once_names_are_moved() {
        let once = remap(&sample_class(), &mut Acme).unwrap().unwrap();
        struct Moved;
        impl Remapper for Moved {
            fn map(&mut self, name: &str) -> Option<String> {
                (name.starts_with("com/acme/")).then(|| format!("v/{name}"))
            }
            fn map_value(&mut self, _value: &str) -> Option<String> {
                None
            }
        }
        assert!(remap(&once, &mut Moved).unwrap().is_none());
    }

    #[test]
    fn body_values_are_told_apart_by_shape() {
        assert_eq!(body_value("Code", &mut Acme), None);
        assert_eq!(body_value("gadget", &mut Acme), None);
        assert_eq!(
            body_value("(Lcom/acme/Gadget;)V", &mut Acme).as_deref(),
            Some("(Lv/com/acme/Gadget;)V")
        );
        assert_eq!(
            body_value("com.acme.Gadget", &mut Acme).as_deref(),
            Some("v.com.acme.Gadget")
        );
    }

    #[test]
    fn damaged_classes_are_malformed() {
        let mut bytes = sample_class();
        bytes[0] = 0;
        assert!(remap(&bytes, &mut Acme).unwrap_err().is_resource_failure());

        let truncated = &sample_class()[..20];
        assert!(remap(truncated, &mut Acme).unwrap_err().is_resource_failure());
    }

    #[test]
    fn unencodable_constants_are_rejected() {
        assert!(encode("a\u{0}b").is_err());
        assert!(encode("\u{1F600}").is_err());
        assert!(encode(&"x".repeat(70_000)).is_err());
        assert_eq!(encode("plain").unwrap(), b"plain");
    }
}
