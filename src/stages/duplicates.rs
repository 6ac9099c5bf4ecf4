use std::collections::HashMap;

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{Error, Result};
use crate::pipeline::{Next, Outcome, Stage};
use crate::resource::ClassPathResource;
use crate::stages::DUPLICATES;

fn origin(resource: &ClassPathResource) -> String {
    resource
        .element()
        .map(|e| e.id().to_string())
        .unwrap_or_else(|| "<generated>".to_string())
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// First claim on an output path: where it came from and what it held.
#[derive(Debug)]
struct Claim {
    origin: String,
    digest: String,
}

/// Keeps the first file written to each output path.
#[derive(Debug, Default)]
pub struct DuplicateStage {
    seen: HashMap<String, Claim>,
}

impl DuplicateStage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for DuplicateStage {
    fn name(&self) -> &'static str {
        "duplicates"
    }

    fn priority(&self) -> i32 {
        DUPLICATES
    }

    fn process(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        if !resource.is_file() {
            return next.proceed(resource);
        }
        // An unreadable entry must fail here, before it claims the path.
        let hash = digest(resource.content()?);
        let key = resource.full_name();
        let Some(first) = self.seen.get(&key) else {
            self.seen.insert(
                key,
                Claim {
                    origin: origin(&resource),
                    digest: hash,
                },
            );
            return next.proceed(resource);
        };

        if next.context().fail_on_duplicate() {
            return Err(Error::DuplicateEntry {
                name: key,
                first: first.origin.clone(),
                second: origin(&resource),
            });
        }
        warn!(
            name = %key,
            first = %first.origin,
            second = %origin(&resource),
            identical = first.digest == hash,
            "dropping duplicate entry"
        );
        next.context().counters_mut().duplicates += 1;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Pipeline, Sweep, SweepContext};

    fn file(name: &str, content: &[u8]) -> ClassPathResource {
        ClassPathResource::from_bytes(name, content.to_vec())
    }

    #[test]
    fn first_occurrence_wins() {
        let mut pipeline = Pipeline::new(vec![Box::new(DuplicateStage::new()) as Box<dyn Stage>]);
        let mut ctx = SweepContext::new(false);
        let first = pipeline.run(Sweep::Process, file("a.txt", b"one"), &mut ctx).unwrap();
        let second = pipeline.run(Sweep::Process, file("a.txt", b"two"), &mut ctx).unwrap();
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(ctx.counters().duplicates, 1);
    }

    #[test]
    fn versioned_copies_are_distinct() {
        let mut pipeline = Pipeline::new(vec![Box::new(DuplicateStage::new()) as Box<dyn Stage>]);
        let mut ctx = SweepContext::new(false);
        pipeline.run(Sweep::Process, file("a/B.class", b"x"), &mut ctx).unwrap();
        let versioned = file("a/B.class", b"x").with_prefix(Some("META-INF/versions/11/".into()));
        assert_eq!(pipeline.run(Sweep::Process, versioned, &mut ctx).unwrap().len(), 1);
    }

    #[test]
    fn fail_fast_reports_the_entry() {
        let mut pipeline = Pipeline::new(vec![Box::new(DuplicateStage::new()) as Box<dyn Stage>]);
        let mut ctx = SweepContext::new(true);
        pipeline.run(Sweep::Process, file("a.txt", b"one"), &mut ctx).unwrap();
        let err = pipeline
            .run(Sweep::Process, file("a.txt", b"one"), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateEntry { ref name, .. } if name == "a.txt"));
        assert!(!err.is_resource_failure());
    }

    #[test]
    fn unreadable_files_do_not_claim_the_path() {
        let mut pipeline = Pipeline::new(vec![Box::new(DuplicateStage::new()) as Box<dyn Stage>]);
        let mut ctx = SweepContext::new(false);
        let dir = tempfile::tempdir().unwrap();
        let broken = ClassPathResource::from_file("a.txt", dir.path().join("missing.txt"));
        let err = pipeline.run(Sweep::Process, broken, &mut ctx).unwrap_err();
        assert!(err.is_resource_failure());

        let kept = pipeline.run(Sweep::Process, file("a.txt", b"good"), &mut ctx).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(ctx.counters().duplicates, 0);
    }

    #[test]
    fn digests_are_hex_sha256() {
        assert_eq!(
            digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
