use tracing::trace;

use crate::error::Result;
use crate::pipeline::{Next, Outcome, Stage};
use crate::resource::ClassPathResource;
use crate::stages::MULTI_RELEASE;

const VERSIONS: &str = "META-INF/versions/";

/// Versions up to this one are never folded; 9 is the first multi-release runtime.
const BASE_VERSION: u32 = 8;

/// Splits `META-INF/versions/<N>/<tail>` into (`META-INF/versions/<N>/`, `tail`) when
/// `N` is above 8 and the tail is non-empty.
pub fn split_version_prefix(name: &str) -> Option<(&str, &str)> {
    let rest = name.strip_prefix(VERSIONS)?;
    let slash = rest.find('/')?;
    let version: u32 = rest[..slash].parse().ok()?;
    let tail = &rest[slash + 1..];
    if version <= BASE_VERSION || tail.is_empty() {
        return None;
    }
    let split = VERSIONS.len() + slash + 1;
    Some((&name[..split], tail))
}

/// Lets the rest of the chain see versioned entries under their unversioned name.
///
/// The prefix rides along in [`ClassPathResource::version_prefix`]; anything that comes
/// back from the chain without one (a replacement built from scratch) gets it reattached.
#[derive(Debug, Default)]
pub struct MultiReleaseStage;

impl MultiReleaseStage {
    pub fn new() -> Self {
        Self
    }

    fn fold(&self, resource: ClassPathResource, next: &mut Next<'_, '_>) -> Result<Outcome> {
        let Some((prefix, tail)) = split_version_prefix(resource.name()) else {
            return next.proceed(resource);
        };
        trace!(name = resource.name(), prefix, "folding versioned entry");
        let prefix = prefix.to_string();
        let folded = resource.with_name(tail).with_prefix(Some(prefix.clone()));

        let outcome = next.proceed(folded)?;
        Ok(outcome
            .into_iter()
            .map(|r| {
                if r.version_prefix().is_none() && r.is_file() {
                    r.with_prefix(Some(prefix.clone()))
                } else {
                    r
                }
            })
            .collect())
    }
}

impl Stage for MultiReleaseStage {
    fn name(&self) -> &'static str {
        "multi-release"
    }

    fn priority(&self) -> i32 {
        MULTI_RELEASE
    }

    fn pre_scan(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        self.fold(resource, &mut next)
    }

    fn scan(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        self.fold(resource, &mut next)
    }

    fn process(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        self.fold(resource, &mut next)
    }
}
