use tracing::debug;

use crate::error::Result;
use crate::names::MODULE_INFO;
use crate::pipeline::{Next, Outcome, Stage};
use crate::resource::ClassPathResource;
use crate::stages::{MANIFEST_FILTER, MAVEN_METADATA, SIGNATURE_FILTER};

const META_INF: &str = "META-INF/";

fn discard(resource: &ClassPathResource, next: &mut Next<'_, '_>, why: &'static str) -> Result<Outcome> {
    debug!(name = %resource.full_name(), reason = why, "dropping entry");
    next.context().counters_mut().filtered += 1;
    Ok(Vec::new())
}

/// `META-INF/*.SF`, `*.DSA`, `*.RSA`, `*.EC` and `META-INF/SIG-*`: the merged archive
/// invalidates any signature they carry.
pub fn is_signature_file(name: &str) -> bool {
    let Some(file) = name.strip_prefix(META_INF) else {
        return false;
    };
    if file.is_empty() || file.contains('/') {
        return false;
    }
    let upper = file.to_ascii_uppercase();
    upper.starts_with("SIG-")
        || [".SF", ".DSA", ".RSA", ".EC"]
            .iter()
            .any(|ext| upper.ends_with(ext))
}

#[derive(Debug, Default)]
pub struct SignatureFilterStage;

impl Stage for SignatureFilterStage {
    fn name(&self) -> &'static str {
        "signature-filter"
    }

    fn priority(&self) -> i32 {
        SIGNATURE_FILTER
    }

    fn process(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        if resource.is_file() && is_signature_file(resource.name()) {
            return discard(&resource, &mut next, "signature");
        }
        next.proceed(resource)
    }
}

/// Drops manifests, jar indexes and module descriptors of every archive but the root.
#[derive(Debug, Default)]
pub struct ManifestFilterStage;

impl ManifestFilterStage {
    fn is_archive_metadata(name: &str) -> bool {
        matches!(name, "META-INF/MANIFEST.MF" | "META-INF/INDEX.LIST") || name == MODULE_INFO
    }
}

impl Stage for ManifestFilterStage {
    fn name(&self) -> &'static str {
        "manifest-filter"
    }

    fn priority(&self) -> i32 {
        MANIFEST_FILTER
    }

    fn process(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        if !resource.is_root() && Self::is_archive_metadata(resource.name()) {
            return discard(&resource, &mut next, "archive metadata");
        }
        next.proceed(resource)
    }
}

/// Optional: drops `META-INF/maven/**` (embedded POMs) from every archive but the root.
#[derive(Debug, Default)]
pub struct MavenMetadataStage;

impl MavenMetadataStage {
    pub const NAME: &'static str = "strip-maven-metadata";
}

impl Stage for MavenMetadataStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn priority(&self) -> i32 {
        MAVEN_METADATA
    }

    fn process(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        if !resource.is_root() && resource.name().starts_with("META-INF/maven/") {
            return discard(&resource, &mut next, "maven metadata");
        }
        next.proceed(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ClassPath, ElementSpec};
    use crate::pipeline::{Pipeline, Sweep, SweepContext};

    #[test]
    fn signature_files_are_recognized() {
        for name in [
            "META-INF/FOO.SF",
            "META-INF/foo.rsa",
            "META-INF/KEY.DSA",
            "META-INF/KEY.EC",
            "META-INF/SIG-ONE",
        ] {
            assert!(is_signature_file(name), "{name}");
        }
        for name in [
            "META-INF/MANIFEST.MF",
            "META-INF/services/x.SF",
            "FOO.SF",
            "META-INF/",
        ] {
            assert!(!is_signature_file(name), "{name}");
        }
    }

    fn survives(stage: Box<dyn Stage>, resource: ClassPathResource) -> bool {
        let mut pipeline = Pipeline::new(vec![stage]);
        let mut ctx = SweepContext::new(false);
        !pipeline.run(Sweep::Process, resource, &mut ctx).unwrap().is_empty()
    }

    #[test]
    fn archive_metadata_survives_only_for_the_root() {
        let mut cp = ClassPath::new();
        let root = cp.add(ElementSpec::new("app.jar").root());
        let lib = cp.add(ElementSpec::new("lib.jar").relocate("v"));
        for name in ["META-INF/MANIFEST.MF", "META-INF/INDEX.LIST", "module-info.class"] {
            let res = ClassPathResource::from_bytes(name, Vec::new());
            assert!(survives(Box::new(ManifestFilterStage), res.with_element(&root)));
            assert!(!survives(Box::new(ManifestFilterStage), res.with_element(&lib)));
        }
        let other = ClassPathResource::from_bytes("META-INF/LICENSE", Vec::new()).with_element(&lib);
        assert!(survives(Box::new(ManifestFilterStage), other));
    }

    #[test]
    fn maven_metadata_is_stripped_from_libraries() {
        let mut cp = ClassPath::new();
        let lib = cp.add(ElementSpec::new("lib.jar"));
        let pom = ClassPathResource::from_bytes("META-INF/maven/g/a/pom.xml", Vec::new()).with_element(&lib);
        assert!(!survives(Box::new(MavenMetadataStage), pom));
    }
}
