use tracing::debug;

use crate::classfile::{self, Remapper};
use crate::error::Result;
use crate::names::{self, CLASS_SUFFIX, MODULE_INFO};
use crate::pipeline::{Next, Outcome, Stage};
use crate::resource::ClassPathResource;
use crate::stages::CLASS_BODY;

/// Rewrites class bodies and moves relocated classes to their new paths.
///
/// Root classes keep their own names but their references are still rewritten; the root's
/// module descriptor is passed through untouched.
#[derive(Debug, Default)]
pub struct ClassBodyStage;

impl ClassBodyStage {
    pub fn new() -> Self {
        Self::default()
    }

    fn relocate(&mut self, resource: &ClassPathResource, next: &mut Next<'_, '_>) -> Result<Option<ClassPathResource>> {
        let mut remapper = next.context().remapper()?;

        let content = classfile::remap(resource.content()?, &mut remapper)?;
        let new_name = if resource.is_root() {
            None
        } else {
            names::strip_class_suffix(resource.name())
                .and_then(|stem| remapper.map(stem))
                .map(|mapped| format!("{mapped}{CLASS_SUFFIX}"))
        };

        if content.is_none() && new_name.is_none() {
            return Ok(None);
        }
        let counters = next.context().counters_mut();
        let mut relocated = resource.clone();
        if let Some(bytes) = content {
            counters.classes_rewritten += 1;
            relocated = relocated.with_content(bytes);
        }
        if let Some(name) = new_name {
            debug!(from = resource.name(), to = %name, "relocating class");
            counters.classes_renamed += 1;
            relocated = relocated.with_name(name);
        }
        Ok(Some(relocated))
    }
}

impl Stage for ClassBodyStage {
    fn name(&self) -> &'static str {
        "class-body"
    }

    fn priority(&self) -> i32 {
        CLASS_BODY
    }

    fn process(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        if !resource.is_class() || (resource.is_root() && resource.name() == MODULE_INFO) {
            return next.proceed(resource);
        }
        match self.relocate(&resource, &mut next)? {
            Some(relocated) => next.proceed(relocated),
            None => next.proceed(resource),
        }
    }
}
