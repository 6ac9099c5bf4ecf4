use tracing::debug;

use crate::classfile::Remapper;
use crate::error::Result;
use crate::pipeline::{Next, Outcome, Stage};
use crate::resource::ClassPathResource;
use crate::stages::SERVICE_FILES;

const SERVICES: &str = "META-INF/services/";

/// Rewrites `META-INF/services/<interface>` provider-configuration files: the file name
/// and every provider line. Comments and blank lines are kept.
#[derive(Debug, Default)]
pub struct ServiceFileStage;

impl ServiceFileStage {
    pub fn new() -> Self {
        Self::default()
    }

    fn rewrite(&mut self, resource: &ClassPathResource, next: &mut Next<'_, '_>) -> Result<Option<ClassPathResource>> {
        let Some(interface) = resource.name().strip_prefix(SERVICES) else {
            return Ok(None);
        };
        if interface.is_empty() || interface.contains('/') {
            return Ok(None);
        }
        let mut remapper = next.context().remapper()?;

        let new_name = remapper
            .map_value(interface)
            .map(|mapped| format!("{SERVICES}{mapped}"));
        let new_content = match std::str::from_utf8(resource.content()?) {
            Ok(text) => rewrite_providers(text, &mut remapper),
            Err(_) => {
                debug!(name = resource.name(), "service file is not utf-8, leaving as is");
                None
            }
        };

        if new_name.is_none() && new_content.is_none() {
            return Ok(None);
        }
        next.context().counters_mut().service_files_rewritten += 1;
        let mut rewritten = resource.clone();
        if let Some(text) = new_content {
            rewritten = rewritten.with_content(text.into_bytes());
        }
        if let Some(name) = new_name {
            rewritten = rewritten.with_name(name);
        }
        Ok(Some(rewritten))
    }
}

/// Maps each provider class name; returns `None` if no line changed.
fn rewrite_providers(text: &str, remapper: &mut dyn Remapper) -> Option<String> {
    let mut out = String::with_capacity(text.len() + 32);
    let mut changed = false;
    for line in text.split_inclusive('\n') {
        let (body, comment) = match line.find('#') {
            Some(at) => line.split_at(at),
            None => (line, ""),
        };
        let provider = body.trim();
        let mapped = if provider.is_empty() {
            None
        } else {
            remapper.map_value(provider)
        };
        match mapped {
            Some(mapped) => {
                changed = true;
                let start = body.find(provider).unwrap_or(0);
                out.push_str(&body[..start]);
                out.push_str(&mapped);
                out.push_str(&body[start + provider.len()..]);
                out.push_str(comment);
            }
            None => out.push_str(line),
        }
    }
    changed.then_some(out)
}

impl Stage for ServiceFileStage {
    fn name(&self) -> &'static str {
        "service-files"
    }

    fn priority(&self) -> i32 {
        SERVICE_FILES
    }

    fn process(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        if !resource.is_file() || resource.is_class() {
            return next.proceed(resource);
        }
        match self.rewrite(&resource, &mut next)? {
            Some(rewritten) => next.proceed(rewritten),
            None => next.proceed(resource),
        }
    }
}
