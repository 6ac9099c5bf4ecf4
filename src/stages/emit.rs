use crate::error::Result;
use crate::pipeline::{Next, Outcome, Stage};
use crate::resource::ClassPathResource;
use crate::stages::EMIT;
use crate::transform::{PreparedEntry, ResourceSink};

/// Outermost stage: whatever survives the chain is handed to the sink.
pub struct EmitStage<'s> {
    sink: &'s mut dyn ResourceSink,
}

impl<'s> EmitStage<'s> {
    pub fn new(sink: &'s mut dyn ResourceSink) -> Self {
        Self { sink }
    }
}

impl Stage for EmitStage<'_> {
    fn name(&self) -> &'static str {
        "emit"
    }

    fn priority(&self) -> i32 {
        EMIT
    }

    fn process(&mut self, resource: ClassPathResource, mut next: Next<'_, '_>) -> Result<Outcome> {
        let outcome = next.proceed(resource)?;
        for survivor in &outcome {
            let prepared = PreparedEntry::new(survivor);
            self.sink.accept(prepared.entry()?)?;
        }
        next.context().counters_mut().emitted += outcome.len();
        Ok(outcome)
    }
}
