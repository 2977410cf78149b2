//! Ordered transformation chains.

use super::{create_transformation, Transformation};
use crate::error::Result;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Transformations applied left to right.
#[derive(Clone, Default)]
pub struct TransformationPipeline {
    steps: Vec<Arc<dyn Transformation>>,
}

impl TransformationPipeline {
    /// An empty pipeline; values pass through untouched.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pipeline from names. `none` discards the steps before it.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut pipeline = Self::new();
        for name in names {
            pipeline.push(create_transformation(name.as_ref())?);
        }
        Ok(pipeline)
    }

    /// Append a step.
    pub fn push(&mut self, step: Arc<dyn Transformation>) {
        if step.name() == "none" {
            self.steps.clear();
        } else {
            self.steps.push(step);
        }
    }

    /// Run the value through every step.
    pub fn apply<'a>(&self, input: &'a str) -> Cow<'a, str> {
        let mut value = Cow::Borrowed(input);
        for step in &self.steps {
            value = match value {
                Cow::Borrowed(s) => step.transform(s),
                Cow::Owned(s) => Cow::Owned(step.transform(&s).into_owned()),
            };
        }
        value
    }

    /// Step names in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// True when no step is configured.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

impl fmt::Debug for TransformationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pipeline_borrows() {
        let pipeline = TransformationPipeline::new();
        assert!(matches!(pipeline.apply("abc"), Cow::Borrowed("abc")));
    }

    #[test]
    fn test_applied_in_order() {
        let pipeline =
            TransformationPipeline::from_names(&["urlDecode", "lowercase", "compressWhitespace"])
                .unwrap();
        assert_eq!(pipeline.apply("UNION%20%20SELECT"), "union select");
    }

    #[test]
    fn test_none_resets() {
        let pipeline =
            TransformationPipeline::from_names(&["lowercase", "none", "uppercase"]).unwrap();
        assert_eq!(pipeline.names(), vec!["uppercase"]);
        assert_eq!(pipeline.apply("hello"), "HELLO");
    }

    #[test]
    fn test_unknown_name_rejected() {
        assert!(TransformationPipeline::from_names(&["sha1"]).is_err());
    }
}
