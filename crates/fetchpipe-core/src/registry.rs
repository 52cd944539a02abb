//! Step tokens and the transformation registry
//!
//! A [`StepToken`] is what callers write: `name` or `name:argument`. The
//! [`StepRegistry`] maps the name to a [`Transformation`], which decodes
//! the argument once into a typed [`StepArgument`]. The runner then only
//! ever dispatches on [`ResolvedStep`]s.

use crate::error::PipelineError;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::num::NonZeroU32;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// A named step, optionally carrying one argument
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepToken {
    name: String,
    argument: Option<String>,
}

impl StepToken {
    /// Token without argument
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            argument: None,
        }
    }

    /// Token with argument
    #[must_use]
    pub fn with_argument(name: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            argument: Some(argument.into()),
        }
    }

    /// Step name, used for registry lookup
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw argument text, if any
    #[inline]
    #[must_use]
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }
}

impl Display for StepToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.argument {
            Some(arg) => write!(f, "{}:{arg}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for StepToken {
    type Err = PipelineError;

    /// Split on the first `:`; everything after it is the argument.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, argument) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };
        if name.is_empty() {
            return Err(PipelineError::invalid_argument(s, "empty step name"));
        }
        Ok(Self {
            name: name.to_owned(),
            argument: argument.map(str::to_owned),
        })
    }
}

impl serde::Serialize for StepToken {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for StepToken {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Argument of a step, decoded once from its token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepArgument {
    /// The step takes no argument
    None,
    /// Target width in pixels
    Width(NonZeroU32),
}

/// A transformation applied to an artifact file
///
/// Implementations read `source` and write `destination`; the runner takes
/// care of paths, consumption and atomic placement.
pub trait Transformation: Send + Sync + fmt::Debug {
    /// Name looked up in the registry
    fn name(&self) -> &str;

    /// Mimetypes this transformation can read
    fn accepted_mime_types(&self) -> &[&str];

    /// Decode the raw argument of a token naming this transformation.
    ///
    /// # Errors
    /// `PipelineError::InvalidArgument` for a missing, unexpected or
    /// malformed argument
    fn decode(&self, token: &StepToken) -> Result<StepArgument, PipelineError>;

    /// Transform `source` into `destination`, keeping `mime_type`.
    ///
    /// # Errors
    /// Any failure reading, transforming or writing
    fn apply(
        &self,
        argument: StepArgument,
        source: &Path,
        destination: &Path,
        mime_type: &str,
    ) -> Result<(), PipelineError>;

    /// Reject mimetypes outside [`Transformation::accepted_mime_types`].
    ///
    /// # Errors
    /// `PipelineError::TypeMismatch` naming the accepted set
    fn check_mime_type(&self, mime_type: &str) -> Result<(), PipelineError> {
        let accepted = self.accepted_mime_types();
        if accepted.iter().any(|m| m.eq_ignore_ascii_case(mime_type)) {
            Ok(())
        } else {
            Err(PipelineError::type_mismatch(
                format!("{} input ({})", self.name(), accepted.join(", ")),
                mime_type,
            ))
        }
    }
}

/// A token bound to its transformation and decoded argument
#[derive(Debug, Clone)]
pub struct ResolvedStep {
    /// Token as requested
    pub token: StepToken,
    /// Transformation to run
    pub transformation: Arc<dyn Transformation>,
    /// Decoded argument
    pub argument: StepArgument,
}

/// Registry of transformations by name
///
/// Built explicitly at startup and handed to the runner; there is no
/// process-wide registry.
#[derive(Debug, Default, Clone)]
pub struct StepRegistry {
    transformations: HashMap<String, Arc<dyn Transformation>>,
}

impl StepRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            transformations: HashMap::new(),
        }
    }

    /// Create registry with the built-in image steps
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(crate::steps::Monochrome);
        registry.register(crate::steps::Thumbnail);
        registry.register(crate::steps::Resize);
        registry
    }

    /// Register a transformation under its name, replacing any previous one
    pub fn register<T: Transformation + 'static>(&mut self, transformation: T) {
        self.register_arc(Arc::new(transformation));
    }

    /// Register a shared transformation under its name
    pub fn register_arc(&mut self, transformation: Arc<dyn Transformation>) {
        self.transformations
            .insert(transformation.name().to_owned(), transformation);
    }

    /// Look up a transformation by name
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Transformation>> {
        self.transformations.get(name)
    }

    /// Check if a name is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.transformations.contains_key(name)
    }

    /// Bind a token to its transformation and decode its argument.
    ///
    /// # Errors
    /// - `PipelineError::UnknownStep` if the name is not registered
    /// - `PipelineError::InvalidArgument` if the argument does not decode
    pub fn resolve(&self, token: &StepToken) -> Result<ResolvedStep, PipelineError> {
        let transformation = self
            .get(token.name())
            .ok_or_else(|| PipelineError::UnknownStep(token.name().to_owned()))?;
        let argument = transformation.decode(token)?;
        Ok(ResolvedStep {
            token: token.clone(),
            transformation: Arc::clone(transformation),
            argument,
        })
    }

    /// List all registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transformations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Get number of registered transformations
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.transformations.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transformations.is_empty()
    }
}
