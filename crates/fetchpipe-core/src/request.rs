//! Inbound requests
//!
//! A request is a source URL, an ordered chain of step tokens and an
//! optional final extension. It can also be read from the compact form
//! used in artifact names, `<url>..<step>..<step><.ext>`.

use crate::error::PipelineError;
use crate::registry::StepToken;
use fetchpipe_artifact::{Bundle, STEP_SEPARATOR};
use fetchpipe_lock::Signature;
use serde::{Deserialize, Serialize};

/// What a caller wants: fetch `url`, apply `steps` in order, name the
/// result with `target_extension`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRequest {
    /// Source URL, normalized later by the bundle
    pub url: String,
    /// Steps in application order
    #[serde(default)]
    pub steps: Vec<StepToken>,
    /// Final extension, with leading dot
    #[serde(default)]
    pub target_extension: Option<String>,
}

impl ProcessRequest {
    /// Request for `url` with no steps
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            steps: Vec::new(),
            target_extension: None,
        }
    }

    /// Append a step
    #[must_use]
    pub fn with_step(mut self, step: StepToken) -> Self {
        self.steps.push(step);
        self
    }

    /// Set the final extension
    #[must_use]
    pub fn with_target_extension(mut self, extension: impl Into<String>) -> Self {
        self.target_extension = Some(extension.into());
        self
    }

    /// Parse the compact artifact-name form.
    ///
    /// `http://e.com/a.jpg..bw..resize:640.png` yields the URL
    /// `http://e.com/a.jpg`, steps `bw` and `resize:640`, and target
    /// extension `.png`. Without any `..` the request has no steps.
    ///
    /// # Errors
    /// `PipelineError::InvalidArgument` for an empty step token
    pub fn parse(pipeline: &str) -> Result<Self, PipelineError> {
        let mut parts = pipeline.split(STEP_SEPARATOR);
        let url = parts.next().unwrap_or_default().to_owned();
        let mut raw_steps: Vec<&str> = parts.collect();

        let mut target_extension = None;
        if let Some(last) = raw_steps.last_mut() {
            let (stem, ext) = split_extension(*last);
            *last = stem;
            target_extension = ext.map(str::to_owned);
        }

        let steps = raw_steps
            .into_iter()
            .map(str::parse)
            .collect::<Result<Vec<StepToken>, _>>()?;

        Ok(Self {
            url,
            steps,
            target_extension,
        })
    }

    /// Tokens of the chain as strings, in application order
    #[must_use]
    pub fn chain(&self) -> Vec<String> {
        self.steps.iter().map(ToString::to_string).collect()
    }

    /// Fresh bundle for this request, nothing applied yet
    #[must_use]
    pub fn bundle(&self) -> Bundle {
        Bundle::new(&self.url, self.chain(), self.target_extension.clone())
    }

    /// Claim key of this request, over the normalized URL
    #[must_use]
    pub fn signature(&self) -> Signature {
        let bundle = self.bundle();
        Signature::new(bundle.source_url(), bundle.chain())
    }
}

/// Split `name.ext` into `("name", Some(".ext"))`; a leading dot does not
/// start an extension.
fn split_extension(token: &str) -> (&str, Option<&str>) {
    match token.rfind('.') {
        Some(idx) if idx > 0 => (&token[..idx], Some(&token[idx..])),
        _ => (token, None),
    }
}
