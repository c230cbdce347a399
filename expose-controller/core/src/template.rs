use std::{fmt, str::FromStr};
use thiserror::Error;

const DEFAULT_TEMPLATE: &str = "{{.Service}}.{{.Namespace}}.{{.Domain}}";

/// A host name template over the service name, namespace and domain.
///
/// Placeholders are written `{{.Service}}`, `{{.Namespace}}` and
/// `{{.Domain}}`; everything else is copied literally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlTemplate(Vec<Segment>);

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Service,
    Namespace,
    Domain,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated placeholder in URL template {0:?}")]
    Unterminated(String),

    #[error("unknown placeholder {{{{{0}}}}} in URL template")]
    UnknownPlaceholder(String),
}

// === impl UrlTemplate ===

impl UrlTemplate {
    /// Parses `template`, falling back to the default for an empty string.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        if template.trim().is_empty() {
            return DEFAULT_TEMPLATE.parse();
        }
        template.parse()
    }

    pub fn render(&self, service: &str, namespace: &str, domain: &str) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Service => out.push_str(service),
                Segment::Namespace => out.push_str(namespace),
                Segment::Domain => out.push_str(domain),
            }
        }
        out
    }
}

impl Default for UrlTemplate {
    fn default() -> Self {
        Self(vec![
            Segment::Service,
            Segment::Literal(".".to_string()),
            Segment::Namespace,
            Segment::Literal(".".to_string()),
            Segment::Domain,
        ])
    }
}

impl FromStr for UrlTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        let mut rest = s;
        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| TemplateError::Unterminated(s.to_string()))?;
            let segment = match after[..end].trim() {
                ".Service" => Segment::Service,
                ".Namespace" => Segment::Namespace,
                ".Domain" => Segment::Domain,
                other => return Err(TemplateError::UnknownPlaceholder(other.to_string())),
            };
            segments.push(segment);
            rest = &after[end + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        Ok(Self(segments))
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            match segment {
                Segment::Literal(s) => f.write_str(s)?,
                Segment::Service => f.write_str("{{.Service}}")?,
                Segment::Namespace => f.write_str("{{.Namespace}}")?,
                Segment::Domain => f.write_str("{{.Domain}}")?,
            }
        }
        Ok(())
    }
}
