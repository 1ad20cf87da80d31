//! Minimal `{{ name }}` template rendering for embedded SQL

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// `{{` without a matching `}}`
    Unterminated { template: &'static str, offset: usize },
    /// `{{ }}` with no variable name
    EmptyPlaceholder { template: &'static str, offset: usize },
    UnknownVariable { template: &'static str, name: String },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::Unterminated { template, offset } => {
                write!(f, "{}: unterminated placeholder at byte {}", template, offset)
            }
            TemplateError::EmptyPlaceholder { template, offset } => {
                write!(f, "{}: empty placeholder at byte {}", template, offset)
            }
            TemplateError::UnknownVariable { template, name } => {
                write!(f, "{}: unknown variable '{}'", template, name)
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// A named template source, usually embedded with `include_str!`
#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub name: &'static str,
    pub source: &'static str,
}

impl Template {
    pub const fn new(name: &'static str, source: &'static str) -> Self {
        Self { name, source }
    }

    /// Substitute every `{{ var }}` with its value from `vars`
    pub fn render(&self, vars: &[(&str, String)]) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        let mut rest = self.source;
        let mut consumed = 0;

        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);

            let after_open = &rest[open + 2..];
            let close = after_open.find("}}").ok_or(TemplateError::Unterminated {
                template: self.name,
                offset: consumed + open,
            })?;

            let name = after_open[..close].trim();
            if name.is_empty() {
                return Err(TemplateError::EmptyPlaceholder {
                    template: self.name,
                    offset: consumed + open,
                });
            }

            let value = vars
                .iter()
                .find(|(var, _)| *var == name)
                .map(|(_, value)| value)
                .ok_or_else(|| TemplateError::UnknownVariable {
                    template: self.name,
                    name: name.to_string(),
                })?;
            out.push_str(value);

            let advance = open + 2 + close + 2;
            consumed += advance;
            rest = &rest[advance..];
        }

        out.push_str(rest);
        Ok(out)
    }
}
