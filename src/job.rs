//! Commands to run on remote hosts.

use std::collections::HashMap;

use handlebars::Handlebars;

use crate::error::{DistError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Shell command (or template).
    command: String,
    /// Whether `command` is a Handlebars template.
    templated: bool,
}

impl Job {
    pub fn new(command: String) -> Self {
        Self {
            command,
            templated: false,
        }
    }

    /// Join command line words with spaces, as a shell would see them.
    pub fn from_words(words: &[String]) -> Self {
        Self::new(words.join(" "))
    }

    /// Render `{{hostname}}` in the command for each target host.
    pub fn templated(mut self, templated: bool) -> Self {
        self.templated = templated;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// The command to send to `host`.
    pub fn fill_template(&self, registry: &mut Handlebars, host: &str) -> Result<String> {
        if !self.templated {
            return Ok(self.command.clone());
        }
        // Output goes to a shell, not HTML.
        registry.register_escape_fn(handlebars::no_escape);
        if !registry.has_template(&self.command) {
            registry
                .register_template_string(&self.command, &self.command)
                .map_err(|e| DistError::TemplateError(e.to_string()))?;
        }
        let mut params = HashMap::new();
        params.insert("hostname", host);
        registry
            .render(&self.command, &params)
            .map_err(|e| DistError::TemplateError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_words() {
        let words = vec!["make".to_string(), "-j8".to_string(), "test".to_string()];
        assert_eq!(Job::from_words(&words).command(), "make -j8 test");
    }

    #[test]
    fn test_plain_command_untouched() {
        let job = Job::new("echo {{hostname}}".to_string());
        let mut registry = Handlebars::new();
        assert_eq!(
            job.fill_template(&mut registry, "homelab").unwrap(),
            "echo {{hostname}}"
        );
    }

    #[test]
    fn test_fill_hostname() {
        let job = Job::new("echo {{hostname}} > /tmp/{{hostname}}.log".to_string()).templated(true);
        let mut registry = Handlebars::new();
        assert_eq!(
            job.fill_template(&mut registry, "homelab").unwrap(),
            "echo homelab > /tmp/homelab.log"
        );
        // Registered once, rendered again for another host.
        assert_eq!(
            job.fill_template(&mut registry, "box").unwrap(),
            "echo box > /tmp/box.log"
        );
    }

    #[test]
    fn test_bad_template() {
        let job = Job::new("echo {{#if}}".to_string()).templated(true);
        let mut registry = Handlebars::new();
        assert!(matches!(
            job.fill_template(&mut registry, "h"),
            Err(DistError::TemplateError(_))
        ));
    }
}
