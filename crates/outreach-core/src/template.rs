//! Message templating: the fixed sign-off and subject placeholders.

use crate::config::ComposerConfig;
use crate::types::Prospect;

const PLACEHOLDERS: [&str; 4] = ["{first_name}", "{last_name}", "{name}", "{company}"];

/// Builds message bodies and subjects from configured templates.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    config: ComposerConfig,
}

impl Composer {
    pub fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Wrap an opening line in the fixed sign-off.
    ///
    /// Generation and reconciliation both go through here, so a reloaded
    /// draft that only has an opening line reads exactly like a fresh one.
    pub fn compose_body(&self, opening_line: &str) -> String {
        format!(
            "{}\n\n{}\n\n{}\n{}",
            opening_line.trim_end(),
            self.config.pitch,
            self.config.valediction,
            self.config.signature
        )
    }

    /// Render `{first_name}`, `{last_name}`, `{name}` and `{company}`.
    ///
    /// Without a prospect the placeholders are left in place.
    pub fn render_subject(&self, template: &str, prospect: Option<&Prospect>) -> String {
        let Some(prospect) = prospect else {
            return template.to_string();
        };

        template
            .replace(PLACEHOLDERS[0], &prospect.first_name)
            .replace(PLACEHOLDERS[1], &prospect.last_name)
            .replace(PLACEHOLDERS[2], &prospect.display_name())
            .replace(PLACEHOLDERS[3], &prospect.company_name)
    }

    /// Returns true if `template` uses any prospect placeholder.
    pub fn has_placeholders(template: &str) -> bool {
        PLACEHOLDERS.iter().any(|p| template.contains(p))
    }

    /// The configured default subject for a prospect.
    pub fn default_subject(&self, prospect: Option<&Prospect>) -> String {
        self.render_subject(&self.config.subject_template, prospect)
    }
}
