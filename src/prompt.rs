//! Prompt compilation: turns a [`UserProfile`] into the single instruction
//! payload sent to the language model.
//!
//! Pure, no I/O. The system directive is fixed and versioned independently of
//! user data so model behaviour stays reproducible across invocations; user
//! data is appended after the directive, never interleaved with it.

use thiserror::Error;

use crate::profile::UserProfile;

/// Bumped whenever [`SYSTEM_DIRECTIVE`] changes in a way that can alter
/// model output for identical profiles.
pub const PROMPT_VERSION: &str = "v1";

/// Fixed instruction block. User data never appears inside this text.
pub const SYSTEM_DIRECTIVE: &str = "\
You are an expert front-end developer who writes polished personal portfolio \
websites. Produce exactly ONE complete, self-contained HTML document and \
nothing else: no markdown fences, no explanatory prose before or after the \
document.

Requirements for the document:
1. Use Tailwind CSS utility classes via the official CDN; all other CSS must be inline in a <style> block.
2. No external script dependencies beyond the Tailwind CDN and Google Fonts.
3. Include a hero section with the bio, a links section, and a contact or footer section.
4. Mobile-responsive and accessible (semantic elements, alt text, sufficient contrast).
5. Replace imagery with inline SVG or CSS art; never embed base64 blobs.

The person to build the site for is described below.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("bio must not be empty")]
    EmptyBio,
    #[error("aesthetic must not be empty")]
    EmptyAesthetic,
}

/// The compiled instruction payload. Created per invocation, never persisted.
#[derive(Debug, Clone)]
pub struct PromptPayload {
    text: String,
    version: &'static str,
}

impl PromptPayload {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> &str {
        self.version
    }
}

/// Compile a profile into a prompt payload.
///
/// The only failure modes are precondition violations on the profile, caught
/// here before any network round trip is spent.
pub fn compile(profile: &UserProfile) -> Result<PromptPayload, CompileError> {
    if profile.bio.trim().is_empty() {
        return Err(CompileError::EmptyBio);
    }
    if profile.aesthetic.trim().is_empty() {
        return Err(CompileError::EmptyAesthetic);
    }

    let links = if profile.links.iter().any(|l| !l.trim().is_empty()) {
        profile
            .links
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| format!("  - {}", l.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        "  (none provided)".to_string()
    };

    let mut text = String::with_capacity(SYSTEM_DIRECTIVE.len() + profile.bio.len() + 512);
    text.push_str(SYSTEM_DIRECTIVE);
    text.push_str("\n\n=== BIO ===\n");
    text.push_str(profile.bio.trim());
    text.push_str("\n\n=== LINKS ===\n");
    text.push_str(&links);
    text.push_str("\n\n=== DESIGN PREFERENCES ===\n");
    text.push_str("Aesthetic : ");
    text.push_str(profile.aesthetic.trim());
    if let Some(theme) = profile.color_theme.as_deref().filter(|t| !t.trim().is_empty()) {
        text.push_str("\nColor Theme : ");
        text.push_str(theme.trim());
    }
    if let Some(layout) = profile.layout.as_deref().filter(|l| !l.trim().is_empty()) {
        text.push_str("\nLayout : ");
        text.push_str(layout.trim());
    }
    text.push('\n');

    Ok(PromptPayload {
        text,
        version: PROMPT_VERSION,
    })
}
