//! Request classifier — image synthesis vs. text/multimodal analysis.
//!
//! Case-insensitive substring match against a fixed list of Portuguese
//! image-intent phrases. An attached image always means analysis: generation
//! and analysis never share a request.

/// Phrases that mark a prompt as an image-generation request.
pub const IMAGE_INTENT_KEYWORDS: &[&str] =
    &["gere", "crie uma imagem", "desenhe", "ilustre", "faça uma imagem", "gera", "cria uma imagem"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    ImageGeneration,
    TextOrMultimodal,
}

/// Decide which kind of call `prompt` needs.
#[must_use]
pub fn classify(prompt: &str, has_image: bool) -> RequestKind {
    if has_image {
        return RequestKind::TextOrMultimodal;
    }
    let lower = prompt.to_lowercase();
    if IMAGE_INTENT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        RequestKind::ImageGeneration
    } else {
        RequestKind::TextOrMultimodal
    }
}

#[cfg(test)]
#[path = "classify_test.rs"]
mod tests;
