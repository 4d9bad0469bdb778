use crate::prompt::Prompt;

/// User-facing message display.
///
/// Resolves [`Prompt`] values to localized text. Infallible from the
/// flow's point of view.
#[async_trait::async_trait]
pub trait PromptSinkPort: Send + Sync {
    /// Replace the message area content.
    async fn set_message(&self, prompt: &Prompt);

    /// Show a notice outside the message area. `blocking` asks for a
    /// modal presentation that the user must acknowledge.
    async fn show_notice(&self, prompt: &Prompt, blocking: bool);
}
