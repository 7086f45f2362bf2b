use serde::{Deserialize, Serialize};

/// Fixed texts the relay sends or injects, in the target locale.
///
/// Every field can be overridden from the `[messages]` table; missing keys
/// keep their compiled default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    /// System instruction prepended to every completion request.
    pub system_prompt: String,
    /// Reply to `/start`.
    pub greeting: String,
    /// Reply to `/reset`, after history is cleared.
    pub reset: String,
    /// Reply to `/help`.
    pub help: String,
    /// Reply to any non-text message (images, audio, ...).
    pub text_only: String,
    /// Used when the provider answered with nothing.
    pub empty_answer: String,
    /// Used when the provider call failed.
    pub provider_failure: String,
    /// Body of the diagnostic send.
    pub diagnostic: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            system_prompt: "Responda em portugu\u{ea}s do Brasil, de forma objetiva e \u{fa}til."
                .into(),
            greeting: "Ol\u{e1}! Sou um bot no WhatsApp usando Llama 3.1 (Groq). Mande sua pergunta."
                .into(),
            reset: "Hist\u{f3}rico limpo. Pode continuar!".into(),
            help: "Comandos: /help, /start, /reset".into(),
            text_only: "No momento s\u{f3} entendo mensagens de texto. Envie sua pergunta \u{1f642}"
                .into(),
            empty_answer: "Desculpe, n\u{e3}o consegui responder agora.".into(),
            provider_failure: "Ops! Tive um problema ao falar com o modelo. \
                               Tente novamente em alguns segundos."
                .into(),
            diagnostic: "Teste de envio do bot \u{2705}".into(),
        }
    }
}
