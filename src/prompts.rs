//! System prompts for the correction and vision oracles.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the default behaviour (e.g.
//!    relaxing a correction rule or changing the description tone) requires
//!    editing exactly one place.
//!
//! 2. **Testability** — unit tests can import and inspect prompts directly
//!    without spinning up a real LLM, making prompt regressions easy to catch.
//!
//! Callers can override the correction prompt via
//! [`crate::config::CorrectionConfig::system_prompt`]; the constants here are
//! used only when no override is provided. The prompts are Portuguese because
//! that is the language the corrector serves.

/// Default system prompt for paragraph text correction.
///
/// Used when `CorrectionConfig::system_prompt` is `None`.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"Você é um corretor ortográfico profissional em português.
Sua tarefa é:
1. Corrigir todos os erros ortográficos e gramaticais
2. Eliminar redundâncias e repetições desnecessárias
3. Manter o significado e o estilo original do texto
4. Retornar APENAS o texto corrigido, sem explicações ou comentários adicionais

IMPORTANTE: Retorne somente o texto corrigido, preservando a formatação quando possível."#;

/// System prompt for describing an embedded document image.
pub const IMAGE_SYSTEM_PROMPT: &str = r#"Você é um assistente que descreve imagens encontradas em documentos, em português.
Sua tarefa é:
1. Descrever o conteúdo da imagem de forma clara e objetiva, em uma ou duas frases
2. Usar o contexto do documento fornecido para tornar a descrição mais precisa
3. Retornar APENAS a descrição, sem explicações ou comentários adicionais"#;

/// Description inserted when the vision oracle fails for an image.
pub const IMAGE_PLACEHOLDER: &str = "[Descrição da imagem indisponível]";

/// Build the user message for a correction request.
pub fn correction_request(text: &str) -> String {
    format!("Corrija este texto:\n\n{text}")
}

/// Build the user message for an image description request.
///
/// `context` is the truncated prev/own/next paragraph window assembled by the
/// annotator; it may be empty for an image with no surrounding text.
pub fn description_request(context: &str) -> String {
    if context.is_empty() {
        "Descreva esta imagem.".to_string()
    } else {
        format!("Contexto do documento:\n\n\"\"\"{context}\"\"\"\n\nDescreva esta imagem.")
    }
}
