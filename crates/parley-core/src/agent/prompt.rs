//! System prompt for the conversation agent.
//!
//! Centralizes the prompt text so deployments customize behavior in one
//! place. `custom_prompt` layers optional context (user name, company,
//! role) on top of the base prompt.

/// Base system prompt for every turn.
const SYSTEM_PROMPT: &str = "\
You are an intelligent, helpful virtual assistant.

**Your goal:**
- Help users clearly, objectively, and in a friendly tone
- Answer questions accurately with relevant context
- Keep a professional but approachable voice

**Guidelines:**
- Be concise but complete
- If you don't know something, say so and suggest alternatives
- Keep the context of the previous conversation
- Always answer in the user's language

**Limitations:**
- Do not give specific medical, legal, or financial advice
- Recommend consulting a qualified professional when appropriate
";

/// The system prompt used for every model call.
pub fn system_prompt() -> &'static str {
    SYSTEM_PROMPT
}

/// Optional context layered on top of the base prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub user_name: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub extra_instructions: Option<String>,
}

/// Build a prompt enriched with deployment- or user-specific context.
pub fn custom_prompt(context: &PromptContext) -> String {
    let mut parts = vec![SYSTEM_PROMPT.to_string()];

    if let Some(name) = &context.user_name {
        parts.push(format!("\n**User:** {name}"));
    }
    if let Some(company) = &context.company {
        parts.push(format!("\n**Company:** {company}"));
    }
    if let Some(role) = &context.role {
        parts.push(format!("\n**Your role:** {role}"));
    }
    if let Some(extra) = &context.extra_instructions {
        parts.push(format!("\n**Additional instructions:**\n{extra}"));
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_is_nonempty() {
        assert!(system_prompt().contains("virtual assistant"));
    }

    #[test]
    fn test_custom_prompt_without_context_is_base() {
        let prompt = custom_prompt(&PromptContext::default());
        assert_eq!(prompt, SYSTEM_PROMPT);
    }

    #[test]
    fn test_custom_prompt_layers_context() {
        let prompt = custom_prompt(&PromptContext {
            user_name: Some("Alice".to_string()),
            company: Some("Acme".to_string()),
            role: Some("Sales assistant".to_string()),
            extra_instructions: None,
        });
        assert!(prompt.contains("**User:** Alice"));
        assert!(prompt.contains("**Company:** Acme"));
        assert!(prompt.contains("**Your role:** Sales assistant"));
    }
}
