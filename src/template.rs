//! Chat prompt templating
//!
//! Renders a conversation into the single prompt string a model family
//! expects. Rendering is pure: the same inputs always produce the same
//! bytes. Catalog entries carry their family explicitly; `detect` keeps
//! the ordered substring dispatch for models added outside the catalog.

use serde::{Deserialize, Serialize};

use crate::chat::{Message, Role};

/// Prompt formatting rules for a class of models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateFamily {
    /// Llama 3 style: `<|start_header_id|>role<|end_header_id|>` blocks
    /// after a `<|begin_of_text|>` marker.
    HeaderTag,
    /// Mistral style: `[INST] ... [/INST]` around user turns, assistant
    /// turns closed with `</s>`. No system wrapper.
    Instruct,
    /// Phi style: `<|role|>` blocks terminated by `<|end|>`.
    RoleTag,
    /// Gemma style: `<start_of_turn>user` / `<start_of_turn>model` turns
    /// after a `<bos>` marker. No system wrapper.
    TurnMarker,
    /// Fallback `User:` / `Assistant:` lines.
    Plain,
}

impl TemplateFamily {
    /// Resolve a family from a model identifier. Ordered dispatch, first
    /// match wins; unrecognized identifiers fall back to `Plain`.
    pub fn detect(model_id: &str) -> Self {
        let id = model_id.to_lowercase();
        if id.contains("llama") {
            TemplateFamily::HeaderTag
        } else if id.contains("mistral") {
            TemplateFamily::Instruct
        } else if id.contains("phi") {
            TemplateFamily::RoleTag
        } else if id.contains("gemma") {
            TemplateFamily::TurnMarker
        } else {
            TemplateFamily::Plain
        }
    }

    /// Render system prompt, reduced history and the new user message
    /// into a prompt ending with this family's assistant-turn opener.
    ///
    /// History turns still marked streaming are dropped, then the most
    /// recent `history_window` turns are kept.
    pub fn render(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
        history_window: usize,
    ) -> String {
        let mut turns: Vec<(Role, &str)> = Vec::with_capacity(history.len() + 2);
        if !system_prompt.is_empty() {
            turns.push((Role::System, system_prompt));
        }

        let recent: Vec<&Message> = history
            .iter()
            .filter(|m| !m.streaming && m.role != Role::System)
            .collect();
        let skip = recent.len().saturating_sub(history_window);
        for message in &recent[skip..] {
            turns.push((message.role, message.content.as_str()));
        }
        turns.push((Role::User, user_message));

        match self {
            TemplateFamily::HeaderTag => render_header_tag(&turns),
            TemplateFamily::Instruct => render_instruct(&turns),
            TemplateFamily::RoleTag => render_role_tag(&turns),
            TemplateFamily::TurnMarker => render_turn_marker(&turns),
            TemplateFamily::Plain => render_plain(&turns),
        }
    }
}

fn render_header_tag(turns: &[(Role, &str)]) -> String {
    let mut prompt = String::from("<|begin_of_text|>");
    for (role, content) in turns {
        let tag = match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        prompt.push_str("<|start_header_id|>");
        prompt.push_str(tag);
        prompt.push_str("<|end_header_id|>\n\n");
        prompt.push_str(content);
        prompt.push_str("<|eot_id|>");
    }
    prompt.push_str("<|start_header_id|>assistant<|end_header_id|>\n\n");
    prompt
}

fn render_instruct(turns: &[(Role, &str)]) -> String {
    let mut prompt = String::new();
    for (role, content) in turns {
        match role {
            Role::User => {
                prompt.push_str("[INST] ");
                prompt.push_str(content);
                prompt.push_str(" [/INST]");
            }
            Role::Assistant => {
                prompt.push_str(content);
                prompt.push_str("</s>");
            }
            Role::System => {}
        }
    }
    prompt
}

fn render_role_tag(turns: &[(Role, &str)]) -> String {
    let mut prompt = String::new();
    for (role, content) in turns {
        let tag = match role {
            Role::System => "<|system|>",
            Role::User => "<|user|>",
            Role::Assistant => "<|assistant|>",
        };
        prompt.push_str(tag);
        prompt.push('\n');
        prompt.push_str(content);
        prompt.push_str("<|end|>\n");
    }
    prompt.push_str("<|assistant|>\n");
    prompt
}

fn render_turn_marker(turns: &[(Role, &str)]) -> String {
    let mut prompt = String::from("<bos>");
    for (role, content) in turns {
        let tag = match role {
            Role::User => "user",
            Role::Assistant => "model",
            Role::System => continue,
        };
        prompt.push_str("<start_of_turn>");
        prompt.push_str(tag);
        prompt.push('\n');
        prompt.push_str(content);
        prompt.push_str("<end_of_turn>\n");
    }
    prompt.push_str("<start_of_turn>model\n");
    prompt
}

fn render_plain(turns: &[(Role, &str)]) -> String {
    let mut prompt = String::new();
    for (role, content) in turns {
        match role {
            Role::User => {
                prompt.push_str("User: ");
                prompt.push_str(content);
                prompt.push('\n');
            }
            Role::Assistant => {
                prompt.push_str("Assistant: ");
                prompt.push_str(content);
                prompt.push('\n');
            }
            Role::System => {}
        }
    }
    prompt.push_str("Assistant: ");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Message;

    fn history() -> Vec<Message> {
        vec![Message::user("Hi"), Message::assistant("Hello!")]
    }

    #[test]
    fn detect_is_ordered_and_falls_back() {
        assert_eq!(
            TemplateFamily::detect("Meta-Llama-3.1-8B-Instruct-Q4_K_M"),
            TemplateFamily::HeaderTag
        );
        assert_eq!(
            TemplateFamily::detect("Mistral-7B-Instruct-v0.3-Q4_K_M"),
            TemplateFamily::Instruct
        );
        assert_eq!(
            TemplateFamily::detect("phi-3-mini-4k-instruct-Q4_K_M"),
            TemplateFamily::RoleTag
        );
        assert_eq!(
            TemplateFamily::detect("gemma-2-2b-it-Q4_K_M"),
            TemplateFamily::TurnMarker
        );
        assert_eq!(TemplateFamily::detect("some-unknown-model"), TemplateFamily::Plain);
    }

    #[test]
    fn render_is_deterministic() {
        let history = history();
        let a = TemplateFamily::HeaderTag.render("sys", &history, "How are you?", 10);
        let b = TemplateFamily::HeaderTag.render("sys", &history, "How are you?", 10);
        assert_eq!(a, b);
    }

    #[test]
    fn header_tag_wraps_all_roles_and_opens_assistant() {
        let prompt = TemplateFamily::HeaderTag.render("sys", &history(), "Next", 10);
        assert!(prompt.starts_with("<|begin_of_text|>"));
        assert!(prompt.contains("<|start_header_id|>system<|end_header_id|>\n\nsys<|eot_id|>"));
        assert!(prompt.contains("<|start_header_id|>user<|end_header_id|>\n\nHi<|eot_id|>"));
        assert!(prompt.ends_with("<|start_header_id|>assistant<|end_header_id|>\n\n"));
    }

    #[test]
    fn instruct_skips_system_and_wraps_user_turns() {
        let prompt = TemplateFamily::Instruct.render("sys", &history(), "Next", 10);
        assert!(!prompt.contains("sys"));
        assert!(prompt.starts_with("[INST] Hi [/INST]"));
        assert!(prompt.contains("Hello!</s>"));
        assert!(prompt.ends_with("[INST] Next [/INST]"));
    }

    #[test]
    fn role_tag_ends_with_bare_assistant_opener() {
        let history = vec![Message::user("Hi")];
        let prompt = TemplateFamily::RoleTag.render("sys", &history, "How are you?", 10);
        assert!(prompt.contains("<|user|>\nHow are you?<|end|>\n"));
        assert!(prompt.ends_with("<|assistant|>\n"));
    }

    #[test]
    fn turn_marker_uses_model_tag_for_assistant() {
        let prompt = TemplateFamily::TurnMarker.render("sys", &history(), "Next", 10);
        assert!(prompt.starts_with("<bos>"));
        assert!(prompt.contains("<start_of_turn>user\nHi<end_of_turn>\n"));
        assert!(prompt.contains("<start_of_turn>model\nHello!<end_of_turn>\n"));
        assert!(prompt.ends_with("<start_of_turn>model\n"));
    }

    #[test]
    fn plain_fallback_ends_with_assistant_line() {
        let prompt = TemplateFamily::Plain.render("sys", &history(), "Next", 10);
        assert!(prompt.contains("User: Hi\n"));
        assert!(prompt.contains("Assistant: Hello!\n"));
        assert!(prompt.ends_with("Assistant: "));
    }

    #[test]
    fn streaming_turns_are_dropped_from_history() {
        let mut history = history();
        let mut partial = Message::assistant("half-finish");
        partial.streaming = true;
        history.push(partial);

        let prompt = TemplateFamily::Plain.render("", &history, "Next", 10);
        assert!(!prompt.contains("half-finish"));
    }

    #[test]
    fn history_reduced_to_most_recent_window() {
        let history: Vec<Message> =
            (0..20).map(|i| Message::user(format!("turn-{}", i))).collect();
        let prompt = TemplateFamily::Plain.render("", &history, "Next", 10);

        assert!(!prompt.contains("turn-9\n"));
        assert!(prompt.contains("turn-10\n"));
        assert!(prompt.contains("turn-19\n"));
    }
}
