//! Prompt text for the chat backend
//!
//! The fixed system prompt, the pinned-context preamble, and the templated
//! reply used when no model credential is configured.

use std::fmt::Write;

/// Base system prompt establishing the assistant's role
pub const BASE_PROMPT: &str = r"You are an AI teammate that helps users think, write, and act faster.
- Be concise, friendly, and professional.
- Use markdown for structure (headings, lists, tables when helpful).
- Prefer actionable outputs (steps, templates, to-do lists).
- When asked, produce short, copy-ready drafts.
- Avoid making assumptions about facts not provided.";

/// Reply used when the model returns no text
pub const EMPTY_COMPLETION_REPLY: &str = "Sorry, I couldn't generate a response.";

/// How much of the user's message the templated reply quotes
const ECHO_LIMIT: usize = 280;

/// System message listing pinned context, or `None` when there is none
pub fn pinned_context_prompt(pinned_context: &[String]) -> Option<String> {
    if pinned_context.is_empty() {
        return None;
    }
    Some(format!(
        "Pinned context to consider:\n- {}",
        pinned_context.join("\n- ")
    ))
}

/// Deterministic reply echoing the request, for running without a model
pub fn stub_reply(message: &str, pinned_context: &[String]) -> String {
    let mut echoed: String = message.chars().take(ECHO_LIMIT).collect();
    if message.chars().count() > ECHO_LIMIT {
        echoed.push('…');
    }

    let pinned = if pinned_context.is_empty() {
        "(none)".to_string()
    } else {
        pinned_context.join(", ")
    };

    let mut reply = String::from("Here’s a helpful response based on your request.\n\n");
    reply.push_str("### Key Points\n");
    let _ = writeln!(reply, "- You said: “{echoed}”");
    let _ = writeln!(reply, "- Pinned context: {pinned}");
    reply.push_str("\n### Suggested Next Steps\n");
    reply.push_str("1. Confirm details or constraints.\n");
    reply.push_str("2. Choose an action below (Copy, Add as Note, Create Task).\n");
    reply.push_str("3. If needed, ask me to refine or rewrite.");
    reply
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinned_context_prompt() {
        assert!(pinned_context_prompt(&[]).is_none());
        let prompt = pinned_context_prompt(&["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(prompt, "Pinned context to consider:\n- a\n- b");
    }

    #[test]
    fn test_stub_reply_echoes_input() {
        let reply = stub_reply("Summarize this", &[]);
        assert!(reply.starts_with("Here’s a helpful response based on your request."));
        assert!(reply.contains("- You said: “Summarize this”\n"));
        assert!(reply.contains("- Pinned context: (none)\n"));
        assert!(reply.ends_with("3. If needed, ask me to refine or rewrite."));
    }

    #[test]
    fn test_stub_reply_lists_pinned_context() {
        let pinned = vec!["Salon name: Glow Studio".to_string(), "Weekends: Open 10-6".to_string()];
        let reply = stub_reply("hi", &pinned);
        assert!(reply.contains("- Pinned context: Salon name: Glow Studio, Weekends: Open 10-6\n"));
    }

    #[test]
    fn test_stub_reply_truncates_long_messages() {
        let long = "é".repeat(300);
        let reply = stub_reply(&long, &[]);
        let expected = format!("“{}…”", "é".repeat(280));
        assert!(reply.contains(&expected));
        assert!(!reply.contains(&"é".repeat(281)));
    }

    #[test]
    fn test_stub_reply_is_deterministic() {
        let pinned = vec!["x".to_string()];
        assert_eq!(stub_reply("same", &pinned), stub_reply("same", &pinned));
    }
}
