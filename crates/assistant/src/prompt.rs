//! System prompt assembly under a token budget.

use souschef_core::message::Message;

use crate::token::TokenBudgeter;

pub const DEFAULT_TEMPLATE: &str = include_str!("../prompts/system.txt");

const HISTORY_PLACEHOLDER: &str = "{conversation_history}";
const RECIPES_PLACEHOLDER: &str = "{relevant_recipes}";
const PARAGRAPH_BREAK: &str = "\n\n";

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    template: String,
    budgeter: TokenBudgeter,
}

impl PromptAssembler {
    pub fn new(template: impl Into<String>, budgeter: TokenBudgeter) -> Self {
        Self {
            template: template.into(),
            budgeter,
        }
    }

    pub fn with_default_template(budgeter: TokenBudgeter) -> Self {
        Self::new(DEFAULT_TEMPLATE, budgeter)
    }

    pub fn budgeter(&self) -> &TokenBudgeter {
        &self.budgeter
    }

    /// Fill the template with retrieved recipes and as much history as
    /// fits in what `max_tokens` leaves after the template and recipes.
    pub fn build(&self, history: &[Message], retrieved: &[String], max_tokens: usize) -> String {
        let recipes = retrieved.join(PARAGRAPH_BREAK);
        let fixed = self.budgeter.count(&self.template) + self.budgeter.count(&recipes);
        let budget = TokenBudgeter::remaining(max_tokens, fixed);

        let history = self.format_history(history, budget);
        fill(&self.template, &recipes, &history)
    }

    /// Serialize `role: content` paragraphs oldest to newest, keeping the
    /// newest ones that fit in `budget` tokens.
    pub fn format_history(&self, history: &[Message], budget: usize) -> String {
        let paragraphs: Vec<String> = history.iter().map(paragraph).collect();

        let mut start = paragraphs.len();
        let mut used = 0;
        while start > 0 {
            let cost = self.budgeter.count(&paragraphs[start - 1])
                + if start < paragraphs.len() { self.budgeter.count(PARAGRAPH_BREAK) } else { 0 };
            if used + cost > budget {
                break;
            }
            used += cost;
            start -= 1;
        }

        // BPE merges across the joins can shift the total by a token or two.
        let mut kept = &paragraphs[start..];
        let mut joined = kept.join(PARAGRAPH_BREAK);
        while !kept.is_empty() && self.budgeter.count(&joined) > budget {
            kept = &kept[1..];
            joined = kept.join(PARAGRAPH_BREAK);
        }
        joined
    }
}

/// Substitute both placeholders in a single scan of `template`. Inserted
/// text is never scanned again.
fn fill(template: &str, recipes: &str, history: &str) -> String {
    let mut out = String::with_capacity(template.len() + recipes.len() + history.len());
    let mut rest = template;
    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix(RECIPES_PLACEHOLDER) {
            out.push_str(recipes);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(HISTORY_PLACEHOLDER) {
            out.push_str(history);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

fn paragraph(message: &Message) -> String {
    if message.images.is_empty() {
        format!("{}: {}", message.role, message.content)
    } else {
        format!("{}: {} [image attached]", message.role, message.content)
    }
}
