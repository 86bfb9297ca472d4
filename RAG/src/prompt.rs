//! Prompt templates and retrieved-context formatting.

use crate::error::Result;
use crate::models::{ChatMessage, ScoredChunk};
use std::fmt;
use std::str::FromStr;
use tiktoken_rs::CoreBPE;

const GENERAL_SYSTEM: &str = "You are a helpful assistant. Please provide the answer to the user's questions based on following content: \n {found_docs}";

const SAP_TEST_CASE_SYSTEM: &str = r#"You are a senior SAP QA consultant. Using ONLY the business requirement content below, write SAP test cases for the process the user asks about.

For every test case give:
1. Test case ID and title
2. Preconditions (master data, configuration, authorizations)
3. Test steps, naming the SAP transaction code or Fiori app for each step
4. Test data
5. Expected result

Cover the main flow first, then negative and boundary cases the content supports. If the content does not describe something, say so instead of inventing it.

BUSINESS REQUIREMENT CONTENT:
{found_docs}"#;

/// A system + human message pair with `{found_docs}` and `{query}` slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub system: String,
    pub human: String,
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>, human: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            human: human.into(),
        }
    }

    pub fn format(&self, found_docs: &str, query: &str) -> Vec<ChatMessage> {
        let vars = [("found_docs", found_docs), ("query", query)];
        vec![
            ChatMessage::system(fill(&self.system, &vars)),
            ChatMessage::user(fill(&self.human, &vars)),
        ]
    }
}

/// Substitutes `{name}` slots in one pass, so values are never re-expanded.
fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptProfile {
    #[default]
    General,
    SapTestCases,
}

impl PromptProfile {
    pub fn template(&self) -> PromptTemplate {
        match self {
            PromptProfile::General => PromptTemplate::new(GENERAL_SYSTEM, "{query}"),
            PromptProfile::SapTestCases => PromptTemplate::new(SAP_TEST_CASE_SYSTEM, "{query}"),
        }
    }
}

impl FromStr for PromptProfile {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "general" => Ok(Self::General),
            "sap-test-cases" | "sap" | "testcases" => Ok(Self::SapTestCases),
            other => Err(format!("unknown prompt profile '{other}'")),
        }
    }
}

impl fmt::Display for PromptProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptProfile::General => write!(f, "general"),
            PromptProfile::SapTestCases => write!(f, "sap-test-cases"),
        }
    }
}

/// The `{found_docs}` block and how many leading hits made it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContext {
    pub text: String,
    pub passages: usize,
}

/// Renders search hits into the `{found_docs}` block under a token budget.
pub struct ContextFormatter {
    bpe: CoreBPE,
    max_tokens: usize,
}

impl ContextFormatter {
    pub fn new(max_tokens: usize) -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()?;
        Ok(Self {
            bpe,
            max_tokens: max_tokens.max(1),
        })
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    pub fn format(&self, hits: &[ScoredChunk]) -> RenderedContext {
        let mut blocks: Vec<String> = Vec::new();
        let mut used = 0;

        for hit in hits {
            let block = render_hit(hit);
            let separator = if blocks.is_empty() { 0 } else { 1 };
            let cost = self.count_tokens(&block) + separator;

            if used + cost > self.max_tokens {
                if blocks.is_empty() {
                    blocks.push(self.truncate(&block, self.max_tokens));
                }
                log::warn!(
                    "Context budget of {} tokens reached; dropped {} of {} passages",
                    self.max_tokens,
                    hits.len() - blocks.len(),
                    hits.len()
                );
                break;
            }

            used += cost;
            blocks.push(block);
        }

        RenderedContext {
            passages: blocks.len(),
            text: blocks.join("\n\n"),
        }
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        let tokens = self.bpe.encode_with_special_tokens(text);
        let mut end = tokens.len().min(max_tokens);
        // A cut can split a multi-byte character; back off until it decodes.
        while end > 0 {
            if let Ok(decoded) = self.bpe.decode(tokens[..end].to_vec()) {
                return decoded;
            }
            end -= 1;
        }
        String::new()
    }
}

fn render_hit(hit: &ScoredChunk) -> String {
    match hit.chunk.page {
        Some(page) => format!(
            "Document: {}, page {}\nContent: {}",
            hit.chunk.source, page, hit.chunk.content
        ),
        None => format!("Document: {}\nContent: {}", hit.chunk.source, hit.chunk.content),
    }
}
