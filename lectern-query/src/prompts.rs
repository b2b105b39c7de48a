//! Prompt templates for classification and grounded answering.

use lectern_core::traits::Vocabulary;
use std::fmt::Write as _;

use crate::metadata::{Constraint, OPERATIONS, ParamKind};

/// Most vocabulary names of each kind listed in the classifier prompt.
pub const MAX_VOCABULARY_IN_PROMPT: usize = 50;

/// System prompt for grounded answering.
pub const ANSWER_SYSTEM_PROMPT: &str = "You are a research assistant for a personal library of saved articles. \
You are given excerpts from the user's own articles.

Rules:
1. Answer only from the provided excerpts. Do not use outside knowledge.
2. If the excerpts do not contain the answer, say clearly that your library does not cover it.
3. When you use information from an article, name the article by its title.
4. If the excerpts only partly answer the question, say what is missing.
5. Be concise and use markdown when it helps readability.";

/// System prompt for intent classification.
pub const CLASSIFIER_SYSTEM_PROMPT: &str = "You route questions about a personal article library. \
A question is METADATA when it asks about the library itself (counts, listings, which categories or tags exist, \
what was saved when) and can be answered by exactly one of the listed operations. \
Every other question, including any question about what articles say, is CONTENT. \
Reply with a single JSON object and nothing else.";

/// User prompt for grounded answering.
pub fn answer_prompt(question: &str, context: &str) -> String {
    format!(
        "Answer the question using only the articles below.\n\n\
         Question: {question}\n\n\
         ---\n\n\
         Articles from the library:\n\n\
         {context}\n\n\
         ---\n\n\
         If these articles do not contain the answer, say so."
    )
}

/// User prompt for classification, listing every operation's schema and the
/// owner's vocabulary.
pub fn classification_prompt(question: &str, vocabulary: &Vocabulary) -> String {
    let mut out = String::from("Operations:\n");
    for spec in OPERATIONS {
        let _ = write!(out, "- {}: {}", spec.operation, spec.description);
        if spec.params.is_empty() {
            out.push_str(". No parameters.\n");
            continue;
        }
        out.push_str(". Parameters:");
        for param in spec.params {
            let _ = write!(
                out,
                " {} ({}{}, {});",
                param.name,
                kind_label(param.kind),
                if param.required { ", required" } else { "" },
                param.description
            );
        }
        if let Constraint::AnyOf(names) = spec.constraint {
            let _ = write!(out, " at least one of {}.", names.join(", "));
        }
        out.push('\n');
    }

    out.push_str("\nLibrary vocabulary:\n");
    let categories: Vec<&str> = vocabulary
        .categories
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    let tags: Vec<&str> = vocabulary.tags.iter().map(String::as_str).collect();
    let colors: Vec<&str> = vocabulary.colors.iter().map(String::as_str).collect();
    let _ = writeln!(out, "- categories: {}", name_list(&categories));
    let _ = writeln!(out, "- tags: {}", name_list(&tags));
    let _ = writeln!(out, "- colors: {}", name_list(&colors));

    let _ = write!(
        out,
        "\nRespond with one of:\n\
         {{\"kind\": \"CONTENT\"}}\n\
         {{\"kind\": \"METADATA\", \"operation\": \"<OPERATION>\", \"params\": {{...}}}}\n\n\
         Question: {question}"
    );
    out
}

fn kind_label(kind: ParamKind) -> String {
    match kind {
        ParamKind::Entity { entity } => format!("{entity} name"),
        ParamKind::SourceType => "source type".to_string(),
        ParamKind::Integer { min, max } => format!("integer {min}-{max}"),
        ParamKind::Bool => "boolean".to_string(),
        ParamKind::Date => "date".to_string(),
    }
}

fn name_list(names: &[&str]) -> String {
    if names.is_empty() {
        return "(none)".to_string();
    }
    let shown = names.len().min(MAX_VOCABULARY_IN_PROMPT);
    let mut list = names[..shown].join(", ");
    if names.len() > shown {
        let _ = write!(list, " (+{} more)", names.len() - shown);
    }
    list
}
