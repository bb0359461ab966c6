//! Scoring prompt construction.

use std::fmt::Write;

use curator_core::types::{Item, TrendContext};

/// Rubric criteria every prompt asks for, with their descriptions.
const BASE_CRITERIA: [(&str, &str); 4] = [
    (
        "technical_impact",
        "degree of technical breakthrough or innovation",
    ),
    ("industry_impact", "breadth and depth of effect on the industry"),
    ("trending", "current attention and media coverage"),
    ("novelty", "new finding or announcement versus rehash of known news"),
];

const TREND_CRITERION: (&str, &str) = (
    "trend_relevance",
    "fit with the current trends described above",
);

fn rubric(trends: Option<&TrendContext>) -> Vec<(&'static str, &'static str)> {
    let mut rubric = BASE_CRITERIA.to_vec();
    if active(trends).is_some() {
        rubric.push(TREND_CRITERION);
    }
    rubric
}

fn active(trends: Option<&TrendContext>) -> Option<&TrendContext> {
    trends.filter(|t| !t.is_empty())
}

/// Prompt asking for one score object per item, keyed by position.
pub fn batch_prompt(items: &[Item], trends: Option<&TrendContext>, snippet_chars: usize) -> String {
    let rubric = rubric(trends);
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "You are an expert analyst of AI and technology news.\n\
         Rate the importance of each of the following {} items.",
        items.len()
    );
    write_trends(&mut prompt, trends);
    write_rubric(&mut prompt, &rubric);

    prompt.push_str("\n## Items\n");
    for (index, item) in items.iter().enumerate() {
        let _ = writeln!(prompt, "[{}] Title: {}", index, display_title(item));
        let _ = writeln!(prompt, "    Summary: {}", display_snippet(item, snippet_chars));
    }

    let _ = writeln!(
        prompt,
        "\n## Answer format\n\
         Reply with JSON only and answer for all {} items, in order:\n\
         {{\"results\": [{{\"index\": 0, {}, \"reason\": \"<short reason>\"}}, ...]}}",
        items.len(),
        answer_fields(&rubric)
    );
    prompt
}

/// Prompt asking for a single score object.
pub fn single_prompt(item: &Item, trends: Option<&TrendContext>, snippet_chars: usize) -> String {
    let rubric = rubric(trends);
    let mut prompt = String::new();

    prompt.push_str(
        "You are an expert analyst of AI and technology news.\n\
         Rate the importance of the following item.\n",
    );
    write_trends(&mut prompt, trends);
    write_rubric(&mut prompt, &rubric);

    let _ = writeln!(prompt, "\n## Item\nTitle: {}", display_title(item));
    let _ = writeln!(prompt, "Summary: {}", display_snippet(item, snippet_chars));

    let _ = writeln!(
        prompt,
        "\n## Answer format\n\
         Reply with JSON only:\n\
         {{{}, \"reason\": \"<short reason>\"}}",
        answer_fields(&rubric)
    );
    prompt
}

fn write_trends(prompt: &mut String, trends: Option<&TrendContext>) {
    let Some(trends) = active(trends) else {
        return;
    };
    prompt.push_str("\n## Current trends\n");
    if !trends.summary.trim().is_empty() {
        let _ = writeln!(prompt, "{}", trends.summary.trim());
    }
    if !trends.topics.is_empty() {
        let _ = writeln!(prompt, "Trending topics: {}", trends.topics.join(", "));
    }
}

fn write_rubric(prompt: &mut String, rubric: &[(&str, &str)]) {
    prompt.push_str("\n## Criteria (each an integer from 1 to 10)\n");
    for (position, (name, description)) in rubric.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}: {}", position + 1, name, description);
    }
}

fn answer_fields(rubric: &[(&str, &str)]) -> String {
    rubric
        .iter()
        .map(|(name, _)| format!("\"{}\": <1-10>", name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_title(item: &Item) -> &str {
    let title = item.title.trim();
    if title.is_empty() {
        "(untitled)"
    } else {
        title
    }
}

fn display_snippet(item: &Item, snippet_chars: usize) -> &str {
    let snippet = item.snippet(snippet_chars);
    if snippet.is_empty() {
        "(no summary)"
    } else {
        snippet
    }
}
