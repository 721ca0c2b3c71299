use super::mode::ReportMode;

pub const DEFAULT_CONTEXT_BUDGET: usize = 2000;

const EMPTY_CONTEXT: &str = "(No live headlines were supplied. Base the briefing on general market structure.)";

/// Prefix cut to at most `budget` characters, on a char boundary.
pub fn clamp_context(context: &str, budget: usize) -> &str {
    match context.char_indices().nth(budget) {
        Some((byte_index, _)) => &context[..byte_index],
        None => context,
    }
}

/// Builds the mode prompt. `context` must already be clamped and is interpolated once.
pub fn build_prompt(mode: ReportMode, context: &str) -> String {
    let template = mode.template();
    let context = if context.trim().is_empty() {
        EMPTY_CONTEXT
    } else {
        context
    };

    let mut prompt = format!(
        "ROLE: {}\nTASK: {}\nLIVE NEWS FEED:\n{}\n\nOUTPUT FORMAT (Markdown):\n",
        template.role, template.task, context
    );

    for section in template.sections {
        prompt.push_str(section.marker);
        prompt.push('\n');
        prompt.push_str(section.guidance);
        prompt.push('\n');
    }

    prompt
}
