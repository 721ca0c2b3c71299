/// `$` starts inline math in the markdown renderers that display these briefings.
const RESERVED_GLYPH: char = '$';
const GLYPH_REPLACEMENT: &str = "USD ";

#[tracing::instrument(
    name = "pipeline_stage format",
    skip(content),
    fields(
        pipeline.stage = "format",
        report.chars,
        report.substitutions,
    )
)]
pub fn normalize_report(content: &str) -> String {
    let substitutions = content.matches(RESERVED_GLYPH).count();
    let normalized = content
        .replace(RESERVED_GLYPH, GLYPH_REPLACEMENT)
        .trim()
        .to_string();

    let span = tracing::Span::current();
    span.record("report.chars", normalized.chars().count());
    span.record("report.substitutions", substitutions);

    normalized
}
