//! Byte-range text edits

/// Replace `start..end` of a source with `replacement`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextEdit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

impl TextEdit {
    pub fn replace(start: usize, end: usize, replacement: impl Into<String>) -> Self {
        Self {
            start,
            end,
            replacement: replacement.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(at, at, text)
    }
}

/// Apply non-overlapping edits, last offset first so earlier offsets stay valid
pub(crate) fn apply_edits(source: &str, mut edits: Vec<TextEdit>) -> String {
    edits.sort_by(|a, b| b.start.cmp(&a.start).then_with(|| b.end.cmp(&a.end)));

    let mut output = source.to_string();
    for edit in edits {
        if edit.start <= edit.end && edit.end <= output.len() {
            output.replace_range(edit.start..edit.end, &edit.replacement);
        }
    }
    output
}

/// Re-indent a block whose first line starts at `indent`
///
/// The first line is taken as-is; following lines lose up to `indent`
/// leading spaces. Every non-empty line then gets `prefix`.
pub(crate) fn reindent(text: &str, indent: usize, prefix: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| {
            let stripped = if i == 0 {
                line
            } else {
                let leading = line.len() - line.trim_start_matches([' ', '\t']).len();
                &line[leading.min(indent)..]
            };
            if stripped.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", prefix, stripped)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
