use crate::error::AugmentError;

/// Index of the first line equal to `target` once trailing whitespace is
/// trimmed.
pub fn find_line<S: AsRef<str>>(lines: &[S], target: &str) -> Option<usize> {
    find_line_from(lines, 0, target)
}

pub fn find_line_from<S: AsRef<str>>(lines: &[S], start: usize, target: &str) -> Option<usize> {
    lines
        .iter()
        .enumerate()
        .skip(start)
        .find(|(_, line)| line.as_ref().trim_end() == target)
        .map(|(idx, _)| idx)
}

pub fn require_line<S: AsRef<str>>(
    lines: &[S],
    start: usize,
    target: &str,
) -> Result<usize, AugmentError> {
    find_line_from(lines, start, target)
        .ok_or_else(|| AugmentError::MarkerNotFound(target.to_string()))
}
