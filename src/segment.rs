//! Split a document into runs of lines that share one language classification.
//!
//! Joining the `text` of every segment with `'\n'` gives back the original
//! document byte-for-byte.

use crate::classifier::is_target_language;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Already in the target language.
    TargetLanguage,
    /// Candidate for translation.
    NeedsTranslation,
    /// Blank-only runs and fenced code blocks. Never translated.
    Structural,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub text: String,
}

impl Segment {
    fn from_run(lines: &[&str], target_language: bool) -> Self {
        let kind = if lines.iter().all(|l| l.trim().is_empty()) {
            SegmentKind::Structural
        } else if target_language {
            SegmentKind::TargetLanguage
        } else {
            SegmentKind::NeedsTranslation
        };
        Self {
            kind,
            text: lines.join("\n"),
        }
    }

    fn fenced(lines: &[&str]) -> Self {
        Self {
            kind: SegmentKind::Structural,
            text: lines.join("\n"),
        }
    }
}

/// Close a run. Blank lines trailing a passage that needs translation are
/// split off as their own structural segment so the paragraph break survives.
fn close_run(segments: &mut Vec<Segment>, run: &[&str], target_language: bool) {
    let passage_len = run
        .iter()
        .rposition(|l| !l.is_empty())
        .map_or(0, |i| i + 1);

    if target_language || passage_len == 0 || passage_len == run.len() {
        segments.push(Segment::from_run(run, target_language));
        return;
    }
    segments.push(Segment::from_run(&run[..passage_len], target_language));
    segments.push(Segment::from_run(&run[passage_len..], target_language));
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Split `document` into ordered segments.
pub fn segment(document: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut run: Vec<&str> = Vec::new();
    let mut class: Option<bool> = None;
    let mut fence: Option<Vec<&str>> = None;

    for line in document.split('\n') {
        if let Some(block) = fence.as_mut() {
            block.push(line);
            if is_fence(line) {
                segments.push(Segment::fenced(block));
                fence = None;
            }
            continue;
        }

        if is_fence(line) {
            if !run.is_empty() {
                close_run(&mut segments, &run, class.unwrap_or(true));
                run.clear();
            }
            class = None;
            fence = Some(vec![line]);
            continue;
        }

        // Blank lines stay inside the run they interrupt.
        if line.is_empty() {
            class.get_or_insert(true);
            run.push(line);
            continue;
        }

        let line_class = is_target_language(line);
        match class {
            Some(current) if current != line_class => {
                close_run(&mut segments, &run, current);
                run.clear();
                class = Some(line_class);
            }
            Some(_) => {}
            None => class = Some(line_class),
        }
        run.push(line);
    }

    if let Some(block) = fence {
        segments.push(Segment::fenced(&block));
    }
    if !run.is_empty() || segments.is_empty() {
        close_run(&mut segments, &run, class.unwrap_or(true));
    }

    segments
}
