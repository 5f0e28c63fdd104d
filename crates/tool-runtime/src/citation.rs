use serde::{Deserialize, Serialize};

/// How a citation's start/end indices address its source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionType {
    Character,
    Chunk,
    Page,
}

/// One span of a source document backing part of the model's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Currently always `"document"`.
    pub source_type: String,
    /// Index of the cited document in the request.
    pub source_index: Option<u64>,
    /// The cited passages joined with newlines.
    pub source_text: String,
    /// The cited passages as the provider sent them. Empty when the citation
    /// was built from text alone.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_parts: Vec<String>,
    pub source_title: Option<String>,
    pub position_type: Option<PositionType>,
    pub start_index: Option<u64>,
    pub end_index: Option<u64>,
}

impl Citation {
    /// Passages to send back to the provider.
    pub fn parts(&self) -> Vec<&str> {
        if !self.source_parts.is_empty() {
            self.source_parts.iter().map(String::as_str).collect()
        } else if self.source_text.is_empty() {
            Vec::new()
        } else {
            vec![self.source_text.as_str()]
        }
    }
}

/// Citations attached to one stretch of output text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationGroup {
    pub output_text: String,
    pub citations: Vec<Citation>,
}

impl CitationGroup {
    pub fn new(output_text: impl Into<String>) -> Self {
        Self {
            output_text: output_text.into(),
            citations: Vec::new(),
        }
    }
}

/// Append `citation` for the text accumulated so far.
///
/// Groups partition `accumulated_text` from the start: each one owns the
/// text that arrived after the previous group. Citations that arrive with no
/// new text in between share a group, and a group opened before any text
/// takes the next segment that arrives.
pub fn push_citation(groups: &mut Vec<CitationGroup>, accumulated_text: &str, citation: Citation) {
    let covered: usize = groups.iter().map(|g| g.output_text.len()).sum();
    let segment = accumulated_text.get(covered..).unwrap_or_default();

    match groups.last_mut() {
        Some(group) if segment.is_empty() => group.citations.push(citation),
        Some(group) if group.output_text.is_empty() => {
            group.output_text = segment.to_string();
            group.citations.push(citation);
        }
        _ => {
            let mut group = CitationGroup::new(segment);
            group.citations.push(citation);
            groups.push(group);
        }
    }
}

/// A stretch of assistant text, with or without citations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextSegment<'a> {
    Plain(&'a str),
    Cited(&'a CitationGroup),
}

/// Lay `groups` over `text` in order, yielding the uncited text between and
/// after them as plain segments.
pub fn segments<'a>(text: &'a str, groups: &'a [CitationGroup]) -> Vec<TextSegment<'a>> {
    let mut out = Vec::new();
    let mut cursor = 0;
    for group in groups {
        if let Some(offset) = text[cursor..].find(group.output_text.as_str()) {
            if offset > 0 {
                out.push(TextSegment::Plain(&text[cursor..cursor + offset]));
            }
            cursor += offset + group.output_text.len();
        }
        out.push(TextSegment::Cited(group));
    }
    if cursor < text.len() {
        out.push(TextSegment::Plain(&text[cursor..]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cite(index: u64) -> Citation {
        Citation {
            source_type: "document".to_string(),
            source_index: Some(index),
            source_text: "source".to_string(),
            source_parts: Vec::new(),
            source_title: None,
            position_type: Some(PositionType::Page),
            start_index: Some(1),
            end_index: Some(2),
        }
    }

    #[test]
    fn citations_without_new_text_share_a_group() {
        let mut groups = Vec::new();
        push_citation(&mut groups, "The sky is blue.", cite(0));
        push_citation(&mut groups, "The sky is blue.", cite(1));
        push_citation(&mut groups, "The sky is blue. Grass is green.", cite(2));

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].citations.len(), 2);
        assert_eq!(groups[1].output_text, " Grass is green.");
        assert_eq!(groups[1].citations[0].source_index, Some(2));
    }

    #[test]
    fn citation_before_any_text_joins_the_next_segment() {
        let mut groups = Vec::new();
        push_citation(&mut groups, "", cite(0));
        push_citation(&mut groups, "Water is wet.", cite(1));

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].output_text, "Water is wet.");
        assert_eq!(groups[0].citations.len(), 2);
    }

    #[test]
    fn segments_cover_text_once_in_order() {
        let mut groups = Vec::new();
        push_citation(&mut groups, "A.", cite(0));
        push_citation(&mut groups, "A. B.", cite(1));
        let text = "A. B. C.";

        assert_eq!(
            segments(text, &groups),
            vec![
                TextSegment::Cited(&groups[0]),
                TextSegment::Cited(&groups[1]),
                TextSegment::Plain(" C."),
            ]
        );
    }

    #[test]
    fn plain_text_between_groups_is_kept() {
        let groups = vec![CitationGroup::new("cited")];
        assert_eq!(
            segments("intro cited outro", &groups),
            vec![
                TextSegment::Plain("intro "),
                TextSegment::Cited(&groups[0]),
                TextSegment::Plain(" outro"),
            ]
        );
    }

    #[test]
    fn parts_fall_back_to_source_text() {
        let mut citation = cite(0);
        assert_eq!(citation.parts(), vec!["source"]);

        citation.source_parts = vec!["a\nb".to_string(), String::new()];
        assert_eq!(citation.parts(), vec!["a\nb", ""]);

        citation.source_parts.clear();
        citation.source_text.clear();
        assert!(citation.parts().is_empty());
    }
}
