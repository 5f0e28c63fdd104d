//! Converse citation shapes and their mapping to [`Citation`].

use riverbed_tool_runtime::{Citation, CitationGroup, PositionType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseCitation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub source_content: Vec<SourceContent>,
    #[serde(default)]
    pub location: Location,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceContent {
    #[serde(default)]
    pub text: String,
}

/// Exactly one of the fields is expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_char: Option<Span>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_chunk: Option<Span>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_page: Option<Span>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u64>,
}

impl Location {
    fn span(&self) -> Option<(PositionType, &Span)> {
        if let Some(span) = &self.document_char {
            return Some((PositionType::Character, span));
        }
        if let Some(span) = &self.document_chunk {
            return Some((PositionType::Chunk, span));
        }
        self.document_page
            .as_ref()
            .map(|span| (PositionType::Page, span))
    }
}

/// A `citationsContent` block, as found in responses and replayed in history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationsContent {
    #[serde(default)]
    pub citations: Vec<ConverseCitation>,
    #[serde(default)]
    pub content: Vec<SourceContent>,
}

pub fn citation_from_converse(raw: ConverseCitation) -> Citation {
    let (position_type, span) = match raw.location.span() {
        Some((kind, span)) => (Some(kind), span.clone()),
        None => (None, Span::default()),
    };
    let source_parts: Vec<String> = raw.source_content.into_iter().map(|c| c.text).collect();

    Citation {
        source_type: "document".to_string(),
        source_index: span.document_index,
        source_text: source_parts.join("\n"),
        source_parts,
        source_title: raw.title,
        position_type,
        start_index: span.start,
        end_index: span.end,
    }
}

pub fn citation_to_converse(citation: &Citation) -> ConverseCitation {
    let span = Span {
        document_index: citation.source_index,
        start: citation.start_index,
        end: citation.end_index,
    };
    let mut location = Location::default();
    match citation.position_type {
        Some(PositionType::Character) => location.document_char = Some(span),
        Some(PositionType::Chunk) => location.document_chunk = Some(span),
        Some(PositionType::Page) => location.document_page = Some(span),
        None => {}
    }

    let source_content = citation
        .parts()
        .into_iter()
        .map(|text| SourceContent {
            text: text.to_string(),
        })
        .collect();

    ConverseCitation {
        title: citation.source_title.clone(),
        source_content,
        location,
    }
}

/// Render a group as an assistant `citationsContent` content block.
pub fn group_to_converse(group: &CitationGroup) -> Value {
    let citations: Vec<ConverseCitation> =
        group.citations.iter().map(citation_to_converse).collect();
    let content: Vec<SourceContent> = if group.output_text.is_empty() {
        Vec::new()
    } else {
        vec![SourceContent {
            text: group.output_text.clone(),
        }]
    };
    json!({
        "citationsContent": {
            "citations": citations,
            "content": content,
        }
    })
}

pub fn group_from_converse(block: CitationsContent) -> CitationGroup {
    let output_text: String = block.content.iter().map(|c| c.text.as_str()).collect();
    CitationGroup {
        output_text,
        citations: block
            .citations
            .into_iter()
            .map(citation_from_converse)
            .collect(),
    }
}
