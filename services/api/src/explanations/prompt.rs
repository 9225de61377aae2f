//! Prompt templates with named placeholders
//!
//! A template is plain text with `{name}` placeholders drawn from a fixed
//! set. `{{` and `}}` stand for literal braces. Any other brace use is
//! rejected when the template is parsed.

use thiserror::Error;

/// Values a template can refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    VideoTitle,
    Language,
    SubtitleText,
    MetadataContext,
    ReferenceContext,
    ContextSubtitles,
    NonVerbalCues,
}

impl Placeholder {
    pub const ALL: [Placeholder; 7] = [
        Placeholder::VideoTitle,
        Placeholder::Language,
        Placeholder::SubtitleText,
        Placeholder::MetadataContext,
        Placeholder::ReferenceContext,
        Placeholder::ContextSubtitles,
        Placeholder::NonVerbalCues,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Placeholder::VideoTitle => "video_title",
            Placeholder::Language => "language",
            Placeholder::SubtitleText => "subtitle_text",
            Placeholder::MetadataContext => "metadata_context",
            Placeholder::ReferenceContext => "reference_context",
            Placeholder::ContextSubtitles => "context_subtitles",
            Placeholder::NonVerbalCues => "non_verbal_cues",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|placeholder| placeholder.name() == name)
    }
}

/// Template parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unknown placeholder '{name}' at byte {position}")]
    UnknownPlaceholder { name: String, position: usize },

    #[error("Unterminated placeholder at byte {0}")]
    Unterminated(usize),

    #[error("Unmatched '}}' at byte {0}")]
    UnmatchedBrace(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Value(Placeholder),
}

/// Values bound into a template
///
/// Optional sections are empty strings when they have nothing to show.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptVariables {
    pub video_title: String,
    pub language: String,
    pub subtitle_text: String,
    pub metadata_context: String,
    pub reference_context: String,
    pub context_subtitles: String,
    pub non_verbal_cues: String,
}

impl PromptVariables {
    fn value(&self, placeholder: Placeholder) -> &str {
        match placeholder {
            Placeholder::VideoTitle => &self.video_title,
            Placeholder::Language => &self.language,
            Placeholder::SubtitleText => &self.subtitle_text,
            Placeholder::MetadataContext => &self.metadata_context,
            Placeholder::ReferenceContext => &self.reference_context,
            Placeholder::ContextSubtitles => &self.context_subtitles,
            Placeholder::NonVerbalCues => &self.non_verbal_cues,
        }
    }
}

/// A parsed prompt template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((position, c)) = chars.next() {
            match c {
                '{' if chars.next_if(|&(_, next)| next == '{').is_some() => literal.push('{'),
                '}' if chars.next_if(|&(_, next)| next == '}').is_some() => literal.push('}'),
                '{' => {
                    let start = position + 1;
                    let end = source[start..]
                        .find('}')
                        .map(|offset| start + offset)
                        .ok_or(TemplateError::Unterminated(position))?;

                    let name = &source[start..end];
                    let placeholder = Placeholder::from_name(name).ok_or_else(|| {
                        TemplateError::UnknownPlaceholder {
                            name: name.to_string(),
                            position,
                        }
                    })?;

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Value(placeholder));

                    while chars.next_if(|&(index, _)| index <= end).is_some() {}
                }
                '}' => return Err(TemplateError::UnmatchedBrace(position)),
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Placeholders used by the template, in order of appearance
    pub fn placeholders(&self) -> impl Iterator<Item = Placeholder> + '_ {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Value(placeholder) => Some(*placeholder),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, variables: &PromptVariables) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Value(placeholder) => variables.value(*placeholder),
            })
            .collect()
    }
}
