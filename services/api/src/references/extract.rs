//! Source extraction from grounded search answers
//!
//! Structured grounding metadata is preferred. Without it the answer text is
//! scanned by a chain of pattern extractors, most specific first, stopping
//! at the first one that finds anything.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::clients::{GenerationResponse, GroundingMetadata};
use crate::models::Extraction;

/// A cited web page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSource {
    pub title: String,
    pub uri: String,
    pub snippet: String,
}

/// Sources found in one answer
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedSources {
    pub extraction: Extraction,
    pub sources: Vec<WebSource>,
    /// Queries the model reported issuing
    pub search_queries: Vec<String>,
}

type TextExtractor = fn(&str) -> Vec<WebSource>;

const TEXT_EXTRACTORS: [(Extraction, TextExtractor); 3] = [
    (Extraction::NumberedList, numbered_list_sources),
    (Extraction::UrlLabel, url_label_sources),
    (Extraction::BareUrl, bare_url_sources),
];

/// Extract the cited sources of an answer
///
/// Returns `None` when no extractor finds a source.
pub fn extract_sources(response: &GenerationResponse) -> Option<ExtractedSources> {
    let grounding = response.grounding.as_ref();
    let search_queries = grounding
        .map(|grounding| grounding.web_search_queries.clone())
        .unwrap_or_default();

    let grounded = grounding_sources(grounding);
    if !grounded.is_empty() {
        return Some(ExtractedSources {
            extraction: Extraction::GroundingMetadata,
            sources: grounded,
            search_queries,
        });
    }

    TEXT_EXTRACTORS.iter().find_map(|(extraction, extractor)| {
        let sources = extractor(&response.text);
        (!sources.is_empty()).then(|| ExtractedSources {
            extraction: *extraction,
            sources,
            search_queries: search_queries.clone(),
        })
    })
}

/// Sources listed in the grounding chunks
///
/// The snippet of a source is the first answer segment citing it.
pub fn grounding_sources(grounding: Option<&GroundingMetadata>) -> Vec<WebSource> {
    let Some(grounding) = grounding else {
        return Vec::new();
    };

    grounding
        .grounding_chunks
        .iter()
        .enumerate()
        .filter_map(|(index, chunk)| {
            let web = chunk.web.as_ref()?;
            let uri = web.uri.as_deref().filter(|uri| !uri.is_empty())?;

            let snippet = grounding
                .grounding_supports
                .iter()
                .filter(|support| support.grounding_chunk_indices.contains(&index))
                .find_map(|support| support.segment.as_ref()?.text.as_deref())
                .unwrap_or_default();

            Some(WebSource {
                title: web.title.clone().unwrap_or_default(),
                uri: uri.to_string(),
                snippet: snippet.to_string(),
            })
        })
        .collect()
}

/// `1. Title` lines followed by a `URL: <link>` line
pub fn numbered_list_sources(text: &str) -> Vec<WebSource> {
    static NUMBERED_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = NUMBERED_REGEX.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*\d+[.)][ \t]*(?P<title>[^\n]+?)[ \t]*\r?\n[ \t]*(?:[-*][ \t]*)?URL:[ \t]*(?P<url>https?://\S+)",
        )
        .expect("Failed to compile numbered list regex")
    });

    regex
        .captures_iter(text)
        .map(|captures| WebSource {
            title: captures["title"].trim_matches(|c| c == '*' || c == ' ').to_string(),
            uri: clean_url(&captures["url"]).to_string(),
            snippet: String::new(),
        })
        .collect()
}

/// Every `URL: <link>` occurrence
pub fn url_label_sources(text: &str) -> Vec<WebSource> {
    static URL_LABEL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = URL_LABEL_REGEX.get_or_init(|| {
        Regex::new(r"URL:\s*(https?://\S+)").expect("Failed to compile URL label regex")
    });

    untitled(regex.captures_iter(text).map(|captures| {
        let url = captures.get(1).map_or("", |m| m.as_str());
        clean_url(url).to_string()
    }))
}

/// Every bare `http(s)://` token
pub fn bare_url_sources(text: &str) -> Vec<WebSource> {
    static BARE_URL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = BARE_URL_REGEX.get_or_init(|| {
        Regex::new(r#"https?://[^\s<>"'()\[\]]+"#).expect("Failed to compile URL regex")
    });

    untitled(regex.find_iter(text).map(|m| clean_url(m.as_str()).to_string()))
}

/// Sources named after their host, without duplicates
fn untitled(urls: impl Iterator<Item = String>) -> Vec<WebSource> {
    let mut seen = HashSet::new();
    urls.filter(|url| seen.insert(url.clone()))
        .map(|uri| WebSource {
            title: host(&uri).to_string(),
            uri,
            snippet: String::new(),
        })
        .collect()
}

fn clean_url(url: &str) -> &str {
    url.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']', '*'])
}

fn host(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split(['/', '?', '#']).next().unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::gemini::{GroundingChunk, GroundingSupport, Segment, WebChunk};

    const NUMBERED: &str = "
1. '나이브스 아웃' 3편 제목은 '웨이크 업 데드 맨'…내년 공개
URL: https://www.yna.co.kr/view/AKR20240525031400075

2. 나이브스 아웃: 글래스 어니언 - 나무위키
URL: https://namu.wiki/w/%EB%82%98%EC%9D%B4%EB%B8%8C%EC%8A%A4%20%EC%95%84%EC%9B%83

3. Knives Out 3: Everything We Know About Wake Up Dead Man
URL: https://screenrant.com/knives-out-3-wake-up-dead-man-news-updates/
";

    fn text_response(text: &str) -> GenerationResponse {
        GenerationResponse {
            text: text.to_string(),
            grounding: None,
        }
    }

    fn chunk(uri: &str, title: &str) -> GroundingChunk {
        GroundingChunk {
            web: Some(WebChunk {
                uri: Some(uri.to_string()),
                title: Some(title.to_string()),
            }),
        }
    }

    #[test]
    fn test_numbered_list() {
        let sources = numbered_list_sources(NUMBERED);

        assert_eq!(sources.len(), 3);
        assert_eq!(
            sources[0].title,
            "'나이브스 아웃' 3편 제목은 '웨이크 업 데드 맨'…내년 공개"
        );
        assert_eq!(
            sources[0].uri,
            "https://www.yna.co.kr/view/AKR20240525031400075"
        );
        assert_eq!(
            sources[2].title,
            "Knives Out 3: Everything We Know About Wake Up Dead Man"
        );
    }

    #[test]
    fn test_numbered_list_with_markdown() {
        let text = "1. **Show A - Wikipedia**\n   - URL: https://en.wikipedia.org/wiki/Show_A.";
        let sources = numbered_list_sources(text);

        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].title, "Show A - Wikipedia");
        assert_eq!(sources[0].uri, "https://en.wikipedia.org/wiki/Show_A");
    }

    #[test]
    fn test_url_labels() {
        let text = "Here are some relevant sources:\nURL: https://example.com/article1\nURL: https://example.com/article2\n";
        let sources = url_label_sources(text);

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].uri, "https://example.com/article1");
        assert_eq!(sources[0].title, "example.com");
        assert!(numbered_list_sources(text).is_empty());
    }

    #[test]
    fn test_bare_urls() {
        let text = "According to https://wikipedia.org/wiki/Knives_Out, the movie was released in 2019.\n\
                    You can read more at https://imdb.com/title/tt8946378 for additional information.\n\
                    Again: (https://imdb.com/title/tt8946378).";
        let sources = bare_url_sources(text);

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].uri, "https://wikipedia.org/wiki/Knives_Out");
        assert_eq!(sources[1].uri, "https://imdb.com/title/tt8946378");
        assert_eq!(sources[1].title, "imdb.com");
    }

    #[test]
    fn test_plain_text_has_no_sources() {
        let response = text_response("This is just plain text without any URLs.");
        assert_eq!(extract_sources(&response), None);
    }

    #[test]
    fn test_grounding_metadata_wins() {
        let response = GenerationResponse {
            text: NUMBERED.to_string(),
            grounding: Some(GroundingMetadata {
                web_search_queries: vec!["knives out 3".to_string()],
                grounding_chunks: vec![chunk("https://a.example", "a.example"), chunk("", "empty")],
                grounding_supports: vec![GroundingSupport {
                    segment: Some(Segment {
                        text: Some("Wake Up Dead Man is the third film.".to_string()),
                    }),
                    grounding_chunk_indices: vec![0],
                }],
            }),
        };

        let extracted = extract_sources(&response).unwrap();
        assert_eq!(extracted.extraction, Extraction::GroundingMetadata);
        assert_eq!(extracted.search_queries, vec!["knives out 3"]);
        assert_eq!(
            extracted.sources,
            vec![WebSource {
                title: "a.example".to_string(),
                uri: "https://a.example".to_string(),
                snippet: "Wake Up Dead Man is the third film.".to_string(),
            }]
        );
    }

    #[test]
    fn test_chain_falls_back_in_order() {
        let extracted = extract_sources(&text_response(NUMBERED)).unwrap();
        assert_eq!(extracted.extraction, Extraction::NumberedList);

        let extracted =
            extract_sources(&text_response("See URL: https://example.com/a please")).unwrap();
        assert_eq!(extracted.extraction, Extraction::UrlLabel);

        let extracted = extract_sources(&text_response("See https://example.com/a")).unwrap();
        assert_eq!(extracted.extraction, Extraction::BareUrl);
    }

    #[test]
    fn test_grounding_without_chunks_falls_back_to_text() {
        let response = GenerationResponse {
            text: "See https://example.com/a".to_string(),
            grounding: Some(GroundingMetadata {
                web_search_queries: vec!["q".to_string()],
                ..GroundingMetadata::default()
            }),
        };

        let extracted = extract_sources(&response).unwrap();
        assert_eq!(extracted.extraction, Extraction::BareUrl);
        assert_eq!(extracted.search_queries, vec!["q"]);
    }
}
