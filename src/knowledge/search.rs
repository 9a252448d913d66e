//! 검색 - 대소문자 무시 부분 문자열 매칭 + 가중치 스코어링
//!
//! - 제목 매칭 2점, 본문 매칭 1점, 0점 문서는 제외
//! - 점수 내림차순, 동점은 저장소 삽입 순서 유지 (안정 정렬)
//! - 쿼리는 하나의 부분 문자열로 취급 (토큰화/스테밍 없음)

use anyhow::Result;
use serde::Serialize;

use super::store::{Document, KnowledgeStore};

/// 제목 매칭 가중치
pub const TITLE_WEIGHT: u32 = 2;
/// 본문 매칭 가중치
pub const CONTENT_WEIGHT: u32 = 1;
/// 기본 발췌 길이 (매칭 위치 양쪽으로 절반씩)
pub const DEFAULT_EXCERPT_LENGTH: usize = 300;
/// 내부 호출 기본 결과 수
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

const ELLIPSIS: &str = "...";

// ============================================================================
// Types
// ============================================================================

/// 검색 결과 (문서 필드 + 점수 + 발췌)
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub document: Document,
    pub score: u32,
    pub excerpt: String,
}

// ============================================================================
// Search
// ============================================================================

impl KnowledgeStore {
    /// 키워드 검색
    ///
    /// 저장소 스냅샷에 대해 수행되므로 진행 중인 크롤에 의해 막히지 않습니다.
    ///
    /// # Arguments
    /// * `query` - 검색어 (빈 문자열이면 빈 결과, 공백도 그대로 부분 문자열로 매칭)
    /// * `limit` - 최대 결과 수
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        if query.is_empty() || limit == 0 {
            return Ok(vec![]);
        }

        let mut scored: Vec<_> = self
            .snapshot()?
            .into_iter()
            .filter_map(|doc| {
                let score = score_document(&doc, query);
                (score > 0).then_some((doc, score))
            })
            .collect();

        // sort_by는 안정 정렬 → 동점은 삽입 순서 유지
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.truncate(limit);

        let results = scored
            .into_iter()
            .map(|(doc, score)| SearchResult {
                excerpt: excerpt(&doc.content, query, DEFAULT_EXCERPT_LENGTH),
                document: (*doc).clone(),
                score,
            })
            .collect();

        Ok(results)
    }
}

/// 문서 스코어 계산 (제목 2 + 본문 1)
pub fn score_document(doc: &Document, query: &str) -> u32 {
    let mut score = 0;
    if find_case_insensitive(&doc.title, query).is_some() {
        score += TITLE_WEIGHT;
    }
    if find_case_insensitive(&doc.content, query).is_some() {
        score += CONTENT_WEIGHT;
    }
    score
}

/// 발췌 생성
///
/// 본문에서 첫 매칭 위치 양쪽으로 `length / 2`자씩 잘라내고, 문자열 경계에 닿지 않으면
/// "..."를 붙입니다. 본문에 매칭이 없으면 앞 `length`자 + "..."를 반환합니다.
/// 길이는 바이트가 아닌 문자 단위입니다.
pub fn excerpt(content: &str, query: &str, length: usize) -> String {
    let chars: Vec<char> = content.chars().collect();

    let Some((start, end)) = find_case_insensitive(content, query) else {
        let mut out: String = chars.iter().take(length).collect();
        out.push_str(ELLIPSIS);
        return out;
    };

    let padding = length / 2;
    let from = start.saturating_sub(padding);
    let to = end.saturating_add(padding).min(chars.len());

    let mut out = String::with_capacity(to - from + 2 * ELLIPSIS.len());
    if from > 0 {
        out.push_str(ELLIPSIS);
    }
    out.extend(&chars[from..to]);
    if to < chars.len() {
        out.push_str(ELLIPSIS);
    }
    out
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 대소문자 무시 검색
///
/// 첫 매칭의 (시작, 끝) 문자 인덱스를 원본 문자열 기준으로 반환합니다.
/// 소문자 변환으로 문자 수가 바뀌는 경우에도 원본 위치로 되돌립니다.
fn find_case_insensitive(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return None;
    }

    let mut lowered = Vec::with_capacity(haystack.len());
    let mut origin = Vec::with_capacity(haystack.len());
    for (index, ch) in haystack.chars().enumerate() {
        for lower in ch.to_lowercase() {
            lowered.push(lower);
            origin.push(index);
        }
    }

    if needle.len() > lowered.len() {
        return None;
    }

    let start = lowered
        .windows(needle.len())
        .position(|window| window == needle.as_slice())?;
    let last = start + needle.len() - 1;

    Some((origin[start], origin[last] + 1))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(docs: &[(&str, &str, &str)]) -> KnowledgeStore {
        let store = KnowledgeStore::new();
        for (url, title, content) in docs {
            store.upsert(Document::new(*url, *title, *content)).unwrap();
        }
        store
    }

    #[test]
    fn test_empty_store() {
        let store = KnowledgeStore::new();
        assert!(store.search("workflow", 10).unwrap().is_empty());
    }

    #[test]
    fn test_title_and_content_match() {
        let store = store_with(&[(
            "https://knowledge.eptura.com/Asset/Modules",
            "Workflow Module",
            "This module helps manage workflows...",
        )]);

        let results = store.search("workflow", 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 3);
        assert!(results[0].excerpt.contains("workflows"));
        assert_eq!(results[0].document.url, "https://knowledge.eptura.com/Asset/Modules");
    }

    #[test]
    fn test_ranking_and_tie_order() {
        let store = store_with(&[
            ("https://example.com/1", "Reports", "Create a work order report"),
            ("https://example.com/2", "Nothing here", "Unrelated text"),
            ("https://example.com/3", "Work Order basics", "Intro page"),
            ("https://example.com/4", "Scheduling", "Work orders can be scheduled"),
            ("https://example.com/5", "Work order list", "Every work order in one list"),
        ]);

        let results = store.search("WORK ORDER", 10).unwrap();
        let urls: Vec<_> = results.iter().map(|r| r.document.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/5", // 3
                "https://example.com/3", // 2
                "https://example.com/1", // 1
                "https://example.com/4", // 1
            ]
        );

        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_results_contain_query() {
        let store = store_with(&[
            ("https://example.com/1", "Assets", "Track assets and parts"),
            ("https://example.com/2", "Parts", "Inventory of spare parts"),
            ("https://example.com/3", "Users", "Manage user accounts"),
        ]);

        for query in ["parts", "ASSET", "user acc", "zzz"] {
            for result in store.search(query, 10).unwrap() {
                let needle = query.to_lowercase();
                assert!(
                    result.document.title.to_lowercase().contains(&needle)
                        || result.document.content.to_lowercase().contains(&needle)
                );
            }
        }
    }

    #[test]
    fn test_limit_bound() {
        let docs: Vec<(String, String, String)> = (0..8)
            .map(|i| {
                (
                    format!("https://example.com/{}", i),
                    format!("Doc {}", i),
                    "shared keyword content".to_string(),
                )
            })
            .collect();
        let store = KnowledgeStore::new();
        for (url, title, content) in &docs {
            store.upsert(Document::new(url, title, content)).unwrap();
        }

        for limit in [0, 1, 3, 8, 20] {
            let results = store.search("keyword", limit).unwrap();
            assert_eq!(results.len(), limit.min(8));
        }
    }

    #[test]
    fn test_query_is_atomic_substring() {
        let store = store_with(&[(
            "https://example.com/1",
            "Guide",
            "You can manage workflows here",
        )]);

        assert_eq!(store.search("manage workflows", 5).unwrap().len(), 1);
        assert!(store.search("workflows manage", 5).unwrap().is_empty());
        assert!(store.search("   ", 5).unwrap().is_empty());
    }

    #[test]
    fn test_whitespace_query_is_literal() {
        let store = store_with(&[
            ("https://example.com/1", "Guide", "You can manage workflows here"),
            ("https://example.com/2", "Index", "Overview"),
        ]);

        let results = store.search(" ", 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.url, "https://example.com/1");
        assert_eq!(results[0].score, CONTENT_WEIGHT);

        assert!(store.search("", 5).unwrap().is_empty());
    }

    #[test]
    fn test_excerpt_window_with_ellipsis() {
        let content = format!("{}needle{}", "a".repeat(400), "b".repeat(400));
        let result = excerpt(&content, "NEEDLE", 300);

        assert!(result.starts_with("..."));
        assert!(result.ends_with("..."));
        assert!(result.contains("needle"));
        // 150 + 6 + 150 + 양쪽 "..."
        assert_eq!(result.chars().count(), 150 + 6 + 150 + 6);
    }

    #[test]
    fn test_excerpt_near_boundaries() {
        let content = "needle at the very start of a short text";
        let result = excerpt(content, "needle", 300);
        assert_eq!(result, content);
    }

    #[test]
    fn test_excerpt_fallback_without_content_match() {
        let content = "x".repeat(500);
        let result = excerpt(&content, "title-only", 300);
        assert_eq!(result, format!("{}...", "x".repeat(300)));

        assert_eq!(excerpt("short", "missing", 300), "short...");
    }

    #[test]
    fn test_title_only_match_excerpt_falls_back() {
        let store = store_with(&[(
            "https://example.com/1",
            "Workflow Module",
            "This page describes approvals.",
        )]);
        let results = store.search("workflow", 5).unwrap();
        assert_eq!(results[0].score, 2);
        assert_eq!(results[0].excerpt, "This page describes approvals....");
    }

    #[test]
    fn test_excerpt_unicode_safe() {
        let content = format!("{}자산 관리 모듈{}", "가".repeat(200), "나".repeat(200));
        let result = excerpt(&content, "관리", 20);
        assert!(result.contains("관리"));
        assert!(result.starts_with("..."));
        assert!(result.ends_with("..."));
    }

    #[test]
    fn test_find_case_insensitive() {
        assert_eq!(find_case_insensitive("Hello World", "world"), Some((6, 11)));
        assert_eq!(find_case_insensitive("Hello", ""), None);
        assert_eq!(find_case_insensitive("Hi", "longer"), None);
    }
}
