//! Knowledge 모듈 - 인메모리 지식 저장소 + 키워드 검색
//!
//! - Store: URL → 문서 매핑 (삽입 순서 유지, 스냅샷 읽기)
//! - Search: 제목/본문 부분 문자열 매칭 스코어링 + 발췌

mod search;
mod store;

// Re-exports
pub use search::{
    excerpt, score_document, SearchResult, CONTENT_WEIGHT, DEFAULT_EXCERPT_LENGTH,
    DEFAULT_SEARCH_LIMIT, TITLE_WEIGHT,
};
pub use store::{Document, KnowledgeStore, StoreStats};
