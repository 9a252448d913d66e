//! eptura-kb - Eptura 문서 지식베이스 + 채팅 백엔드
//!
//! 문서 사이트를 주기적으로 크롤링해 인메모리 지식베이스를 만들고,
//! 키워드 검색과 검색 결과 기반 채팅 응답을 HTTP로 제공합니다.

pub mod chat;
pub mod cli;
pub mod config;
pub mod crawler;
pub mod extractor;
pub mod knowledge;
pub mod scheduler;
pub mod scraper;
pub mod server;
pub mod service;

// Re-exports
pub use chat::{answer_question, ChatAnswer, ChatMessage, ChatProvider, OpenAiChat, Role, Source};
pub use config::{ChatConfig, CrawlConfig, ServerConfig};
pub use crawler::{discover_links, CrawlReport, Crawler};
pub use extractor::{ContentExtractor, ExtractedPage};
pub use knowledge::{Document, KnowledgeStore, SearchResult, StoreStats};
pub use scheduler::RefreshScheduler;
pub use crate::scraper::{PageFetcher, ScrapedContent, WebScraper};
pub use server::{ApiError, AppState};
pub use service::KnowledgeService;
