//! Knowledge Store - 인메모리 지식 저장소
//!
//! 정규 URL → 문서 매핑입니다. 검색과 신선도 판단 모두 이 저장소를 기준으로 합니다.
//!
//! - 같은 URL을 다시 저장하면 덮어쓰며 삽입 순서(최초 위치)는 유지됩니다.
//! - 읽기는 스냅샷(Arc 복사)으로 수행되어 진행 중인 크롤을 기다리지 않습니다.
//! - 더 이상 도달할 수 없는 URL의 문서도 삭제하지 않습니다.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// 저장된 문서 엔트리
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub url: String,
    pub title: String,
    pub content: String,
    pub last_updated: DateTime<Utc>,
}

impl Document {
    /// 현재 시각으로 문서 생성
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
            last_updated: Utc::now(),
        }
    }
}

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub document_count: usize,
    pub total_content_bytes: usize,
}

// ============================================================================
// KnowledgeStore
// ============================================================================

#[derive(Debug, Default)]
struct StoreInner {
    /// 삽입 순서대로 저장된 문서
    entries: Vec<Arc<Document>>,
    /// URL → entries 인덱스
    index: HashMap<String, usize>,
}

/// Knowledge Store - 동시 읽기/쓰기 가능한 인메모리 저장소
///
/// 락은 단일 연산 동안만 잡고 await 구간에서는 절대 유지하지 않습니다.
#[derive(Debug, Default)]
pub struct KnowledgeStore {
    inner: RwLock<StoreInner>,
}

impl KnowledgeStore {
    /// 빈 저장소 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 문서 저장 (URL이 같으면 덮어쓰기)
    ///
    /// # Returns
    /// 새로 추가되었으면 `true`, 기존 문서를 교체했으면 `false`
    pub fn upsert(&self, doc: Document) -> Result<bool> {
        if doc.content.trim().is_empty() {
            bail!("Refusing to store empty document: {}", doc.url);
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        if let Some(&position) = inner.index.get(&doc.url) {
            inner.entries[position] = Arc::new(doc);
            return Ok(false);
        }

        let position = inner.entries.len();
        inner.index.insert(doc.url.clone(), position);
        inner.entries.push(Arc::new(doc));
        Ok(true)
    }

    /// URL로 문서 조회
    pub fn get(&self, url: &str) -> Result<Option<Arc<Document>>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        Ok(inner
            .index
            .get(url)
            .map(|&position| Arc::clone(&inner.entries[position])))
    }

    /// URL 존재 여부
    pub fn contains(&self, url: &str) -> Result<bool> {
        let inner = self
            .inner
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(inner.index.contains_key(url))
    }

    /// 저장된 문서 수
    pub fn len(&self) -> Result<usize> {
        let inner = self
            .inner
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(inner.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// 삽입 순서대로 문서 스냅샷 반환
    ///
    /// 반환 이후의 쓰기는 스냅샷에 반영되지 않습니다.
    pub fn snapshot(&self) -> Result<Vec<Arc<Document>>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(inner.entries.clone())
    }

    /// 저장소 통계
    pub fn stats(&self) -> Result<StoreStats> {
        let inner = self
            .inner
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        Ok(StoreStats {
            document_count: inner.entries.len(),
            total_content_bytes: inner.entries.iter().map(|d| d.content.len()).sum(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
