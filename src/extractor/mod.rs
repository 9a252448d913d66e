//! 콘텐츠 추출 모듈 - HTML → (제목, 정규화된 본문)
//!
//! 문서 사이트 페이지에서 탐색 메뉴, 헤더/푸터, 사이드바 같은 비본문 요소를 제외하고
//! 본문 컨테이너의 텍스트만 추출합니다. 실패 조건은 없으며,
//! 매칭되는 요소가 없으면 다음 폴백으로 내려가 최종적으로 body 전체를 사용합니다.

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

/// 제목을 찾지 못했을 때의 기본값
pub const UNTITLED: &str = "Untitled";

/// 본문 컨테이너 후보 (우선순위 순)
pub const DEFAULT_CONTENT_SELECTORS: &[&str] = &[
    ".content",
    ".main-content",
    "#content",
    "main",
    ".article-content",
];

/// 텍스트 추출에서 제외할 태그
const BOILERPLATE_TAGS: &[&str] = &["script", "style", "noscript", "nav", "header", "footer"];

/// 텍스트 추출에서 제외할 클래스
const BOILERPLATE_CLASSES: &[&str] = &["sidebar"];

/// 줄바꿈으로 구분되는 블록 요소
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "ol", "p", "pre", "section",
    "table", "tr", "ul",
];

// ============================================================================
// Types
// ============================================================================

/// 추출 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    /// 페이지 제목 (없으면 "Untitled")
    pub title: String,
    /// 정규화된 본문 텍스트
    pub content: String,
}

// ============================================================================
// ContentExtractor
// ============================================================================

/// HTML 콘텐츠 추출기
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    content_selectors: Vec<String>,
}

impl ContentExtractor {
    /// 기본 컨테이너 우선순위로 생성
    pub fn new() -> Self {
        Self {
            content_selectors: DEFAULT_CONTENT_SELECTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// 원본 HTML 문자열에서 추출
    pub fn extract_html(&self, html: &str) -> ExtractedPage {
        let document = Html::parse_document(html);
        self.extract(&document)
    }

    /// 파싱된 문서에서 제목과 본문 추출
    pub fn extract(&self, document: &Html) -> ExtractedPage {
        ExtractedPage {
            title: self.extract_title(document),
            content: self.extract_content(document),
        }
    }

    /// 제목 추출
    ///
    /// `<title>` → 첫 번째 `<h1>` → "Untitled" 순서로, 비어있지 않은 첫 값을 사용합니다.
    pub fn extract_title(&self, document: &Html) -> String {
        for selector_str in ["title", "h1"] {
            if let Ok(selector) = Selector::parse(selector_str) {
                if let Some(element) = document.select(&selector).next() {
                    let title = element.text().collect::<Vec<_>>().join(" ");
                    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
                    if !title.is_empty() {
                        return title;
                    }
                }
            }
        }

        UNTITLED.to_string()
    }

    /// 본문 추출
    ///
    /// 매칭 요소가 하나라도 있는 첫 번째 컨테이너 셀렉터를 사용합니다.
    /// 어떤 셀렉터도 매칭되지 않으면 body 전체에서 추출합니다.
    pub fn extract_content(&self, document: &Html) -> String {
        for selector_str in &self.content_selectors {
            let Ok(selector) = Selector::parse(selector_str) else {
                tracing::warn!("Invalid content selector: {}", selector_str);
                continue;
            };

            // 제거 대상 내부의 컨테이너, 같은 셀렉터에 중첩 매칭된 요소는 제외
            let containers: Vec<ElementRef> = document
                .select(&selector)
                .filter(|element| !is_removed(element))
                .filter(|element| {
                    !element
                        .ancestors()
                        .filter_map(ElementRef::wrap)
                        .any(|ancestor| selector.matches(&ancestor))
                })
                .collect();

            if containers.is_empty() {
                continue;
            }

            let mut text = String::new();
            for container in containers {
                collect_text(container, &mut text);
                text.push('\n');
            }
            return normalize_text(&text);
        }

        // 폴백: 전체 body 텍스트
        let body = Selector::parse("body")
            .ok()
            .and_then(|selector| document.select(&selector).next())
            .unwrap_or_else(|| document.root_element());

        let mut text = String::new();
        collect_text(body, &mut text);
        normalize_text(&text)
    }
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 정규화
///
/// 가로 공백 연속은 공백 하나로, 줄바꿈 연속(주변 공백 포함)은 줄바꿈 하나로 줄이고
/// 앞뒤 공백을 제거합니다. 여러 번 적용해도 결과가 같습니다.
pub fn normalize_text(text: &str) -> String {
    match (Regex::new(r"[^\S\n]+"), Regex::new(r"\s*\n\s*")) {
        (Ok(spaces), Ok(newlines)) => {
            let collapsed = spaces.replace_all(text, " ");
            newlines.replace_all(&collapsed, "\n").trim().to_string()
        }
        _ => text.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

/// 비본문 요소 여부 (script, style, nav, header, footer, .sidebar)
fn is_boilerplate(element: &ElementRef) -> bool {
    let value = element.value();
    BOILERPLATE_TAGS.contains(&value.name())
        || value
            .classes()
            .any(|class| BOILERPLATE_CLASSES.contains(&class))
}

/// 요소 자신 또는 조상이 제거 대상인지 확인
fn is_removed(element: &ElementRef) -> bool {
    is_boilerplate(element)
        || element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| is_boilerplate(&ancestor))
}

/// 요소 하위 텍스트 수집 (제거 대상 하위 트리는 건너뜀)
fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                let Some(child_element) = ElementRef::wrap(child) else {
                    continue;
                };
                if is_boilerplate(&child_element) {
                    continue;
                }

                let separator = match child_element.value().name() {
                    name if BLOCK_TAGS.contains(&name) => Some('\n'),
                    "td" | "th" => Some(' '),
                    _ => None,
                };

                if let Some(sep) = separator {
                    out.push(sep);
                }
                collect_text(child_element, out);
                if let Some(sep) = separator {
                    out.push(sep);
                }
            }
            _ => {}
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> ExtractedPage {
        ContentExtractor::new().extract_html(html)
    }

    #[test]
    fn test_extract_title() {
        let page = extract(
            r#"
            <html>
                <head><title>Test Page Title</title></head>
                <body><h1>Main Heading</h1></body>
            </html>
        "#,
        );
        assert_eq!(page.title, "Test Page Title");
    }

    #[test]
    fn test_extract_title_h1_fallback() {
        let page = extract(
            r#"
            <html>
                <head><title>  </title></head>
                <body><h1>H1
                    Heading</h1><h1>Second</h1></body>
            </html>
        "#,
        );
        assert_eq!(page.title, "H1 Heading");
    }

    #[test]
    fn test_extract_title_untitled() {
        let page = extract("<html><body><p>No headings here</p></body></html>");
        assert_eq!(page.title, UNTITLED);
    }

    #[test]
    fn test_boilerplate_removed() {
        let page = extract(
            r#"
            <html>
                <body>
                    <header>Site header</header>
                    <nav>Navigation menu</nav>
                    <div class="sidebar">Sidebar links</div>
                    <script>var tracking = 1;</script>
                    <style>.x { color: red; }</style>
                    <p>Actual page text.</p>
                    <footer>Footer content</footer>
                </body>
            </html>
        "#,
        );
        assert_eq!(page.content, "Actual page text.");
    }

    #[test]
    fn test_content_selector_priority() {
        let page = extract(
            r#"
            <html>
                <body>
                    <main>Main area text</main>
                    <div class="content">Content class text</div>
                </body>
            </html>
        "#,
        );
        assert_eq!(page.content, "Content class text");
    }

    #[test]
    fn test_main_used_when_no_class_matches() {
        let page = extract(
            r#"
            <html>
                <body>
                    <p>Outside</p>
                    <main><p>Inside main</p></main>
                </body>
            </html>
        "#,
        );
        assert_eq!(page.content, "Inside main");
    }

    #[test]
    fn test_all_matching_containers_joined() {
        let page = extract(
            r#"
            <html><body>
                <div class="content">First block</div>
                <p>between</p>
                <div class="content">Second block</div>
            </body></html>
        "#,
        );
        assert_eq!(page.content, "First block\nSecond block");
    }

    #[test]
    fn test_nested_container_not_duplicated() {
        let page = extract(
            r#"
            <html><body>
                <div class="content">Outer <div class="content">inner</div></div>
            </body></html>
        "#,
        );
        assert_eq!(page.content, "Outer\ninner");
    }

    #[test]
    fn test_container_inside_boilerplate_ignored() {
        let page = extract(
            r#"
            <html><body>
                <nav><div class="content">Menu content</div></nav>
                <div id="content">Real content</div>
            </body></html>
        "#,
        );
        assert_eq!(page.content, "Real content");
    }

    #[test]
    fn test_body_fallback() {
        let page = extract(
            r#"
            <html><body>
                <nav>Nav</nav>
                <div><p>Paragraph one.</p><p>Paragraph   two.</p></div>
            </body></html>
        "#,
        );
        assert_eq!(page.content, "Paragraph one.\nParagraph two.");
    }

    #[test]
    fn test_inline_elements_not_split() {
        let page = extract("<html><body><p>Work<b>flow</b> <i>module</i></p></body></html>");
        assert_eq!(page.content, "Workflow module");
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  a \t b  "), "a b");
        assert_eq!(normalize_text("a \n\n \n b"), "a\nb");
        assert_eq!(normalize_text("a\r\nb"), "a\nb");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_extraction_idempotent() {
        let html = r#"
            <html><head><title> Asset   Modules </title></head>
            <body><div class="content">
                <h2>Work orders</h2>
                <p>Manage   work orders
                   and schedules.</p>
                <ul><li>One</li><li>Two</li></ul>
            </div></body></html>
        "#;
        let first = extract(html);
        let second = extract(html);
        assert_eq!(first, second);
        assert_eq!(first.title, "Asset Modules");
        assert_eq!(normalize_text(&first.content), first.content);
    }
}
