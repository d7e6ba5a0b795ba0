//! # Paging Types
//!
//! Request and response shapes for paged and sliced reads. Everything here is
//! arithmetic; the queries live in roster-db.
//!
//! ## Page vs Slice
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PageRequest { page: 0, size: 3, sort: username DESC }                  │
//! │                                                                         │
//! │  Page                               │  Slice                            │
//! │  ────                               │  ─────                            │
//! │  SELECT ... LIMIT 3 OFFSET 0        │  SELECT ... LIMIT 4 OFFSET 0      │
//! │  SELECT COUNT(*) ...                │  (no count query)                 │
//! │                                     │                                   │
//! │  total_elements = 5                 │  4 rows back → has_next = true    │
//! │  total_pages    = 2                 │  content truncated to 3           │
//! │  has_next = (0 + 1) * 3 < 5         │                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Page numbers are 0-based.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::CoreResult;
use crate::validation::validate_page_size;

// =============================================================================
// Sort
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Ordering on one property path (`username`, `team.name`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub property: String,
    pub direction: Direction,
    #[serde(default)]
    pub ignore_case: bool,
}

impl Order {
    pub fn asc(property: impl Into<String>) -> Self {
        Order {
            property: property.into(),
            direction: Direction::Asc,
            ignore_case: false,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Order {
            property: property.into(),
            direction: Direction::Desc,
            ignore_case: false,
        }
    }

    pub fn ignoring_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }
}

/// An ordered list of [`Order`]s. Empty means unsorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Sort::default()
    }

    /// Same direction for every listed property.
    ///
    /// ## Example
    /// ```rust
    /// use roster_core::pagination::{Direction, Sort};
    ///
    /// let sort = Sort::by(Direction::Desc, &["username"]);
    /// assert_eq!(sort.orders()[0].property, "username");
    /// ```
    pub fn by(direction: Direction, properties: &[&str]) -> Self {
        Sort {
            orders: properties
                .iter()
                .map(|property| Order {
                    property: property.to_string(),
                    direction,
                    ignore_case: false,
                })
                .collect(),
        }
    }

    pub fn from_orders(orders: Vec<Order>) -> Self {
        Sort { orders }
    }

    /// Appends the orders of `other` after this sort's orders.
    pub fn and(mut self, other: Sort) -> Self {
        self.orders.extend(other.orders);
        self
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn is_sorted(&self) -> bool {
        !self.orders.is_empty()
    }
}

// =============================================================================
// Page Request
// =============================================================================

/// Page index (0-based), page size and sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    size: u32,
    sort: Sort,
}

impl PageRequest {
    /// Unsorted request.
    ///
    /// ## Errors
    /// `size` must be between 1 and [`crate::MAX_PAGE_SIZE`].
    pub fn of(page: u32, size: u32) -> CoreResult<Self> {
        Self::of_sorted(page, size, Sort::unsorted())
    }

    pub fn of_sorted(page: u32, size: u32, sort: Sort) -> CoreResult<Self> {
        validate_page_size(size)?;
        Ok(PageRequest { page, size, sort })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    /// Row offset of the first element of this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }

    pub fn next(&self) -> PageRequest {
        PageRequest {
            page: self.page.saturating_add(1),
            size: self.size,
            sort: self.sort.clone(),
        }
    }

    pub fn previous_or_first(&self) -> PageRequest {
        PageRequest {
            page: self.page.saturating_sub(1),
            size: self.size,
            sort: self.sort.clone(),
        }
    }

    pub fn first(&self) -> PageRequest {
        PageRequest {
            page: 0,
            size: self.size,
            sort: self.sort.clone(),
        }
    }

    /// Total element count implied by the content alone, if any.
    ///
    /// ## When The Count Query Can Be Skipped
    /// - first page shorter than the page size: total = content length
    /// - non-empty page shorter than the page size: it is the last page,
    ///   total = offset + content length
    ///
    /// An empty page past the first one says nothing about the total.
    pub fn infer_total(&self, content_len: usize) -> Option<u64> {
        let content_len = content_len as u64;
        let size = u64::from(self.size);

        if self.offset() == 0 {
            return (content_len < size).then_some(content_len);
        }

        (content_len != 0 && content_len < size).then(|| self.offset() + content_len)
    }
}

// =============================================================================
// Page
// =============================================================================

/// One page of content plus the total element count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    content: Vec<T>,
    number: u32,
    size: u32,
    total_elements: u64,
}

impl<T> Page<T> {
    /// Builds a page. `content` must not exceed the request's size.
    pub fn new(content: Vec<T>, request: &PageRequest, total_elements: u64) -> Self {
        debug_assert!(content.len() <= request.size as usize);
        Page {
            content,
            number: request.page,
            size: request.size,
            total_elements,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    /// 0-based page index.
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    pub fn total_pages(&self) -> u64 {
        self.total_elements.div_ceil(u64::from(self.size.max(1)))
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    pub fn is_first(&self) -> bool {
        self.number == 0
    }

    pub fn is_last(&self) -> bool {
        !self.has_next()
    }

    pub fn has_next(&self) -> bool {
        (u64::from(self.number) + 1) * u64::from(self.size) < self.total_elements
    }

    pub fn has_previous(&self) -> bool {
        self.number > 0
    }

    /// Converts the content, keeping paging information.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            total_elements: self.total_elements,
        }
    }
}

impl<T: Serialize> Serialize for Page<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Page", 8)?;
        state.serialize_field("content", &self.content)?;
        state.serialize_field("number", &self.number)?;
        state.serialize_field("size", &self.size)?;
        state.serialize_field("totalElements", &self.total_elements)?;
        state.serialize_field("totalPages", &self.total_pages())?;
        state.serialize_field("first", &self.is_first())?;
        state.serialize_field("last", &self.is_last())?;
        state.serialize_field("hasNext", &self.has_next())?;
        state.end()
    }
}

// =============================================================================
// Slice
// =============================================================================

/// One page of content and whether more exists, without a total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice<T> {
    content: Vec<T>,
    number: u32,
    size: u32,
    has_next: bool,
}

impl<T> Slice<T> {
    /// Builds a slice from a `size + 1` overfetch.
    ///
    /// The extra row, when present, only signals `has_next` and is dropped.
    pub fn from_overfetch(mut rows: Vec<T>, request: &PageRequest) -> Self {
        let size = request.size as usize;
        let has_next = rows.len() > size;
        rows.truncate(size);

        Slice {
            content: rows,
            number: request.page,
            size: request.size,
            has_next,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    pub fn is_first(&self) -> bool {
        self.number == 0
    }

    pub fn is_last(&self) -> bool {
        !self.has_next
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn has_previous(&self) -> bool {
        self.number > 0
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Slice<U> {
        Slice {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            has_next: self.has_next,
        }
    }
}

impl<T: Serialize> Serialize for Slice<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Slice", 6)?;
        state.serialize_field("content", &self.content)?;
        state.serialize_field("number", &self.number)?;
        state.serialize_field("size", &self.size)?;
        state.serialize_field("first", &self.is_first())?;
        state.serialize_field("last", &self.is_last())?;
        state.serialize_field("hasNext", &self.has_next)?;
        state.end()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn request(page: u32, size: u32) -> PageRequest {
        PageRequest::of(page, size).unwrap()
    }

    #[test]
    fn test_page_request_rejects_zero_size() {
        assert!(PageRequest::of(0, 0).is_err());
        assert_eq!(request(2, 3).offset(), 6);
    }

    #[test]
    fn test_page_navigation() {
        let req = request(1, 3);
        assert_eq!(req.next().page(), 2);
        assert_eq!(req.previous_or_first().page(), 0);
        assert_eq!(req.first().previous_or_first().page(), 0);
    }

    #[test]
    fn test_first_page_of_five() {
        let page = Page::new(vec!["m5", "m4", "m3"], &request(0, 3), 5);

        assert_eq!(page.number_of_elements(), 3);
        assert_eq!(page.total_elements(), 5);
        assert_eq!(page.total_pages(), 2);
        assert!(page.is_first());
        assert!(page.has_next());
        assert!(!page.has_previous());
    }

    #[test]
    fn test_last_page_of_five() {
        let page = Page::new(vec!["m2", "m1"], &request(1, 3), 5);

        assert!(!page.is_first());
        assert!(!page.has_next());
        assert!(page.is_last());
        assert!(page.has_previous());
    }

    #[test]
    fn test_exact_multiple_has_no_next() {
        let page = Page::new(vec![1, 2, 3], &request(1, 3), 6);
        assert!(!page.has_next());
        assert_eq!(page.total_pages(), 2);
    }

    #[test]
    fn test_empty_page() {
        let page: Page<i32> = Page::new(Vec::new(), &request(0, 10), 0);
        assert_eq!(page.total_pages(), 0);
        assert!(page.is_first());
        assert!(page.is_last());
        assert!(!page.has_content());
    }

    #[test]
    fn test_page_map_keeps_paging() {
        let page = Page::new(vec![1, 2, 3], &request(0, 3), 5).map(|n| n * 10);
        assert_eq!(page.content(), &[10, 20, 30]);
        assert_eq!(page.total_elements(), 5);
        assert!(page.has_next());
    }

    #[test]
    fn test_slice_from_overfetch() {
        let slice = Slice::from_overfetch(vec![1, 2, 3, 4], &request(0, 3));
        assert_eq!(slice.content(), &[1, 2, 3]);
        assert!(slice.has_next());
        assert!(slice.is_first());

        let slice = Slice::from_overfetch(vec![4, 5], &request(1, 3));
        assert_eq!(slice.number_of_elements(), 2);
        assert!(!slice.has_next());
        assert!(slice.is_last());
    }

    #[test]
    fn test_slice_exactly_full_has_no_next() {
        let slice = Slice::from_overfetch(vec![1, 2, 3], &request(0, 3));
        assert!(!slice.has_next());
    }

    #[test]
    fn test_infer_total() {
        assert_eq!(request(0, 3).infer_total(2), Some(2));
        assert_eq!(request(0, 3).infer_total(0), Some(0));
        assert_eq!(request(0, 3).infer_total(3), None);
        assert_eq!(request(1, 3).infer_total(2), Some(5));
        assert_eq!(request(1, 3).infer_total(3), None);
        assert_eq!(request(4, 3).infer_total(0), None);
    }

    #[test]
    fn test_sort_builders() {
        let sort = Sort::by(Direction::Desc, &["username"]).and(Sort::by(Direction::Asc, &["age"]));
        assert!(sort.is_sorted());
        assert_eq!(sort.orders().len(), 2);
        assert_eq!(sort.orders()[0], Order::desc("username"));
        assert_eq!(sort.orders()[1], Order::asc("age"));
        assert!(!Sort::unsorted().is_sorted());
    }

    #[test]
    fn test_page_response_shape() {
        let page = Page::new(vec!["a", "b"], &request(0, 2), 3);
        let json = serde_json::to_value(&page).unwrap();

        assert_eq!(json["content"], serde_json::json!(["a", "b"]));
        assert_eq!(json["number"], 0);
        assert_eq!(json["size"], 2);
        assert_eq!(json["totalElements"], 3);
        assert_eq!(json["totalPages"], 2);
        assert_eq!(json["first"], true);
        assert_eq!(json["hasNext"], true);
    }

    #[test]
    fn test_slice_response_shape_has_no_total() {
        let slice = Slice::from_overfetch(vec![1, 2, 3], &request(0, 2));
        let json = serde_json::to_value(&slice).unwrap();

        assert!(json.get("totalElements").is_none());
        assert_eq!(json["hasNext"], true);
        assert_eq!(json["content"], serde_json::json!([1, 2]));
    }
}
