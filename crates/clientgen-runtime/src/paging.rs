//! Lazy, restartable pagination.
//!
//! A [`Pager`] owns a page-fetch function and nothing else. Every call to
//! [`Pager::iter`] starts a fresh walk from the first page; pages are only
//! requested when the consumer runs out of buffered items, and the walk ends
//! on the first page that carries no next link.

// Internal imports (std, crate)
use std::collections::VecDeque;

use crate::error::{Result, RuntimeError};
use crate::path::lookup;

// External imports (alphabetized)
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

/// One page of results
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_link: Option<String>,
}

/// Sequence of items spread across pages.
///
/// `fetch` receives `None` for the first page and the previous page's next
/// link afterwards.
pub struct Pager<T, F>
where
    F: Fn(Option<&str>) -> Result<Page<T>>,
{
    fetch: F,
}

impl<T, F> Pager<T, F>
where
    F: Fn(Option<&str>) -> Result<Page<T>>,
{
    pub fn new(fetch: F) -> Self {
        Self { fetch }
    }

    /// Item iterator starting from the first page
    pub fn iter(&self) -> PagerIter<'_, T, F> {
        PagerIter {
            pages: self.by_page(),
            buffer: VecDeque::new(),
        }
    }

    /// Page iterator starting from the first page
    pub fn by_page(&self) -> PageIter<'_, T, F> {
        PageIter {
            fetch: &self.fetch,
            cursor: Cursor::Start,
            _items: std::marker::PhantomData,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Iterator over whole pages
pub struct PageIter<'a, T, F>
where
    F: Fn(Option<&str>) -> Result<Page<T>>,
{
    fetch: &'a F,
    cursor: Cursor,
    _items: std::marker::PhantomData<fn() -> T>,
}

impl<T, F> Iterator for PageIter<'_, T, F>
where
    F: Fn(Option<&str>) -> Result<Page<T>>,
{
    type Item = Result<Page<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let link = match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::Done => return None,
            Cursor::Start => None,
            Cursor::Next(link) => Some(link),
        };

        log::debug!("Fetching page (next link: {:?})", link);
        match (self.fetch)(link.as_deref()) {
            Ok(page) => {
                if let Some(next) = page.next_link.as_ref() {
                    // A service echoing the same link would loop forever
                    if link.as_deref() != Some(next.as_str()) {
                        self.cursor = Cursor::Next(next.clone());
                    }
                }
                Some(Ok(page))
            }
            // Cursor stays Done so a failed walk is not retried implicitly
            Err(e) => Some(Err(e)),
        }
    }
}

/// Iterator over individual items
pub struct PagerIter<'a, T, F>
where
    F: Fn(Option<&str>) -> Result<Page<T>>,
{
    pages: PageIter<'a, T, F>,
    buffer: VecDeque<T>,
}

impl<T, F> Iterator for PagerIter<'_, T, F>
where
    F: Fn(Option<&str>) -> Result<Page<T>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            match self.pages.next()? {
                Ok(page) => self.buffer.extend(page.items),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Split a page response body into items and next link.
///
/// Paths are dot separated (`value`, `result.items`). A missing or null item
/// array is an empty page; a missing, null or empty next link ends the walk.
pub fn extract_page<T: DeserializeOwned>(
    body: &JsonValue,
    items_path: &str,
    next_link_path: Option<&str>,
) -> Result<Page<T>> {
    let items = match lookup(body, items_path) {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::Array(values)) => values
            .iter()
            .cloned()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<T>, _>>()?,
        Some(other) => {
            return Err(RuntimeError::encoding(format!(
                "expected an array at '{}', found {}",
                items_path, other
            )))
        }
    };

    let next_link = next_link_path
        .and_then(|path| lookup(body, path))
        .and_then(JsonValue::as_str)
        .filter(|link| !link.is_empty())
        .map(str::to_string);

    Ok(Page { items, next_link })
}
