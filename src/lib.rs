//! Click-to-toggle popups on a deterministic in-memory page.
//!
//! A click anywhere inside an element carrying the `popup` class flips the
//! `shown` class on the nearest such element. [`PopupToggler`] binds that
//! behavior; [`Page`] is the host shell it runs in.
//!
//! ```
//! use popup_toggler::{Page, PopupToggler};
//!
//! # fn main() -> popup_toggler::Result<()> {
//! let mut page = Page::from_html(r#"<div class="popup"><span id="inner">x</span></div>"#)?;
//! PopupToggler::default().install(&mut page);
//! page.fire_ready()?;
//!
//! page.click("#inner")?;
//! page.assert_class("div", "shown", true)?;
//! page.click("#inner")?;
//! page.assert_class("div", "shown", false)?;
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::error::Error as StdError;
use std::fmt;

mod dom;
mod events;
mod html;
mod page;
mod popup;
mod selector;

pub use events::{EventPhase, EventState, ListenerId};
pub use page::Page;
pub use popup::{DEFAULT_MARKER_CLASS, DEFAULT_SHOWN_CLASS, PopupConfig, PopupToggler};

pub(crate) use dom::Dom;
pub(crate) use events::{EventHandler, ListenerStore};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    HtmlParse(String),
    SelectorNotFound(String),
    UnsupportedSelector(String),
    InvalidClassName(String),
    AlreadyInitialized(String),
    Lifecycle(String),
    Runtime(String),
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::SelectorNotFound(selector) => write!(f, "selector not found: {selector}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::InvalidClassName(name) => write!(f, "invalid class name: {name:?}"),
            Self::AlreadyInitialized(key) => write!(f, "already initialized: {key}"),
            Self::Lifecycle(msg) => write!(f, "lifecycle error: {msg}"),
            Self::Runtime(msg) => write!(f, "runtime error: {msg}"),
            Self::AssertionFailed {
                selector,
                expected,
                actual,
                dom_snippet,
            } => write!(
                f,
                "assertion failed for {selector}: expected {expected}, actual {actual}, snippet {dom_snippet}"
            ),
        }
    }
}

impl StdError for Error {}

/// Index of a node in the page's DOM arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars();
    let mut out = String::new();
    for _ in 0..max_chars {
        let Some(ch) = chars.next() else {
            return out;
        };
        out.push(ch);
    }
    if chars.next().is_some() {
        out.push_str("...");
    }
    out
}

fn is_valid_class_token(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|ch| ch.is_ascii_whitespace())
}

#[cfg(test)]
mod tests;
