//! Router abstraction consumed by the navigation executor.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub pathname: String,
    /// Query string including the leading `?`, or empty.
    pub search: String,
}

impl Location {
    /// Split `/path?query` into its parts.
    pub fn parse(href: &str) -> Self {
        match href.find('?') {
            Some(idx) => Self {
                pathname: href[..idx].to_string(),
                search: href[idx..].to_string(),
            },
            None => Self {
                pathname: href.to_string(),
                search: String::new(),
            },
        }
    }

    pub fn href(&self) -> String {
        format!("{}{}", self.pathname, self.search)
    }
}

pub trait Router: Send + Sync {
    fn current_pathname(&self) -> String;

    fn current_search(&self) -> String;

    fn push(&self, href: &str);

    /// Location updates, current value included.
    fn subscribe(&self) -> watch::Receiver<Location>;
}

/// In-process router backed by a watch channel.
#[derive(Clone)]
pub struct MemoryRouter {
    location: Arc<watch::Sender<Location>>,
}

impl MemoryRouter {
    pub fn new(initial: &str) -> Self {
        let (tx, _rx) = watch::channel(Location::parse(initial));
        Self {
            location: Arc::new(tx),
        }
    }

    pub fn location(&self) -> Location {
        self.location.borrow().clone()
    }
}

impl Router for MemoryRouter {
    fn current_pathname(&self) -> String {
        self.location.borrow().pathname.clone()
    }

    fn current_search(&self) -> String {
        self.location.borrow().search.clone()
    }

    fn push(&self, href: &str) {
        let next = Location::parse(href);
        self.location.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn subscribe(&self) -> watch::Receiver<Location> {
        self.location.subscribe()
    }
}
