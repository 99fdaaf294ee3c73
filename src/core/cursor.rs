// Page-buffered, bidirectional traversal of one edge of a node.
use crate::core::error::{Error, ErrorKind};
use crate::core::node::Node;
use crate::core::schema::NodeType;
use crate::core::transport::{Method, Params, RequestPath, SharedTransport};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::ops::Index;
use tracing::debug;

/// Paginated response body for edge reads.
#[derive(Clone, Debug, Deserialize)]
pub struct PageEnvelope {
    pub data: Vec<Map<String, Value>>,
    #[serde(default)]
    pub paging: Option<PageLinks>,
    #[serde(default)]
    pub summary: Option<Value>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PageLinks {
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Direction {
    Next,
    Previous,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Paging {
    next: Option<RequestPath>,
    previous: Option<RequestPath>,
}

impl Paging {
    fn token(&self, direction: Direction) -> Option<&RequestPath> {
        match direction {
            Direction::Next => self.next.as_ref(),
            Direction::Previous => self.previous.as_ref(),
        }
    }
}

impl From<Option<PageLinks>> for Paging {
    fn from(links: Option<PageLinks>) -> Self {
        let links = links.unwrap_or_default();
        Self {
            next: token(links.next),
            previous: token(links.previous),
        }
    }
}

// Empty tokens count as absent.
fn token(link: Option<String>) -> Option<RequestPath> {
    link.filter(|token| !token.is_empty()).map(RequestPath::Absolute)
}

/// Current page of an edge plus the tokens to move around it.
///
/// Each successful load replaces the buffer, the tokens and the summary
/// wholesale. Exhaustion is not sticky: `has_next`/`has_previous` reflect the
/// tokens of the last page loaded.
pub struct Cursor<T: NodeType> {
    nodes: Vec<Node<T>>,
    paging: Paging,
    summary: Option<Value>,
    params: Option<Params>,
    parent_id: String,
    transport: SharedTransport,
    loaded: bool,
}

impl<T: NodeType> Cursor<T> {
    /// Cursor over `source`'s edge named by `T::ENDPOINT`.
    pub fn new<S: NodeType>(source: &Node<S>, params: Params) -> Result<Self, Error> {
        Self::for_endpoint(source, T::ENDPOINT, params)
    }

    /// Cursor over an edge chosen at runtime.
    pub fn for_endpoint<S: NodeType>(
        source: &Node<S>,
        endpoint: &str,
        params: Params,
    ) -> Result<Self, Error> {
        if endpoint.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("edge endpoint must not be empty")
                .with_hint("Use a node type with an `ENDPOINT` or `Cursor::for_endpoint`."));
        }
        let parent_id = source.id()?;
        let transport = source.transport()?.clone();
        let first = RequestPath::segments([parent_id.as_str(), endpoint]);
        Ok(Self {
            nodes: Vec::new(),
            paging: Paging {
                next: Some(first),
                previous: None,
            },
            summary: None,
            params: Some(params),
            parent_id,
            transport,
            loaded: false,
        })
    }

    pub fn has_next(&self) -> bool {
        self.paging.next.is_some()
    }

    pub fn has_previous(&self) -> bool {
        self.paging.previous.is_some()
    }

    pub fn next_token(&self) -> Option<&RequestPath> {
        self.paging.next.as_ref()
    }

    pub fn previous_token(&self) -> Option<&RequestPath> {
        self.paging.previous.as_ref()
    }

    /// True once any page has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub async fn next(&mut self) -> Result<&mut Self, Error> {
        self.load(Direction::Next).await
    }

    pub async fn previous(&mut self) -> Result<&mut Self, Error> {
        self.load(Direction::Previous).await
    }

    async fn load(&mut self, direction: Direction) -> Result<&mut Self, Error> {
        let Some(path) = self.paging.token(direction).cloned() else {
            return Err(Error::new(ErrorKind::PaginationExhausted)
                .with_message(match direction {
                    Direction::Next => "no next page",
                    Direction::Previous => "no previous page",
                })
                .with_hint("Check `has_next`/`has_previous` before navigating."));
        };
        // Server tokens already carry the original filters; only the first load sends params.
        let params = self.params.clone().unwrap_or_default();
        debug!(path = %path, ?direction, params = params.len(), "loading page");

        let response = self.transport.call(Method::Get, &path, &params).await?;
        let envelope: PageEnvelope = serde_json::from_value(response).map_err(|err| {
            Error::new(ErrorKind::Decode)
                .with_message("response is not a paginated envelope")
                .with_path(path.to_string())
                .with_source(err)
        })?;

        self.nodes = envelope
            .data
            .into_iter()
            .map(|raw| {
                Node::from_parts(
                    Some(raw),
                    Some(self.parent_id.clone()),
                    Some(self.transport.clone()),
                )
            })
            .collect();
        self.paging = Paging::from(envelope.paging);
        self.summary = envelope.summary;
        self.params = None;
        self.loaded = true;
        debug!(
            nodes = self.nodes.len(),
            has_next = self.has_next(),
            has_previous = self.has_previous(),
            "page loaded"
        );
        Ok(self)
    }

    pub fn summary(&self) -> Option<&Value> {
        self.summary.as_ref()
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn nodes(&self) -> &[Node<T>] {
        &self.nodes
    }

    /// Mutable access to the current page; the next load still replaces it.
    pub fn nodes_mut(&mut self) -> &mut Vec<Node<T>> {
        &mut self.nodes
    }

    pub fn into_nodes(self) -> Vec<Node<T>> {
        self.nodes
    }

    pub fn get(&self, index: usize) -> Option<&Node<T>> {
        self.nodes.get(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node<T>> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Node<T>> {
        self.nodes.iter_mut()
    }
}

impl<T: NodeType> Index<usize> for Cursor<T> {
    type Output = Node<T>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.nodes[index]
    }
}

impl<'a, T: NodeType> IntoIterator for &'a Cursor<T> {
    type Item = &'a Node<T>;
    type IntoIter = std::slice::Iter<'a, Node<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

impl<'a, T: NodeType> IntoIterator for &'a mut Cursor<T> {
    type Item = &'a mut Node<T>;
    type IntoIter = std::slice::IterMut<'a, Node<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter_mut()
    }
}

impl<T: NodeType> fmt::Debug for Cursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("parent_id", &self.parent_id)
            .field("nodes", &self.nodes)
            .field("paging", &self.paging)
            .field("summary", &self.summary)
            .field("loaded", &self.loaded)
            .finish()
    }
}
