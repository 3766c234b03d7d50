//! One resolvable source, memoized per `(uri, opts)`.

use crate::error::Result;
use crate::node::Node;
use crate::opts::ResolveOpts;
use crate::readers::Reader;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use tokio_util::sync::CancellationToken;

pub(crate) type SharedData = Shared<BoxFuture<'static, Result<Arc<Value>>>>;

/// A source known to a [`Resolver`](super::Resolver).
///
/// Document references own a read of `uri`. View references select a
/// fragment of their document's parsed content (`#key` written inside the
/// document itself) and are never cached.
pub struct Reference {
    uid: u64,
    uri: String,
    fragment: Option<String>,
    opts: ResolveOpts,
    reader: Arc<dyn Reader>,
    cancel: CancellationToken,
    parsed: OnceLock<Arc<Node>>,
    data: SharedData,
    parent: Option<Arc<Reference>>,
}

pub(crate) struct ReferenceParts {
    pub uid: u64,
    pub uri: String,
    pub fragment: Option<String>,
    pub opts: ResolveOpts,
    pub reader: Arc<dyn Reader>,
    pub cancel: CancellationToken,
    pub parent: Option<Arc<Reference>>,
}

impl Reference {
    /// Build a reference whose data future may refer back to it.
    ///
    /// The future is not polled until the first caller awaits [`Reference::data`].
    pub(crate) fn new_cyclic(
        parts: ReferenceParts,
        data: impl FnOnce(Weak<Reference>) -> BoxFuture<'static, Result<Arc<Value>>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Reference {
            uid: parts.uid,
            uri: parts.uri,
            fragment: parts.fragment,
            opts: parts.opts,
            reader: parts.reader,
            cancel: parts.cancel,
            parsed: OnceLock::new(),
            data: data(weak.clone()).shared(),
            parent: parts.parent,
        })
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// Absolute URI without fragment.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Selected fragment for view references.
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    pub fn is_view(&self) -> bool {
        self.fragment.is_some()
    }

    pub fn opts(&self) -> &ResolveOpts {
        &self.opts
    }

    pub fn reader(&self) -> &Arc<dyn Reader> {
        &self.reader
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn parent(&self) -> Option<&Arc<Reference>> {
        self.parent.as_ref()
    }

    /// Raw parser output, available once parsing succeeded.
    pub fn parsed(&self) -> Option<Arc<Node>> {
        self.parsed.get().cloned()
    }

    pub(crate) fn set_parsed(&self, node: Node) -> Arc<Node> {
        Arc::clone(self.parsed.get_or_init(|| Arc::new(node)))
    }

    /// Fully resolved data, shared by every caller.
    pub fn data(&self) -> SharedData {
        self.data.clone()
    }

    /// The document reference a view belongs to (itself for documents).
    pub fn document(self: &Arc<Self>) -> &Arc<Reference> {
        let mut current = self;
        while current.is_view() {
            match current.parent.as_ref() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    /// Parent chain, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Arc<Reference>> {
        std::iter::successors(self.parent.as_ref(), |r| r.parent.as_ref())
    }

    /// URI with fragment, for messages.
    pub fn display_uri(&self) -> String {
        match &self.fragment {
            Some(fragment) => format!("{}#{}", self.uri, fragment),
            None => self.uri.clone(),
        }
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("uid", &self.uid)
            .field("uri", &self.uri)
            .field("fragment", &self.fragment)
            .field("opts", &self.opts)
            .field("reader", &self.reader.name())
            .field("parent", &self.parent.as_ref().map(|p| p.uid))
            .finish()
    }
}
