//! The pipeline runner.
//!
//! A [`Chain`] is an immutable list of links terminated by exactly one
//! adapter. Running it threads a [`Context`] through every link in order,
//! down to the adapter, and back up in reverse order.
//!
//! The continuation handed to each link is a [`Next`]: a cursor over the
//! remaining links plus the adapter. Running a `Next` calls the link at the
//! cursor with a new `Next` over the tail, or the adapter once the tail is
//! empty. No closures are built per request.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{Instrument, debug, debug_span, warn};

use crate::{AdapterLink, Context, Error, Link, LinkFuture, Result};

// ============================================================================
// Continuation
// ============================================================================

/// The remainder of the chain, including the adapter.
///
/// A `Next` may be run at most once. Running it again returns
/// [`Error::Misuse`] and does not invoke any downstream link.
pub struct Next<'a> {
    links: &'a [Arc<dyn Link>],
    adapter: &'a dyn AdapterLink,
    depth: usize,
    owner: &'static str,
    spent: AtomicBool,
}

impl<'a> Next<'a> {
    fn new(
        links: &'a [Arc<dyn Link>],
        adapter: &'a dyn AdapterLink,
        depth: usize,
        owner: &'static str,
    ) -> Self {
        Self {
            links,
            adapter,
            depth,
            owner,
            spent: AtomicBool::new(false),
        }
    }

    /// Number of links left before the adapter.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.links.len()
    }

    /// Returns `true` once this continuation has been run.
    #[must_use]
    pub fn is_spent(&self) -> bool {
        self.spent.load(Ordering::Acquire)
    }

    /// Run the rest of the chain.
    pub fn run(&self, ctx: Context) -> LinkFuture<'a> {
        if self.spent.swap(true, Ordering::AcqRel) {
            warn!(
                link = self.owner,
                ctx = %ctx.id(),
                "continuation run more than once"
            );
            let err = Error::misuse(format!(
                "link `{}` ran its continuation more than once",
                self.owner
            ));
            return Box::pin(std::future::ready(Err(err)));
        }

        match self.links.split_first() {
            Some((link, rest)) => {
                debug!(link = link.name(), depth = self.depth, ctx = %ctx.id(), "entering link");
                let next = Next::new(rest, self.adapter, self.depth + 1, link.name());
                link.call(ctx, next)
            }
            None => {
                debug!(adapter = self.adapter.name(), ctx = %ctx.id(), "invoking adapter");
                self.adapter.call(ctx)
            }
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("owner", &self.owner)
            .field("remaining", &self.links.len())
            .field("adapter", &self.adapter.name())
            .field("spent", &self.is_spent())
            .finish()
    }
}

// ============================================================================
// Chain
// ============================================================================

/// Immutable ordered links plus one terminal adapter.
///
/// Cloning is cheap and clones share the same links. A chain holds no
/// per-request state, so one instance serves any number of concurrent runs.
#[derive(Clone)]
pub struct Chain {
    links: Arc<[Arc<dyn Link>]>,
    adapter: Arc<dyn AdapterLink>,
}

impl Chain {
    /// Assemble a chain from resolved links and the terminal adapter.
    #[must_use]
    pub fn new(links: Vec<Arc<dyn Link>>, adapter: Arc<dyn AdapterLink>) -> Self {
        Self {
            links: links.into(),
            adapter,
        }
    }

    /// Number of non-terminal links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Returns `true` when the adapter is the only link.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Link names in execution order, adapter last.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.links
            .iter()
            .map(|link| link.name())
            .chain(std::iter::once(self.adapter.name()))
            .collect()
    }

    /// Run `ctx` through every link and the adapter.
    pub async fn run(&self, ctx: Context) -> Result<Context> {
        let span = debug_span!(
            "pipeline",
            ctx = %ctx.id(),
            method = %ctx.method(),
            url = ctx.url(),
        );
        let next = Next::new(&self.links, self.adapter.as_ref(), 0, "client");
        next.run(ctx).instrument(span).await
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("links", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use assert2::{check, let_assert};

    use super::*;
    use crate::{Adapter, Method, Middleware, TransportError, adapter, link, link_with};

    type Journal = Arc<Mutex<Vec<String>>>;

    fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().map(|j| j.clone()).unwrap_or_default()
    }

    fn record(journal: &Journal, entry: String) {
        if let Ok(mut j) = journal.lock() {
            j.push(entry);
        }
    }

    /// Records "before" and "after" around the continuation.
    struct Recorder {
        journal: Journal,
    }

    impl Middleware for Recorder {
        type Options = &'static str;

        fn name(&self) -> &'static str {
            "recorder"
        }

        fn call<'a>(
            &'a self,
            ctx: Context,
            next: Next<'a>,
            label: &'a &'static str,
        ) -> LinkFuture<'a> {
            Box::pin(async move {
                record(&self.journal, format!("before {label}"));
                let result = next.run(ctx).await;
                record(&self.journal, format!("after {label}"));
                result
            })
        }
    }

    /// Returns a canned response without continuing.
    struct Halt;

    impl Middleware for Halt {
        type Options = ();

        fn name(&self) -> &'static str {
            "halt"
        }

        fn call<'a>(&'a self, mut ctx: Context, _next: Next<'a>, _: &'a ()) -> LinkFuture<'a> {
            ctx.set_response(203, Vec::new(), "halted");
            Box::pin(async move { Ok(ctx) })
        }
    }

    /// Turns any error into a 503 response.
    struct Recover;

    impl Middleware for Recover {
        type Options = ();

        fn name(&self) -> &'static str {
            "recover"
        }

        fn call<'a>(&'a self, ctx: Context, next: Next<'a>, _: &'a ()) -> LinkFuture<'a> {
            let fallback = ctx.clone();
            Box::pin(async move {
                match next.run(ctx).await {
                    Ok(ctx) => Ok(ctx),
                    Err(err) if err.is_transport() => {
                        let mut ctx = fallback;
                        ctx.set_response(503, Vec::new(), err.to_string());
                        Ok(ctx)
                    }
                    Err(err) => Err(err),
                }
            })
        }
    }

    /// Annotates errors on the way up.
    struct Annotate;

    impl Middleware for Annotate {
        type Options = ();

        fn name(&self) -> &'static str {
            "annotate"
        }

        fn call<'a>(&'a self, ctx: Context, next: Next<'a>, _: &'a ()) -> LinkFuture<'a> {
            Box::pin(async move { next.run(ctx).await.map_err(|e| e.annotate("annotated")) })
        }
    }

    /// Runs its continuation twice.
    struct Twice;

    impl Middleware for Twice {
        type Options = ();

        fn name(&self) -> &'static str {
            "twice"
        }

        fn call<'a>(&'a self, ctx: Context, next: Next<'a>, _: &'a ()) -> LinkFuture<'a> {
            Box::pin(async move {
                let _first = next.run(ctx.clone()).await?;
                check!(next.is_spent());
                next.run(ctx).await
            })
        }
    }

    /// Counts calls; fails when asked to.
    struct Counting {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Adapter for Counting {
        type Options = ();

        fn name(&self) -> &'static str {
            "counting"
        }

        fn call<'a>(&'a self, mut ctx: Context, _: &'a ()) -> LinkFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    return Err(Error::connection("refused"));
                }
                ctx.set_response(200, Vec::new(), "ok");
                Ok(ctx)
            })
        }
    }

    fn counting(fail: bool) -> (Arc<AtomicUsize>, Arc<dyn AdapterLink>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let adapter = adapter(Counting {
            calls: Arc::clone(&calls),
            fail,
        })
        .expect("adapter");
        (calls, adapter)
    }

    fn recorder(journal: &Journal, label: &'static str) -> Arc<dyn Link> {
        link_with(
            Recorder {
                journal: Arc::clone(journal),
            },
            label,
        )
        .expect("recorder")
    }

    #[tokio::test]
    async fn adapter_runs_once_per_execution() {
        let journal = Journal::default();
        let (calls, adapter) = counting(false);
        let chain = Chain::new(
            vec![
                recorder(&journal, "1"),
                recorder(&journal, "2"),
                recorder(&journal, "3"),
            ],
            adapter,
        );

        let ctx = chain.run(Context::new(Method::Get, "/")).await.expect("ok");
        check!(ctx.status() == Some(200));
        check!(calls.load(Ordering::SeqCst) == 1);

        chain.run(Context::new(Method::Get, "/")).await.expect("ok");
        check!(calls.load(Ordering::SeqCst) == 2);
    }

    #[tokio::test]
    async fn links_nest_in_lifo_order() {
        let journal = Journal::default();
        let (_, adapter) = counting(false);
        let chain = Chain::new(
            vec![
                recorder(&journal, "L1"),
                recorder(&journal, "L2"),
                recorder(&journal, "L3"),
            ],
            adapter,
        );

        chain.run(Context::new(Method::Get, "/")).await.expect("ok");

        check!(
            entries(&journal)
                == [
                    "before L1",
                    "before L2",
                    "before L3",
                    "after L3",
                    "after L2",
                    "after L1"
                ]
        );
    }

    #[tokio::test]
    async fn short_circuit_skips_downstream() {
        let journal = Journal::default();
        let (calls, adapter) = counting(false);
        let chain = Chain::new(
            vec![
                recorder(&journal, "outer"),
                link(Halt).expect("halt"),
                recorder(&journal, "inner"),
            ],
            adapter,
        );

        let ctx = chain.run(Context::new(Method::Get, "/")).await.expect("ok");

        check!(ctx.status() == Some(203));
        check!(ctx.response_body().as_text() == Some("halted"));
        check!(calls.load(Ordering::SeqCst) == 0);
        check!(entries(&journal) == ["before outer", "after outer"]);
    }

    #[tokio::test]
    async fn enclosing_link_recovers_transport_error() {
        let (calls, adapter) = counting(true);
        let chain = Chain::new(vec![link(Recover).expect("recover")], adapter);

        let ctx = chain.run(Context::new(Method::Get, "/")).await.expect("recovered");

        check!(ctx.status() == Some(503));
        check!(calls.load(Ordering::SeqCst) == 1);
    }

    #[tokio::test]
    async fn unrecovered_error_keeps_its_kind() {
        let journal = Journal::default();
        let (_, adapter) = counting(true);
        let chain = Chain::new(
            vec![recorder(&journal, "outer"), link(Annotate).expect("annotate")],
            adapter,
        );

        let err = chain
            .run(Context::new(Method::Get, "/"))
            .await
            .expect_err("transport failure");

        check!(err.is_connection());
        let_assert!(Error::Annotated { context, .. } = &err);
        check!(context == "annotated");
        let_assert!(Some(TransportError::Connection(_)) = err.transport());
        check!(entries(&journal) == ["before outer", "after outer"]);
    }

    #[tokio::test]
    async fn second_continuation_run_is_misuse() {
        let (calls, adapter) = counting(false);
        let chain = Chain::new(vec![link(Twice).expect("twice")], adapter);

        let err = chain
            .run(Context::new(Method::Get, "/"))
            .await
            .expect_err("misuse");

        check!(err.is_misuse());
        check!(err.to_string().contains("twice"));
        check!(calls.load(Ordering::SeqCst) == 1);
    }

    #[tokio::test]
    async fn adapter_only_chain() {
        let (calls, adapter) = counting(false);
        let chain = Chain::new(Vec::new(), adapter);

        check!(chain.is_empty());
        check!(chain.names() == ["counting"]);
        chain.run(Context::new(Method::Head, "/")).await.expect("ok");
        check!(calls.load(Ordering::SeqCst) == 1);
    }

    #[test]
    fn chain_debug_lists_links() {
        let (_, adapter) = counting(false);
        let chain = Chain::new(vec![link(Halt).expect("halt")], adapter);
        check!(chain.len() == 1);
        check!(format!("{chain:?}").contains("halt"));
    }
}
