//! Ordered child lists and the dispatch loop that renders them.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use super::{Directive, Handle, Status};
use crate::RenderContext;

const INITIAL_BACKOFF: Duration = Duration::from_micros(50);
const MAX_BACKOFF: Duration = Duration::from_millis(5);

/// Children of one directive, in source order.
#[derive(Debug)]
pub struct DirectiveCollection {
    owner: Handle,
    items: Vec<Handle>,
}

impl DirectiveCollection {
    pub(crate) fn new(owner: Handle, items: Vec<Handle>) -> Self {
        Self { owner, items }
    }

    /// Directive whose pending result this collection delivers.
    pub fn owner(&self) -> Handle {
        self.owner
    }

    pub fn handles(&self) -> &[Handle] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Render every member and deliver the concatenation to the owner.
    ///
    /// Synchronous kinds render inline; asynchronous-capable kinds are
    /// spawned onto the engine's pool. A member that fails is replaced by
    /// its diagnostic (or nothing) without affecting its siblings. Members
    /// parked on a bound target stay queued while other work can progress
    /// and are abandoned, empty, once nothing else can. Any member's inline
    /// error flags the owner.
    pub(crate) fn render(&self, ctx: &RenderContext<'_>, requester: Option<&str>) {
        let owner = ctx.directive(self.owner);
        let members: Vec<Arc<Directive>> = self.items.iter().map(|h| ctx.directive(*h)).collect();
        let (done_tx, done_rx) = mpsc::channel::<usize>();

        ctx.pool().in_place_scope(|scope| {
            let mut queue: VecDeque<usize> = (0..members.len()).collect();
            let mut touched = vec![false; members.len()];
            let mut in_flight = 0usize;
            let mut idle = 0usize;
            let mut backoff = INITIAL_BACKOFF;

            while let Some(index) = queue.pop_front() {
                while done_rx.try_recv().is_ok() {
                    in_flight -= 1;
                }

                let member = &members[index];
                let progressed = match member.status() {
                    Status::Rendered => true,
                    Status::Rendering => {
                        queue.push_back(index);
                        false
                    }
                    Status::None if member.is_parked() || touched[index] => {
                        queue.push_back(index);
                        false
                    }
                    Status::None if member.can_async() => {
                        touched[index] = true;
                        in_flight += 1;
                        let done_tx = done_tx.clone();
                        let member = Arc::clone(member);
                        let owner = Arc::clone(&owner);
                        scope.spawn(move |_| {
                            ctx.render_isolated(&member, Some(&owner), requester);
                            let _ = done_tx.send(index);
                        });
                        queue.push_back(index);
                        true
                    }
                    Status::None => {
                        touched[index] = true;
                        ctx.render_isolated(member, Some(&owner), requester);
                        if member.status() != Status::Rendered {
                            queue.push_back(index);
                        }
                        true
                    }
                };

                if progressed {
                    idle = 0;
                    backoff = INITIAL_BACKOFF;
                    continue;
                }

                idle += 1;
                if idle < queue.len() {
                    continue;
                }
                idle = 0;

                if in_flight == 0 && queue.iter().all(|&i| members[i].status() == Status::None) {
                    let abandoned = queue.iter().filter(|&&i| members[i].abandon()).count();
                    tracing::debug!(
                        owner = %owner.unique_id(),
                        abandoned,
                        "Collection finished with parked directives"
                    );
                    break;
                }
                wait(&done_rx, &mut in_flight, &mut backoff);
            }
        });

        if members.iter().any(|member| member.has_inline_error()) {
            owner.set_inline_error();
        }
        let text: String = members.iter().map(|member| member.result()).collect();
        owner.deliver(Status::Rendering, text);
    }
}

/// Let other work progress before the next pass over the queue.
fn wait(done_rx: &Receiver<usize>, in_flight: &mut usize, backoff: &mut Duration) {
    if matches!(rayon::yield_now(), Some(rayon::Yield::Executed)) {
        return;
    }
    match done_rx.recv_timeout(*backoff) {
        Ok(_) => {
            *in_flight -= 1;
            *backoff = INITIAL_BACKOFF;
        }
        Err(_) => *backoff = (*backoff * 2).min(MAX_BACKOFF),
    }
}
