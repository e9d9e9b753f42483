use crate::context::LlsContext;
use crate::io::PacketIo;
use futures::future::Future;
use futures::task::{Context, Poll};
use std::pin::Pin;
use tokio::runtime;
use tracing::{error, info};

/// Drives an [`LlsContext`] on the runtime as a polling loop: each poll runs one iteration and
/// immediately reschedules itself. Completes once the lifecycle asks for exit, after a final
/// cache dump.
pub struct LlsRunnable<I: PacketIo> {
    context: LlsContext<I>,
    iterations: u64,
}

impl<I: PacketIo> LlsRunnable<I> {
    pub fn new(context: LlsContext<I>) -> Self {
        LlsRunnable {
            context,
            iterations: 0,
        }
    }
}

impl<I: PacketIo> Unpin for LlsRunnable<I> {}

impl<I: PacketIo> Future for LlsRunnable<I> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let runnable = Pin::into_inner(self);
        if runnable.context.lifecycle().is_exiting() {
            info!(iterations = runnable.iterations, "owning core exiting");
            runnable.context.dump();
            return Poll::Ready(());
        }

        let now = runnable.context.lifecycle().now();
        runnable.context.poll(now);
        runnable.iterations += 1;

        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

pub fn initialize_runtime() -> std::io::Result<runtime::Runtime> {
    runtime::Builder::new()
        .threaded_scheduler()
        .enable_all()
        .build()
}

/// Runs the owning core until its lifecycle asks for exit. Blocks the calling thread.
pub fn run_lls<I: PacketIo + Send + 'static>(context: LlsContext<I>) -> std::io::Result<()> {
    let mut runtime = initialize_runtime()?;
    runtime.block_on(async {
        if let Err(err) = tokio::spawn(LlsRunnable::new(context)).await {
            error!(%err, "owning core stopped abnormally");
        }
    });
    Ok(())
}
