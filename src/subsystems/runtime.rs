//! Generic component runtime — shared scaffolding for channel lifecycles.
//!
//! A [`Component`] is any independently-runnable unit owned by a subsystem;
//! in this gateway that means comms channels (console, HTTP). The subsystem
//! constructs components with their shared state already captured inside
//! them, then hands them to [`spawn_components`].
//!
//! [`spawn_components`] returns a [`SubsystemHandle`] that the caller can
//! `.await` (blocking until all components finish) or hold onto while doing
//! other work — the components run concurrently regardless. Any component
//! error cancels the shared [`CancellationToken`] so sibling components and
//! the supervisor all shut down cleanly.

use std::future::Future;
use std::pin::Pin;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::AppError;

// ── Component ─────────────────────────────────────────────────────────────────

/// A boxed, owned future returned by [`Component::run`].
pub type ComponentFuture =
    Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'static>>;

/// A self-contained, concurrently-runnable unit owned by a subsystem.
///
/// Implementors capture all shared state (`Arc<CommsState>`, …) at
/// construction time. [`Component::run`] is called once by
/// [`spawn_components`] and should run until `shutdown` is cancelled or the
/// component's own work is done.
pub trait Component: Send + 'static {
    /// Stable identifier used in log messages.
    fn id(&self) -> &str;

    /// Consume the component and return its async run-loop as a boxed future.
    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture;
}

// ── SubsystemHandle ───────────────────────────────────────────────────────────

/// An opaque handle to a running subsystem task set.
pub struct SubsystemHandle {
    inner: JoinHandle<Result<(), AppError>>,
}

impl SubsystemHandle {
    /// Await all components and return the first error, if any.
    pub async fn join(self) -> Result<(), AppError> {
        match self.inner.await {
            Ok(r) => r,
            Err(e) => Err(AppError::Comms(format!("subsystem task panicked: {e}"))),
        }
    }
}

// ── spawn_components ──────────────────────────────────────────────────────────

/// Spawn each [`Component`] as an independent Tokio task and return a
/// [`SubsystemHandle`] that resolves when all components have exited.
///
/// Behaviour on error:
/// - If any component returns `Err`, `shutdown` is cancelled so all siblings
///   receive the cancellation signal and stop cooperatively.
/// - The manager task then drains the remaining components and returns the
///   first error encountered.
pub fn spawn_components(
    components: Vec<Box<dyn Component>>,
    shutdown: CancellationToken,
) -> SubsystemHandle {
    let handle = tokio::spawn(async move {
        let mut set: JoinSet<Result<(), AppError>> = JoinSet::new();

        for component in components {
            let id = component.id().to_string();
            let shutdown = shutdown.clone();
            debug!(component = %id, "spawning component");
            set.spawn(component.run(shutdown));
        }

        let mut first_err: Option<AppError> = None;

        while let Some(res) = set.join_next().await {
            match res {
                // Component panicked.
                Err(e) => {
                    error!("component panicked: {e}");
                    shutdown.cancel();
                    first_err.get_or_insert_with(|| {
                        AppError::Comms(format!("component panicked: {e}"))
                    });
                }
                // Component returned an error.
                Ok(Err(e)) => {
                    error!("component error: {e}");
                    shutdown.cancel();
                    first_err.get_or_insert(e);
                }
                // Component exited cleanly.
                Ok(Ok(())) => {}
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    });

    SubsystemHandle { inner: handle }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quick(&'static str, Result<(), AppError>);

    impl Component for Quick {
        fn id(&self) -> &str {
            self.0
        }
        fn run(self: Box<Self>, _shutdown: CancellationToken) -> ComponentFuture {
            Box::pin(async move { self.1 })
        }
    }

    #[tokio::test]
    async fn clean_components_join_ok() {
        let handle = spawn_components(
            vec![Box::new(Quick("a", Ok(()))), Box::new(Quick("b", Ok(())))],
            CancellationToken::new(),
        );
        assert!(handle.join().await.is_ok());
    }

    #[tokio::test]
    async fn component_error_cancels_siblings() {
        let shutdown = CancellationToken::new();

        struct WaitsForShutdown;
        impl Component for WaitsForShutdown {
            fn id(&self) -> &str {
                "waiter"
            }
            fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
                Box::pin(async move {
                    shutdown.cancelled().await;
                    Ok(())
                })
            }
        }

        let handle = spawn_components(
            vec![
                Box::new(WaitsForShutdown),
                Box::new(Quick("boom", Err(AppError::Comms("bind failed".into())))),
            ],
            shutdown.clone(),
        );

        let err = handle.join().await.unwrap_err();
        assert!(err.to_string().contains("bind failed"));
        assert!(shutdown.is_cancelled());
    }
}
