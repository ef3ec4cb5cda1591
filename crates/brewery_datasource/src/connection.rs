//! Connection outcomes and the policy that decides what to do with them.

use crate::connector::Connector;
use crate::error::{BindError, BoxError};
use core::time::Duration;
use indexmap::IndexMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default deadline for [`ConnectionPolicy::Required`].
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// What boot does with datasource connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPolicy {
    /// Wait for every connection; any failure or timeout aborts boot.
    Required {
        /// Deadline shared by all connections.
        timeout: Duration,
    },
    /// Do not wait; outcomes are logged from a background task.
    Advisory,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self::Required {
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// The result of one datasource's `connect()`.
#[derive(Debug)]
pub enum ConnectionOutcome {
    /// The connection was established.
    Connected {
        /// The datasource name.
        datasource: String,
    },
    /// The connection attempt failed.
    Failed {
        /// The datasource name.
        datasource: String,
        /// Why it failed.
        error: BoxError,
    },
}

impl ConnectionOutcome {
    /// The datasource this outcome is for.
    #[must_use]
    pub fn datasource(&self) -> &str {
        match self {
            Self::Connected { datasource } | Self::Failed { datasource, .. } => datasource,
        }
    }

    /// Returns `true` if the connection was established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    fn log(&self) {
        match self {
            Self::Connected { datasource } => {
                tracing::info!(datasource = %datasource, "DataSource has successfully established connection");
            }
            Self::Failed { datasource, error } => {
                tracing::warn!(datasource = %datasource, error = %error, "DataSource has failed to establish connection");
            }
        }
    }
}

/// In-flight `connect()` calls started during binding.
#[derive(Debug, Default)]
pub struct PendingConnections {
    tasks: Vec<(String, JoinHandle<Result<(), BoxError>>)>,
}

impl PendingConnections {
    /// Starts `connector.connect()` on the runtime.
    pub(crate) fn start(&mut self, datasource: &str, connector: &Arc<dyn Connector>) {
        let connector = Arc::clone(connector);
        let handle = tokio::spawn(async move { connector.connect().await });
        self.tasks.push((datasource.to_owned(), handle));
    }

    /// Number of connections in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` if no connection was started.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every connection and reports each outcome.
    pub async fn outcomes(self) -> Vec<ConnectionOutcome> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        for (datasource, handle) in self.tasks {
            outcomes.push(outcome(datasource, handle.await));
        }
        outcomes
    }

    /// Applies `policy` to the pending connections.
    ///
    /// # Errors
    ///
    /// Under [`ConnectionPolicy::Required`], returns the first
    /// [`BindError::Connect`] or [`BindError::ConnectTimeout`]; remaining
    /// attempts are aborted.
    pub async fn settle(self, policy: ConnectionPolicy) -> Result<(), BindError> {
        match policy {
            ConnectionPolicy::Advisory => {
                if !self.is_empty() {
                    tokio::spawn(async move {
                        for outcome in self.outcomes().await {
                            outcome.log();
                        }
                    });
                }
                Ok(())
            }
            ConnectionPolicy::Required { timeout } => {
                let deadline = Instant::now() + timeout;
                let mut tasks = self.tasks.into_iter();
                while let Some((datasource, mut handle)) = tasks.next() {
                    let Ok(joined) = tokio::time::timeout_at(deadline, &mut handle).await else {
                        handle.abort();
                        abort_all(tasks);
                        return Err(BindError::ConnectTimeout {
                            datasource,
                            timeout,
                        });
                    };
                    let outcome = outcome(datasource, joined);
                    outcome.log();
                    if let ConnectionOutcome::Failed { datasource, error } = outcome {
                        abort_all(tasks);
                        return Err(BindError::Connect {
                            datasource,
                            source: error,
                        });
                    }
                }
                Ok(())
            }
        }
    }

    /// Aborts every connection still in flight.
    pub fn abort(self) {
        abort_all(self.tasks.into_iter());
    }
}

fn abort_all(tasks: impl Iterator<Item = (String, JoinHandle<Result<(), BoxError>>)>) {
    for (_, handle) in tasks {
        handle.abort();
    }
}

fn outcome(
    datasource: String,
    joined: Result<Result<(), BoxError>, tokio::task::JoinError>,
) -> ConnectionOutcome {
    match joined {
        Ok(Ok(())) => ConnectionOutcome::Connected { datasource },
        Ok(Err(error)) => ConnectionOutcome::Failed { datasource, error },
        Err(join) => ConnectionOutcome::Failed {
            datasource,
            error: Box::new(join),
        },
    }
}

/// Disconnects `connectors` in reverse binding order, logging failures.
pub async fn disconnect_all(connectors: &IndexMap<String, Arc<dyn Connector>>) {
    for (datasource, connector) in connectors.iter().rev() {
        match connector.disconnect().await {
            Ok(()) => tracing::debug!(datasource = %datasource, "datasource disconnected"),
            Err(error) => {
                tracing::warn!(datasource = %datasource, error = %error, "datasource failed to disconnect");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{ConnectorBuilder, DatasourceHandle};
    use crate::memory::MemoryDatabase;

    fn connector<F, Fut>(connect: F) -> Arc<dyn Connector>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Arc::new(
            ConnectorBuilder::new("test")
                .initialize(|config| {
                    Ok(Arc::new(MemoryDatabase::from_config(config)) as Arc<dyn DatasourceHandle>)
                })
                .connect(connect)
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn required_policy_surfaces_failures() {
        let mut pending = PendingConnections::default();
        pending.start("ok", &connector(|| async { Ok(()) }));
        pending.start("db", &connector(|| async { Err("refused".into()) }));

        let err = pending
            .settle(ConnectionPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BindError::Connect { ref datasource, .. } if datasource == "db"));
    }

    #[tokio::test]
    async fn required_policy_times_out() {
        let mut pending = PendingConnections::default();
        pending.start(
            "slow",
            &connector(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }),
        );

        let err = pending
            .settle(ConnectionPolicy::Required {
                timeout: Duration::from_millis(20),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BindError::ConnectTimeout { ref datasource, .. } if datasource == "slow"));
    }

    #[tokio::test]
    async fn advisory_policy_never_fails() {
        let mut pending = PendingConnections::default();
        pending.start("db", &connector(|| async { Err("refused".into()) }));
        assert!(pending.settle(ConnectionPolicy::Advisory).await.is_ok());
    }

    #[tokio::test]
    async fn outcomes_report_each_datasource() {
        let mut pending = PendingConnections::default();
        pending.start("a", &connector(|| async { Ok(()) }));
        pending.start("b", &connector(|| async { Err("nope".into()) }));

        let outcomes = pending.outcomes().await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_connected());
        assert_eq!(outcomes[1].datasource(), "b");
        assert!(!outcomes[1].is_connected());
    }
}
