// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Authenticated sessions to vCenter endpoints, and the cache that shares them.
//!
//! The remote management API is reached only through the [`Connector`] and [`Connection`]
//! traits, so the cache and everything built on it can run against a real client or against an
//! in-memory inventory.

use std::{collections::HashMap, fmt, future::Future, sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    chrono::{DateTime, Local},
    futures::future,
    log::{debug, info, warn},
};

use crate::{
    config::VCenter,
    error::{Error, Fault, FaultKind, Result},
};

/// Deadline applied to every call made to a remote endpoint.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(60);

/// The login details for one vCenter. Immutable once registered with a [`SessionCache`].
#[derive(Clone, PartialEq, Eq)]
pub struct EndpointCredential {
    pub server: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for EndpointCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointCredential")
            .field("server", &self.server)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterHandle {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePoolHandle {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkHandle {
    pub path: String,
}

/// A live, authenticated connection to one endpoint.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Whether the endpoint still accepts this connection's session.
    async fn is_active(&self) -> bool;

    async fn logout(&self) -> std::result::Result<(), Fault>;

    async fn find_cluster(&self, path: &str) -> std::result::Result<Option<ClusterHandle>, Fault>;

    /// List every resource pool under the cluster, recursively.
    async fn resource_pools(
        &self,
        cluster: &ClusterHandle,
    ) -> std::result::Result<Vec<ResourcePoolHandle>, Fault>;

    async fn find_network(&self, path: &str) -> std::result::Result<Option<NetworkHandle>, Fault>;

    /// Create the tag category if it does not exist yet. `associable_types` names the object
    /// kinds a tag in this category may be attached to.
    async fn ensure_category(
        &self,
        name: &str,
        associable_types: &[&str],
    ) -> std::result::Result<(), Fault>;

    async fn ensure_tag(&self, category: &str, name: &str) -> std::result::Result<(), Fault>;

    async fn attach_tag(
        &self,
        category: &str,
        tag: &str,
        object_path: &str,
    ) -> std::result::Result<(), Fault>;
}

/// Opens new connections. A `Connector` assigns a [`FaultKind`] to every login failure so that
/// callers never have to inspect fault text.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn login(
        &self,
        credential: &EndpointCredential,
    ) -> std::result::Result<Arc<dyn Connection>, Fault>;
}

/// A single authenticated session to one vCenter. Sessions are never mutated; the cache replaces
/// a session that is no longer valid with a new one.
pub struct EndpointSession {
    server: String,
    connection: Arc<dyn Connection>,
    established: DateTime<Local>,
    timeout: Duration,
}

impl fmt::Debug for EndpointSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointSession")
            .field("server", &self.server)
            .field("established", &self.established)
            .finish_non_exhaustive()
    }
}

impl EndpointSession {
    fn new(server: &str, connection: Arc<dyn Connection>, timeout: Duration) -> Self {
        EndpointSession {
            server: server.to_string(),
            connection,
            established: Local::now(),
            timeout,
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn established(&self) -> DateTime<Local> {
        self.established
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub async fn is_valid(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, self.connection.is_active()).await,
            Ok(true)
        )
    }

    pub async fn find_cluster(&self, path: &str) -> Result<Option<ClusterHandle>> {
        with_deadline(
            &self.server,
            "find compute cluster",
            self.timeout,
            self.connection.find_cluster(path),
        )
        .await
    }

    pub async fn resource_pools(&self, cluster: &ClusterHandle) -> Result<Vec<ResourcePoolHandle>> {
        with_deadline(
            &self.server,
            "list resource pools",
            self.timeout,
            self.connection.resource_pools(cluster),
        )
        .await
    }

    pub async fn find_network(&self, path: &str) -> Result<Option<NetworkHandle>> {
        with_deadline(
            &self.server,
            "find network",
            self.timeout,
            self.connection.find_network(path),
        )
        .await
    }

    pub async fn ensure_category(&self, name: &str, associable_types: &[&str]) -> Result<()> {
        with_deadline(
            &self.server,
            "create tag category",
            self.timeout,
            self.connection.ensure_category(name, associable_types),
        )
        .await
    }

    pub async fn ensure_tag(&self, category: &str, name: &str) -> Result<()> {
        with_deadline(
            &self.server,
            "create tag",
            self.timeout,
            self.connection.ensure_tag(category, name),
        )
        .await
    }

    pub async fn attach_tag(&self, category: &str, tag: &str, object_path: &str) -> Result<()> {
        with_deadline(
            &self.server,
            "attach tag",
            self.timeout,
            self.connection.attach_tag(category, tag, object_path),
        )
        .await
    }
}

/// Run a remote call with a deadline, turning a fault into [`Error::Remote`] and an expired
/// deadline into [`Error::DeadlineExceeded`].
async fn with_deadline<T, F>(server: &str, operation: &str, timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, Fault>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(fault)) => Err(Error::Remote {
            server: server.to_string(),
            fault,
        }),
        Err(_) => Err(Error::DeadlineExceeded {
            server: server.to_string(),
            operation: operation.to_string(),
        }),
    }
}

#[derive(Default)]
struct Sessions {
    credentials: HashMap<String, Arc<EndpointCredential>>,
    sessions: HashMap<String, Arc<EndpointSession>>,
}

/// Holds one session and one credential per vCenter for the lifetime of an installer run.
///
/// Everything is behind a single mutex, and logging in happens while that mutex is held. Two
/// requests for the same server can therefore never both log in, at the cost of serializing
/// session establishment for all servers.
///
/// The cache is never persisted. A resumed run builds a fresh one with
/// [`SessionCache::from_endpoints`] and sessions are re-established lazily.
pub struct SessionCache {
    connector: Arc<dyn Connector>,
    timeout: Duration,
    inner: tokio::sync::Mutex<Sessions>,
}

impl SessionCache {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        SessionCache {
            connector,
            timeout: SESSION_TIMEOUT,
            inner: tokio::sync::Mutex::new(Sessions::default()),
        }
    }

    /// Create a cache with a credential registered for every given vCenter.
    pub fn from_endpoints(connector: Arc<dyn Connector>, vcenters: &[VCenter]) -> Self {
        let mut sessions = Sessions::default();
        for vc in vcenters {
            sessions
                .credentials
                .entry(vc.server.clone())
                .or_insert_with(|| {
                    Arc::new(EndpointCredential {
                        server: vc.server.clone(),
                        username: vc.user.clone(),
                        password: vc.password.clone(),
                    })
                });
        }

        SessionCache {
            connector,
            timeout: SESSION_TIMEOUT,
            inner: tokio::sync::Mutex::new(sessions),
        }
    }

    /// Override the deadline used for logins and for every call made through sessions created by
    /// this cache.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register the credential for `server`. The first credential registered for a server wins;
    /// later calls return the existing one unchanged.
    pub async fn add_credential(
        &self,
        server: &str,
        username: &str,
        password: &str,
    ) -> Arc<EndpointCredential> {
        let mut inner = self.inner.lock().await;
        let credential = inner
            .credentials
            .entry(server.to_string())
            .or_insert_with(|| {
                Arc::new(EndpointCredential {
                    server: server.to_string(),
                    username: username.to_string(),
                    password: password.to_string(),
                })
            });
        Arc::clone(credential)
    }

    pub async fn servers(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        let mut servers: Vec<String> = inner.credentials.keys().cloned().collect();
        servers.sort();
        servers
    }

    /// Get the session for `server`, logging in if there is none or if the cached one is no
    /// longer valid.
    ///
    /// On failure the cache is left exactly as it was: a stale session stays in place until a
    /// later login succeeds.
    pub async fn session(&self, server: &str) -> Result<Arc<EndpointSession>> {
        let mut inner = self.inner.lock().await;

        let Some(credential) = inner.credentials.get(server).cloned() else {
            return Err(Error::CredentialNotFound {
                server: server.to_string(),
            });
        };

        if let Some(session) = inner.sessions.get(server) {
            if session.is_valid().await {
                return Ok(Arc::clone(session));
            }
            info!("session for vCenter \"{server}\" is no longer valid, logging in again");
        }

        let session = Arc::new(self.login(&credential).await?);
        inner
            .sessions
            .insert(server.to_string(), Arc::clone(&session));
        Ok(session)
    }

    /// Like [`SessionCache::session`], but a login rejected for bad credentials is reported as
    /// [`Error::AuthenticationFault`] so that it can be told apart from an unreachable endpoint.
    pub async fn authenticated_session(&self, server: &str) -> Result<Arc<EndpointSession>> {
        match self.session(server).await {
            Err(Error::Session { server, fault }) if fault.kind == FaultKind::Authentication => {
                Err(Error::AuthenticationFault {
                    server,
                    reason: fault.message,
                })
            }
            other => other,
        }
    }

    /// Log out of every cached session and drop it. Credentials are kept, so later requests log
    /// in again.
    pub async fn logout_all(&self) {
        let sessions: Vec<Arc<EndpointSession>> = {
            let mut inner = self.inner.lock().await;
            inner.sessions.drain().map(|(_, s)| s).collect()
        };

        let logouts: Vec<_> = sessions
            .iter()
            .map(|session| async move {
                if let Err(e) = session.connection.logout().await {
                    warn!("failed to log out of vCenter \"{}\": {e}", session.server);
                }
            })
            .collect();
        future::join_all(logouts).await;
    }

    async fn login(&self, credential: &EndpointCredential) -> Result<EndpointSession> {
        let server = &credential.server;
        debug!("logging into vCenter \"{server}\" as \"{}\"", credential.username);

        match tokio::time::timeout(self.timeout, self.connector.login(credential)).await {
            Ok(Ok(connection)) => {
                info!("established session to vCenter \"{server}\"");
                Ok(EndpointSession::new(server, connection, self.timeout))
            }
            Ok(Err(fault)) => Err(Error::Session {
                server: server.to_string(),
                fault,
            }),
            Err(_) => Err(Error::DeadlineExceeded {
                server: server.to_string(),
                operation: "login".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::inventory::StaticInventory;
    use crate::test_env;

    fn cache(inventory: &Arc<StaticInventory>) -> SessionCache {
        SessionCache::new(Arc::clone(inventory) as Arc<dyn Connector>)
    }

    #[tokio::test]
    async fn first_credential_wins() {
        let inventory = Arc::new(test_env::three_zone_inventory());
        let sessions = cache(&inventory);

        let first = sessions.add_credential("vc1", "admin", "one").await;
        let second = sessions.add_credential("vc1", "other", "two").await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.username, "admin");
        assert_eq!(sessions.servers().await, vec!["vc1".to_string()]);
    }

    #[tokio::test]
    async fn missing_credential() {
        let inventory = Arc::new(test_env::three_zone_inventory());
        let sessions = cache(&inventory);

        let err = sessions.session("vc1").await.unwrap_err();
        assert!(matches!(err, Error::CredentialNotFound { server } if server == "vc1"));
        assert_eq!(inventory.login_count("vc1"), 0);
    }

    #[tokio::test]
    async fn failed_renewal_keeps_stale_session() {
        let inventory = Arc::new(test_env::three_zone_inventory());
        let sessions = cache(&inventory);
        sessions
            .add_credential("vc1", test_env::USERNAME, test_env::PASSWORD)
            .await;

        let first = sessions.session("vc1").await.unwrap();
        inventory.invalidate_sessions("vc1");
        inventory.set_reachable("vc1", false);

        let err = sessions.session("vc1").await.unwrap_err();
        assert_eq!(err.fault().unwrap().kind, FaultKind::Connectivity);

        // Once the endpoint is back, the stale entry is replaced rather than reused.
        inventory.set_reachable("vc1", true);
        let second = sessions.session("vc1").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(inventory.login_count("vc1"), 2);
    }

    #[tokio::test]
    async fn logout_all_drops_sessions() {
        let inventory = Arc::new(test_env::three_zone_inventory());
        let sessions = cache(&inventory);
        sessions
            .add_credential("vc1", test_env::USERNAME, test_env::PASSWORD)
            .await;

        let first = sessions.session("vc1").await.unwrap();
        sessions.logout_all().await;
        assert!(!first.is_valid().await);

        let second = sessions.session("vc1").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.is_valid().await);
    }
}
